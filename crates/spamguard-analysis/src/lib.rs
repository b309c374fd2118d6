#![warn(missing_docs)]
//! # spamguard-analysis
//!
//! ## Purpose
//! Spam-analysis, history and statistics operations against the remote
//! classifier.
//!
//! ## Responsibilities
//! - Reject blank analysis text before any request.
//! - Shape dispatcher JSON into typed responses.
//! - Forward pagination parameters verbatim; bounds are the server's concern.
//!
//! ## Data flow
//! Controller -> [`AnalysisClient`] -> `RequestDispatcher` -> JSON ->
//! [`AnalysisResponse`] / [`HistoryPage`] / [`StatsSnapshot`].
//!
//! ## Ownership and lifetimes
//! Responses are owned structs decoupled from the transport buffers.
//!
//! ## Error model
//! Precondition failures are [`AnalysisError::Validation`]; dispatcher
//! failures pass through as [`AnalysisError::Dispatch`]; bodies that do not
//! match the expected shape are [`AnalysisError::Decode`].
//!
//! ## Security and privacy notes
//! Submitted text is never logged, only its length.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use spamguard_core::{
    AnalysisRequest, AnalysisResult, HistoryEntry, HistoryPage, RecordId, SpamLevel,
    StatsSnapshot, ValidationError,
};
use spamguard_dispatch::{DispatchError, RequestDispatcher, RequestOptions};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Analysis endpoint.
pub const ANALYZE_PATH: &str = "/spam/analyze";
/// History collection endpoint.
pub const HISTORY_PATH: &str = "/spam/history";
/// Clear-all endpoint.
pub const CLEAR_HISTORY_PATH: &str = "/spam/history/clear";
/// Statistics endpoint.
pub const STATS_PATH: &str = "/spam/stats";

/// Default history page.
pub const DEFAULT_PAGE: u32 = 1;
/// Default history page size.
pub const DEFAULT_PER_PAGE: u32 = 20;

/// Verdict as returned by `POST /spam/analyze`.
///
/// `indicators` and `flags` stay optional here; callers decide the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    /// History id of the stored analysis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    /// Spam verdict.
    pub is_spam: bool,
    /// Confidence in `[0, 100]`.
    pub confidence: f64,
    /// Supporting indicators, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicators: Option<Vec<String>>,
    /// Boolean signals, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<BTreeMap<String, bool>>,
    /// Server-side severity bucket, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<SpamLevel>,
}

impl AnalysisResponse {
    /// Server level, or one derived from confidence when omitted.
    pub fn level(&self) -> SpamLevel {
        self.level
            .unwrap_or_else(|| SpamLevel::from_confidence(self.confidence))
    }

    /// Converts into a view verdict, defaulting missing collections to empty.
    pub fn into_result(self) -> AnalysisResult {
        AnalysisResult {
            is_spam: self.is_spam,
            confidence: self.confidence,
            indicators: self.indicators.unwrap_or_default(),
            flags: self.flags.unwrap_or_default(),
        }
    }
}

/// Page selector for history requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryQuery {
    /// 1-based page number.
    pub page: u32,
    /// Page size.
    pub per_page: u32,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

#[derive(Deserialize)]
struct AnalysisEnvelope {
    analysis: HistoryEntry,
}

#[derive(Deserialize)]
struct StatsEnvelope {
    stats: StatsSnapshot,
}

#[derive(Deserialize)]
struct MessageEnvelope {
    #[serde(default)]
    message: Option<String>,
}

/// Client for analysis, history and statistics endpoints.
#[derive(Clone)]
pub struct AnalysisClient {
    dispatcher: RequestDispatcher,
}

impl AnalysisClient {
    /// Creates a client over a shared dispatcher.
    pub fn new(dispatcher: RequestDispatcher) -> Self {
        Self { dispatcher }
    }

    /// Submits text for classification.
    ///
    /// # Errors
    /// Returns [`AnalysisError::Validation`] without a request for empty or
    /// whitespace-only text.
    pub async fn analyze(&self, text: &str) -> Result<AnalysisResponse, AnalysisError> {
        let request = AnalysisRequest::new(text)?;
        debug!(stage = "analysis", action = "analyze", chars = request.text.chars().count(), "submitting text");

        let body = serde_json::to_value(&request)
            .map_err(|error| AnalysisError::Decode(error.to_string()))?;
        let value = self
            .dispatcher
            .call(ANALYZE_PATH, RequestOptions::post(body))
            .await?;
        decode(value)
    }

    /// Fetches one history page. `page` and `per_page` are sent as given.
    ///
    /// # Errors
    /// Propagates dispatch and decode failures.
    pub async fn history(&self, page: u32, per_page: u32) -> Result<HistoryPage, AnalysisError> {
        let options = RequestOptions::get()
            .query("page", page)
            .query("per_page", per_page);
        let value = self.dispatcher.call(HISTORY_PATH, options).await?;
        decode(value)
    }

    /// Fetches a history page described by `query`.
    ///
    /// # Errors
    /// Same as [`AnalysisClient::history`].
    pub async fn history_page(&self, query: HistoryQuery) -> Result<HistoryPage, AnalysisError> {
        self.history(query.page, query.per_page).await
    }

    /// Fetches one stored analysis.
    ///
    /// # Errors
    /// Returns [`AnalysisError::Validation`] for a blank or reserved id.
    pub async fn analysis(&self, id: &str) -> Result<HistoryEntry, AnalysisError> {
        let path = entry_path(&RecordId::new(id)?)?;
        let value = self
            .dispatcher
            .call(&path, RequestOptions::get())
            .await?;
        Ok(decode::<AnalysisEnvelope>(value)?.analysis)
    }

    /// Deletes one stored analysis and returns the server message.
    ///
    /// # Errors
    /// Returns [`AnalysisError::Validation`] for a blank or reserved id. The
    /// id `clear` is reserved because it names the clear-all route.
    pub async fn delete_analysis(&self, id: &str) -> Result<Option<String>, AnalysisError> {
        let path = entry_path(&RecordId::new(id)?)?;
        let value = self
            .dispatcher
            .call(&path, RequestOptions::delete())
            .await?;
        Ok(decode::<MessageEnvelope>(value)?.message)
    }

    /// Deletes the caller's whole history and returns the server message.
    ///
    /// # Errors
    /// Propagates dispatch failures.
    pub async fn clear_history(&self) -> Result<Option<String>, AnalysisError> {
        let value = self
            .dispatcher
            .call(CLEAR_HISTORY_PATH, RequestOptions::delete())
            .await?;
        Ok(decode::<MessageEnvelope>(value)?.message)
    }

    /// Fetches aggregate statistics.
    ///
    /// # Errors
    /// Propagates dispatch and decode failures.
    pub async fn stats(&self) -> Result<StatsSnapshot, AnalysisError> {
        let value = self
            .dispatcher
            .call(STATS_PATH, RequestOptions::get())
            .await?;
        Ok(decode::<StatsEnvelope>(value)?.stats)
    }

    /// Liveness probe of the service.
    pub async fn health(&self) -> bool {
        self.dispatcher.health().await
    }
}

/// Last segment of [`CLEAR_HISTORY_PATH`]; never a valid record id.
const CLEAR_SEGMENT: &str = "clear";

/// Builds `/spam/history/<id>` with the id as one percent-encoded segment.
fn entry_path(id: &RecordId) -> Result<String, AnalysisError> {
    if id.as_str() == CLEAR_SEGMENT {
        return Err(ValidationError::ReservedId(id.to_string()).into());
    }
    let invalid = || DispatchError::InvalidEndpoint(format!("{HISTORY_PATH}/{id}"));
    let mut scratch = Url::parse("http://entry.invalid/").map_err(|_| invalid())?;
    scratch
        .path_segments_mut()
        .map_err(|()| invalid())?
        .pop_if_empty()
        .push(id.as_str());
    Ok(format!("{HISTORY_PATH}{}", scratch.path()))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, AnalysisError> {
    serde_json::from_value(value).map_err(|error| AnalysisError::Decode(error.to_string()))
}

/// Analysis client errors.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Input failed a client-side precondition.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Transport or HTTP failure.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// Body did not match the expected response shape.
    #[error("unexpected analysis response: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for response shaping.

    use super::*;

    #[test]
    fn into_result_defaults_missing_collections() {
        let response: AnalysisResponse =
            serde_json::from_str(r#"{"isSpam":true,"confidence":55}"#).expect("should parse");
        assert_eq!(response.level(), SpamLevel::Medium);

        let result = response.into_result();
        assert!(result.indicators.is_empty());
        assert!(result.flags.is_empty());
    }

    #[test]
    fn server_level_wins_over_derived_level() {
        let response: AnalysisResponse =
            serde_json::from_str(r#"{"isSpam":true,"confidence":10,"level":"high"}"#)
                .expect("should parse");
        assert_eq!(response.level(), SpamLevel::High);
    }
}
