#![warn(missing_docs)]
//! # spamguard-core
//!
//! ## Purpose
//! Defines the pure data model shared across the `spamguard` workspace.
//!
//! ## Responsibilities
//! - Represent the authenticated [`Session`] and its [`UserProfile`].
//! - Represent analysis verdicts, history entries and aggregate statistics
//!   exactly as the remote service serializes them.
//! - Provide client-side precondition checks that run before any request.
//!
//! ## Data flow
//! Service JSON -> serde structs in this crate -> clients in
//! `spamguard-auth`/`spamguard-analysis` -> view state in `spamguard-ui`.
//!
//! ## Ownership and lifetimes
//! Every value owns its strings and collections. Verdicts are immutable once
//! received and are replaced wholesale, never patched.
//!
//! ## Error model
//! Precondition failures return [`ValidationError`], a typed value returned
//! before any network call is attempted.
//!
//! ## Example
//! ```rust
//! use spamguard_core::{SpamLevel, validate_analysis_text};
//!
//! assert!(validate_analysis_text("   ").is_err());
//! assert_eq!(SpamLevel::from_confidence(92.0), SpamLevel::Critical);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum accepted display-name length, in characters.
pub const NAME_MIN_CHARS: usize = 2;
/// Maximum accepted display-name length, in characters.
pub const NAME_MAX_CHARS: usize = 100;
/// Minimum accepted password length, in characters.
pub const PASSWORD_MIN_CHARS: usize = 6;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("email pattern is a valid literal")
});

/// Server-assigned identifier.
///
/// The service emits integers, but identifiers are treated as opaque text on
/// the client so that they can be forwarded into paths verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawRecordId", into = "String")]
pub struct RecordId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRecordId {
    Number(u64),
    Text(String),
}

impl From<RawRecordId> for RecordId {
    fn from(raw: RawRecordId) -> Self {
        match raw {
            RawRecordId::Number(value) => Self(value.to_string()),
            RawRecordId::Text(value) => Self(value),
        }
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

impl RecordId {
    /// Creates an identifier, rejecting blank values.
    ///
    /// # Errors
    /// Returns [`ValidationError::EmptyId`] when `raw` is blank.
    pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        Ok(Self(raw))
    }

    /// Returns the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for RecordId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Public profile of the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Server-side user id.
    pub id: RecordId,
    /// Display name.
    pub name: String,
    /// Account email.
    pub email: String,
}

/// Authentication state held between login and logout.
///
/// The token is opaque to the client. Its absence means "unauthenticated".
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token attached to every dispatched request.
    pub token: String,
    /// Cached profile returned alongside the token.
    pub user: UserProfile,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

/// Body of `POST /spam/analyze`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Free-form text to classify.
    pub text: String,
}

impl AnalysisRequest {
    /// Builds a request after checking the text is not blank.
    ///
    /// # Errors
    /// Returns [`ValidationError::EmptyText`] for empty or whitespace-only input.
    pub fn new(text: impl Into<String>) -> Result<Self, ValidationError> {
        let text = text.into();
        validate_analysis_text(&text)?;
        Ok(Self { text })
    }
}

/// Classification verdict as held in view state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// `true` when the text was classified as spam.
    pub is_spam: bool,
    /// Confidence in `[0, 100]`.
    pub confidence: f64,
    /// Ordered human-readable indicators supporting the verdict.
    #[serde(default)]
    pub indicators: Vec<String>,
    /// Named boolean signals (for example `allCaps`).
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
}

impl AnalysisResult {
    /// Severity bucket for this verdict's confidence.
    pub fn level(&self) -> SpamLevel {
        SpamLevel::from_confidence(self.confidence)
    }
}

/// Severity bucket derived from confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpamLevel {
    /// Confidence below 40.
    Low,
    /// Confidence in `[40, 60)`.
    Medium,
    /// Confidence in `[60, 80)`.
    High,
    /// Confidence of 80 or more.
    Critical,
}

impl SpamLevel {
    /// Buckets a confidence value the same way the service does.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence < 40.0 {
            Self::Low
        } else if confidence < 60.0 {
            Self::Medium
        } else if confidence < 80.0 {
            Self::High
        } else {
            Self::Critical
        }
    }
}

/// One prior analysis, as listed by the history endpoints.
///
/// Server-owned and read-only on the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Analysis id, usable with the get/delete endpoints.
    pub id: RecordId,
    /// Text preview (the service truncates long inputs).
    pub text: String,
    /// Verdict at analysis time.
    #[serde(rename = "isSpam")]
    pub is_spam: bool,
    /// Confidence at analysis time.
    pub confidence: f64,
    /// Wall-clock time of day (`HH:MM`).
    pub time: String,
    /// Untruncated text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
    /// Indicators recorded for this analysis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicators: Option<Vec<String>>,
    /// Flags recorded for this analysis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<BTreeMap<String, bool>>,
    /// Calendar date (`YYYY-MM-DD`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// ISO-8601 timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzed_at: Option<String>,
}

/// Pagination block returned with a history page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Current page, 1-based.
    pub page: u32,
    /// Page size actually applied by the server.
    pub per_page: u32,
    /// Total entry count.
    pub total: u64,
    /// Total page count.
    pub pages: u32,
    /// Whether a next page exists.
    pub has_next: bool,
    /// Whether a previous page exists.
    pub has_prev: bool,
}

/// One page of analysis history.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistoryPage {
    /// Entries, newest first.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    /// Pagination metadata, when provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

/// Server-computed aggregate statistics.
///
/// Always replaced in full on each fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// Total analyses.
    pub total: u64,
    /// Analyses classified as spam.
    pub spam: u64,
    /// Analyses classified as legitimate.
    pub legitimate: u64,
    /// Spam share in percent.
    pub spam_rate: f64,
    /// Mean confidence in percent.
    pub average_confidence: f64,
    /// Counts for the trailing 24 hours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent: Option<RecentStats>,
}

/// Trailing-window counts nested in [`StatsSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentStats {
    /// Analyses in the window.
    pub total: u64,
    /// Spam analyses in the window.
    pub spam: u64,
    /// Legitimate analyses in the window.
    pub legitimate: u64,
}

/// Rejects empty or whitespace-only analysis text.
///
/// # Errors
/// Returns [`ValidationError::EmptyText`].
pub fn validate_analysis_text(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyText);
    }
    Ok(())
}

/// Checks a display name against the service's length bounds.
///
/// # Errors
/// Returns [`ValidationError::MissingName`] or [`ValidationError::NameLength`].
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::MissingName);
    }

    let chars = name.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&chars) {
        return Err(ValidationError::NameLength {
            min: NAME_MIN_CHARS,
            max: NAME_MAX_CHARS,
        });
    }
    Ok(())
}

/// Checks email shape.
///
/// # Errors
/// Returns [`ValidationError::MissingEmail`] or [`ValidationError::InvalidEmail`].
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::MissingEmail);
    }
    if !EMAIL_PATTERN.is_match(email) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(())
}

/// Checks password length for new accounts.
///
/// # Errors
/// Returns [`ValidationError::MissingPassword`] or
/// [`ValidationError::PasswordTooShort`].
pub fn validate_new_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::MissingPassword);
    }
    if password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(ValidationError::PasswordTooShort {
            min: PASSWORD_MIN_CHARS,
        });
    }
    Ok(())
}

/// Client-side precondition failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Analysis text is empty after trimming.
    #[error("text to analyze must not be empty")]
    EmptyText,
    /// Identifier is blank.
    #[error("identifier must not be empty")]
    EmptyId,
    /// Identifier collides with a fixed route segment.
    #[error("identifier `{0}` is reserved")]
    ReservedId(String),
    /// Name is missing.
    #[error("name is required")]
    MissingName,
    /// Name length is out of bounds.
    #[error("name must be between {min} and {max} characters")]
    NameLength {
        /// Lower bound.
        min: usize,
        /// Upper bound.
        max: usize,
    },
    /// Email is missing.
    #[error("email is required")]
    MissingEmail,
    /// Email does not look like an address.
    #[error("email format is invalid")]
    InvalidEmail,
    /// Password is missing.
    #[error("password is required")]
    MissingPassword,
    /// Password is shorter than allowed.
    #[error("password must be at least {min} characters")]
    PasswordTooShort {
        /// Lower bound.
        min: usize,
    },
    /// Password and its confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,
}

#[cfg(test)]
mod tests {
    //! Unit tests for wire shapes and validators.

    use super::*;

    #[test]
    fn record_id_accepts_numbers_and_strings() {
        let from_number: RecordId = serde_json::from_str("42").expect("numeric id should parse");
        let from_text: RecordId = serde_json::from_str("\"abc\"").expect("text id should parse");
        assert_eq!(from_number.as_str(), "42");
        assert_eq!(from_text.as_str(), "abc");
        assert_eq!(RecordId::new("  "), Err(ValidationError::EmptyId));
    }

    #[test]
    fn analysis_result_defaults_missing_collections() {
        let result: AnalysisResult =
            serde_json::from_str(r#"{"isSpam":false,"confidence":12.5}"#).expect("should parse");
        assert!(result.indicators.is_empty());
        assert!(result.flags.is_empty());
        assert_eq!(result.level(), SpamLevel::Low);
    }

    #[test]
    fn level_boundaries_match_service_buckets() {
        assert_eq!(SpamLevel::from_confidence(39.9), SpamLevel::Low);
        assert_eq!(SpamLevel::from_confidence(40.0), SpamLevel::Medium);
        assert_eq!(SpamLevel::from_confidence(60.0), SpamLevel::High);
        assert_eq!(SpamLevel::from_confidence(80.0), SpamLevel::Critical);
    }

    #[test]
    fn session_debug_hides_token() {
        let session = Session {
            token: "secret-token".to_string(),
            user: UserProfile {
                id: RecordId::from(1),
                name: "Ada".to_string(),
                email: "ada@example.test".to_string(),
            },
        };
        assert!(!format!("{session:?}").contains("secret-token"));
    }

    #[test]
    fn validators_reject_bad_registration_fields() {
        assert_eq!(validate_name("A"), Err(ValidationError::NameLength { min: 2, max: 100 }));
        assert_eq!(validate_email("not-an-email"), Err(ValidationError::InvalidEmail));
        assert_eq!(
            validate_new_password("12345"),
            Err(ValidationError::PasswordTooShort { min: 6 })
        );
        assert!(validate_email("ada@example.test").is_ok());
    }
}
