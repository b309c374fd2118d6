#![warn(missing_docs)]
//! # spamguard-ui
//!
//! ## Purpose
//! Defines the in-memory view state and workflow phases for `spamguard`.
//!
//! ## Responsibilities
//! - Represent the workflow phase (`Unauthenticated`, `Idle`, `Analyzing`,
//!   `Error`) with explicit legal transitions.
//! - Hold the last verdict, history page, statistics and error message.
//! - Expose the submit-affordance guard.
//!
//! ## Data flow
//! Controller events mutate [`ViewState`], which drives whatever renders it.
//!
//! ## Ownership and lifetimes
//! `ViewState` owns every value so that reducers can run from any task
//! holding the controller's lock, without borrowing across awaits.
//!
//! ## Error model
//! Illegal phase changes are rejected with [`IllegalTransition`] and leave the
//! state untouched.
//!
//! ## Security and privacy notes
//! View state excludes secrets (credentials, tokens).

use std::fmt;

use spamguard_core::{AnalysisResult, HistoryEntry, HistoryPage, Pagination, StatsSnapshot, UserProfile};
use thiserror::Error;

/// Workflow phase of the orchestration layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowPhase {
    /// No session; protected views are not initialized.
    Unauthenticated,
    /// Ready for a submission.
    Idle,
    /// An analysis request is in flight.
    Analyzing,
    /// The last analysis failed; transient on the way back to `Idle`.
    Error,
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Idle => "idle",
            Self::Analyzing => "analyzing",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

impl WorkflowPhase {
    /// Returns `true` when moving to `next` is legal.
    ///
    /// Any phase may drop to `Unauthenticated` (logout).
    pub fn can_transition_to(self, next: WorkflowPhase) -> bool {
        use WorkflowPhase::*;
        matches!(
            (self, next),
            (_, Unauthenticated)
                | (Unauthenticated, Idle)
                | (Idle, Analyzing)
                | (Analyzing, Analyzing)
                | (Analyzing, Idle)
                | (Analyzing, Error)
                | (Error, Idle)
        )
    }
}

/// Rejected phase change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal workflow transition {from} -> {to}")]
pub struct IllegalTransition {
    /// Phase before the attempt.
    pub from: WorkflowPhase,
    /// Requested phase.
    pub to: WorkflowPhase,
}

/// Aggregate view state.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    /// App version string.
    pub version: String,
    phase: WorkflowPhase,
    in_flight: usize,
    /// Profile of the signed-in user.
    pub user: Option<UserProfile>,
    /// Verdict of the last settled analysis.
    pub last_result: Option<AnalysisResult>,
    /// Current history page entries.
    pub history: Vec<HistoryEntry>,
    /// Pagination of the current history page.
    pub pagination: Option<Pagination>,
    /// Last statistics snapshot.
    pub stats: Option<StatsSnapshot>,
    /// User-visible error message of the last failure.
    pub error_message: Option<String>,
}

impl ViewState {
    /// Creates an unauthenticated, empty view.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            phase: WorkflowPhase::Unauthenticated,
            in_flight: 0,
            user: None,
            last_result: None,
            history: Vec::new(),
            pagination: None,
            stats: None,
            error_message: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> WorkflowPhase {
        self.phase
    }

    /// Number of analyses awaiting a response.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Whether the submit affordance is enabled.
    pub fn can_submit(&self) -> bool {
        self.phase == WorkflowPhase::Idle
    }

    /// Moves to `next` when legal.
    ///
    /// # Errors
    /// Returns [`IllegalTransition`] and leaves the phase unchanged otherwise.
    pub fn transition(&mut self, next: WorkflowPhase) -> Result<(), IllegalTransition> {
        if !self.phase.can_transition_to(next) {
            return Err(IllegalTransition {
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        Ok(())
    }

    /// Enters the protected view for `user`.
    ///
    /// # Errors
    /// Returns [`IllegalTransition`] unless currently `Unauthenticated`.
    pub fn enter_idle(&mut self, user: Option<UserProfile>) -> Result<(), IllegalTransition> {
        if self.phase != WorkflowPhase::Unauthenticated {
            return Err(IllegalTransition {
                from: self.phase,
                to: WorkflowPhase::Idle,
            });
        }
        self.transition(WorkflowPhase::Idle)?;
        self.user = user;
        Ok(())
    }

    /// Starts an analysis: disables submit, clears the previous verdict and
    /// error.
    ///
    /// # Errors
    /// Returns [`IllegalTransition`] unless `Idle` or `Analyzing`; overlapping
    /// analyses are counted so that submit stays disabled until all settle.
    pub fn begin_analysis(&mut self) -> Result<(), IllegalTransition> {
        self.transition(WorkflowPhase::Analyzing)?;
        self.in_flight += 1;
        self.last_result = None;
        self.error_message = None;
        Ok(())
    }

    /// Records a verdict, replacing the previous one wholesale.
    pub fn apply_result(&mut self, result: AnalysisResult) {
        self.last_result = Some(result);
        self.error_message = None;
    }

    /// Records a failure: verdict discarded, message shown.
    pub fn apply_failure(&mut self, message: impl Into<String>) {
        self.last_result = None;
        self.error_message = Some(message.into());
    }

    /// Settles one in-flight analysis; submit is re-enabled once none remain.
    ///
    /// Returns the phases passed through, in order. A failed settle passes
    /// through `Error` on the way back to `Idle`. Nothing happens unless the
    /// phase is `Analyzing`.
    pub fn settle_analysis(&mut self, failed: bool) -> Vec<WorkflowPhase> {
        if self.phase != WorkflowPhase::Analyzing {
            return Vec::new();
        }

        self.in_flight = self.in_flight.saturating_sub(1);
        if self.in_flight > 0 {
            return Vec::new();
        }

        let path = if failed {
            vec![WorkflowPhase::Error, WorkflowPhase::Idle]
        } else {
            vec![WorkflowPhase::Idle]
        };
        for next in &path {
            debug_assert!(self.phase.can_transition_to(*next));
            self.phase = *next;
        }
        path
    }

    /// Replaces the history page.
    pub fn apply_history(&mut self, page: HistoryPage) {
        self.history = page.history;
        self.pagination = page.pagination;
    }

    /// Replaces the statistics snapshot.
    pub fn apply_stats(&mut self, stats: StatsSnapshot) {
        self.stats = Some(stats);
    }

    /// Clears everything and returns to `Unauthenticated`.
    pub fn reset(&mut self) {
        *self = Self::new(std::mem::take(&mut self.version));
    }

    /// One-line verdict summary for status displays.
    pub fn verdict_summary(&self) -> String {
        if let Some(message) = &self.error_message {
            return format!("Error: {message}");
        }

        match &self.last_result {
            None => "No analysis yet".to_string(),
            Some(result) => {
                let label = if result.is_spam { "Spam" } else { "Legitimate" };
                format!(
                    "{label} ({:.0}% confidence, {:?} level)",
                    result.confidence,
                    result.level()
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for workflow transitions.

    use std::collections::BTreeMap;

    use super::*;

    fn verdict() -> AnalysisResult {
        AnalysisResult {
            is_spam: true,
            confidence: 92.0,
            indicators: vec!["urgent".to_string()],
            flags: BTreeMap::from([("allCaps".to_string(), true)]),
        }
    }

    #[test]
    fn submit_requires_idle() {
        let mut state = ViewState::new("0.1.0");
        assert!(!state.can_submit());

        state.enter_idle(None).expect("enter idle");
        assert!(state.can_submit());

        state.begin_analysis().expect("begin");
        assert!(!state.can_submit());
        assert!(state.begin_analysis().is_ok(), "overlap is tracked, not rejected, at this layer");
        assert_eq!(state.in_flight(), 2);
    }

    #[test]
    fn failure_discards_verdict_and_returns_to_idle() {
        let mut state = ViewState::new("0.1.0");
        state.enter_idle(None).expect("enter idle");
        state.begin_analysis().expect("begin");
        state.apply_result(verdict());
        state.settle_analysis(false);

        state.begin_analysis().expect("begin again");
        state.apply_failure("Service unavailable");
        let path = state.settle_analysis(true);

        assert_eq!(path, vec![WorkflowPhase::Error, WorkflowPhase::Idle]);
        assert_eq!(state.phase(), WorkflowPhase::Idle);
        assert!(state.last_result.is_none());
        assert_eq!(state.verdict_summary(), "Error: Service unavailable");
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let mut state = ViewState::new("0.1.0");
        let error = state.begin_analysis().expect_err("cannot analyze unauthenticated");
        assert_eq!(error.from, WorkflowPhase::Unauthenticated);
        assert_eq!(state.phase(), WorkflowPhase::Unauthenticated);
        assert!(WorkflowPhase::Analyzing.can_transition_to(WorkflowPhase::Unauthenticated));
        assert!(!WorkflowPhase::Idle.can_transition_to(WorkflowPhase::Error));
    }

    #[test]
    fn reset_clears_view_but_keeps_version() {
        let mut state = ViewState::new("0.1.0");
        state.enter_idle(None).expect("enter idle");
        state.apply_result(verdict());
        state.reset();

        assert_eq!(state, ViewState::new("0.1.0"));
    }
}
