//! Workflow orchestration over the auth and analysis clients.
//!
//! The controller owns the [`ViewState`] behind a mutex that is never held
//! across an await. Each logical operation (analyze, history refresh, stats
//! refresh) draws a ticket from a per-operation sequence; a settled response
//! is applied only when its ticket is still current under the configured
//! [`OrderingPolicy`]. Signing out fences every sequence so responses issued
//! before it are dropped.

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use spamguard_analysis::{AnalysisClient, AnalysisResponse, HistoryQuery};
use spamguard_auth::{AuthClient, AuthResponse, RegistrationForm};
use spamguard_core::{AnalysisResult, HistoryPage, StatsSnapshot, validate_analysis_text};
use spamguard_ui::{ViewState, WorkflowPhase};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::AppError;
use crate::guard::{GuardDecision, SessionGuard};
use crate::telemetry::redact_sensitive;

/// Which settled response of one operation ends up in the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderingPolicy {
    /// A response is applied only if no newer-issued one was applied already.
    #[default]
    LatestIssuedWins,
    /// Every settled response is applied; the last to arrive wins even when
    /// it answers an older request.
    LastSettledWins,
}

/// Controller behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
    /// Response ordering for overlapping operations.
    pub ordering: OrderingPolicy,
    /// Reject a submission while another analysis is in flight.
    pub reentrancy_guard: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            ordering: OrderingPolicy::default(),
            reentrancy_guard: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Analyze,
    History,
    Stats,
}

impl Operation {
    const COUNT: usize = 3;

    fn index(self) -> usize {
        match self {
            Self::Analyze => 0,
            Self::History => 1,
            Self::Stats => 2,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Analyze => "analyze",
            Self::History => "history",
            Self::Stats => "stats",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Ticket {
    operation: Operation,
    sequence: u64,
}

/// Fate of a settled response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    /// Current; recorded as applied.
    Applied,
    /// Superseded by a newer response of the same operation.
    Stale,
    /// Issued before the last sign-out; belongs to no live workflow.
    Fenced,
}

/// Per-operation issue/apply counters.
#[derive(Debug, Default)]
struct Sequences {
    issued: [u64; Operation::COUNT],
    applied: [u64; Operation::COUNT],
    fence: [u64; Operation::COUNT],
}

impl Sequences {
    fn issue(&mut self, operation: Operation) -> Ticket {
        let slot = &mut self.issued[operation.index()];
        *slot += 1;
        Ticket {
            operation,
            sequence: *slot,
        }
    }

    /// Decides whether a settled response may touch the view, recording it
    /// as applied when it may.
    fn admit(&mut self, ticket: Ticket, ordering: OrderingPolicy) -> Admission {
        let index = ticket.operation.index();
        if ticket.sequence <= self.fence[index] {
            return Admission::Fenced;
        }
        if ordering == OrderingPolicy::LatestIssuedWins && ticket.sequence <= self.applied[index] {
            return Admission::Stale;
        }
        self.applied[index] = self.applied[index].max(ticket.sequence);
        Admission::Applied
    }

    fn fence_all(&mut self) {
        self.fence = self.issued;
        self.applied = self.issued;
    }
}

#[derive(Debug)]
struct ControllerState {
    view: ViewState,
    sequences: Sequences,
    history_query: HistoryQuery,
}

impl ControllerState {
    fn sign_out(&mut self) {
        self.view.reset();
        self.sequences.fence_all();
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<ControllerState>,
    refreshes: Mutex<Vec<JoinHandle<()>>>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refreshes(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.refreshes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `update` on the view if `ticket` is still current.
    fn apply(
        &self,
        ticket: Ticket,
        ordering: OrderingPolicy,
        update: impl FnOnce(&mut ViewState),
    ) -> bool {
        let mut state = self.state();
        if state.sequences.admit(ticket, ordering) != Admission::Applied {
            debug!(stage = "workflow", action = "discard_stale", operation = ticket.operation.label(), sequence = ticket.sequence, "stale response dropped");
            return false;
        }
        update(&mut state.view);
        true
    }
}

/// Orchestrates sign-in, analysis and best-effort refreshes.
///
/// Cloning yields another handle to the same view and sequences.
#[derive(Clone)]
pub struct AppController {
    auth: AuthClient,
    analysis: AnalysisClient,
    guard: SessionGuard,
    options: ControllerOptions,
    shared: Arc<Shared>,
}

impl AppController {
    /// Creates a controller in `Unauthenticated` with default options.
    pub fn new(auth: AuthClient, analysis: AnalysisClient, version: impl Into<String>) -> Self {
        Self {
            auth,
            analysis,
            guard: SessionGuard::default(),
            options: ControllerOptions::default(),
            shared: Arc::new(Shared {
                state: Mutex::new(ControllerState {
                    view: ViewState::new(version),
                    sequences: Sequences::default(),
                    history_query: HistoryQuery::default(),
                }),
                refreshes: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Replaces the behavior switches.
    pub fn with_options(mut self, options: ControllerOptions) -> Self {
        self.options = options;
        self
    }

    /// Replaces the entry guard.
    pub fn with_guard(mut self, guard: SessionGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Snapshot of the current view.
    pub fn view(&self) -> ViewState {
        self.shared.state().view.clone()
    }

    /// Current workflow phase.
    pub fn phase(&self) -> WorkflowPhase {
        self.shared.state().view.phase()
    }

    /// Whether the submit affordance is enabled.
    pub fn can_submit(&self) -> bool {
        self.shared.state().view.can_submit()
    }

    /// Auth client shared with this controller.
    pub fn auth(&self) -> &AuthClient {
        &self.auth
    }

    /// Analysis client shared with this controller.
    pub fn analysis(&self) -> &AnalysisClient {
        &self.analysis
    }

    /// Runs the session guard on entry to the protected view.
    ///
    /// With a session, `Unauthenticated` moves to `Idle` and history and
    /// statistics refreshes are started. Without one, any stale view state is
    /// cleared and nothing is fetched.
    pub fn enter_protected_view(&self) -> GuardDecision {
        let decision = self.guard.check(&self.auth);
        let entered = {
            let mut state = self.shared.state();
            match &decision {
                GuardDecision::Redirect(_) => {
                    if state.view.phase() != WorkflowPhase::Unauthenticated {
                        state.sign_out();
                    }
                    false
                }
                GuardDecision::Proceed(user) => {
                    state.view.phase() == WorkflowPhase::Unauthenticated
                        && state.view.enter_idle(user.clone()).is_ok()
                }
            }
        };

        if entered {
            info!(stage = "workflow", action = "enter_idle", "protected view entered");
            self.spawn_refresh();
        }
        decision
    }

    /// Logs in and, once a session exists, enters the protected view.
    ///
    /// # Errors
    /// Returns [`AppError::Auth`]; the view then carries the user message.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, AppError> {
        let outcome = self.auth.login(email, password).await;
        self.finish_authentication(outcome)
    }

    /// Validates and submits a sign-up form; enters the protected view when
    /// the service returns a session.
    ///
    /// # Errors
    /// Returns [`AppError::Auth`]; validation failures never reach the network.
    pub async fn register(&self, form: &RegistrationForm) -> Result<AuthResponse, AppError> {
        let outcome = self.auth.register_form(form).await;
        self.finish_authentication(outcome)
    }

    fn finish_authentication(
        &self,
        outcome: Result<AuthResponse, spamguard_auth::AuthError>,
    ) -> Result<AuthResponse, AppError> {
        match outcome {
            Ok(response) => {
                if response.session().is_some() {
                    self.shared.state().sign_out();
                    self.enter_protected_view();
                }
                Ok(response)
            }
            Err(error) => {
                let error = AppError::from(error);
                let mut state = self.shared.state();
                if !self.auth.is_authenticated() && state.view.phase() != WorkflowPhase::Unauthenticated {
                    state.sign_out();
                }
                state.view.error_message = Some(error.user_message());
                Err(error)
            }
        }
    }

    /// Submits `text` for analysis and settles the workflow.
    ///
    /// Blank text is rejected before any request and leaves the view as it
    /// was. On success the verdict replaces the previous one and refreshes
    /// are started; on failure the verdict is cleared and the user message is
    /// shown. Submit is re-enabled once no analysis remains in flight.
    ///
    /// # Errors
    /// - [`AppError::Validation`] for blank text.
    /// - [`AppError::NotAuthenticated`] outside the protected view.
    /// - [`AppError::Busy`] when the reentrancy guard is on and an analysis is
    ///   already in flight.
    /// - [`AppError::Analysis`] for service failures.
    pub async fn submit(&self, text: &str) -> Result<AnalysisResult, AppError> {
        validate_analysis_text(text)?;

        let ticket = {
            let mut state = self.shared.state();
            match state.view.phase() {
                WorkflowPhase::Unauthenticated => return Err(AppError::NotAuthenticated),
                WorkflowPhase::Analyzing if self.options.reentrancy_guard => {
                    return Err(AppError::Busy);
                }
                _ => {}
            }
            state.view.begin_analysis()?;
            state.sequences.issue(Operation::Analyze)
        };
        info!(stage = "workflow", action = "analyze", sequence = ticket.sequence, chars = text.chars().count(), "analysis submitted");

        let outcome = self
            .analysis
            .analyze(text)
            .await
            .map(AnalysisResponse::into_result)
            .map_err(AppError::from);

        let (admission, path) = {
            let mut state = self.shared.state();
            let admission = state.sequences.admit(ticket, self.options.ordering);
            match (&outcome, admission) {
                (Ok(result), Admission::Applied) => state.view.apply_result(result.clone()),
                (Err(error), Admission::Applied) => state.view.apply_failure(error.user_message()),
                (_, Admission::Stale | Admission::Fenced) => {
                    debug!(stage = "workflow", action = "discard_stale", operation = "analyze", sequence = ticket.sequence, fenced = admission == Admission::Fenced, "stale verdict dropped");
                }
            }
            // A fenced analysis was never counted by the current view.
            let path = if admission == Admission::Fenced {
                Vec::new()
            } else {
                state
                    .view
                    .settle_analysis(admission == Admission::Applied && outcome.is_err())
            };
            (admission, path)
        };
        for phase in &path {
            debug!(stage = "workflow", action = "transition", to = %phase, "phase changed");
        }

        match &outcome {
            Ok(result) => {
                info!(stage = "workflow", action = "analyzed", sequence = ticket.sequence, is_spam = result.is_spam, confidence = result.confidence, "analysis settled");
                if admission != Admission::Fenced {
                    self.spawn_refresh();
                }
            }
            Err(error) => {
                warn!(stage = "workflow", action = "analyze_failed", sequence = ticket.sequence, error = %redact_sensitive(&error.to_string()), "analysis failed");
            }
        }
        outcome
    }

    /// Loads one history page and remembers it for later refreshes.
    ///
    /// # Errors
    /// Returns [`AppError::NotAuthenticated`] outside the protected view, or
    /// the client failure; the view keeps its previous page on failure.
    pub async fn load_history(&self, query: HistoryQuery) -> Result<HistoryPage, AppError> {
        let ticket = {
            let mut state = self.shared.state();
            if state.view.phase() == WorkflowPhase::Unauthenticated {
                return Err(AppError::NotAuthenticated);
            }
            state.history_query = query;
            state.sequences.issue(Operation::History)
        };

        let page = self.analysis.history_page(query).await?;
        let applied = page.clone();
        self.shared
            .apply(ticket, self.options.ordering, |view| view.apply_history(applied));
        Ok(page)
    }

    /// Loads aggregate statistics.
    ///
    /// # Errors
    /// Returns [`AppError::NotAuthenticated`] outside the protected view, or
    /// the client failure; the view keeps its previous snapshot on failure.
    pub async fn load_stats(&self) -> Result<StatsSnapshot, AppError> {
        let ticket = {
            let mut state = self.shared.state();
            if state.view.phase() == WorkflowPhase::Unauthenticated {
                return Err(AppError::NotAuthenticated);
            }
            state.sequences.issue(Operation::Stats)
        };

        let stats = self.analysis.stats().await?;
        let applied = stats.clone();
        self.shared
            .apply(ticket, self.options.ordering, |view| view.apply_stats(applied));
        Ok(stats)
    }

    /// Deletes one stored analysis, then refreshes.
    ///
    /// # Errors
    /// Returns [`AppError::NotAuthenticated`] outside the protected view, or
    /// the client failure.
    pub async fn delete_analysis(&self, id: &str) -> Result<Option<String>, AppError> {
        self.ensure_signed_in()?;
        let message = self.analysis.delete_analysis(id).await?;
        info!(stage = "workflow", action = "deleted", "analysis deleted");
        self.spawn_refresh();
        Ok(message)
    }

    /// Deletes the whole history, then refreshes.
    ///
    /// # Errors
    /// Returns [`AppError::NotAuthenticated`] outside the protected view, or
    /// the client failure.
    pub async fn clear_history(&self) -> Result<Option<String>, AppError> {
        self.ensure_signed_in()?;
        let message = self.analysis.clear_history().await?;
        info!(stage = "workflow", action = "history_cleared", "history cleared");
        self.spawn_refresh();
        Ok(message)
    }

    /// Signs out locally: clears the session store and every piece of view
    /// state. No request is sent.
    ///
    /// The view is reset even when the store cannot be cleared.
    ///
    /// # Errors
    /// Returns [`AppError::Auth`] when durable session state could not be
    /// removed.
    pub fn logout(&self) -> Result<(), AppError> {
        let cleared = self.auth.logout();
        self.shared.state().sign_out();
        for handle in mem::take(&mut *self.shared.refreshes()) {
            handle.abort();
        }
        info!(stage = "workflow", action = "logout", "view cleared");
        cleared.map_err(AppError::from)
    }

    /// Starts history and statistics refreshes without awaiting them.
    ///
    /// Failures are logged and leave the previous data in place. Nothing is
    /// started outside the protected view or outside a tokio runtime.
    pub fn refresh(&self) {
        self.spawn_refresh();
    }

    /// Awaits every refresh started so far.
    pub async fn wait_for_refreshes(&self) {
        loop {
            let pending = mem::take(&mut *self.shared.refreshes());
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                if let Err(error) = handle.await {
                    if !error.is_cancelled() {
                        warn!(stage = "refresh", action = "task_failed", error = %error, "refresh task did not complete");
                    }
                }
            }
        }
    }

    fn ensure_signed_in(&self) -> Result<(), AppError> {
        if self.phase() == WorkflowPhase::Unauthenticated {
            return Err(AppError::NotAuthenticated);
        }
        Ok(())
    }

    fn spawn_refresh(&self) {
        let Ok(runtime) = Handle::try_current() else {
            warn!(stage = "refresh", action = "skipped", "no async runtime; refresh skipped");
            return;
        };

        let (query, history_ticket, stats_ticket) = {
            let mut state = self.shared.state();
            if state.view.phase() == WorkflowPhase::Unauthenticated {
                return;
            }
            (
                state.history_query,
                state.sequences.issue(Operation::History),
                state.sequences.issue(Operation::Stats),
            )
        };
        let ordering = self.options.ordering;

        let history_task = {
            let client = self.analysis.clone();
            let shared = Arc::clone(&self.shared);
            runtime.spawn(async move {
                match client.history_page(query).await {
                    Ok(page) => {
                        shared.apply(history_ticket, ordering, |view| view.apply_history(page));
                    }
                    Err(error) => {
                        warn!(stage = "refresh", action = "history_failed", error = %redact_sensitive(&error.to_string()), "history refresh failed; keeping previous page");
                    }
                }
            })
        };

        let stats_task = {
            let client = self.analysis.clone();
            let shared = Arc::clone(&self.shared);
            runtime.spawn(async move {
                match client.stats().await {
                    Ok(stats) => {
                        shared.apply(stats_ticket, ordering, |view| view.apply_stats(stats));
                    }
                    Err(error) => {
                        warn!(stage = "refresh", action = "stats_failed", error = %redact_sensitive(&error.to_string()), "stats refresh failed; keeping previous snapshot");
                    }
                }
            })
        };

        let mut refreshes = self.shared.refreshes();
        refreshes.retain(|handle| !handle.is_finished());
        refreshes.extend([history_task, stats_task]);
    }
}
