//! Entry-point check for protected views.

use spamguard_auth::AuthClient;
use spamguard_core::UserProfile;
use tracing::debug;

/// Where unauthenticated callers are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    /// Sign-in screen.
    Login,
    /// Sign-up screen.
    Register,
}

/// Outcome of a guard check.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardDecision {
    /// A session exists; the cached profile is attached when known.
    Proceed(Option<UserProfile>),
    /// No session; nothing protected may be initialized.
    Redirect(EntryPoint),
}

impl GuardDecision {
    /// `true` for [`GuardDecision::Proceed`].
    pub fn allows_entry(&self) -> bool {
        matches!(self, Self::Proceed(_))
    }
}

/// Redirects callers without a session before any protected view is used.
///
/// The check is presence-only: an expired token still proceeds and is
/// rejected by the service on first use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionGuard {
    redirect_to: EntryPoint,
}

impl Default for SessionGuard {
    fn default() -> Self {
        Self::new(EntryPoint::Login)
    }
}

impl SessionGuard {
    /// Creates a guard redirecting to `redirect_to`.
    pub fn new(redirect_to: EntryPoint) -> Self {
        Self { redirect_to }
    }

    /// Checks the session held behind `auth`.
    pub fn check(&self, auth: &AuthClient) -> GuardDecision {
        if !auth.is_authenticated() {
            debug!(stage = "guard", action = "redirect", to = ?self.redirect_to, "no session");
            return GuardDecision::Redirect(self.redirect_to);
        }
        GuardDecision::Proceed(auth.current_user())
    }
}
