#![warn(missing_docs)]
//! # spamguard-auth
//!
//! ## Purpose
//! Implements register/login/logout and session lifecycle handling for
//! `spamguard`.
//!
//! ## Responsibilities
//! - Validate credential input before any request is issued.
//! - Execute auth requests through the shared [`RequestDispatcher`].
//! - Persist `{token, user}` into the [`SessionStore`] when the service
//!   returns an access token.
//!
//! ## Data flow
//! UI collects credentials -> [`AuthClient::login`] -> dispatcher ->
//! [`AuthResponse`] -> session store updated -> dispatcher attaches the token
//! on later calls.
//!
//! ## Ownership and lifetimes
//! The client holds the dispatcher (and through it the store) by `Arc`, so it
//! is cheap to clone into controllers.
//!
//! ## Error model
//! Blank or malformed input fails with [`AuthError::Validation`] and never
//! reaches the network. Transport and HTTP failures are propagated as-is in
//! [`AuthError::Dispatch`].
//!
//! ## Security and privacy notes
//! Logout is client-local: the store is cleared and the service is not
//! contacted, so a server-side token stays valid until it expires. Credentials
//! and tokens are never logged.
//!
//! ## Example
//! ```rust
//! use spamguard_auth::RegistrationForm;
//!
//! let form = RegistrationForm {
//!     name: "Ada".to_string(),
//!     email: "ada@example.test".to_string(),
//!     password: "hunter22".to_string(),
//!     confirm_password: "hunter23".to_string(),
//! };
//! assert!(form.validate().is_err());
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use spamguard_core::{
    Session, UserProfile, ValidationError, validate_email, validate_name, validate_new_password,
};
use spamguard_dispatch::{DispatchError, RequestDispatcher, RequestOptions};
use spamguard_session::{SessionError, SessionStore};
use thiserror::Error;
use tracing::{info, warn};

/// Registration endpoint.
pub const REGISTER_PATH: &str = "/auth/register";
/// Login endpoint.
pub const LOGIN_PATH: &str = "/auth/login";
/// Profile endpoint.
pub const PROFILE_PATH: &str = "/auth/me";

/// Sign-up input collected by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationForm {
    /// Display name.
    pub name: String,
    /// Account email.
    pub email: String,
    /// Chosen password.
    pub password: String,
    /// Password typed a second time.
    pub confirm_password: String,
}

impl RegistrationForm {
    /// Checks the form before any request is attempted.
    ///
    /// # Errors
    /// Returns the first failing [`ValidationError`]; a confirmation mismatch
    /// is reported before field-level checks.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        validate_name(&self.name)?;
        validate_email(&self.email)?;
        validate_new_password(&self.password)
    }
}

/// Response envelope of the register and login endpoints.
///
/// Fields the client does not interpret are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Human-readable status message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Profile of the authenticated user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
    /// Bearer token, absent while authentication is pending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Remaining response fields.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl AuthResponse {
    /// Builds the session carried by this response, if complete.
    pub fn session(&self) -> Option<Session> {
        match (&self.access_token, &self.user) {
            (Some(token), Some(user)) if !token.is_empty() => Some(Session {
                token: token.clone(),
                user: user.clone(),
            }),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct ProfileEnvelope {
    user: UserProfile,
}

/// Auth client bound to one dispatcher and its session store.
#[derive(Clone)]
pub struct AuthClient {
    dispatcher: RequestDispatcher,
}

impl AuthClient {
    /// Creates a client sharing the dispatcher's session store.
    pub fn new(dispatcher: RequestDispatcher) -> Self {
        Self { dispatcher }
    }

    /// Creates an account and, when a token is returned, a session.
    ///
    /// # Errors
    /// Propagates [`AuthError::Dispatch`] on network/HTTP failure, after
    /// clearing any previous session.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, AuthError> {
        let body = json!({ "name": name, "email": email, "password": password });
        self.authenticate(REGISTER_PATH, body).await
    }

    /// Validates a sign-up form, then registers.
    ///
    /// # Errors
    /// Returns [`AuthError::Validation`] without any request when the form is
    /// invalid; otherwise behaves like [`AuthClient::register`].
    pub async fn register_form(&self, form: &RegistrationForm) -> Result<AuthResponse, AuthError> {
        form.validate()?;
        self.register(form.name.trim(), form.email.trim(), &form.password)
            .await
    }

    /// Logs in and, when a token is returned, establishes a session.
    ///
    /// # Errors
    /// Returns [`AuthError::Validation`] for blank email or password.
    /// Propagates [`AuthError::Dispatch`] on failure, after clearing any
    /// previous session.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, AuthError> {
        if email.trim().is_empty() {
            return Err(ValidationError::MissingEmail.into());
        }
        if password.is_empty() {
            return Err(ValidationError::MissingPassword.into());
        }

        let body = json!({ "email": email.trim(), "password": password });
        self.authenticate(LOGIN_PATH, body).await
    }

    /// Clears the local session. No request is sent.
    ///
    /// # Errors
    /// Returns [`AuthError::Session`] when durable state cannot be removed.
    pub fn logout(&self) -> Result<(), AuthError> {
        self.store().clear()?;
        info!(stage = "auth", action = "logout", "session cleared");
        Ok(())
    }

    /// `true` iff a token is present. Freshness is not checked.
    pub fn is_authenticated(&self) -> bool {
        self.store().token().is_some()
    }

    /// Cached profile from the last successful authentication.
    pub fn current_user(&self) -> Option<UserProfile> {
        self.store().user()
    }

    /// Fetches the profile of the token's owner. The store is not updated.
    ///
    /// # Errors
    /// Propagates dispatch failures; returns [`AuthError::InvalidResponse`]
    /// when the body has no `user` object.
    pub async fn profile(&self) -> Result<UserProfile, AuthError> {
        let value = self
            .dispatcher
            .call(PROFILE_PATH, RequestOptions::get())
            .await?;
        let envelope: ProfileEnvelope = serde_json::from_value(value)
            .map_err(|error| AuthError::InvalidResponse(error.to_string()))?;
        Ok(envelope.user)
    }

    fn store(&self) -> &dyn SessionStore {
        self.dispatcher.session().as_ref()
    }

    async fn authenticate(&self, endpoint: &str, body: Value) -> Result<AuthResponse, AuthError> {
        let value = match self.dispatcher.call(endpoint, RequestOptions::post(body)).await {
            Ok(value) => value,
            Err(error) => {
                // A failed attempt leaves no session behind.
                if let Err(clear_error) = self.store().clear() {
                    warn!(stage = "auth", action = "clear_failed", error = %clear_error, "stale session not cleared");
                }
                warn!(stage = "auth", action = "failed", endpoint, status = ?error.status(), "authentication failed");
                return Err(error.into());
            }
        };

        let response: AuthResponse = serde_json::from_value(value)
            .map_err(|error| AuthError::InvalidResponse(error.to_string()))?;

        match response.session() {
            Some(session) => {
                self.store().save(session)?;
                info!(stage = "auth", action = "session_established", endpoint, "session established");
            }
            None if response.access_token.is_some() => {
                warn!(stage = "auth", action = "pending", endpoint, "token returned without user profile");
            }
            None => {
                info!(stage = "auth", action = "pending", endpoint, "authentication pending");
            }
        }

        Ok(response)
    }
}

/// Errors produced by the auth client.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Input failed a client-side precondition.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Transport or HTTP failure.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// Session persistence failure.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// Response body did not match the auth contract.
    #[error("invalid auth response: {0}")]
    InvalidResponse(String),
}
