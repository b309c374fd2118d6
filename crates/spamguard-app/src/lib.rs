#![warn(missing_docs)]
//! # spamguard-app
//!
//! ## Purpose
//! Orchestrates session, auth, analysis and view state for `spamguard`.
//!
//! ## Responsibilities
//! - Gate protected views on a present session ([`SessionGuard`]).
//! - Drive the analyze-then-refresh workflow ([`AppController`]).
//! - Load configuration from the environment and install logging.
//! - Convert subsystem failures into user-visible messages.
//!
//! ## Data flow
//! Entry point -> [`AppConfig`] -> [`connect`] builds one dispatcher over the
//! injected session store -> auth/analysis clients -> controller -> view.
//!
//! ## Ownership and lifetimes
//! The entry point owns the session store and hands an `Arc` to every
//! component; the controller owns the view state and hands out snapshots.
//!
//! ## Error model
//! Subsystem failures are wrapped in [`AppError`]; [`AppError::user_message`]
//! yields the text shown to the user.
//!
//! ## Security and privacy notes
//! - Logout is client-local and never contacts the service.
//! - [`redact_sensitive`] masks token and credential strings before logging
//!   free-form text.

pub mod config;
pub mod controller;
pub mod guard;
pub mod telemetry;

use std::sync::Arc;

use spamguard_analysis::{AnalysisClient, AnalysisError};
use spamguard_auth::{AuthClient, AuthError};
use spamguard_core::ValidationError;
use spamguard_dispatch::{DispatchError, GENERIC_ERROR_MESSAGE, HttpTransport, RequestDispatcher};
use spamguard_session::{SessionError, SessionStore};
use spamguard_ui::IllegalTransition;
use thiserror::Error;

pub use config::{AppConfig, ConfigError};
pub use controller::{AppController, ControllerOptions, OrderingPolicy};
pub use guard::{EntryPoint, GuardDecision, SessionGuard};
pub use telemetry::{init_logging, redact_sensitive};

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("SPAMGUARD_VERSION");

/// Shown when the service cannot be reached at all.
pub const NETWORK_ERROR_MESSAGE: &str = "Unable to reach the spam analysis service";

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// Wires one dispatcher, both clients and a controller over `store`.
///
/// # Errors
/// Returns [`AppError::Dispatch`] when the configured base URL is unusable.
pub fn connect(
    config: &AppConfig,
    transport: Arc<dyn HttpTransport>,
    store: Arc<dyn SessionStore>,
) -> Result<AppController, AppError> {
    let dispatcher = RequestDispatcher::new(config.api_url.as_str(), transport, store)?;
    Ok(AppController::new(
        AuthClient::new(dispatcher.clone()),
        AnalysisClient::new(dispatcher),
        APP_VERSION,
    ))
}

/// App integration error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Client-side precondition failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Auth subsystem error.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),
    /// Analysis subsystem error.
    #[error("analysis error: {0}")]
    Analysis(#[from] AnalysisError),
    /// Dispatcher construction or transport error.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
    /// Session store error.
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// Workflow phase machine rejected a step.
    #[error(transparent)]
    Workflow(#[from] IllegalTransition),
    /// An analysis is already in flight.
    #[error("an analysis is already in progress")]
    Busy,
    /// The operation needs a signed-in session.
    #[error("sign in required")]
    NotAuthenticated,
}

impl AppError {
    /// Text shown to the user; HTTP failures carry the server message as is.
    pub fn user_message(&self) -> String {
        match self {
            Self::Dispatch(error)
            | Self::Auth(AuthError::Dispatch(error))
            | Self::Analysis(AnalysisError::Dispatch(error)) => dispatch_message(error),
            Self::Validation(error)
            | Self::Auth(AuthError::Validation(error))
            | Self::Analysis(AnalysisError::Validation(error)) => error.to_string(),
            Self::Auth(AuthError::InvalidResponse(_)) | Self::Analysis(AnalysisError::Decode(_)) => {
                GENERIC_ERROR_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }
}

fn dispatch_message(error: &DispatchError) -> String {
    match error {
        DispatchError::Http { message, .. } => message.clone(),
        DispatchError::Network(_) => NETWORK_ERROR_MESSAGE.to_string(),
        _ => GENERIC_ERROR_MESSAGE.to_string(),
    }
}
