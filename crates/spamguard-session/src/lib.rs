#![warn(missing_docs)]
//! # spamguard-session
//!
//! ## Purpose
//! Holds the current authentication token and user profile.
//!
//! ## Responsibilities
//! - Define the injectable [`SessionStore`] seam shared by every component
//!   that needs credentials.
//! - Provide a process-local [`MemorySessionStore`].
//! - Provide a durable [`FileSessionStore`], scoped per API origin, that
//!   survives restarts.
//!
//! ## Data flow
//! `AuthClient` writes a [`Session`] after login/register -> the dispatcher
//! reads [`SessionStore::token`] for every request -> logout clears it.
//!
//! ## Ownership and lifetimes
//! Stores are shared as `Arc<dyn SessionStore>`. Reads return owned clones so
//! no lock is held across an await point.
//!
//! ## Error model
//! Only durable writes can fail; they surface as [`SessionError`]. Unreadable
//! persisted state is treated as "no session".
//!
//! ## Security and privacy notes
//! There is no expiry tracking: a token stays present until cleared, even if
//! the service has already invalidated it. Token values are never logged.
//!
//! ## Example
//! ```rust
//! use spamguard_session::{MemorySessionStore, SessionStore};
//!
//! let store = MemorySessionStore::new();
//! assert!(store.token().is_none());
//! ```

use std::fs::{self, File};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use spamguard_core::{Session, UserProfile};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

/// File name holding the persisted keys inside an origin directory.
pub const SESSION_FILE_NAME: &str = "session.json";

/// Holder of the current authentication state.
///
/// `save` replaces token and user together; `clear` removes both.
pub trait SessionStore: Send + Sync {
    /// Persists token and user atomically.
    ///
    /// # Errors
    /// Returns [`SessionError`] when durable persistence fails. The in-memory
    /// view is left unchanged in that case.
    fn save(&self, session: Session) -> Result<(), SessionError>;

    /// Returns the full session, if any.
    fn session(&self) -> Option<Session>;

    /// Removes token and user.
    ///
    /// # Errors
    /// Returns [`SessionError`] when durable state cannot be removed.
    fn clear(&self) -> Result<(), SessionError>;

    /// Returns the current bearer token.
    fn token(&self) -> Option<String> {
        self.session().map(|session| session.token)
    }

    /// Returns the cached user profile.
    fn user(&self) -> Option<UserProfile> {
        self.session().map(|session| session.user)
    }
}

/// Process-local session store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    current: RwLock<Option<Session>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: Session) -> Result<(), SessionError> {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
        Ok(())
    }

    fn session(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// On-disk layout: two keys, the user serialized as JSON text.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedKeys {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user: Option<String>,
}

/// Durable session store scoped to one API origin.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    current: RwLock<Option<Session>>,
}

impl FileSessionStore {
    /// Opens the store for `origin` under `root`, loading any persisted session.
    ///
    /// # Errors
    /// Returns [`SessionError::Io`] when the origin directory cannot be created.
    pub fn init(root: impl AsRef<Path>, origin: &Url) -> Result<Self, SessionError> {
        let dir = root.as_ref().join(origin_key(origin));
        fs::create_dir_all(&dir)?;

        let path = dir.join(SESSION_FILE_NAME);
        let loaded = load_session(&path);
        info!(
            stage = "session",
            action = "init",
            origin = %origin_key(origin),
            restored = loaded.is_some(),
            "session store opened"
        );

        Ok(Self {
            path,
            current: RwLock::new(loaded),
        })
    }

    /// Clears persisted keys and releases the store.
    ///
    /// # Errors
    /// Returns [`SessionError::Io`] when the session file cannot be removed.
    pub fn destroy(self) -> Result<(), SessionError> {
        self.clear()?;
        if let Some(dir) = self.path.parent() {
            // Leaves the directory in place when something else lives there.
            let _ = fs::remove_dir(dir);
        }
        info!(stage = "session", action = "destroy", "session store destroyed");
        Ok(())
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_keys(&self, keys: &PersistedKeys) -> Result<(), SessionError> {
        let encoded = serde_json::to_vec_pretty(keys).map_err(SessionError::Encode)?;
        let tmp_path = self.path.with_extension("json.tmp");

        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(&encoded)?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, session: Session) -> Result<(), SessionError> {
        let user = serde_json::to_string(&session.user).map_err(SessionError::Encode)?;
        self.write_keys(&PersistedKeys {
            token: Some(session.token.clone()),
            user: Some(user),
        })?;

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
        Ok(())
    }

    fn session(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(SessionError::Io(error)),
        }
    }
}

/// Directory name for an API origin (`scheme_host_port`).
pub fn origin_key(origin: &Url) -> String {
    let host = origin.host_str().unwrap_or("local");
    let port = origin
        .port_or_known_default()
        .map(|port| port.to_string())
        .unwrap_or_default();

    format!("{}_{}_{}", origin.scheme(), host, port)
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' { ch } else { '_' })
        .collect()
}

fn load_session(path: &Path) -> Option<Session> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return None,
        Err(error) => {
            warn!(stage = "session", action = "load", %error, "session file unreadable");
            return None;
        }
    };

    let keys: PersistedKeys = match serde_json::from_str(&raw) {
        Ok(keys) => keys,
        Err(error) => {
            warn!(stage = "session", action = "load", %error, "session file corrupt");
            return None;
        }
    };

    let (Some(token), Some(user)) = (keys.token, keys.user) else {
        return None;
    };

    match serde_json::from_str::<UserProfile>(&user) {
        Ok(user) => Some(Session { token, user }),
        Err(error) => {
            warn!(stage = "session", action = "load", %error, "persisted user unreadable");
            None
        }
    }
}

/// Session persistence errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Filesystem failure.
    #[error("session storage i/o failure: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization failure.
    #[error("session encode failure: {0}")]
    Encode(serde_json::Error),
}

#[cfg(test)]
mod tests {
    //! Unit tests for store semantics.

    use spamguard_core::RecordId;

    use super::*;

    fn session(token: &str) -> Session {
        Session {
            token: token.to_string(),
            user: UserProfile {
                id: RecordId::from(1),
                name: "Ada".to_string(),
                email: "ada@example.test".to_string(),
            },
        }
    }

    #[test]
    fn memory_store_saves_and_clears_both_keys() {
        let store = MemorySessionStore::new();
        store.save(session("t1")).expect("save should work");
        assert_eq!(store.token().as_deref(), Some("t1"));
        assert_eq!(store.user().map(|user| user.name), Some("Ada".to_string()));

        store.clear().expect("clear should work");
        assert!(store.token().is_none());
        assert!(store.user().is_none());
    }

    #[test]
    fn origin_key_is_filesystem_safe() {
        let origin = Url::parse("http://localhost:5000/api").expect("url should parse");
        assert_eq!(origin_key(&origin), "http_localhost_5000");
    }
}
