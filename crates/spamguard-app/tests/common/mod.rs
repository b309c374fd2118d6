//! Shared fixtures for app integration tests.

use std::sync::Arc;

use reqwest::Method;
use serde_json::{Value, json};
use spamguard_analysis::{HISTORY_PATH, STATS_PATH};
use spamguard_app::config::SESSION_DIR_VAR;
use spamguard_app::{AppConfig, AppController, ControllerOptions, connect};
use spamguard_core::{RecordId, Session, UserProfile};
use spamguard_dispatch::testing::ScriptedTransport;
use spamguard_session::{MemorySessionStore, SessionStore};

/// Controller wired to a scripted transport and an in-memory store.
#[allow(dead_code)]
pub struct Harness {
    /// Controller under test.
    pub controller: AppController,
    /// Scripted network.
    pub transport: Arc<ScriptedTransport>,
    /// Session store shared with the controller.
    pub store: Arc<MemorySessionStore>,
}

/// Configuration pointing at the default local service.
#[allow(dead_code)]
pub fn fixture_config() -> AppConfig {
    AppConfig::from_lookup(|key| (key == SESSION_DIR_VAR).then(|| "/tmp/spamguard-tests".to_string()))
        .expect("fixture config should build")
}

/// Builds a signed-out harness.
#[allow(dead_code)]
pub fn harness(options: ControllerOptions) -> Harness {
    let transport = Arc::new(ScriptedTransport::new());
    let store = Arc::new(MemorySessionStore::new());
    let controller = connect(&fixture_config(), transport.clone(), store.clone())
        .expect("controller should build")
        .with_options(options);
    Harness {
        controller,
        transport,
        store,
    }
}

/// Builds a harness whose store already holds [`fixture_session`].
///
/// The protected view is not entered yet so refresh replies can be scripted
/// first.
#[allow(dead_code)]
pub fn signed_in_harness(options: ControllerOptions) -> Harness {
    let harness = harness(options);
    harness
        .store
        .save(fixture_session())
        .expect("memory store should save");
    harness
}

/// Deterministic signed-in user.
#[allow(dead_code)]
pub fn fixture_user() -> UserProfile {
    UserProfile {
        id: RecordId::from(7),
        name: "Ada".to_string(),
        email: "ada@example.test".to_string(),
    }
}

/// Deterministic session for [`fixture_user`].
#[allow(dead_code)]
pub fn fixture_session() -> Session {
    Session {
        token: "jwt-fixture".to_string(),
        user: fixture_user(),
    }
}

/// Analyze response body.
#[allow(dead_code)]
pub fn verdict_json(is_spam: bool, confidence: f64) -> Value {
    json!({
        "isSpam": is_spam,
        "confidence": confidence,
        "indicators": ["urgent"],
        "flags": {"allCaps": true},
    })
}

/// History page body with one entry per id.
#[allow(dead_code)]
pub fn history_json(ids: &[u64]) -> Value {
    let entries: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "text": format!("message {id}"),
                "isSpam": id % 2 == 0,
                "confidence": 70.0,
                "time": "09:30",
            })
        })
        .collect();
    json!({
        "history": entries,
        "pagination": {
            "page": 1,
            "per_page": 20,
            "total": ids.len(),
            "pages": 1,
            "has_next": false,
            "has_prev": false,
        },
    })
}

/// Stats envelope body.
#[allow(dead_code)]
pub fn stats_json(total: u64, spam: u64) -> Value {
    json!({
        "stats": {
            "total": total,
            "spam": spam,
            "legitimate": total - spam,
            "spamRate": if total == 0 { 0.0 } else { spam as f64 * 100.0 / total as f64 },
            "averageConfidence": 75.0,
        }
    })
}

/// Scripts successful history and stats replies.
#[allow(dead_code)]
pub fn script_refresh(transport: &ScriptedTransport, ids: &[u64], total: u64, spam: u64) {
    transport.reply(Method::GET, HISTORY_PATH, 200, history_json(ids));
    transport.reply(Method::GET, STATS_PATH, 200, stats_json(total, spam));
}
