//! Integration tests for the durable, origin-scoped session store.

use spamguard_core::{RecordId, Session, UserProfile};
use spamguard_session::{FileSessionStore, SESSION_FILE_NAME, SessionStore};
use url::Url;

fn fixture_session() -> Session {
    Session {
        token: "token-abc".to_string(),
        user: UserProfile {
            id: RecordId::from(42),
            name: "Grace".to_string(),
            email: "grace@example.test".to_string(),
        },
    }
}

fn origin(raw: &str) -> Url {
    Url::parse(raw).expect("origin should parse")
}

#[test]
fn file_store_tests_session_survives_reopen() {
    let root = tempfile::tempdir().expect("tempdir should be created");
    let api = origin("http://localhost:5000/api");

    let store = FileSessionStore::init(root.path(), &api).expect("store should open");
    store.save(fixture_session()).expect("save should persist");
    drop(store);

    let reopened = FileSessionStore::init(root.path(), &api).expect("store should reopen");
    assert_eq!(reopened.session(), Some(fixture_session()));
}

#[test]
fn file_store_tests_scopes_sessions_per_origin() {
    let root = tempfile::tempdir().expect("tempdir should be created");

    let first = FileSessionStore::init(root.path(), &origin("http://localhost:5000/api"))
        .expect("first store should open");
    first.save(fixture_session()).expect("save should persist");

    let second = FileSessionStore::init(root.path(), &origin("https://api.example.test/api"))
        .expect("second store should open");
    assert!(second.token().is_none());
}

#[test]
fn file_store_tests_clear_removes_both_keys() {
    let root = tempfile::tempdir().expect("tempdir should be created");
    let api = origin("http://localhost:5000/api");

    let store = FileSessionStore::init(root.path(), &api).expect("store should open");
    store.save(fixture_session()).expect("save should persist");
    store.clear().expect("clear should succeed");
    assert!(!store.path().exists());

    let reopened = FileSessionStore::init(root.path(), &api).expect("store should reopen");
    assert!(reopened.token().is_none());
    assert!(reopened.user().is_none());
}

#[test]
fn file_store_tests_corrupt_file_reads_as_absent() {
    let root = tempfile::tempdir().expect("tempdir should be created");
    let api = origin("http://localhost:5000/api");

    let store = FileSessionStore::init(root.path(), &api).expect("store should open");
    let path = store.path().to_path_buf();
    drop(store);
    std::fs::write(&path, "{not json").expect("corrupt file should be written");

    let reopened = FileSessionStore::init(root.path(), &api).expect("store should reopen");
    assert!(reopened.session().is_none());
    assert_eq!(path.file_name().and_then(|name| name.to_str()), Some(SESSION_FILE_NAME));
}

#[test]
fn file_store_tests_destroy_leaves_nothing_behind() {
    let root = tempfile::tempdir().expect("tempdir should be created");
    let api = origin("http://localhost:5000/api");

    let store = FileSessionStore::init(root.path(), &api).expect("store should open");
    store.save(fixture_session()).expect("save should persist");
    let dir = store.path().parent().expect("store has a directory").to_path_buf();
    store.destroy().expect("destroy should succeed");

    assert!(!dir.exists());
}
