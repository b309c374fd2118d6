//! Integration tests for the analyze-then-refresh workflow.

mod common;

use std::time::Duration;

use common::{harness, script_refresh, signed_in_harness, verdict_json};
use reqwest::Method;
use serde_json::json;
use spamguard_analysis::ANALYZE_PATH;
use spamguard_app::{AppError, ControllerOptions, app_version};
use spamguard_auth::{LOGIN_PATH, REGISTER_PATH, RegistrationForm};
use spamguard_core::ValidationError;
use spamguard_session::SessionStore;
use spamguard_ui::{ViewState, WorkflowPhase};

#[tokio::test]
async fn workflow_tests_verdict_replaces_view_and_reenables_submit() {
    let harness = signed_in_harness(ControllerOptions::default());
    script_refresh(&harness.transport, &[1, 2], 2, 1);
    harness.controller.enter_protected_view();
    harness.controller.wait_for_refreshes().await;

    harness
        .transport
        .reply(Method::POST, ANALYZE_PATH, 200, verdict_json(true, 92.0));
    script_refresh(&harness.transport, &[1, 2, 3], 3, 2);

    harness
        .controller
        .submit("URGENT: claim your prize")
        .await
        .expect("analysis should succeed");
    harness.controller.wait_for_refreshes().await;

    let view = harness.controller.view();
    let verdict = serde_json::to_value(view.last_result.as_ref().expect("verdict present"))
        .expect("verdict should serialize");
    assert_eq!(verdict, verdict_json(true, 92.0));
    assert!(harness.controller.can_submit());
    assert_eq!(view.phase(), WorkflowPhase::Idle);
    assert_eq!(view.history.len(), 3);
    assert_eq!(view.stats.as_ref().map(|stats| stats.spam), Some(2));

    let sent = harness
        .transport
        .requests()
        .into_iter()
        .find(|request| request.method == Method::POST)
        .expect("analyze request recorded");
    assert_eq!(sent.body, Some(json!({"text": "URGENT: claim your prize"})));
}

#[tokio::test]
async fn workflow_tests_blank_text_changes_nothing() {
    let harness = signed_in_harness(ControllerOptions::default());
    script_refresh(&harness.transport, &[1], 1, 0);
    harness.controller.enter_protected_view();
    harness.controller.wait_for_refreshes().await;

    let before = harness.controller.view();
    let requests_before = harness.transport.request_count();

    for text in ["", "   ", "\n\t "] {
        let error = harness
            .controller
            .submit(text)
            .await
            .expect_err("blank text must be rejected");
        assert!(matches!(error, AppError::Validation(ValidationError::EmptyText)));
    }

    assert_eq!(harness.controller.view(), before);
    assert_eq!(harness.transport.request_count(), requests_before);
}

#[tokio::test]
async fn workflow_tests_failure_discards_verdict_and_shows_server_message() {
    let harness = signed_in_harness(ControllerOptions::default());
    harness.controller.enter_protected_view();
    harness
        .transport
        .reply(Method::POST, ANALYZE_PATH, 200, verdict_json(false, 12.0));
    harness
        .transport
        .reply(Method::POST, ANALYZE_PATH, 503, json!({"error": "Model unavailable"}));

    harness
        .controller
        .submit("lunch at noon?")
        .await
        .expect("first analysis should succeed");
    let error = harness
        .controller
        .submit("lunch at one?")
        .await
        .expect_err("second analysis should fail");

    assert_eq!(error.user_message(), "Model unavailable");
    let view = harness.controller.view();
    assert!(view.last_result.is_none());
    assert_eq!(view.error_message.as_deref(), Some("Model unavailable"));
    assert_eq!(view.phase(), WorkflowPhase::Idle);
    assert!(view.can_submit());
}

#[tokio::test]
async fn workflow_tests_network_failure_reenables_submit() {
    let harness = signed_in_harness(ControllerOptions::default());
    harness.controller.enter_protected_view();
    harness
        .transport
        .fail(Method::POST, ANALYZE_PATH, "connection reset");

    let error = harness
        .controller
        .submit("hello")
        .await
        .expect_err("analysis should fail");

    assert!(matches!(error, AppError::Analysis(_)));
    assert!(harness.controller.can_submit());
    assert!(harness.controller.view().error_message.is_some());
}

#[tokio::test(start_paused = true)]
async fn workflow_tests_second_submission_is_rejected_while_analyzing() {
    let harness = signed_in_harness(ControllerOptions::default());
    harness.controller.enter_protected_view();
    harness.transport.reply_after(
        Method::POST,
        ANALYZE_PATH,
        Duration::from_millis(100),
        200,
        verdict_json(true, 81.0),
    );

    let (first, second) = tokio::join!(
        harness.controller.submit("first"),
        harness.controller.submit("second"),
    );

    assert!(first.is_ok());
    assert!(matches!(second, Err(AppError::Busy)));
    assert_eq!(harness.transport.count_for(Method::POST, ANALYZE_PATH), 1);
    assert!(harness.controller.can_submit());
}

#[tokio::test]
async fn workflow_tests_submit_requires_protected_view() {
    let harness = harness(ControllerOptions::default());

    let error = harness
        .controller
        .submit("hello")
        .await
        .expect_err("signed-out submit must fail");

    assert!(matches!(error, AppError::NotAuthenticated));
    assert_eq!(harness.transport.request_count(), 0);
}

#[tokio::test]
async fn workflow_tests_logout_clears_everything_without_network() {
    let harness = signed_in_harness(ControllerOptions::default());
    script_refresh(&harness.transport, &[1, 2], 2, 1);
    harness.controller.enter_protected_view();
    harness
        .transport
        .reply(Method::POST, ANALYZE_PATH, 200, verdict_json(true, 92.0));
    harness
        .controller
        .submit("WIN NOW")
        .await
        .expect("analysis should succeed");
    harness.controller.wait_for_refreshes().await;
    let requests_before = harness.transport.request_count();

    harness.controller.logout().expect("logout should succeed");

    assert_eq!(harness.controller.view(), ViewState::new(app_version()));
    assert!(harness.store.token().is_none());
    assert!(!harness.controller.auth().is_authenticated());
    assert_eq!(harness.transport.request_count(), requests_before);
}

#[tokio::test]
async fn workflow_tests_login_enters_idle_and_refreshes() {
    let harness = harness(ControllerOptions::default());
    harness.transport.reply(
        Method::POST,
        LOGIN_PATH,
        200,
        json!({
            "message": "Login successful",
            "user": {"id": 7, "name": "Ada", "email": "ada@example.test"},
            "access_token": "jwt-login",
        }),
    );
    script_refresh(&harness.transport, &[4], 1, 1);

    harness
        .controller
        .login("ada@example.test", "hunter22")
        .await
        .expect("login should succeed");
    harness.controller.wait_for_refreshes().await;

    let view = harness.controller.view();
    assert_eq!(view.phase(), WorkflowPhase::Idle);
    assert_eq!(view.user.map(|user| user.name), Some("Ada".to_string()));
    assert_eq!(view.history.len(), 1);
    assert_eq!(harness.store.token().as_deref(), Some("jwt-login"));
}

#[tokio::test]
async fn workflow_tests_failed_login_shows_message_and_stays_signed_out() {
    let harness = harness(ControllerOptions::default());
    harness.transport.reply(
        Method::POST,
        LOGIN_PATH,
        401,
        json!({"error": "Invalid email or password"}),
    );

    let error = harness
        .controller
        .login("ada@example.test", "wrong-pass")
        .await
        .expect_err("login should fail");

    assert_eq!(error.user_message(), "Invalid email or password");
    let view = harness.controller.view();
    assert_eq!(view.phase(), WorkflowPhase::Unauthenticated);
    assert_eq!(view.error_message.as_deref(), Some("Invalid email or password"));
}

#[tokio::test]
async fn workflow_tests_pending_registration_stays_signed_out() {
    let harness = harness(ControllerOptions::default());
    harness.transport.reply(
        Method::POST,
        REGISTER_PATH,
        201,
        json!({"message": "Registration received"}),
    );
    let form = RegistrationForm {
        name: "Ada".to_string(),
        email: "ada@example.test".to_string(),
        password: "hunter22".to_string(),
        confirm_password: "hunter22".to_string(),
    };

    let response = harness
        .controller
        .register(&form)
        .await
        .expect("registration should succeed");
    harness.controller.wait_for_refreshes().await;

    assert_eq!(response.message.as_deref(), Some("Registration received"));
    assert_eq!(harness.controller.phase(), WorkflowPhase::Unauthenticated);
    assert_eq!(harness.transport.request_count(), 1);
}
