//! Integration tests for protected-view gating.

mod common;

use common::{fixture_user, harness, script_refresh, signed_in_harness};
use spamguard_app::{ControllerOptions, EntryPoint, GuardDecision, SessionGuard};
use spamguard_ui::WorkflowPhase;

#[tokio::test]
async fn session_guard_tests_redirects_and_fetches_nothing_without_session() {
    let harness = harness(ControllerOptions::default());

    let decision = harness.controller.enter_protected_view();
    harness.controller.wait_for_refreshes().await;

    assert_eq!(decision, GuardDecision::Redirect(EntryPoint::Login));
    assert_eq!(harness.controller.phase(), WorkflowPhase::Unauthenticated);
    assert_eq!(harness.transport.request_count(), 0);
}

#[tokio::test]
async fn session_guard_tests_entry_loads_history_and_stats_with_token() {
    let harness = signed_in_harness(ControllerOptions::default());
    script_refresh(&harness.transport, &[1, 2], 2, 1);

    let decision = harness.controller.enter_protected_view();
    harness.controller.wait_for_refreshes().await;

    assert_eq!(decision, GuardDecision::Proceed(Some(fixture_user())));
    let view = harness.controller.view();
    assert_eq!(view.phase(), WorkflowPhase::Idle);
    assert_eq!(view.user, Some(fixture_user()));
    assert_eq!(view.history.len(), 2);
    assert_eq!(view.stats.map(|stats| stats.total), Some(2));

    let requests = harness.transport.requests();
    assert_eq!(requests.len(), 2);
    for request in requests {
        assert_eq!(request.header("authorization").as_deref(), Some("Bearer jwt-fixture"));
    }
}

#[tokio::test]
async fn session_guard_tests_reentry_does_not_refetch() {
    let harness = signed_in_harness(ControllerOptions::default());
    script_refresh(&harness.transport, &[1], 1, 0);

    harness.controller.enter_protected_view();
    harness.controller.wait_for_refreshes().await;
    harness.controller.enter_protected_view();
    harness.controller.wait_for_refreshes().await;

    assert_eq!(harness.transport.request_count(), 2);
}

#[test]
fn session_guard_tests_check_is_presence_only() {
    let signed_out = harness(ControllerOptions::default());
    let guard = SessionGuard::new(EntryPoint::Register);
    assert_eq!(
        guard.check(signed_out.controller.auth()),
        GuardDecision::Redirect(EntryPoint::Register)
    );

    let signed_in = signed_in_harness(ControllerOptions::default());
    let decision = guard.check(signed_in.controller.auth());
    assert!(decision.allows_entry());
}
