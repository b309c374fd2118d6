//! Tests decoding of service payload shapes into the shared model.

use spamguard_core::{HistoryPage, StatsSnapshot, UserProfile};

#[test]
fn wire_shape_tests_decode_history_page_with_pagination() {
    let raw = r#"{
        "history": [{
            "id": 7,
            "text": "WIN A PRIZE NOW...",
            "full_text": "WIN A PRIZE NOW by clicking here",
            "isSpam": true,
            "confidence": 92.0,
            "indicators": ["urgent"],
            "flags": {"allCaps": true},
            "time": "10:42",
            "date": "2026-10-16",
            "analyzed_at": "2026-10-16T10:42:00"
        }],
        "pagination": {"page": 1, "per_page": 20, "total": 1, "pages": 1, "has_next": false, "has_prev": false}
    }"#;

    let page: HistoryPage = serde_json::from_str(raw).expect("history page should decode");
    assert_eq!(page.history.len(), 1);
    assert_eq!(page.history[0].id.as_str(), "7");
    assert!(page.history[0].is_spam);
    assert_eq!(page.pagination.expect("pagination present").per_page, 20);
}

#[test]
fn wire_shape_tests_decode_stats_without_recent_window() {
    let raw = r#"{"total":0,"spam":0,"legitimate":0,"spamRate":0,"averageConfidence":0}"#;
    let stats: StatsSnapshot = serde_json::from_str(raw).expect("stats should decode");
    assert_eq!(stats.total, 0);
    assert!(stats.recent.is_none());
}

#[test]
fn wire_shape_tests_user_profile_serializes_id_as_text() {
    let user: UserProfile =
        serde_json::from_str(r#"{"id":3,"name":"Ada","email":"ada@example.test"}"#)
            .expect("profile should decode");
    let encoded = serde_json::to_value(&user).expect("profile should encode");
    assert_eq!(encoded["id"], "3");
}
