//! Entity JSON roundtrip tests.

use chrono::Utc;
use pretty_assertions::assert_eq;

use vigil_core::entities::{
    ContinuousScreening, ContinuousScreeningWithMatches, ScreeningConfigUpdate, ScreeningMatch,
};
use vigil_core::enums::{MatchStatus, ScreeningStatus, TriggerType};

fn screening() -> ContinuousScreening {
    let now = Utc::now();
    ContinuousScreening {
        id: "scr-1".into(),
        org_id: "org-1".into(),
        config_id: "cfg-1".into(),
        config_stable_id: "stable-1".into(),
        case_id: None,
        object_type: "customers".into(),
        object_id: "c-1".into(),
        object_internal_id: "int-1".into(),
        trigger_type: TriggerType::ObjectAdded,
        status: ScreeningStatus::InReview,
        is_partial: false,
        number_of_matches: 2,
        search_input: serde_json::json!({"name": ["Jane"]}),
        opensanctions_entity_id: None,
        opensanctions_entity_payload: None,
        opensanctions_entity_enriched: false,
        created_at: now,
        updated_at: now,
    }
}

fn matched(id: &str, entity: &str, status: MatchStatus) -> ScreeningMatch {
    let now = Utc::now();
    ScreeningMatch {
        id: id.into(),
        screening_id: "scr-1".into(),
        opensanctions_entity_id: entity.into(),
        status,
        payload: serde_json::json!({"id": entity}),
        enriched: false,
        reviewed_by: None,
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn screening_roundtrip() {
    let original = screening();
    let json = serde_json::to_string(&original).unwrap();
    let recovered: ContinuousScreening = serde_json::from_str(&json).unwrap();
    assert_eq!(recovered, original);
}

#[test]
fn match_entity_ids_are_sorted_and_unique() {
    let with_matches = ContinuousScreeningWithMatches {
        screening: screening(),
        matches: vec![
            matched("m-1", "Q2", MatchStatus::Pending),
            matched("m-2", "Q1", MatchStatus::NoHit),
            matched("m-3", "Q2", MatchStatus::Pending),
        ],
    };
    assert_eq!(with_matches.match_entity_ids(), vec!["Q1", "Q2"]);
    assert_eq!(with_matches.pending_matches(), 2);
}

#[test]
fn config_update_serializes_changed_fields_only() {
    let update = ScreeningConfigUpdate {
        match_limit: Some(25),
        ..Default::default()
    };
    let json = serde_json::to_value(&update).unwrap();
    assert_eq!(json, serde_json::json!({"match_limit": 25}));
}
