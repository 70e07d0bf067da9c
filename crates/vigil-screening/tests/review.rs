mod common;

use common::Harness;
use pretty_assertions::assert_eq;
use vigil_core::entities::ContinuousScreeningWithMatches;
use vigil_core::enums::{CaseEventType, MatchStatus, ScreeningStatus};
use vigil_core::errors::ErrorKind;
use vigil_core::counterparty_identifier;
use vigil_testkit::fixtures::{CUSTOMERS, WATCHLIST};
use vigil_testkit::{Permission, candidate};

/// A screening in review with three pending matches, Q1 ranked first.
async fn in_review(h: &Harness) -> ContinuousScreeningWithMatches {
    h.provider.set_results(
        WATCHLIST,
        vec![candidate("Q1", 0.95), candidate("Q2", 0.9), candidate("Q3", 0.85)],
    );
    let config = h.config().await;
    h.screen(&config, "c1", 0).await
}

fn statuses(screening: &ContinuousScreeningWithMatches) -> Vec<MatchStatus> {
    screening.matches.iter().map(|m| m.status).collect()
}

#[tokio::test]
async fn confirming_a_hit_skips_the_rest() {
    let h = Harness::new().await;
    let screening = in_review(&h).await;

    let reviewed = h
        .service
        .update_match_status(&h.creds, &screening.matches[1].id, MatchStatus::ConfirmedHit, false)
        .await
        .unwrap();
    assert_eq!(reviewed.screening.status, ScreeningStatus::ConfirmedHit);
    assert_eq!(
        statuses(&reviewed),
        vec![MatchStatus::Skipped, MatchStatus::ConfirmedHit, MatchStatus::Skipped]
    );
    assert_eq!(reviewed.matches[1].reviewed_by.as_deref(), Some("analyst-1"));

    let events = h.cases.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, CaseEventType::ScreeningReviewed);
    assert_eq!(events[0].new_value, "confirmed_hit");
    assert_eq!(events[0].resource_id, screening.screening.id);
}

#[tokio::test]
async fn last_rejection_closes_as_no_hit() {
    let h = Harness::new().await;
    let screening = in_review(&h).await;

    for (i, m) in screening.matches.iter().enumerate() {
        let reviewed = h
            .service
            .update_match_status(&h.creds, &m.id, MatchStatus::NoHit, false)
            .await
            .unwrap();
        let expected = if i + 1 == screening.matches.len() {
            ScreeningStatus::NoHit
        } else {
            ScreeningStatus::InReview
        };
        assert_eq!(reviewed.screening.status, expected);
    }
    assert_eq!(h.cases.events().len(), 1);
}

#[tokio::test]
async fn partial_screening_stays_in_review() {
    let h = Harness::new().await;
    h.provider.set_results(WATCHLIST, vec![candidate("Q1", 0.95)]);
    h.provider.set_total(WATCHLIST, 40);
    let config = h.config().await;
    let screening = h.screen(&config, "c1", 0).await;
    assert!(screening.screening.is_partial);

    let reviewed = h
        .service
        .update_match_status(&h.creds, &screening.matches[0].id, MatchStatus::NoHit, false)
        .await
        .unwrap();
    assert_eq!(reviewed.screening.status, ScreeningStatus::InReview);
    assert!(h.cases.events().is_empty());
}

#[tokio::test]
async fn reviewed_match_cannot_be_reviewed_again() {
    let h = Harness::new().await;
    let screening = in_review(&h).await;
    let first = &screening.matches[0].id;

    h.service
        .update_match_status(&h.creds, first, MatchStatus::NoHit, false)
        .await
        .unwrap();
    let err = h
        .service
        .update_match_status(&h.creds, first, MatchStatus::ConfirmedHit, false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnprocessableEntity);
}

#[tokio::test]
async fn only_terminal_statuses_can_be_set() {
    let h = Harness::new().await;
    let screening = in_review(&h).await;
    for status in [MatchStatus::Pending, MatchStatus::Skipped] {
        let err = h
            .service
            .update_match_status(&h.creds, &screening.matches[0].id, status, false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadParameter);
    }
}

#[tokio::test]
async fn screening_without_case_cannot_be_reviewed() {
    let h = Harness::new().await;
    h.provider.set_results(WATCHLIST, vec![candidate("Q1", 0.95)]);
    h.cases.fail_creation(true);
    let config = h.config().await;
    let err = h
        .service
        .create_continuous_screening_object(
            &h.creds,
            CUSTOMERS,
            &config.stable_id,
            vigil_screening::ObjectSource::Payload(vigil_testkit::fixtures::customer_payload(
                "c1", "Ivan", "Petrov", 0,
            )),
            false,
        )
        .await
        .unwrap_err();
    let vigil_screening::ScreeningError::CaseCreation { screening_id, .. } = err else {
        panic!("expected a case creation error, got {err:?}");
    };
    let stored = h.service.get_screening(&h.creds, &screening_id).await.unwrap();

    let err = h
        .service
        .update_match_status(&h.creds, &stored.matches[0].id, MatchStatus::NoHit, false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnprocessableEntity);
    assert!(err.to_string().contains("not in case"));
}

#[tokio::test]
async fn closed_screening_cannot_be_reviewed() {
    let h = Harness::new().await;
    let screening = in_review(&h).await;
    h.service
        .dismiss_continuous_screening(&h.creds, &screening.screening.id)
        .await
        .unwrap();

    let err = h
        .service
        .update_match_status(&h.creds, &screening.matches[0].id, MatchStatus::NoHit, false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnprocessableEntity);
    assert!(err.to_string().contains("not in review"));
}

#[tokio::test]
async fn dismissal_skips_pending_matches() {
    let h = Harness::new().await;
    let screening = in_review(&h).await;
    h.service
        .update_match_status(&h.creds, &screening.matches[0].id, MatchStatus::NoHit, false)
        .await
        .unwrap();

    let dismissed = h
        .service
        .dismiss_continuous_screening(&h.creds, &screening.screening.id)
        .await
        .unwrap();
    assert_eq!(dismissed.screening.status, ScreeningStatus::NoHit);
    assert_eq!(
        statuses(&dismissed),
        vec![MatchStatus::NoHit, MatchStatus::Skipped, MatchStatus::Skipped]
    );
    let events = h.cases.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, CaseEventType::ScreeningDismissed);
}

#[tokio::test]
async fn review_needs_permission() {
    let h = Harness::new().await;
    let screening = in_review(&h).await;
    h.access.deny(Permission::ReviewHits);
    let err = h
        .service
        .update_match_status(&h.creds, &screening.matches[0].id, MatchStatus::NoHit, false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn whitelisted_entity_is_excluded_from_later_screenings() {
    let h = Harness::new().await;
    let screening = in_review(&h).await;
    h.service
        .update_match_status(&h.creds, &screening.matches[0].id, MatchStatus::NoHit, true)
        .await
        .unwrap();

    let counterparty = counterparty_identifier(CUSTOMERS, "c1");
    let entries = h.service.list_whitelist(&h.creds, Some(&counterparty)).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entity_id, "Q1");
    assert_eq!(entries[0].reviewer_id.as_deref(), Some("analyst-1"));

    let config = h.service.list_configs(&h.creds).await.unwrap().remove(0);
    let rescreened = h.screen(&config, "c1", 10).await;
    let ids: Vec<&str> = rescreened
        .matches
        .iter()
        .map(|m| m.opensanctions_entity_id.as_str())
        .collect();
    assert_eq!(ids, vec!["Q2", "Q3"]);
    let last_search = h.provider.searches().pop().unwrap();
    assert_eq!(last_search.whitelisted_entity_ids, vec!["Q1".to_string()]);

    h.service.delete_whitelist_entry(&h.creds, &entries[0].id).await.unwrap();
    assert!(h.service.list_whitelist(&h.creds, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn whitelisting_needs_permission() {
    let h = Harness::new().await;
    let screening = in_review(&h).await;
    h.access.deny(Permission::WriteWhitelist);
    let err = h
        .service
        .update_match_status(&h.creds, &screening.matches[0].id, MatchStatus::NoHit, true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let reviewed = h
        .service
        .get_screening(&h.creds, &screening.screening.id)
        .await
        .unwrap();
    assert_eq!(reviewed.matches[0].status, MatchStatus::Pending);
}
