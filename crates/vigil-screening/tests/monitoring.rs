mod common;

use common::Harness;
use pretty_assertions::assert_eq;
use vigil_core::enums::{DeltaOperation, MatchStatus, ScreeningStatus, TriggerType};
use vigil_core::errors::ErrorKind;
use vigil_core::ports::Ingester;
use vigil_db::ports::DbIngester;
use vigil_db::repos::{delta_tracks, monitored};
use vigil_screening::{ObjectSource, ScreeningError};
use vigil_testkit::fixtures::{CUSTOMERS, ORG, WATCHLIST, customer_payload, new_config};
use vigil_testkit::{Permission, candidate};

#[tokio::test]
async fn clean_object_is_no_hit_without_case() {
    let h = Harness::new().await;
    let config = h.config().await;

    let screening = h.screen(&config, "c1", 0).await;
    assert_eq!(screening.screening.status, ScreeningStatus::NoHit);
    assert_eq!(screening.screening.trigger_type, TriggerType::ObjectAdded);
    assert!(screening.matches.is_empty());
    assert!(screening.screening.case_id.is_none());
    assert!(h.cases.created().is_empty());
    assert!(h.enrichment.scheduled().is_empty());

    let searches = h.provider.searches();
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0].queries[0].entity_type, "Person");
    assert_eq!(
        searches[0].queries[0].filters.get("lastName"),
        Some(&vec!["Petrov".to_string()])
    );
}

#[tokio::test]
async fn matches_open_a_case() {
    let h = Harness::new().await;
    h.provider
        .set_results(WATCHLIST, vec![candidate("Q2", 0.81), candidate("Q1", 0.93)]);
    let config = h.config().await;

    let screening = h.screen(&config, "c1", 0).await;
    assert_eq!(screening.screening.status, ScreeningStatus::InReview);
    assert_eq!(screening.screening.number_of_matches, 2);
    assert_eq!(screening.matches[0].opensanctions_entity_id, "Q1");
    assert!(screening.matches.iter().all(|m| m.status == MatchStatus::Pending));

    let created = h.cases.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].name, "Petrov Ivan");
    assert_eq!(created[0].inbox_id, config.inbox_id);
    assert_eq!(created[0].match_ids.len(), 2);
    assert_eq!(h.cases.side_effects().len(), 1);

    let stored = h
        .service
        .get_screening(&h.creds, &screening.screening.id)
        .await
        .unwrap();
    assert_eq!(stored.screening.case_id, screening.screening.case_id);
    assert!(stored.screening.case_id.is_some());
}

#[tokio::test]
async fn first_screening_with_matches_schedules_enrichment() {
    let h = Harness::new().await;
    h.provider.set_results(WATCHLIST, vec![candidate("Q1", 0.93)]);
    let config = h.config().await;

    let screening = h.screen(&config, "c1", 0).await;
    assert_eq!(h.enrichment.scheduled(), vec![screening.screening.id.clone()]);

    // Scheduled only once the screening is readable.
    let stored = h
        .service
        .get_screening(&h.creds, &h.enrichment.scheduled()[0])
        .await
        .unwrap();
    assert_eq!(stored.matches.len(), 1);
}

#[tokio::test]
async fn failed_case_creation_keeps_the_screening() {
    let h = Harness::new().await;
    h.provider.set_results(WATCHLIST, vec![candidate("Q1", 0.9)]);
    h.cases.fail_creation(true);
    let config = h.config().await;

    let err = h
        .service
        .create_continuous_screening_object(
            &h.creds,
            CUSTOMERS,
            &config.stable_id,
            ObjectSource::Payload(customer_payload("c1", "Ivan", "Petrov", 0)),
            false,
        )
        .await
        .unwrap_err();
    let ScreeningError::CaseCreation { screening_id, .. } = err else {
        panic!("expected a case creation error, got {err:?}");
    };

    let stored = h.service.get_screening(&h.creds, &screening_id).await.unwrap();
    assert_eq!(stored.screening.status, ScreeningStatus::InReview);
    assert!(stored.screening.case_id.is_none());
    assert_eq!(h.enrichment.scheduled(), vec![screening_id]);
}

#[tokio::test]
async fn stale_payload_conflicts_and_monitors_nothing() {
    let h = Harness::new().await;
    let config = h.config().await;
    DbIngester::new(h.db.clone())
        .ingest_object(ORG, CUSTOMERS, &customer_payload("c1", "Ivan", "Petrov", 10))
        .await
        .unwrap();

    let err = h
        .service
        .create_continuous_screening_object(
            &h.creds,
            CUSTOMERS,
            &config.stable_id,
            ObjectSource::Payload(customer_payload("c1", "Ivan", "Petrov", 5)),
            false,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let conn = h.db.org(ORG).await.unwrap();
    assert!(monitored::list_for_object(&conn, CUSTOMERS, "c1").await.unwrap().is_empty());
    assert!(h.provider.searches().is_empty());
}

#[tokio::test]
async fn existing_object_can_be_monitored_once() {
    let h = Harness::new().await;
    let config = h.config().await;
    DbIngester::new(h.db.clone())
        .ingest_object(ORG, CUSTOMERS, &customer_payload("c1", "Ivan", "Petrov", 0))
        .await
        .unwrap();

    let by_id = || {
        h.service.create_continuous_screening_object(
            &h.creds,
            CUSTOMERS,
            &config.stable_id,
            ObjectSource::ObjectId("c1".into()),
            false,
        )
    };
    assert!(by_id().await.unwrap().is_some());
    let err = by_id().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn newer_payload_rescreens_a_monitored_object() {
    let h = Harness::new().await;
    let config = h.config().await;
    let first = h.screen(&config, "c1", 0).await;
    let second = h.screen(&config, "c1", 30).await;
    assert_ne!(first.screening.object_internal_id, second.screening.object_internal_id);

    let conn = h.db.org(ORG).await.unwrap();
    assert_eq!(monitored::list_for_object(&conn, CUSTOMERS, "c1").await.unwrap().len(), 1);
    let tracks = delta_tracks::list_for_object(&conn, CUSTOMERS, "c1").await.unwrap();
    let operations: Vec<DeltaOperation> = tracks.iter().map(|t| t.operation).collect();
    assert_eq!(operations, vec![DeltaOperation::Add, DeltaOperation::Update]);
    assert_eq!(tracks[0].entity_id, tracks[1].entity_id);
}

#[tokio::test]
async fn skip_screen_still_tracks_the_object() {
    let h = Harness::new().await;
    let config = h.config().await;

    let result = h
        .service
        .create_continuous_screening_object(
            &h.creds,
            CUSTOMERS,
            &config.stable_id,
            ObjectSource::Payload(customer_payload("c1", "Ivan", "Petrov", 0)),
            true,
        )
        .await
        .unwrap();
    assert!(result.is_none());
    assert!(h.provider.searches().is_empty());

    let conn = h.db.org(ORG).await.unwrap();
    assert_eq!(monitored::list_for_object(&conn, CUSTOMERS, "c1").await.unwrap().len(), 1);
    let tracks = delta_tracks::list_for_object(&conn, CUSTOMERS, "c1").await.unwrap();
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].operation, DeltaOperation::Add);
}

#[tokio::test]
async fn uncovered_object_type_is_rejected() {
    let h = Harness::new().await;
    let config = h.config().await;
    let err = h
        .service
        .create_continuous_screening_object(
            &h.creds,
            "vessels",
            &config.stable_id,
            ObjectSource::ObjectId("v1".into()),
            false,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadParameter);
}

#[tokio::test]
async fn monitoring_needs_permission() {
    let h = Harness::new().await;
    let config = h.config().await;
    h.access.deny(Permission::WriteMonitoring);
    let err = h
        .service
        .create_continuous_screening_object(
            &h.creds,
            CUSTOMERS,
            &config.stable_id,
            ObjectSource::Payload(customer_payload("c1", "Ivan", "Petrov", 0)),
            false,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn last_monitoring_removal_deletes_the_entity() {
    let h = Harness::new().await;
    let first = h.config().await;
    let second = h
        .service
        .create_config(&h.creds, new_config(ORG, &[CUSTOMERS]))
        .await
        .unwrap();
    h.screen(&first, "c1", 0).await;
    h.service
        .create_continuous_screening_object(
            &h.creds,
            CUSTOMERS,
            &second.stable_id,
            ObjectSource::ObjectId("c1".into()),
            true,
        )
        .await
        .unwrap();

    h.service
        .delete_continuous_screening_object(&h.creds, CUSTOMERS, "c1", &first.stable_id)
        .await
        .unwrap();
    {
        let conn = h.db.org(ORG).await.unwrap();
        let latest = delta_tracks::latest_for_object(&conn, CUSTOMERS, "c1").await.unwrap().unwrap();
        assert_eq!(latest.operation, DeltaOperation::Add);
    }

    h.service
        .delete_continuous_screening_object(&h.creds, CUSTOMERS, "c1", &second.stable_id)
        .await
        .unwrap();
    let conn = h.db.org(ORG).await.unwrap();
    let tracks = delta_tracks::list_for_object(&conn, CUSTOMERS, "c1").await.unwrap();
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[1].operation, DeltaOperation::Delete);
    assert_eq!(tracks[1].entity_id, tracks[0].entity_id);
    assert!(tracks[1].object_internal_id.is_none());
}

#[tokio::test]
async fn removing_unknown_monitoring_is_not_found() {
    let h = Harness::new().await;
    let config = h.config().await;
    let err = h
        .service
        .delete_continuous_screening_object(&h.creds, CUSTOMERS, "nobody", &config.stable_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn screenings_are_listed_newest_first() {
    let h = Harness::new().await;
    let config = h.config().await;
    let first = h.screen(&config, "c1", 0).await;
    let second = h.screen(&config, "c1", 5).await;

    let listed = h
        .service
        .list_screenings_for_object(&h.creds, CUSTOMERS, "c1")
        .await
        .unwrap();
    let ids: Vec<&str> = listed.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec![second.screening.id.as_str(), first.screening.id.as_str()]);
}
