mod common;

use common::Harness;
use pretty_assertions::assert_eq;
use serde_json::json;
use vigil_core::enums::{DeltaOperation, ScreeningStatus, TriggerType};
use vigil_db::repos::delta_tracks;
use vigil_testkit::fixtures::{CUSTOMERS, ORG, WATCHLIST};
use vigil_testkit::{FakeProvider, candidate};
use vigil_worker::{Job, Rescreen, WorkerSettings};

#[tokio::test]
async fn only_monitored_objects_are_rescreened() {
    let h = Harness::new().await;
    let config = h.config().await;
    h.monitor(&config, "c1").await;
    h.touch("c2", 1).await;

    let queued = h
        .worker
        .evaluate_need(ORG, CUSTOMERS, &["c1".into(), "c2".into()])
        .await
        .unwrap();
    assert_eq!(queued, 1);
    assert_eq!(
        h.queue.snapshot().await,
        vec![Job::DoScreening {
            org_id: ORG.into(),
            monitoring_id: h.monitoring_id(&config, "c1").await,
            trigger: TriggerType::ObjectUpdated,
        }]
    );
}

#[tokio::test]
async fn uncovered_object_type_needs_nothing() {
    let h = Harness::new().await;
    h.config().await;
    let queued = h
        .worker
        .evaluate_need(ORG, "vessels", &["v1".into()])
        .await
        .unwrap();
    assert_eq!(queued, 0);
    assert!(h.queue.is_empty().await);
}

#[tokio::test]
async fn already_screened_version_is_not_rescreened() {
    let h = Harness::new().await;
    let config = h.config().await;
    h.monitor(&config, "c1").await;
    let monitoring_id = h.monitoring_id(&config, "c1").await;

    let outcome = h
        .worker
        .do_screening(ORG, &monitoring_id, TriggerType::ObjectUpdated)
        .await
        .unwrap();
    assert_eq!(outcome, Rescreen::UpToDate);
    assert_eq!(h.provider.searches().len(), 1);
}

#[tokio::test]
async fn newer_version_is_rescreened_and_tracked() {
    let h = Harness::new().await;
    let config = h.config().await;
    h.monitor(&config, "c1").await;
    h.touch("c1", 1).await;
    let monitoring_id = h.monitoring_id(&config, "c1").await;

    let Rescreen::Screened { screening, .. } = h
        .worker
        .do_screening(ORG, &monitoring_id, TriggerType::ObjectUpdated)
        .await
        .unwrap()
    else {
        panic!("expected a screening");
    };
    assert_eq!(screening.screening.trigger_type, TriggerType::ObjectUpdated);
    assert_eq!(screening.screening.status, ScreeningStatus::NoHit);

    let conn = h.db.org(ORG).await.unwrap();
    let operations: Vec<DeltaOperation> = delta_tracks::list_for_object(&conn, CUSTOMERS, "c1")
        .await
        .unwrap()
        .iter()
        .map(|t| t.operation)
        .collect();
    assert_eq!(operations, vec![DeltaOperation::Add, DeltaOperation::Update]);
}

#[tokio::test]
async fn unchanged_matches_do_not_open_a_second_case() {
    let h = Harness::new().await;
    h.provider.set_results(WATCHLIST, vec![candidate("Q1", 0.9)]);
    let config = h.config().await;
    h.monitor(&config, "c1").await;
    assert_eq!(h.cases.created().len(), 1);
    let monitoring_id = h.monitoring_id(&config, "c1").await;

    h.touch("c1", 1).await;
    let Rescreen::Screened { case_suppressed, .. } = h
        .worker
        .do_screening(ORG, &monitoring_id, TriggerType::ObjectUpdated)
        .await
        .unwrap()
    else {
        panic!("expected a screening");
    };
    assert!(case_suppressed);
    assert_eq!(h.cases.created().len(), 1);

    h.provider
        .set_results(WATCHLIST, vec![candidate("Q1", 0.9), candidate("Q2", 0.8)]);
    h.touch("c1", 2).await;
    let Rescreen::Screened {
        screening,
        case_suppressed,
    } = h
        .worker
        .do_screening(ORG, &monitoring_id, TriggerType::ObjectUpdated)
        .await
        .unwrap()
    else {
        panic!("expected a screening");
    };
    assert!(!case_suppressed);
    assert!(screening.screening.case_id.is_some());
    assert_eq!(h.cases.created().len(), 2);
}

#[tokio::test]
async fn removed_monitoring_is_skipped() {
    let h = Harness::new().await;
    let outcome = h
        .worker
        .do_screening(ORG, "missing", TriggerType::ObjectUpdated)
        .await
        .unwrap();
    assert_eq!(outcome, Rescreen::Skipped);
}

#[tokio::test]
async fn drain_runs_follow_up_jobs() {
    let h = Harness::new().await;
    h.provider.set_results(WATCHLIST, vec![candidate("Q1", 0.9)]);
    let config = h.config().await;
    h.monitor(&config, "c1").await;
    h.provider.set_results(WATCHLIST, vec![candidate("Q2", 0.9)]);
    h.touch("c1", 1).await;

    h.queue_job(Job::EvaluateNeed {
        org_id: ORG.into(),
        object_type: CUSTOMERS.into(),
        object_ids: vec!["c1".into()],
    })
    .await;
    let ran = h.worker.drain(&h.queue).await.unwrap();
    // enrich the first screening, then evaluate, screen, enrich
    assert_eq!(ran, 4);
    assert_eq!(h.cases.created().len(), 2);
}

#[tokio::test]
async fn matches_are_enriched_on_self_hosted_providers() {
    let h = Harness::build(FakeProvider::new().self_hosted(), WorkerSettings::default()).await;
    h.provider.set_results(WATCHLIST, vec![candidate("Q1", 0.9)]);
    h.provider.set_enriched(
        "Q1",
        json!({"id": "Q1", "properties": {"birthDate": ["1970-01-01"]}}),
    );
    let config = h.config().await;
    let screening = h.monitor(&config, "c1").await;

    h.worker.enrich_screening(&screening.screening.id).await.unwrap();

    let stored = h.service.get_screening(&h.creds, &screening.screening.id).await.unwrap();
    let matched = &stored.matches[0];
    assert!(matched.enriched);
    assert_eq!(matched.payload["properties"]["birthDate"], json!(["1970-01-01"]));
    assert_eq!(matched.payload["properties"]["name"], json!(["Entity Q1"]));
    assert_eq!(matched.payload["score"], json!(0.9));

    h.worker.enrich_screening(&screening.screening.id).await.unwrap();
    assert_eq!(h.provider.enrich_calls(), vec!["Q1".to_string()]);
}

#[tokio::test]
async fn hosted_providers_are_not_asked_for_enrichment() {
    let h = Harness::new().await;
    h.provider.set_results(WATCHLIST, vec![candidate("Q1", 0.9)]);
    let config = h.config().await;
    let screening = h.monitor(&config, "c1").await;

    h.worker.enrich_screening(&screening.screening.id).await.unwrap();
    assert!(h.provider.enrich_calls().is_empty());
    let stored = h.service.get_screening(&h.creds, &screening.screening.id).await.unwrap();
    assert!(!stored.matches[0].enriched);
}

#[tokio::test]
async fn first_screening_queues_its_enrichment() {
    let h = Harness::build(FakeProvider::new().self_hosted(), WorkerSettings::default()).await;
    h.provider.set_results(WATCHLIST, vec![candidate("Q1", 0.9)]);
    h.provider.set_enriched("Q1", json!({"id": "Q1", "properties": {"alias": ["Q"]}}));
    let config = h.config().await;
    let screening = h.monitor(&config, "c1").await;

    assert_eq!(
        h.queue.snapshot().await,
        vec![Job::MatchEnrichment {
            screening_id: screening.screening.id.clone(),
        }]
    );
    assert_eq!(h.worker.drain(&h.queue).await.unwrap(), 1);
    let stored = h.service.get_screening(&h.creds, &screening.screening.id).await.unwrap();
    assert!(stored.matches[0].enriched);
}

#[tokio::test]
async fn clean_first_screening_queues_nothing() {
    let h = Harness::new().await;
    let config = h.config().await;
    h.monitor(&config, "c1").await;
    assert!(h.queue.is_empty().await);
}
