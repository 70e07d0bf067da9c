#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use vigil_core::entities::{ContinuousScreeningWithMatches, ScreeningConfig};
use vigil_core::ports::{Credentials, Ingester};
use vigil_dataset::BlobStore;
use vigil_db::VigilDb;
use vigil_db::ports::{DbDataModelRepository, DbIngester};
use vigil_screening::{Collaborators, ObjectSource, ScreeningService};
use vigil_testkit::fixtures::{
    CUSTOMERS, ORG, customer_payload, customer_payload_at, customers_table, new_config,
    register_table,
};
use vigil_testkit::{FakeProvider, RecordingCaseManager, TestAccess};
use vigil_worker::{InMemoryQueue, QueueEnrichment, Worker, WorkerSettings};

pub struct Harness {
    pub db: Arc<VigilDb>,
    pub provider: Arc<FakeProvider>,
    pub cases: Arc<RecordingCaseManager>,
    pub service: Arc<ScreeningService>,
    pub queue: Arc<InMemoryQueue>,
    pub store: BlobStore,
    pub worker: Worker,
    pub creds: Credentials,
}

impl Harness {
    pub async fn new() -> Self {
        Self::build(FakeProvider::new(), WorkerSettings::default()).await
    }

    pub async fn build(provider: FakeProvider, settings: WorkerSettings) -> Self {
        let db = Arc::new(VigilDb::open_in_memory().await.unwrap());
        register_table(&db, ORG, &customers_table()).await;

        let provider = Arc::new(provider);
        let cases = Arc::new(RecordingCaseManager::new());
        let queue = Arc::new(InMemoryQueue::new());
        let collaborators = Collaborators {
            access: Arc::new(TestAccess::allow_all()),
            data_model: Arc::new(DbDataModelRepository::new(Arc::clone(&db))),
            ingester: Arc::new(DbIngester::new(Arc::clone(&db))),
            cases: cases.clone(),
            enrichment: Arc::new(QueueEnrichment::new(queue.clone())),
        };
        let service = Arc::new(ScreeningService::new(
            Arc::clone(&db),
            provider.clone(),
            collaborators,
        ));
        let store = BlobStore::in_memory();
        let worker = Worker::new(Arc::clone(&service), queue.clone(), store.clone(), settings);
        Self {
            db,
            provider,
            cases,
            service,
            queue,
            store,
            worker,
            creds: Credentials::user(ORG, "analyst-1"),
        }
    }

    pub async fn config(&self) -> ScreeningConfig {
        self.service
            .create_config(&self.creds, new_config(ORG, &[CUSTOMERS]))
            .await
            .unwrap()
    }

    /// Start monitoring a customer, screening it with the provider's
    /// current results.
    pub async fn monitor(&self, config: &ScreeningConfig, object_id: &str) -> ContinuousScreeningWithMatches {
        self.service
            .create_continuous_screening_object(
                &self.creds,
                CUSTOMERS,
                &config.stable_id,
                ObjectSource::Payload(customer_payload(object_id, "Ivan", "Petrov", 0)),
                false,
            )
            .await
            .unwrap()
            .unwrap()
    }

    /// Ingest a version of a customer newer than any existing screening.
    pub async fn touch(&self, object_id: &str, hours: i64) {
        let payload = customer_payload_at(object_id, "Ivan", "Petrov", Utc::now() + Duration::hours(hours));
        let written = DbIngester::new(Arc::clone(&self.db))
            .ingest_object(ORG, CUSTOMERS, &payload)
            .await
            .unwrap();
        assert_eq!(written, 1);
    }

    pub async fn monitoring_id(&self, config: &ScreeningConfig, object_id: &str) -> String {
        let conn = self.db.org(ORG).await.unwrap();
        vigil_db::repos::monitored::find(&conn, CUSTOMERS, object_id, &config.stable_id)
            .await
            .unwrap()
            .unwrap()
            .id
    }
}

impl Harness {
    pub async fn queue_job(&self, job: vigil_worker::Job) {
        use vigil_worker::JobQueue;
        self.queue.enqueue(job).await.unwrap();
    }
}
