#![allow(dead_code)]

use std::sync::Arc;

use vigil_core::entities::{ContinuousScreeningWithMatches, ScreeningConfig};
use vigil_core::ports::Credentials;
use vigil_db::VigilDb;
use vigil_db::ports::{DbDataModelRepository, DbIngester};
use vigil_screening::{Collaborators, ObjectSource, ScreeningService};
use vigil_testkit::fixtures::{CUSTOMERS, ORG, customer_payload, customers_table, new_config, register_table};
use vigil_testkit::{FakeProvider, RecordingCaseManager, RecordingEnrichment, TestAccess};

pub struct Harness {
    pub db: Arc<VigilDb>,
    pub provider: Arc<FakeProvider>,
    pub access: Arc<TestAccess>,
    pub cases: Arc<RecordingCaseManager>,
    pub enrichment: Arc<RecordingEnrichment>,
    pub service: ScreeningService,
    pub creds: Credentials,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_provider(FakeProvider::new()).await
    }

    pub async fn with_provider(provider: FakeProvider) -> Self {
        let db = Arc::new(VigilDb::open_in_memory().await.unwrap());
        register_table(&db, ORG, &customers_table()).await;

        let provider = Arc::new(provider);
        let access = Arc::new(TestAccess::allow_all());
        let cases = Arc::new(RecordingCaseManager::new());
        let enrichment = Arc::new(RecordingEnrichment::new());
        let collaborators = Collaborators {
            access: access.clone(),
            data_model: Arc::new(DbDataModelRepository::new(Arc::clone(&db))),
            ingester: Arc::new(DbIngester::new(Arc::clone(&db))),
            cases: cases.clone(),
            enrichment: enrichment.clone(),
        };
        let service = ScreeningService::new(Arc::clone(&db), provider.clone(), collaborators);
        Self {
            db,
            provider,
            access,
            cases,
            enrichment,
            service,
            creds: Credentials::user(ORG, "analyst-1"),
        }
    }

    pub async fn config(&self) -> ScreeningConfig {
        self.service
            .create_config(&self.creds, new_config(ORG, &[CUSTOMERS]))
            .await
            .unwrap()
    }

    /// Monitor a customer from a payload and return its screening.
    pub async fn screen(
        &self,
        config: &ScreeningConfig,
        object_id: &str,
        minutes: i64,
    ) -> ContinuousScreeningWithMatches {
        self.service
            .create_continuous_screening_object(
                &self.creds,
                CUSTOMERS,
                &config.stable_id,
                ObjectSource::Payload(customer_payload(object_id, "Ivan", "Petrov", minutes)),
                false,
            )
            .await
            .unwrap()
            .unwrap()
    }
}
