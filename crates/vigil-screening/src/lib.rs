//! # vigil-screening
//!
//! Screening configuration, continuous screening of monitored objects, and
//! the match review state machine.
//!
//! `ScreeningService` owns the database handle and the external
//! collaborators. Its operations are split by concern:
//!
//! - [`config_store`]: config CRUD and validation
//! - [`engine`]: monitoring registration and screening execution
//! - [`review`]: match review, dismissal, and whitelists

pub mod config_store;
pub mod engine;
pub mod error;
pub mod review;

use std::sync::Arc;

use vigil_core::ports::{
    AccessControl, CaseManager, DataModelRepository, EnrichmentScheduler, Ingester,
};
use vigil_db::VigilDb;
use vigil_db::ports::{DbCaseManager, DbDataModelRepository, DbIngester};
use vigil_provider::ScreeningProvider;

pub use engine::{ObjectSource, ScreeningTarget};
pub use error::ScreeningError;

/// External collaborators of the screening service.
#[derive(Clone)]
pub struct Collaborators {
    pub access: Arc<dyn AccessControl>,
    pub data_model: Arc<dyn DataModelRepository>,
    pub ingester: Arc<dyn Ingester>,
    pub cases: Arc<dyn CaseManager>,
    pub enrichment: Arc<dyn EnrichmentScheduler>,
}

impl Collaborators {
    /// Data model, ingestion, and cases all served by `db`.
    #[must_use]
    pub fn database_backed(
        db: &Arc<VigilDb>,
        access: Arc<dyn AccessControl>,
        enrichment: Arc<dyn EnrichmentScheduler>,
    ) -> Self {
        Self {
            access,
            enrichment,
            data_model: Arc::new(DbDataModelRepository::new(Arc::clone(db))),
            ingester: Arc::new(DbIngester::new(Arc::clone(db))),
            cases: Arc::new(DbCaseManager::new(Arc::clone(db))),
        }
    }
}

/// Entry point for every synchronous screening operation.
///
/// Shared behind an `Arc` by the API layer and the worker.
pub struct ScreeningService {
    db: Arc<VigilDb>,
    provider: Arc<dyn ScreeningProvider>,
    collaborators: Collaborators,
}

impl ScreeningService {
    #[must_use]
    pub fn new(
        db: Arc<VigilDb>,
        provider: Arc<dyn ScreeningProvider>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            db,
            provider,
            collaborators,
        }
    }

    #[must_use]
    pub fn db(&self) -> &Arc<VigilDb> {
        &self.db
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<dyn ScreeningProvider> {
        &self.provider
    }

    fn access(&self) -> &dyn AccessControl {
        self.collaborators.access.as_ref()
    }
}
