//! # vigil-worker
//!
//! Background pipeline of Vigil.
//!
//! ```text
//! EvaluateNeed ──> DoScreening ──> MatchEnrichment
//! ScanDatasetUpdates ──> ApplyDeltaFile ──> MatchEnrichment
//! BuildDataset
//! ```
//!
//! Handlers are methods on [`Worker`], one module per stage. Follow-up jobs
//! go through the [`JobQueue`] port; retry, backoff and scheduling are the
//! queue's business. [`Worker::drain`] runs an [`InMemoryQueue`] to
//! completion for one-off runs and tests.

mod apply;
mod enrichment;
pub mod error;
mod evaluate;
mod export;
pub mod jobs;
pub mod queue;
mod rescreen;
mod scan;

use std::sync::Arc;

use tracing::Instrument;
use vigil_config::{GeneralConfig, StorageConfig, WorkerConfig};
use vigil_dataset::BlobStore;
use vigil_db::VigilDb;
use vigil_provider::ScreeningProvider;
use vigil_screening::ScreeningService;

pub use apply::ApplySummary;
pub use error::WorkerError;
pub use jobs::Job;
pub use rescreen::Rescreen;
pub use queue::{InMemoryQueue, JobQueue, QueueEnrichment};
pub use scan::{MAX_CONCURRENT_DOWNLOADS, ScanSummary};

/// Settings the worker reads besides the service itself.
#[derive(Debug, Clone, Default)]
pub struct WorkerSettings {
    pub worker: WorkerConfig,
    pub storage: StorageConfig,
    pub general: GeneralConfig,
}

/// Runs pipeline jobs.
pub struct Worker {
    screening: Arc<ScreeningService>,
    queue: Arc<dyn JobQueue>,
    store: BlobStore,
    settings: WorkerSettings,
}

impl Worker {
    #[must_use]
    pub fn new(
        screening: Arc<ScreeningService>,
        queue: Arc<dyn JobQueue>,
        store: BlobStore,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            screening,
            queue,
            store,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    fn db(&self) -> &Arc<VigilDb> {
        self.screening.db()
    }

    fn provider(&self) -> &Arc<dyn ScreeningProvider> {
        self.screening.provider()
    }

    /// Run one job under its timeout.
    ///
    /// # Errors
    ///
    /// [`WorkerError::Timeout`] if the job overran, otherwise the handler's
    /// error.
    pub async fn run(&self, job: &Job) -> Result<(), WorkerError> {
        let timeout = job.timeout(&self.settings.worker);
        tracing::debug!(job = %job, "running job");

        let work = async {
            match job {
                Job::EvaluateNeed {
                    org_id,
                    object_type,
                    object_ids,
                } => self
                    .evaluate_need(org_id, object_type, object_ids)
                    .await
                    .map(drop),
                Job::DoScreening {
                    org_id,
                    monitoring_id,
                    trigger,
                } => self.do_screening(org_id, monitoring_id, *trigger).await.map(drop),
                Job::MatchEnrichment { screening_id } => self.enrich_screening(screening_id).await,
                Job::ScanDatasetUpdates => self.scan_dataset_updates().await.map(drop),
                Job::ApplyDeltaFile { job_id } => self.apply_delta_file(job_id).await.map(drop),
                Job::BuildDataset { org_id } => self.build_dataset(org_id).await.map(drop),
            }
        }
        .instrument(tracing::info_span!("job", name = job.name()));
        tokio::time::timeout(timeout, work)
            .await
            .map_err(|_| WorkerError::Timeout {
                job: job.name(),
                seconds: timeout.as_secs(),
            })?
    }

    /// Run jobs from `queue` until it is empty, including the follow-ups
    /// they enqueue. Returns the number of jobs run.
    ///
    /// # Errors
    ///
    /// Stops at the first failing job and returns its error.
    pub async fn drain(&self, queue: &InMemoryQueue) -> Result<usize, WorkerError> {
        let mut ran = 0;
        while let Some(job) = queue.pop().await {
            if let Err(e) = self.run(&job).await {
                tracing::error!(job = %job, error = %e, "job failed");
                return Err(e);
            }
            ran += 1;
        }
        Ok(ran)
    }
}
