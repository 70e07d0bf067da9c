//! `BuildDataset`: export the next dataset file of an organization.

use std::sync::Arc;

use chrono::Utc;
use vigil_core::entities::DatasetFile;
use vigil_dataset::{DatasetBuilder, ExportedCatalog};
use vigil_db::repos::configs;

use crate::error::WorkerError;
use crate::jobs::Job;
use crate::Worker;

impl Worker {
    /// Build the first full snapshot, or the next delta, then republish the
    /// organization's delta list.
    ///
    /// # Errors
    ///
    /// Dataset or database errors; a failed build records no file.
    pub async fn build_dataset(&self, org_id: &str) -> Result<Option<DatasetFile>, WorkerError> {
        let builder = DatasetBuilder::new(
            Arc::clone(self.db()),
            self.store.clone(),
            self.settings.worker.dataset_page_size,
        );
        let Some(file) = builder.build_next(org_id, Utc::now()).await? else {
            tracing::debug!(org_id, "nothing to export");
            return Ok(None);
        };
        self.catalog().publish_delta_list(&self.store, org_id).await?;
        Ok(Some(file))
    }

    /// The catalog of exported organization datasets.
    #[must_use]
    pub fn catalog(&self) -> ExportedCatalog {
        ExportedCatalog::new(
            Arc::clone(self.db()),
            self.settings.storage.clone(),
            self.settings.general.clone(),
            self.settings.worker.max_exported_deltas,
        )
    }

    /// Periodic jobs: one dataset scan plus one export per organization with
    /// an enabled config.
    ///
    /// # Errors
    ///
    /// Database or queue errors.
    pub async fn enqueue_periodic(&self) -> Result<usize, WorkerError> {
        let org_ids = {
            let conn = self.db().control().await;
            configs::list_active_org_ids(&conn).await?
        };
        self.queue.enqueue(Job::ScanDatasetUpdates).await?;
        for org_id in &org_ids {
            self.queue
                .enqueue(Job::BuildDataset {
                    org_id: org_id.clone(),
                })
                .await?;
        }
        Ok(org_ids.len() + 1)
    }
}
