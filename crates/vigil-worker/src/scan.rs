//! `ScanDatasetUpdates`: pick up new watchlist versions.
//!
//! Per catalog dataset, the last processed version lives in a cursor row. A
//! dataset seen for the first time only records its version. Newer versions
//! have their delta files downloaded into the blob store, then one
//! `ApplyDeltaFile` job is queued per (enabled config, delta file).

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use vigil_core::entities::{DatasetUpdate, DatasetUpdateJob};
use vigil_core::enums::UpdateJobStatus;
use vigil_dataset::paths;
use vigil_db::repos::{configs, datasets};

use crate::error::WorkerError;
use crate::jobs::Job;
use crate::Worker;

/// Upper bound on delta downloads in flight, whatever the configuration says.
pub const MAX_CONCURRENT_DOWNLOADS: usize = 3;

/// Counters of one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// Public catalog datasets looked at.
    pub datasets: usize,
    pub cold_starts: usize,
    /// Delta files downloaded and recorded.
    pub updates: usize,
    /// `ApplyDeltaFile` jobs queued.
    pub jobs: usize,
}

#[derive(Debug)]
struct Downloaded {
    version: String,
    path: String,
    records: u64,
}

impl Worker {
    /// # Errors
    ///
    /// Provider or database errors, or [`WorkerError::Download`] for the
    /// first failed delta download. A failed dataset leaves its cursor
    /// untouched so the next scan retries it.
    pub async fn scan_dataset_updates(&self) -> Result<ScanSummary, WorkerError> {
        let provider = self.provider();
        let mut summary = ScanSummary::default();
        if !provider.is_configured() {
            tracing::warn!("no screening provider configured, dataset scan skipped");
            return Ok(summary);
        }

        let catalog = provider.raw_catalog().await?;
        for dataset in catalog.public_datasets(&self.settings.general.internal_tag_prefix) {
            summary.datasets += 1;
            let cursor = {
                let conn = self.db().control().await;
                datasets::get_cursor(&conn, &dataset.name).await?
            };
            let Some(cursor) = cursor else {
                let conn = self.db().control().await;
                datasets::upsert_cursor(&conn, &dataset.name, &dataset.version, Utc::now()).await?;
                tracing::info!(dataset = %dataset.name, version = %dataset.version, "new dataset, starting from its current version");
                summary.cold_starts += 1;
                continue;
            };

            match dataset.version.as_str().cmp(cursor.version.as_str()) {
                Ordering::Less => {
                    tracing::warn!(
                        dataset = %dataset.name,
                        catalog_version = %dataset.version,
                        processed_version = %cursor.version,
                        "catalog version is older than the processed one, skipped"
                    );
                    continue;
                }
                Ordering::Equal => continue,
                Ordering::Greater => {}
            }

            let Some(delta_url) = dataset.delta_url.as_deref() else {
                tracing::warn!(dataset = %dataset.name, "dataset publishes no deltas, moving cursor forward");
                let conn = self.db().control().await;
                datasets::upsert_cursor(&conn, &dataset.name, &dataset.version, Utc::now()).await?;
                continue;
            };
            let versions = provider
                .fetch_delta_list(delta_url)
                .await?
                .between(&cursor.version, &dataset.version);
            tracing::info!(
                dataset = %dataset.name,
                from = %cursor.version,
                to = %dataset.version,
                deltas = versions.len(),
                "downloading watchlist deltas"
            );

            let downloaded = self.download_deltas(&dataset.name, versions).await?;
            let jobs = self
                .record_updates(&dataset.name, &dataset.version, &downloaded)
                .await?;
            summary.updates += downloaded.len();
            summary.jobs += jobs;
        }
        Ok(summary)
    }

    /// Download every `(version, url)` with at most `download_concurrency`
    /// transfers in flight, never more than [`MAX_CONCURRENT_DOWNLOADS`]. The
    /// first failure cancels the others.
    async fn download_deltas(
        &self,
        dataset: &str,
        versions: Vec<(String, String)>,
    ) -> Result<Vec<Downloaded>, WorkerError> {
        let permits = self
            .settings
            .worker
            .download_concurrency
            .clamp(1, MAX_CONCURRENT_DOWNLOADS);
        let limit = Arc::new(Semaphore::new(permits));
        let mut set = JoinSet::new();

        for (version, url) in versions {
            let provider = Arc::clone(self.provider());
            let store = self.store.clone();
            let limit = Arc::clone(&limit);
            let dataset = dataset.to_string();
            set.spawn(async move {
                let _permit = limit
                    .acquire_owned()
                    .await
                    .map_err(|e| WorkerError::Task(e.to_string()))?;
                let path = paths::watchlist_update(&dataset, &version);
                let fetched = async {
                    let body = provider.download(&url).await?;
                    Ok::<_, WorkerError>(store.put_stream(&path, body).await?)
                }
                .await;
                match fetched {
                    Ok(records) => {
                        tracing::debug!(dataset = %dataset, version = %version, records, "delta downloaded");
                        Ok(Downloaded {
                            version,
                            path,
                            records,
                        })
                    }
                    Err(source) => Err(WorkerError::Download {
                        dataset,
                        version,
                        source: Box::new(source),
                    }),
                }
            });
        }

        let mut downloaded = Vec::new();
        while let Some(joined) = set.join_next().await {
            let result = joined.unwrap_or_else(|e| Err(e.into()));
            match result {
                Ok(file) => downloaded.push(file),
                Err(e) => {
                    set.abort_all();
                    return Err(e);
                }
            }
        }
        downloaded.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(downloaded)
    }

    /// Record the downloaded files and their per-config jobs, move the
    /// cursor, then queue the jobs. Returns the number of jobs queued.
    async fn record_updates(
        &self,
        dataset: &str,
        catalog_version: &str,
        downloaded: &[Downloaded],
    ) -> Result<usize, WorkerError> {
        let now = Utc::now();
        let tx = self.db().control_tx().await?;
        let subscribers: Vec<_> = configs::list_enabled(&tx)
            .await?
            .into_iter()
            .filter(|c| c.datasets.iter().any(|d| d == dataset))
            .collect();

        let mut job_ids = Vec::new();
        for file in downloaded {
            let update = match datasets::find_update(&tx, dataset, &file.version).await? {
                Some(existing) => existing,
                None => {
                    let update = DatasetUpdate {
                        id: vigil_core::new_id(),
                        dataset_name: dataset.to_string(),
                        version: file.version.clone(),
                        delta_file_path: file.path.clone(),
                        total_items: file.records,
                        created_at: now,
                    };
                    datasets::insert_update(&tx, &update).await?;
                    update
                }
            };
            for config in &subscribers {
                let job = DatasetUpdateJob {
                    id: vigil_core::new_id(),
                    dataset_update_id: update.id.clone(),
                    org_id: config.org_id.clone(),
                    config_id: config.id.clone(),
                    status: UpdateJobStatus::Pending,
                    processed_offset: 0,
                    processed_items: 0,
                    created_at: now,
                    updated_at: now,
                };
                if datasets::insert_job(&tx, &job).await? {
                    job_ids.push(job.id);
                }
            }
        }
        datasets::upsert_cursor(&tx, dataset, catalog_version, now).await?;
        tx.commit().await?;

        for job_id in &job_ids {
            self.queue
                .enqueue(Job::ApplyDeltaFile {
                    job_id: job_id.clone(),
                })
                .await?;
        }
        tracing::info!(
            dataset,
            version = catalog_version,
            files = downloaded.len(),
            subscribers = subscribers.len(),
            jobs = job_ids.len(),
            "dataset updates recorded"
        );
        Ok(job_ids.len())
    }
}
