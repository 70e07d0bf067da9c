//! `ApplyDeltaFile`: screen one organization against one watchlist delta.
//!
//! Every `ADD`/`MOD` record is searched in the organization's own exported
//! dataset. Each org entity that comes back is traced to its source object
//! through the `notes` linkage and gets a dataset-triggered screening with
//! the watchlist entity as its single match. Progress is checkpointed as a
//! decoder offset so a retried job resumes after the last checkpoint.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use vigil_core::counterparty_identifier;
use vigil_core::entities::{DatasetUpdate, ScreeningConfig};
use vigil_core::enums::{ScreeningStatus, UpdateJobStatus};
use vigil_core::errors::{CoreError, ErrorKind};
use vigil_core::mapping::DataModelMapping;
use vigil_dataset::{DatasetError, DeltaFileDecoder, DeltaOp, DeltaRecord, EntityNotes, FtmEntity};
use vigil_db::repos::{configs, datasets, monitored, screenings, whitelist};
use vigil_provider::{EntityQuery, OrgConfig, QueryConfig, SearchRequest};
use vigil_screening::ScreeningTarget;
use vigil_screening::engine::build_dataset_screening;

use crate::error::WorkerError;
use crate::jobs::Job;
use crate::Worker;

/// Counters of one delta application (this run only).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    /// Records decoded, deletions included.
    pub records: u64,
    pub screenings: usize,
    /// Org entities matched but not screened (unknown, unmonitored,
    /// whitelisted, or already screened against this entity).
    pub skipped: usize,
}

/// Last persisted position of a job.
#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    offset: u64,
    items: u64,
}

impl Worker {
    /// # Errors
    ///
    /// `NotFound` for an unknown job or update, decode, provider, and
    /// database errors. On error the job is marked failed at its last
    /// checkpoint.
    pub async fn apply_delta_file(&self, job_id: &str) -> Result<ApplySummary, WorkerError> {
        let (job, update, config) = {
            let conn = self.db().control().await;
            let job = datasets::get_job(&conn, job_id)
                .await?
                .ok_or_else(|| CoreError::not_found("dataset update job", job_id))?;
            let update = datasets::get_update(&conn, &job.dataset_update_id)
                .await?
                .ok_or_else(|| CoreError::not_found("dataset update", &job.dataset_update_id))?;
            let config = configs::get(&conn, &job.config_id).await?;
            (job, update, config)
        };
        let mut checkpoint = Checkpoint {
            offset: job.processed_offset,
            items: job.processed_items,
        };

        if job.status == UpdateJobStatus::Completed {
            tracing::debug!(job_id, "delta already applied");
            return Ok(ApplySummary::default());
        }
        let Some(config) = config.filter(|c| c.enabled) else {
            tracing::info!(job_id, config_id = %job.config_id, "config gone or disabled, delta not applied");
            self.save_checkpoint(job_id, UpdateJobStatus::Completed, checkpoint).await?;
            return Ok(ApplySummary::default());
        };

        self.save_checkpoint(job_id, UpdateJobStatus::Processing, checkpoint).await?;
        tracing::info!(
            job_id,
            org_id = %config.org_id,
            dataset = %update.dataset_name,
            version = %update.version,
            resume_at = checkpoint.offset,
            "applying watchlist delta"
        );

        let mut summary = ApplySummary::default();
        match self
            .process_records(job_id, &config, &update, &mut checkpoint, &mut summary)
            .await
        {
            Ok(()) => {
                self.save_checkpoint(job_id, UpdateJobStatus::Completed, checkpoint).await?;
                tracing::info!(
                    job_id,
                    records = summary.records,
                    screenings = summary.screenings,
                    skipped = summary.skipped,
                    "watchlist delta applied"
                );
                Ok(summary)
            }
            Err(e) => {
                if let Err(mark) = self.save_checkpoint(job_id, UpdateJobStatus::Failed, checkpoint).await {
                    tracing::warn!(job_id, error = %mark, "could not mark job failed");
                }
                Err(e)
            }
        }
    }

    async fn process_records(
        &self,
        job_id: &str,
        config: &ScreeningConfig,
        update: &DatasetUpdate,
        checkpoint: &mut Checkpoint,
        summary: &mut ApplySummary,
    ) -> Result<(), WorkerError> {
        let stream = self.store.open(&update.delta_file_path, checkpoint.offset).await?;
        let mut decoder = DeltaFileDecoder::new(stream, checkpoint.offset);
        let every = self.settings.worker.offset_checkpoint_every.max(1);
        let mut items = checkpoint.items;
        let mut mappings = BTreeMap::new();

        while let Some(record) = decoder.next_record::<DeltaRecord>().await? {
            summary.records += 1;
            if record.op != DeltaOp::Del {
                self.apply_record(config, &record.entity, &mut mappings, summary)
                    .await?;
            }
            items += 1;
            if items % every == 0 {
                *checkpoint = Checkpoint {
                    offset: decoder.offset(),
                    items,
                };
                self.save_checkpoint(job_id, UpdateJobStatus::Processing, *checkpoint)
                    .await?;
            }
        }
        *checkpoint = Checkpoint {
            offset: decoder.offset(),
            items,
        };
        Ok(())
    }

    async fn apply_record(
        &self,
        config: &ScreeningConfig,
        entity: &FtmEntity,
        mappings: &mut BTreeMap<String, DataModelMapping>,
        summary: &mut ApplySummary,
    ) -> Result<(), WorkerError> {
        let org_id = config.org_id.as_str();
        let filters = entity.string_properties();
        if filters.is_empty() {
            tracing::debug!(entity_id = %entity.id, "watchlist entity has no searchable property");
            return Ok(());
        }
        let request = SearchRequest {
            org_config: OrgConfig {
                match_threshold: config.match_threshold,
                match_limit: config.match_limit,
            },
            config: QueryConfig {
                datasets: vec![self.settings.general.org_dataset_name(org_id)],
                algorithm: config.algorithm.clone(),
            },
            queries: vec![EntityQuery {
                entity_type: entity.schema.clone(),
                filters,
            }],
            whitelisted_entity_ids: Vec::new(),
        };
        let response = self.provider().search(&request).await?;
        if response.matches.is_empty() {
            return Ok(());
        }
        let entity_payload = serde_json::to_value(entity).map_err(DatasetError::from)?;
        let search_input = serde_json::to_value(&request).unwrap_or(Value::Null);

        for candidate in &response.matches {
            let Some(notes) = EntityNotes::from_payload(&candidate.payload) else {
                tracing::warn!(org_id, org_entity = %candidate.entity_id, "matched org entity carries no source linkage");
                summary.skipped += 1;
                continue;
            };
            if !config.covers(&notes.object_type) {
                summary.skipped += 1;
                continue;
            }
            let is_monitored = {
                let conn = self.db().org(org_id).await?;
                monitored::find(&conn, &notes.object_type, &notes.object_id, &config.stable_id)
                    .await?
                    .is_some()
            };
            if !is_monitored {
                summary.skipped += 1;
                continue;
            }
            let object = match self
                .screening
                .current_object(org_id, &notes.object_type, &notes.object_id)
                .await
            {
                Ok(object) => object,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::warn!(
                        org_id,
                        object_type = %notes.object_type,
                        object_id = %notes.object_id,
                        "matched org entity points at an unknown object"
                    );
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let counterparty = counterparty_identifier(&object.object_type, &object.object_id);
            let (whitelisted, previous) = {
                let conn = self.db().control().await;
                (
                    whitelist::is_whitelisted(&conn, org_id, &counterparty, &entity.id).await?,
                    screenings::find_dataset_screening(&conn, org_id, &object.internal_id, &entity.id)
                        .await?,
                )
            };
            if whitelisted {
                tracing::debug!(counterparty = %counterparty, entity_id = %entity.id, "pair whitelisted");
                summary.skipped += 1;
                continue;
            }
            let settled = previous
                .as_ref()
                .is_some_and(|p| p.case_id.is_some() || p.status != ScreeningStatus::InReview);
            if settled {
                tracing::debug!(counterparty = %counterparty, entity_id = %entity.id, "pair already screened");
                summary.skipped += 1;
                continue;
            }

            if !mappings.contains_key(&object.object_type) {
                let mapping = self.screening.mapping_for(org_id, &object.object_type).await?;
                mappings.insert(object.object_type.clone(), mapping);
            }
            let Some(mapping) = mappings.get(&object.object_type) else {
                continue;
            };
            let target = ScreeningTarget {
                config,
                object: &object,
                mapping,
            };
            // A screening left without its case by an earlier run gets the case now.
            let mut screening = match previous {
                Some(previous) => {
                    let conn = self.db().control().await;
                    screenings::get_with_matches(&conn, &previous.id)
                        .await?
                        .ok_or_else(|| CoreError::not_found("continuous screening", &previous.id))?
                }
                None => {
                    let built = build_dataset_screening(
                        target,
                        &entity.id,
                        entity_payload.clone(),
                        search_input.clone(),
                        Utc::now(),
                    );
                    self.screening.save_screening(&built).await?;
                    built
                }
            };
            self.screening.open_case(target, &mut screening).await?;
            self.queue
                .enqueue(Job::MatchEnrichment {
                    screening_id: screening.screening.id.clone(),
                })
                .await?;
            summary.screenings += 1;
        }
        Ok(())
    }

    async fn save_checkpoint(
        &self,
        job_id: &str,
        status: UpdateJobStatus,
        checkpoint: Checkpoint,
    ) -> Result<(), WorkerError> {
        let conn = self.db().control().await;
        datasets::update_job_progress(
            &conn,
            job_id,
            status,
            checkpoint.offset,
            checkpoint.items,
            Utc::now(),
        )
        .await?;
        Ok(())
    }
}
