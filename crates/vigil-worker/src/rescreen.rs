//! `DoScreening`: rescreen one monitored object.

use chrono::Utc;
use vigil_core::entities::ContinuousScreeningWithMatches;
use vigil_core::enums::{ScreeningStatus, TriggerType};
use vigil_core::ports::Credentials;
use vigil_db::repos::{monitored, screenings};
use vigil_screening::ScreeningTarget;
use vigil_screening::engine::{build_object_screening, record_delta_track};

use crate::error::WorkerError;
use crate::jobs::Job;
use crate::Worker;

/// What a rescreening did.
#[derive(Debug, Clone, PartialEq)]
pub enum Rescreen {
    /// Monitoring row gone or config disabled.
    Skipped,
    /// A screening newer than the ingested version already exists.
    UpToDate,
    Screened {
        screening: ContinuousScreeningWithMatches,
        /// Same match set as the open case; no new case was created.
        case_suppressed: bool,
    },
}

impl Worker {
    /// Screen the current version of a monitored object.
    ///
    /// # Errors
    ///
    /// Screening, database, or provider errors. A failed case creation is
    /// returned after the screening is stored.
    pub async fn do_screening(
        &self,
        org_id: &str,
        monitoring_id: &str,
        trigger: TriggerType,
    ) -> Result<Rescreen, WorkerError> {
        let monitoring = {
            let conn = self.db().org(org_id).await?;
            monitored::get(&conn, monitoring_id).await?
        };
        let Some(monitoring) = monitoring else {
            tracing::debug!(org_id, monitoring_id, "monitoring row is gone");
            return Ok(Rescreen::Skipped);
        };

        let creds = Credentials::system(org_id);
        let config = self
            .screening
            .get_config_by_stable_id(&creds, &monitoring.config_stable_id)
            .await?;
        if !config.enabled {
            tracing::debug!(stable_id = %config.stable_id, "config disabled, not rescreening");
            return Ok(Rescreen::Skipped);
        }
        let mapping = self.screening.mapping_for(org_id, &monitoring.object_type).await?;
        let object = self
            .screening
            .current_object(org_id, &monitoring.object_type, &monitoring.object_id)
            .await?;

        let (latest, open) = {
            let conn = self.db().control().await;
            let latest = screenings::latest_for_object(
                &conn,
                org_id,
                &config.stable_id,
                &object.object_type,
                &object.object_id,
            )
            .await?;
            let open = screenings::latest_in_review_with_case(
                &conn,
                org_id,
                &config.stable_id,
                &object.object_type,
                &object.object_id,
            )
            .await?;
            (latest, open)
        };
        if latest.is_some_and(|s| s.created_at > object.valid_from) {
            tracing::debug!(
                object_type = %object.object_type,
                object_id = %object.object_id,
                "object version already screened"
            );
            return Ok(Rescreen::UpToDate);
        }

        let target = ScreeningTarget {
            config: &config,
            object: &object,
            mapping: &mapping,
        };
        let (request, response) = self.screening.search_object(target).await?;
        let now = Utc::now();
        let mut screening = build_object_screening(target, trigger, &request, response, now);

        let case_suppressed = trigger == TriggerType::ObjectUpdated
            && screening.screening.status == ScreeningStatus::InReview
            && open.is_some_and(|o| o.match_entity_ids() == screening.match_entity_ids());

        let org_tx = self.db().org_tx(org_id).await?;
        record_delta_track(&org_tx, &object, now).await?;
        self.screening.save_screening(&screening).await?;
        org_tx.commit().await?;

        tracing::info!(
            org_id,
            screening_id = %screening.screening.id,
            trigger = %trigger,
            matches = screening.matches.len(),
            case_suppressed,
            "object rescreened"
        );
        if screening.screening.status == ScreeningStatus::InReview && !case_suppressed {
            self.screening.open_case(target, &mut screening).await?;
        }
        if !screening.matches.is_empty() {
            self.queue
                .enqueue(Job::MatchEnrichment {
                    screening_id: screening.screening.id.clone(),
                })
                .await?;
        }
        Ok(Rescreen::Screened {
            screening,
            case_suppressed,
        })
    }
}
