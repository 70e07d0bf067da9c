//! `EvaluateNeed`: turn touched objects into rescreening jobs.

use vigil_core::enums::TriggerType;
use vigil_db::repos::monitored;

use crate::error::WorkerError;
use crate::jobs::Job;
use crate::Worker;

impl Worker {
    /// Enqueue one `DoScreening` per monitoring row of the touched objects.
    ///
    /// Returns the number of jobs enqueued; nothing happens when no enabled
    /// config covers `object_type`.
    ///
    /// # Errors
    ///
    /// Database or queue errors.
    pub async fn evaluate_need(
        &self,
        org_id: &str,
        object_type: &str,
        object_ids: &[String],
    ) -> Result<usize, WorkerError> {
        let configs = self.screening.enabled_configs_for(org_id, object_type).await?;
        if configs.is_empty() {
            tracing::debug!(org_id, object_type, "no enabled config covers this object type");
            return Ok(0);
        }
        let stable_ids: Vec<String> = configs.into_iter().map(|c| c.stable_id).collect();

        let rows = {
            let conn = self.db().org(org_id).await?;
            monitored::list_for_objects(&conn, object_type, object_ids, &stable_ids).await?
        };
        for row in &rows {
            self.queue
                .enqueue(Job::DoScreening {
                    org_id: org_id.to_string(),
                    monitoring_id: row.id.clone(),
                    trigger: TriggerType::ObjectUpdated,
                })
                .await?;
        }
        tracing::info!(
            org_id,
            object_type,
            touched = object_ids.len(),
            monitored = rows.len(),
            "evaluated rescreening need"
        );
        Ok(rows.len())
    }
}
