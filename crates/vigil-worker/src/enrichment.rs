//! `MatchEnrichment`: replace provider match payloads with full entities.
//!
//! Only the watchlist side is ever sent: the screening's own entity for
//! dataset-triggered screenings, the matched entities otherwise.

use chrono::Utc;
use serde_json::Value;
use vigil_core::enums::TriggerType;
use vigil_db::repos::screenings;
use vigil_provider::merge_enriched;

use crate::error::WorkerError;
use crate::Worker;

impl Worker {
    /// # Errors
    ///
    /// `NotFound` for an unknown screening, provider or database errors.
    pub async fn enrich_screening(&self, screening_id: &str) -> Result<(), WorkerError> {
        let provider = self.provider();
        if !provider.is_configured() {
            tracing::debug!(screening_id, "no provider configured, enrichment skipped");
            return Ok(());
        }
        if !provider.is_self_hosted() {
            tracing::warn!(screening_id, "provider is not self-hosted, enrichment skipped");
            return Ok(());
        }

        let screening = {
            let conn = self.db().control().await;
            screenings::get_with_matches(&conn, screening_id).await?
        }
        .ok_or_else(|| vigil_core::errors::CoreError::not_found("screening", screening_id))?;

        if screening.screening.trigger_type == TriggerType::DatasetUpdated {
            if screening.screening.opensanctions_entity_enriched {
                tracing::debug!(screening_id, "entity already enriched");
                return Ok(());
            }
            let Some(entity_id) = screening.screening.opensanctions_entity_id.as_deref() else {
                tracing::warn!(screening_id, "dataset screening without entity id");
                return Ok(());
            };
            let enriched = provider.enrich_entity(entity_id).await?;
            let original = screening
                .screening
                .opensanctions_entity_payload
                .as_ref()
                .unwrap_or(&Value::Null);
            let merged = merge_enriched(original, &enriched);
            let conn = self.db().control().await;
            screenings::set_entity_enriched(&conn, screening_id, &merged, Utc::now()).await?;
            tracing::info!(screening_id, entity_id, "screening entity enriched");
            return Ok(());
        }

        let mut enriched_count = 0_usize;
        for matched in screening.matches.iter().filter(|m| !m.enriched) {
            let enriched = provider.enrich_entity(&matched.opensanctions_entity_id).await?;
            let merged = merge_enriched(&matched.payload, &enriched);
            let conn = self.db().control().await;
            screenings::set_match_enriched(&conn, &matched.id, &merged, Utc::now()).await?;
            enriched_count += 1;
        }
        tracing::info!(screening_id, enriched = enriched_count, "matches enriched");
        Ok(())
    }
}
