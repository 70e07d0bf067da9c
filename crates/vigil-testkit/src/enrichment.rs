//! Enrichment scheduler that only remembers what was asked.

use std::sync::Mutex;

use async_trait::async_trait;
use vigil_core::errors::CoreError;
use vigil_core::ports::EnrichmentScheduler;

use crate::lock;

#[derive(Debug, Default)]
pub struct RecordingEnrichment {
    scheduled: Mutex<Vec<String>>,
}

impl RecordingEnrichment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Screening ids scheduled so far, in order.
    #[must_use]
    pub fn scheduled(&self) -> Vec<String> {
        lock(&self.scheduled).clone()
    }
}

#[async_trait]
impl EnrichmentScheduler for RecordingEnrichment {
    async fn schedule_enrichment(&self, screening_id: &str) -> Result<(), CoreError> {
        lock(&self.scheduled).push(screening_id.to_string());
        Ok(())
    }
}
