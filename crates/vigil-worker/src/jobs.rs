//! Job definitions.
//!
//! Each job is a self-contained, retryable unit. Payloads only carry ids;
//! handlers reload everything they need so a retried job sees fresh state.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vigil_config::WorkerConfig;
use vigil_core::enums::TriggerType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Job {
    /// Objects were touched by ingestion; find the monitored ones.
    EvaluateNeed {
        org_id: String,
        object_type: String,
        object_ids: Vec<String>,
    },
    /// Rescreen one monitored object.
    DoScreening {
        org_id: String,
        monitoring_id: String,
        trigger: TriggerType,
    },
    /// Fetch full watchlist payloads for a screening.
    MatchEnrichment { screening_id: String },
    /// Look for new watchlist versions and download their deltas.
    ScanDatasetUpdates,
    /// Screen one organization against one downloaded delta file.
    ApplyDeltaFile { job_id: String },
    /// Export the next full or delta dataset of an organization.
    BuildDataset { org_id: String },
}

impl Job {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::EvaluateNeed { .. } => "evaluate_need",
            Self::DoScreening { .. } => "do_screening",
            Self::MatchEnrichment { .. } => "match_enrichment",
            Self::ScanDatasetUpdates => "scan_dataset_updates",
            Self::ApplyDeltaFile { .. } => "apply_delta_file",
            Self::BuildDataset { .. } => "build_dataset",
        }
    }

    /// Seconds for object-level jobs, minutes for dataset-level ones.
    #[must_use]
    pub const fn timeout(&self, config: &WorkerConfig) -> Duration {
        match self {
            Self::EvaluateNeed { .. } | Self::DoScreening { .. } | Self::MatchEnrichment { .. } => {
                Duration::from_secs(config.screening_timeout_secs)
            }
            Self::ScanDatasetUpdates | Self::ApplyDeltaFile { .. } | Self::BuildDataset { .. } => {
                Duration::from_secs(config.dataset_timeout_mins * 60)
            }
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EvaluateNeed {
                org_id,
                object_type,
                object_ids,
            } => write!(f, "evaluate_need({org_id}, {object_type}, {} ids)", object_ids.len()),
            Self::DoScreening { monitoring_id, .. } => write!(f, "do_screening({monitoring_id})"),
            Self::MatchEnrichment { screening_id } => write!(f, "match_enrichment({screening_id})"),
            Self::ScanDatasetUpdates => f.write_str("scan_dataset_updates"),
            Self::ApplyDeltaFile { job_id } => write!(f, "apply_delta_file({job_id})"),
            Self::BuildDataset { org_id } => write!(f, "build_dataset({org_id})"),
        }
    }
}
