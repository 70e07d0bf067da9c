//! Worker pipeline tuning.

use serde::{Deserialize, Serialize};

const fn default_download_concurrency() -> usize {
    3
}

const fn default_dataset_page_size() -> u32 {
    1000
}

const fn default_max_exported_deltas() -> u32 {
    30
}

const fn default_offset_checkpoint_every() -> u64 {
    100
}

const fn default_screening_timeout_secs() -> u64 {
    30
}

const fn default_dataset_timeout_mins() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Concurrent watchlist delta downloads per scan. The worker caps it at 3.
    #[serde(default = "default_download_concurrency")]
    pub download_concurrency: usize,

    /// Delta tracks read per page when building a dataset.
    #[serde(default = "default_dataset_page_size")]
    pub dataset_page_size: u32,

    /// Deltas listed per organization in the exported delta list.
    #[serde(default = "default_max_exported_deltas")]
    pub max_exported_deltas: u32,

    /// Records between two offset checkpoints when applying a delta file.
    #[serde(default = "default_offset_checkpoint_every")]
    pub offset_checkpoint_every: u64,

    /// Timeout of evaluate / screening / enrichment jobs.
    #[serde(default = "default_screening_timeout_secs")]
    pub screening_timeout_secs: u64,

    /// Timeout of dataset scan / apply / build jobs.
    #[serde(default = "default_dataset_timeout_mins")]
    pub dataset_timeout_mins: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            download_concurrency: default_download_concurrency(),
            dataset_page_size: default_dataset_page_size(),
            max_exported_deltas: default_max_exported_deltas(),
            offset_checkpoint_every: default_offset_checkpoint_every(),
            screening_timeout_secs: default_screening_timeout_secs(),
            dataset_timeout_mins: default_dataset_timeout_mins(),
        }
    }
}
