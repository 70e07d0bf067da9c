use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{DatasetFileType, UpdateJobStatus};

/// An exported org dataset file (full snapshot or delta).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatasetFile {
    pub id: String,
    pub org_id: String,
    pub file_type: DatasetFileType,
    pub version: String,
    pub file_path: String,
    pub item_count: u64,
    pub created_at: DateTime<Utc>,
}

/// A downloaded watchlist delta file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatasetUpdate {
    pub id: String,
    pub dataset_name: String,
    pub version: String,
    pub delta_file_path: String,
    pub total_items: u64,
    pub created_at: DateTime<Utc>,
}

/// Application of one dataset update to one organization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatasetUpdateJob {
    pub id: String,
    pub dataset_update_id: String,
    pub org_id: String,
    pub config_id: String,
    pub status: UpdateJobStatus,
    /// Decoder offset of the last checkpointed record.
    pub processed_offset: u64,
    pub processed_items: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Last processed catalog version of a watchlist dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatasetCursor {
    pub dataset_name: String,
    pub version: String,
    pub updated_at: DateTime<Utc>,
}
