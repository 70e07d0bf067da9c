use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::DeltaOperation;

/// Append-only change log row for one exported entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeltaTrack {
    pub id: String,
    /// Stable id of the exported entity; shared by every track of an object.
    pub entity_id: String,
    pub object_type: String,
    pub object_id: String,
    /// Internal id of the ingested version, absent for deletes.
    pub object_internal_id: Option<String>,
    pub operation: DeltaOperation,
    /// Dataset file that folded this track, `None` while unexported.
    pub dataset_file_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
