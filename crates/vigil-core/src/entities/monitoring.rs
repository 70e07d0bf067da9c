use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An object registered for continuous screening under a config.
///
/// At most one row exists per `(object_type, object_id, config_stable_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitoredObject {
    pub id: String,
    pub object_type: String,
    pub object_id: String,
    pub config_stable_id: String,
    pub created_at: DateTime<Utc>,
}
