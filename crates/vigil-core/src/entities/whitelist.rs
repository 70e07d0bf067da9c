use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Suppresses a watchlist entity for a counterparty after a confirmed no-hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScreeningWhitelist {
    pub id: String,
    pub org_id: String,
    /// `{object_type}_{object_id}`.
    pub counterparty_id: String,
    pub entity_id: String,
    pub reviewer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
