use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Continuous screening configuration of an organization.
///
/// `stable_id` is assigned once and never changes; every external reference
/// (monitored objects, screenings) uses it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScreeningConfig {
    pub id: String,
    pub stable_id: String,
    pub org_id: String,
    pub name: String,
    pub description: Option<String>,
    /// Object types (table names) covered. Only ever grows.
    pub object_types: Vec<String>,
    pub algorithm: String,
    pub datasets: Vec<String>,
    /// Minimum match score, 0 to 100.
    pub match_threshold: u32,
    pub match_limit: u32,
    pub inbox_id: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScreeningConfig {
    #[must_use]
    pub fn covers(&self, object_type: &str) -> bool {
        self.object_types.iter().any(|t| t == object_type)
    }
}

/// Input for creating a config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewScreeningConfig {
    pub org_id: String,
    pub name: String,
    pub description: Option<String>,
    pub object_types: Vec<String>,
    pub algorithm: String,
    pub datasets: Vec<String>,
    pub match_threshold: u32,
    pub match_limit: u32,
    pub inbox_id: String,
}

/// Partial update of a config. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScreeningConfigUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    /// Full new list; must be a superset of the current one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datasets: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inbox_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}
