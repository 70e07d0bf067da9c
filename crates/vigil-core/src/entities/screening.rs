use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{MatchStatus, ScreeningStatus, TriggerType};

/// One screening run against a specific object version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContinuousScreening {
    pub id: String,
    pub org_id: String,
    pub config_id: String,
    pub config_stable_id: String,
    pub case_id: Option<String>,
    pub object_type: String,
    pub object_id: String,
    pub object_internal_id: String,
    pub trigger_type: TriggerType,
    pub status: ScreeningStatus,
    /// The provider capped the result set; matches are not exhaustive.
    pub is_partial: bool,
    pub number_of_matches: u32,
    pub search_input: serde_json::Value,
    /// Watchlist entity carried by dataset-triggered screenings.
    pub opensanctions_entity_id: Option<String>,
    pub opensanctions_entity_payload: Option<serde_json::Value>,
    pub opensanctions_entity_enriched: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single ranked match of a screening.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreeningMatch {
    pub id: String,
    pub screening_id: String,
    pub opensanctions_entity_id: String,
    pub status: MatchStatus,
    pub payload: serde_json::Value,
    pub enriched: bool,
    pub reviewed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContinuousScreeningWithMatches {
    pub screening: ContinuousScreening,
    pub matches: Vec<ScreeningMatch>,
}

impl ContinuousScreeningWithMatches {
    /// Sorted entity ids of all matches.
    #[must_use]
    pub fn match_entity_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .matches
            .iter()
            .map(|m| m.opensanctions_entity_id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    #[must_use]
    pub fn pending_matches(&self) -> usize {
        self.matches
            .iter()
            .filter(|m| m.status == MatchStatus::Pending)
            .count()
    }
}
