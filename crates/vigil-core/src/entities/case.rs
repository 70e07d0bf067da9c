use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::CaseEventType;

/// An investigation case, as far as screening needs to know it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Case {
    pub id: String,
    pub org_id: String,
    pub inbox_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewCase {
    pub org_id: String,
    pub inbox_id: String,
    pub name: String,
    pub screening_id: String,
    pub match_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewCaseEvent {
    pub org_id: String,
    pub case_id: String,
    pub user_id: Option<String>,
    pub event_type: CaseEventType,
    pub resource_id: String,
    pub new_value: String,
}
