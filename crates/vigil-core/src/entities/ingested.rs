use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::FieldValue;

/// The current version of an ingested row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestedObject {
    /// Internal row id, changes with every ingested version.
    pub internal_id: String,
    pub object_type: String,
    /// Business identifier (`object_id` of the payload).
    pub object_id: String,
    pub valid_from: DateTime<Utc>,
    pub data: BTreeMap<String, FieldValue>,
}
