//! FTM entities and delta records, as exported and as read from watchlist
//! delta files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vigil_core::entities::IngestedObject;
use vigil_core::mapping::DataModelMapping;

use crate::normalize::normalize_property;

/// Property carrying the link back to the source record.
pub const NOTES_PROPERTY: &str = "notes";

/// A Follow-The-Money entity.
///
/// Unknown top-level keys (`caption`, `referents`, ...) are kept in `extra`
/// so provider entities survive a decode/encode cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FtmEntity {
    pub id: String,
    pub schema: String,
    #[serde(default)]
    pub datasets: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FtmEntity {
    #[must_use]
    pub fn new(id: impl Into<String>, schema: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            schema: schema.into(),
            datasets: vec![dataset.into()],
            properties: BTreeMap::new(),
            extra: Map::new(),
        }
    }

    /// Property values that are plain strings, blanks skipped.
    ///
    /// Used to turn a watchlist entity back into search filters.
    #[must_use]
    pub fn string_properties(&self) -> BTreeMap<String, Vec<String>> {
        self.properties
            .iter()
            .filter_map(|(property, values)| {
                let strings: Vec<String> = values
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|s| !s.trim().is_empty())
                    .map(String::from)
                    .collect();
                (!strings.is_empty()).then(|| (property.clone(), strings))
            })
            .collect()
    }
}

/// Delta operation of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeltaOp {
    Add,
    Mod,
    Del,
}

/// One line of a delta file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaRecord<E = FtmEntity> {
    pub op: DeltaOp,
    pub entity: E,
}

/// Source-record linkage stored in the `notes` property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityNotes {
    pub object_id: String,
    pub object_type: String,
}

impl EntityNotes {
    /// Find the linkage blob in an entity payload, as returned by the
    /// provider for an exported org entity.
    #[must_use]
    pub fn from_payload(payload: &Value) -> Option<Self> {
        payload
            .pointer(&format!("/properties/{NOTES_PROPERTY}"))?
            .as_array()?
            .iter()
            .filter_map(Value::as_str)
            .find_map(|note| serde_json::from_str(note).ok())
    }
}

/// Export one ingested object as an FTM entity of the org dataset.
///
/// Mapped fields are visited in field-name order; blank or absent values are
/// left out and every value goes through [`normalize_property`].
#[must_use]
pub fn entity_from_object(
    entity_id: &str,
    dataset: &str,
    object: &IngestedObject,
    mapping: &DataModelMapping,
) -> FtmEntity {
    let mut entity = FtmEntity::new(entity_id, &mapping.entity_type, dataset);
    for (field, property) in &mapping.properties {
        let Some(value) = object.data.get(field) else {
            continue;
        };
        if value.is_blank() {
            continue;
        }
        let normalized = normalize_property(property, &value.string_repr());
        entity
            .properties
            .entry(property.clone())
            .or_default()
            .push(Value::String(normalized));
    }

    let blob = serde_json::json!({
        "objectId": object.object_id,
        "objectType": object.object_type,
    })
    .to_string();
    entity
        .properties
        .insert(NOTES_PROPERTY.to_string(), vec![Value::String(blob)]);
    entity
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use vigil_core::entities::Table;
    use vigil_core::mapping::build_mapping;
    use vigil_core::value::FieldValue;

    fn customer() -> IngestedObject {
        IngestedObject {
            internal_id: "int-1".into(),
            object_type: "customers".into(),
            object_id: "c-42".into(),
            valid_from: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            data: [
                ("full_name", FieldValue::from("Ada Lovelace")),
                ("alias", FieldValue::from("  ")),
                ("country", FieldValue::from("United Kingdom")),
                ("born", FieldValue::from("1815/12/10")),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        }
    }

    fn mapping() -> DataModelMapping {
        build_mapping(&Table::new(
            "customers",
            Some("Person"),
            &[
                ("full_name", Some("name")),
                ("alias", Some("name")),
                ("country", Some("nationality")),
                ("born", Some("birthDate")),
                ("missing", Some("idNumber")),
                ("internal_score", None),
            ],
        ))
        .unwrap()
    }

    #[test]
    fn exported_entity_shape() {
        let entity = entity_from_object("ent-1", "marble_org1", &customer(), &mapping());
        assert_eq!(
            serde_json::to_value(&entity).unwrap(),
            json!({
                "id": "ent-1",
                "schema": "Person",
                "datasets": ["marble_org1"],
                "properties": {
                    "birthDate": ["1815-12-10"],
                    "name": ["Ada Lovelace"],
                    "nationality": ["gb"],
                    "notes": ["{\"objectId\":\"c-42\",\"objectType\":\"customers\"}"]
                }
            })
        );
    }

    #[test]
    fn notes_round_trip_through_payload() {
        let entity = entity_from_object("ent-1", "marble_org1", &customer(), &mapping());
        let payload = serde_json::to_value(&entity).unwrap();
        assert_eq!(
            EntityNotes::from_payload(&payload),
            Some(EntityNotes {
                object_id: "c-42".into(),
                object_type: "customers".into(),
            })
        );
        assert_eq!(EntityNotes::from_payload(&json!({"id": "x"})), None);
    }

    #[test]
    fn delta_record_keeps_unknown_entity_keys() {
        let line = r#"{"op":"MOD","entity":{"id":"Q1","schema":"Person","datasets":["sanctions"],"caption":"Someone","properties":{"name":["Someone"],"sibling":[{"id":"Q2"}]}}}"#;
        let record: DeltaRecord = serde_json::from_str(line).unwrap();
        assert_eq!(record.op, DeltaOp::Mod);
        assert_eq!(record.entity.extra.get("caption"), Some(&json!("Someone")));
        assert_eq!(
            record.entity.string_properties(),
            BTreeMap::from([("name".to_string(), vec!["Someone".to_string()])])
        );
    }
}
