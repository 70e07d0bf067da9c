use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A field of an organization table, optionally tagged with an FTM property.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ftm_property: Option<String>,
}

/// An organization table, optionally tagged with an FTM entity schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub ftm_entity: Option<String>,
    pub fields: BTreeMap<String, Field>,
}

impl Table {
    /// Build a table from `(field, ftm_property)` pairs.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        ftm_entity: Option<&str>,
        fields: &[(&str, Option<&str>)],
    ) -> Self {
        Self {
            name: name.into(),
            ftm_entity: ftm_entity.map(String::from),
            fields: fields
                .iter()
                .map(|(field, property)| {
                    (
                        (*field).to_string(),
                        Field {
                            name: (*field).to_string(),
                            ftm_property: property.map(String::from),
                        },
                    )
                })
                .collect(),
        }
    }
}

/// The set of tables of one organization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataModel {
    pub tables: BTreeMap<String, Table>,
}

impl DataModel {
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }
}
