//! Data-model mapping: makes an organization table screenable.
//!
//! A table is eligible when it carries an FTM entity and at least one field
//! carries an FTM property. The mapping is derived on demand and never stored.
//! Properties are kept in a `BTreeMap` so every traversal is in field-name
//! order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entities::{IngestedObject, Table};
use crate::errors::CoreError;

/// Filters sent to the screening provider: FTM property → values.
pub type ScreeningFilters = BTreeMap<String, Vec<String>>;

/// FTM view of an organization table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataModelMapping {
    pub entity_type: String,
    /// Local field name → FTM property name.
    pub properties: BTreeMap<String, String>,
}

impl DataModelMapping {
    /// Local fields mapped to `property`, in field-name order.
    pub fn fields_for<'a>(&'a self, property: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.properties
            .iter()
            .filter(move |(_, p)| p.as_str() == property)
            .map(|(field, _)| field.as_str())
    }
}

/// Check that a table can be screened.
///
/// # Errors
///
/// Returns [`CoreError::BadParameter`] if the table has no FTM entity or no
/// field with an FTM property.
pub fn validate_table(table: &Table) -> Result<(), CoreError> {
    if table.ftm_entity.as_deref().is_none_or(str::is_empty) {
        return Err(CoreError::BadParameter(format!(
            "table {} does not have an FTM entity",
            table.name
        )));
    }
    let has_property = table
        .fields
        .values()
        .any(|f| f.ftm_property.as_deref().is_some_and(|p| !p.is_empty()));
    if !has_property {
        return Err(CoreError::BadParameter(format!(
            "table {} does not have any field with an FTM property",
            table.name
        )));
    }
    Ok(())
}

/// Build the FTM mapping of a table.
///
/// # Errors
///
/// Returns [`CoreError::BadParameter`] when [`validate_table`] fails.
pub fn build_mapping(table: &Table) -> Result<DataModelMapping, CoreError> {
    validate_table(table)?;
    let properties = table
        .fields
        .values()
        .filter_map(|f| {
            f.ftm_property
                .as_deref()
                .filter(|p| !p.is_empty())
                .map(|p| (f.name.clone(), p.to_string()))
        })
        .collect();
    Ok(DataModelMapping {
        entity_type: table.ftm_entity.clone().unwrap_or_default(),
        properties,
    })
}

/// First non-blank trimmed value among the fields mapped to `property`.
fn mapped_value(object: &IngestedObject, mapping: &DataModelMapping, property: &str) -> Option<String> {
    mapping.fields_for(property).find_map(|field| {
        object.data.get(field).and_then(|value| {
            let rendered = value.string_repr();
            let trimmed = rendered.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
    })
}

/// Derive the name of an auto-created case.
///
/// Priority: `name`, then `lastName firstName` (or whichever of the two is
/// present), `registrationNumber`, `imoNumber`, and finally the object id.
#[must_use]
pub fn case_name_from_ingested_object(object: &IngestedObject, mapping: &DataModelMapping) -> String {
    if let Some(name) = mapped_value(object, mapping, "name") {
        return name;
    }

    let last = mapped_value(object, mapping, "lastName");
    let first = mapped_value(object, mapping, "firstName");
    match (last, first) {
        (Some(last), Some(first)) => return format!("{last} {first}"),
        (Some(only), None) | (None, Some(only)) => return only,
        (None, None) => {}
    }

    ["registrationNumber", "imoNumber"]
        .into_iter()
        .find_map(|property| mapped_value(object, mapping, property))
        .unwrap_or_else(|| object.object_id.clone())
}

/// Build the provider filters for an ingested object.
///
/// Several local fields may map to one property; each contributes a value.
///
/// A mapped field that is null or whitespace-only must still exist on the
/// row, but its value is deliberately not sent. A property whose fields are
/// all blank is left out of the filters.
///
/// # Errors
///
/// Returns [`CoreError::FieldNotFound`] if a mapped field is absent from the
/// ingested row.
pub fn prepare_screening_filters(
    object: &IngestedObject,
    mapping: &DataModelMapping,
) -> Result<ScreeningFilters, CoreError> {
    let mut filters = ScreeningFilters::new();
    for (field, property) in &mapping.properties {
        let value = object.data.get(field).ok_or_else(|| CoreError::FieldNotFound {
            field: field.clone(),
            object_id: object.object_id.clone(),
        })?;
        if value.is_blank() {
            continue;
        }
        filters
            .entry(property.clone())
            .or_default()
            .push(value.string_repr());
    }
    Ok(filters)
}
