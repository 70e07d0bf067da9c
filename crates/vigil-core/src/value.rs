//! Tagged values for ingested object fields.
//!
//! Ingested rows arrive as loosely typed dictionaries. `FieldValue` pins the
//! shapes Vigil understands and defines the single string rendering used for
//! screening filters, case names, and exported properties.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A single field value of an ingested object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl FieldValue {
    /// Convert an arbitrary JSON value.
    ///
    /// Strings that parse as RFC 3339 become timestamps. Arrays and objects
    /// are kept as their compact JSON text.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Float(n.as_f64().unwrap_or_default()), Self::Integer),
            serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s).map_or_else(
                |_| Self::Text(s.clone()),
                |dt| Self::Timestamp(dt.with_timezone(&Utc)),
            ),
            other => Self::Text(other.to_string()),
        }
    }

    /// String rendering: timestamps as RFC 3339, null as the empty string,
    /// everything else in its default form.
    #[must_use]
    pub fn string_repr(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Timestamp(ts) => ts.to_rfc3339_opts(SecondsFormat::Secs, true),
            Self::Text(s) => s.clone(),
        }
    }

    /// True when the rendering is empty after trimming.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn timestamps_render_rfc3339() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(FieldValue::Timestamp(ts).string_repr(), "2024-03-09T14:05:07Z");
    }

    #[test]
    fn null_renders_empty() {
        assert_eq!(FieldValue::Null.string_repr(), "");
        assert!(FieldValue::Null.is_blank());
    }

    #[test]
    fn numbers_render_default_form() {
        assert_eq!(FieldValue::Integer(42).string_repr(), "42");
        assert_eq!(FieldValue::Float(1.5).string_repr(), "1.5");
        assert_eq!(FieldValue::Float(3.0).string_repr(), "3");
        assert_eq!(FieldValue::Bool(true).string_repr(), "true");
    }

    #[test]
    fn whitespace_text_is_blank() {
        assert!(FieldValue::from("   ").is_blank());
        assert!(!FieldValue::from(" a ").is_blank());
    }

    #[test]
    fn from_json_picks_variants() {
        assert_eq!(FieldValue::from_json(&serde_json::json!(7)), FieldValue::Integer(7));
        assert_eq!(FieldValue::from_json(&serde_json::json!(2.5)), FieldValue::Float(2.5));
        assert_eq!(FieldValue::from_json(&serde_json::json!(null)), FieldValue::Null);
        assert!(matches!(
            FieldValue::from_json(&serde_json::json!("2024-01-01T00:00:00Z")),
            FieldValue::Timestamp(_)
        ));
        assert_eq!(
            FieldValue::from_json(&serde_json::json!("Acme")),
            FieldValue::Text("Acme".into())
        );
    }
}
