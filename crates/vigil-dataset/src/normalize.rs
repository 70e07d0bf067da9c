//! Property normalization for exported FTM entities.
//!
//! Country-like properties become lowercase ISO 3166-1 alpha-2 codes and
//! date-like properties become `YYYY-MM-DD`. Values that cannot be
//! recognized pass through unchanged.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::countries::{ALIASES, COUNTRIES};

const COUNTRY_PROPERTIES: &[&str] = &[
    "country",
    "nationality",
    "birthCountry",
    "citizenship",
    "jurisdiction",
    "mainCountry",
    "residency",
];

const DATE_PROPERTIES: &[&str] = &[
    "birthDate",
    "deathDate",
    "incorporationDate",
    "dissolutionDate",
    "startDate",
    "endDate",
    "date",
    "registrationDate",
    "buildDate",
];

static COUNTRY_LOOKUP: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut lookup = HashMap::with_capacity(COUNTRIES.len() * 3 + ALIASES.len());
    for (alpha2, alpha3, name) in COUNTRIES {
        lookup.insert(*alpha2, *alpha2);
        lookup.insert(*alpha3, *alpha2);
        lookup.insert(*name, *alpha2);
    }
    for (alias, alpha2) in ALIASES {
        lookup.insert(*alias, *alpha2);
    }
    lookup
});

/// Normalize a value according to the FTM property it is exported under.
#[must_use]
pub fn normalize_property(property: &str, value: &str) -> String {
    if COUNTRY_PROPERTIES.contains(&property) {
        normalize_country(value)
    } else if DATE_PROPERTIES.contains(&property) {
        normalize_date(value)
    } else {
        value.to_string()
    }
}

/// Canonicalize a country to its lowercase alpha-2 code.
///
/// Accepts alpha-2, alpha-3, English names (and common variants or typos),
/// and ISO 3166-2 subdivision codes, which resolve to their country.
#[must_use]
pub fn normalize_country(value: &str) -> String {
    let key = value
        .trim()
        .trim_end_matches('.')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    if let Some(code) = COUNTRY_LOOKUP.get(key.as_str()) {
        return (*code).to_string();
    }
    if let Some(code) = subdivision_country(&key) {
        return code.to_string();
    }
    value.to_string()
}

/// `fr-75`, `ch-ai`, `gb-eng` → parent alpha-2 when the parent is known.
fn subdivision_country(key: &str) -> Option<&'static str> {
    let (country, subdivision) = key.split_once('-')?;
    let valid_subdivision = (1..=3).contains(&subdivision.len())
        && subdivision.chars().all(|c| c.is_ascii_alphanumeric());
    if country.len() != 2 || !valid_subdivision {
        return None;
    }
    COUNTRIES
        .iter()
        .find(|(alpha2, _, _)| *alpha2 == country)
        .map(|(alpha2, _, _)| *alpha2)
}

/// Normalize a date to `YYYY-MM-DD`.
///
/// Accepts RFC 3339 timestamps, ISO 8601 dates with or without time,
/// `YYYY/MM/DD`, and compact `YYYYMMDD`.
#[must_use]
pub fn normalize_date(value: &str) -> String {
    let trimmed = value.trim();
    parse_date(trimmed).map_or_else(
        || value.to_string(),
        |date| date.format("%Y-%m-%d").to_string(),
    )
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.date());
        }
    }
    for format in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }
    if value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()) {
        return NaiveDate::parse_from_str(value, "%Y%m%d").ok();
    }
    None
}
