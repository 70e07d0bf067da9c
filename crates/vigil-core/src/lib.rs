//! # vigil-core
//!
//! Core types, data-model mapping, and error kinds for Vigil.
//!
//! This crate provides the foundational types shared across all Vigil crates:
//! - Entity structs for screening configs, monitored objects, screenings,
//!   matches, delta tracks, whitelists, and dataset files
//! - Status enums with state machine transitions
//! - The tagged `FieldValue` union used for ingested object data
//! - Data-model mapping (table → FTM entity / property mapping)
//! - Cross-cutting error types and their user-visible kinds
//! - Ports for the collaborators Vigil does not own (ingestion, cases,
//!   access control, data model)

pub mod entities;
pub mod enums;
pub mod errors;
pub mod mapping;
pub mod ports;
pub mod value;

/// Generate a new random identifier (UUID v4, hyphenated).
#[must_use]
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Key identifying a counterparty in the whitelist: `{object_type}_{object_id}`.
#[must_use]
pub fn counterparty_identifier(object_type: &str, object_id: &str) -> String {
    format!("{object_type}_{object_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_id_is_uuid() {
        let id = new_id();
        assert_eq!(id.len(), 36);
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn counterparty_identifier_joins_with_underscore() {
        assert_eq!(
            counterparty_identifier("transactions", "tx-42"),
            "transactions_tx-42"
        );
    }
}
