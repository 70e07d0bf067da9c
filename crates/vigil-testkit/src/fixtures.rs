//! Shared test data.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{Value, json};
use vigil_core::entities::{NewScreeningConfig, Table};
use vigil_db::VigilDb;
use vigil_db::repos::data_model;

pub const ORG: &str = "org-1";
pub const CUSTOMERS: &str = "customers";
pub const WATCHLIST: &str = "sanctions";

/// A `Person` table with a name split in two, a nationality, and an
/// unmapped field.
#[must_use]
pub fn customers_table() -> Table {
    Table::new(
        CUSTOMERS,
        Some("Person"),
        &[
            ("first_name", Some("firstName")),
            ("last_name", Some("lastName")),
            ("country", Some("nationality")),
            ("segment", None),
        ],
    )
}

/// Register `table` in the data model of `org_id`.
///
/// # Panics
///
/// If the write fails.
pub async fn register_table(db: &VigilDb, org_id: &str, table: &Table) {
    let conn = db.control().await;
    data_model::upsert_table(&conn, org_id, table)
        .await
        .unwrap_or_else(|e| panic!("register table {}: {e}", table.name));
}

#[must_use]
pub fn new_config(org_id: &str, object_types: &[&str]) -> NewScreeningConfig {
    NewScreeningConfig {
        org_id: org_id.to_string(),
        name: "Customer monitoring".into(),
        description: None,
        object_types: object_types.iter().map(ToString::to_string).collect(),
        algorithm: "logic-v1".into(),
        datasets: vec![WATCHLIST.into()],
        match_threshold: 70,
        match_limit: 10,
        inbox_id: "inbox-1".into(),
    }
}

/// Base instant of the fixtures.
#[must_use]
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

/// A customer ingestion payload updated `minutes` after [`t0`].
#[must_use]
pub fn customer_payload(object_id: &str, first: &str, last: &str, minutes: i64) -> Value {
    customer_payload_at(object_id, first, last, t0() + Duration::minutes(minutes))
}

#[must_use]
pub fn customer_payload_at(
    object_id: &str,
    first: &str,
    last: &str,
    updated_at: DateTime<Utc>,
) -> Value {
    json!({
        "object_id": object_id,
        "updated_at": updated_at.to_rfc3339(),
        "first_name": first,
        "last_name": last,
        "country": "France",
        "segment": "retail",
    })
}
