//! Ingested object repository (organization database).
//!
//! Every ingested version is kept. The current version of an object is the
//! row whose `valid_until` is NULL; older versions stay addressable by their
//! internal id so delta tracks can point at the exact version they recorded.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use vigil_core::entities::IngestedObject;
use vigil_core::value::FieldValue;

use crate::error::DatabaseError;
use crate::helpers::{fmt_datetime, parse_datetime, parse_json, placeholders, to_json};

const COLUMNS: &str = "internal_id, object_type, object_id, valid_from, data";

fn row_to_object(row: &libsql::Row) -> Result<IngestedObject, DatabaseError> {
    let data: BTreeMap<String, FieldValue> = parse_json(&row.get::<String>(4)?)?;
    Ok(IngestedObject {
        internal_id: row.get::<String>(0)?,
        object_type: row.get::<String>(1)?,
        object_id: row.get::<String>(2)?,
        valid_from: parse_datetime(&row.get::<String>(3)?)?,
        data,
    })
}

async fn query_objects(
    conn: &libsql::Connection,
    sql: &str,
    params: impl libsql::params::IntoParams,
) -> Result<Vec<IngestedObject>, DatabaseError> {
    let mut rows = conn.query(sql, params).await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(row_to_object(&row)?);
    }
    Ok(out)
}

/// Store a new current version, closing the previous one at its `valid_from`.
///
/// # Errors
///
/// Returns `DatabaseError` if a statement fails.
pub async fn insert_version(
    conn: &libsql::Connection,
    object: &IngestedObject,
) -> Result<(), DatabaseError> {
    close_current(conn, &object.object_type, &object.object_id, object.valid_from).await?;
    conn.execute(
        &format!("INSERT INTO ingested_objects ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
        libsql::params![
            object.internal_id.as_str(),
            object.object_type.as_str(),
            object.object_id.as_str(),
            fmt_datetime(&object.valid_from),
            to_json(&object.data)?
        ],
    )
    .await?;
    Ok(())
}

async fn close_current(
    conn: &libsql::Connection,
    object_type: &str,
    object_id: &str,
    until: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE ingested_objects SET valid_until = ?1
         WHERE object_type = ?2 AND object_id = ?3 AND valid_until IS NULL",
        libsql::params![fmt_datetime(&until), object_type, object_id],
    )
    .await?;
    Ok(())
}

/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn get_current(
    conn: &libsql::Connection,
    object_type: &str,
    object_id: &str,
) -> Result<Option<IngestedObject>, DatabaseError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM ingested_objects
         WHERE object_type = ?1 AND object_id = ?2 AND valid_until IS NULL"
    );
    Ok(query_objects(conn, &sql, [object_type, object_id])
        .await?
        .into_iter()
        .next())
}

/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn get_by_internal_id(
    conn: &libsql::Connection,
    internal_id: &str,
) -> Result<Option<IngestedObject>, DatabaseError> {
    let sql = format!("SELECT {COLUMNS} FROM ingested_objects WHERE internal_id = ?1");
    Ok(query_objects(conn, &sql, [internal_id]).await?.into_iter().next())
}

/// Batch fetch of specific versions of one object type.
///
/// Missing ids are simply absent from the result; callers check the count.
///
/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn get_by_internal_ids(
    conn: &libsql::Connection,
    object_type: &str,
    internal_ids: &[String],
) -> Result<Vec<IngestedObject>, DatabaseError> {
    if internal_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT {COLUMNS} FROM ingested_objects
         WHERE object_type = ?1 AND internal_id IN ({})",
        placeholders(2, internal_ids.len())
    );
    let mut params: Vec<libsql::Value> = vec![object_type.into()];
    params.extend(internal_ids.iter().map(|id| libsql::Value::from(id.as_str())));
    query_objects(conn, &sql, libsql::params_from_iter(params)).await
}
