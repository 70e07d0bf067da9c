//! Monitored object repository (organization database).

use std::collections::BTreeSet;

use vigil_core::entities::MonitoredObject;

use crate::error::DatabaseError;
use crate::helpers::{fmt_datetime, parse_datetime, placeholders};

const COLUMNS: &str = "id, object_type, object_id, config_stable_id, created_at";

/// Object ids bound per query in batch lookups.
const OBJECT_ID_BATCH: usize = 500;

fn row_to_monitored(row: &libsql::Row) -> Result<MonitoredObject, DatabaseError> {
    Ok(MonitoredObject {
        id: row.get::<String>(0)?,
        object_type: row.get::<String>(1)?,
        object_id: row.get::<String>(2)?,
        config_stable_id: row.get::<String>(3)?,
        created_at: parse_datetime(&row.get::<String>(4)?)?,
    })
}

async fn query_monitored(
    conn: &libsql::Connection,
    sql: &str,
    params: impl libsql::params::IntoParams,
) -> Result<Vec<MonitoredObject>, DatabaseError> {
    let mut rows = conn.query(sql, params).await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(row_to_monitored(&row)?);
    }
    Ok(out)
}

/// Register an object. A second registration under the same config fails
/// with a unique violation (see [`DatabaseError::is_unique_violation`]).
///
/// # Errors
///
/// Returns `DatabaseError` if the insert fails.
pub async fn insert(conn: &libsql::Connection, object: &MonitoredObject) -> Result<(), DatabaseError> {
    conn.execute(
        &format!("INSERT INTO monitored_objects ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
        libsql::params![
            object.id.as_str(),
            object.object_type.as_str(),
            object.object_id.as_str(),
            object.config_stable_id.as_str(),
            fmt_datetime(&object.created_at)
        ],
    )
    .await?;
    Ok(())
}

/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn get(conn: &libsql::Connection, id: &str) -> Result<Option<MonitoredObject>, DatabaseError> {
    let sql = format!("SELECT {COLUMNS} FROM monitored_objects WHERE id = ?1");
    Ok(query_monitored(conn, &sql, [id]).await?.into_iter().next())
}

/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn find(
    conn: &libsql::Connection,
    object_type: &str,
    object_id: &str,
    config_stable_id: &str,
) -> Result<Option<MonitoredObject>, DatabaseError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM monitored_objects
         WHERE object_type = ?1 AND object_id = ?2 AND config_stable_id = ?3"
    );
    Ok(query_monitored(conn, &sql, [object_type, object_id, config_stable_id])
        .await?
        .into_iter()
        .next())
}

/// Monitoring rows of the given objects under the given configs, ordered by
/// object id then config. Object ids are looked up in batches of 500.
///
/// # Errors
///
/// Returns `DatabaseError` if a query fails.
pub async fn list_for_objects(
    conn: &libsql::Connection,
    object_type: &str,
    object_ids: &[String],
    config_stable_ids: &[String],
) -> Result<Vec<MonitoredObject>, DatabaseError> {
    if object_ids.is_empty() || config_stable_ids.is_empty() {
        return Ok(Vec::new());
    }
    let object_ids: Vec<&str> = object_ids
        .iter()
        .map(String::as_str)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut monitored = Vec::new();
    for batch in object_ids.chunks(OBJECT_ID_BATCH) {
        let sql = format!(
            "SELECT {COLUMNS} FROM monitored_objects
             WHERE object_type = ?1 AND object_id IN ({}) AND config_stable_id IN ({})
             ORDER BY object_id, config_stable_id",
            placeholders(2, batch.len()),
            placeholders(2 + batch.len(), config_stable_ids.len())
        );
        let mut params: Vec<libsql::Value> = vec![object_type.into()];
        params.extend(batch.iter().map(|id| libsql::Value::from(*id)));
        params.extend(config_stable_ids.iter().map(|id| libsql::Value::from(id.as_str())));
        monitored.extend(query_monitored(conn, &sql, libsql::params_from_iter(params)).await?);
    }
    Ok(monitored)
}

/// Every config monitoring one object.
///
/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn list_for_object(
    conn: &libsql::Connection,
    object_type: &str,
    object_id: &str,
) -> Result<Vec<MonitoredObject>, DatabaseError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM monitored_objects WHERE object_type = ?1 AND object_id = ?2
         ORDER BY config_stable_id"
    );
    query_monitored(conn, &sql, [object_type, object_id]).await
}

/// # Errors
///
/// Returns `DatabaseError::NotFound` if no row has this id.
pub async fn delete(conn: &libsql::Connection, id: &str) -> Result<(), DatabaseError> {
    let changed = conn
        .execute("DELETE FROM monitored_objects WHERE id = ?1", [id])
        .await?;
    if changed == 0 {
        return Err(DatabaseError::not_found("monitored object", id));
    }
    Ok(())
}
