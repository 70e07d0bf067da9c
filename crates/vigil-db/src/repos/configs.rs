//! Screening config repository.

use vigil_core::entities::ScreeningConfig;

use crate::error::DatabaseError;
use crate::helpers::{fmt_datetime, get_bool, get_opt_string, get_u32, parse_datetime, parse_json, to_json};

const COLUMNS: &str = "id, stable_id, org_id, name, description, object_types, algorithm, datasets,
     match_threshold, match_limit, inbox_id, enabled, created_at, updated_at";

fn row_to_config(row: &libsql::Row) -> Result<ScreeningConfig, DatabaseError> {
    Ok(ScreeningConfig {
        id: row.get::<String>(0)?,
        stable_id: row.get::<String>(1)?,
        org_id: row.get::<String>(2)?,
        name: row.get::<String>(3)?,
        description: get_opt_string(row, 4)?,
        object_types: parse_json(&row.get::<String>(5)?)?,
        algorithm: row.get::<String>(6)?,
        datasets: parse_json(&row.get::<String>(7)?)?,
        match_threshold: get_u32(row, 8)?,
        match_limit: get_u32(row, 9)?,
        inbox_id: row.get::<String>(10)?,
        enabled: get_bool(row, 11)?,
        created_at: parse_datetime(&row.get::<String>(12)?)?,
        updated_at: parse_datetime(&row.get::<String>(13)?)?,
    })
}

async fn query_configs(
    conn: &libsql::Connection,
    sql: &str,
    params: impl libsql::params::IntoParams,
) -> Result<Vec<ScreeningConfig>, DatabaseError> {
    let mut rows = conn.query(sql, params).await?;
    let mut configs = Vec::new();
    while let Some(row) = rows.next().await? {
        configs.push(row_to_config(&row)?);
    }
    Ok(configs)
}

/// # Errors
///
/// Returns `DatabaseError` if the insert fails (including a duplicate stable id).
pub async fn insert(conn: &libsql::Connection, config: &ScreeningConfig) -> Result<(), DatabaseError> {
    conn.execute(
        &format!("INSERT INTO screening_configs ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"),
        libsql::params![
            config.id.as_str(),
            config.stable_id.as_str(),
            config.org_id.as_str(),
            config.name.as_str(),
            config.description.as_deref(),
            to_json(&config.object_types)?,
            config.algorithm.as_str(),
            to_json(&config.datasets)?,
            i64::from(config.match_threshold),
            i64::from(config.match_limit),
            config.inbox_id.as_str(),
            i64::from(config.enabled),
            fmt_datetime(&config.created_at),
            fmt_datetime(&config.updated_at)
        ],
    )
    .await?;
    Ok(())
}

/// Overwrite every mutable column of an existing config.
///
/// # Errors
///
/// Returns `DatabaseError::NotFound` if no config has this id.
pub async fn update(conn: &libsql::Connection, config: &ScreeningConfig) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE screening_configs SET name = ?1, description = ?2, object_types = ?3, algorithm = ?4,
                 datasets = ?5, match_threshold = ?6, match_limit = ?7, inbox_id = ?8, enabled = ?9,
                 updated_at = ?10
             WHERE id = ?11",
            libsql::params![
                config.name.as_str(),
                config.description.as_deref(),
                to_json(&config.object_types)?,
                config.algorithm.as_str(),
                to_json(&config.datasets)?,
                i64::from(config.match_threshold),
                i64::from(config.match_limit),
                config.inbox_id.as_str(),
                i64::from(config.enabled),
                fmt_datetime(&config.updated_at),
                config.id.as_str()
            ],
        )
        .await?;
    if changed == 0 {
        return Err(DatabaseError::not_found("screening config", config.id.as_str()));
    }
    Ok(())
}

/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn get_by_stable_id(
    conn: &libsql::Connection,
    stable_id: &str,
) -> Result<Option<ScreeningConfig>, DatabaseError> {
    let sql = format!("SELECT {COLUMNS} FROM screening_configs WHERE stable_id = ?1");
    Ok(query_configs(conn, &sql, [stable_id]).await?.into_iter().next())
}

/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn get(conn: &libsql::Connection, id: &str) -> Result<Option<ScreeningConfig>, DatabaseError> {
    let sql = format!("SELECT {COLUMNS} FROM screening_configs WHERE id = ?1");
    Ok(query_configs(conn, &sql, [id]).await?.into_iter().next())
}

/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn list_by_org(
    conn: &libsql::Connection,
    org_id: &str,
) -> Result<Vec<ScreeningConfig>, DatabaseError> {
    let sql = format!("SELECT {COLUMNS} FROM screening_configs WHERE org_id = ?1 ORDER BY created_at, id");
    query_configs(conn, &sql, [org_id]).await
}

/// Enabled configs of every organization.
///
/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn list_enabled(conn: &libsql::Connection) -> Result<Vec<ScreeningConfig>, DatabaseError> {
    let sql = format!("SELECT {COLUMNS} FROM screening_configs WHERE enabled = 1 ORDER BY org_id, created_at, id");
    query_configs(conn, &sql, ()).await
}

/// Enabled configs of `org_id` covering `object_type`.
///
/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn list_enabled_for_object_type(
    conn: &libsql::Connection,
    org_id: &str,
    object_type: &str,
) -> Result<Vec<ScreeningConfig>, DatabaseError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM screening_configs WHERE org_id = ?1 AND enabled = 1 ORDER BY created_at, id"
    );
    Ok(query_configs(conn, &sql, [org_id])
        .await?
        .into_iter()
        .filter(|c| c.covers(object_type))
        .collect())
}

/// Organizations with at least one enabled config.
///
/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn list_active_org_ids(conn: &libsql::Connection) -> Result<Vec<String>, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT DISTINCT org_id FROM screening_configs WHERE enabled = 1 ORDER BY org_id",
            (),
        )
        .await?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next().await? {
        ids.push(row.get::<String>(0)?);
    }
    Ok(ids)
}
