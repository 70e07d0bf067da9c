//! Dataset bookkeeping: exported files, downloaded watchlist updates, update
//! jobs, and per-dataset version cursors.

use chrono::{DateTime, Utc};
use vigil_core::entities::{DatasetCursor, DatasetFile, DatasetUpdate, DatasetUpdateJob};
use vigil_core::enums::{DatasetFileType, UpdateJobStatus};

use crate::error::DatabaseError;
use crate::helpers::{fmt_datetime, get_u64, parse_datetime, parse_enum, to_i64};

// ---------------------------------------------------------------------------
// Exported dataset files
// ---------------------------------------------------------------------------

const FILE_COLUMNS: &str = "id, org_id, file_type, version, file_path, item_count, created_at";

fn row_to_file(row: &libsql::Row) -> Result<DatasetFile, DatabaseError> {
    Ok(DatasetFile {
        id: row.get::<String>(0)?,
        org_id: row.get::<String>(1)?,
        file_type: parse_enum(&row.get::<String>(2)?)?,
        version: row.get::<String>(3)?,
        file_path: row.get::<String>(4)?,
        item_count: get_u64(row, 5)?,
        created_at: parse_datetime(&row.get::<String>(6)?)?,
    })
}

async fn query_files(
    conn: &libsql::Connection,
    sql: &str,
    params: impl libsql::params::IntoParams,
) -> Result<Vec<DatasetFile>, DatabaseError> {
    let mut rows = conn.query(sql, params).await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(row_to_file(&row)?);
    }
    Ok(out)
}

/// # Errors
///
/// Returns `DatabaseError` if the insert fails.
pub async fn insert_file(conn: &libsql::Connection, file: &DatasetFile) -> Result<(), DatabaseError> {
    conn.execute(
        &format!("INSERT INTO dataset_files ({FILE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
        libsql::params![
            file.id.as_str(),
            file.org_id.as_str(),
            file.file_type.as_str(),
            file.version.as_str(),
            file.file_path.as_str(),
            to_i64(file.item_count)?,
            fmt_datetime(&file.created_at)
        ],
    )
    .await?;
    Ok(())
}

/// Most recent file of an organization, any type.
///
/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn latest_file(conn: &libsql::Connection, org_id: &str) -> Result<Option<DatasetFile>, DatabaseError> {
    let sql = format!(
        "SELECT {FILE_COLUMNS} FROM dataset_files WHERE org_id = ?1 ORDER BY version DESC LIMIT 1"
    );
    Ok(query_files(conn, &sql, [org_id]).await?.into_iter().next())
}

/// Most recent file of a given type.
///
/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn latest_file_of_type(
    conn: &libsql::Connection,
    org_id: &str,
    file_type: DatasetFileType,
) -> Result<Option<DatasetFile>, DatabaseError> {
    let sql = format!(
        "SELECT {FILE_COLUMNS} FROM dataset_files WHERE org_id = ?1 AND file_type = ?2
         ORDER BY version DESC LIMIT 1"
    );
    Ok(query_files(conn, &sql, [org_id, file_type.as_str()])
        .await?
        .into_iter()
        .next())
}

/// Most recent delta files of an organization, newest first.
///
/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn list_recent_deltas(
    conn: &libsql::Connection,
    org_id: &str,
    limit: u32,
) -> Result<Vec<DatasetFile>, DatabaseError> {
    let sql = format!(
        "SELECT {FILE_COLUMNS} FROM dataset_files WHERE org_id = ?1 AND file_type = ?2
         ORDER BY version DESC LIMIT ?3"
    );
    query_files(
        conn,
        &sql,
        libsql::params![org_id, DatasetFileType::Delta.as_str(), i64::from(limit)],
    )
    .await
}

/// Organizations that have exported at least one file.
///
/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn list_exporting_org_ids(conn: &libsql::Connection) -> Result<Vec<String>, DatabaseError> {
    let mut rows = conn
        .query("SELECT DISTINCT org_id FROM dataset_files ORDER BY org_id", ())
        .await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(row.get::<String>(0)?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Downloaded watchlist updates
// ---------------------------------------------------------------------------

const UPDATE_COLUMNS: &str = "id, dataset_name, version, delta_file_path, total_items, created_at";

fn row_to_update(row: &libsql::Row) -> Result<DatasetUpdate, DatabaseError> {
    Ok(DatasetUpdate {
        id: row.get::<String>(0)?,
        dataset_name: row.get::<String>(1)?,
        version: row.get::<String>(2)?,
        delta_file_path: row.get::<String>(3)?,
        total_items: get_u64(row, 4)?,
        created_at: parse_datetime(&row.get::<String>(5)?)?,
    })
}

/// # Errors
///
/// Returns `DatabaseError` if the insert fails (including a duplicate version).
pub async fn insert_update(conn: &libsql::Connection, update: &DatasetUpdate) -> Result<(), DatabaseError> {
    conn.execute(
        &format!("INSERT INTO dataset_updates ({UPDATE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
        libsql::params![
            update.id.as_str(),
            update.dataset_name.as_str(),
            update.version.as_str(),
            update.delta_file_path.as_str(),
            to_i64(update.total_items)?,
            fmt_datetime(&update.created_at)
        ],
    )
    .await?;
    Ok(())
}

/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn get_update(conn: &libsql::Connection, id: &str) -> Result<Option<DatasetUpdate>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {UPDATE_COLUMNS} FROM dataset_updates WHERE id = ?1"),
            [id],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(row_to_update(&row)?)),
        None => Ok(None),
    }
}

/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn find_update(
    conn: &libsql::Connection,
    dataset_name: &str,
    version: &str,
) -> Result<Option<DatasetUpdate>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {UPDATE_COLUMNS} FROM dataset_updates WHERE dataset_name = ?1 AND version = ?2"
            ),
            [dataset_name, version],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(row_to_update(&row)?)),
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Update jobs
// ---------------------------------------------------------------------------

const JOB_COLUMNS: &str = "id, dataset_update_id, org_id, config_id, status, processed_offset,
     processed_items, created_at, updated_at";

fn row_to_job(row: &libsql::Row) -> Result<DatasetUpdateJob, DatabaseError> {
    Ok(DatasetUpdateJob {
        id: row.get::<String>(0)?,
        dataset_update_id: row.get::<String>(1)?,
        org_id: row.get::<String>(2)?,
        config_id: row.get::<String>(3)?,
        status: parse_enum(&row.get::<String>(4)?)?,
        processed_offset: get_u64(row, 5)?,
        processed_items: get_u64(row, 6)?,
        created_at: parse_datetime(&row.get::<String>(7)?)?,
        updated_at: parse_datetime(&row.get::<String>(8)?)?,
    })
}

/// Insert a job unless one already exists for `(update, config)`.
/// Returns whether a row was written.
///
/// # Errors
///
/// Returns `DatabaseError` if the insert fails.
pub async fn insert_job(conn: &libsql::Connection, job: &DatasetUpdateJob) -> Result<bool, DatabaseError> {
    let changed = conn
        .execute(
            &format!(
                "INSERT INTO dataset_update_jobs ({JOB_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT (dataset_update_id, config_id) DO NOTHING"
            ),
            libsql::params![
                job.id.as_str(),
                job.dataset_update_id.as_str(),
                job.org_id.as_str(),
                job.config_id.as_str(),
                job.status.as_str(),
                to_i64(job.processed_offset)?,
                to_i64(job.processed_items)?,
                fmt_datetime(&job.created_at),
                fmt_datetime(&job.updated_at)
            ],
        )
        .await?;
    Ok(changed > 0)
}

/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn get_job(conn: &libsql::Connection, id: &str) -> Result<Option<DatasetUpdateJob>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {JOB_COLUMNS} FROM dataset_update_jobs WHERE id = ?1"),
            [id],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(row_to_job(&row)?)),
        None => Ok(None),
    }
}

/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn list_jobs_for_update(
    conn: &libsql::Connection,
    dataset_update_id: &str,
) -> Result<Vec<DatasetUpdateJob>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {JOB_COLUMNS} FROM dataset_update_jobs WHERE dataset_update_id = ?1
                 ORDER BY org_id, config_id"
            ),
            [dataset_update_id],
        )
        .await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(row_to_job(&row)?);
    }
    Ok(out)
}

/// Persist status and progress of a job.
///
/// # Errors
///
/// Returns `DatabaseError::NotFound` if no job has this id.
pub async fn update_job_progress(
    conn: &libsql::Connection,
    id: &str,
    status: UpdateJobStatus,
    processed_offset: u64,
    processed_items: u64,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE dataset_update_jobs
             SET status = ?1, processed_offset = ?2, processed_items = ?3, updated_at = ?4
             WHERE id = ?5",
            libsql::params![
                status.as_str(),
                to_i64(processed_offset)?,
                to_i64(processed_items)?,
                fmt_datetime(&now),
                id
            ],
        )
        .await?;
    if changed == 0 {
        return Err(DatabaseError::not_found("dataset update job", id));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Cursors
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn get_cursor(
    conn: &libsql::Connection,
    dataset_name: &str,
) -> Result<Option<DatasetCursor>, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT dataset_name, version, updated_at FROM dataset_cursors WHERE dataset_name = ?1",
            [dataset_name],
        )
        .await?;
    let Some(row) = rows.next().await? else {
        return Ok(None);
    };
    Ok(Some(DatasetCursor {
        dataset_name: row.get::<String>(0)?,
        version: row.get::<String>(1)?,
        updated_at: parse_datetime(&row.get::<String>(2)?)?,
    }))
}

/// # Errors
///
/// Returns `DatabaseError` if the upsert fails.
pub async fn upsert_cursor(
    conn: &libsql::Connection,
    dataset_name: &str,
    version: &str,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO dataset_cursors (dataset_name, version, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT (dataset_name) DO UPDATE SET version = excluded.version, updated_at = excluded.updated_at",
        libsql::params![dataset_name, version, fmt_datetime(&now)],
    )
    .await?;
    Ok(())
}
