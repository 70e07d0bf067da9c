//! Delta track repository (organization database).
//!
//! Tracks are append-only. Their SQLite `rowid` gives the insertion order;
//! dataset builds capture the current maximum as a high-water mark so tracks
//! written during a build are left for the next one.

use vigil_core::entities::DeltaTrack;

use crate::error::DatabaseError;
use crate::helpers::{fmt_datetime, get_opt_string, parse_datetime, parse_enum};

const COLUMNS: &str = "t.id, t.entity_id, t.object_type, t.object_id, t.object_internal_id,
     t.operation, t.dataset_file_id, t.created_at";

fn row_to_track(row: &libsql::Row) -> Result<DeltaTrack, DatabaseError> {
    Ok(DeltaTrack {
        id: row.get::<String>(0)?,
        entity_id: row.get::<String>(1)?,
        object_type: row.get::<String>(2)?,
        object_id: row.get::<String>(3)?,
        object_internal_id: get_opt_string(row, 4)?,
        operation: parse_enum(&row.get::<String>(5)?)?,
        dataset_file_id: get_opt_string(row, 6)?,
        created_at: parse_datetime(&row.get::<String>(7)?)?,
    })
}

/// An unexported track together with whether its entity was exported before.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTrack {
    pub track: DeltaTrack,
    pub previously_exported: bool,
}

/// # Errors
///
/// Returns `DatabaseError` if the insert fails.
pub async fn insert(conn: &libsql::Connection, track: &DeltaTrack) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO delta_tracks (id, entity_id, object_type, object_id, object_internal_id,
             operation, dataset_file_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        libsql::params![
            track.id.as_str(),
            track.entity_id.as_str(),
            track.object_type.as_str(),
            track.object_id.as_str(),
            track.object_internal_id.as_deref(),
            track.operation.as_str(),
            track.dataset_file_id.as_deref(),
            fmt_datetime(&track.created_at)
        ],
    )
    .await?;
    Ok(())
}

/// Latest track of one object, if any.
///
/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn latest_for_object(
    conn: &libsql::Connection,
    object_type: &str,
    object_id: &str,
) -> Result<Option<DeltaTrack>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {COLUMNS} FROM delta_tracks t
                 WHERE t.object_type = ?1 AND t.object_id = ?2
                 ORDER BY t.rowid DESC LIMIT 1"
            ),
            [object_type, object_id],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(row_to_track(&row)?)),
        None => Ok(None),
    }
}

/// All tracks of one object in insertion order.
///
/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn list_for_object(
    conn: &libsql::Connection,
    object_type: &str,
    object_id: &str,
) -> Result<Vec<DeltaTrack>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {COLUMNS} FROM delta_tracks t
                 WHERE t.object_type = ?1 AND t.object_id = ?2 ORDER BY t.rowid"
            ),
            [object_type, object_id],
        )
        .await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(row_to_track(&row)?);
    }
    Ok(out)
}

/// Current maximum rowid, `0` for an empty table.
///
/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn high_water_mark(conn: &libsql::Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(rowid), 0) FROM delta_tracks", ())
        .await?;
    let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
    Ok(row.get::<i64>(0)?)
}

/// One page of the latest track per entity, ordered by entity id.
///
/// Only tracks at or below `up_to` are considered; `after` is the last entity
/// id of the previous page.
///
/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn page_latest(
    conn: &libsql::Connection,
    after: Option<&str>,
    up_to: i64,
    limit: u32,
) -> Result<Vec<DeltaTrack>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {COLUMNS} FROM delta_tracks t
                 WHERE t.entity_id > ?1
                   AND t.rowid = (SELECT MAX(rowid) FROM delta_tracks
                                  WHERE entity_id = t.entity_id AND rowid <= ?2)
                 ORDER BY t.entity_id LIMIT ?3"
            ),
            libsql::params![after.unwrap_or(""), up_to, i64::from(limit)],
        )
        .await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(row_to_track(&row)?);
    }
    Ok(out)
}

/// One page of the latest unexported track per entity, ordered by entity id.
///
/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn page_unexported(
    conn: &libsql::Connection,
    after: Option<&str>,
    up_to: i64,
    limit: u32,
) -> Result<Vec<PendingTrack>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {COLUMNS},
                     EXISTS (SELECT 1 FROM delta_tracks e
                             WHERE e.entity_id = t.entity_id AND e.dataset_file_id IS NOT NULL)
                 FROM delta_tracks t
                 WHERE t.entity_id > ?1
                   AND t.rowid = (SELECT MAX(rowid) FROM delta_tracks
                                  WHERE entity_id = t.entity_id AND rowid <= ?2
                                    AND dataset_file_id IS NULL)
                 ORDER BY t.entity_id LIMIT ?3"
            ),
            libsql::params![after.unwrap_or(""), up_to, i64::from(limit)],
        )
        .await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(PendingTrack {
            track: row_to_track(&row)?,
            previously_exported: row.get::<i64>(8)? != 0,
        });
    }
    Ok(out)
}

/// Attach every unexported track up to `up_to` to a dataset file.
///
/// # Errors
///
/// Returns `DatabaseError` if the update fails.
pub async fn mark_exported(
    conn: &libsql::Connection,
    dataset_file_id: &str,
    up_to: i64,
) -> Result<u64, DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE delta_tracks SET dataset_file_id = ?1
             WHERE dataset_file_id IS NULL AND rowid <= ?2",
            libsql::params![dataset_file_id, up_to],
        )
        .await?;
    Ok(changed)
}

/// Number of tracks not yet folded into a dataset file.
///
/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn count_unexported(conn: &libsql::Connection) -> Result<u64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COUNT(*) FROM delta_tracks WHERE dataset_file_id IS NULL", ())
        .await?;
    let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
    crate::helpers::get_u64(&row, 0)
}
