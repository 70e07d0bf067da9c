//! Screening whitelist repository.

use vigil_core::entities::ScreeningWhitelist;

use crate::error::DatabaseError;
use crate::helpers::{fmt_datetime, get_opt_string, parse_datetime};

fn row_to_entry(row: &libsql::Row) -> Result<ScreeningWhitelist, DatabaseError> {
    Ok(ScreeningWhitelist {
        id: row.get::<String>(0)?,
        org_id: row.get::<String>(1)?,
        counterparty_id: row.get::<String>(2)?,
        entity_id: row.get::<String>(3)?,
        reviewer_id: get_opt_string(row, 4)?,
        created_at: parse_datetime(&row.get::<String>(5)?)?,
    })
}

/// Insert an entry. A duplicate `(org, counterparty, entity)` is a no-op.
/// Returns whether a row was written.
///
/// # Errors
///
/// Returns `DatabaseError` if the insert fails.
pub async fn insert(conn: &libsql::Connection, entry: &ScreeningWhitelist) -> Result<bool, DatabaseError> {
    let changed = conn
        .execute(
            "INSERT INTO screening_whitelists (id, org_id, counterparty_id, entity_id, reviewer_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (org_id, counterparty_id, entity_id) DO NOTHING",
            libsql::params![
                entry.id.as_str(),
                entry.org_id.as_str(),
                entry.counterparty_id.as_str(),
                entry.entity_id.as_str(),
                entry.reviewer_id.as_deref(),
                fmt_datetime(&entry.created_at)
            ],
        )
        .await?;
    Ok(changed > 0)
}

/// Entries of an organization, optionally restricted to one counterparty.
///
/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn list(
    conn: &libsql::Connection,
    org_id: &str,
    counterparty_id: Option<&str>,
) -> Result<Vec<ScreeningWhitelist>, DatabaseError> {
    let mut rows = match counterparty_id {
        Some(counterparty) => {
            conn.query(
                "SELECT id, org_id, counterparty_id, entity_id, reviewer_id, created_at
                 FROM screening_whitelists WHERE org_id = ?1 AND counterparty_id = ?2
                 ORDER BY created_at, id",
                [org_id, counterparty],
            )
            .await?
        }
        None => {
            conn.query(
                "SELECT id, org_id, counterparty_id, entity_id, reviewer_id, created_at
                 FROM screening_whitelists WHERE org_id = ?1 ORDER BY created_at, id",
                [org_id],
            )
            .await?
        }
    };
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(row_to_entry(&row)?);
    }
    Ok(out)
}

/// Whitelisted entity ids of one counterparty, sorted.
///
/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn entity_ids_for(
    conn: &libsql::Connection,
    org_id: &str,
    counterparty_id: &str,
) -> Result<Vec<String>, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT entity_id FROM screening_whitelists
             WHERE org_id = ?1 AND counterparty_id = ?2 ORDER BY entity_id",
            [org_id, counterparty_id],
        )
        .await?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next().await? {
        ids.push(row.get::<String>(0)?);
    }
    Ok(ids)
}

/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn is_whitelisted(
    conn: &libsql::Connection,
    org_id: &str,
    counterparty_id: &str,
    entity_id: &str,
) -> Result<bool, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT 1 FROM screening_whitelists
             WHERE org_id = ?1 AND counterparty_id = ?2 AND entity_id = ?3",
            [org_id, counterparty_id, entity_id],
        )
        .await?;
    Ok(rows.next().await?.is_some())
}

/// # Errors
///
/// Returns `DatabaseError::NotFound` if the entry does not exist in `org_id`.
pub async fn delete(conn: &libsql::Connection, org_id: &str, id: &str) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "DELETE FROM screening_whitelists WHERE id = ?1 AND org_id = ?2",
            [id, org_id],
        )
        .await?;
    if changed == 0 {
        return Err(DatabaseError::not_found("whitelist entry", id));
    }
    Ok(())
}
