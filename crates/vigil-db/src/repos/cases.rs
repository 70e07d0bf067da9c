//! Minimal case storage backing the database case manager.

use chrono::Utc;
use vigil_core::entities::{Case, NewCase, NewCaseEvent};

use crate::error::DatabaseError;
use crate::helpers::{fmt_datetime, parse_datetime, to_json};

/// # Errors
///
/// Returns `DatabaseError` if the insert fails.
pub async fn insert_case(conn: &libsql::Connection, new_case: &NewCase) -> Result<Case, DatabaseError> {
    let case = Case {
        id: vigil_core::new_id(),
        org_id: new_case.org_id.clone(),
        inbox_id: new_case.inbox_id.clone(),
        name: new_case.name.clone(),
        created_at: Utc::now(),
    };
    conn.execute(
        "INSERT INTO cases (id, org_id, inbox_id, name, screening_id, match_ids, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        libsql::params![
            case.id.as_str(),
            case.org_id.as_str(),
            case.inbox_id.as_str(),
            case.name.as_str(),
            new_case.screening_id.as_str(),
            to_json(&new_case.match_ids)?,
            fmt_datetime(&case.created_at)
        ],
    )
    .await?;
    Ok(case)
}

/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn get_case(conn: &libsql::Connection, id: &str) -> Result<Option<Case>, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT id, org_id, inbox_id, name, created_at FROM cases WHERE id = ?1",
            [id],
        )
        .await?;
    let Some(row) = rows.next().await? else {
        return Ok(None);
    };
    Ok(Some(Case {
        id: row.get::<String>(0)?,
        org_id: row.get::<String>(1)?,
        inbox_id: row.get::<String>(2)?,
        name: row.get::<String>(3)?,
        created_at: parse_datetime(&row.get::<String>(4)?)?,
    }))
}

/// # Errors
///
/// Returns `DatabaseError` if the insert fails.
pub async fn insert_event(conn: &libsql::Connection, event: &NewCaseEvent) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO case_events (id, org_id, case_id, user_id, event_type, resource_id, new_value, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        libsql::params![
            vigil_core::new_id(),
            event.org_id.as_str(),
            event.case_id.as_str(),
            event.user_id.as_deref(),
            event.event_type.as_str(),
            event.resource_id.as_str(),
            event.new_value.as_str(),
            fmt_datetime(&Utc::now())
        ],
    )
    .await?;
    Ok(())
}

/// `(event_type, new_value)` of every event of a case, oldest first.
///
/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn list_events(
    conn: &libsql::Connection,
    case_id: &str,
) -> Result<Vec<(String, String)>, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT event_type, new_value FROM case_events WHERE case_id = ?1 ORDER BY rowid",
            [case_id],
        )
        .await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push((row.get::<String>(0)?, row.get::<String>(1)?));
    }
    Ok(out)
}
