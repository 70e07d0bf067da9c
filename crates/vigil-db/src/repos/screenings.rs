//! Continuous screening and match repository.

use chrono::{DateTime, Utc};
use vigil_core::entities::{ContinuousScreening, ContinuousScreeningWithMatches, ScreeningMatch};
use vigil_core::enums::{MatchStatus, ScreeningStatus};

use crate::error::DatabaseError;
use crate::helpers::{
    fmt_datetime, get_bool, get_opt_string, get_u32, parse_datetime, parse_enum, parse_json,
    parse_optional_json, to_json,
};

const SCREENING_COLUMNS: &str = "id, org_id, config_id, config_stable_id, case_id, object_type, object_id,
     object_internal_id, trigger_type, status, is_partial, number_of_matches, search_input,
     opensanctions_entity_id, opensanctions_entity_payload, opensanctions_entity_enriched,
     created_at, updated_at";

const MATCH_COLUMNS: &str = "id, screening_id, opensanctions_entity_id, status, payload, enriched,
     reviewed_by, created_at, updated_at";

fn row_to_screening(row: &libsql::Row) -> Result<ContinuousScreening, DatabaseError> {
    Ok(ContinuousScreening {
        id: row.get::<String>(0)?,
        org_id: row.get::<String>(1)?,
        config_id: row.get::<String>(2)?,
        config_stable_id: row.get::<String>(3)?,
        case_id: get_opt_string(row, 4)?,
        object_type: row.get::<String>(5)?,
        object_id: row.get::<String>(6)?,
        object_internal_id: row.get::<String>(7)?,
        trigger_type: parse_enum(&row.get::<String>(8)?)?,
        status: parse_enum(&row.get::<String>(9)?)?,
        is_partial: get_bool(row, 10)?,
        number_of_matches: get_u32(row, 11)?,
        search_input: parse_json(&row.get::<String>(12)?)?,
        opensanctions_entity_id: get_opt_string(row, 13)?,
        opensanctions_entity_payload: parse_optional_json(get_opt_string(row, 14)?.as_deref())?,
        opensanctions_entity_enriched: get_bool(row, 15)?,
        created_at: parse_datetime(&row.get::<String>(16)?)?,
        updated_at: parse_datetime(&row.get::<String>(17)?)?,
    })
}

fn row_to_match(row: &libsql::Row) -> Result<ScreeningMatch, DatabaseError> {
    Ok(ScreeningMatch {
        id: row.get::<String>(0)?,
        screening_id: row.get::<String>(1)?,
        opensanctions_entity_id: row.get::<String>(2)?,
        status: parse_enum(&row.get::<String>(3)?)?,
        payload: parse_json(&row.get::<String>(4)?)?,
        enriched: get_bool(row, 5)?,
        reviewed_by: get_opt_string(row, 6)?,
        created_at: parse_datetime(&row.get::<String>(7)?)?,
        updated_at: parse_datetime(&row.get::<String>(8)?)?,
    })
}

async fn query_screenings(
    conn: &libsql::Connection,
    sql: &str,
    params: impl libsql::params::IntoParams,
) -> Result<Vec<ContinuousScreening>, DatabaseError> {
    let mut rows = conn.query(sql, params).await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(row_to_screening(&row)?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Screenings
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns `DatabaseError` if the insert fails.
pub async fn insert_screening(
    conn: &libsql::Connection,
    s: &ContinuousScreening,
) -> Result<(), DatabaseError> {
    let payload = s
        .opensanctions_entity_payload
        .as_ref()
        .map(to_json)
        .transpose()?;
    conn.execute(
        &format!(
            "INSERT INTO continuous_screenings ({SCREENING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
        ),
        libsql::params![
            s.id.as_str(),
            s.org_id.as_str(),
            s.config_id.as_str(),
            s.config_stable_id.as_str(),
            s.case_id.as_deref(),
            s.object_type.as_str(),
            s.object_id.as_str(),
            s.object_internal_id.as_str(),
            s.trigger_type.as_str(),
            s.status.as_str(),
            i64::from(s.is_partial),
            i64::from(s.number_of_matches),
            to_json(&s.search_input)?,
            s.opensanctions_entity_id.as_deref(),
            payload,
            i64::from(s.opensanctions_entity_enriched),
            fmt_datetime(&s.created_at),
            fmt_datetime(&s.updated_at)
        ],
    )
    .await?;
    Ok(())
}

/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn get_screening(
    conn: &libsql::Connection,
    id: &str,
) -> Result<Option<ContinuousScreening>, DatabaseError> {
    let sql = format!("SELECT {SCREENING_COLUMNS} FROM continuous_screenings WHERE id = ?1");
    Ok(query_screenings(conn, &sql, [id]).await?.into_iter().next())
}

/// A screening with its matches in insertion order.
///
/// # Errors
///
/// Returns `DatabaseError` if a query fails.
pub async fn get_with_matches(
    conn: &libsql::Connection,
    id: &str,
) -> Result<Option<ContinuousScreeningWithMatches>, DatabaseError> {
    let Some(screening) = get_screening(conn, id).await? else {
        return Ok(None);
    };
    let matches = list_matches(conn, id).await?;
    Ok(Some(ContinuousScreeningWithMatches { screening, matches }))
}

/// Screenings of one object, newest first.
///
/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn list_for_object(
    conn: &libsql::Connection,
    org_id: &str,
    object_type: &str,
    object_id: &str,
) -> Result<Vec<ContinuousScreening>, DatabaseError> {
    let sql = format!(
        "SELECT {SCREENING_COLUMNS} FROM continuous_screenings
         WHERE org_id = ?1 AND object_type = ?2 AND object_id = ?3
         ORDER BY created_at DESC, rowid DESC"
    );
    query_screenings(conn, &sql, [org_id, object_type, object_id]).await
}

/// Most recent screening of an object under a config.
///
/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn latest_for_object(
    conn: &libsql::Connection,
    org_id: &str,
    config_stable_id: &str,
    object_type: &str,
    object_id: &str,
) -> Result<Option<ContinuousScreening>, DatabaseError> {
    let sql = format!(
        "SELECT {SCREENING_COLUMNS} FROM continuous_screenings
         WHERE org_id = ?1 AND config_stable_id = ?2 AND object_type = ?3 AND object_id = ?4
         ORDER BY created_at DESC, rowid DESC LIMIT 1"
    );
    Ok(query_screenings(conn, &sql, [org_id, config_stable_id, object_type, object_id])
        .await?
        .into_iter()
        .next())
}

/// Most recent screening of an object that is in review and bound to a case.
///
/// # Errors
///
/// Returns `DatabaseError` if a query fails.
pub async fn latest_in_review_with_case(
    conn: &libsql::Connection,
    org_id: &str,
    config_stable_id: &str,
    object_type: &str,
    object_id: &str,
) -> Result<Option<ContinuousScreeningWithMatches>, DatabaseError> {
    let sql = format!(
        "SELECT {SCREENING_COLUMNS} FROM continuous_screenings
         WHERE org_id = ?1 AND config_stable_id = ?2 AND object_type = ?3 AND object_id = ?4
           AND status = ?5 AND case_id IS NOT NULL
         ORDER BY created_at DESC, rowid DESC LIMIT 1"
    );
    let Some(screening) = query_screenings(
        conn,
        &sql,
        [
            org_id,
            config_stable_id,
            object_type,
            object_id,
            ScreeningStatus::InReview.as_str(),
        ],
    )
    .await?
    .into_iter()
    .next() else {
        return Ok(None);
    };
    let matches = list_matches(conn, &screening.id).await?;
    Ok(Some(ContinuousScreeningWithMatches { screening, matches }))
}

/// # Errors
///
/// Returns `DatabaseError::NotFound` if no screening has this id.
pub async fn set_case(
    conn: &libsql::Connection,
    screening_id: &str,
    case_id: &str,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE continuous_screenings SET case_id = ?1, updated_at = ?2 WHERE id = ?3",
            libsql::params![case_id, fmt_datetime(&now), screening_id],
        )
        .await?;
    if changed == 0 {
        return Err(DatabaseError::not_found("screening", screening_id));
    }
    Ok(())
}

/// # Errors
///
/// Returns `DatabaseError::NotFound` if no screening has this id.
pub async fn update_status(
    conn: &libsql::Connection,
    screening_id: &str,
    status: ScreeningStatus,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE continuous_screenings SET status = ?1, updated_at = ?2 WHERE id = ?3",
            libsql::params![status.as_str(), fmt_datetime(&now), screening_id],
        )
        .await?;
    if changed == 0 {
        return Err(DatabaseError::not_found("screening", screening_id));
    }
    Ok(())
}

/// Store the enriched payload of the screening's own watchlist entity.
///
/// # Errors
///
/// Returns `DatabaseError::NotFound` if no screening has this id.
pub async fn set_entity_enriched(
    conn: &libsql::Connection,
    screening_id: &str,
    payload: &serde_json::Value,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE continuous_screenings
             SET opensanctions_entity_payload = ?1, opensanctions_entity_enriched = 1, updated_at = ?2
             WHERE id = ?3",
            libsql::params![to_json(payload)?, fmt_datetime(&now), screening_id],
        )
        .await?;
    if changed == 0 {
        return Err(DatabaseError::not_found("screening", screening_id));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Matches
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns `DatabaseError` if an insert fails.
pub async fn insert_matches(
    conn: &libsql::Connection,
    matches: &[ScreeningMatch],
) -> Result<(), DatabaseError> {
    for m in matches {
        conn.execute(
            &format!(
                "INSERT INTO continuous_screening_matches ({MATCH_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            libsql::params![
                m.id.as_str(),
                m.screening_id.as_str(),
                m.opensanctions_entity_id.as_str(),
                m.status.as_str(),
                to_json(&m.payload)?,
                i64::from(m.enriched),
                m.reviewed_by.as_deref(),
                fmt_datetime(&m.created_at),
                fmt_datetime(&m.updated_at)
            ],
        )
        .await?;
    }
    Ok(())
}

/// Matches of a screening in insertion order.
///
/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn list_matches(
    conn: &libsql::Connection,
    screening_id: &str,
) -> Result<Vec<ScreeningMatch>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {MATCH_COLUMNS} FROM continuous_screening_matches
                 WHERE screening_id = ?1 ORDER BY rowid"
            ),
            [screening_id],
        )
        .await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(row_to_match(&row)?);
    }
    Ok(out)
}

/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn get_match(
    conn: &libsql::Connection,
    match_id: &str,
) -> Result<Option<ScreeningMatch>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {MATCH_COLUMNS} FROM continuous_screening_matches WHERE id = ?1"),
            [match_id],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(row_to_match(&row)?)),
        None => Ok(None),
    }
}

/// # Errors
///
/// Returns `DatabaseError::NotFound` if no match has this id.
pub async fn update_match_status(
    conn: &libsql::Connection,
    match_id: &str,
    status: MatchStatus,
    reviewed_by: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE continuous_screening_matches SET status = ?1, reviewed_by = ?2, updated_at = ?3
             WHERE id = ?4",
            libsql::params![status.as_str(), reviewed_by, fmt_datetime(&now), match_id],
        )
        .await?;
    if changed == 0 {
        return Err(DatabaseError::not_found("screening match", match_id));
    }
    Ok(())
}

/// Move every pending match of a screening to `Skipped`. Returns the count.
///
/// # Errors
///
/// Returns `DatabaseError` if the update fails.
pub async fn skip_pending_matches(
    conn: &libsql::Connection,
    screening_id: &str,
    reviewed_by: Option<&str>,
    now: DateTime<Utc>,
) -> Result<u64, DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE continuous_screening_matches SET status = ?1, reviewed_by = ?2, updated_at = ?3
             WHERE screening_id = ?4 AND status = ?5",
            libsql::params![
                MatchStatus::Skipped.as_str(),
                reviewed_by,
                fmt_datetime(&now),
                screening_id,
                MatchStatus::Pending.as_str()
            ],
        )
        .await?;
    Ok(changed)
}

/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn count_pending_matches(
    conn: &libsql::Connection,
    screening_id: &str,
) -> Result<u64, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT COUNT(*) FROM continuous_screening_matches WHERE screening_id = ?1 AND status = ?2",
            [screening_id, MatchStatus::Pending.as_str()],
        )
        .await?;
    let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
    crate::helpers::get_u64(&row, 0)
}

/// Store an enriched match payload.
///
/// # Errors
///
/// Returns `DatabaseError::NotFound` if no match has this id.
pub async fn set_match_enriched(
    conn: &libsql::Connection,
    match_id: &str,
    payload: &serde_json::Value,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE continuous_screening_matches SET payload = ?1, enriched = 1, updated_at = ?2
             WHERE id = ?3",
            libsql::params![to_json(payload)?, fmt_datetime(&now), match_id],
        )
        .await?;
    if changed == 0 {
        return Err(DatabaseError::not_found("screening match", match_id));
    }
    Ok(())
}

/// Latest dataset screening of an object against one watchlist entity.
/// Used to avoid re-screening the same pair twice for one dataset update.
///
/// # Errors
///
/// Returns `DatabaseError` if the query fails.
pub async fn find_dataset_screening(
    conn: &libsql::Connection,
    org_id: &str,
    object_internal_id: &str,
    entity_id: &str,
) -> Result<Option<ContinuousScreening>, DatabaseError> {
    let sql = format!(
        "SELECT {SCREENING_COLUMNS} FROM continuous_screenings
         WHERE org_id = ?1 AND object_internal_id = ?2 AND opensanctions_entity_id = ?3
         ORDER BY created_at DESC, rowid DESC LIMIT 1"
    );
    Ok(query_screenings(conn, &sql, [org_id, object_internal_id, entity_id])
        .await?
        .into_iter()
        .next())
}
