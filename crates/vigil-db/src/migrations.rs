//! Database migration runner.
//!
//! Embeds the SQL migration files at compile time and executes them when a
//! database is opened. All statements use `IF NOT EXISTS` for idempotent
//! re-running.

use crate::error::DatabaseError;

const CONTROL_001: &str = include_str!("../migrations/001_control.sql");
const ORG_001: &str = include_str!("../migrations/001_org.sql");

/// Which schema a database carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Schema {
    Control,
    Org,
}

pub(crate) async fn run_migrations(
    conn: &libsql::Connection,
    schema: Schema,
) -> Result<(), DatabaseError> {
    let (name, sql) = match schema {
        Schema::Control => ("001_control", CONTROL_001),
        Schema::Org => ("001_org", ORG_001),
    };
    conn.execute_batch(sql)
        .await
        .map_err(|e| DatabaseError::Migration(format!("{name}: {e}")))?;
    Ok(())
}
