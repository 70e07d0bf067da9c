//! Data model repository: organization tables and their FTM tagging.

use std::collections::BTreeMap;

use vigil_core::entities::{DataModel, Field, Table};

use crate::error::DatabaseError;
use crate::helpers::get_opt_string;

/// Load every table of an organization with its fields.
///
/// # Errors
///
/// Returns `DatabaseError` if a query fails.
pub async fn get_data_model(conn: &libsql::Connection, org_id: &str) -> Result<DataModel, DatabaseError> {
    let mut tables = BTreeMap::new();

    let mut rows = conn
        .query(
            "SELECT name, ftm_entity FROM data_model_tables WHERE org_id = ?1 ORDER BY name",
            [org_id],
        )
        .await?;
    while let Some(row) = rows.next().await? {
        let name = row.get::<String>(0)?;
        tables.insert(
            name.clone(),
            Table {
                name,
                ftm_entity: get_opt_string(&row, 1)?,
                fields: BTreeMap::new(),
            },
        );
    }

    let mut rows = conn
        .query(
            "SELECT table_name, name, ftm_property FROM data_model_fields
             WHERE org_id = ?1 ORDER BY table_name, name",
            [org_id],
        )
        .await?;
    while let Some(row) = rows.next().await? {
        let table_name = row.get::<String>(0)?;
        let field = Field {
            name: row.get::<String>(1)?,
            ftm_property: get_opt_string(&row, 2)?,
        };
        if let Some(table) = tables.get_mut(&table_name) {
            table.fields.insert(field.name.clone(), field);
        } else {
            tracing::warn!(org_id, table = %table_name, field = %field.name, "field of unknown table ignored");
        }
    }

    Ok(DataModel { tables })
}

/// Create or replace one table definition with all its fields.
///
/// # Errors
///
/// Returns `DatabaseError` if a statement fails.
pub async fn upsert_table(conn: &libsql::Connection, org_id: &str, table: &Table) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO data_model_tables (org_id, name, ftm_entity) VALUES (?1, ?2, ?3)
         ON CONFLICT (org_id, name) DO UPDATE SET ftm_entity = excluded.ftm_entity",
        libsql::params![org_id, table.name.as_str(), table.ftm_entity.as_deref()],
    )
    .await?;
    conn.execute(
        "DELETE FROM data_model_fields WHERE org_id = ?1 AND table_name = ?2",
        [org_id, table.name.as_str()],
    )
    .await?;
    for field in table.fields.values() {
        conn.execute(
            "INSERT INTO data_model_fields (org_id, table_name, name, ftm_property) VALUES (?1, ?2, ?3, ?4)",
            libsql::params![
                org_id,
                table.name.as_str(),
                field.name.as_str(),
                field.ftm_property.as_deref()
            ],
        )
        .await?;
    }
    Ok(())
}
