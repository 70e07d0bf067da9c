//! Database-backed implementations of the vigil-core collaborator ports.
//!
//! Hosts with their own case management or ingestion pipeline plug in their
//! own implementations; these cover the standalone binary and the tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use vigil_core::entities::{Case, DataModel, IngestedObject, NewCase, NewCaseEvent};
use vigil_core::errors::CoreError;
use vigil_core::ports::{CaseManager, DataModelRepository, Ingester};
use vigil_core::value::FieldValue;

use crate::VigilDb;
use crate::repos::{cases, data_model, ingested};

/// Reads table definitions from the control database.
pub struct DbDataModelRepository {
    db: Arc<VigilDb>,
}

impl DbDataModelRepository {
    #[must_use]
    pub const fn new(db: Arc<VigilDb>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DataModelRepository for DbDataModelRepository {
    async fn get_data_model(&self, org_id: &str) -> Result<DataModel, CoreError> {
        let conn = self.db.control().await;
        Ok(data_model::get_data_model(&conn, org_id).await?)
    }
}

/// Stores cases and case events in the control database.
pub struct DbCaseManager {
    db: Arc<VigilDb>,
}

impl DbCaseManager {
    #[must_use]
    pub const fn new(db: Arc<VigilDb>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CaseManager for DbCaseManager {
    async fn create_case(&self, case: NewCase) -> Result<Case, CoreError> {
        let conn = self.db.control().await;
        Ok(cases::insert_case(&conn, &case).await?)
    }

    async fn create_case_event(&self, event: NewCaseEvent) -> Result<(), CoreError> {
        let conn = self.db.control().await;
        Ok(cases::insert_event(&conn, &event).await?)
    }

    async fn perform_case_side_effects(&self, case: &Case) -> Result<(), CoreError> {
        tracing::debug!(case_id = %case.id, org_id = %case.org_id, "no case side effects configured");
        Ok(())
    }
}

/// Writes versioned objects into the organization database.
///
/// A payload must carry `object_id` (string) and `updated_at` (RFC 3339).
/// A payload whose `updated_at` is not newer than the stored version is
/// stale and writes nothing.
pub struct DbIngester {
    db: Arc<VigilDb>,
}

impl DbIngester {
    #[must_use]
    pub const fn new(db: Arc<VigilDb>) -> Self {
        Self { db }
    }
}

/// Parse a raw payload into an ingested object with a fresh internal id.
///
/// # Errors
///
/// Returns [`CoreError::BadParameter`] if the payload is not an object or
/// misses `object_id` / `updated_at`.
pub fn object_from_payload(
    object_type: &str,
    payload: &serde_json::Value,
) -> Result<IngestedObject, CoreError> {
    let fields = payload
        .as_object()
        .ok_or_else(|| CoreError::BadParameter("payload must be a JSON object".into()))?;
    let object_id = fields
        .get("object_id")
        .and_then(serde_json::Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| CoreError::BadParameter("payload is missing object_id".into()))?;
    let updated_at = fields
        .get("updated_at")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| CoreError::BadParameter("payload is missing updated_at".into()))?;
    let valid_from = DateTime::parse_from_rfc3339(updated_at)
        .map_err(|e| CoreError::BadParameter(format!("invalid updated_at '{updated_at}': {e}")))?
        .to_utc();

    Ok(IngestedObject {
        internal_id: vigil_core::new_id(),
        object_type: object_type.to_string(),
        object_id: object_id.to_string(),
        valid_from,
        data: fields
            .iter()
            .map(|(k, v)| (k.clone(), FieldValue::from_json(v)))
            .collect(),
    })
}

#[async_trait]
impl Ingester for DbIngester {
    async fn ingest_object(
        &self,
        org_id: &str,
        object_type: &str,
        payload: &serde_json::Value,
    ) -> Result<usize, CoreError> {
        let object = object_from_payload(object_type, payload)?;

        let tx = self.db.org_tx(org_id).await?;
        if let Some(current) = ingested::get_current(&tx, object_type, &object.object_id).await? {
            if current.valid_from >= object.valid_from {
                tracing::debug!(
                    org_id,
                    object_type,
                    object_id = %object.object_id,
                    "payload is not newer than stored version"
                );
                return Ok(0);
            }
        }
        ingested::insert_version(&tx, &object).await?;
        tx.commit().await?;
        Ok(1)
    }
}
