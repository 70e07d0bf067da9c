//! Ports for collaborators Vigil depends on but does not own.
//!
//! Each consumer depends on the narrowest trait it needs so tests can swap in
//! a fake. `vigil-db` ships database-backed implementations of the data model,
//! case, and ingestion ports; access control is always supplied by the host.

use async_trait::async_trait;

use crate::entities::{Case, DataModel, NewCase, NewCaseEvent};
use crate::errors::CoreError;

/// Caller identity for permission checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub org_id: String,
    /// `None` for system actors (workers).
    pub user_id: Option<String>,
}

impl Credentials {
    #[must_use]
    pub fn user(org_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            user_id: Some(user_id.into()),
        }
    }

    #[must_use]
    pub fn system(org_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            user_id: None,
        }
    }
}

/// Feature gating and permission checks.
pub trait AccessControl: Send + Sync {
    /// The organization has the continuous screening feature.
    fn check_feature(&self, creds: &Credentials) -> Result<(), CoreError>;

    /// The caller may create or modify screening configs of `org_id`.
    fn can_write_config(&self, creds: &Credentials, org_id: &str) -> Result<(), CoreError>;

    /// The caller may register objects for monitoring in `org_id`.
    fn can_write_monitoring(&self, creds: &Credentials, org_id: &str) -> Result<(), CoreError>;

    /// The caller may review screening hits of `case_id` in `org_id`.
    fn can_review_hits(
        &self,
        creds: &Credentials,
        org_id: &str,
        case_id: &str,
    ) -> Result<(), CoreError>;

    /// The caller may add entries to the screening whitelist of `org_id`.
    fn can_write_whitelist(&self, creds: &Credentials, org_id: &str) -> Result<(), CoreError>;
}

/// Grants everything to callers of the caller's own organization.
///
/// For trusted internal callers (worker jobs, the CLI) that run without an
/// end user.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAccess;

impl SystemAccess {
    fn same_org(creds: &Credentials, org_id: &str) -> Result<(), CoreError> {
        if creds.org_id == org_id {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!(
                "credentials of {} cannot act on {org_id}",
                creds.org_id
            )))
        }
    }
}

impl AccessControl for SystemAccess {
    fn check_feature(&self, _creds: &Credentials) -> Result<(), CoreError> {
        Ok(())
    }

    fn can_write_config(&self, creds: &Credentials, org_id: &str) -> Result<(), CoreError> {
        Self::same_org(creds, org_id)
    }

    fn can_write_monitoring(&self, creds: &Credentials, org_id: &str) -> Result<(), CoreError> {
        Self::same_org(creds, org_id)
    }

    fn can_review_hits(
        &self,
        creds: &Credentials,
        org_id: &str,
        _case_id: &str,
    ) -> Result<(), CoreError> {
        Self::same_org(creds, org_id)
    }

    fn can_write_whitelist(&self, creds: &Credentials, org_id: &str) -> Result<(), CoreError> {
        Self::same_org(creds, org_id)
    }
}

/// Read access to an organization's table definitions.
#[async_trait]
pub trait DataModelRepository: Send + Sync {
    async fn get_data_model(&self, org_id: &str) -> Result<DataModel, CoreError>;
}

/// The generic object-ingestion pipeline.
#[async_trait]
pub trait Ingester: Send + Sync {
    /// Ingest one raw payload. Returns the number of rows written; `0` means
    /// the payload was older than the stored version.
    async fn ingest_object(
        &self,
        org_id: &str,
        object_type: &str,
        payload: &serde_json::Value,
    ) -> Result<usize, CoreError>;
}

/// Case management, limited to what screening needs.
#[async_trait]
pub trait CaseManager: Send + Sync {
    async fn create_case(&self, case: NewCase) -> Result<Case, CoreError>;

    async fn create_case_event(&self, event: NewCaseEvent) -> Result<(), CoreError>;

    /// Run post-creation side effects (assignment, webhooks, ...).
    async fn perform_case_side_effects(&self, case: &Case) -> Result<(), CoreError>;
}

/// Background enrichment of a screening's matches.
#[async_trait]
pub trait EnrichmentScheduler: Send + Sync {
    async fn schedule_enrichment(&self, screening_id: &str) -> Result<(), CoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn system_access_stays_in_its_organization() {
        let creds = Credentials::system("org-1");
        assert!(SystemAccess.can_write_monitoring(&creds, "org-1").is_ok());
        let err = SystemAccess.can_review_hits(&creds, "org-2", "case-1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }
}
