//! Access control with switchable denials.

use std::collections::BTreeSet;
use std::sync::Mutex;

use vigil_core::errors::CoreError;
use vigil_core::ports::{AccessControl, Credentials};

use crate::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Permission {
    Feature,
    WriteConfig,
    WriteMonitoring,
    ReviewHits,
    WriteWhitelist,
}

/// Grants everything until told otherwise.
#[derive(Debug, Default)]
pub struct TestAccess {
    denied: Mutex<BTreeSet<Permission>>,
}

impl TestAccess {
    #[must_use]
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn deny(&self, permission: Permission) {
        lock(&self.denied).insert(permission);
    }

    pub fn allow(&self, permission: Permission) {
        lock(&self.denied).remove(&permission);
    }

    fn check(&self, permission: Permission) -> Result<(), CoreError> {
        if lock(&self.denied).contains(&permission) {
            Err(CoreError::Forbidden(format!("{permission:?} denied")))
        } else {
            Ok(())
        }
    }
}

impl AccessControl for TestAccess {
    fn check_feature(&self, _creds: &Credentials) -> Result<(), CoreError> {
        self.check(Permission::Feature)
    }

    fn can_write_config(&self, _creds: &Credentials, _org_id: &str) -> Result<(), CoreError> {
        self.check(Permission::WriteConfig)
    }

    fn can_write_monitoring(&self, _creds: &Credentials, _org_id: &str) -> Result<(), CoreError> {
        self.check(Permission::WriteMonitoring)
    }

    fn can_review_hits(
        &self,
        _creds: &Credentials,
        _org_id: &str,
        _case_id: &str,
    ) -> Result<(), CoreError> {
        self.check(Permission::ReviewHits)
    }

    fn can_write_whitelist(&self, _creds: &Credentials, _org_id: &str) -> Result<(), CoreError> {
        self.check(Permission::WriteWhitelist)
    }
}
