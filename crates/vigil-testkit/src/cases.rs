//! Case manager that records what it is asked to do.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use vigil_core::entities::{Case, NewCase, NewCaseEvent};
use vigil_core::errors::CoreError;
use vigil_core::ports::CaseManager;

use crate::lock;

#[derive(Debug, Default)]
pub struct RecordingCaseManager {
    cases: Mutex<Vec<(Case, NewCase)>>,
    events: Mutex<Vec<NewCaseEvent>>,
    side_effects: Mutex<Vec<String>>,
    fail_creation: AtomicBool,
}

impl RecordingCaseManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `create_case` fail.
    pub fn fail_creation(&self, fail: bool) {
        self.fail_creation.store(fail, Ordering::SeqCst);
    }

    /// Requests of the cases created so far.
    #[must_use]
    pub fn created(&self) -> Vec<NewCase> {
        lock(&self.cases).iter().map(|(_, new)| new.clone()).collect()
    }

    #[must_use]
    pub fn events(&self) -> Vec<NewCaseEvent> {
        lock(&self.events).clone()
    }

    /// Case ids whose side effects ran.
    #[must_use]
    pub fn side_effects(&self) -> Vec<String> {
        lock(&self.side_effects).clone()
    }
}

#[async_trait]
impl CaseManager for RecordingCaseManager {
    async fn create_case(&self, case: NewCase) -> Result<Case, CoreError> {
        if self.fail_creation.load(Ordering::SeqCst) {
            return Err(CoreError::Other(anyhow::anyhow!("case store unavailable")));
        }
        let created = Case {
            id: vigil_core::new_id(),
            org_id: case.org_id.clone(),
            inbox_id: case.inbox_id.clone(),
            name: case.name.clone(),
            created_at: Utc::now(),
        };
        lock(&self.cases).push((created.clone(), case));
        Ok(created)
    }

    async fn create_case_event(&self, event: NewCaseEvent) -> Result<(), CoreError> {
        lock(&self.events).push(event);
        Ok(())
    }

    async fn perform_case_side_effects(&self, case: &Case) -> Result<(), CoreError> {
        lock(&self.side_effects).push(case.id.clone());
        Ok(())
    }
}
