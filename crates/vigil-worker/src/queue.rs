//! Job queue port and the in-process queue used by the CLI and tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use vigil_core::errors::CoreError;
use vigil_core::ports::EnrichmentScheduler;

use crate::error::WorkerError;
use crate::jobs::Job;

/// Where handlers put follow-up jobs. Retries and scheduling belong to the
/// implementation.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: Job) -> Result<(), WorkerError>;
}

/// FIFO queue held in memory.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    jobs: Mutex<VecDeque<Job>>,
}

impl InMemoryQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn pop(&self) -> Option<Job> {
        self.jobs.lock().await.pop_front()
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }

    /// Queued jobs, oldest first, without removing them.
    pub async fn snapshot(&self) -> Vec<Job> {
        self.jobs.lock().await.iter().cloned().collect()
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    async fn enqueue(&self, job: Job) -> Result<(), WorkerError> {
        tracing::debug!(job = %job, "job enqueued");
        self.jobs.lock().await.push_back(job);
        Ok(())
    }
}

/// Schedules enrichment of fresh screenings as `MatchEnrichment` jobs.
pub struct QueueEnrichment {
    queue: Arc<dyn JobQueue>,
}

impl QueueEnrichment {
    #[must_use]
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl EnrichmentScheduler for QueueEnrichment {
    async fn schedule_enrichment(&self, screening_id: &str) -> Result<(), CoreError> {
        self.queue
            .enqueue(Job::MatchEnrichment {
                screening_id: screening_id.to_string(),
            })
            .await
            .map_err(|e| CoreError::Other(anyhow::Error::new(e)))
    }
}
