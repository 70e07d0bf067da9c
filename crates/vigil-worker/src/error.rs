//! Worker error types.

use vigil_core::errors::{CoreError, ErrorKind};
use vigil_dataset::DatasetError;
use vigil_db::error::DatabaseError;
use vigil_provider::ProviderError;
use vigil_screening::ScreeningError;

/// Errors surfaced to the job runtime, which decides about retries.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Screening(#[from] ScreeningError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// A delta file could not be fetched; the whole scan attempt fails.
    #[error("Download of {dataset} {version} failed: {source}")]
    Download {
        dataset: String,
        version: String,
        #[source]
        source: Box<Self>,
    },

    #[error("Job {job} timed out after {seconds}s")]
    Timeout { job: &'static str, seconds: u64 },

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Queue error: {0}")]
    Queue(String),
}

impl WorkerError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Screening(e) => e.kind(),
            Self::Core(e) => e.kind(),
            Self::Database(e) => e.kind(),
            Self::Provider(e) => e.kind(),
            Self::Dataset(e) => e.kind(),
            Self::Download { source, .. } => source.kind(),
            Self::Timeout { .. } | Self::Task(_) | Self::Queue(_) => ErrorKind::Internal,
        }
    }
}

impl From<tokio::task::JoinError> for WorkerError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}
