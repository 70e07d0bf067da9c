//! Dataset error types.

use vigil_core::errors::{CoreError, ErrorKind};
use vigil_db::error::DatabaseError;

/// Errors from dataset export, blob storage, and delta-file decoding.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// Blob store operation failed.
    #[error("Object store error: {0}")]
    Store(#[from] object_store::Error),

    /// I/O error while streaming a blob.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed outside the delta decoder.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Persistence failure.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Domain error (mapping, missing table, ...).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Fewer ingested rows came back than delta tracks referenced.
    #[error("Expected {expected} ingested {object_type} rows, found {found}")]
    MissingObjects {
        object_type: String,
        expected: usize,
        found: usize,
    },

    /// A delta-file record could not be decoded.
    #[error("Malformed record at byte offset {offset}: {message}")]
    Decode { offset: u64, message: String },

    /// The upstream byte stream failed.
    #[error("Source stream failed: {0}")]
    Source(String),
}

impl DatasetError {
    /// User-facing error kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(object_store::Error::NotFound { .. }) | Self::MissingObjects { .. } => {
                ErrorKind::NotFound
            }
            Self::Database(e) => e.kind(),
            Self::Core(e) => e.kind(),
            Self::Decode { .. } => ErrorKind::BadParameter,
            _ => ErrorKind::Internal,
        }
    }
}
