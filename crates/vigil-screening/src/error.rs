//! Screening error types.

use vigil_core::errors::{CoreError, ErrorKind};
use vigil_db::error::DatabaseError;
use vigil_provider::ProviderError;

/// Errors from configuration, screening, and review operations.
#[derive(Debug, thiserror::Error)]
pub enum ScreeningError {
    /// Domain error carrying a user-facing kind.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The screening was stored but its case could not be opened.
    #[error("Screening {screening_id} saved, but case creation failed: {source}")]
    CaseCreation {
        screening_id: String,
        #[source]
        source: CoreError,
    },
}

impl ScreeningError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Core(e) => e.kind(),
            Self::Database(e) => e.kind(),
            Self::Provider(e) => e.kind(),
            Self::CaseCreation { .. } => ErrorKind::Internal,
        }
    }
}

pub(crate) fn bad_parameter(message: impl Into<String>) -> ScreeningError {
    CoreError::BadParameter(message.into()).into()
}

pub(crate) fn unprocessable(message: impl Into<String>) -> ScreeningError {
    CoreError::Unprocessable(message.into()).into()
}

pub(crate) fn not_found(entity_type: &str, id: &str) -> ScreeningError {
    CoreError::not_found(entity_type, id).into()
}
