//! Screening provider error types.

use thiserror::Error;
use vigil_core::errors::ErrorKind;

/// Errors that can occur when talking to the screening provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider returned a non-success status code.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code returned by the provider.
        status: u16,
        /// Error message or response body.
        message: String,
    },

    /// Failed to parse a provider response.
    #[error("parse error: {0}")]
    Parse(String),

    /// No provider URL is configured.
    #[error("screening provider is not configured")]
    NotConfigured,

    /// The provider returned a 429 Too Many Requests response.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },
}

impl ProviderError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Api { status: 404, .. } => ErrorKind::NotFound,
            Self::NotConfigured => ErrorKind::BadParameter,
            _ => ErrorKind::Internal,
        }
    }
}
