//! Cross-cutting error types for Vigil.
//!
//! `CoreError` is raised by domain logic (mapping, state machine checks,
//! collaborator ports). Crate-specific errors (`DatabaseError`,
//! `ProviderError`, ...) live in their crates; every one of them exposes a
//! `kind()` so the presentation layer can map failures to status codes.

use std::fmt;

use thiserror::Error;

/// User-visible failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadParameter,
    NotFound,
    Conflict,
    Forbidden,
    UnprocessableEntity,
    Internal,
}

impl ErrorKind {
    /// HTTP-style status code for this kind.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::BadParameter => 400,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::UnprocessableEntity => 422,
            Self::Internal => 500,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadParameter => "bad_parameter",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Forbidden => "forbidden",
            Self::UnprocessableEntity => "unprocessable_entity",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can be raised by any Vigil crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed input: config, table definition, mapping, or status.
    #[error("Bad parameter: {0}")]
    BadParameter(String),

    /// Entity lookup returned no result.
    #[error("Entity not found: {entity_type} {id}")]
    NotFound { entity_type: String, id: String },

    /// A mapped field is absent from the ingested row.
    #[error("Field not found: '{field}' is mapped but missing from object {object_id}")]
    FieldNotFound { field: String, object_id: String },

    /// Duplicate registration or stale write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Feature or permission denial.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A state machine precondition was violated.
    #[error("Unprocessable entity: {0}")]
    Unprocessable(String),

    /// A state machine transition was attempted that is not allowed.
    #[error("Invalid state transition: {entity_type} {id} from {from} to {to}")]
    InvalidTransition {
        entity_type: String,
        id: String,
        from: String,
        to: String,
    },

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoreError {
    /// Shorthand for [`CoreError::NotFound`].
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::BadParameter(_) | Self::FieldNotFound { .. } => ErrorKind::BadParameter,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Unprocessable(_) | Self::InvalidTransition { .. } => {
                ErrorKind::UnprocessableEntity
            }
            Self::Other(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_status_codes() {
        assert_eq!(CoreError::BadParameter("x".into()).kind().http_status(), 400);
        assert_eq!(CoreError::Forbidden("x".into()).kind().http_status(), 403);
        assert_eq!(CoreError::not_found("config", "c1").kind().http_status(), 404);
        assert_eq!(CoreError::Conflict("x".into()).kind().http_status(), 409);
        assert_eq!(CoreError::Unprocessable("x".into()).kind().http_status(), 422);
    }

    #[test]
    fn missing_field_is_bad_parameter() {
        let err = CoreError::FieldNotFound {
            field: "name".into(),
            object_id: "o1".into(),
        };
        assert_eq!(err.kind(), ErrorKind::BadParameter);
        assert!(err.to_string().contains("'name'"));
    }
}
