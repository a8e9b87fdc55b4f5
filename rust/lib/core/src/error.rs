use thiserror::Error;

// ── Error codes ─────────────────────────────────────────────────────
//
// Stable, machine-readable identifiers. Callers (the benchmark CLI,
// tests) match on these, never on the human-readable message.

/// Stable error code constants.
pub mod error_code {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const INVALID_ARGUMENT: &str = "INVALID_ARGUMENT";
    pub const STORAGE_UNAVAILABLE: &str = "STORAGE_UNAVAILABLE";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const INTERNAL: &str = "INTERNAL";
}

// ── ServiceError ────────────────────────────────────────────────────

/// Unified error type returned by every feed operation.
///
/// Storage failures are never retried or swallowed: a backend that cannot
/// be reached surfaces as [`ServiceError::StorageUnavailable`], any other
/// backend failure as [`ServiceError::Storage`].
#[derive(Error, Debug)]
pub enum ServiceError {
    /// A referenced record does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Malformed input, rejected before any storage access.
    #[error("{0}")]
    InvalidArgument(String),

    /// The backing store cannot be reached (closed, failed to open, lost).
    #[error("{0}")]
    StorageUnavailable(String),

    /// The backing store was reached but the operation failed.
    #[error("{0}")]
    Storage(String),

    /// Unexpected internal error (e.g. a stored record that fails to decode).
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable, machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => error_code::NOT_FOUND,
            ServiceError::InvalidArgument(_) => error_code::INVALID_ARGUMENT,
            ServiceError::StorageUnavailable(_) => error_code::STORAGE_UNAVAILABLE,
            ServiceError::Storage(_) => error_code::STORAGE_ERROR,
            ServiceError::Internal(_) => error_code::INTERNAL,
        }
    }

    /// Whether the error means the backend is gone. Callers treat this as
    /// fatal for the current session; no reconnection is attempted.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ServiceError::StorageUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_mapping() {
        assert_eq!(ServiceError::NotFound("x".into()).error_code(), "NOT_FOUND");
        assert_eq!(ServiceError::InvalidArgument("x".into()).error_code(), "INVALID_ARGUMENT");
        assert_eq!(
            ServiceError::StorageUnavailable("x".into()).error_code(),
            "STORAGE_UNAVAILABLE"
        );
        assert_eq!(ServiceError::Storage("x".into()).error_code(), "STORAGE_ERROR");
        assert_eq!(ServiceError::Internal("x".into()).error_code(), "INTERNAL");
    }

    #[test]
    fn only_unavailable_is_unavailable() {
        assert!(ServiceError::StorageUnavailable("closed".into()).is_unavailable());
        assert!(!ServiceError::Storage("disk full".into()).is_unavailable());
        assert!(!ServiceError::NotFound("tweet 1".into()).is_unavailable());
    }

    #[test]
    fn error_display_is_just_message() {
        assert_eq!(ServiceError::NotFound("tweet 7".into()).to_string(), "tweet 7");
        assert_eq!(
            ServiceError::InvalidArgument("limit must be positive".into()).to_string(),
            "limit must be positive"
        );
    }
}
