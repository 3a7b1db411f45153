use thiserror::Error;

/// Top-level error type for the trm-core library.
///
/// Only the error kinds that genuinely cross an operation boundary live
/// here (lookup miss, validation, internal). Subprocess failures, parser
/// failures, and per-path filesystem failures are not exceptions in this
/// system — they are folded into ordinary result data (`CommandResult`,
/// absent signals, per-path read errors) well before they would reach a
/// caller of this crate.
#[derive(Debug, Error)]
pub enum TrmError {
    /// No session exists for the given id.
    #[error("Session not found")]
    SessionNotFound,

    /// Malformed argument or unsupported operation.
    #[error("{0}")]
    Validation(String),

    /// Programmer error / broken invariant.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wraps `std::io::Error`.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wraps `serde_json::Error`.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, TrmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = TrmError::Validation("missing field".into());
        assert_eq!(err.to_string(), "missing field");
    }

    #[test]
    fn session_not_found_message() {
        assert_eq!(TrmError::SessionNotFound.to_string(), "Session not found");
    }

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let trm_err: TrmError = io_err.into();
        assert!(matches!(trm_err, TrmError::Io(_)));
    }
}
