//! Error types module
//!
//! Unified error enum for the orchestration boundary. Per-item download and
//! transcode failures are absorbed into result data by the batch/retry layers
//! and never surface through `AppError`; only input validation, missing
//! images, and disallowed source formats raise.

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Machine-readable error code, stable across message wording changes.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::InvalidInput("w".into()).error_code(),
            "INVALID_INPUT"
        );
        assert_eq!(AppError::NotFound("x".into()).error_code(), "NOT_FOUND");
        assert_eq!(
            AppError::UnsupportedFormat("bmp".into()).error_code(),
            "UNSUPPORTED_FORMAT"
        );
    }

    #[test]
    fn test_display_includes_detail() {
        let err = AppError::NotFound("image a.png in folder demo".into());
        assert_eq!(err.to_string(), "Not found: image a.png in folder demo");
    }
}
