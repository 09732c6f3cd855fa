//! Error types for the Campus Assistant retrieval stack.
//!
//! This module defines a unified error enum covering configuration, I/O,
//! index building, index storage and serialization failures.

use thiserror::Error;

/// Unified error type for the Campus Assistant crates.
///
/// All fallible functions return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
///
/// A missing index is not an error: queries against a
/// document without an index return an empty result set.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Document identifier cannot be used as a storage key
    #[error("Invalid document id: {0:?}")]
    InvalidDocumentId(String),

    /// Build was called with no indexable text
    #[error("Document '{document_id}' has no indexable text")]
    EmptyInput { document_id: String },

    /// A vector was produced or loaded against the wrong vector space
    #[error("Vector dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// Persisted index pieces are unreadable or do not belong together
    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    /// Index store backend errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_message() {
        let err = AppError::EmptyInput {
            document_id: "doc-7".to_string(),
        };
        assert_eq!(err.to_string(), "Document 'doc-7' has no indexable text");
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = AppError::DimensionMismatch {
            expected: 384,
            found: 12,
        };
        assert!(err.to_string().contains("expected 384, found 12"));
    }

    #[test]
    fn test_from_serde_json() {
        let parse_err = serde_json::from_str::<Vec<String>>("not json").unwrap_err();
        let err: AppError = parse_err.into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
