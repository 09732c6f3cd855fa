//! Index storage abstraction.
//!
//! Defines a trait for persisting per-document indexes, keyed by document id.

pub mod codec;
mod fs;
mod sqlite;

pub use fs::FsIndexStore;
pub use sqlite::SqliteIndexStore;

use campus_core::{AppError, AppResult};

use crate::index::DocumentIndex;

/// Trait for index storage backends.
///
/// Implementations must:
/// - write the chunk list, vector space and vectors of an index as one unit,
///   replacing any previous index of the same document without exposing a
///   half-written state
/// - report a document whose pieces are not all present as having no index
pub trait IndexStore: Send + Sync {
    /// Persist `index`, replacing any previous index for its document.
    fn save(&self, index: &DocumentIndex) -> AppResult<()>;

    /// Load a document's index, or `None` when it has none.
    fn load(&self, document_id: &str) -> AppResult<Option<DocumentIndex>>;

    /// Remove a document's index. Returns whether anything was removed.
    fn delete(&self, document_id: &str) -> AppResult<bool>;

    /// Whether a complete index exists for the document.
    fn contains(&self, document_id: &str) -> AppResult<bool>;

    /// Ids of all documents with a complete index, sorted.
    fn list(&self) -> AppResult<Vec<String>>;
}

/// Check that a document id can be used as a storage key.
///
/// Allowed: ASCII alphanumerics, `-`, `_` and `.`, not starting with `.`.
pub fn validate_document_id(document_id: &str) -> AppResult<()> {
    let valid = !document_id.is_empty()
        && document_id.len() <= 128
        && !document_id.starts_with('.')
        && document_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(AppError::InvalidDocumentId(document_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_document_id() {
        assert!(validate_document_id("42").is_ok());
        assert!(validate_document_id("lecture-01_notes.v2").is_ok());

        assert!(validate_document_id("").is_err());
        assert!(validate_document_id("../etc").is_err());
        assert!(validate_document_id(".hidden").is_err());
        assert!(validate_document_id("a/b").is_err());
        assert!(validate_document_id("with space").is_err());
        assert!(validate_document_id(&"x".repeat(129)).is_err());
    }
}
