//! Retrieval type definitions.

use campus_core::RetrievalSettings;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::space::SpaceConfig;

/// Settings used to build and query a document index.
///
/// Defaults follow [`RetrievalSettings`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Maximum characters per chunk
    pub chunk_size: usize,

    /// Vocabulary cap of the fitted vector space
    pub max_features: usize,

    /// Number of chunks returned when the caller does not ask for a count
    pub top_k: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::from(&RetrievalSettings::default())
    }
}

impl IndexConfig {
    /// Vector space parameters for this configuration.
    pub fn space_config(&self) -> SpaceConfig {
        SpaceConfig {
            max_features: self.max_features,
            ..SpaceConfig::default()
        }
    }
}

impl From<&RetrievalSettings> for IndexConfig {
    fn from(settings: &RetrievalSettings) -> Self {
        Self {
            chunk_size: settings.chunk_size,
            max_features: settings.max_features,
            top_k: settings.top_k,
        }
    }
}

/// A retrieved chunk with its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// Position of the chunk within its document (0-indexed)
    pub position: usize,

    /// Chunk text
    pub text: String,

    /// Cosine similarity to the query
    pub score: f32,
}

/// Statistics from a build operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildStats {
    pub document_id: String,

    /// Number of chunks indexed
    pub chunks_count: usize,

    /// Size of the fitted vocabulary
    pub dimensions: usize,

    /// Bytes of source text
    pub bytes_processed: u64,

    /// Duration in seconds
    pub duration_secs: f64,
}

/// Statistics for a persisted index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub document_id: String,

    pub chunks_count: usize,

    pub dimensions: usize,

    /// Chunk size the document was chunked with; `None` for pre-chunked input
    pub chunk_size: Option<usize>,

    /// Vocabulary cap the space was fitted with
    pub max_features: usize,

    /// Build fingerprint shared by the persisted pieces
    pub fingerprint: String,

    pub built_at: DateTime<Utc>,
}
