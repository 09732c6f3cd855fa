//! Per-document retrieval for campus course material.
//!
//! Chunks a document, fits a TF-IDF vector space to its chunks, persists the
//! result per document, and ranks chunks against free-text questions.

pub mod chunker;
pub mod index;
pub mod sections;
pub mod space;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use index::DocumentIndex;
pub use sections::{detect_sections, section_content, Section};
pub use space::{SpaceConfig, VectorSpace};
pub use store::{FsIndexStore, IndexStore, SqliteIndexStore};
pub use types::{BuildStats, IndexConfig, IndexStats, ScoredChunk};

use campus_core::{AppConfig, AppError, AppResult, StoreBackend};
use std::sync::Arc;
use std::time::Instant;

/// Shared retrieval context: an index store plus the settings used to build
/// and query indexes.
///
/// Cheap to clone; clones share the same store.
#[derive(Clone)]
pub struct RetrievalEngine {
    store: Arc<dyn IndexStore>,
    config: IndexConfig,
}

impl RetrievalEngine {
    pub fn new(store: Arc<dyn IndexStore>, config: IndexConfig) -> Self {
        Self { store, config }
    }

    /// Open the engine configured for an application workspace.
    pub fn open(app: &AppConfig) -> AppResult<Self> {
        let index_dir = app.index_dir();
        let store: Arc<dyn IndexStore> = match app.store {
            StoreBackend::Fs => Arc::new(FsIndexStore::open(&index_dir)?),
            StoreBackend::Sqlite => Arc::new(SqliteIndexStore::open(
                &SqliteIndexStore::database_path(&index_dir),
            )?),
        };

        tracing::debug!("Opened {} index store at {:?}", app.store, index_dir);

        Ok(Self::new(store, IndexConfig::from(&app.retrieval)))
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn IndexStore {
        self.store.as_ref()
    }

    /// Chunk `text`, fit its vector space and persist the index, replacing
    /// any previous index of the document.
    ///
    /// Text with no content fails with [`AppError::EmptyInput`] and leaves
    /// any existing index untouched.
    pub fn build(&self, document_id: &str, text: &str) -> AppResult<BuildStats> {
        let start = Instant::now();
        store::validate_document_id(document_id)?;

        tracing::info!("Building index for document '{}'", document_id);

        let chunks = chunker::chunk_sentences(text, self.config.chunk_size);
        tracing::debug!(
            "Chunked '{}' into {} chunks (chunk_size: {})",
            document_id,
            chunks.len(),
            self.config.chunk_size
        );

        let mut stats = self.save_index(document_id, chunks, Some(self.config.chunk_size))?;
        stats.bytes_processed = text.len() as u64;
        stats.duration_secs = start.elapsed().as_secs_f64();

        tracing::info!(
            "Indexed '{}': {} chunks, {} terms, {} bytes in {:.2}s",
            document_id,
            stats.chunks_count,
            stats.dimensions,
            stats.bytes_processed,
            stats.duration_secs
        );

        Ok(stats)
    }

    /// Fit and persist an index over already-chunked text.
    pub fn build_chunks(&self, document_id: &str, chunks: Vec<String>) -> AppResult<BuildStats> {
        self.save_index(document_id, chunks, None)
    }

    fn save_index(
        &self,
        document_id: &str,
        chunks: Vec<String>,
        chunk_size: Option<usize>,
    ) -> AppResult<BuildStats> {
        let start = Instant::now();
        let bytes_processed = chunks.iter().map(|c| c.len() as u64).sum();

        let index = match DocumentIndex::build(document_id, chunks, &self.config.space_config()) {
            Ok(index) => index,
            Err(e @ AppError::EmptyInput { .. }) => {
                tracing::warn!(
                    "Document '{}' has no text to index; keeping any previous index",
                    document_id
                );
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        let index = match chunk_size {
            Some(chunk_size) => index.with_chunk_size(chunk_size),
            None => index,
        };

        self.store.save(&index)?;

        Ok(BuildStats {
            document_id: document_id.to_string(),
            chunks_count: index.chunks().len(),
            dimensions: index.space().dimensions(),
            bytes_processed,
            duration_secs: start.elapsed().as_secs_f64(),
        })
    }

    /// Rank the chunks of `document_id` against `query` and return the best `k`.
    ///
    /// A document without an index yields an empty list.
    pub fn query(&self, document_id: &str, query: &str, k: usize) -> AppResult<Vec<ScoredChunk>> {
        let Some(index) = self.load(document_id)? else {
            tracing::debug!("No index for '{}', returning no chunks", document_id);
            return Ok(vec![]);
        };

        let results = index.search(query, k);

        if let (Some(first), Some(last)) = (results.first(), results.last()) {
            tracing::debug!(
                "Retrieved {} chunks for '{}' (top score: {:.3}, lowest: {:.3})",
                results.len(),
                document_id,
                first.score,
                last.score
            );
        }

        Ok(results)
    }

    /// Retrieve the best `k` chunks and render them as a prompt context block.
    pub fn context(&self, document_id: &str, query: &str, k: usize) -> AppResult<String> {
        let results = self.query(document_id, query, k)?;
        Ok(format_context(&results))
    }

    /// Discard the index of a document. Returns whether one existed.
    pub fn delete(&self, document_id: &str) -> AppResult<bool> {
        let removed = self.store.delete(document_id)?;
        if removed {
            tracing::info!("Deleted index for document '{}'", document_id);
        } else {
            tracing::debug!("No index to delete for '{}'", document_id);
        }
        Ok(removed)
    }

    /// Describe the persisted index of a document, if any.
    pub fn stats(&self, document_id: &str) -> AppResult<Option<IndexStats>> {
        Ok(self.load(document_id)?.map(|index| IndexStats {
            document_id: index.document_id().to_string(),
            chunks_count: index.chunks().len(),
            dimensions: index.space().dimensions(),
            chunk_size: index.chunk_size(),
            max_features: index.space().config().max_features,
            fingerprint: index.fingerprint().to_string(),
            built_at: index.built_at(),
        }))
    }

    /// Load the index of a document. Ids that can never be built have no index.
    fn load(&self, document_id: &str) -> AppResult<Option<DocumentIndex>> {
        if let Err(e) = store::validate_document_id(document_id) {
            tracing::debug!("{}; treating as unbuilt", e);
            return Ok(None);
        }
        self.store.load(document_id)
    }

    /// Ids of all indexed documents, sorted.
    pub fn list(&self) -> AppResult<Vec<String>> {
        self.store.list()
    }
}

/// Render ranked chunks as `[Context i]: ...` blocks separated by a blank line.
pub fn format_context(results: &[ScoredChunk]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("[Context {}]: {}", i + 1, chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}
