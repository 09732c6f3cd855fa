//! Per-document retrieval index.
//!
//! A [`DocumentIndex`] owns the chunk list, the vector space fitted to those
//! chunks, and the chunk vectors under that space. The three are only ever
//! created and loaded together, so a query is always embedded with the space
//! of the document it searches.

use campus_core::{AppError, AppResult};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::chunker;
use crate::space::{SpaceConfig, VectorSpace};
use crate::types::{IndexConfig, ScoredChunk};

/// Chunks, fitted space and chunk vectors of one document.
#[derive(Debug, Clone)]
pub struct DocumentIndex {
    document_id: String,
    chunks: Vec<String>,
    space: VectorSpace,
    vectors: Vec<Vec<f32>>,
    fingerprint: String,
    built_at: DateTime<Utc>,
    chunk_size: Option<usize>,
}

impl DocumentIndex {
    /// Fit a new index over `chunks`.
    ///
    /// Fails with [`AppError::EmptyInput`] when `chunks` is empty.
    pub fn build(document_id: &str, chunks: Vec<String>, config: &SpaceConfig) -> AppResult<Self> {
        if chunks.is_empty() {
            return Err(AppError::EmptyInput {
                document_id: document_id.to_string(),
            });
        }

        let (space, vectors) = VectorSpace::fit(&chunks, config);
        let fingerprint = fingerprint(document_id, &chunks);

        tracing::debug!(
            "Built index for '{}': {} chunks x {} dimensions",
            document_id,
            chunks.len(),
            space.dimensions()
        );

        Ok(Self {
            document_id: document_id.to_string(),
            chunks,
            space,
            vectors,
            fingerprint,
            built_at: Utc::now(),
            chunk_size: None,
        })
    }

    /// Chunk `text` with the sentence chunker and fit an index over it.
    pub fn from_text(document_id: &str, text: &str, config: &IndexConfig) -> AppResult<Self> {
        let chunks = chunker::chunk_sentences(text, config.chunk_size);
        let index = Self::build(document_id, chunks, &config.space_config())?;
        Ok(index.with_chunk_size(config.chunk_size))
    }

    /// Record the chunk size the chunks were produced with.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    /// Reassemble an index from persisted pieces, checking that they agree.
    pub fn from_parts(
        document_id: String,
        chunks: Vec<String>,
        space: VectorSpace,
        vectors: Vec<Vec<f32>>,
        fingerprint: String,
        built_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        if chunks.is_empty() {
            return Err(AppError::CorruptIndex(format!(
                "index for '{}' has no chunks",
                document_id
            )));
        }

        if vectors.len() != chunks.len() {
            return Err(AppError::CorruptIndex(format!(
                "index for '{}' has {} chunks but {} vectors",
                document_id,
                chunks.len(),
                vectors.len()
            )));
        }

        let dimensions = space.dimensions();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
            return Err(AppError::DimensionMismatch {
                expected: dimensions,
                found: bad.len(),
            });
        }

        let expected = self::fingerprint(&document_id, &chunks);
        if expected != fingerprint {
            return Err(AppError::CorruptIndex(format!(
                "fingerprint mismatch for '{}': pieces belong to different builds",
                document_id
            )));
        }

        Ok(Self {
            document_id,
            chunks,
            space,
            vectors,
            fingerprint,
            built_at,
            chunk_size: None,
        })
    }

    /// Rank chunks against `query` and return the best `k`.
    ///
    /// Scores are cosine similarities in descending order; ties keep the
    /// earlier chunk first. Zero-score chunks are returned when fewer than
    /// `k` chunks match at all.
    pub fn search(&self, query: &str, k: usize) -> Vec<ScoredChunk> {
        if k == 0 {
            return vec![];
        }

        let query_vector = self.space.transform(query);

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, vector)| (position, cosine_similarity(&query_vector, vector)))
            .collect();

        // Stable sort keeps chunk order among equal scores
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        tracing::debug!(
            "Ranked {} chunks of '{}' (requested top-{}), best score {:.3}",
            self.chunks.len(),
            self.document_id,
            k,
            scored.first().map(|s| s.1).unwrap_or(0.0)
        );

        scored
            .into_iter()
            .map(|(position, score)| ScoredChunk {
                position,
                text: self.chunks[position].clone(),
                score,
            })
            .collect()
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    pub fn space(&self) -> &VectorSpace {
        &self.space
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    /// SHA-256 over the document id and chunk texts.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Chunk size used when the index was built from raw text.
    pub fn chunk_size(&self) -> Option<usize> {
        self.chunk_size
    }
}

/// Calculate the build fingerprint shared by the persisted index pieces.
pub fn fingerprint(document_id: &str, chunks: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    for chunk in chunks {
        hasher.update([0u8]);
        hasher.update(chunk.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Calculate cosine similarity between two vectors.
///
/// Returns 0.0 when either vector has zero norm or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![1.0, 0.0, 0.0];
        let d = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&c, &d) - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_zero_norm() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_build_empty_chunks_fails() {
        let result = DocumentIndex::build("doc-1", vec![], &SpaceConfig::default());
        match result {
            Err(AppError::EmptyInput { document_id }) => assert_eq!(document_id, "doc-1"),
            other => panic!("expected EmptyInput, got {:?}", other),
        }
    }

    #[test]
    fn test_from_text_whitespace_only_fails() {
        let result = DocumentIndex::from_text("doc-1", " \n\t ", &IndexConfig::default());
        assert!(matches!(result, Err(AppError::EmptyInput { .. })));
    }

    #[test]
    fn test_from_text_records_chunk_size() {
        let config = IndexConfig {
            chunk_size: 40,
            ..IndexConfig::default()
        };
        let index = DocumentIndex::from_text("doc-1", "Cats purr. Dogs bark.", &config).unwrap();
        assert_eq!(index.chunk_size(), Some(40));

        let raw = DocumentIndex::build("doc-1", chunks(&["Cats purr."]), &SpaceConfig::default()).unwrap();
        assert_eq!(raw.chunk_size(), None);
    }

    #[test]
    fn test_search_k_zero() {
        let index = DocumentIndex::build("d", chunks(&["alpha beta"]), &SpaceConfig::default()).unwrap();
        assert!(index.search("alpha", 0).is_empty());
    }

    #[test]
    fn test_search_returns_zero_scores_when_nothing_matches() {
        let index = DocumentIndex::build("d", chunks(&["alpha beta", "gamma delta"]), &SpaceConfig::default())
            .unwrap();
        let results = index.search("nothing relevant", 5);

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.score == 0.0));
        // Ties keep chunk order
        assert_eq!(results[0].position, 0);
        assert_eq!(results[1].position, 1);
    }

    #[test]
    fn test_from_parts_rejects_foreign_vectors() {
        let a = DocumentIndex::build("a", chunks(&["one two", "three four"]), &SpaceConfig::default()).unwrap();
        let b = DocumentIndex::build("b", chunks(&["five six seven eight nine"]), &SpaceConfig::default())
            .unwrap();

        let result = DocumentIndex::from_parts(
            "a".to_string(),
            a.chunks().to_vec(),
            a.space().clone(),
            vec![b.vectors()[0].clone(), b.vectors()[0].clone()],
            a.fingerprint().to_string(),
            a.built_at(),
        );
        assert!(matches!(result, Err(AppError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_from_parts_rejects_fingerprint_mismatch() {
        let a = DocumentIndex::build("a", chunks(&["one two"]), &SpaceConfig::default()).unwrap();

        let result = DocumentIndex::from_parts(
            "a".to_string(),
            chunks(&["one three"]),
            a.space().clone(),
            a.vectors().to_vec(),
            a.fingerprint().to_string(),
            a.built_at(),
        );
        assert!(matches!(result, Err(AppError::CorruptIndex(_))));
    }

    #[test]
    fn test_fingerprint_depends_on_chunk_boundaries() {
        let joined = fingerprint("d", &chunks(&["ab"]));
        let split = fingerprint("d", &chunks(&["a", "b"]));
        assert_ne!(joined, split);
        assert_eq!(joined.len(), 64);
    }
}
