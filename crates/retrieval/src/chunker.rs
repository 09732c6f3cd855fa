//! Sentence-aware text chunking.
//!
//! The primary chunker normalizes whitespace, splits the text into sentences
//! and greedily packs whole sentences into chunks of at most `chunk_size`
//! characters. A sentence longer than `chunk_size` becomes a chunk of its own
//! and is never cut.
//!
//! The overlapping variant produces size-bounded chunks that share up to
//! `overlap` characters with their neighbour. It is not used by the index.

use campus_core::{AppError, AppResult};
use text_splitter::{ChunkConfig, TextSplitter};

/// Default maximum characters per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default overlap for [`chunk_overlapping`].
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Collapse every whitespace run to a single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split normalized text after `.`, `!` or `?` followed by a space.
///
/// The terminal punctuation stays with its sentence. Input must already be
/// normalized, so sentence separators are exactly one space.
pub fn split_sentences(normalized: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = normalized.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        if let Some(&(next_idx, ' ')) = chars.peek() {
            sentences.push(&normalized[start..next_idx]);
            start = next_idx + 1;
            chars.next();
        }
    }

    if start < normalized.len() {
        sentences.push(&normalized[start..]);
    }

    sentences
}

/// Chunk text into runs of whole sentences of at most `chunk_size` characters.
///
/// Lengths are counted in Unicode scalar values. Sentences inside a chunk are
/// separated by a single space, so joining the chunks with `" "` reproduces
/// [`normalize_whitespace`] of the input.
pub fn chunk_sentences(text: &str, chunk_size: usize) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return vec![];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in split_sentences(&normalized) {
        let len = sentence.chars().count();

        if current.is_empty() {
            current.push_str(sentence);
            current_len = len;
        } else if current_len + 1 + len <= chunk_size {
            current.push(' ');
            current.push_str(sentence);
            current_len += 1 + len;
        } else {
            chunks.push(std::mem::take(&mut current));
            current.push_str(sentence);
            current_len = len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    tracing::debug!(
        "Chunked {} chars into {} chunks (size: {})",
        normalized.len(),
        chunks.len(),
        chunk_size
    );

    chunks
}

/// Chunk text into overlapping, size-bounded segments.
///
/// Boundaries prefer paragraphs, then sentences, then words.
pub fn chunk_overlapping(text: &str, chunk_size: usize, overlap: usize) -> AppResult<Vec<String>> {
    if chunk_size == 0 {
        return Err(AppError::Config(
            "chunk size must be greater than 0".to_string(),
        ));
    }

    if overlap >= chunk_size {
        return Err(AppError::Config(format!(
            "chunk overlap ({}) must be smaller than chunk size ({})",
            overlap, chunk_size
        )));
    }

    if text.trim().is_empty() {
        return Ok(vec![]);
    }

    let config = ChunkConfig::new(chunk_size)
        .with_overlap(overlap)
        .map_err(|e| AppError::Config(format!("Invalid chunk overlap: {}", e)))?;
    let splitter = TextSplitter::new(config);

    let chunks: Vec<String> = splitter
        .chunks(text)
        .filter(|c| !c.trim().is_empty())
        .map(str::to_string)
        .collect();

    tracing::debug!(
        "Overlapping splitter created {} chunks (size: {}, overlap: {})",
        chunks.len(),
        chunk_size,
        overlap
    );

    Ok(chunks)
}
