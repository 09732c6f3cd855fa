//! TF-IDF vector space fitted to a single document's chunks.
//!
//! Terms are lowercase unigrams and adjacent-word n-grams. Each term is
//! weighted by its raw count in a text times a smoothed inverse chunk
//! frequency, and every vector is L2-normalized. The vocabulary is capped at
//! `max_features` terms, keeping the most frequent terms across the chunk set.

use std::collections::HashMap;

use campus_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Fit parameters of a vector space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceConfig {
    /// Vocabulary cap
    pub max_features: usize,

    /// Longest n-gram extracted (1 = unigrams only)
    pub ngram_max: usize,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            max_features: 384,
            ngram_max: 2,
        }
    }
}

/// A fitted vocabulary with per-term IDF weights.
#[derive(Debug, Clone)]
pub struct VectorSpace {
    terms: Vec<String>,
    idf: Vec<f32>,
    lookup: HashMap<String, usize>,
    config: SpaceConfig,
}

impl VectorSpace {
    /// Fit a space to `chunks` and embed every chunk in it.
    ///
    /// Returns the space and one vector per chunk, in chunk order. An empty
    /// chunk slice yields an empty vocabulary and no vectors.
    pub fn fit(chunks: &[String], config: &SpaceConfig) -> (Self, Vec<Vec<f32>>) {
        let n = chunks.len();
        let counts: Vec<HashMap<String, u32>> = chunks
            .iter()
            .map(|chunk| count_terms(chunk, config.ngram_max))
            .collect();

        let mut df: HashMap<&str, u32> = HashMap::new();
        let mut totals: HashMap<&str, u64> = HashMap::new();
        for chunk_counts in &counts {
            for (term, count) in chunk_counts {
                *df.entry(term.as_str()).or_insert(0) += 1;
                *totals.entry(term.as_str()).or_insert(0) += u64::from(*count);
            }
        }

        let raw_vocabulary = totals.len();
        let mut ranked: Vec<(&str, u64)> = totals.into_iter().collect();
        if ranked.len() > config.max_features {
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            ranked.truncate(config.max_features);
        }

        let mut terms: Vec<String> = ranked.into_iter().map(|(t, _)| t.to_string()).collect();
        terms.sort();

        let idf: Vec<f32> = terms
            .iter()
            .map(|t| smooth_idf(n, df.get(t.as_str()).copied().unwrap_or(0)))
            .collect();

        let space = Self::assemble(terms, idf, config.clone());
        let vectors = counts.iter().map(|c| space.weigh(c)).collect();

        tracing::debug!(
            "Fitted vector space on {} chunks: {} terms kept of {} (max_features: {})",
            n,
            space.dimensions(),
            raw_vocabulary,
            config.max_features
        );

        (space, vectors)
    }

    /// Rebuild a space from persisted parts.
    pub fn from_parts(terms: Vec<String>, idf: Vec<f32>, config: SpaceConfig) -> AppResult<Self> {
        if terms.len() != idf.len() {
            return Err(AppError::DimensionMismatch {
                expected: terms.len(),
                found: idf.len(),
            });
        }

        let space = Self::assemble(terms, idf, config);
        if space.lookup.len() != space.terms.len() {
            return Err(AppError::CorruptIndex(
                "vector space vocabulary contains duplicate terms".to_string(),
            ));
        }

        Ok(space)
    }

    fn assemble(terms: Vec<String>, idf: Vec<f32>, config: SpaceConfig) -> Self {
        let lookup = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();

        Self {
            terms,
            idf,
            lookup,
            config,
        }
    }

    /// Embed text through this space. Unknown terms are ignored.
    pub fn transform(&self, text: &str) -> Vec<f32> {
        self.weigh(&count_terms(text, self.config.ngram_max))
    }

    fn weigh(&self, counts: &HashMap<String, u32>) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.terms.len()];

        for (term, count) in counts {
            if let Some(&i) = self.lookup.get(term) {
                vector[i] = *count as f32 * self.idf[i];
            }
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        vector
    }

    /// Vector length produced by this space.
    pub fn dimensions(&self) -> usize {
        self.terms.len()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn idf(&self) -> &[f32] {
        &self.idf
    }

    pub fn config(&self) -> &SpaceConfig {
        &self.config
    }

    /// Index of `term` in the vocabulary, if kept.
    pub fn term_index(&self, term: &str) -> Option<usize> {
        self.lookup.get(term).copied()
    }
}

/// `ln((1 + n) / (1 + df)) + 1`
fn smooth_idf(n: usize, df: u32) -> f32 {
    (((1 + n) as f64 / (1 + df as u64) as f64).ln() + 1.0) as f32
}

/// Lowercase word tokens of at least two characters.
///
/// Words are further split at apostrophes, periods and any other non-word
/// character, so "don't" yields "don" and "1.2" yields nothing.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    lowered
        .unicode_words()
        .flat_map(|w| w.split(|c: char| !is_word_char(c)))
        .filter(|w| w.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Count unigrams and n-grams up to `ngram_max` in `text`.
fn count_terms(text: &str, ngram_max: usize) -> HashMap<String, u32> {
    let tokens = tokenize(text);
    let mut counts = HashMap::new();

    for n in 1..=ngram_max.max(1) {
        if tokens.len() < n {
            break;
        }
        for window in tokens.windows(n) {
            *counts.entry(window.join(" ")).or_insert(0) += 1;
        }
    }

    counts
}
