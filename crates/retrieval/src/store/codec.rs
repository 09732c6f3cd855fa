//! Serialization of the three persisted index pieces.
//!
//! Chunks and vector space are versioned JSON documents; chunk vectors are a
//! small binary format:
//!
//! ```text
//! magic "CVEC" | version u32 | rows u32 | dims u32 | fingerprint [u8; 32] | rows*dims f32
//! ```
//!
//! All integers and floats are little-endian.

use campus_core::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::index::DocumentIndex;
use crate::space::{SpaceConfig, VectorSpace};

/// Current version of every persisted piece.
pub const FORMAT_VERSION: u32 = 1;

const VECTORS_MAGIC: &[u8; 4] = b"CVEC";
const HEADER_LEN: usize = 4 + 4 + 4 + 4 + 32;

/// On-disk chunk list.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChunksFile {
    pub format_version: u32,
    pub document_id: String,
    pub fingerprint: String,
    pub chunks: Vec<String>,
}

/// On-disk vector space.
#[derive(Debug, Serialize, Deserialize)]
pub struct SpaceFile {
    pub format_version: u32,
    pub document_id: String,
    pub fingerprint: String,
    pub built_at: DateTime<Utc>,
    pub max_features: usize,
    pub ngram_max: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,
    pub terms: Vec<String>,
    pub idf: Vec<f32>,
}

/// Encoded pieces of one index, ready to be written together.
#[derive(Debug, Clone)]
pub struct EncodedIndex {
    pub chunks: Vec<u8>,
    pub space: Vec<u8>,
    pub vectors: Vec<u8>,
}

/// Encode all three pieces of `index`.
pub fn encode(index: &DocumentIndex) -> AppResult<EncodedIndex> {
    let chunks = ChunksFile {
        format_version: FORMAT_VERSION,
        document_id: index.document_id().to_string(),
        fingerprint: index.fingerprint().to_string(),
        chunks: index.chunks().to_vec(),
    };

    let space = index.space();
    let space_file = SpaceFile {
        format_version: FORMAT_VERSION,
        document_id: index.document_id().to_string(),
        fingerprint: index.fingerprint().to_string(),
        built_at: index.built_at(),
        max_features: space.config().max_features,
        ngram_max: space.config().ngram_max,
        chunk_size: index.chunk_size(),
        terms: space.terms().to_vec(),
        idf: space.idf().to_vec(),
    };

    Ok(EncodedIndex {
        chunks: serde_json::to_vec(&chunks)?,
        space: serde_json::to_vec(&space_file)?,
        vectors: encode_vectors(index.vectors(), space.dimensions(), index.fingerprint())?,
    })
}

/// Decode and cross-check the three pieces of one document's index.
pub fn decode(document_id: &str, encoded: &EncodedIndex) -> AppResult<DocumentIndex> {
    let chunks: ChunksFile = serde_json::from_slice(&encoded.chunks)?;
    let space_file: SpaceFile = serde_json::from_slice(&encoded.space)?;

    check_version("chunks", chunks.format_version)?;
    check_version("space", space_file.format_version)?;

    if chunks.document_id != document_id || space_file.document_id != document_id {
        return Err(AppError::CorruptIndex(format!(
            "pieces stored under '{}' belong to '{}' / '{}'",
            document_id, chunks.document_id, space_file.document_id
        )));
    }

    let (vectors, vectors_fingerprint) = decode_vectors(&encoded.vectors)?;

    if chunks.fingerprint != space_file.fingerprint || chunks.fingerprint != vectors_fingerprint {
        return Err(AppError::CorruptIndex(format!(
            "pieces of '{}' come from different builds",
            document_id
        )));
    }

    let space = VectorSpace::from_parts(
        space_file.terms,
        space_file.idf,
        SpaceConfig {
            max_features: space_file.max_features,
            ngram_max: space_file.ngram_max,
        },
    )?;

    let index = DocumentIndex::from_parts(
        chunks.document_id,
        chunks.chunks,
        space,
        vectors,
        chunks.fingerprint,
        space_file.built_at,
    )?;

    Ok(match space_file.chunk_size {
        Some(chunk_size) => index.with_chunk_size(chunk_size),
        None => index,
    })
}

/// Fingerprint field shared by the JSON pieces.
#[derive(Deserialize)]
struct FingerprintOnly {
    fingerprint: String,
}

/// Whether all three pieces carry the same build fingerprint.
///
/// Unreadable pieces count as disagreeing.
pub fn same_build(encoded: &EncodedIndex) -> bool {
    let json_fingerprint = |bytes: &[u8]| {
        serde_json::from_slice::<FingerprintOnly>(bytes)
            .ok()
            .map(|f| f.fingerprint)
    };

    let vectors_fingerprint = encoded.vectors.get(16..HEADER_LEN).map(|raw| {
        raw.iter().map(|b| format!("{:02x}", b)).collect::<String>()
    });

    match (
        json_fingerprint(&encoded.chunks),
        json_fingerprint(&encoded.space),
        vectors_fingerprint,
    ) {
        (Some(chunks), Some(space), Some(vectors)) => chunks == space && chunks == vectors,
        _ => false,
    }
}

fn check_version(piece: &str, version: u32) -> AppResult<()> {
    if version != FORMAT_VERSION {
        return Err(AppError::CorruptIndex(format!(
            "unsupported {} format version {} (expected {})",
            piece, version, FORMAT_VERSION
        )));
    }
    Ok(())
}

/// Convert chunk vectors to bytes for storage.
pub fn encode_vectors(vectors: &[Vec<f32>], dims: usize, fingerprint: &str) -> AppResult<Vec<u8>> {
    let fingerprint = fingerprint_bytes(fingerprint)?;
    let rows = u32::try_from(vectors.len())
        .map_err(|_| AppError::Storage("too many chunk vectors".to_string()))?;
    let dims_u32 =
        u32::try_from(dims).map_err(|_| AppError::Storage("vector space too large".to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + vectors.len() * dims * 4);
    bytes.extend_from_slice(VECTORS_MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&rows.to_le_bytes());
    bytes.extend_from_slice(&dims_u32.to_le_bytes());
    bytes.extend_from_slice(&fingerprint);

    for vector in vectors {
        if vector.len() != dims {
            return Err(AppError::DimensionMismatch {
                expected: dims,
                found: vector.len(),
            });
        }
        for &value in vector {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }

    Ok(bytes)
}

/// Convert bytes back to chunk vectors and their build fingerprint.
pub fn decode_vectors(bytes: &[u8]) -> AppResult<(Vec<Vec<f32>>, String)> {
    if bytes.len() < HEADER_LEN || &bytes[0..4] != VECTORS_MAGIC {
        return Err(AppError::CorruptIndex(
            "vectors blob has no valid header".to_string(),
        ));
    }

    let version = read_u32(bytes, 4);
    check_version("vectors", version)?;

    let rows = read_u32(bytes, 8) as usize;
    let dims = read_u32(bytes, 12) as usize;
    let fingerprint: String = bytes[16..HEADER_LEN]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect();

    let body = &bytes[HEADER_LEN..];
    let expected_len = rows
        .checked_mul(dims)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| AppError::CorruptIndex("vectors header overflows".to_string()))?;

    if body.len() != expected_len {
        return Err(AppError::CorruptIndex(format!(
            "vectors blob holds {} bytes, header promises {}x{}",
            body.len(),
            rows,
            dims
        )));
    }

    let mut vectors = Vec::with_capacity(rows);
    if dims == 0 {
        vectors.resize(rows, Vec::new());
    } else {
        for row in body.chunks_exact(dims * 4) {
            let vector = row
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            vectors.push(vector);
        }
    }

    Ok((vectors, fingerprint))
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn fingerprint_bytes(hex: &str) -> AppResult<[u8; 32]> {
    let invalid = || AppError::CorruptIndex(format!("invalid fingerprint '{}'", hex));

    if hex.len() != 64 || !hex.is_ascii() {
        return Err(invalid());
    }

    let mut out = [0u8; 32];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> DocumentIndex {
        DocumentIndex::build(
            "doc-1",
            vec![
                "The sky is blue.".to_string(),
                "Grass is green.".to_string(),
            ],
            &SpaceConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_encode_decode_index() {
        let index = sample_index();
        let encoded = encode(&index).unwrap();
        let decoded = decode("doc-1", &encoded).unwrap();

        assert_eq!(decoded.chunks(), index.chunks());
        assert_eq!(decoded.space().terms(), index.space().terms());
        assert_eq!(decoded.vectors(), index.vectors());
        assert_eq!(decoded.fingerprint(), index.fingerprint());
        assert_eq!(decoded.built_at(), index.built_at());
    }

    #[test]
    fn test_vectors_header_layout() {
        let index = sample_index();
        let bytes = encode_vectors(index.vectors(), index.space().dimensions(), index.fingerprint())
            .unwrap();

        assert_eq!(&bytes[0..4], b"CVEC");
        assert_eq!(read_u32(&bytes, 4), FORMAT_VERSION);
        assert_eq!(read_u32(&bytes, 8), 2);
        assert_eq!(read_u32(&bytes, 12) as usize, index.space().dimensions());
        assert_eq!(bytes.len(), HEADER_LEN + 2 * index.space().dimensions() * 4);
    }

    #[test]
    fn test_decode_rejects_truncated_vectors() {
        let index = sample_index();
        let mut encoded = encode(&index).unwrap();
        encoded.vectors.truncate(encoded.vectors.len() - 4);

        assert!(matches!(decode("doc-1", &encoded), Err(AppError::CorruptIndex(_))));
    }

    #[test]
    fn test_decode_rejects_mixed_builds() {
        let a = sample_index();
        let b = DocumentIndex::build(
            "doc-1",
            vec!["Water is wet.".to_string(), "Fire is hot.".to_string()],
            &SpaceConfig::default(),
        )
        .unwrap();

        let mut encoded = encode(&a).unwrap();
        encoded.space = encode(&b).unwrap().space;

        assert!(matches!(decode("doc-1", &encoded), Err(AppError::CorruptIndex(_))));
    }

    #[test]
    fn test_same_build() {
        let a = sample_index();
        let b = DocumentIndex::build(
            "doc-1",
            vec!["Water is wet.".to_string()],
            &SpaceConfig::default(),
        )
        .unwrap();

        let mut encoded = encode(&a).unwrap();
        assert!(same_build(&encoded));

        encoded.chunks = encode(&b).unwrap().chunks;
        assert!(!same_build(&encoded));

        encoded.chunks = b"not json".to_vec();
        assert!(!same_build(&encoded));
    }

    #[test]
    fn test_chunk_size_persists() {
        let index = sample_index().with_chunk_size(250);
        let decoded = decode("doc-1", &encode(&index).unwrap()).unwrap();
        assert_eq!(decoded.chunk_size(), Some(250));

        let decoded = decode("doc-1", &encode(&sample_index()).unwrap()).unwrap();
        assert_eq!(decoded.chunk_size(), None);
    }

    #[test]
    fn test_decode_rejects_wrong_document() {
        let encoded = encode(&sample_index()).unwrap();
        assert!(matches!(decode("doc-2", &encoded), Err(AppError::CorruptIndex(_))));
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let mut encoded = encode(&sample_index()).unwrap();
        encoded.vectors[4] = 9;
        assert!(matches!(decode("doc-1", &encoded), Err(AppError::CorruptIndex(_))));
    }
}
