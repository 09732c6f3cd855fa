//! Filesystem index store: three files per document.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use campus_core::{AppError, AppResult};

use super::codec::{self, EncodedIndex};
use super::{validate_document_id, IndexStore};
use crate::index::DocumentIndex;

const CHUNKS_SUFFIX: &str = "_chunks.json";
const SPACE_SUFFIX: &str = "_space.json";
const VECTORS_SUFFIX: &str = "_vectors.bin";

/// Distinguishes temporary files of concurrent writers in one process.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Reads that find pieces from different builds are retried this many times.
const LOAD_ATTEMPTS: u32 = 10;
const LOAD_RETRY_DELAY: Duration = Duration::from_millis(25);

/// Stores `{id}_chunks.json`, `{id}_space.json` and `{id}_vectors.bin`
/// side by side in one directory.
///
/// Writers and readers sharing a store value are serialized, so a reader
/// never observes a half-renamed rebuild. A writer in another process can
/// still be caught mid-rebuild; readers then re-read until the three pieces
/// agree.
#[derive(Debug, Clone)]
pub struct FsIndexStore {
    dir: PathBuf,
    lock: Arc<RwLock<()>>,
}

struct PiecePaths {
    chunks: PathBuf,
    space: PathBuf,
    vectors: PathBuf,
}

impl PiecePaths {
    fn all(&self) -> [&Path; 3] {
        [&self.chunks, &self.space, &self.vectors]
    }
}

impl FsIndexStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> AppResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            AppError::Storage(format!("Failed to create index directory {:?}: {}", dir, e))
        })?;

        tracing::debug!("Opened filesystem index store at {:?}", dir);
        Ok(Self {
            dir,
            lock: Arc::new(RwLock::new(())),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn paths(&self, document_id: &str) -> AppResult<PiecePaths> {
        validate_document_id(document_id)?;
        Ok(PiecePaths {
            chunks: self.dir.join(format!("{}{}", document_id, CHUNKS_SUFFIX)),
            space: self.dir.join(format!("{}{}", document_id, SPACE_SUFFIX)),
            vectors: self.dir.join(format!("{}{}", document_id, VECTORS_SUFFIX)),
        })
    }

    fn read_lock(&self) -> AppResult<RwLockReadGuard<'_, ()>> {
        self.lock
            .read()
            .map_err(|_| AppError::Storage("index store lock poisoned".to_string()))
    }

    fn write_lock(&self) -> AppResult<RwLockWriteGuard<'_, ()>> {
        self.lock
            .write()
            .map_err(|_| AppError::Storage("index store lock poisoned".to_string()))
    }

    /// Read all three pieces; `None` when any of them is absent.
    fn read_pieces(&self, paths: &PiecePaths) -> AppResult<Option<EncodedIndex>> {
        let _guard = self.read_lock()?;

        let (Some(chunks), Some(space), Some(vectors)) = (
            read_piece(&paths.chunks)?,
            read_piece(&paths.space)?,
            read_piece(&paths.vectors)?,
        ) else {
            return Ok(None);
        };

        Ok(Some(EncodedIndex {
            chunks,
            space,
            vectors,
        }))
    }

    /// Write `bytes` to a temporary sibling, then rename it over `path`.
    fn write_replace(path: &Path, bytes: &[u8]) -> AppResult<()> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AppError::Storage(format!("Invalid index path {:?}", path)))?;
        let tmp = path.with_file_name(format!(
            ".{}.{}-{}.tmp",
            file_name,
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        fs::write(&tmp, bytes)
            .map_err(|e| AppError::Storage(format!("Failed to write {:?}: {}", tmp, e)))?;
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            AppError::Storage(format!("Failed to move index piece into {:?}: {}", path, e))
        })?;

        Ok(())
    }
}

fn read_piece(path: &Path) -> AppResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::Storage(format!("Failed to read {:?}: {}", path, e))),
    }
}

impl IndexStore for FsIndexStore {
    fn save(&self, index: &DocumentIndex) -> AppResult<()> {
        let paths = self.paths(index.document_id())?;
        let encoded = codec::encode(index)?;
        let _guard = self.write_lock()?;

        // Vectors go last: readers only see an index once all pieces exist
        Self::write_replace(&paths.chunks, &encoded.chunks)?;
        Self::write_replace(&paths.space, &encoded.space)?;
        Self::write_replace(&paths.vectors, &encoded.vectors)?;

        tracing::debug!(
            "Saved index '{}' to {:?} ({} + {} + {} bytes)",
            index.document_id(),
            self.dir,
            encoded.chunks.len(),
            encoded.space.len(),
            encoded.vectors.len()
        );
        Ok(())
    }

    fn load(&self, document_id: &str) -> AppResult<Option<DocumentIndex>> {
        let paths = self.paths(document_id)?;

        let mut attempt = 1;
        loop {
            let Some(encoded) = self.read_pieces(&paths)? else {
                tracing::debug!("No complete index for '{}' in {:?}", document_id, self.dir);
                return Ok(None);
            };

            if codec::same_build(&encoded) || attempt >= LOAD_ATTEMPTS {
                return codec::decode(document_id, &encoded).map(Some);
            }

            tracing::debug!(
                "Pieces of '{}' come from different builds, re-reading (attempt {})",
                document_id,
                attempt
            );
            attempt += 1;
            std::thread::sleep(LOAD_RETRY_DELAY);
        }
    }

    fn delete(&self, document_id: &str) -> AppResult<bool> {
        let paths = self.paths(document_id)?;
        let _guard = self.write_lock()?;
        let mut removed = false;

        for path in paths.all() {
            match fs::remove_file(path) {
                Ok(()) => removed = true,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(AppError::Storage(format!(
                        "Failed to remove {:?}: {}",
                        path, e
                    )))
                }
            }
        }

        Ok(removed)
    }

    fn contains(&self, document_id: &str) -> AppResult<bool> {
        let paths = self.paths(document_id)?;
        Ok(paths.all().iter().all(|p| p.exists()))
    }

    fn list(&self) -> AppResult<Vec<String>> {
        let mut ids = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(id) = name.to_str().and_then(|n| n.strip_suffix(VECTORS_SUFFIX)) else {
                continue;
            };
            if validate_document_id(id).is_ok() && self.contains(id)? {
                ids.push(id.to_string());
            }
        }

        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::SpaceConfig;
    use tempfile::TempDir;

    fn build(document_id: &str, texts: &[&str]) -> DocumentIndex {
        let chunks = texts.iter().map(|t| t.to_string()).collect();
        DocumentIndex::build(document_id, chunks, &SpaceConfig::default()).unwrap()
    }

    #[test]
    fn test_save_writes_three_pieces() {
        let temp = TempDir::new().unwrap();
        let store = FsIndexStore::open(temp.path()).unwrap();

        store.save(&build("7", &["alpha beta", "gamma"])).unwrap();

        assert!(temp.path().join("7_chunks.json").exists());
        assert!(temp.path().join("7_space.json").exists());
        assert!(temp.path().join("7_vectors.bin").exists());
        assert!(store.contains("7").unwrap());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let store = FsIndexStore::open(temp.path()).unwrap();
        let index = build("notes", &["alpha beta", "gamma delta"]);

        store.save(&index).unwrap();
        let loaded = store.load("notes").unwrap().unwrap();

        assert_eq!(loaded.chunks(), index.chunks());
        assert_eq!(loaded.vectors(), index.vectors());
    }

    #[test]
    fn test_load_missing_piece_is_none() {
        let temp = TempDir::new().unwrap();
        let store = FsIndexStore::open(temp.path()).unwrap();
        store.save(&build("doc", &["alpha beta"])).unwrap();

        fs::remove_file(temp.path().join("doc_space.json")).unwrap();

        assert!(store.load("doc").unwrap().is_none());
        assert!(!store.contains("doc").unwrap());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_load_never_built() {
        let temp = TempDir::new().unwrap();
        let store = FsIndexStore::open(temp.path()).unwrap();
        assert!(store.load("ghost").unwrap().is_none());
    }

    #[test]
    fn test_rebuild_replaces_index() {
        let temp = TempDir::new().unwrap();
        let store = FsIndexStore::open(temp.path()).unwrap();

        store.save(&build("doc", &["old text here"])).unwrap();
        store.save(&build("doc", &["new text", "second chunk"])).unwrap();

        let loaded = store.load("doc").unwrap().unwrap();
        assert_eq!(loaded.chunks().len(), 2);

        // No temporary files left behind
        let leftovers = fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_load_waits_out_an_unfinished_rebuild() {
        let temp = TempDir::new().unwrap();
        let store = FsIndexStore::open(temp.path()).unwrap();
        store.save(&build("doc", &["The sky is blue."])).unwrap();

        // Another writer has renamed the new chunks into place but not yet
        // the space and vectors
        let next = codec::encode(&build("doc", &["The sky is grey.", "Rain falls."])).unwrap();
        fs::write(temp.path().join("doc_chunks.json"), &next.chunks).unwrap();

        let dir = temp.path().to_path_buf();
        let writer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            FsIndexStore::write_replace(&dir.join("doc_space.json"), &next.space).unwrap();
            FsIndexStore::write_replace(&dir.join("doc_vectors.bin"), &next.vectors).unwrap();
        });

        let loaded = store.load("doc").unwrap().unwrap();
        writer.join().unwrap();

        assert_eq!(loaded.chunks().len(), 2);
        assert_eq!(loaded.chunks()[1], "Rain falls.");
    }

    #[test]
    fn test_load_abandoned_rebuild_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let store = FsIndexStore::open(temp.path()).unwrap();
        store.save(&build("doc", &["The sky is blue."])).unwrap();

        let next = codec::encode(&build("doc", &["The sky is grey."])).unwrap();
        fs::write(temp.path().join("doc_chunks.json"), &next.chunks).unwrap();

        assert!(matches!(store.load("doc"), Err(AppError::CorruptIndex(_))));
    }

    #[test]
    fn test_concurrent_rebuilds_never_tear() {
        let temp = TempDir::new().unwrap();
        let store = FsIndexStore::open(temp.path()).unwrap();
        store.save(&build("doc", &["first build"])).unwrap();

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..50 {
                    let text = format!("build number {}", i);
                    store.save(&build("doc", &[text.as_str()])).unwrap();
                }
            })
        };

        for _ in 0..50 {
            let loaded = store.load("doc").unwrap().unwrap();
            assert_eq!(loaded.chunks().len(), 1);
        }
        writer.join().unwrap();
    }

    #[test]
    fn test_load_after_concurrent_delete_is_none() {
        let temp = TempDir::new().unwrap();
        let store = FsIndexStore::open(temp.path()).unwrap();
        store.save(&build("doc", &["alpha beta"])).unwrap();

        let deleter = {
            let store = store.clone();
            std::thread::spawn(move || store.delete("doc").unwrap())
        };

        // Either the whole index or nothing, never an I/O error
        let loaded = store.load("doc").unwrap();
        assert!(deleter.join().unwrap());
        if let Some(index) = loaded {
            assert_eq!(index.chunks().len(), 1);
        }
        assert!(store.load("doc").unwrap().is_none());
    }

    #[test]
    fn test_delete_and_list() {
        let temp = TempDir::new().unwrap();
        let store = FsIndexStore::open(temp.path()).unwrap();

        store.save(&build("b", &["bee"])).unwrap();
        store.save(&build("a", &["aye"])).unwrap();
        assert_eq!(store.list().unwrap(), vec!["a".to_string(), "b".to_string()]);

        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        assert_eq!(store.list().unwrap(), vec!["b".to_string()]);
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let temp = TempDir::new().unwrap();
        let store = FsIndexStore::open(temp.path()).unwrap();
        assert!(matches!(
            store.load("../escape"),
            Err(AppError::InvalidDocumentId(_))
        ));
    }
}
