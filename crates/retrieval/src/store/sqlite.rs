//! SQLite-backed index store: one row per document.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use campus_core::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension};

use super::codec::{self, EncodedIndex};
use super::{validate_document_id, IndexStore};
use crate::index::DocumentIndex;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS indexes (
    document_id TEXT PRIMARY KEY,
    fingerprint TEXT NOT NULL,
    built_at TEXT NOT NULL,
    chunks BLOB NOT NULL,
    space BLOB NOT NULL,
    vectors BLOB NOT NULL
);
"#;

/// Keeps the three pieces of an index in a single row, so a rebuild is one
/// `INSERT OR REPLACE`.
pub struct SqliteIndexStore {
    conn: Mutex<Connection>,
}

impl SqliteIndexStore {
    /// Location of the database inside an index directory.
    pub fn database_path(index_dir: &Path) -> PathBuf {
        index_dir.join("index.sqlite")
    }

    /// Open (creating if needed) the SQLite database at `db_path`.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Storage(format!("Failed to create index directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Storage(format!("Failed to open SQLite index: {}", e)))?;

        tracing::debug!("Opened SQLite index store at {:?}", db_path);
        Self::init(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Storage(format!("Failed to open SQLite index: {}", e)))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| AppError::Storage(format!("Failed to create tables: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Storage("SQLite connection lock poisoned".to_string()))
    }
}

impl IndexStore for SqliteIndexStore {
    fn save(&self, index: &DocumentIndex) -> AppResult<()> {
        validate_document_id(index.document_id())?;
        let encoded = codec::encode(index)?;

        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO indexes (document_id, fingerprint, built_at, chunks, space, vectors)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    index.document_id(),
                    index.fingerprint(),
                    index.built_at().to_rfc3339(),
                    encoded.chunks,
                    encoded.space,
                    encoded.vectors,
                ],
            )
            .map_err(|e| AppError::Storage(format!("Failed to save index: {}", e)))?;

        tracing::debug!("Saved index '{}' to SQLite", index.document_id());
        Ok(())
    }

    fn load(&self, document_id: &str) -> AppResult<Option<DocumentIndex>> {
        validate_document_id(document_id)?;

        let row = self
            .conn()?
            .query_row(
                "SELECT chunks, space, vectors FROM indexes WHERE document_id = ?1",
                params![document_id],
                |row| {
                    Ok(EncodedIndex {
                        chunks: row.get(0)?,
                        space: row.get(1)?,
                        vectors: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(|e| AppError::Storage(format!("Failed to load index: {}", e)))?;

        match row {
            Some(encoded) => codec::decode(document_id, &encoded).map(Some),
            None => {
                tracing::debug!("No index row for '{}'", document_id);
                Ok(None)
            }
        }
    }

    fn delete(&self, document_id: &str) -> AppResult<bool> {
        validate_document_id(document_id)?;

        let affected = self
            .conn()?
            .execute(
                "DELETE FROM indexes WHERE document_id = ?1",
                params![document_id],
            )
            .map_err(|e| AppError::Storage(format!("Failed to delete index: {}", e)))?;

        Ok(affected > 0)
    }

    fn contains(&self, document_id: &str) -> AppResult<bool> {
        validate_document_id(document_id)?;

        let count: i64 = self
            .conn()?
            .query_row(
                "SELECT COUNT(*) FROM indexes WHERE document_id = ?1",
                params![document_id],
                |row| row.get(0),
            )
            .map_err(|e| AppError::Storage(format!("Failed to count indexes: {}", e)))?;

        Ok(count > 0)
    }

    fn list(&self) -> AppResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT document_id FROM indexes ORDER BY document_id")
            .map_err(|e| AppError::Storage(format!("Failed to prepare query: {}", e)))?;

        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| AppError::Storage(format!("Failed to list indexes: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Storage(format!("Failed to read index row: {}", e)))?;

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::SpaceConfig;
    use tempfile::NamedTempFile;

    fn build(document_id: &str, texts: &[&str]) -> DocumentIndex {
        let chunks = texts.iter().map(|t| t.to_string()).collect();
        DocumentIndex::build(document_id, chunks, &SpaceConfig::default()).unwrap()
    }

    #[test]
    fn test_init_creates_table() {
        let store = SqliteIndexStore::open_in_memory().unwrap();
        let table_count: i64 = store
            .conn()
            .unwrap()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='indexes'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(table_count, 1);
    }

    #[test]
    fn test_database_path() {
        assert_eq!(
            SqliteIndexStore::database_path(Path::new("/tmp/ws/.campus/index")),
            PathBuf::from("/tmp/ws/.campus/index/index.sqlite")
        );
    }

    #[test]
    fn test_save_and_load_on_disk() {
        let temp_file = NamedTempFile::new().unwrap();
        let store = SqliteIndexStore::open(temp_file.path()).unwrap();
        let index = build("lecture-3", &["enzymes speed up reactions", "atp stores energy"]);

        store.save(&index).unwrap();
        let loaded = store.load("lecture-3").unwrap().unwrap();

        assert_eq!(loaded.chunks(), index.chunks());
        assert_eq!(loaded.vectors(), index.vectors());
        assert_eq!(loaded.fingerprint(), index.fingerprint());
    }

    #[test]
    fn test_replace_delete_list() {
        let store = SqliteIndexStore::open_in_memory().unwrap();

        store.save(&build("x", &["first version"])).unwrap();
        store.save(&build("x", &["second version", "more"])).unwrap();
        store.save(&build("w", &["other"])).unwrap();

        assert_eq!(store.load("x").unwrap().unwrap().chunks().len(), 2);
        assert_eq!(store.list().unwrap(), vec!["w".to_string(), "x".to_string()]);

        assert!(store.delete("x").unwrap());
        assert!(!store.contains("x").unwrap());
        assert!(store.load("x").unwrap().is_none());
        assert!(!store.delete("x").unwrap());
    }
}
