//! SQLite-backed checksum index of a photo library.

use crate::error::IndexError;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// File name of the index inside the library root
pub const INDEX_FILE: &str = "library.db";

/// One indexed file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Hex content checksum
    pub checksum: String,
    /// Library-relative path using `/` separators
    pub path: String,
}

impl IndexEntry {
    pub fn new(checksum: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            checksum: checksum.into(),
            path: path.into(),
        }
    }
}

/// Checksum → library-relative path table
///
/// Uses WAL (Write-Ahead Logging) mode like the other on-disk stores.
pub struct LibraryIndex {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl LibraryIndex {
    /// Open or create the index database at `path`
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| IndexError::OpenFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let conn = Connection::open(path).map_err(|e| IndexError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| IndexError::QueryFailed(e.to_string()))?;

        Self::init(conn, path.to_path_buf())
    }

    /// Throwaway index that never touches the disk
    pub fn in_memory() -> Result<Self, IndexError> {
        let conn = Connection::open_in_memory().map_err(|e| IndexError::OpenFailed {
            path: PathBuf::from(":memory:"),
            reason: e.to_string(),
        })?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    /// In-memory copy of the index in `library_root`, if there is one
    pub fn snapshot_of(library_root: &Path) -> Result<Self, IndexError> {
        let snapshot = Self::in_memory()?;
        if Self::exists_in(library_root) {
            let entries = Self::open_in(library_root)?.entries()?;
            snapshot.replace_all(&entries)?;
        }
        Ok(snapshot)
    }

    fn init(conn: Connection, db_path: PathBuf) -> Result<Self, IndexError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS photos (
                checksum TEXT NOT NULL,
                path TEXT NOT NULL,
                recorded_at INTEGER NOT NULL,
                PRIMARY KEY (checksum, path)
            )",
            [],
        )
        .map_err(|e| IndexError::QueryFailed(e.to_string()))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_photos_path ON photos(path)",
            [],
        )
        .map_err(|e| IndexError::QueryFailed(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Open the index that lives in `library_root`
    pub fn open_in(library_root: &Path) -> Result<Self, IndexError> {
        Self::open(&Self::path_in(library_root))
    }

    /// Location of the index for a library
    pub fn path_in(library_root: &Path) -> PathBuf {
        library_root.join(INDEX_FILE)
    }

    /// Whether a library already has an index file
    pub fn exists_in(library_root: &Path) -> bool {
        Self::path_in(library_root).is_file()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, IndexError> {
        self.conn.lock().map_err(|_| IndexError::Corrupted {
            path: self.db_path.clone(),
        })
    }

    /// Run raw SQL against the connection
    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<(), IndexError> {
        self.lock()?
            .execute_batch(sql)
            .map_err(|e| IndexError::QueryFailed(e.to_string()))
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs() as i64
    }

    /// Record that `path` holds content with `checksum`
    pub fn record(&self, checksum: &str, path: &str) -> Result<(), IndexError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO photos (checksum, path, recorded_at) VALUES (?, ?, ?)",
            params![checksum, path, Self::now()],
        )
        .map_err(|e| IndexError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    /// Forget every checksum recorded for `path`; returns rows removed
    pub fn remove_path(&self, path: &str) -> Result<usize, IndexError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM photos WHERE path = ?", [path])
            .map_err(|e| IndexError::QueryFailed(e.to_string()))
    }

    /// Whether any file with this checksum is indexed
    pub fn contains_checksum(&self, checksum: &str) -> Result<bool, IndexError> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM photos WHERE checksum = ? LIMIT 1",
                [checksum],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| IndexError::QueryFailed(e.to_string()))?;
        Ok(found.is_some())
    }

    /// Paths recorded for a checksum, sorted
    pub fn paths_for(&self, checksum: &str) -> Result<Vec<String>, IndexError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT path FROM photos WHERE checksum = ? ORDER BY path")
            .map_err(|e| IndexError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map([checksum], |row| row.get::<_, String>(0))
            .map_err(|e| IndexError::QueryFailed(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| IndexError::QueryFailed(e.to_string()))
    }

    /// Every entry, sorted by path then checksum
    pub fn entries(&self) -> Result<Vec<IndexEntry>, IndexError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT checksum, path FROM photos ORDER BY path, checksum")
            .map_err(|e| IndexError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(IndexEntry {
                    checksum: row.get(0)?,
                    path: row.get(1)?,
                })
            })
            .map_err(|e| IndexError::QueryFailed(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| IndexError::QueryFailed(e.to_string()))
    }

    pub fn len(&self) -> Result<usize, IndexError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0))
            .map_err(|e| IndexError::QueryFailed(e.to_string()))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool, IndexError> {
        Ok(self.len()? == 0)
    }

    /// Replace the whole table in a single transaction
    pub fn replace_all(&self, entries: &[IndexEntry]) -> Result<(), IndexError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| IndexError::QueryFailed(e.to_string()))?;

        tx.execute("DELETE FROM photos", [])
            .map_err(|e| IndexError::QueryFailed(e.to_string()))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO photos (checksum, path, recorded_at) VALUES (?, ?, ?)",
                )
                .map_err(|e| IndexError::QueryFailed(e.to_string()))?;

            let now = Self::now();
            for entry in entries {
                stmt.execute(params![entry.checksum, entry.path, now])
                    .map_err(|e| IndexError::QueryFailed(e.to_string()))?;
            }
        }

        tx.commit()
            .map_err(|e| IndexError::QueryFailed(e.to_string()))
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}
