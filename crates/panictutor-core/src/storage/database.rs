//! SQLite-backed key-value store.
//!
//! One `kv` table keyed by `(partition, key)`. The connection sits behind a
//! mutex, which serializes every write through this handle.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use super::data_dir;
use super::kv::KvStore;
use crate::error::{CoreError, StorageError};

/// SQLite database for the partitioned key-value substrate.
pub struct SqliteKvStore {
    conn: Mutex<Connection>,
}

impl SqliteKvStore {
    /// Open the database at `<data_dir>/panictutor.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("panictutor.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open (or create) the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        self.conn()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                partition TEXT NOT NULL,
                key       TEXT NOT NULL,
                value     TEXT NOT NULL,
                PRIMARY KEY (partition, key)
            );",
        )?;
        Ok(())
    }
}

impl KvStore for SqliteKvStore {
    fn get_string(&self, partition: &str, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE partition = ?1 AND key = ?2")?;
        let value = stmt
            .query_row(params![partition, key], |row| row.get::<_, String>(0))
            .optional()?;
        Ok(value)
    }

    fn set_string(&self, partition: &str, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO kv (partition, key, value) VALUES (?1, ?2, ?3)",
            params![partition, key, value],
        )?;
        Ok(())
    }

    fn remove(&self, partition: &str, key: &str) -> Result<(), StorageError> {
        self.conn()?.execute(
            "DELETE FROM kv WHERE partition = ?1 AND key = ?2",
            params![partition, key],
        )?;
        Ok(())
    }

    fn clear_partition(&self, partition: &str) -> Result<(), StorageError> {
        self.conn()?
            .execute("DELETE FROM kv WHERE partition = ?1", params![partition])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn kv_store() {
        let db = SqliteKvStore::open_memory().unwrap();
        assert!(db.get_string("p", "test").unwrap().is_none());
        db.set_string("p", "test", "hello").unwrap();
        assert_eq!(db.get_string("p", "test").unwrap().unwrap(), "hello");
        db.set_string("p", "test", "again").unwrap();
        assert_eq!(db.get_string("p", "test").unwrap().unwrap(), "again");
        db.remove("p", "test").unwrap();
        assert!(db.get_string("p", "test").unwrap().is_none());
    }

    #[test]
    fn partitions_are_isolated() {
        let db = SqliteKvStore::open_memory().unwrap();
        db.set_string("schedule", "k", "1").unwrap();
        db.set_string("study_records", "k", "2").unwrap();

        db.clear_partition("schedule").unwrap();
        assert!(db.get_string("schedule", "k").unwrap().is_none());
        assert_eq!(db.get_string("study_records", "k").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panictutor.db");

        {
            let db = SqliteKvStore::open_at(&path).unwrap();
            let set: BTreeSet<String> = ["2026/10/20".to_string(), "2026/10/21".to_string()]
                .into_iter()
                .collect();
            db.set_string_set("schedule", "schedule_dates", &set).unwrap();
        }

        let db = SqliteKvStore::open_at(&path).unwrap();
        assert_eq!(db.get_string_set("schedule", "schedule_dates").unwrap().len(), 2);
    }
}
