//! Partitioned string key-value substrate.
//!
//! Both the schedule store and the study ledger are written purely in terms
//! of [`KvStore`]: string values and string sets under named partitions, no
//! queries. Whole-value read-modify-write is the only update pattern, so a
//! store must serialize its own writes.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use crate::error::StorageError;

pub trait KvStore: Send + Sync {
    fn get_string(&self, partition: &str, key: &str) -> Result<Option<String>, StorageError>;

    fn set_string(&self, partition: &str, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, partition: &str, key: &str) -> Result<(), StorageError>;

    /// Drop every key in `partition`.
    fn clear_partition(&self, partition: &str) -> Result<(), StorageError>;

    /// Read a string set. Missing keys read as the empty set.
    fn get_string_set(&self, partition: &str, key: &str) -> Result<BTreeSet<String>, StorageError> {
        match self.get_string(partition, key)? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt {
                partition: partition.to_string(),
                key: key.to_string(),
                message: e.to_string(),
            }),
            None => Ok(BTreeSet::new()),
        }
    }

    fn set_string_set(
        &self,
        partition: &str,
        key: &str,
        values: &BTreeSet<String>,
    ) -> Result<(), StorageError> {
        let raw = serde_json::to_string(values).map_err(|e| StorageError::Corrupt {
            partition: partition.to_string(),
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.set_string(partition, key, &raw)
    }
}

/// In-process store for tests and embedders that bring their own persistence.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored across all partitions.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryKvStore {
    fn get_string(&self, partition: &str, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries
            .get(&(partition.to_string(), key.to_string()))
            .cloned())
    }

    fn set_string(&self, partition: &str, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert((partition.to_string(), key.to_string()), value.to_string());
        Ok(())
    }

    fn remove(&self, partition: &str, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.remove(&(partition.to_string(), key.to_string()));
        Ok(())
    }

    fn clear_partition(&self, partition: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.retain(|(p, _), _| p != partition);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_sets_default_to_empty() {
        let kv = MemoryKvStore::new();
        assert!(kv.get_string_set("schedule", "dates").unwrap().is_empty());

        let set: BTreeSet<String> = ["2026/10/20".to_string()].into_iter().collect();
        kv.set_string_set("schedule", "dates", &set).unwrap();
        assert_eq!(kv.get_string_set("schedule", "dates").unwrap(), set);
    }

    #[test]
    fn clear_partition_leaves_other_partitions() {
        let kv = MemoryKvStore::new();
        kv.set_string("a", "k", "1").unwrap();
        kv.set_string("b", "k", "2").unwrap();

        kv.clear_partition("a").unwrap();
        assert!(kv.get_string("a", "k").unwrap().is_none());
        assert_eq!(kv.get_string("b", "k").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn corrupt_set_is_reported() {
        let kv = MemoryKvStore::new();
        kv.set_string("p", "set", "not json").unwrap();
        assert!(matches!(
            kv.get_string_set("p", "set"),
            Err(StorageError::Corrupt { .. })
        ));
    }
}
