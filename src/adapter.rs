use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;

use redb::{Database, TableDefinition};

use crate::error::AdapterError;

const TABLE: TableDefinition<&str, &str> = TableDefinition::new("ripple");

/// Key-value text storage consumed by the persistence middleware.
///
/// One key per store instance; the core adds no namespacing. Methods are
/// synchronous: rehydration completes before store construction returns,
/// and write-back happens on the committing thread.
pub trait StorageAdapter: Send + Sync {
    /// Get the stored text for a key. Returns None if the key is absent.
    fn get_item(&self, key: &str) -> Result<Option<String>, AdapterError>;

    /// Store text under a key, overwriting any previous value.
    fn set_item(&self, key: &str, value: &str) -> Result<(), AdapterError>;

    /// Remove a key. Removing an absent key is not an error.
    fn remove_item(&self, key: &str) -> Result<(), AdapterError>;
}

/// In-memory adapter. Snapshots live only as long as the process; the
/// default choice in tests and for stores that do not need durability.
pub struct MemoryAdapter {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryAdapter {
    /// Create a new empty adapter.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().expect("adapter lock poisoned").len()
    }

    /// Check if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageAdapter for MemoryAdapter {
    fn get_item(&self, key: &str) -> Result<Option<String>, AdapterError> {
        let entries = self.entries.read().expect("adapter lock poisoned");
        Ok(entries.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), AdapterError> {
        let mut entries = self.entries.write().expect("adapter lock poisoned");
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), AdapterError> {
        let mut entries = self.entries.write().expect("adapter lock poisoned");
        entries.remove(key);
        Ok(())
    }
}

/// Durable adapter backed by redb — a pure-Rust embedded key-value database.
pub struct RedbStorage {
    db: Database,
}

impl RedbStorage {
    /// Open or create a redb database at the given path.
    pub fn open(path: &Path) -> Result<Self, AdapterError> {
        let db = Database::create(path).map_err(|e| AdapterError::Storage(e.to_string()))?;

        // Ensure the table exists by doing a write transaction.
        let write_txn = db
            .begin_write()
            .map_err(|e| AdapterError::Storage(e.to_string()))?;
        {
            let _table = write_txn
                .open_table(TABLE)
                .map_err(|e| AdapterError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| AdapterError::Storage(e.to_string()))?;

        Ok(Self { db })
    }
}

impl StorageAdapter for RedbStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, AdapterError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| AdapterError::Storage(e.to_string()))?;
        let table = read_txn
            .open_table(TABLE)
            .map_err(|e| AdapterError::Storage(e.to_string()))?;

        match table.get(key) {
            Ok(Some(val)) => Ok(Some(val.value().to_string())),
            Ok(None) => Ok(None),
            Err(e) => Err(AdapterError::Storage(e.to_string())),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), AdapterError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| AdapterError::Storage(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(TABLE)
                .map_err(|e| AdapterError::Storage(e.to_string()))?;
            table
                .insert(key, value)
                .map_err(|e| AdapterError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| AdapterError::Storage(e.to_string()))?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), AdapterError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| AdapterError::Storage(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(TABLE)
                .map_err(|e| AdapterError::Storage(e.to_string()))?;
            table
                .remove(key)
                .map_err(|e| AdapterError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| AdapterError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // MemoryAdapter
    // ========================================================================

    #[test]
    fn memory_set_and_get() {
        let adapter = MemoryAdapter::new();
        adapter.set_item("prefs", "{}").unwrap();
        assert_eq!(adapter.get_item("prefs").unwrap(), Some("{}".to_string()));
    }

    #[test]
    fn memory_get_missing_returns_none() {
        let adapter = MemoryAdapter::new();
        assert_eq!(adapter.get_item("nope").unwrap(), None);
    }

    #[test]
    fn memory_set_overwrites() {
        let adapter = MemoryAdapter::new();
        adapter.set_item("prefs", "a").unwrap();
        adapter.set_item("prefs", "b").unwrap();
        assert_eq!(adapter.get_item("prefs").unwrap(), Some("b".to_string()));
        assert_eq!(adapter.len(), 1);
    }

    #[test]
    fn memory_remove() {
        let adapter = MemoryAdapter::new();
        adapter.set_item("prefs", "a").unwrap();
        adapter.remove_item("prefs").unwrap();
        assert_eq!(adapter.get_item("prefs").unwrap(), None);
        assert!(adapter.is_empty());
    }

    #[test]
    fn memory_remove_missing_is_ok() {
        let adapter = MemoryAdapter::new();
        adapter.remove_item("never-stored").unwrap();
    }

    // ========================================================================
    // RedbStorage
    // ========================================================================

    #[test]
    fn redb_set_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = RedbStorage::open(&dir.path().join("data.redb")).unwrap();

        adapter.set_item("prefs", r#"{"count":1}"#).unwrap();
        assert_eq!(
            adapter.get_item("prefs").unwrap(),
            Some(r#"{"count":1}"#.to_string())
        );
    }

    #[test]
    fn redb_get_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = RedbStorage::open(&dir.path().join("data.redb")).unwrap();
        assert_eq!(adapter.get_item("nope").unwrap(), None);
    }

    #[test]
    fn redb_remove() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = RedbStorage::open(&dir.path().join("data.redb")).unwrap();

        adapter.set_item("prefs", "x").unwrap();
        adapter.remove_item("prefs").unwrap();
        assert_eq!(adapter.get_item("prefs").unwrap(), None);
    }

    #[test]
    fn redb_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.redb");

        {
            let adapter = RedbStorage::open(&path).unwrap();
            adapter.set_item("prefs", "survives").unwrap();
        }

        let adapter = RedbStorage::open(&path).unwrap();
        assert_eq!(
            adapter.get_item("prefs").unwrap(),
            Some("survives".to_string())
        );
    }

    // Compile-time: adapters must be shareable across threads.
    fn _assert_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MemoryAdapter>();
        assert_send_sync::<RedbStorage>();
    }
}
