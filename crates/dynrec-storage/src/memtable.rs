//! MemTable - In-memory write buffer
//!
//! One memtable per namespace. Keys are kept sorted; a deleted key is kept as
//! a tombstone (`None`) so it shadows older values in segments until flushed.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A key with its value, `None` for a tombstone
pub type Entry = (Vec<u8>, Option<Vec<u8>>);

/// Sorted in-memory write buffer
#[derive(Debug, Default)]
pub struct MemTable {
    entries: RwLock<BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
    /// Bytes held by keys and values
    size: AtomicUsize,
}

fn entry_size(key: &[u8], value: &Option<Vec<u8>>) -> usize {
    key.len() + value.as_ref().map_or(0, Vec::len)
}

impl MemTable {
    /// Create an empty MemTable
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, key: Vec<u8>, value: Option<Vec<u8>>) {
        let added = entry_size(&key, &value);
        let mut entries = self.entries.write();
        let removed = match entries.get(&key) {
            Some(old) => entry_size(&key, old),
            None => 0,
        };
        entries.insert(key, value);
        // Adjusted under the write lock so the total never underflows
        self.size.fetch_add(added, Ordering::Relaxed);
        self.size.fetch_sub(removed, Ordering::Relaxed);
    }

    /// Insert or overwrite a value
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) {
        self.insert(key, Some(value));
    }

    /// Record a tombstone for a key
    pub fn delete(&self, key: Vec<u8>) {
        self.insert(key, None);
    }

    /// Look up a key
    ///
    /// `None` if the memtable knows nothing about it, `Some(None)` for a
    /// tombstone.
    pub fn get(&self, key: &[u8]) -> Option<Option<Vec<u8>>> {
        self.entries.read().get(key).cloned()
    }

    /// Number of keys, tombstones included
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Approximate memory usage in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Copy out all entries in key order
    pub fn snapshot(&self) -> Vec<Entry> {
        self.entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Drop all entries
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        entries.clear();
        self.size.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_overwrite() {
        let memtable = MemTable::new();
        memtable.put(b"k".to_vec(), b"one".to_vec());
        memtable.put(b"k".to_vec(), b"two".to_vec());

        assert_eq!(memtable.get(b"k"), Some(Some(b"two".to_vec())));
        assert_eq!(memtable.get(b"x"), None);
        assert_eq!(memtable.len(), 1);
        assert_eq!(memtable.size(), 4);
    }

    #[test]
    fn test_tombstone() {
        let memtable = MemTable::new();
        memtable.put(b"k".to_vec(), b"v".to_vec());
        memtable.delete(b"k".to_vec());

        assert_eq!(memtable.get(b"k"), Some(None));
        assert_eq!(memtable.len(), 1);
        assert_eq!(memtable.size(), 1);
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let memtable = MemTable::new();
        for key in ["10", "2", "1", "0"] {
            memtable.put(key.as_bytes().to_vec(), Vec::new());
        }
        memtable.delete(b"3".to_vec());

        let keys: Vec<_> = memtable.snapshot().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![b"0".to_vec(), b"1".to_vec(), b"10".to_vec(), b"2".to_vec(), b"3".to_vec()]
        );
    }

    #[test]
    fn test_clear() {
        let memtable = MemTable::new();
        memtable.put(b"a".to_vec(), b"b".to_vec());
        memtable.clear();
        assert!(memtable.is_empty());
        assert_eq!(memtable.size(), 0);
    }
}
