//! KvStore trait and in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::StoreError;

/// Trait for key-value services that can back the filesystem.
///
/// Each call is atomic at its key. No call spans more than one key, so
/// multi-step filesystem operations are not atomic as a whole.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Atomically increment an integer counter by one.
    ///
    /// # Arguments
    /// * `key` - Counter key (a missing key counts from zero)
    ///
    /// # Returns
    /// The counter value after the increment.
    async fn incr(&self, key: &str) -> Result<u64, StoreError>;

    /// Read a whole value.
    ///
    /// # Arguments
    /// * `key` - Value key
    ///
    /// # Returns
    /// The value, or None if the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replace a whole value.
    ///
    /// # Arguments
    /// * `key` - Value key
    /// * `value` - New value bytes
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Read a byte range of a string value.
    ///
    /// # Arguments
    /// * `key` - Value key
    /// * `offset` - Start offset in bytes
    /// * `len` - Number of bytes to read
    ///
    /// # Returns
    /// At most `len` bytes. Empty when the key does not exist or the range
    /// starts past the end of the value.
    async fn get_range(&self, key: &str, offset: u64, len: u64) -> Result<Vec<u8>, StoreError>;

    /// Overwrite a byte range of a string value.
    ///
    /// Bytes between the current end of the value and `offset` are
    /// zero-filled. A missing key is treated as an empty value.
    ///
    /// # Arguments
    /// * `key` - Value key
    /// * `offset` - Start offset in bytes
    /// * `data` - Bytes to write
    ///
    /// # Returns
    /// Length of the value after the write.
    async fn set_range(&self, key: &str, offset: u64, data: &[u8]) -> Result<u64, StoreError>;

    /// Read one field of a hash.
    ///
    /// # Arguments
    /// * `key` - Hash key
    /// * `field` - Field name
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;

    /// Set one field of a hash, overwriting any previous value.
    ///
    /// # Arguments
    /// * `key` - Hash key
    /// * `field` - Field name
    /// * `value` - Field value
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;

    /// Read every field of a hash.
    ///
    /// # Arguments
    /// * `key` - Hash key
    ///
    /// # Returns
    /// All fields, empty when the key does not exist.
    async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;
}

/// A stored value.
#[derive(Debug, Clone)]
enum Entry {
    Bytes(Vec<u8>),
    Hash(HashMap<String, String>),
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::Response(format!(
        "WRONGTYPE operation against a key holding the wrong kind of value: {}",
        key
    ))
}

/// In-memory key-value store.
///
/// Follows the same semantics as the remote store, including zero-filled
/// range writes and empty range reads of missing keys.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    /// Values by key.
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryKvStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn key_count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check whether a key exists.
    ///
    /// # Arguments
    /// * `key` - Key to check
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn incr(&self, key: &str) -> Result<u64, StoreError> {
        let mut entries = self.entries.lock();
        let current: u64 = match entries.get(key) {
            None => 0,
            Some(Entry::Bytes(raw)) => std::str::from_utf8(raw)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or_else(|| {
                    StoreError::Response(format!("value is not an integer: {}", key))
                })?,
            Some(Entry::Hash(_)) => return Err(wrong_type(key)),
        };
        let next: u64 = current + 1;
        entries.insert(key.to_string(), Entry::Bytes(next.to_string().into_bytes()));
        Ok(next)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self.entries.lock().get(key) {
            None => Ok(None),
            Some(Entry::Bytes(raw)) => Ok(Some(raw.clone())),
            Some(Entry::Hash(_)) => Err(wrong_type(key)),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entries
            .lock()
            .insert(key.to_string(), Entry::Bytes(value.to_vec()));
        Ok(())
    }

    async fn get_range(&self, key: &str, offset: u64, len: u64) -> Result<Vec<u8>, StoreError> {
        match self.entries.lock().get(key) {
            None => Ok(Vec::new()),
            Some(Entry::Bytes(raw)) => {
                let start: usize = (offset as usize).min(raw.len());
                let end: usize = (offset.saturating_add(len) as usize).min(raw.len());
                Ok(raw[start..end].to_vec())
            }
            Some(Entry::Hash(_)) => Err(wrong_type(key)),
        }
    }

    async fn set_range(&self, key: &str, offset: u64, data: &[u8]) -> Result<u64, StoreError> {
        let mut entries = self.entries.lock();
        if data.is_empty() {
            return match entries.get(key) {
                None => Ok(0),
                Some(Entry::Bytes(raw)) => Ok(raw.len() as u64),
                Some(Entry::Hash(_)) => Err(wrong_type(key)),
            };
        }

        let entry: &mut Entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Bytes(Vec::new()));
        let raw: &mut Vec<u8> = match entry {
            Entry::Bytes(raw) => raw,
            Entry::Hash(_) => return Err(wrong_type(key)),
        };

        let start: usize = offset as usize;
        let end: usize = start + data.len();
        if raw.len() < end {
            raw.resize(end, 0);
        }
        raw[start..end].copy_from_slice(data);
        Ok(raw.len() as u64)
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        match self.entries.lock().get(key) {
            None => Ok(None),
            Some(Entry::Hash(map)) => Ok(map.get(field).cloned()),
            Some(Entry::Bytes(_)) => Err(wrong_type(key)),
        }
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        let entry: &mut Entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Hash(HashMap::new()));
        match entry {
            Entry::Hash(map) => {
                map.insert(field.to_string(), value.to_string());
                Ok(())
            }
            Entry::Bytes(_) => Err(wrong_type(key)),
        }
    }

    async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        match self.entries.lock().get(key) {
            None => Ok(HashMap::new()),
            Some(Entry::Hash(map)) => Ok(map.clone()),
            Some(Entry::Bytes(_)) => Err(wrong_type(key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_incr() {
        let store: MemoryKvStore = MemoryKvStore::new();
        assert_eq!(store.incr("inode").await.unwrap(), 1);
        assert_eq!(store.incr("inode").await.unwrap(), 2);
        assert_eq!(store.get("inode").await.unwrap(), Some(b"2".to_vec()));
    }

    #[tokio::test]
    async fn test_memory_store_get_set() {
        let store: MemoryKvStore = MemoryKvStore::new();
        assert_eq!(store.get("a-1").await.unwrap(), None);

        store.set("a-1", b"{}").await.unwrap();
        assert_eq!(store.get("a-1").await.unwrap(), Some(b"{}".to_vec()));
    }

    #[tokio::test]
    async fn test_memory_store_set_range_zero_fills_gap() {
        let store: MemoryKvStore = MemoryKvStore::new();
        let len: u64 = store.set_range("b-1-0", 3, b"xy").await.unwrap();
        assert_eq!(len, 5);
        assert_eq!(store.get("b-1-0").await.unwrap(), Some(vec![0, 0, 0, b'x', b'y']));

        // Overwrite in the middle keeps the tail
        store.set_range("b-1-0", 1, b"a").await.unwrap();
        assert_eq!(store.get("b-1-0").await.unwrap(), Some(vec![0, b'a', 0, b'x', b'y']));
    }

    #[tokio::test]
    async fn test_memory_store_set_range_empty_data() {
        let store: MemoryKvStore = MemoryKvStore::new();
        assert_eq!(store.set_range("b-1-0", 10, b"").await.unwrap(), 0);
        assert!(!store.contains_key("b-1-0"));
    }

    #[tokio::test]
    async fn test_memory_store_get_range() {
        let store: MemoryKvStore = MemoryKvStore::new();
        store.set("k", b"hello").await.unwrap();

        assert_eq!(store.get_range("k", 1, 3).await.unwrap(), b"ell".to_vec());
        assert_eq!(store.get_range("k", 3, 100).await.unwrap(), b"lo".to_vec());
        assert!(store.get_range("k", 10, 2).await.unwrap().is_empty());
        assert!(store.get_range("missing", 0, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_hash() {
        let store: MemoryKvStore = MemoryKvStore::new();
        assert!(store.hget_all("d-0").await.unwrap().is_empty());

        store.hset("d-0", "x", "1").await.unwrap();
        store.hset("d-0", "y", "2").await.unwrap();
        store.hset("d-0", "x", "3").await.unwrap();

        assert_eq!(store.hget("d-0", "x").await.unwrap(), Some("3".to_string()));
        assert_eq!(store.hget("d-0", "z").await.unwrap(), None);
        assert_eq!(store.hget_all("d-0").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_memory_store_wrong_type() {
        let store: MemoryKvStore = MemoryKvStore::new();
        store.hset("d-0", "x", "1").await.unwrap();

        let result: Result<Option<Vec<u8>>, StoreError> = store.get("d-0").await;
        assert!(matches!(result, Err(StoreError::Response(_))));
    }
}
