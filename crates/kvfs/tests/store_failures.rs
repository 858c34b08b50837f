//! Integration tests for behavior when the backing store fails mid-operation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use kvfs::{
    DirEntry, KvFs, KvFsError, KvFsOptions, KvStore, MemoryKvStore, Node, ResolvedNode, StoreError,
};
use parking_lot::Mutex;

const S: u64 = 8;

/// Store that fails writes to selected keys.
#[derive(Default)]
struct FailingStore {
    inner: MemoryKvStore,
    /// Keys whose writes fail.
    failing_keys: Mutex<Vec<String>>,
    /// Keys whose range reads fail.
    failing_reads: Mutex<Vec<String>>,
    /// Fail every call when set.
    down: AtomicBool,
}

impl FailingStore {
    fn fail_writes_to(&self, key: &str) {
        self.failing_keys.lock().push(key.to_string());
    }

    fn fail_reads_of(&self, key: &str) {
        self.failing_reads.lock().push(key.to_string());
    }

    fn check(&self, key: &str) -> Result<(), StoreError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        if self.failing_keys.lock().iter().any(|k| k == key) {
            return Err(StoreError::Unavailable(format!("write to {} failed", key)));
        }
        Ok(())
    }

    fn check_up(&self) -> Result<(), StoreError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for FailingStore {
    async fn incr(&self, key: &str) -> Result<u64, StoreError> {
        self.check(key)?;
        self.inner.incr(key).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.check_up()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.check(key)?;
        self.inner.set(key, value).await
    }

    async fn get_range(&self, key: &str, offset: u64, len: u64) -> Result<Vec<u8>, StoreError> {
        self.check_up()?;
        if self.failing_reads.lock().iter().any(|k| k == key) {
            return Err(StoreError::Unavailable(format!("read of {} failed", key)));
        }
        self.inner.get_range(key, offset, len).await
    }

    async fn set_range(&self, key: &str, offset: u64, data: &[u8]) -> Result<u64, StoreError> {
        self.check(key)?;
        self.inner.set_range(key, offset, data).await
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.check_up()?;
        self.inner.hget(key, field).await
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.check(key)?;
        self.inner.hset(key, field, value).await
    }

    async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        self.check_up()?;
        self.inner.hget_all(key).await
    }
}

fn create_fs() -> (KvFs, Arc<FailingStore>) {
    let store: Arc<FailingStore> = Arc::new(FailingStore::default());
    let fs = KvFs::new(store.clone(), KvFsOptions::default().with_block_size(S)).unwrap();
    (fs, store)
}

#[tokio::test]
async fn test_failed_block_keeps_earlier_blocks_and_size() {
    let (fs, store) = create_fs();
    let file: Node = fs.create(&fs.root(), "f", 0o644).await.unwrap().node;
    store.fail_writes_to("b-1-1");

    let data: Vec<u8> = (1..=3 * S as u8).collect();
    let err: KvFsError = fs.write(&file, 0, &data).await.unwrap_err();
    assert!(matches!(err, KvFsError::BackingStore(StoreError::Unavailable(_))));

    // Block 0 landed, block 2 was never attempted, size was not extended
    assert_eq!(
        store.inner.get("b-1-0").await.unwrap(),
        Some(data[..S as usize].to_vec())
    );
    assert!(!store.inner.contains_key("b-1-2"));
    assert_eq!(fs.get_attr(&file).await.unwrap().size, 0);
}

#[tokio::test]
async fn test_partial_write_visible_within_old_size() {
    let (fs, store) = create_fs();
    let file: Node = fs.create(&fs.root(), "f", 0o644).await.unwrap().node;
    fs.write(&file, 0, &[b'a'; 2 * S as usize]).await.unwrap();

    store.fail_writes_to("b-1-1");
    assert!(fs.write(&file, 0, &[b'z'; 2 * S as usize]).await.is_err());

    let data: Vec<u8> = fs.read(&file, 0, 2 * S).await.unwrap();
    assert_eq!(&data[..S as usize], &[b'z'; S as usize][..]);
    assert_eq!(&data[S as usize..], &[b'a'; S as usize][..]);
}

#[tokio::test]
async fn test_create_with_failed_entry_insert_leaves_orphan() {
    let (fs, store) = create_fs();
    fs.create(&fs.root(), "kept", 0o644).await.unwrap();

    store.fail_writes_to("d-0");
    let err: KvFsError = fs.create(&fs.root(), "lost", 0o644).await.unwrap_err();
    assert!(matches!(err, KvFsError::BackingStore(_)));

    // The inode and its attributes exist but nothing points at them
    assert!(store.inner.contains_key("a-2"));
    assert!(fs.lookup(&fs.root(), "lost").await.unwrap_err().is_not_found());
    assert_eq!(fs.read_dir_all(&fs.root()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_read_dir_all_skips_entries_without_attributes() {
    let (fs, store) = create_fs();
    fs.create(&fs.root(), "real", 0o644).await.unwrap();
    store.inner.hset("d-0", "ghost", "42").await.unwrap();

    let entries: Vec<DirEntry> = fs.read_dir_all(&fs.root()).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "real");

    // Lookup of the orphan entry reports the missing attributes
    assert!(fs.lookup(&fs.root(), "ghost").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_read_dir_all_propagates_malformed_child() {
    let (fs, store) = create_fs();
    let child: ResolvedNode = fs.create(&fs.root(), "bad", 0o644).await.unwrap();
    store.inner.set("a-1", b"{").await.unwrap();
    assert_eq!(child.node.inode(), 1);

    let err: KvFsError = fs.read_dir_all(&fs.root()).await.unwrap_err();
    assert!(matches!(err, KvFsError::Malformed { .. }));
}

#[tokio::test]
async fn test_malformed_entry_value() {
    let (fs, store) = create_fs();
    store.inner.hset("d-0", "weird", "not-a-number").await.unwrap();

    let err: KvFsError = fs.lookup(&fs.root(), "weird").await.unwrap_err();
    assert!(matches!(err, KvFsError::Malformed { .. }));
}

#[tokio::test]
async fn test_store_down_is_not_masked_as_not_found() {
    let (fs, store) = create_fs();
    let file: Node = fs.create(&fs.root(), "f", 0o644).await.unwrap().node;
    store.down.store(true, Ordering::SeqCst);

    for err in [
        fs.lookup(&fs.root(), "f").await.unwrap_err(),
        fs.get_attr(&file).await.unwrap_err(),
        fs.read(&file, 0, 1).await.unwrap_err(),
        fs.read_dir_all(&fs.root()).await.unwrap_err(),
    ] {
        assert!(!err.is_not_found());
        assert!(matches!(err, KvFsError::BackingStore(_)));
    }
}

#[tokio::test]
async fn test_unbounded_read_of_huge_sparse_file() {
    let (fs, store) = create_fs();
    let file: Node = fs.create(&fs.root(), "huge", 0o644).await.unwrap().node;
    let end: u64 = 1 << 40;
    fs.write(&file, end - 3, b"end").await.unwrap();
    assert_eq!(fs.get_attr(&file).await.unwrap().size, end);

    assert_eq!(fs.read(&file, end - 3, u64::MAX).await.unwrap(), b"end".to_vec());

    // The whole-file request fails on its first block instead of reserving
    // the full size up front
    store.fail_reads_of("b-1-0");
    let err: KvFsError = fs.read(&file, 0, u64::MAX).await.unwrap_err();
    assert!(matches!(err, KvFsError::BackingStore(StoreError::Unavailable(_))));
}
