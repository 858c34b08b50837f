//! Inode id allocation.

use std::sync::Arc;

use crate::error::Result;
use crate::keys::INODE_COUNTER_KEY;
use crate::kv::KvStore;

use super::types::InodeId;

/// Hands out unique inode ids from the backing store's atomic counter.
///
/// Uniqueness across processes is delegated to the store's increment, which
/// is linearizable. Ids are never returned to the pool.
#[derive(Clone)]
pub struct InodeAllocator {
    store: Arc<dyn KvStore>,
}

impl InodeAllocator {
    /// Create an allocator over a shared store handle.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Allocate a new inode id.
    ///
    /// Store failures propagate unchanged; there is no retry.
    pub async fn next(&self) -> Result<InodeId> {
        let id: InodeId = self.store.incr(INODE_COUNTER_KEY).await?;
        Ok(id)
    }
}
