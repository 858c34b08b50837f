//! Block storage.

use std::sync::Arc;

use crate::error::Result;
use crate::inode::InodeId;
use crate::keys::block_key;
use crate::kv::KvStore;

/// Reads and writes byte ranges within single content blocks.
///
/// A block that was never written has no stored value and reads as empty.
/// Callers keep `offset_in_block + len` within the block size.
#[derive(Clone)]
pub struct BlockStore {
    store: Arc<dyn KvStore>,
}

impl BlockStore {
    /// Create a block store over a shared store handle.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Write bytes into a block.
    ///
    /// The stored buffer grows as needed; bytes before `offset_in_block` that
    /// were never written are zero-filled by the store.
    ///
    /// # Arguments
    /// * `inode` - File inode
    /// * `block_index` - Block index within the file
    /// * `offset_in_block` - Start offset within the block
    /// * `data` - Bytes to write
    pub async fn write_range(
        &self,
        inode: InodeId,
        block_index: u64,
        offset_in_block: u64,
        data: &[u8],
    ) -> Result<()> {
        self.store
            .set_range(&block_key(inode, block_index), offset_in_block, data)
            .await?;
        Ok(())
    }

    /// Read bytes from a block.
    ///
    /// # Arguments
    /// * `inode` - File inode
    /// * `block_index` - Block index within the file
    /// * `offset_in_block` - Start offset within the block
    /// * `len` - Number of bytes wanted
    ///
    /// # Returns
    /// Up to `len` bytes; shorter (possibly empty) when the block is missing
    /// or was only partially written.
    pub async fn read_range(
        &self,
        inode: InodeId,
        block_index: u64,
        offset_in_block: u64,
        len: u64,
    ) -> Result<Vec<u8>> {
        let data: Vec<u8> = self
            .store
            .get_range(&block_key(inode, block_index), offset_in_block, len)
            .await?;
        Ok(data)
    }
}
