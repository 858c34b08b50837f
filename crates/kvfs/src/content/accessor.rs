//! Byte-range reads and writes over block storage.

use crate::error::{KvFsError, Result};
use crate::inode::{AttrStore, InodeAttr, InodeId};

use super::BlockStore;

/// Largest buffer reserved before the first block of a read is fetched.
const MAX_READ_RESERVE: u64 = 1 << 20;

/// One block-aligned piece of a byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSegment {
    /// Block index within the file.
    pub block_index: u64,
    /// Start offset within the block.
    pub offset_in_block: u64,
    /// Length of the piece.
    pub len: u64,
    /// Position of the piece within the caller's buffer.
    pub buf_offset: u64,
}

/// Split `[offset, offset + len)` into consecutive block-aligned segments.
///
/// # Arguments
/// * `offset` - Start of the range in the file
/// * `len` - Length of the range
/// * `block_size` - Bytes per block (must be non-zero)
///
/// # Returns
/// Segments in block order. No segment is empty.
pub fn block_segments(offset: u64, len: u64, block_size: u64) -> impl Iterator<Item = BlockSegment> {
    let end: u64 = offset + len;
    let mut pos: u64 = offset;
    std::iter::from_fn(move || {
        if pos >= end {
            return None;
        }
        let offset_in_block: u64 = pos % block_size;
        let seg_len: u64 = (block_size - offset_in_block).min(end - pos);
        let segment = BlockSegment {
            block_index: pos / block_size,
            offset_in_block,
            len: seg_len,
            buf_offset: pos - offset,
        };
        pos += seg_len;
        Some(segment)
    })
}

/// Reads and writes file content at arbitrary offsets.
///
/// Keeps the size attribute equal to the highest written extent. Nothing is
/// cached: every call loads the attribute record and touches the blocks it
/// needs.
#[derive(Clone)]
pub struct ContentAccessor {
    attrs: AttrStore,
    blocks: BlockStore,
}

impl ContentAccessor {
    /// Create an accessor over the attribute and block stores.
    pub fn new(attrs: AttrStore, blocks: BlockStore) -> Self {
        Self { attrs, blocks }
    }

    /// Write bytes at an offset.
    ///
    /// Blocks are written in order. The first failing block write aborts the
    /// call; blocks written before it stay written. The size attribute is
    /// extended after all blocks succeed and never shrinks.
    ///
    /// # Arguments
    /// * `inode` - File inode
    /// * `offset` - Start offset in the file
    /// * `data` - Bytes to write
    ///
    /// # Returns
    /// Number of bytes written (always `data.len()` on success).
    pub async fn write(&self, inode: InodeId, offset: u64, data: &[u8]) -> Result<u64> {
        let mut attr: InodeAttr = self.attrs.read(inode).await?;
        let block_size: u64 = checked_block_size(&attr)?;
        let len: u64 = data.len() as u64;
        let end: u64 = offset
            .checked_add(len)
            .ok_or(KvFsError::Unsupported("write past maximum file size"))?;

        for seg in block_segments(offset, len, block_size) {
            let start: usize = seg.buf_offset as usize;
            let piece: &[u8] = &data[start..start + seg.len as usize];
            self.blocks
                .write_range(inode, seg.block_index, seg.offset_in_block, piece)
                .await?;
        }

        if end > attr.size {
            attr.size = end;
            self.attrs.write(&attr).await?;
        }

        tracing::debug!("write inode={} offset={} len={} size={}", inode, offset, len, attr.size);
        Ok(len)
    }

    /// Read bytes from an offset.
    ///
    /// Reads at or past end of file return an empty buffer. Ranges crossing
    /// end of file are clamped. Missing or short blocks inside the range are
    /// zero-padded, so the result length always equals the clamped size.
    ///
    /// # Arguments
    /// * `inode` - File inode
    /// * `offset` - Start offset in the file
    /// * `size` - Number of bytes wanted
    pub async fn read(&self, inode: InodeId, offset: u64, size: u64) -> Result<Vec<u8>> {
        let attr: InodeAttr = self.attrs.read(inode).await?;
        if offset >= attr.size {
            return Ok(Vec::new());
        }
        let block_size: u64 = checked_block_size(&attr)?;
        let actual: u64 = size.min(attr.size - offset);

        // Grows as blocks arrive; only a bounded prefix is reserved up front
        let mut result: Vec<u8> = Vec::with_capacity(actual.min(MAX_READ_RESERVE) as usize);
        for seg in block_segments(offset, actual, block_size) {
            let mut piece: Vec<u8> = self
                .blocks
                .read_range(inode, seg.block_index, seg.offset_in_block, seg.len)
                .await?;
            // Unwritten blocks come back short or empty
            piece.resize(seg.len as usize, 0);
            result.extend_from_slice(&piece);
        }

        tracing::debug!("read inode={} offset={} len={}", inode, offset, result.len());
        Ok(result)
    }
}

fn checked_block_size(attr: &InodeAttr) -> Result<u64> {
    if attr.block_size == 0 {
        return Err(KvFsError::Malformed {
            key: crate::keys::attr_key(attr.inode),
            reason: "block_size is zero".to_string(),
        });
    }
    Ok(attr.block_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::inode::NodeKind;
    use crate::kv::MemoryKvStore;

    const BS: u64 = 8;

    async fn create_accessor() -> (ContentAccessor, AttrStore) {
        let kv: Arc<MemoryKvStore> = Arc::new(MemoryKvStore::new());
        let attrs: AttrStore = AttrStore::new(kv.clone());
        attrs
            .write(&InodeAttr::new(1, NodeKind::File, 0o644, BS))
            .await
            .unwrap();
        (ContentAccessor::new(attrs.clone(), BlockStore::new(kv)), attrs)
    }

    #[test]
    fn test_segments_single_block() {
        let segs: Vec<BlockSegment> = block_segments(2, 3, BS).collect();
        assert_eq!(
            segs,
            vec![BlockSegment { block_index: 0, offset_in_block: 2, len: 3, buf_offset: 0 }]
        );
    }

    #[test]
    fn test_segments_cross_boundaries() {
        let segs: Vec<BlockSegment> = block_segments(6, 12, BS).collect();
        assert_eq!(
            segs,
            vec![
                BlockSegment { block_index: 0, offset_in_block: 6, len: 2, buf_offset: 0 },
                BlockSegment { block_index: 1, offset_in_block: 0, len: 8, buf_offset: 2 },
                BlockSegment { block_index: 2, offset_in_block: 0, len: 2, buf_offset: 10 },
            ]
        );
    }

    #[test]
    fn test_segments_end_on_boundary_and_empty() {
        let segs: Vec<BlockSegment> = block_segments(8, 8, BS).collect();
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].block_index, 1);

        assert_eq!(block_segments(5, 0, BS).count(), 0);
    }

    #[tokio::test]
    async fn test_write_extends_size() {
        let (accessor, attrs) = create_accessor().await;

        assert_eq!(accessor.write(1, 3, b"abcdefgh").await.unwrap(), 8);
        assert_eq!(attrs.read(1).await.unwrap().size, 11);

        // Writing inside the existing extent leaves size alone
        accessor.write(1, 0, b"xy").await.unwrap();
        assert_eq!(attrs.read(1).await.unwrap().size, 11);
    }

    #[tokio::test]
    async fn test_read_clamps_to_size() {
        let (accessor, _attrs) = create_accessor().await;
        accessor.write(1, 0, b"0123456789").await.unwrap();

        assert_eq!(accessor.read(1, 7, 100).await.unwrap(), b"789".to_vec());
        assert!(accessor.read(1, 10, 5).await.unwrap().is_empty());
        assert!(accessor.read(1, 50, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_zero_pads_interior_gap() {
        let (accessor, _attrs) = create_accessor().await;
        accessor.write(1, 0, b"ab").await.unwrap();
        accessor.write(1, 2 * BS + 1, b"z").await.unwrap();

        let data: Vec<u8> = accessor.read(1, 0, 2 * BS + 2).await.unwrap();
        let mut expected: Vec<u8> = vec![0u8; (2 * BS + 2) as usize];
        expected[0] = b'a';
        expected[1] = b'b';
        expected[(2 * BS + 1) as usize] = b'z';
        assert_eq!(data, expected);
    }

    #[tokio::test]
    async fn test_unknown_inode() {
        let (accessor, _attrs) = create_accessor().await;
        assert!(accessor.write(99, 0, b"x").await.unwrap_err().is_not_found());
        assert!(accessor.read(99, 0, 1).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_zero_block_size_is_malformed() {
        let (accessor, attrs) = create_accessor().await;
        attrs
            .write(&InodeAttr::new(2, NodeKind::File, 0o644, 0))
            .await
            .unwrap();

        let err: KvFsError = accessor.write(2, 0, b"x").await.unwrap_err();
        assert!(matches!(err, KvFsError::Malformed { .. }));
    }
}
