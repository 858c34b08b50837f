//! File content for the filesystem.
//!
//! File bytes are split into fixed-size blocks, each stored as an independent
//! value at `b-<inode>-<block>`. `BlockStore` reads and writes byte ranges of
//! single blocks; `ContentAccessor` maps arbitrary (offset, length) requests
//! onto block ranges and keeps the inode's size attribute in step.

mod accessor;
mod block;

pub use accessor::{block_segments, BlockSegment, ContentAccessor};
pub use block::BlockStore;
