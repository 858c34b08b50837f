//! Backing-store key layout.
//!
//! ```text
//! inode                 counter, INCR mints new inode ids
//! a-<inode>             JSON attribute record
//! d-<inode>             hash: child name -> decimal child inode id
//! b-<inode>-<block>     raw block bytes (absent key reads as zeros)
//! ```

use crate::inode::InodeId;

/// Counter key incremented to allocate inode ids.
pub const INODE_COUNTER_KEY: &str = "inode";

/// Key of the attribute record for an inode.
pub fn attr_key(inode: InodeId) -> String {
    format!("a-{}", inode)
}

/// Key of the directory entry hash for a directory inode.
pub fn dir_key(inode: InodeId) -> String {
    format!("d-{}", inode)
}

/// Key of one content block of a file.
pub fn block_key(inode: InodeId, block_index: u64) -> String {
    format!("b-{}-{}", inode, block_index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(INODE_COUNTER_KEY, "inode");
        assert_eq!(attr_key(0), "a-0");
        assert_eq!(dir_key(42), "d-42");
        assert_eq!(block_key(3, 17), "b-3-17");
    }
}
