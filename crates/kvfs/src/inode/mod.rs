//! Inode primitives for the filesystem.
//!
//! This module provides inode id allocation, attribute records and the
//! directory entry table. All of them are stateless handles over the shared
//! backing store.

mod allocator;
mod attr;
mod dir;
mod types;

pub use allocator::InodeAllocator;
pub use attr::{AttrStore, InodeAttr, DEFAULT_ROOT_PERMS};
pub use dir::DirectoryTable;
pub use types::{InodeId, Node, NodeKind, PERM_MASK, ROOT_INODE, S_IFDIR, S_IFMT, S_IFREG};
