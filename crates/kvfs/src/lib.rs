//! Writable filesystem stored in a remote key-value store.
//!
//! Every filesystem object is kept in the store under a fixed key layout:
//! attribute records at `a-<inode>`, directory entry hashes at `d-<inode>`,
//! content blocks at `b-<inode>-<block>` and the inode counter at `inode`.
//! No state is cached in process, so several mounts over one store observe
//! each other's writes.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: FUSE Interface (fuser::Filesystem impl, feature "fuse")
//! Layer 2: Filesystem Operations (KvFs: lookup, mkdir, create, read, write)
//! Layer 1: Primitives (InodeAllocator, AttrStore, DirectoryTable, BlockStore)
//! Layer 0: Backing Store (KvStore: MemoryKvStore, RedisKvStore)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use kvfs::{KvFs, KvFsOptions, MemoryKvStore};
//!
//! let fs = KvFs::new(Arc::new(MemoryKvStore::new()), KvFsOptions::default())?;
//! let file = fs.create(&fs.root(), "hello", 0o644).await?;
//! fs.write(&file.node, 0, b"hello").await?;
//! ```

pub mod content;
pub mod error;
pub mod executor;
pub mod fs;
pub mod inode;
pub mod keys;
pub mod kv;
pub mod options;

#[cfg(feature = "fuse")]
pub mod fuse;

pub use error::{KvFsError, Result, StoreError};
pub use executor::{AsyncExecutor, ExecutorConfig, ExecutorError};
pub use fs::{AttrChanges, DirEntry, KvFs, ResolvedNode, StatFs};
pub use inode::{InodeAttr, InodeId, Node, NodeKind, ROOT_INODE};
pub use kv::{KvStore, MemoryKvStore};
pub use options::{KernelCacheOptions, KvFsOptions, StatFsOptions, TimeoutOptions};

#[cfg(feature = "redis")]
pub use kv::{RedisKvStore, RedisOptions};

#[cfg(feature = "fuse")]
pub use fuse::{mount, spawn_mount, KvFuse};
