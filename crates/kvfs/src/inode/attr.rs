//! Per-inode attribute records.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{KvFsError, Result};
use crate::keys::attr_key;
use crate::kv::KvStore;

use super::types::{InodeId, NodeKind, ROOT_INODE};

/// Default root directory permissions (rwxr-xr-x).
pub const DEFAULT_ROOT_PERMS: u32 = 0o755;

/// Attribute record stored at `a-<inode>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InodeAttr {
    /// Inode id.
    pub inode: InodeId,
    /// Type and permission bits.
    pub mode: u32,
    /// Size in bytes. For files, the upper bound of written content.
    pub size: u64,
    /// Bytes per content block, fixed at creation.
    pub block_size: u64,
    /// Last access time.
    pub atime: SystemTime,
    /// Last content modification time.
    pub mtime: SystemTime,
    /// Last attribute change time.
    pub ctime: SystemTime,
    /// Creation time.
    pub crtime: SystemTime,
}

impl InodeAttr {
    /// Build the record for a freshly created object.
    ///
    /// # Arguments
    /// * `inode` - Allocated inode id
    /// * `kind` - Directory or file
    /// * `perm` - Requested permission bits
    /// * `block_size` - Block size for the object's content
    pub fn new(inode: InodeId, kind: NodeKind, perm: u32, block_size: u64) -> Self {
        let now: SystemTime = SystemTime::now();
        Self {
            inode,
            mode: kind.mode(perm),
            size: 0,
            block_size,
            atime: now,
            mtime: now,
            ctime: now,
            crtime: now,
        }
    }

    /// Record reported for a root directory that has never been written.
    pub fn root(block_size: u64) -> Self {
        Self {
            inode: ROOT_INODE,
            mode: NodeKind::Directory.mode(DEFAULT_ROOT_PERMS),
            size: 0,
            block_size,
            atime: UNIX_EPOCH,
            mtime: UNIX_EPOCH,
            ctime: UNIX_EPOCH,
            crtime: UNIX_EPOCH,
        }
    }

    /// Kind encoded in the mode bits.
    pub fn kind(&self) -> NodeKind {
        NodeKind::from_mode(self.mode)
    }

    /// Permission bits only.
    pub fn perm(&self) -> u16 {
        (self.mode & super::types::PERM_MASK) as u16
    }
}

/// Reads and writes attribute records.
///
/// Records are stored whole; there is no partial-field update. Concurrent
/// read-modify-write cycles on one inode are last-writer-wins.
#[derive(Clone)]
pub struct AttrStore {
    store: Arc<dyn KvStore>,
}

impl AttrStore {
    /// Create an attribute store over a shared store handle.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Persist a record under its inode id.
    ///
    /// # Arguments
    /// * `attr` - Record to write
    pub async fn write(&self, attr: &InodeAttr) -> Result<()> {
        let key: String = attr_key(attr.inode);
        let encoded: Vec<u8> = serde_json::to_vec(attr).map_err(|e| KvFsError::Malformed {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        self.store.set(&key, &encoded).await?;
        Ok(())
    }

    /// Load the record of an inode.
    ///
    /// # Arguments
    /// * `inode` - Inode id
    ///
    /// # Returns
    /// The record, `NotFound` if none exists, `Malformed` if it fails to decode.
    pub async fn read(&self, inode: InodeId) -> Result<InodeAttr> {
        let key: String = attr_key(inode);
        let raw: Vec<u8> = self
            .store
            .get(&key)
            .await?
            .ok_or_else(|| KvFsError::not_found(key.clone()))?;

        serde_json::from_slice(&raw).map_err(|e| KvFsError::Malformed {
            key,
            reason: e.to_string(),
        })
    }
}
