//! Directory entry table.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{KvFsError, Result};
use crate::keys::dir_key;
use crate::kv::KvStore;

use super::types::InodeId;

/// Maps child names to inode ids, one hash per directory inode.
///
/// Inserts are upserts: a second insert of the same name silently replaces
/// the first mapping. Entries are never removed.
#[derive(Clone)]
pub struct DirectoryTable {
    store: Arc<dyn KvStore>,
}

impl DirectoryTable {
    /// Create a directory table over a shared store handle.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Insert or overwrite a child entry.
    ///
    /// # Arguments
    /// * `parent` - Directory inode
    /// * `name` - Child entry name
    /// * `child` - Child inode id
    pub async fn insert(&self, parent: InodeId, name: &str, child: InodeId) -> Result<()> {
        self.store
            .hset(&dir_key(parent), name, &child.to_string())
            .await?;
        Ok(())
    }

    /// Get a child inode id by name.
    ///
    /// # Arguments
    /// * `parent` - Directory inode
    /// * `name` - Child entry name
    ///
    /// # Returns
    /// The child inode id, or `NotFound` if no entry has that name.
    pub async fn lookup(&self, parent: InodeId, name: &str) -> Result<InodeId> {
        let key: String = dir_key(parent);
        match self.store.hget(&key, name).await? {
            Some(raw) => parse_child(&key, &raw),
            None => Err(KvFsError::not_found(format!("{}/{}", key, name))),
        }
    }

    /// Get all entries of a directory.
    ///
    /// # Arguments
    /// * `parent` - Directory inode
    ///
    /// # Returns
    /// Unordered (name, inode_id) pairs; empty for a directory without entries.
    pub async fn list(&self, parent: InodeId) -> Result<Vec<(String, InodeId)>> {
        let key: String = dir_key(parent);
        let fields: HashMap<String, String> = self.store.hget_all(&key).await?;
        fields
            .into_iter()
            .map(|(name, raw)| Ok((name, parse_child(&key, &raw)?)))
            .collect()
    }
}

/// Parse a decimal child inode id stored in a directory hash.
fn parse_child(key: &str, raw: &str) -> Result<InodeId> {
    raw.parse::<InodeId>().map_err(|e| KvFsError::Malformed {
        key: key.to_string(),
        reason: format!("bad child inode {:?}: {}", raw, e),
    })
}
