//! Filesystem operations over the backing store.
//!
//! `KvFs` is the operation surface a kernel bridge calls into. It holds no
//! in-process state besides its component handles: every call reads and
//! writes the backing store directly.

use std::sync::Arc;
use std::time::SystemTime;

use crate::content::{BlockStore, ContentAccessor};
use crate::error::{KvFsError, Result};
use crate::inode::{
    AttrStore, DirectoryTable, InodeAllocator, InodeAttr, InodeId, Node, NodeKind, ROOT_INODE,
};
use crate::kv::KvStore;
use crate::options::KvFsOptions;

/// A handle together with the attribute record it was classified from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNode {
    /// Typed handle.
    pub node: Node,
    /// Attribute record read during classification.
    pub attr: InodeAttr,
}

/// One directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name.
    pub name: String,
    /// Child inode.
    pub inode: InodeId,
    /// Child kind, resolved from its attribute record.
    pub kind: NodeKind,
}

/// Capacity numbers reported to statfs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatFs {
    /// Total data blocks.
    pub blocks: u64,
    /// Free blocks.
    pub bfree: u64,
    /// Free blocks available to unprivileged users.
    pub bavail: u64,
    /// Total file nodes.
    pub files: u64,
    /// Free file nodes.
    pub ffree: u64,
    /// Block size.
    pub bsize: u32,
    /// Maximum name length.
    pub namelen: u32,
}

/// Attribute changes requested through setattr.
///
/// `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct AttrChanges {
    /// New permission bits. Type bits are ignored.
    pub mode: Option<u32>,
    /// New access time.
    pub atime: Option<SystemTime>,
    /// New modification time.
    pub mtime: Option<SystemTime>,
    /// New size. Only the current size is accepted.
    pub size: Option<u64>,
}

/// Filesystem adapter over a key-value backing store.
///
/// Object creation is three separate store writes (allocate id, write the
/// attribute record, insert the directory entry) with no transaction. A
/// failure after the first step leaves an unreachable inode. Two creates of
/// the same name race and the last entry insert wins.
///
/// Unlink, rmdir, rename and truncate are not implemented: inodes, entries
/// and blocks are never freed.
#[derive(Clone)]
pub struct KvFs {
    allocator: InodeAllocator,
    attrs: AttrStore,
    dirs: DirectoryTable,
    content: ContentAccessor,
    options: KvFsOptions,
}

impl KvFs {
    /// Create an adapter over a shared store handle.
    ///
    /// # Arguments
    /// * `store` - Backing store shared by every component
    /// * `options` - Filesystem options
    ///
    /// # Returns
    /// The adapter, or `InvalidOptions` if the block size is zero.
    pub fn new(store: Arc<dyn KvStore>, options: KvFsOptions) -> Result<Self> {
        if options.block_size == 0 {
            return Err(KvFsError::InvalidOptions("block_size must be non-zero"));
        }

        let attrs: AttrStore = AttrStore::new(store.clone());
        let blocks: BlockStore = BlockStore::new(store.clone());
        Ok(Self {
            allocator: InodeAllocator::new(store.clone()),
            attrs: attrs.clone(),
            dirs: DirectoryTable::new(store),
            content: ContentAccessor::new(attrs, blocks),
            options,
        })
    }

    /// Options this adapter was built with.
    pub fn options(&self) -> &KvFsOptions {
        &self.options
    }

    /// The root directory handle.
    pub fn root(&self) -> Node {
        Node::root()
    }

    /// Classify an inode by reading its attribute record once.
    ///
    /// # Arguments
    /// * `inode` - Inode id
    ///
    /// # Returns
    /// The typed handle and its attributes, or `NotFound`.
    pub async fn resolve(&self, inode: InodeId) -> Result<ResolvedNode> {
        let attr: InodeAttr = self.load_attr(inode).await?;
        Ok(ResolvedNode {
            node: Node::new(inode, attr.kind()),
            attr,
        })
    }

    /// Find a child by name.
    ///
    /// # Arguments
    /// * `parent` - Directory to search
    /// * `name` - Child name
    pub async fn lookup(&self, parent: &Node, name: &str) -> Result<ResolvedNode> {
        let parent_inode: InodeId = require_directory(parent)?;
        tracing::debug!("lookup parent={} name={}", parent_inode, name);

        let child: InodeId = self.dirs.lookup(parent_inode, name).await?;
        self.resolve(child).await
    }

    /// Create a subdirectory.
    ///
    /// # Arguments
    /// * `parent` - Directory to create in
    /// * `name` - New directory name
    /// * `mode` - Requested permission bits
    pub async fn mkdir(&self, parent: &Node, name: &str, mode: u32) -> Result<ResolvedNode> {
        tracing::debug!("mkdir parent={} name={} mode={:o}", parent.inode(), name, mode);
        self.create_node(parent, name, NodeKind::Directory, mode).await
    }

    /// Create an empty regular file.
    ///
    /// # Arguments
    /// * `parent` - Directory to create in
    /// * `name` - New file name
    /// * `mode` - Requested permission bits
    pub async fn create(&self, parent: &Node, name: &str, mode: u32) -> Result<ResolvedNode> {
        tracing::debug!("create parent={} name={} mode={:o}", parent.inode(), name, mode);
        self.create_node(parent, name, NodeKind::File, mode).await
    }

    /// List a directory.
    ///
    /// Entries whose child has no attribute record are skipped. Entries are
    /// sorted by name so that offsets into the listing stay valid across
    /// calls.
    ///
    /// # Arguments
    /// * `dir` - Directory to list
    pub async fn read_dir_all(&self, dir: &Node) -> Result<Vec<DirEntry>> {
        let dir_inode: InodeId = require_directory(dir)?;
        let children: Vec<(String, InodeId)> = self.dirs.list(dir_inode).await?;

        let mut entries: Vec<DirEntry> = Vec::with_capacity(children.len());
        for (name, inode) in children {
            match self.attrs.read(inode).await {
                Ok(attr) => entries.push(DirEntry {
                    name,
                    inode,
                    kind: attr.kind(),
                }),
                Err(e) if e.is_not_found() => {
                    tracing::warn!(
                        "skipping entry {} in dir {}: child {} has no attributes",
                        name,
                        dir_inode,
                        inode
                    );
                }
                Err(e) => return Err(e),
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        tracing::debug!("readdir dir={} entries={}", dir_inode, entries.len());
        Ok(entries)
    }

    /// Attributes of an object.
    ///
    /// # Arguments
    /// * `node` - Object handle
    pub async fn get_attr(&self, node: &Node) -> Result<InodeAttr> {
        tracing::debug!("getattr inode={}", node.inode());
        self.load_attr(node.inode()).await
    }

    /// Apply attribute changes and refresh ctime.
    ///
    /// # Arguments
    /// * `node` - Object handle
    /// * `changes` - Fields to change
    ///
    /// # Returns
    /// The updated record. A size different from the current one is
    /// `Unsupported`.
    pub async fn set_attr(&self, node: &Node, changes: AttrChanges) -> Result<InodeAttr> {
        let mut attr: InodeAttr = self.load_attr(node.inode()).await?;

        if let Some(size) = changes.size {
            if size != attr.size {
                return Err(KvFsError::Unsupported("truncate"));
            }
        }
        if let Some(mode) = changes.mode {
            attr.mode = attr.kind().mode(mode);
        }
        if let Some(atime) = changes.atime {
            attr.atime = atime;
        }
        if let Some(mtime) = changes.mtime {
            attr.mtime = mtime;
        }
        attr.ctime = SystemTime::now();

        self.attrs.write(&attr).await?;
        tracing::debug!("setattr inode={} mode={:o}", attr.inode, attr.mode);
        Ok(attr)
    }

    /// Read file content.
    ///
    /// # Arguments
    /// * `file` - File handle
    /// * `offset` - Start offset
    /// * `size` - Number of bytes wanted
    ///
    /// # Returns
    /// The bytes in range, clamped at end of file. Unwritten ranges read as
    /// zeros.
    pub async fn read(&self, file: &Node, offset: u64, size: u64) -> Result<Vec<u8>> {
        let inode: InodeId = require_file(file)?;
        self.content.read(inode, offset, size).await
    }

    /// Write file content.
    ///
    /// # Arguments
    /// * `file` - File handle
    /// * `offset` - Start offset
    /// * `data` - Bytes to write
    ///
    /// # Returns
    /// Number of bytes accepted.
    pub async fn write(&self, file: &Node, offset: u64, data: &[u8]) -> Result<u64> {
        let inode: InodeId = require_file(file)?;
        self.content.write(inode, offset, data).await
    }

    /// Placeholder capacity numbers.
    pub fn statfs(&self) -> StatFs {
        let s = &self.options.statfs;
        StatFs {
            blocks: s.blocks,
            bfree: s.bfree,
            bavail: s.bavail,
            files: s.files,
            ffree: s.ffree,
            bsize: u32::try_from(self.options.block_size).unwrap_or(u32::MAX),
            namelen: s.namelen,
        }
    }

    /// Allocate, write attributes, insert the entry.
    async fn create_node(
        &self,
        parent: &Node,
        name: &str,
        kind: NodeKind,
        mode: u32,
    ) -> Result<ResolvedNode> {
        let parent_inode: InodeId = require_directory(parent)?;

        let inode: InodeId = self.allocator.next().await?;
        let attr = InodeAttr::new(inode, kind, mode, self.options.block_size);
        self.attrs.write(&attr).await?;
        self.dirs.insert(parent_inode, name, inode).await?;

        Ok(ResolvedNode {
            node: Node::new(inode, kind),
            attr,
        })
    }

    /// Read a record, synthesizing one for a root that was never written.
    async fn load_attr(&self, inode: InodeId) -> Result<InodeAttr> {
        match self.attrs.read(inode).await {
            Err(e) if e.is_not_found() && inode == ROOT_INODE => {
                Ok(InodeAttr::root(self.options.block_size))
            }
            other => other,
        }
    }
}

fn require_directory(node: &Node) -> Result<InodeId> {
    match *node {
        Node::Directory { inode } => Ok(inode),
        Node::File { inode } => Err(KvFsError::NotADirectory(inode)),
    }
}

fn require_file(node: &Node) -> Result<InodeId> {
    match *node {
        Node::File { inode } => Ok(inode),
        Node::Directory { inode } => Err(KvFsError::NotAFile(inode)),
    }
}
