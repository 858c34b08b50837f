//! FUSE bridge for the key-value filesystem.
//!
//! FUSE reserves inode 1 for the root while the core numbers its root 0, so
//! every kernel inode number is the core inode plus one.

use std::ffi::OsStr;
use std::future::Future;
use std::path::Path;
use std::time::{Duration, SystemTime};

use fuser::{
    FileAttr, FileType, Filesystem, MountOption, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request, TimeOrNow,
    FUSE_ROOT_ID,
};

use crate::error::{KvFsError, Result};
use crate::executor::AsyncExecutor;
use crate::fs::{AttrChanges, DirEntry, KvFs, ResolvedNode, StatFs};
use crate::inode::{InodeAttr, InodeId, NodeKind};

/// Map an error to the errno reported to the kernel.
pub fn to_errno(err: &KvFsError) -> i32 {
    match err {
        KvFsError::NotFound { .. } => libc::ENOENT,
        KvFsError::NotADirectory(_) => libc::ENOTDIR,
        KvFsError::NotAFile(_) => libc::EISDIR,
        KvFsError::Unsupported(_) => libc::EOPNOTSUPP,
        _ => libc::EIO,
    }
}

/// Kernel inode number for a core inode.
pub fn to_fuse_ino(inode: InodeId) -> u64 {
    inode + 1
}

/// Core inode for a kernel inode number.
pub fn from_fuse_ino(ino: u64) -> Option<InodeId> {
    ino.checked_sub(1)
}

fn file_type(kind: NodeKind) -> FileType {
    match kind {
        NodeKind::Directory => FileType::Directory,
        NodeKind::File => FileType::RegularFile,
    }
}

/// Writable FUSE filesystem backed by a key-value store.
pub struct KvFuse {
    /// Core operations.
    fs: KvFs,
    /// Runs core futures from the synchronous callbacks.
    executor: AsyncExecutor,
    /// Owner reported for every object.
    uid: u32,
    /// Group reported for every object.
    gid: u32,
}

impl KvFuse {
    /// Create a bridge over a filesystem.
    ///
    /// # Arguments
    /// * `fs` - Core filesystem
    /// * `executor` - Executor that runs store calls
    pub fn new(fs: KvFs, executor: AsyncExecutor) -> Self {
        Self {
            fs,
            executor,
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
        }
    }

    /// Convert an attribute record to FUSE file attributes.
    fn to_file_attr(&self, attr: &InodeAttr) -> FileAttr {
        let kind: NodeKind = attr.kind();
        FileAttr {
            ino: to_fuse_ino(attr.inode),
            size: attr.size,
            blocks: (attr.size + 511) / 512,
            atime: attr.atime,
            mtime: attr.mtime,
            ctime: attr.ctime,
            crtime: attr.crtime,
            kind: file_type(kind),
            perm: attr.perm(),
            nlink: if kind == NodeKind::Directory { 2 } else { 1 },
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: u32::try_from(attr.block_size).unwrap_or(u32::MAX),
            flags: 0,
        }
    }

    fn attr_ttl(&self) -> Duration {
        self.fs.options().kernel_cache.attr_ttl
    }

    fn entry_ttl(&self) -> Duration {
        self.fs.options().kernel_cache.entry_ttl
    }

    /// Run a core operation on the executor under the operation deadline.
    ///
    /// # Arguments
    /// * `op` - Operation name for logging
    /// * `f` - Builds the future from a cloned filesystem handle
    ///
    /// # Returns
    /// The operation's result, or the errno to reply with.
    fn run<F, Fut, T>(&self, op: &'static str, f: F) -> std::result::Result<T, i32>
    where
        F: FnOnce(KvFs) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let timeout: Duration = self.fs.options().timeouts.operation_timeout;
        let fut: Fut = f(self.fs.clone());

        let result: Result<T> = self
            .executor
            .block_on_cancellable_timeout(fut, timeout)
            .map_err(KvFsError::from)
            .and_then(|r| r);

        result.map_err(|e| {
            if !e.is_not_found() {
                tracing::warn!("{} failed: {}", op, e);
            }
            to_errno(&e)
        })
    }
}

/// Convert a UTF-8 name or reply with ENOENT.
macro_rules! name_or_reply {
    ($name:expr, $reply:expr) => {
        match $name.to_str() {
            Some(n) => n.to_string(),
            None => {
                $reply.error(libc::ENOENT);
                return;
            }
        }
    };
}

/// Convert a kernel inode number or reply with ENOENT.
macro_rules! inode_or_reply {
    ($ino:expr, $reply:expr) => {
        match from_fuse_ino($ino) {
            Some(i) => i,
            None => {
                $reply.error(libc::ENOENT);
                return;
            }
        }
    };
}

fn time_or_now(t: TimeOrNow) -> SystemTime {
    match t {
        TimeOrNow::SpecificTime(t) => t,
        TimeOrNow::Now => SystemTime::now(),
    }
}

impl Filesystem for KvFuse {
    fn destroy(&mut self) {
        tracing::info!("unmounting, cancelling in-flight calls");
        self.executor.cancel_all();
    }

    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let parent_inode: InodeId = inode_or_reply!(parent, reply);
        let name: String = name_or_reply!(name, reply);

        let result = self.run("lookup", move |fs| async move {
            let parent: ResolvedNode = fs.resolve(parent_inode).await?;
            fs.lookup(&parent.node, &name).await
        });

        match result {
            Ok(child) => reply.entry(&self.entry_ttl(), &self.to_file_attr(&child.attr), 0),
            Err(errno) => reply.error(errno),
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, reply: ReplyAttr) {
        let inode: InodeId = inode_or_reply!(ino, reply);

        match self.run("getattr", move |fs| async move { fs.resolve(inode).await }) {
            Ok(resolved) => reply.attr(&self.attr_ttl(), &self.to_file_attr(&resolved.attr)),
            Err(errno) => reply.error(errno),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request,
        ino: u64,
        mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let inode: InodeId = inode_or_reply!(ino, reply);
        let changes = AttrChanges {
            mode,
            atime: atime.map(time_or_now),
            mtime: mtime.map(time_or_now),
            size,
        };

        let result = self.run("setattr", move |fs| async move {
            let resolved: ResolvedNode = fs.resolve(inode).await?;
            fs.set_attr(&resolved.node, changes).await
        });

        match result {
            Ok(attr) => reply.attr(&self.attr_ttl(), &self.to_file_attr(&attr)),
            Err(errno) => reply.error(errno),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        reply: ReplyEntry,
    ) {
        let parent_inode: InodeId = inode_or_reply!(parent, reply);
        let name: String = name_or_reply!(name, reply);

        let result = self.run("mkdir", move |fs| async move {
            let parent: ResolvedNode = fs.resolve(parent_inode).await?;
            fs.mkdir(&parent.node, &name, mode & !umask).await
        });

        match result {
            Ok(dir) => reply.entry(&self.entry_ttl(), &self.to_file_attr(&dir.attr), 0),
            Err(errno) => reply.error(errno),
        }
    }

    fn create(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let parent_inode: InodeId = inode_or_reply!(parent, reply);
        let name: String = name_or_reply!(name, reply);

        let result = self.run("create", move |fs| async move {
            let parent: ResolvedNode = fs.resolve(parent_inode).await?;
            fs.create(&parent.node, &name, mode & !umask).await
        });

        match result {
            Ok(file) => reply.created(
                &self.entry_ttl(),
                &self.to_file_attr(&file.attr),
                0,
                0,
                fuser::consts::FOPEN_DIRECT_IO,
            ),
            Err(errno) => reply.error(errno),
        }
    }

    fn open(&mut self, _req: &Request, ino: u64, _flags: i32, reply: ReplyOpen) {
        let inode: InodeId = inode_or_reply!(ino, reply);

        match self.run("open", move |fs| async move { fs.resolve(inode).await }) {
            // Stateless handles; content is never cached by the kernel
            Ok(resolved) if resolved.node.kind() == NodeKind::File => {
                reply.opened(0, fuser::consts::FOPEN_DIRECT_IO)
            }
            Ok(_) => reply.error(libc::EISDIR),
            Err(errno) => reply.error(errno),
        }
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock: Option<u64>,
        reply: ReplyData,
    ) {
        let inode: InodeId = inode_or_reply!(ino, reply);
        let offset: u64 = match u64::try_from(offset) {
            Ok(o) => o,
            Err(_) => {
                reply.error(libc::EINVAL);
                return;
            }
        };

        let result = self.run("read", move |fs| async move {
            let file: ResolvedNode = fs.resolve(inode).await?;
            fs.read(&file.node, offset, size as u64).await
        });

        match result {
            Ok(data) => reply.data(&data),
            Err(errno) => reply.error(errno),
        }
    }

    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let inode: InodeId = inode_or_reply!(ino, reply);
        let offset: u64 = match u64::try_from(offset) {
            Ok(o) => o,
            Err(_) => {
                reply.error(libc::EINVAL);
                return;
            }
        };
        let data: Vec<u8> = data.to_vec();

        let result = self.run("write", move |fs| async move {
            let file: ResolvedNode = fs.resolve(inode).await?;
            fs.write(&file.node, offset, &data).await
        });

        match result {
            Ok(written) => reply.written(u32::try_from(written).unwrap_or(u32::MAX)),
            Err(errno) => reply.error(errno),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let inode: InodeId = inode_or_reply!(ino, reply);

        let result = self.run("readdir", move |fs| async move {
            let dir: ResolvedNode = fs.resolve(inode).await?;
            fs.read_dir_all(&dir.node).await
        });

        let children: Vec<DirEntry> = match result {
            Ok(c) => c,
            Err(errno) => {
                reply.error(errno);
                return;
            }
        };

        // Parent links are not stored; ".." points at the root
        let mut entries: Vec<(u64, FileType, String)> = vec![
            (ino, FileType::Directory, ".".to_string()),
            (FUSE_ROOT_ID, FileType::Directory, "..".to_string()),
        ];
        entries.extend(
            children
                .into_iter()
                .map(|e| (to_fuse_ino(e.inode), file_type(e.kind), e.name)),
        );

        let skip: usize = usize::try_from(offset).unwrap_or(0);
        for (i, (e_ino, kind, name)) in entries.iter().enumerate().skip(skip) {
            if reply.add(*e_ino, (i + 1) as i64, *kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request, _ino: u64, reply: ReplyStatfs) {
        let stat: StatFs = self.fs.statfs();
        reply.statfs(
            stat.blocks,
            stat.bfree,
            stat.bavail,
            stat.files,
            stat.ffree,
            stat.bsize,
            stat.namelen,
            stat.bsize,
        );
    }
}

fn mount_options() -> Vec<MountOption> {
    vec![
        MountOption::FSName("kvfs".into()),
        MountOption::Subtype("redisfs".into()),
        MountOption::AutoUnmount,
    ]
}

/// Mount the filesystem and serve it until unmounted.
///
/// # Arguments
/// * `fuse` - The bridge to mount
/// * `mountpoint` - Path to mount at
pub fn mount(fuse: KvFuse, mountpoint: &Path) -> Result<()> {
    tracing::info!("mounting kvfs at {}", mountpoint.display());
    fuser::mount2(fuse, mountpoint, &mount_options())
        .map_err(|e| KvFsError::MountFailed(e.to_string()))
}

/// Mount the filesystem in the background.
///
/// # Arguments
/// * `fuse` - The bridge to mount
/// * `mountpoint` - Path to mount at
///
/// # Returns
/// Background session handle; dropping it unmounts.
pub fn spawn_mount(fuse: KvFuse, mountpoint: &Path) -> Result<fuser::BackgroundSession> {
    tracing::info!("mounting kvfs at {} in background", mountpoint.display());
    fuser::spawn_mount2(fuse, mountpoint, &mount_options())
        .map_err(|e| KvFsError::MountFailed(e.to_string()))
}
