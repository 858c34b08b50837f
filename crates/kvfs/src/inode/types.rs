//! Core inode types.

/// Unique identifier for an inode.
pub type InodeId = u64;

/// Root directory inode ID.
///
/// The allocator counter starts at zero and hands out 1 first, so the root
/// never collides with an allocated id.
pub const ROOT_INODE: InodeId = 0;

/// File type mask of a mode word.
pub const S_IFMT: u32 = 0o170000;

/// Directory type bits.
pub const S_IFDIR: u32 = 0o040000;

/// Regular file type bits.
pub const S_IFREG: u32 = 0o100000;

/// Permission bits of a mode word (including setuid/setgid/sticky).
pub const PERM_MASK: u32 = 0o7777;

/// Kind of filesystem object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Directory.
    Directory,
    /// Regular file.
    File,
}

impl NodeKind {
    /// Classify a mode word.
    ///
    /// Anything without the directory type bits is treated as a file.
    pub fn from_mode(mode: u32) -> Self {
        if mode & S_IFMT == S_IFDIR {
            NodeKind::Directory
        } else {
            NodeKind::File
        }
    }

    /// File type bits for this kind.
    pub fn type_bits(self) -> u32 {
        match self {
            NodeKind::Directory => S_IFDIR,
            NodeKind::File => S_IFREG,
        }
    }

    /// Build a full mode word from permission bits.
    ///
    /// # Arguments
    /// * `perm` - Permission bits; any type bits present are replaced
    pub fn mode(self, perm: u32) -> u32 {
        self.type_bits() | (perm & PERM_MASK)
    }
}

/// Handle to a filesystem object.
///
/// Handles carry no state beyond the inode id; every operation on them is a
/// round trip to the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    /// Directory handle.
    Directory {
        /// Directory inode.
        inode: InodeId,
    },
    /// Regular file handle.
    File {
        /// File inode.
        inode: InodeId,
    },
}

impl Node {
    /// Build a handle from an inode id and kind.
    pub fn new(inode: InodeId, kind: NodeKind) -> Self {
        match kind {
            NodeKind::Directory => Node::Directory { inode },
            NodeKind::File => Node::File { inode },
        }
    }

    /// The root directory handle.
    pub fn root() -> Self {
        Node::Directory { inode: ROOT_INODE }
    }

    /// Inode id behind this handle.
    pub fn inode(&self) -> InodeId {
        match *self {
            Node::Directory { inode } | Node::File { inode } => inode,
        }
    }

    /// Kind of object behind this handle.
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Directory { .. } => NodeKind::Directory,
            Node::File { .. } => NodeKind::File,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_mode() {
        assert_eq!(NodeKind::from_mode(S_IFDIR | 0o755), NodeKind::Directory);
        assert_eq!(NodeKind::from_mode(S_IFREG | 0o644), NodeKind::File);
        assert_eq!(NodeKind::from_mode(0o644), NodeKind::File);
    }

    #[test]
    fn test_kind_mode_replaces_type_bits() {
        assert_eq!(NodeKind::Directory.mode(S_IFREG | 0o750), S_IFDIR | 0o750);
        assert_eq!(NodeKind::File.mode(0o4755), S_IFREG | 0o4755);
    }

    #[test]
    fn test_node_accessors() {
        let dir: Node = Node::new(4, NodeKind::Directory);
        let file: Node = Node::new(5, NodeKind::File);

        assert_eq!(dir, Node::Directory { inode: 4 });
        assert_eq!(file.inode(), 5);
        assert_eq!(file.kind(), NodeKind::File);
        assert_eq!(Node::root().inode(), ROOT_INODE);
    }
}
