//! Error types for the kvfs crate.

use thiserror::Error;

use crate::executor::ExecutorError;
use crate::inode::InodeId;

/// Errors raised by a [`KvStore`](crate::kv::KvStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or the connection dropped.
    #[error("Backing store unavailable: {0}")]
    Unavailable(String),

    /// A single command did not complete within its response timeout.
    #[error("Backing store call timed out: {command}")]
    Timeout {
        /// Name of the command that timed out.
        command: &'static str,
    },

    /// The store answered with an error or an unexpected reply.
    #[error("Backing store response error: {0}")]
    Response(String),
}

/// Errors that can occur during filesystem operations.
#[derive(Debug, Error)]
pub enum KvFsError {
    /// No record exists under the given key.
    #[error("Not found: {key}")]
    NotFound {
        /// Backing-store key (or `d-<inode>/<name>` for directory entries).
        key: String,
    },

    /// Backing-store failure; fatal to the in-flight operation.
    #[error(transparent)]
    BackingStore(#[from] StoreError),

    /// A stored record could not be decoded.
    #[error("Malformed record at {key}: {reason}")]
    Malformed {
        /// Backing-store key holding the record.
        key: String,
        /// Decoder message.
        reason: String,
    },

    /// A directory operation was invoked on a non-directory.
    #[error("Not a directory: {0}")]
    NotADirectory(InodeId),

    /// A file operation was invoked on a non-file.
    #[error("Not a file: {0}")]
    NotAFile(InodeId),

    /// Operation outside the supported set (unlink, rename, truncate, ...).
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Bridged call was cancelled, timed out, or the executor is gone.
    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),

    /// Filesystem options were rejected.
    #[error("Invalid options: {0}")]
    InvalidOptions(&'static str),

    /// Mount operation failed.
    #[error("Mount failed: {0}")]
    MountFailed(String),
}

impl KvFsError {
    /// Build a `NotFound` error for a key.
    ///
    /// # Arguments
    /// * `key` - Key that had no value
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Check whether this is the canonical "object does not exist" signal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, KvFsError>;
