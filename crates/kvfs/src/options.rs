//! Configuration options for the filesystem.

use std::time::Duration;

/// Default block size (5 KiB).
pub const DEFAULT_BLOCK_SIZE: u64 = 5 * 1024;

/// Configuration for a `KvFs`.
#[derive(Debug, Clone)]
pub struct KvFsOptions {
    /// Block size given to newly created objects.
    pub block_size: u64,
    /// Capacity numbers reported by statfs.
    pub statfs: StatFsOptions,
    /// Deadlines for bridged calls.
    pub timeouts: TimeoutOptions,
    /// Kernel attribute/entry cache settings.
    pub kernel_cache: KernelCacheOptions,
}

impl Default for KvFsOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            statfs: StatFsOptions::default(),
            timeouts: TimeoutOptions::default(),
            kernel_cache: KernelCacheOptions::default(),
        }
    }
}

impl KvFsOptions {
    /// Set the block size for new objects.
    ///
    /// # Arguments
    /// * `block_size` - Bytes per block (must be non-zero)
    pub fn with_block_size(mut self, block_size: u64) -> Self {
        self.block_size = block_size;
        self
    }

    /// Set statfs placeholder numbers.
    ///
    /// # Arguments
    /// * `statfs` - Capacity numbers
    pub fn with_statfs(mut self, statfs: StatFsOptions) -> Self {
        self.statfs = statfs;
        self
    }

    /// Set timeout options.
    ///
    /// # Arguments
    /// * `timeouts` - Timeout configuration
    pub fn with_timeouts(mut self, timeouts: TimeoutOptions) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set kernel cache options.
    ///
    /// # Arguments
    /// * `kernel_cache` - Kernel cache configuration
    pub fn with_kernel_cache(mut self, kernel_cache: KernelCacheOptions) -> Self {
        self.kernel_cache = kernel_cache;
        self
    }
}

/// Static capacity numbers reported by statfs.
///
/// The store has no meaningful capacity, so these are placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatFsOptions {
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
    /// Maximum name length.
    pub namelen: u32,
}

impl Default for StatFsOptions {
    fn default() -> Self {
        Self {
            blocks: 999_999,
            bfree: 99_999,
            bavail: 9_999,
            files: 9_999,
            ffree: 9_999,
            namelen: 256,
        }
    }
}

/// Timeout settings.
#[derive(Debug, Clone)]
pub struct TimeoutOptions {
    /// Deadline for one filesystem call, covering all its store round trips.
    pub operation_timeout: Duration,
}

impl Default for TimeoutOptions {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(30),
        }
    }
}

impl TimeoutOptions {
    /// Set the per-operation deadline.
    ///
    /// # Arguments
    /// * `timeout` - Deadline for one filesystem call
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}

/// How long the kernel may cache attributes and entries.
///
/// Zero by default so every stat goes to the store.
#[derive(Debug, Clone, Default)]
pub struct KernelCacheOptions {
    /// Attribute TTL.
    pub attr_ttl: Duration,
    /// Directory entry TTL.
    pub entry_ttl: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options: KvFsOptions = KvFsOptions::default();
        assert_eq!(options.block_size, 5120);
        assert_eq!(options.statfs.blocks, 999_999);
        assert_eq!(options.statfs.namelen, 256);
        assert_eq!(options.kernel_cache.attr_ttl, Duration::ZERO);
    }

    #[test]
    fn test_builders() {
        let options: KvFsOptions = KvFsOptions::default()
            .with_block_size(64)
            .with_timeouts(TimeoutOptions::default().with_operation_timeout(Duration::from_secs(2)));

        assert_eq!(options.block_size, 64);
        assert_eq!(options.timeouts.operation_timeout, Duration::from_secs(2));
    }
}
