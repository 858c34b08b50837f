//! Example: Mount a Redis-backed filesystem with FUSE.
//!
//! Usage:
//!   cargo run -p kvfs --features fuse,redis --example mount_kvfs -- <mountpoint> [options]
//!
//! Example:
//!   RUST_LOG=kvfs=debug cargo run -p kvfs --features fuse,redis --example mount_kvfs -- \
//!       /tmp/kvfs --redis-url redis://127.0.0.1:6379/0 --block-size 5120

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use kvfs::{
    mount, AsyncExecutor, KvFs, KvFsOptions, KvFuse, RedisKvStore, RedisOptions, TimeoutOptions,
};

/// CLI arguments for the mount_kvfs example.
#[derive(Debug, Parser)]
#[command(about = "Mount a filesystem stored in Redis")]
struct Cli {
    /// Directory to mount at.
    mountpoint: PathBuf,

    /// Redis connection URL.
    #[arg(long, default_value = "redis://127.0.0.1:6379/0")]
    redis_url: String,

    /// Block size for newly created files.
    #[arg(long, default_value_t = kvfs::options::DEFAULT_BLOCK_SIZE)]
    block_size: u64,

    /// Deadline for one filesystem call, in seconds.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if !cli.mountpoint.exists() {
        std::fs::create_dir_all(&cli.mountpoint)?;
    }

    let executor: AsyncExecutor = AsyncExecutor::with_defaults()?;
    let redis_options: RedisOptions = RedisOptions::default().with_url(cli.redis_url.clone());
    let store: RedisKvStore = executor.block_on(RedisKvStore::connect(redis_options))??;

    let options: KvFsOptions = KvFsOptions::default()
        .with_block_size(cli.block_size)
        .with_timeouts(
            TimeoutOptions::default().with_operation_timeout(Duration::from_secs(cli.timeout_secs)),
        );
    let fs: KvFs = KvFs::new(Arc::new(store), options)?;

    println!("Mounting {} at {}", cli.redis_url, cli.mountpoint.display());
    mount(KvFuse::new(fs, executor), &cli.mountpoint)?;
    println!("Unmounted");

    Ok(())
}
