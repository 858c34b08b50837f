//! Redis adapter for the `KvStore` trait.
//!
//! # Example
//!
//! ```ignore
//! use kvfs::kv::{RedisKvStore, RedisOptions};
//!
//! let options = RedisOptions::default().with_url("redis://127.0.0.1:6379/0");
//! let store = RedisKvStore::connect(options).await?;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError};

use super::KvStore;
use crate::error::StoreError;

/// Connection settings for a Redis backing store.
#[derive(Debug, Clone)]
pub struct RedisOptions {
    /// Connection URL (`redis://host:port/db`).
    pub url: String,
    /// Upper bound on a single command round trip.
    pub response_timeout: Duration,
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/0".to_string(),
            response_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisOptions {
    /// Set the connection URL.
    ///
    /// # Arguments
    /// * `url` - Redis connection URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the per-command response timeout.
    ///
    /// # Arguments
    /// * `timeout` - Maximum duration of one command
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }
}

/// `KvStore` backed by a Redis server.
///
/// Wraps one auto-reconnecting connection that is shared by every caller.
/// Cloning is cheap and all clones share the same connection.
#[derive(Clone)]
pub struct RedisKvStore {
    /// Multiplexed connection.
    conn: ConnectionManager,
    /// Per-command timeout.
    response_timeout: Duration,
}

impl RedisKvStore {
    /// Connect to the configured Redis server.
    ///
    /// Must be called from within a tokio runtime; the connection's driver
    /// task is spawned on it.
    ///
    /// # Arguments
    /// * `options` - Connection settings
    pub async fn connect(options: RedisOptions) -> Result<Self, StoreError> {
        let client: redis::Client = redis::Client::open(options.url.as_str())
            .map_err(|e| StoreError::Unavailable(format!("invalid redis url: {}", e)))?;
        let conn: ConnectionManager = client
            .get_connection_manager()
            .await
            .map_err(map_redis_error)?;

        tracing::info!("Connected to redis at {}", options.url);

        Ok(Self {
            conn,
            response_timeout: options.response_timeout,
        })
    }

    /// Run one command under the response timeout.
    async fn timed<T, F>(&self, command: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, RedisError>>,
    {
        match tokio::time::timeout(self.response_timeout, fut).await {
            Ok(result) => result.map_err(map_redis_error),
            Err(_) => Err(StoreError::Timeout { command }),
        }
    }
}

/// Classify a redis error as transport failure or bad response.
fn map_redis_error(e: RedisError) -> StoreError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() {
        StoreError::Unavailable(e.to_string())
    } else if e.is_timeout() {
        StoreError::Timeout { command: "redis" }
    } else {
        StoreError::Response(e.to_string())
    }
}

/// Convert an offset to the signed index type redis commands take.
fn to_index(value: u64) -> Result<isize, StoreError> {
    isize::try_from(value).map_err(|_| StoreError::Response(format!("offset out of range: {}", value)))
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn incr(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn: ConnectionManager = self.conn.clone();
        self.timed("INCR", conn.incr(key, 1u64)).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn: ConnectionManager = self.conn.clone();
        self.timed("GET", conn.get(key)).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut conn: ConnectionManager = self.conn.clone();
        self.timed("SET", conn.set(key, value)).await
    }

    async fn get_range(&self, key: &str, offset: u64, len: u64) -> Result<Vec<u8>, StoreError> {
        if len == 0 {
            return Ok(Vec::new());
        }
        // GETRANGE takes an inclusive end index
        let from: isize = to_index(offset)?;
        let to: isize = to_index(offset + len - 1)?;
        let mut conn: ConnectionManager = self.conn.clone();
        self.timed("GETRANGE", conn.getrange(key, from, to)).await
    }

    async fn set_range(&self, key: &str, offset: u64, data: &[u8]) -> Result<u64, StoreError> {
        let at: isize = to_index(offset)?;
        let mut conn: ConnectionManager = self.conn.clone();
        self.timed("SETRANGE", conn.setrange(key, at, data)).await
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let mut conn: ConnectionManager = self.conn.clone();
        self.timed("HGET", conn.hget(key, field)).await
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut conn: ConnectionManager = self.conn.clone();
        let _added: u64 = self.timed("HSET", conn.hset(key, field, value)).await?;
        Ok(())
    }

    async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut conn: ConnectionManager = self.conn.clone();
        self.timed("HGETALL", conn.hgetall(key)).await
    }
}
