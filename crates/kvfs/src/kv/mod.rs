//! Backing key-value store for the filesystem.
//!
//! This module provides the `KvStore` trait, an in-memory implementation and
//! (with the `redis` feature) a Redis-backed implementation.
//!
//! # Primitives
//!
//! The filesystem core only needs four operation families from the store:
//! atomic integer increment, whole-value get/set, byte-range get/set on a
//! string value, and hash-map get/set-field/get-all. Every component talks
//! to the store through a shared `Arc<dyn KvStore>` handle.

#[cfg(feature = "redis")]
mod redis_adapter;
mod store;

#[cfg(feature = "redis")]
pub use redis_adapter::{RedisKvStore, RedisOptions};
pub use store::{KvStore, MemoryKvStore};
