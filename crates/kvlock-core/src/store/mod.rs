//! Key-value store abstraction used by the lock manager
//!
//! A store must provide two atomic primitives:
//! - set-if-absent with a TTL
//! - compare-and-delete, evaluated as one indivisible operation
//!
//! Backends:
//! - [`MemoryStore`]: DashMap based, single process (tests, local use)
//! - [`RedisStore`]: Redis `SET NX PX` plus a Lua unlock script (feature: `redis-store`)

use std::time::Duration;

use async_trait::async_trait;
use kvlock_common::StoreError;

mod memory;
#[cfg(feature = "redis-store")]
mod redis_store;

pub use memory::MemoryStore;
#[cfg(feature = "redis-store")]
pub use redis_store::RedisStore;

/// Result of a compare-and-delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The key held the expected value and was removed
    Deleted,
    /// The key was absent or held another value; nothing changed
    NotDeleted,
}

impl DeleteOutcome {
    pub fn is_deleted(self) -> bool {
        matches!(self, DeleteOutcome::Deleted)
    }
}

/// Minimal key-value interface the lock protocol relies on
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Set `key` to `value` with `ttl` only if `key` does not exist.
    ///
    /// Returns `true` iff this call created the record.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration)
    -> Result<bool, StoreError>;

    /// Delete `key` only if its current value equals `expected`.
    ///
    /// Must be a single indivisible operation against the store.
    async fn compare_and_delete(
        &self,
        key: &str,
        expected: &str,
    ) -> Result<DeleteOutcome, StoreError>;

    /// Current value of `key` (diagnostics only)
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Backend name used in logs
    fn name(&self) -> &'static str;
}
