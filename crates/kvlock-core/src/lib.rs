//! kvlock Core - Mutual exclusion backed by a shared key-value store
//!
//! This crate provides:
//! - `LockManager`: token-based acquire/release over any store
//! - `KeyValueStore`: the set-if-absent / compare-and-delete contract
//! - `MemoryStore` and `RedisStore` backends
//! - Interrupt support for waiting acquisitions
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use kvlock_core::{LockConfig, LockManager, MemoryStore, ReleaseOutcome};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), kvlock_core::LockError> {
//! let manager = LockManager::new(Arc::new(MemoryStore::new()), LockConfig::default());
//!
//! let handle = manager.acquire("seat-42").await?;
//! // critical section
//! assert_eq!(manager.release(&handle).await, ReleaseOutcome::Released);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod manager;
pub mod metrics;
pub mod shutdown;
pub mod store;

// Re-export commonly used types
pub use config::{LockConfig, MAX_ACQUIRE_TIMEOUT, MAX_LOCK_TTL};
pub use manager::{LockHandle, LockManager, ReleaseOutcome};
pub use shutdown::{ShutdownSignal, wait_for_shutdown_signal};
pub use store::{DeleteOutcome, KeyValueStore, MemoryStore};

#[cfg(feature = "redis-store")]
pub use store::RedisStore;

pub use kvlock_common::{LockError, StoreError};
