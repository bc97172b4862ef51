//! Lock acquire/release protocol
//!
//! Ownership is proven by a token minted fresh for every acquisition. The
//! store holds `key -> token` with a TTL; the TTL is the only backstop when a
//! holder crashes or abandons its handle.
//!
//! Waiters poll: there is no queue and no fairness among concurrent waiters.
//! Whoever's set-if-absent lands first after a release wins, so a waiter can
//! starve under sustained contention.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use kvlock_common::{LockError, OutcomeLabel};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::LockConfig;
use crate::metrics::{record_acquire, record_release};
use crate::shutdown::interrupted;
use crate::store::{DeleteOutcome, KeyValueStore};

/// Capability to release a held lock.
///
/// Not authoritative: the store decides who holds the key. A handle whose
/// record expired is stale and its release is a no-op.
#[derive(Debug, Clone)]
pub struct LockHandle {
    key: String,
    token: String,
    acquired_at: Instant,
}

impl LockHandle {
    /// Rebuild a handle from a key and token saved elsewhere
    pub fn from_parts(key: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            token: token.into(),
            acquired_at: Instant::now(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Time since acquisition (or reconstruction)
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

/// What a release observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Our token was current and the record is gone
    Released,
    /// The record had expired or belongs to another holder; nothing changed
    NotHeld,
    /// The store could not be reached; the record will expire on its own
    StoreUnavailable,
}

impl ReleaseOutcome {
    pub fn is_released(self) -> bool {
        matches!(self, ReleaseOutcome::Released)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReleaseOutcome::Released => "released",
            ReleaseOutcome::NotHeld => "not-held",
            ReleaseOutcome::StoreUnavailable => "store-unavailable",
        }
    }
}

impl std::fmt::Display for ReleaseOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Store-backed mutual exclusion across processes
#[derive(Clone)]
pub struct LockManager {
    store: Arc<dyn KeyValueStore>,
    config: LockConfig,
}

impl LockManager {
    pub fn new(store: Arc<dyn KeyValueStore>, config: LockConfig) -> Self {
        Self { store, config }
    }

    /// Like [`LockManager::new`], rejecting an invalid configuration
    pub fn try_new(store: Arc<dyn KeyValueStore>, config: LockConfig) -> Result<Self, LockError> {
        config.validate()?;
        Ok(Self::new(store, config))
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Acquire `key`, polling until `acquire_timeout` elapses.
    ///
    /// Dropping the returned future cancels the wait and leaves nothing in
    /// the store, since no set succeeded.
    pub async fn acquire(&self, key: &str) -> Result<LockHandle, LockError> {
        self.acquire_inner(key, None).await
    }

    /// Acquire `key`, aborting the wait with
    /// [`LockError::AcquisitionInterrupted`] when `interrupt` fires.
    pub async fn acquire_interruptible(
        &self,
        key: &str,
        interrupt: &mut broadcast::Receiver<()>,
    ) -> Result<LockHandle, LockError> {
        self.acquire_inner(key, Some(interrupt)).await
    }

    /// Single attempt without waiting; `None` when someone else holds `key`
    pub async fn try_acquire(&self, key: &str) -> Result<Option<LockHandle>, LockError> {
        validate_key(key)?;
        self.config.validate()?;

        let token = new_token();
        let acquired = self
            .store
            .set_if_absent(key, &token, self.config.lock_ttl)
            .await
            .map_err(|source| LockError::StoreUnavailable {
                key: key.to_string(),
                source,
            })?;

        if !acquired {
            return Ok(None);
        }

        debug!(key = %key, token = %token, "Lock acquired");
        record_acquire(OutcomeLabel::Acquired, Duration::ZERO);
        Ok(Some(LockHandle {
            key: key.to_string(),
            token,
            acquired_at: Instant::now(),
        }))
    }

    async fn acquire_inner(
        &self,
        key: &str,
        mut interrupt: Option<&mut broadcast::Receiver<()>>,
    ) -> Result<LockHandle, LockError> {
        validate_key(key)?;
        self.config.validate()?;

        let token = new_token();
        let started = Instant::now();
        let deadline = started
            .checked_add(self.config.acquire_timeout)
            .ok_or_else(|| {
                LockError::IllegalArgument(format!(
                    "acquire timeout {:?} is out of range",
                    self.config.acquire_timeout
                ))
            })?;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            match self
                .store
                .set_if_absent(key, &token, self.config.lock_ttl)
                .await
            {
                Ok(true) => {
                    let waited = started.elapsed();
                    debug!(
                        key = %key,
                        token = %token,
                        attempts,
                        waited_ms = waited.as_millis() as u64,
                        "Lock acquired"
                    );
                    record_acquire(OutcomeLabel::Acquired, waited);
                    return Ok(LockHandle {
                        key: key.to_string(),
                        token,
                        acquired_at: Instant::now(),
                    });
                }
                Ok(false) => {}
                Err(source) => {
                    warn!(
                        key = %key,
                        store = self.store.name(),
                        error = %source,
                        "Store error while acquiring lock"
                    );
                    record_acquire(OutcomeLabel::StoreError, started.elapsed());
                    return Err(LockError::StoreUnavailable {
                        key: key.to_string(),
                        source,
                    });
                }
            }

            let now = Instant::now();
            if now >= deadline {
                let waited = now - started;
                debug!(key = %key, attempts, "Lock acquisition timed out");
                record_acquire(OutcomeLabel::Timeout, waited);
                return Err(LockError::AcquisitionTimeout {
                    key: key.to_string(),
                    waited,
                });
            }

            let pause = self.config.poll_interval.min(deadline - now);
            match interrupt.as_deref_mut() {
                Some(rx) => {
                    tokio::select! {
                        _ = tokio::time::sleep(pause) => {}
                        _ = interrupted(rx) => {
                            debug!(key = %key, attempts, "Lock acquisition interrupted");
                            record_acquire(OutcomeLabel::Interrupted, started.elapsed());
                            return Err(LockError::AcquisitionInterrupted {
                                key: key.to_string(),
                            });
                        }
                    }
                }
                None => tokio::time::sleep(pause).await,
            }
        }
    }

    /// Release the lock if `handle` still owns it.
    ///
    /// Never fails: a stale handle or an unreachable store is logged and
    /// reported through the outcome. Safe to call from cleanup paths.
    pub async fn release(&self, handle: &LockHandle) -> ReleaseOutcome {
        let outcome = match self
            .store
            .compare_and_delete(&handle.key, &handle.token)
            .await
        {
            Ok(DeleteOutcome::Deleted) => {
                debug!(
                    key = %handle.key,
                    token = %handle.token,
                    held_ms = handle.held_for().as_millis() as u64,
                    "Lock released"
                );
                ReleaseOutcome::Released
            }
            Ok(DeleteOutcome::NotDeleted) => {
                warn!(
                    key = %handle.key,
                    token = %handle.token,
                    "Failed to release lock: expired or held by another owner"
                );
                ReleaseOutcome::NotHeld
            }
            Err(e) => {
                error!(
                    key = %handle.key,
                    store = self.store.name(),
                    "Store error while releasing lock: {}",
                    e
                );
                ReleaseOutcome::StoreUnavailable
            }
        };

        record_release(match outcome {
            ReleaseOutcome::Released => OutcomeLabel::Released,
            ReleaseOutcome::NotHeld => OutcomeLabel::NotHeld,
            ReleaseOutcome::StoreUnavailable => OutcomeLabel::StoreError,
        });
        outcome
    }

    /// Run `f` while holding `key`.
    ///
    /// The lock is released after `f` completes whatever it returns. If the
    /// task panics or is cancelled inside `f`, the TTL reclaims the record.
    pub async fn with_lock<F, Fut, T>(&self, key: &str, f: F) -> Result<T, LockError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let handle = self.acquire(key).await?;
        let output = f().await;
        self.release(&handle).await;
        Ok(output)
    }

    /// Token currently stored under `key` (diagnostics)
    pub async fn current_holder(&self, key: &str) -> Result<Option<String>, LockError> {
        validate_key(key)?;
        self.store
            .get(key)
            .await
            .map_err(|source| LockError::StoreUnavailable {
                key: key.to_string(),
                source,
            })
    }
}

fn validate_key(key: &str) -> Result<(), LockError> {
    if key.is_empty() {
        return Err(LockError::IllegalArgument(
            "lock key must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn new_token() -> String {
    Uuid::new_v4().to_string()
}
