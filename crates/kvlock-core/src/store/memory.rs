// In-memory key-value store
// Provides the set-if-absent / compare-and-delete primitives with per-key atomicity and TTL expiry

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use kvlock_common::StoreError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{DeleteOutcome, KeyValueStore};

/// A stored value with its expiry deadline
struct StoreEntry {
    value: String,
    expires_at: Instant,
}

impl StoreEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-memory store backed by DashMap.
///
/// Every primitive runs under the shard lock of its key, which makes
/// set-if-absent and compare-and-delete atomic per key. Expired entries are
/// treated as absent on access; an optional background sweep reclaims them.
pub struct MemoryStore {
    entries: Arc<DashMap<String, StoreEntry>>,
    sweep_handle: Option<JoinHandle<()>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            sweep_handle: None,
        }
    }

    /// Start a background task that removes expired entries every `interval`.
    ///
    /// Must be called from within a Tokio runtime. The task stops when the
    /// store is dropped.
    pub fn with_expiry_sweep(mut self, interval: Duration) -> Self {
        let entries = self.entries.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = Self::sweep_expired(&entries);
                if removed > 0 {
                    debug!(count = removed, "Swept expired store entries");
                }
            }
        });

        info!(interval = ?interval, "MemoryStore expiry sweep started");
        self.sweep_handle = Some(handle);
        self
    }

    fn sweep_expired(entries: &DashMap<String, StoreEntry>) -> usize {
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(entries.len())
    }

    /// Number of live (unexpired) records
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining lifetime of a live record
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.expires_at - now)
    }
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        if let Some(handle) = self.sweep_handle.take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .ok_or_else(|| StoreError::Command(format!("ttl {:?} is out of range", ttl)))?;
        let new_entry = StoreEntry {
            value: value.to_string(),
            expires_at,
        };

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(new_entry);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(new_entry);
                Ok(true)
            }
        }
    }

    async fn compare_and_delete(
        &self,
        key: &str,
        expected: &str,
    ) -> Result<DeleteOutcome, StoreError> {
        let now = Instant::now();
        let removed = self
            .entries
            .remove_if(key, |_, entry| !entry.is_expired(now) && entry.value == expected);

        match removed {
            Some(_) => Ok(DeleteOutcome::Deleted),
            None => {
                // Expired leftovers are logically absent
                self.entries.remove_if(key, |_, entry| entry.is_expired(now));
                Ok(DeleteOutcome::NotDeleted)
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        Ok(self
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone()))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
