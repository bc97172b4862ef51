//! kvlock Common - Shared types and constants
//!
//! This crate provides the foundational types used across all kvlock components:
//! - Error taxonomy for lock acquisition and store access
//! - Default lock timings
//! - Metric names

pub mod error;

// Re-exports for convenience
pub use error::{LockError, StoreError};

/// Default lifetime of an unattended lock record
pub const DEFAULT_LOCK_TTL_SECONDS: u64 = 15;

/// Default maximum time spent trying to acquire a lock
pub const DEFAULT_ACQUIRE_TIMEOUT_MILLIS: u64 = 500;

/// Default delay between failed acquisition attempts
pub const DEFAULT_POLL_INTERVAL_MILLIS: u64 = 50;

/// Metric names
pub mod metric {
    pub const ACQUIRE_TOTAL: &str = "kvlock_acquire_total";
    pub const ACQUIRE_WAIT_SECONDS: &str = "kvlock_acquire_wait_seconds";
    pub const RELEASE_TOTAL: &str = "kvlock_release_total";
}

/// Outcome labels shared by logs and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutcomeLabel {
    #[default]
    Acquired,
    Timeout,
    Interrupted,
    StoreError,
    Released,
    NotHeld,
}

impl OutcomeLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeLabel::Acquired => "acquired",
            OutcomeLabel::Timeout => "timeout",
            OutcomeLabel::Interrupted => "interrupted",
            OutcomeLabel::StoreError => "store_error",
            OutcomeLabel::Released => "released",
            OutcomeLabel::NotHeld => "not_held",
        }
    }
}

impl std::fmt::Display for OutcomeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_label_as_str() {
        assert_eq!(OutcomeLabel::Acquired.as_str(), "acquired");
        assert_eq!(OutcomeLabel::StoreError.as_str(), "store_error");
        assert_eq!(OutcomeLabel::NotHeld.to_string(), "not_held");
    }

    #[test]
    fn test_default_timings() {
        assert_eq!(DEFAULT_LOCK_TTL_SECONDS, 15);
        assert_eq!(DEFAULT_ACQUIRE_TIMEOUT_MILLIS, 500);
        assert_eq!(DEFAULT_POLL_INTERVAL_MILLIS, 50);
    }
}
