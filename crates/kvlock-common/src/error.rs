//! Error types for kvlock
//!
//! This module defines:
//! - `StoreError`: failures reported by a key-value store backend
//! - `LockError`: failures surfaced by lock acquisition

use std::time::Duration;

/// Errors raised by a key-value store backend
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached (connection refused, dropped, timed out)
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store was reached but rejected the command
    #[error("store command failed: {0}")]
    Command(String),

    /// The store answered with something the protocol does not expect
    #[error("unexpected store reply: {0}")]
    UnexpectedReply(String),
}

/// Errors surfaced by lock acquisition.
///
/// Release never produces one of these; its failures are downgraded to a
/// logged outcome.
#[derive(thiserror::Error, Debug)]
pub enum LockError {
    #[error("timed out acquiring lock '{key}' after {waited:?}")]
    AcquisitionTimeout { key: String, waited: Duration },

    #[error("acquisition of lock '{key}' was interrupted")]
    AcquisitionInterrupted { key: String },

    #[error("store unavailable while acquiring lock '{key}': {source}")]
    StoreUnavailable {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("caused: {0}")]
    IllegalArgument(String),
}

impl LockError {
    /// Key the failed operation was about, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            LockError::AcquisitionTimeout { key, .. }
            | LockError::AcquisitionInterrupted { key }
            | LockError::StoreUnavailable { key, .. } => Some(key),
            LockError::IllegalArgument(_) => None,
        }
    }

    /// Contention is the only failure worth retrying as-is
    pub fn is_retryable(&self) -> bool {
        matches!(self, LockError::AcquisitionTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_error_display() {
        let err = LockError::AcquisitionTimeout {
            key: "seat-42".to_string(),
            waited: Duration::from_millis(200),
        };
        assert_eq!(
            format!("{}", err),
            "timed out acquiring lock 'seat-42' after 200ms"
        );

        let err = LockError::AcquisitionInterrupted {
            key: "seat-42".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "acquisition of lock 'seat-42' was interrupted"
        );

        let err = LockError::IllegalArgument("lock key must not be empty".to_string());
        assert_eq!(format!("{}", err), "caused: lock key must not be empty");
    }

    #[test]
    fn test_store_unavailable_keeps_source() {
        let err = LockError::StoreUnavailable {
            key: "seat-1".to_string(),
            source: StoreError::Unavailable("connection refused".to_string()),
        };
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(
            source.as_deref(),
            Some("store unavailable: connection refused")
        );
    }

    #[test]
    fn test_lock_error_key_and_retryable() {
        let timeout = LockError::AcquisitionTimeout {
            key: "a".to_string(),
            waited: Duration::ZERO,
        };
        assert_eq!(timeout.key(), Some("a"));
        assert!(timeout.is_retryable());

        let store = LockError::StoreUnavailable {
            key: "b".to_string(),
            source: StoreError::Command("ERR".to_string()),
        };
        assert_eq!(store.key(), Some("b"));
        assert!(!store.is_retryable());

        assert_eq!(LockError::IllegalArgument("x".to_string()).key(), None);
    }

    #[test]
    fn test_lock_error_into_anyhow() {
        let err: anyhow::Error = LockError::AcquisitionInterrupted {
            key: "k".to_string(),
        }
        .into();
        assert!(err.downcast_ref::<LockError>().is_some());
    }
}
