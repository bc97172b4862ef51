use std::time::Duration;

use kvlock_common::{
    DEFAULT_ACQUIRE_TIMEOUT_MILLIS, DEFAULT_LOCK_TTL_SECONDS, DEFAULT_POLL_INTERVAL_MILLIS,
    LockError,
};

/// Longest lock TTL accepted by [`LockConfig::validate`]
pub const MAX_LOCK_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Longest acquire timeout accepted by [`LockConfig::validate`]
pub const MAX_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Timing configuration for a [`LockManager`](crate::LockManager)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockConfig {
    /// How long a lock record survives unattended before the store expires it
    pub lock_ttl: Duration,
    /// Maximum wall-clock time spent trying to acquire
    pub acquire_timeout: Duration,
    /// Delay between failed attempts
    pub poll_interval: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lock_ttl: Duration::from_secs(DEFAULT_LOCK_TTL_SECONDS),
            acquire_timeout: Duration::from_millis(DEFAULT_ACQUIRE_TIMEOUT_MILLIS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MILLIS),
        }
    }
}

impl LockConfig {
    pub fn with_lock_ttl(mut self, lock_ttl: Duration) -> Self {
        self.lock_ttl = lock_ttl;
        self
    }

    pub fn with_acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.acquire_timeout = acquire_timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Rejects a zero TTL and a zero poll interval, and a TTL or acquire
    /// timeout longer than a year.
    /// A zero acquire timeout is allowed and means a single attempt.
    pub fn validate(&self) -> Result<(), LockError> {
        if self.lock_ttl.is_zero() {
            return Err(LockError::IllegalArgument(
                "lock ttl must be greater than zero".to_string(),
            ));
        }
        if self.lock_ttl > MAX_LOCK_TTL {
            return Err(LockError::IllegalArgument(format!(
                "lock ttl must not exceed {:?}, got {:?}",
                MAX_LOCK_TTL, self.lock_ttl
            )));
        }
        if self.acquire_timeout > MAX_ACQUIRE_TIMEOUT {
            return Err(LockError::IllegalArgument(format!(
                "acquire timeout must not exceed {:?}, got {:?}",
                MAX_ACQUIRE_TIMEOUT, self.acquire_timeout
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(LockError::IllegalArgument(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_config_default() {
        let config = LockConfig::default();

        assert_eq!(config.lock_ttl, Duration::from_secs(15));
        assert_eq!(config.acquire_timeout, Duration::from_millis(500));
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_lock_config_builders() {
        let config = LockConfig::default()
            .with_lock_ttl(Duration::from_secs(5))
            .with_acquire_timeout(Duration::from_millis(200))
            .with_poll_interval(Duration::from_millis(10));

        assert_eq!(config.lock_ttl, Duration::from_secs(5));
        assert_eq!(config.acquire_timeout, Duration::from_millis(200));
        assert_eq!(config.poll_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_lock_config_validate() {
        let zero_ttl = LockConfig::default().with_lock_ttl(Duration::ZERO);
        assert!(matches!(
            zero_ttl.validate(),
            Err(LockError::IllegalArgument(_))
        ));

        let zero_poll = LockConfig::default().with_poll_interval(Duration::ZERO);
        assert!(zero_poll.validate().is_err());

        let single_attempt = LockConfig::default().with_acquire_timeout(Duration::ZERO);
        assert!(single_attempt.validate().is_ok());
    }

    #[test]
    fn test_lock_config_validate_upper_bounds() {
        let at_limit = LockConfig::default()
            .with_lock_ttl(MAX_LOCK_TTL)
            .with_acquire_timeout(MAX_ACQUIRE_TIMEOUT);
        assert!(at_limit.validate().is_ok());

        let huge_ttl = LockConfig::default().with_lock_ttl(Duration::from_secs(i64::MAX as u64));
        assert!(matches!(
            huge_ttl.validate(),
            Err(LockError::IllegalArgument(_))
        ));

        let huge_timeout = LockConfig::default().with_acquire_timeout(Duration::MAX);
        assert!(matches!(
            huge_timeout.validate(),
            Err(LockError::IllegalArgument(_))
        ));
    }
}
