//! Redis-backed key-value store
//!
//! Set-if-absent maps to `SET key value NX PX ttl`. Compare-and-delete runs a
//! Lua script server side, so the comparison and the delete are one atomic
//! step. A get followed by a del would race with a holder that acquired the
//! key after our record expired.

use std::sync::LazyLock;
use std::time::Duration;

use ::redis::aio::ConnectionManager;
use ::redis::{Client, RedisError, Script};
use async_trait::async_trait;
use kvlock_common::StoreError;
use tracing::info;

use super::{DeleteOutcome, KeyValueStore};

/// Deletes KEYS[1] only when it holds ARGV[1]; returns the number of keys removed.
const UNLOCK_SCRIPT_SOURCE: &str = "if redis.call('get', KEYS[1]) == ARGV[1] then \
     return redis.call('del', KEYS[1]) else return 0 end";

static UNLOCK_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(UNLOCK_SCRIPT_SOURCE));

/// Redis store sharing one auto-reconnecting multiplexed connection
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to the Redis server at `url` (e.g. `redis://127.0.0.1:6379`)
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(map_redis_error)?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(map_redis_error)?;

        info!(url = %url, "Connected to redis lock store");
        Ok(Self { conn })
    }

    /// Wrap an existing connection manager
    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = ::redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        set_reply_acquired(reply)
    }

    async fn compare_and_delete(
        &self,
        key: &str,
        expected: &str,
    ) -> Result<DeleteOutcome, StoreError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = UNLOCK_SCRIPT
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        unlock_reply_outcome(deleted)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        ::redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// Redis rejects `PX 0`, so sub-millisecond TTLs round up to 1 ms.
/// `PX` takes a signed 64-bit count, so longer TTLs saturate at `i64::MAX`.
fn ttl_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX).max(1)
}

/// `SET ... NX` answers `OK` when it wrote and nil when the key exists.
fn set_reply_acquired(reply: Option<String>) -> Result<bool, StoreError> {
    match reply.as_deref() {
        Some("OK") => Ok(true),
        None => Ok(false),
        Some(other) => Err(StoreError::UnexpectedReply(other.to_string())),
    }
}

fn unlock_reply_outcome(deleted: i64) -> Result<DeleteOutcome, StoreError> {
    match deleted {
        0 => Ok(DeleteOutcome::NotDeleted),
        1 => Ok(DeleteOutcome::Deleted),
        other => Err(StoreError::UnexpectedReply(format!(
            "unlock script returned {}",
            other
        ))),
    }
}

fn map_redis_error(err: RedisError) -> StoreError {
    if err.is_io_error()
        || err.is_connection_refusal()
        || err.is_connection_dropped()
        || err.is_timeout()
    {
        StoreError::Unavailable(err.to_string())
    } else {
        StoreError::Command(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_millis_rounds_up() {
        assert_eq!(ttl_millis(Duration::ZERO), 1);
        assert_eq!(ttl_millis(Duration::from_micros(300)), 1);
        assert_eq!(ttl_millis(Duration::from_secs(15)), 15_000);
    }

    #[test]
    fn test_ttl_millis_saturates() {
        assert_eq!(ttl_millis(Duration::MAX), i64::MAX);
        assert_eq!(ttl_millis(Duration::from_secs(i64::MAX as u64)), i64::MAX);
    }

    #[test]
    fn test_set_reply_mapping() {
        assert_eq!(set_reply_acquired(Some("OK".to_string())), Ok(true));
        assert_eq!(set_reply_acquired(None), Ok(false));
        assert_eq!(
            set_reply_acquired(Some("QUEUED".to_string())),
            Err(StoreError::UnexpectedReply("QUEUED".to_string()))
        );
    }

    #[test]
    fn test_unlock_reply_mapping() {
        assert_eq!(unlock_reply_outcome(1), Ok(DeleteOutcome::Deleted));
        assert_eq!(unlock_reply_outcome(0), Ok(DeleteOutcome::NotDeleted));
        assert!(matches!(
            unlock_reply_outcome(2),
            Err(StoreError::UnexpectedReply(msg)) if msg.contains('2')
        ));
    }

    #[test]
    fn test_unlock_script_compares_before_delete() {
        assert!(UNLOCK_SCRIPT_SOURCE.contains("redis.call('get', KEYS[1]) == ARGV[1]"));
        assert!(UNLOCK_SCRIPT_SOURCE.contains("redis.call('del', KEYS[1])"));
        assert!(!UNLOCK_SCRIPT.get_hash().is_empty());
    }

    #[test]
    fn test_invalid_url_is_command_error() {
        let err = Client::open("not a url").map_err(map_redis_error).err();
        assert!(matches!(err, Some(StoreError::Command(_))));
    }
}
