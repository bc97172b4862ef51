//! Configuration management for the kvlock CLI
//!
//! Sources, lowest to highest precedence:
//! - built-in defaults
//! - `conf/application.yml` (or `--config <file>`), optional
//! - environment variables prefixed `KVLOCK_`, `__` between key segments
//!   (e.g. `KVLOCK_LOCK__TTL_SECONDS=30`)
//! - command line flags

use std::time::Duration;

use clap::{Parser, Subcommand};
use config::{Config, ConfigError, Environment};
use kvlock_common::{
    DEFAULT_ACQUIRE_TIMEOUT_MILLIS, DEFAULT_LOCK_TTL_SECONDS, DEFAULT_POLL_INTERVAL_MILLIS,
};
use kvlock_core::LockConfig;

pub const LOCK_TTL_SECONDS: &str = "lock.ttl_seconds";
pub const LOCK_WAIT_MILLIS: &str = "lock.wait_millis";
pub const LOCK_POLL_MILLIS: &str = "lock.poll_millis";
pub const STORE_TYPE: &str = "store.type";
pub const STORE_REDIS_URL: &str = "store.redis_url";
pub const LOG_LEVEL: &str = "log.level";
pub const LOG_DIR: &str = "log.dir";
pub const LOG_FILE_ENABLED: &str = "log.file_enabled";

pub const DEFAULT_CONFIG_FILE: &str = "conf/application.yml";
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "kvlock", version, about = "Mutual exclusion across processes via a shared key-value store")]
pub struct Cli {
    /// Configuration file (YAML)
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,
    /// Store backend: memory or redis
    #[arg(long = "store")]
    pub store: Option<String>,
    /// Redis connection URL
    #[arg(long = "redis-url", env = "KVLOCK_REDIS_URL")]
    pub redis_url: Option<String>,
    /// Lifetime of an unattended lock record
    #[arg(long = "ttl-seconds")]
    pub ttl_seconds: Option<u64>,
    /// Maximum time to wait for a held lock
    #[arg(long = "wait-millis")]
    pub wait_millis: Option<u64>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Acquire a lock and print its token
    Acquire { key: String },
    /// Release a lock previously acquired with the given token
    Release { key: String, token: String },
    /// Print the token currently holding a lock, if any
    Get { key: String },
    /// Run a program while holding a lock
    Exec {
        key: String,
        /// Program and arguments, after `--`
        #[arg(last = true, required = true)]
        program: Vec<String>,
    },
}

/// Store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Redis,
}

impl std::str::FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StoreKind::Memory),
            "redis" => Ok(StoreKind::Redis),
            _ => Err(format!("Invalid store type: {}", s)),
        }
    }
}

/// Application configuration loaded from config files and environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    pub fn load(cli: &Cli) -> Result<Self, config::ConfigError> {
        let mut config_builder = Config::builder()
            .add_source(config::File::with_name(&cli.config).required(false))
            .add_source(
                Environment::with_prefix("KVLOCK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Some(v) = &cli.store {
            config_builder = config_builder.set_override(STORE_TYPE, v.as_str())?;
        }
        if let Some(v) = &cli.redis_url {
            config_builder = config_builder.set_override(STORE_REDIS_URL, v.as_str())?;
        }
        if let Some(v) = cli.ttl_seconds {
            config_builder =
                config_builder.set_override(LOCK_TTL_SECONDS, flag_int("--ttl-seconds", v)?)?;
        }
        if let Some(v) = cli.wait_millis {
            config_builder =
                config_builder.set_override(LOCK_WAIT_MILLIS, flag_int("--wait-millis", v)?)?;
        }

        Ok(Configuration {
            config: config_builder.build()?,
        })
    }

    // ========================================================================
    // Lock Configuration
    // ========================================================================

    pub fn lock_ttl(&self) -> Result<Duration, ConfigError> {
        self.non_negative(LOCK_TTL_SECONDS, DEFAULT_LOCK_TTL_SECONDS)
            .map(Duration::from_secs)
    }

    pub fn acquire_timeout(&self) -> Result<Duration, ConfigError> {
        self.non_negative(LOCK_WAIT_MILLIS, DEFAULT_ACQUIRE_TIMEOUT_MILLIS)
            .map(Duration::from_millis)
    }

    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        self.non_negative(LOCK_POLL_MILLIS, DEFAULT_POLL_INTERVAL_MILLIS)
            .map(Duration::from_millis)
    }

    pub fn lock_config(&self) -> Result<LockConfig, ConfigError> {
        Ok(LockConfig::default()
            .with_lock_ttl(self.lock_ttl()?)
            .with_acquire_timeout(self.acquire_timeout()?)
            .with_poll_interval(self.poll_interval()?))
    }

    // ========================================================================
    // Store Configuration
    // ========================================================================

    pub fn store_kind(&self) -> Result<StoreKind, String> {
        self.config
            .get_string(STORE_TYPE)
            .unwrap_or("memory".to_string())
            .parse()
    }

    pub fn redis_url(&self) -> String {
        self.config
            .get_string(STORE_REDIS_URL)
            .unwrap_or(DEFAULT_REDIS_URL.to_string())
    }

    // ========================================================================
    // Logging Configuration
    // ========================================================================

    pub fn log_level(&self) -> String {
        self.config
            .get_string(LOG_LEVEL)
            .unwrap_or("info".to_string())
    }

    pub fn log_dir(&self) -> Option<String> {
        self.config.get_string(LOG_DIR).ok()
    }

    pub fn log_file_enabled(&self) -> bool {
        self.config.get_bool(LOG_FILE_ENABLED).unwrap_or(false)
    }

    /// Missing keys fall back to `default`; negative or non-integer values are errors.
    fn non_negative(&self, key: &str, default: u64) -> Result<u64, ConfigError> {
        match self.config.get_int(key) {
            Ok(v) => u64::try_from(v).map_err(|_| {
                ConfigError::Message(format!("{} must not be negative, got {}", key, v))
            }),
            Err(ConfigError::NotFound(_)) => Ok(default),
            Err(e) => Err(e),
        }
    }
}

fn flag_int(flag: &str, value: u64) -> Result<i64, ConfigError> {
    i64::try_from(value)
        .map_err(|_| ConfigError::Message(format!("{} {} is out of range", flag, value)))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["kvlock", "--config", "/nonexistent/kvlock.yml"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[test]
    fn test_defaults_without_file() {
        let configuration = Configuration::load(&cli(&["get", "seat-1"])).unwrap();

        assert_eq!(configuration.lock_ttl().unwrap(), Duration::from_secs(15));
        assert_eq!(
            configuration.acquire_timeout().unwrap(),
            Duration::from_millis(500)
        );
        assert_eq!(
            configuration.poll_interval().unwrap(),
            Duration::from_millis(50)
        );
        assert_eq!(configuration.store_kind(), Ok(StoreKind::Memory));
        assert_eq!(configuration.redis_url(), DEFAULT_REDIS_URL);
        assert!(!configuration.log_file_enabled());
    }

    #[test]
    fn test_cli_overrides() {
        let configuration = Configuration::load(&cli(&[
            "--store",
            "redis",
            "--redis-url",
            "redis://cache:6380",
            "--ttl-seconds",
            "30",
            "--wait-millis",
            "200",
            "acquire",
            "seat-42",
        ]))
        .unwrap();

        assert_eq!(configuration.store_kind(), Ok(StoreKind::Redis));
        assert_eq!(configuration.redis_url(), "redis://cache:6380");

        let lock_config = configuration.lock_config().unwrap();
        assert_eq!(lock_config.lock_ttl, Duration::from_secs(30));
        assert_eq!(lock_config.acquire_timeout, Duration::from_millis(200));
        assert_eq!(lock_config.poll_interval, Duration::from_millis(50));
    }

    #[test]
    fn test_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(
            file,
            "lock:\n  ttl_seconds: 5\n  wait_millis: 1000\n  poll_millis: 20\nstore:\n  type: redis\nlog:\n  level: debug\n  file_enabled: true"
        )
        .unwrap();

        let path = file.path().to_string_lossy().to_string();
        let cli = Cli::parse_from(["kvlock", "--config", path.as_str(), "get", "k"]);
        let configuration = Configuration::load(&cli).unwrap();

        assert_eq!(configuration.lock_ttl().unwrap(), Duration::from_secs(5));
        assert_eq!(configuration.acquire_timeout().unwrap(), Duration::from_secs(1));
        assert_eq!(
            configuration.poll_interval().unwrap(),
            Duration::from_millis(20)
        );
        assert_eq!(configuration.store_kind(), Ok(StoreKind::Redis));
        assert_eq!(configuration.log_level(), "debug");
        assert!(configuration.log_file_enabled());
    }

    #[test]
    fn test_negative_durations_are_errors() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "lock:\n  wait_millis: -5\n  poll_millis: -1").unwrap();

        let path = file.path().to_string_lossy().to_string();
        let cli = Cli::parse_from(["kvlock", "--config", path.as_str(), "get", "k"]);
        let configuration = Configuration::load(&cli).unwrap();

        let err = configuration.acquire_timeout().unwrap_err();
        assert!(err.to_string().contains(LOCK_WAIT_MILLIS));
        assert!(configuration.poll_interval().is_err());
        assert!(configuration.lock_config().is_err());
        // Unset keys still use their defaults
        assert_eq!(configuration.lock_ttl().unwrap(), Duration::from_secs(15));
    }

    #[test]
    fn test_ttl_flag_beyond_i64_is_error() {
        let err = Configuration::load(&cli(&[
            "--ttl-seconds",
            "18446744073709551615",
            "get",
            "k",
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("--ttl-seconds"));
    }

    #[test]
    fn test_invalid_store_kind() {
        let configuration = Configuration::load(&cli(&["--store", "etcd", "get", "k"])).unwrap();
        assert!(configuration.store_kind().is_err());
    }

    #[test]
    fn test_exec_takes_trailing_program() {
        let cli = cli(&["exec", "seat-1", "--", "echo", "--flag", "x"]);
        match cli.command {
            Command::Exec { key, program } => {
                assert_eq!(key, "seat-1");
                assert_eq!(program, vec!["echo", "--flag", "x"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
