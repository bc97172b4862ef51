//! Subcommand execution

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use kvlock_common::{LockError, StoreError};
use kvlock_core::{
    KeyValueStore, LockHandle, LockManager, MemoryStore, RedisStore, ReleaseOutcome,
    ShutdownSignal,
};
use tracing::{info, warn};

use crate::config::{Command, Configuration, StoreKind};

const MEMORY_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Exit code for success
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code for generic failures, including releasing a lock we do not hold
pub const EXIT_FAILURE: u8 = 1;
/// Exit code when acquisition timed out under contention
pub const EXIT_TIMEOUT: u8 = 2;
/// Exit code when the wait was interrupted
pub const EXIT_INTERRUPTED: u8 = 3;
/// Exit code when the store could not be reached
pub const EXIT_STORE_UNAVAILABLE: u8 = 4;

/// Build the store selected by configuration
pub async fn connect_store(configuration: &Configuration) -> anyhow::Result<Arc<dyn KeyValueStore>> {
    let kind = configuration
        .store_kind()
        .map_err(anyhow::Error::msg)?;

    let store: Arc<dyn KeyValueStore> = match kind {
        StoreKind::Memory => {
            warn!("Using in-process memory store; locks are not shared with other processes");
            Arc::new(MemoryStore::new().with_expiry_sweep(MEMORY_SWEEP_INTERVAL))
        }
        StoreKind::Redis => Arc::new(RedisStore::connect(&configuration.redis_url()).await?),
    };

    Ok(store)
}

/// Run one subcommand against `manager`.
///
/// `shutdown` interrupts any lock wait in progress.
pub async fn run(
    command: Command,
    manager: &LockManager,
    shutdown: &ShutdownSignal,
) -> anyhow::Result<u8> {
    match command {
        Command::Acquire { key } => {
            let mut interrupt = shutdown.subscribe();
            let handle = manager.acquire_interruptible(&key, &mut interrupt).await?;
            info!(key = %key, ttl = ?manager.config().lock_ttl, "Lock held until released or expired");
            println!("{}", handle.token());
            Ok(EXIT_SUCCESS)
        }
        Command::Release { key, token } => {
            let outcome = manager.release(&LockHandle::from_parts(key, token)).await;
            println!("{}", outcome);
            Ok(match outcome {
                ReleaseOutcome::Released => EXIT_SUCCESS,
                ReleaseOutcome::NotHeld => EXIT_FAILURE,
                ReleaseOutcome::StoreUnavailable => EXIT_STORE_UNAVAILABLE,
            })
        }
        Command::Get { key } => {
            if let Some(token) = manager.current_holder(&key).await? {
                println!("{}", token);
            }
            Ok(EXIT_SUCCESS)
        }
        Command::Exec { key, program } => {
            let (executable, args) = program
                .split_first()
                .context("exec requires a program to run")?;

            let mut interrupt = shutdown.subscribe();
            let handle = manager.acquire_interruptible(&key, &mut interrupt).await?;

            let status = tokio::process::Command::new(executable)
                .args(args)
                .status()
                .await;
            manager.release(&handle).await;

            let status = status.with_context(|| format!("failed to run {}", executable))?;
            info!(key = %key, status = %status, "Command finished under lock");
            Ok(status.code().unwrap_or(1).clamp(0, 255) as u8)
        }
    }
}

/// Map a failure to the process exit code
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    if let Some(lock_err) = err.downcast_ref::<LockError>() {
        return match lock_err {
            LockError::AcquisitionTimeout { .. } => EXIT_TIMEOUT,
            LockError::AcquisitionInterrupted { .. } => EXIT_INTERRUPTED,
            LockError::StoreUnavailable { .. } => EXIT_STORE_UNAVAILABLE,
            LockError::IllegalArgument(_) => EXIT_FAILURE,
        };
    }
    if err.downcast_ref::<StoreError>().is_some() {
        return EXIT_STORE_UNAVAILABLE;
    }
    EXIT_FAILURE
}
