use std::process::ExitCode;

use clap::Parser;
use kvlock_cli::command::{self, EXIT_FAILURE};
use kvlock_cli::config::{Cli, Command, Configuration};
use kvlock_cli::logging::{LoggingConfig, init_logging};
use kvlock_core::{LockManager, wait_for_shutdown_signal};
use tracing::{debug, error};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let configuration = match Configuration::load(&cli) {
        Ok(configuration) => configuration,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let _logging_guard = match init_logging(&LoggingConfig::from_configuration(&configuration)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    kvlock_core::metrics::init_metrics();

    let result = run(cli.command, &configuration).await;

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("kvlock: {:#}", e);
            ExitCode::from(command::exit_code_for(&e))
        }
    }
}

async fn run(cmd: Command, configuration: &Configuration) -> anyhow::Result<u8> {
    let lock_config = configuration.lock_config()?;
    let store = command::connect_store(configuration).await?;
    let manager = LockManager::try_new(store, lock_config)?;
    debug!(config = ?manager.config(), "Lock manager ready");

    let shutdown = wait_for_shutdown_signal();
    command::run(cmd, &manager, &shutdown).await
}
