//! kvlock CLI - command line front end for store-backed locks
//!
//! This crate provides:
//! - Configuration loading (file, environment, flags)
//! - Logging initialization
//! - Subcommands: acquire, release, get, exec

pub mod command;
pub mod config;
pub mod logging;
