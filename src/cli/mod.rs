//! CLI command definitions for confetti
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod keys;
pub mod sync;

use crate::logging::LogTarget;
use clap::{Parser, Subcommand};
use keys::{GetArgs, SetArgs, UnsetArgs};
use std::path::PathBuf;
use sync::SyncGithubArgs;

/// Environment used when `--env` is not given.
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Inspect and edit layered configuration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Environment to load from confetti.yaml
    #[arg(short, long, default_value = DEFAULT_ENVIRONMENT, global = true)]
    pub env: String,

    /// Path to confetti.yaml (skips discovery)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: LogTarget,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List registered sources in precedence order
    Sources,

    /// Print the merged configuration
    Values,

    /// Print one key with the source that supplied it
    Get(GetArgs),

    /// Stage a value, optionally saving it
    Set(SetArgs),

    /// Stage removal of a key, optionally saving it
    Unset(UnsetArgs),

    /// Write staged changes back to their sources
    Save,

    /// Push the merged configuration into a GitHub environment
    SyncGithub(SyncGithubArgs),
}
