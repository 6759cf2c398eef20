// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `diagrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "diagrun",
    version,
    about = "Run a batch of diagnostic jobs, each in its own runtime environment.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Diagrun.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Diagrun.toml")]
    pub config: String,

    /// Run only the named job instead of the whole batch.
    #[arg(long, value_name = "NAME")]
    pub job: Option<String>,

    /// Replace each job's run command with a reporting no-op. Environment
    /// and dependency wiring still run, so this verifies the batch setup
    /// without executing any driver.
    #[arg(long)]
    pub test_mode: bool,

    /// Parse + validate, print the batch plan, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DIAGRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
