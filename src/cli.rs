// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `shellexec`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "shellexec",
    version,
    about = "Run shell tasks across a prepare/startup/check/shutdown/post-process lifecycle.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the service config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "shellexec.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SHELLEXEC_LOG` or `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Keep running check stages for this long (e.g. "30s", "5m") instead of
    /// stopping once no background task is left.
    #[arg(long, value_name = "DURATION")]
    pub duration: Option<String>,

    /// Parse + validate, print the stages, but don't execute any commands.
    #[arg(long)]
    pub dry_run: bool,
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

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
