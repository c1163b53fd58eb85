// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod sink;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{Level, info, warn};

use crate::cli::CliArgs;
use crate::config::ServiceConfig;
use crate::config::load_and_validate;
use crate::engine::ShellExecutor;
use crate::sink::TracingSink;
use crate::types::{Stage, parse_duration};

/// High-level entry point used by `main.rs`.
///
/// Acts as the lifecycle host around a `ShellExecutor`:
/// - prepare
/// - startup
/// - check every `check-interval` until no background task is left, the
///   `--duration` elapsed, or Ctrl-C
/// - shutdown
/// - post-process (always, once prepare has run)
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let run_for = args
        .duration
        .as_deref()
        .map(parse_duration)
        .transpose()
        .map_err(|e| anyhow::anyhow!("invalid --duration: {e}"))?;

    let ctx = cfg.host_context(&config_root_dir(&config_path), Arc::new(TracingSink));
    info!(cwd = %ctx.cwd.display(), tasks = cfg.task_count(), "shellexec starting");
    let executor = ShellExecutor::from_config(&cfg, ctx);

    run_lifecycle(&executor, run_for).await?;
    info!("shellexec finished");
    Ok(())
}

/// Drive one executor through its whole lifecycle.
///
/// Shutdown runs whenever startup ran, and post-process whenever prepare
/// ran, so background tasks are always reconciled. The first error is
/// returned; a later one is reported through the executor's sink at error
/// level instead of being lost.
pub async fn run_lifecycle(
    executor: &ShellExecutor,
    run_for: Option<Duration>,
) -> errors::Result<()> {
    let driven = match executor.prepare().await {
        Ok(()) => drive(executor, run_for).await,
        Err(e) => Err(e),
    };
    let post_processed = executor.post_process().await;
    first_error(executor, driven, post_processed)
}

/// startup → repeated check → shutdown.
async fn drive(executor: &ShellExecutor, run_for: Option<Duration>) -> errors::Result<()> {
    let checked = match executor.startup().await {
        Ok(()) => check_loop(executor, run_for).await,
        Err(e) => Err(e),
    };
    let shut_down = executor.shutdown().await;
    first_error(executor, checked, shut_down)
}

fn first_error(
    executor: &ShellExecutor,
    first: errors::Result<()>,
    second: errors::Result<()>,
) -> errors::Result<()> {
    match (first, second) {
        (Err(e), Err(later)) => {
            executor.context().sink.log(Level::ERROR, &later.to_string());
            Err(e)
        }
        (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        (Ok(()), Ok(())) => Ok(()),
    }
}

async fn check_loop(executor: &ShellExecutor, run_for: Option<Duration>) -> errors::Result<()> {
    let deadline = run_for.map(|d| Instant::now() + d);
    let mut ticker = tokio::time::interval(executor.check_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            res = &mut ctrl_c => {
                if let Err(e) = res {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                }
                info!("interrupted; shutting down");
                return Ok(());
            }
        }

        executor.check().await?;

        match deadline {
            Some(deadline) if Instant::now() >= deadline => {
                info!("run duration elapsed; shutting down");
                return Ok(());
            }
            Some(_) => {}
            None if executor.registry().running_count().await == 0 => {
                info!("no background task left running; shutting down");
                return Ok(());
            }
            None => {}
        }
    }
}

/// Directory relative settings resolve against: the config file's parent, or
/// the current directory for a bare file name.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn print_dry_run(cfg: &ServiceConfig) {
    println!("shellexec dry-run");
    println!("  check-interval = {:?}", cfg.settings.check_interval);
    if let Some(cwd) = &cfg.settings.cwd {
        println!("  cwd = {}", cwd.display());
    }
    for (key, value) in &cfg.settings.env {
        println!("  env {key}={value}");
    }
    println!();

    for stage in Stage::ALL {
        let tasks = cfg.tasks(stage);
        if tasks.is_empty() {
            continue;
        }
        println!("{stage} ({}):", tasks.len());
        for task in tasks {
            println!("  - {}", task.command);
            if task.background {
                println!("      background: true");
            }
            if task.ignore_failure {
                println!("      ignore-failure: true");
            }
            if let Some(out) = &task.stdout_target {
                println!("      out: {}", out.display());
            }
            if let Some(err) = &task.stderr_target {
                println!("      err: {}", err.display());
            }
            if let Some(cwd) = &task.working_dir {
                println!("      cwd: {}", cwd.display());
            }
            if !task.env.is_empty() {
                println!("      env: {:?}", task.env);
            }
        }
    }
}
