// tests/config_loading.rs

mod common;
use crate::common::builders::{ServiceConfigBuilder, task_config};
use crate::common::{RecordingSink, init_tracing, with_timeout};

use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::{NamedTempFile, tempdir};
use tracing::Level;

use shellexec::cli::CliArgs;
use shellexec::config::{
    EnvValue, ServiceConfig, TaskItem, load_and_validate, load_from_path, load_from_str,
};
use shellexec::engine::{DEFAULT_CHECK_INTERVAL, ShellExecutor};
use shellexec::errors::ShellExecError;
use shellexec::types::Stage;

type TestResult = Result<(), Box<dyn Error>>;

const SERVICE_TOML: &str = r#"
startup = [{ command = "sleep 10 && echo 111", background = true }]
check = [{ command = "dmesg | grep nvidia", "ignore-failure" = true }, "pwd"]

[settings]
check-interval = "250ms"

[settings.env]
VAR = 1
NAME = "svc"
DEBUG = true
"#;

fn validate(toml: &str) -> Result<ServiceConfig, ShellExecError> {
    ServiceConfig::try_from(load_from_str(toml)?)
}

fn args(config: &Path) -> CliArgs {
    CliArgs {
        config: config.display().to_string(),
        log_level: None,
        duration: None,
        dry_run: false,
    }
}

/// Bare strings and tables mix in one stage; table keys are kebab-case.
#[test]
fn parses_bare_and_table_items() -> TestResult {
    let raw = load_from_str(SERVICE_TOML)?;

    assert!(raw.prepare.is_empty());
    assert_eq!(raw.startup.len(), 1);
    assert_eq!(raw.check.len(), 2);
    assert_eq!(raw.check[1], TaskItem::from("pwd"));
    assert_eq!(
        raw.check[0],
        TaskItem::from(task_config("dmesg | grep nvidia", false, true))
    );
    assert_eq!(raw.settings.env.get("VAR"), Some(&EnvValue::Integer(1)));
    Ok(())
}

/// Validation turns items into specs and every env value into a string.
#[test]
fn validation_builds_specs_and_settings() -> TestResult {
    let cfg = validate(SERVICE_TOML)?;

    assert_eq!(cfg.task_count(), 3);
    assert_eq!(cfg.settings.check_interval, Duration::from_millis(250));
    assert_eq!(cfg.settings.env.get("VAR").map(String::as_str), Some("1"));
    assert_eq!(cfg.settings.env.get("NAME").map(String::as_str), Some("svc"));
    assert_eq!(cfg.settings.env.get("DEBUG").map(String::as_str), Some("true"));

    let startup = cfg.tasks(Stage::Startup);
    assert_eq!(startup[0].command, "sleep 10 && echo 111");
    assert!(startup[0].background);
    assert!(!startup[0].ignore_failure);

    let check = cfg.tasks(Stage::Check);
    assert!(check[0].ignore_failure);
    assert_eq!(check[1].command, "pwd");
    assert!(!check[1].background);

    assert!(cfg.tasks(Stage::Shutdown).is_empty());
    Ok(())
}

/// Per-task output targets, env and cwd come through validation.
#[test]
fn task_table_fields_are_carried_over() -> TestResult {
    let cfg = validate(
        r#"
post-process = [{ command = "make report", out = "logs/out.txt", err = "logs/err.txt", cwd = "build", env = { JOBS = 4 } }]
"#,
    )?;

    let spec = &cfg.tasks(Stage::PostProcess)[0];
    assert_eq!(spec.stdout_target.as_deref(), Some(Path::new("logs/out.txt")));
    assert_eq!(spec.stderr_target.as_deref(), Some(Path::new("logs/err.txt")));
    assert_eq!(spec.working_dir.as_deref(), Some(Path::new("build")));
    assert_eq!(spec.env.get("JOBS").map(String::as_str), Some("4"));
    assert_eq!(cfg.settings.check_interval, DEFAULT_CHECK_INTERVAL);
    Ok(())
}

#[test]
fn blank_command_is_rejected_with_its_location() {
    let err = validate(r#"shutdown = ["true", "   "]"#).expect_err("blank command");
    match err {
        ShellExecError::ConfigError(msg) => {
            assert!(msg.contains("shutdown[1]"), "message was: {msg}");
        }
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn blank_output_target_is_rejected() {
    let err = validate(r#"prepare = [{ command = "true", out = " " }]"#).expect_err("blank out");
    assert!(matches!(err, ShellExecError::ConfigError(_)));
}

#[test]
fn bad_check_intervals_are_rejected() {
    for interval in ["soon", "0s", "10 fortnights"] {
        let toml = format!("[settings]\ncheck-interval = \"{interval}\"\n");
        assert!(
            matches!(validate(&toml), Err(ShellExecError::ConfigError(_))),
            "{interval} should be rejected"
        );
    }
}

#[test]
fn task_without_command_is_a_toml_error() {
    let err = load_from_str(r#"prepare = [{ background = true }]"#).expect_err("missing command");
    assert!(matches!(err, ShellExecError::TomlError(_)));
}

#[test]
fn missing_file_is_an_io_error() -> TestResult {
    let dir = tempdir()?;
    let err = load_from_path(dir.path().join("absent.toml")).expect_err("no such file");
    assert!(matches!(err, ShellExecError::IoError(_)));
    Ok(())
}

#[test]
fn load_and_validate_reads_a_file() -> TestResult {
    let mut file = NamedTempFile::new()?;
    file.write_all(SERVICE_TOML.as_bytes())?;

    let cfg = load_and_validate(file.path())?;
    assert_eq!(cfg.tasks(Stage::Check).len(), 2);
    Ok(())
}

/// The builder goes through the same validation as a file.
#[test]
fn builder_produces_validated_config() {
    let cfg = ServiceConfigBuilder::new()
        .with_task(Stage::Prepare, "ls ..")
        .with_task(Stage::Startup, task_config("sleep 1", true, false))
        .with_env("VAR", EnvValue::Float(1.5))
        .with_check_interval("2s")
        .build();

    assert_eq!(cfg.task_count(), 2);
    assert_eq!(cfg.settings.env.get("VAR").map(String::as_str), Some("1.5"));
    assert_eq!(cfg.settings.check_interval, Duration::from_secs(2));
}

/// A relative `[settings].cwd` resolves against the given base directory.
#[test]
fn host_context_resolves_relative_cwd() -> TestResult {
    let cfg = validate("[settings]\ncwd = \"work\"\n")?;
    let ctx = cfg.host_context(Path::new("/srv/app"), Arc::new(RecordingSink::new()));
    assert_eq!(ctx.cwd, PathBuf::from("/srv/app/work"));
    Ok(())
}

/// The sample service runs its whole lifecycle: the ignored `dmesg` failure
/// is only logged and the `sleep 10` background task is shut down.
#[cfg(unix)]
#[tokio::test]
async fn executor_from_config_runs_service_lifecycle() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let sink = RecordingSink::new();
    let cfg = validate(SERVICE_TOML)?;

    let ctx = cfg.host_context(dir.path(), Arc::new(sink.clone()));
    let executor = ShellExecutor::from_config(&cfg, ctx);
    assert_eq!(executor.check_interval(), Duration::from_millis(250));
    assert_eq!(executor.context().cwd, dir.path());
    let check = executor.task_set(Stage::Check).ok_or("no check stage")?;
    assert_eq!(check.stage(), Stage::Check);
    assert_eq!(check.specs().len(), 2);

    with_timeout(executor.prepare()).await?;
    with_timeout(executor.startup()).await?;
    with_timeout(executor.check()).await?;
    with_timeout(executor.shutdown()).await?;
    with_timeout(executor.post_process()).await?;

    assert!(sink.contains(
        Level::INFO,
        "Background task was not completed, shutting it down: sleep 10 && echo 111"
    ));
    assert!(sink.contains(Level::DEBUG, "Task was finished with exit code 0: pwd"));
    assert!(sink.contains(Level::DEBUG, "Task is not finished yet: sleep 10 && echo 111"));
    Ok(())
}

#[tokio::test]
async fn dry_run_executes_nothing() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let marker = dir.path().join("marker");
    let config = dir.path().join("shellexec.toml");
    std::fs::write(&config, format!("prepare = [\"touch {}\"]\n", marker.display()))?;

    shellexec::run(CliArgs {
        dry_run: true,
        ..args(&config)
    })
    .await?;

    assert!(!marker.exists());
    Ok(())
}

/// The host loop stops on its own once the background task is gone, and
/// relative paths resolve against the config file's directory.
#[cfg(unix)]
#[tokio::test]
async fn run_drives_the_whole_lifecycle() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let config = dir.path().join("shellexec.toml");
    std::fs::write(
        &config,
        r#"
prepare = ["echo prepared > prepare.txt"]
startup = [{ command = "sleep 1", background = true }]
check = ["echo tick >> checks.txt"]
post-process = ["echo done > post.txt"]

[settings]
check-interval = "100ms"
"#,
    )?;

    with_timeout(shellexec::run(args(&config))).await?;

    assert!(dir.path().join("prepare.txt").exists());
    assert!(dir.path().join("post.txt").exists());
    assert!(!std::fs::read_to_string(dir.path().join("checks.txt"))?.is_empty());
    Ok(())
}

/// `--duration` bounds the check loop even when a background task would
/// outlive it.
#[cfg(unix)]
#[tokio::test]
async fn run_stops_at_duration() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let config = dir.path().join("shellexec.toml");
    std::fs::write(
        &config,
        "startup = [{ command = \"sleep 30\", background = true }]\n\n[settings]\ncheck-interval = \"100ms\"\n",
    )?;

    let started = std::time::Instant::now();
    with_timeout(shellexec::run(CliArgs {
        duration: Some("500ms".to_string()),
        ..args(&config)
    }))
    .await?;

    assert!(started.elapsed() < Duration::from_secs(10));
    Ok(())
}

#[tokio::test]
async fn run_rejects_bad_duration() -> TestResult {
    let dir = tempdir()?;
    let config = dir.path().join("shellexec.toml");
    std::fs::write(&config, "")?;

    let result = shellexec::run(CliArgs {
        duration: Some("later".to_string()),
        ..args(&config)
    })
    .await;
    assert!(result.is_err());
    Ok(())
}
