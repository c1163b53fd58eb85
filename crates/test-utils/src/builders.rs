#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use shellexec::config::{EnvValue, RawServiceConfig, ServiceConfig, TaskConfig, TaskItem};
use shellexec::engine::{HostContext, ShellExecutor};
use shellexec::exec::TaskSpec;
use shellexec::types::Stage;

use crate::recording_sink::RecordingSink;

/// Builder for `TaskSpec`.
pub struct TaskSpecBuilder {
    spec: TaskSpec,
}

impl TaskSpecBuilder {
    pub fn new(command: &str) -> Self {
        Self {
            spec: TaskSpec::new(command),
        }
    }

    pub fn background(mut self, val: bool) -> Self {
        self.spec.background = val;
        self
    }

    pub fn ignore_failure(mut self, val: bool) -> Self {
        self.spec.ignore_failure = val;
        self
    }

    pub fn out(mut self, path: impl Into<PathBuf>) -> Self {
        self.spec.stdout_target = Some(path.into());
        self
    }

    pub fn err(mut self, path: impl Into<PathBuf>) -> Self {
        self.spec.stderr_target = Some(path.into());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.spec.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spec.working_dir = Some(dir.into());
        self
    }

    pub fn build(self) -> TaskSpec {
        self.spec
    }
}

/// Builder for `ServiceConfig`, going through the same validation as a file.
pub struct ServiceConfigBuilder {
    config: RawServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawServiceConfig::default(),
        }
    }

    pub fn with_task(mut self, stage: Stage, item: impl Into<TaskItem>) -> Self {
        self.config.items_mut(stage).push(item.into());
        self
    }

    pub fn with_env(mut self, key: &str, value: EnvValue) -> Self {
        self.config.settings.env.insert(key.to_string(), value);
        self
    }

    pub fn with_check_interval(mut self, interval: &str) -> Self {
        self.config.settings.check_interval = Some(interval.to_string());
        self
    }

    pub fn build(self) -> ServiceConfig {
        ServiceConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ServiceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Table-form task entry for `ServiceConfigBuilder::with_task`.
pub fn task_config(command: &str, background: bool, ignore_failure: bool) -> TaskConfig {
    let mut task = TaskConfig::new(command);
    task.background = background;
    task.ignore_failure = ignore_failure;
    task
}

/// Host context rooted at `cwd` that records into `sink`.
pub fn host_context(cwd: &Path, sink: &RecordingSink) -> HostContext {
    HostContext::new(cwd).with_sink(Arc::new(sink.clone()))
}

/// Executor whose stages hold the given specs, recording into a fresh sink.
pub fn executor_with(
    cwd: &Path,
    stages: Vec<(Stage, Vec<TaskSpec>)>,
) -> (ShellExecutor, RecordingSink) {
    let sink = RecordingSink::new();
    let executor = stages
        .into_iter()
        .fold(ShellExecutor::new(host_context(cwd, &sink)), |executor, (stage, specs)| {
            executor.with_stage(stage, specs)
        });
    (executor, sink)
}
