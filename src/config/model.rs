// src/config/model.rs

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::HostContext;
use crate::exec::TaskSpec;
use crate::sink::LogSink;
use crate::types::Stage;

/// Service configuration as read from a TOML file.
///
/// ```toml
/// prepare = ["ls .."]
/// startup = [{ command = "sleep 10 && echo 111", background = true }]
/// check = [{ command = "dmesg | grep nvidia", "ignore-failure" = true }, "pwd"]
///
/// [settings]
/// check-interval = "1s"
///
/// [settings.env]
/// VAR = 1
/// ```
///
/// Stage keys hold arrays, so they must precede any `[table]` header.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawServiceConfig {
    #[serde(default)]
    pub settings: SettingsSection,

    #[serde(default)]
    pub prepare: Vec<TaskItem>,

    #[serde(default)]
    pub startup: Vec<TaskItem>,

    #[serde(default)]
    pub check: Vec<TaskItem>,

    #[serde(default)]
    pub shutdown: Vec<TaskItem>,

    #[serde(default)]
    pub post_process: Vec<TaskItem>,
}

impl RawServiceConfig {
    pub fn items(&self, stage: Stage) -> &[TaskItem] {
        match stage {
            Stage::Prepare => &self.prepare,
            Stage::Startup => &self.startup,
            Stage::Check => &self.check,
            Stage::Shutdown => &self.shutdown,
            Stage::PostProcess => &self.post_process,
        }
    }

    pub fn items_mut(&mut self, stage: Stage) -> &mut Vec<TaskItem> {
        match stage {
            Stage::Prepare => &mut self.prepare,
            Stage::Startup => &mut self.startup,
            Stage::Check => &mut self.check,
            Stage::Shutdown => &mut self.shutdown,
            Stage::PostProcess => &mut self.post_process,
        }
    }
}

/// `[settings]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SettingsSection {
    /// Base working directory; relative paths resolve against the config
    /// file's directory. Defaults to the process working directory.
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Variables every task gets on top of the inherited environment.
    #[serde(default)]
    pub env: BTreeMap<String, EnvValue>,

    /// How often the host runs `check` (e.g. `"500ms"`, `"1s"`).
    #[serde(default)]
    pub check_interval: Option<String>,
}

/// A stage entry: either a bare command line or a full table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TaskItem {
    Command(String),
    Detailed(TaskConfig),
}

impl TaskItem {
    pub fn command(&self) -> &str {
        match self {
            TaskItem::Command(command) => command,
            TaskItem::Detailed(task) => &task.command,
        }
    }
}

impl From<&str> for TaskItem {
    fn from(command: &str) -> Self {
        TaskItem::Command(command.to_string())
    }
}

impl From<TaskConfig> for TaskItem {
    fn from(task: TaskConfig) -> Self {
        TaskItem::Detailed(task)
    }
}

/// Table form of a stage entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TaskConfig {
    pub command: String,

    #[serde(default)]
    pub background: bool,

    #[serde(default)]
    pub ignore_failure: bool,

    /// File for stdout; omitted means the log.
    #[serde(default)]
    pub out: Option<PathBuf>,

    /// File for stderr; omitted means the log.
    #[serde(default)]
    pub err: Option<PathBuf>,

    #[serde(default)]
    pub env: BTreeMap<String, EnvValue>,

    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

impl TaskConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            background: false,
            ignore_failure: false,
            out: None,
            err: None,
            env: BTreeMap::new(),
            cwd: None,
        }
    }
}

/// Environment values may be written as any TOML scalar.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl fmt::Display for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvValue::String(s) => f.write_str(s),
            EnvValue::Integer(i) => write!(f, "{i}"),
            EnvValue::Float(x) => write!(f, "{x}"),
            EnvValue::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// Validated host settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub check_interval: Duration,
}

/// Validated configuration: host settings plus task specs per stage.
///
/// Only constructible through `TryFrom<RawServiceConfig>`.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub settings: Settings,
    stages: BTreeMap<Stage, Vec<TaskSpec>>,
}

impl ServiceConfig {
    pub(crate) fn new_unchecked(settings: Settings, stages: BTreeMap<Stage, Vec<TaskSpec>>) -> Self {
        Self { settings, stages }
    }

    /// Tasks declared for `stage`, in declaration order.
    pub fn tasks(&self, stage: Stage) -> &[TaskSpec] {
        self.stages.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn task_count(&self) -> usize {
        self.stages.values().map(Vec::len).sum()
    }

    /// Host context for these settings.
    ///
    /// A relative `cwd` resolves against `base_dir`.
    pub fn host_context(&self, base_dir: &Path, sink: Arc<dyn LogSink>) -> HostContext {
        let cwd = match &self.settings.cwd {
            Some(cwd) => base_dir.join(cwd),
            None => base_dir.to_path_buf(),
        };
        HostContext::new(cwd)
            .with_env(self.settings.env.clone())
            .with_sink(sink)
            .with_check_interval(self.settings.check_interval)
    }
}
