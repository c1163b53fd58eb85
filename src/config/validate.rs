// src/config/validate.rs

use std::collections::BTreeMap;
use std::path::Path;

use crate::config::model::{
    EnvValue, RawServiceConfig, ServiceConfig, Settings, SettingsSection, TaskItem,
};
use crate::engine::DEFAULT_CHECK_INTERVAL;
use crate::errors::{Result, ShellExecError};
use crate::exec::TaskSpec;
use crate::types::{Stage, parse_duration};

impl TryFrom<RawServiceConfig> for ServiceConfig {
    type Error = ShellExecError;

    fn try_from(raw: RawServiceConfig) -> std::result::Result<Self, Self::Error> {
        let settings = validate_settings(&raw.settings)?;

        let mut stages = BTreeMap::new();
        for stage in Stage::ALL {
            let specs = raw
                .items(stage)
                .iter()
                .enumerate()
                .map(|(index, item)| task_spec(stage, index, item))
                .collect::<Result<Vec<_>>>()?;
            stages.insert(stage, specs);
        }

        Ok(ServiceConfig::new_unchecked(settings, stages))
    }
}

fn validate_settings(section: &SettingsSection) -> Result<Settings> {
    let check_interval = match section.check_interval.as_deref() {
        None => DEFAULT_CHECK_INTERVAL,
        Some(s) => {
            let interval = parse_duration(s).map_err(|e| {
                ShellExecError::ConfigError(format!("[settings].check-interval: {e}"))
            })?;
            if interval.is_zero() {
                return Err(ShellExecError::ConfigError(
                    "[settings].check-interval must be greater than zero".to_string(),
                ));
            }
            interval
        }
    };

    Ok(Settings {
        cwd: section.cwd.clone(),
        env: stringify_env(&section.env),
        check_interval,
    })
}

fn task_spec(stage: Stage, index: usize, item: &TaskItem) -> Result<TaskSpec> {
    let location = || format!("{stage}[{index}]");

    if item.command().trim().is_empty() {
        return Err(ShellExecError::ConfigError(format!(
            "{}: command must not be empty",
            location()
        )));
    }

    let task = match item {
        TaskItem::Command(command) => return Ok(TaskSpec::new(command.clone())),
        TaskItem::Detailed(task) => task,
    };

    for (key, target) in [("out", &task.out), ("err", &task.err)] {
        if target.as_deref().is_some_and(is_blank_path) {
            return Err(ShellExecError::ConfigError(format!(
                "{}: `{key}` must be a file path when present",
                location()
            )));
        }
    }

    Ok(TaskSpec {
        command: task.command.clone(),
        background: task.background,
        ignore_failure: task.ignore_failure,
        stdout_target: task.out.clone(),
        stderr_target: task.err.clone(),
        env: stringify_env(&task.env),
        working_dir: task.cwd.clone(),
    })
}

fn stringify_env(env: &BTreeMap<String, EnvValue>) -> BTreeMap<String, String> {
    env.iter()
        .map(|(key, value)| (key.clone(), value.to_string()))
        .collect()
}

fn is_blank_path(path: &Path) -> bool {
    path.as_os_str().to_string_lossy().trim().is_empty()
}
