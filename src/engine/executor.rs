// src/engine/executor.rs

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;

use tracing::{Level, debug, info, warn};

use crate::config::ServiceConfig;
use crate::engine::HostContext;
use crate::engine::policy;
use crate::engine::registry::{TaskRegistry, TaskSnapshot};
use crate::engine::stage::TaskSet;
use crate::errors::{Result, ShellExecError};
use crate::exec::TaskSpec;
use crate::exec::task::KILL_GRACE;
use crate::types::Stage;

/// Runs the configured shell tasks across the host lifecycle.
///
/// The host calls the entry points in order: `prepare`, `startup`, `check`
/// any number of times, `shutdown`, `post_process`. Blocking-task failures
/// surface from the call that ran them; background-task failures surface at
/// `shutdown` or `post_process`.
///
/// Dropping the executor (once no registry clone is left) kills any task
/// still running.
#[derive(Debug)]
pub struct ShellExecutor {
    ctx: HostContext,
    stages: BTreeMap<Stage, TaskSet>,
    registry: TaskRegistry,
}

impl ShellExecutor {
    pub fn new(ctx: HostContext) -> Self {
        Self {
            ctx,
            stages: BTreeMap::new(),
            registry: TaskRegistry::new(),
        }
    }

    /// Executor with one task set per stage from a validated config.
    pub fn from_config(cfg: &ServiceConfig, ctx: HostContext) -> Self {
        Stage::ALL
            .into_iter()
            .fold(Self::new(ctx), |executor, stage| {
                executor.with_stage(stage, cfg.tasks(stage).to_vec())
            })
    }

    /// Replace the tasks declared for `stage`.
    pub fn with_stage(mut self, stage: Stage, specs: Vec<TaskSpec>) -> Self {
        self.stages.insert(stage, TaskSet::new(stage, specs));
        self
    }

    pub fn context(&self) -> &HostContext {
        &self.ctx
    }

    pub fn check_interval(&self) -> Duration {
        self.ctx.check_interval
    }

    pub fn task_set(&self, stage: Stage) -> Option<&TaskSet> {
        self.stages.get(&stage)
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Current state of the background tasks still tracked: running ones,
    /// unreported failures, and whatever the last teardown stopped.
    pub async fn tasks(&self) -> Vec<TaskSnapshot> {
        self.registry.snapshot().await
    }

    pub async fn prepare(&self) -> Result<()> {
        self.run_stage(Stage::Prepare).await
    }

    pub async fn startup(&self) -> Result<()> {
        self.run_stage(Stage::Startup).await
    }

    /// Poll every background task, then run the check-stage tasks.
    ///
    /// Background outcomes are only observed here, never raised.
    pub async fn check(&self) -> Result<()> {
        self.poll_background().await;
        self.run_stage(Stage::Check).await
    }

    /// Run shutdown tasks, kill whatever is still running, then surface
    /// background failures.
    ///
    /// Running tasks are killed even when a shutdown task failed.
    pub async fn shutdown(&self) -> Result<()> {
        self.teardown(Stage::Shutdown).await
    }

    /// Final reconciliation: post-process tasks run, leftovers are killed,
    /// and every failure not reported yet is raised.
    pub async fn post_process(&self) -> Result<()> {
        self.teardown(Stage::PostProcess).await
    }

    async fn run_stage(&self, stage: Stage) -> Result<()> {
        let Some(set) = self.stages.get(&stage).filter(|set| !set.is_empty()) else {
            debug!(%stage, "no tasks configured for stage");
            return Ok(());
        };

        info!(%stage, tasks = set.specs().len(), "stage started");
        let result = set.run(&self.ctx, &self.registry).await;
        match &result {
            Ok(()) => debug!(%stage, "stage finished"),
            Err(e) => warn!(%stage, error = %e, "stage aborted"),
        }
        result
    }

    async fn teardown(&self, stage: Stage) -> Result<()> {
        let stage_result = self.run_stage(stage).await;
        self.terminate_running().await;
        stage_result?;

        let mut tasks = self.registry.lock().await;
        policy::apply_to_all(tasks.iter_mut())
    }

    /// Poll running background tasks, then drop the ones with nothing left
    /// to report so a restarting check-stage task does not grow the registry.
    async fn poll_background(&self) {
        let mut tasks = self.registry.lock().await;
        for task in tasks.iter_mut().filter(|t| t.is_running()) {
            if let Err(e) = task.poll().await {
                warn!(command = %task.command(), error = %e, "failed to poll task process");
            }
        }

        tasks.retain_mut(|task| {
            if !task.is_settled() {
                return true;
            }
            // Settled tasks never fail here; ignored failures get logged.
            if let Err(e) = policy::apply_failure_policy(task) {
                warn!(command = %task.command(), error = %e, "unexpected failure of settled task");
            }
            false
        });
    }

    /// Stop every task still running.
    ///
    /// All process groups get SIGTERM first and share one `KILL_GRACE`
    /// window before the stragglers are killed.
    async fn terminate_running(&self) {
        let mut tasks = self.registry.lock().await;
        let mut stopping = Vec::new();

        for (index, task) in tasks.iter_mut().enumerate() {
            if !task.is_running() {
                continue;
            }
            match task.refresh().await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    warn!(command = %task.command(), error = %e, "failed to poll task process")
                }
            }

            let notice = ShellExecError::StillRunningAtTeardown {
                command: task.command().to_string(),
            };
            task.sink().log(Level::INFO, &notice.to_string());
            task.request_stop();
            stopping.push(index);
        }

        let deadline = Instant::now() + KILL_GRACE;
        for index in stopping {
            let task = &mut tasks[index];
            let grace = deadline.saturating_duration_since(Instant::now());
            if let Err(e) = task.kill_within(grace).await {
                warn!(command = %task.command(), error = %e, "failed to kill task process");
            }
        }
    }
}
