// src/engine/stage.rs

use tracing::debug;

use crate::engine::HostContext;
use crate::engine::policy::apply_failure_policy;
use crate::engine::registry::TaskRegistry;
use crate::errors::Result;
use crate::exec::{Task, TaskOrigin, TaskSpec};
use crate::types::Stage;

/// The ordered task specs declared for one lifecycle stage.
#[derive(Debug, Clone)]
pub struct TaskSet {
    stage: Stage,
    specs: Vec<TaskSpec>,
}

impl TaskSet {
    pub fn new(stage: Stage, specs: Vec<TaskSpec>) -> Self {
        Self { stage, specs }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn specs(&self) -> &[TaskSpec] {
        &self.specs
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Execute the stage's tasks in declaration order.
    ///
    /// Blocking tasks are awaited and checked immediately: a failure that is
    /// not ignored stops the stage before the next task starts. Background
    /// tasks are started, registered, and left running. In the repeatable
    /// `check` stage a background task is not started again while its
    /// previous instance is still alive.
    pub async fn run(&self, ctx: &HostContext, registry: &TaskRegistry) -> Result<()> {
        debug!(stage = %self.stage, tasks = self.specs.len(), "running stage tasks");

        for (index, spec) in self.specs.iter().enumerate() {
            let origin = TaskOrigin {
                stage: self.stage,
                index,
            };

            if spec.background && self.stage == Stage::Check && registry.has_running(origin).await {
                debug!(command = %spec.command, "previous check-stage instance still running");
                continue;
            }

            let mut task = Task::new(spec.clone(), origin, ctx.sink.clone());
            task.start(&ctx.env, &ctx.cwd)?;

            if spec.background {
                registry.register(task).await;
                continue;
            }

            task.await_completion().await?;
            apply_failure_policy(&mut task)?;
        }

        Ok(())
    }
}
