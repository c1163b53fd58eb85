// src/engine/registry.rs

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::exec::{Task, TaskOrigin, TaskState};
use crate::types::Stage;

/// Point-in-time view of a registered task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub command: String,
    pub stage: Stage,
    pub background: bool,
    pub state: TaskState,
}

/// Background tasks started by one executor, in start order.
///
/// Tasks are registered by the stage that starts them and read by every later
/// checkpoint (`check`, `shutdown`, `post-process`), so the collection is
/// shared behind an async mutex. Clones refer to the same registry.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<Mutex<Vec<Task>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, task: Task) {
        self.tasks.lock().await.push(task);
    }

    /// Exclusive access for polling, killing and reconciling.
    pub async fn lock(&self) -> MutexGuard<'_, Vec<Task>> {
        self.tasks.lock().await
    }

    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }

    /// Number of tasks whose last observed state is `Running`.
    pub async fn running_count(&self) -> usize {
        self.tasks
            .lock()
            .await
            .iter()
            .filter(|t| t.is_running())
            .count()
    }

    /// Whether an instance declared at `origin` is still running.
    pub async fn has_running(&self, origin: TaskOrigin) -> bool {
        self.tasks
            .lock()
            .await
            .iter()
            .any(|t| t.origin() == origin && t.is_running())
    }

    pub async fn snapshot(&self) -> Vec<TaskSnapshot> {
        self.tasks
            .lock()
            .await
            .iter()
            .map(|t| TaskSnapshot {
                command: t.command().to_string(),
                stage: t.origin().stage,
                background: t.spec().background,
                state: t.state(),
            })
            .collect()
    }
}
