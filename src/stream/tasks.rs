use std::collections::BTreeMap;
use std::future::Future;

use futures::StreamExt;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use crate::core::{KeystoneError, Result};
use crate::proto::{ResponseStream, Task, TaskStatus, TaskUpdate};

/// Outcome of handling one task: result data, or the failure reported back.
pub type TaskHandlerResult = anyhow::Result<BTreeMap<String, String>>;

/// Bidirectional task stream: tasks arrive from the server, updates flow back.
pub struct TaskStream {
    tasks: ResponseStream<Task>,
    updates: mpsc::Sender<TaskUpdate>,
}

impl TaskStream {
    pub(crate) fn new(tasks: ResponseStream<Task>, updates: mpsc::Sender<TaskUpdate>) -> Self {
        Self { tasks, updates }
    }

    /// Sends a progress or status update for a task.
    pub async fn send_update(&self, update: TaskUpdate) -> Result<()> {
        self.updates
            .send(update)
            .await
            .map_err(|_| KeystoneError::StreamClosed("task updates".to_string()))
    }

    /// Handles tasks until the server ends the stream or `shutdown` resolves.
    ///
    /// The handler's result is sent back as a `Completed` or `Failed` update.
    /// Dropping the stream closes the update half.
    pub async fn run<H, F>(self, mut handler: H, shutdown: impl Future<Output = ()>) -> Result<()>
    where
        H: FnMut(Task) -> F,
        F: Future<Output = TaskHandlerResult>,
    {
        let Self { mut tasks, updates } = self;
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Task stream stopped by caller");
                    return Ok(());
                }
                next = tasks.next() => match next {
                    None => {
                        info!("Task stream ended");
                        return Ok(());
                    }
                    Some(Err(err)) if err.is_graceful() => {
                        info!("Task stream closed: {}", err);
                        return Ok(());
                    }
                    Some(Err(err)) => {
                        error!("Task stream failed: {}", err);
                        return Err(err.into());
                    }
                    Some(Ok(task)) => {
                        debug!("Task {} ({}) attempt {}", task.id, task.task_type, task.attempt);
                        let task_id = task.id.clone();
                        let update = match handler(task).await {
                            Ok(data) => TaskUpdate {
                                task_id,
                                status: TaskStatus::Completed,
                                data,
                                ..TaskUpdate::default()
                            },
                            Err(err) => {
                                warn!("Task {} failed: {:#}", task_id, err);
                                TaskUpdate {
                                    task_id,
                                    status: TaskStatus::Failed,
                                    message: format!("{:#}", err),
                                    ..TaskUpdate::default()
                                }
                            }
                        };
                        if updates.send(update).await.is_err() {
                            return Err(KeystoneError::StreamClosed("task updates".to_string()));
                        }
                    }
                },
            }
        }
    }
}

impl std::fmt::Debug for TaskStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStream")
            .field("updates_closed", &self.updates.is_closed())
            .finish_non_exhaustive()
    }
}
