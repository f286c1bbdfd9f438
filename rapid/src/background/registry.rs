//! Factory registry and teardown.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::task::{BackgroundTask, TaskCloser, TaskContext, TaskError};

/// Builds one background task from the shared context.
pub type TaskFactory = Box<dyn Fn(&TaskContext) -> Box<dyn BackgroundTask> + Send + Sync>;

/// Handle to one spawned background task.
pub struct TaskHandle {
    name: String,
    closer: Option<Arc<dyn TaskCloser>>,
    join: JoinHandle<()>,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this task exposes a close capability.
    pub fn is_closable(&self) -> bool {
        self.closer.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Outcome of [`TaskRegistry::shutdown_all`].
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Tasks whose close succeeded.
    pub closed: usize,
    /// Tasks with no close capability.
    pub not_closable: usize,
    /// Close failures, by task name. Logged, never propagated.
    pub close_failures: Vec<(String, TaskError)>,
    /// Tasks that did not stop within the join timeout and were aborted.
    pub aborted: usize,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.close_failures.is_empty() && self.aborted == 0
    }
}

/// Ordered set of background task factories.
///
/// Filled once at startup by chaining [`register`](Self::register); there is
/// no way to add factories once the registry is in use.
#[derive(Default)]
pub struct TaskRegistry {
    factories: Vec<TaskFactory>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a factory.
    pub fn register<F>(mut self, factory: F) -> Self
    where
        F: Fn(&TaskContext) -> Box<dyn BackgroundTask> + Send + Sync + 'static,
    {
        self.factories.push(Box::new(factory));
        self
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Build and spawn one task per registered factory.
    ///
    /// Must be called from within a tokio runtime.
    pub fn create_all(&self, ctx: &TaskContext) -> Vec<TaskHandle> {
        self.factories
            .iter()
            .map(|factory| {
                let task = factory(ctx);
                let name = task.name().to_string();
                let closer = task.closer();
                debug!(task = %name, closable = closer.is_some(), "Starting background task");
                let join = tokio::spawn(task.run());
                TaskHandle { name, closer, join }
            })
            .collect()
    }

    /// Close every closable task, then wait for all of them to stop.
    ///
    /// Every closer is invoked regardless of other closers failing. Tasks
    /// still running after `join_timeout` are aborted.
    pub async fn shutdown_all(handles: Vec<TaskHandle>, join_timeout: Duration) -> ShutdownReport {
        let mut report = ShutdownReport::default();

        let closes = handles.iter().map(|handle| {
            let closer = handle.closer.clone();
            let name = handle.name.clone();
            async move {
                match closer {
                    Some(closer) => Some((name, closer.close().await)),
                    None => None,
                }
            }
        });

        for outcome in join_all(closes).await {
            match outcome {
                None => report.not_closable += 1,
                Some((name, Ok(()))) => {
                    debug!(task = %name, "Background task closed");
                    report.closed += 1;
                }
                Some((name, Err(e))) => {
                    warn!(task = %name, error = %e, "Failed to close background task");
                    report.close_failures.push((name, e));
                }
            }
        }

        for handle in handles {
            let TaskHandle { name, mut join, .. } = handle;
            match tokio::time::timeout(join_timeout, &mut join).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(task = %name, error = %e, "Background task ended abnormally"),
                Err(_) => {
                    warn!(task = %name, "Background task did not stop in time, aborting");
                    join.abort();
                    report.aborted += 1;
                }
            }
        }

        info!(
            closed = report.closed,
            failures = report.close_failures.len(),
            aborted = report.aborted,
            "Background tasks shut down"
        );
        report
    }
}
