//! Background task trait and shared context.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::cancellation::Coordinator;
use crate::config::ClientConfig;
use crate::job::JobStore;
use crate::progress::ProgressMultiplexer;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors raised while tearing a background task down.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The task's resources could not be released cleanly.
    #[error("failed to close {task}: {reason}")]
    Close { task: String, reason: String },

    /// Closing took longer than allowed.
    #[error("closing {task} timed out after {timeout_ms}ms")]
    Timeout { task: String, timeout_ms: u64 },
}

/// Latched signal that a task can now observe server events.
///
/// Once marked it stays marked; waiters that arrive late return at once.
#[derive(Debug, Clone, Default)]
pub struct Readiness {
    token: CancellationToken,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_ready(&self) {
        self.token.cancel();
    }

    pub fn is_ready(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once [`mark_ready`](Self::mark_ready) has been called.
    pub async fn ready(&self) {
        self.token.cancelled().await;
    }
}

/// Everything a task factory may hand to the task it builds.
#[derive(Clone)]
pub struct TaskContext {
    /// Process-wide cancellation; tasks observe it and may trigger it.
    pub coordinator: Coordinator,
    /// Active job slot.
    pub store: JobStore,
    /// Progress trackers fed by the stream.
    pub progress: Arc<ProgressMultiplexer>,
    /// Resolved client configuration.
    pub config: ClientConfig,
    /// Marked once the progress stream is connected.
    pub stream_ready: Readiness,
}

/// Releases resources held by a running task.
///
/// Implementations must return in bounded time; teardown waits on them.
pub trait TaskCloser: Send + Sync {
    fn close(&self) -> BoxFuture<'_, Result<(), TaskError>>;
}

/// A named unit of work that runs until it stops itself or is cancelled.
///
/// A task that holds releasable resources (a network connection) exposes
/// them through [`closer`](Self::closer); tasks without any return `None`.
pub trait BackgroundTask: Send + 'static {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// The close capability, if this task has one.
    ///
    /// Taken before the task is spawned so teardown can reach it while
    /// `run` still owns the task.
    fn closer(&self) -> Option<Arc<dyn TaskCloser>>;

    /// Run until finished or cancelled.
    fn run(self: Box<Self>) -> BoxFuture<'static, ()>;
}
