//! One job from fetch to teardown.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::error::SessionError;
use crate::background::{Readiness, TaskContext, TaskRegistry};
use crate::cancellation::{CancelReason, Coordinator};
use crate::client::ServerClient;
use crate::config::ClientConfig;
use crate::job::{FetchRequest, Job, JobStore};
use crate::listener::{stream_listener_factory, LISTENER_TASK_NAME};
use crate::notifier::{StopNotifier, StopOutcome};
use crate::progress::{ChunkSnapshot, ProgressMultiplexer, ProgressSink};

/// How long teardown waits for each background task to stop after closing.
pub const TASK_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Registry holding every background task a download runs alongside.
pub fn startup_tasks() -> TaskRegistry {
    TaskRegistry::new().register(stream_listener_factory)
}

/// Terminal state of an observed job.
#[derive(Debug)]
pub struct SessionOutcome {
    /// The job as returned by the server.
    pub job: Job,
    /// Trigger that ended the run.
    pub reason: CancelReason,
    /// Final per-chunk progress, ordered by chunk index.
    pub chunks: Vec<ChunkSnapshot>,
    /// Result of the stop request, when one was due.
    pub stop_request: Option<StopOutcome>,
    /// Background tasks whose close failed or timed out.
    pub close_failures: usize,
}

impl SessionOutcome {
    pub fn exit_code(&self) -> i32 {
        self.reason.exit_code()
    }

    pub fn is_complete(&self) -> bool {
        self.reason == CancelReason::RemoteDone
    }

    /// Bytes reported across all chunks.
    pub fn downloaded_bytes(&self) -> u64 {
        self.chunks.iter().map(|c| c.current).sum()
    }
}

/// Foreground driver for a single download.
pub struct DownloadSession {
    client: Arc<ServerClient>,
    coordinator: Coordinator,
    store: JobStore,
    progress: Arc<ProgressMultiplexer>,
    registry: TaskRegistry,
    notifier: StopNotifier,
    join_timeout: Duration,
}

impl DownloadSession {
    /// Create a session with the standard background tasks.
    pub fn new(
        config: ClientConfig,
        sink: Arc<dyn ProgressSink>,
        coordinator: Coordinator,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let client = Arc::new(ServerClient::new(config)?);
        let store = JobStore::new();

        Ok(Self {
            notifier: StopNotifier::new(Arc::clone(&client), store.clone()),
            client,
            coordinator,
            store,
            progress: Arc::new(ProgressMultiplexer::new(sink)),
            registry: startup_tasks(),
            join_timeout: TASK_JOIN_TIMEOUT,
        })
    }

    /// Replace the background tasks started by [`observe`](Self::observe).
    pub fn with_registry(mut self, registry: TaskRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn progress(&self) -> &Arc<ProgressMultiplexer> {
        &self.progress
    }

    pub fn client(&self) -> &ServerClient {
        &self.client
    }

    /// Ask the server for a job and make it the active one.
    pub async fn fetch(&self, request: &FetchRequest) -> Result<Job, SessionError> {
        let job = tokio::select! {
            biased;
            reason = self.coordinator.wait() => return Err(SessionError::Cancelled(reason)),
            result = self.client.fetch(request) => result?,
        };

        if job.chunk_count == 0 {
            warn!(job_id = %job.id, "Server reported zero chunks; progress may stay empty");
        }
        self.store.set(job.clone());
        Ok(job)
    }

    /// Follow `job` until any cancellation trigger fires, then tear down.
    pub async fn observe(&self, job: Job) -> SessionOutcome {
        let ctx = TaskContext {
            coordinator: self.coordinator.clone(),
            store: self.store.clone(),
            progress: Arc::clone(&self.progress),
            config: self.client.config().clone(),
            stream_ready: Readiness::new(),
        };
        let handles = self.registry.create_all(&ctx);
        debug!(tasks = handles.len(), job_id = %job.id, "Background tasks started");

        // The server starts emitting progress as soon as the download is
        // triggered, so the stream must be connected first.
        if !handles.iter().any(|h| h.name() == LISTENER_TASK_NAME) {
            ctx.stream_ready.mark_ready();
        }

        tokio::select! {
            biased;
            _ = self.coordinator.cancelled() => {
                debug!("Cancelled before the progress stream connected");
            }
            _ = ctx.stream_ready.ready() => {
                self.trigger_download(&job).await;
            }
        }

        let reason = self.coordinator.wait().await;
        info!(job_id = %job.id, reason = %reason, "Tearing down");

        self.progress.seal();
        let report = TaskRegistry::shutdown_all(handles, self.join_timeout).await;

        let stop_request = if reason.requires_stop() {
            Some(self.notifier.notify_stop().await)
        } else {
            None
        };

        let chunks = self.progress.close();
        SessionOutcome {
            job,
            reason,
            chunks,
            stop_request,
            close_failures: report.close_failures.len() + report.aborted,
        }
    }

    /// Ask the server to start transferring `job`.
    ///
    /// Returns once the request completes or any trigger fires, whichever
    /// comes first. The request may legitimately stay open for the whole
    /// transfer.
    async fn trigger_download(&self, job: &Job) {
        tokio::select! {
            biased;
            _ = self.coordinator.cancelled() => {
                debug!("Cancelled before the download request completed");
            }
            result = self.client.start_download(&job.id) => {
                if let Err(e) = result {
                    error!(job_id = %job.id, error = %e, "Failed to start download");
                    self.coordinator.trigger(CancelReason::TransportError);
                }
            }
        }
    }

    /// Fetch a job and follow it to the end.
    pub async fn run(&self, request: &FetchRequest) -> Result<SessionOutcome, SessionError> {
        let job = self.fetch(request).await?;
        Ok(self.observe(job).await)
    }
}
