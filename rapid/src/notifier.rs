//! Best-effort remote stop.
//!
//! When the client exits before the server reports completion, the server
//! would otherwise keep transferring a job nobody is watching. The
//! [`StopNotifier`] asks it to abort the active job, once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::client::ServerClient;
use crate::job::JobStore;

/// What [`StopNotifier::notify_stop`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// The store held no job.
    NoActiveJob,
    /// The server accepted the stop request for this job id.
    Sent(String),
    /// The request failed; the error was logged.
    Failed { job_id: String, reason: String },
    /// A previous call already ran.
    AlreadyNotified,
}

impl StopOutcome {
    /// Whether a request actually reached the wire.
    pub fn was_attempted(&self) -> bool {
        matches!(self, StopOutcome::Sent(_) | StopOutcome::Failed { .. })
    }
}

/// Sends the stop request for the active job at most once.
pub struct StopNotifier {
    client: Arc<ServerClient>,
    store: JobStore,
    notified: AtomicBool,
}

impl StopNotifier {
    pub fn new(client: Arc<ServerClient>, store: JobStore) -> Self {
        Self {
            client,
            store,
            notified: AtomicBool::new(false),
        }
    }

    /// Ask the server to stop the active job.
    ///
    /// Never fails: errors are logged and reported in the outcome.
    pub async fn notify_stop(&self) -> StopOutcome {
        if self.notified.swap(true, Ordering::SeqCst) {
            debug!("Stop already sent, skipping");
            return StopOutcome::AlreadyNotified;
        }

        let Some(job_id) = self.store.active_id() else {
            debug!("No active job, nothing to stop");
            return StopOutcome::NoActiveJob;
        };

        match self.client.stop(&job_id).await {
            Ok(()) => {
                info!(job_id = %job_id, "Asked server to stop job");
                StopOutcome::Sent(job_id)
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Failed to stop job on server");
                StopOutcome::Failed {
                    job_id,
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::job::Job;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn job(id: &str) -> Job {
        Job {
            id: id.to_string(),
            ..Job::default()
        }
    }

    fn notifier(server: &MockServer, store: JobStore) -> StopNotifier {
        let config = ClientConfig::default().with_server_url(server.uri());
        StopNotifier::new(Arc::new(ServerClient::new(config).unwrap()), store)
    }

    #[tokio::test]
    async fn test_no_active_job_is_noop() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = notifier(&server, JobStore::new()).notify_stop().await;
        assert_eq!(outcome, StopOutcome::NoActiveJob);
        assert!(!outcome.was_attempted());
    }

    #[tokio::test]
    async fn test_sends_exactly_once() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/stop/abc123"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = JobStore::new();
        store.set(job("abc123"));
        let notifier = notifier(&server, store);

        assert_eq!(
            notifier.notify_stop().await,
            StopOutcome::Sent("abc123".to_string())
        );
        assert_eq!(notifier.notify_stop().await, StopOutcome::AlreadyNotified);
    }

    #[tokio::test]
    async fn test_server_error_is_reported_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/stop/abc123"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let store = JobStore::new();
        store.set(job("abc123"));

        match notifier(&server, store).notify_stop().await {
            StopOutcome::Failed { job_id, .. } => assert_eq!(job_id, "abc123"),
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
