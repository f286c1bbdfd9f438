//! Process-wide cancellation coordinator.
//!
//! The [`Coordinator`] is created once per process and cloned into every
//! background task and the foreground command. Three producers may end the
//! run: the user (interrupt signal), the server (job finished), and the
//! transport (stream failure). The first trigger wins and is latched; later
//! triggers are ignored.
//!
//! # Example
//!
//! ```ignore
//! let coordinator = Coordinator::new();
//!
//! let listener = coordinator.clone();
//! tokio::spawn(async move {
//!     // ... job finished
//!     listener.trigger(CancelReason::RemoteDone);
//! });
//!
//! let reason = coordinator.wait().await;
//! ```

use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Why the run is ending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelReason {
    /// The user interrupted the process.
    UserInterrupt,
    /// The server reported the job as finished.
    RemoteDone,
    /// The stream connection failed or delivered garbage.
    TransportError,
}

impl CancelReason {
    /// Whether the server should be asked to stop the job.
    ///
    /// A finished job cannot be stopped; every other exit leaves the job
    /// running server-side in an unknown or incomplete state.
    pub fn requires_stop(self) -> bool {
        !matches!(self, CancelReason::RemoteDone)
    }

    /// Process exit code for a run ending with this reason.
    pub fn exit_code(self) -> i32 {
        match self {
            CancelReason::RemoteDone => 0,
            CancelReason::UserInterrupt => 130,
            CancelReason::TransportError => 1,
        }
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::UserInterrupt => write!(f, "interrupted by user"),
            CancelReason::RemoteDone => write!(f, "download complete"),
            CancelReason::TransportError => write!(f, "connection to server failed"),
        }
    }
}

struct Inner {
    token: CancellationToken,
    reason: OnceLock<CancelReason>,
}

/// Latched, first-trigger-wins cancellation shared across the process.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("reason", &self.reason())
            .finish()
    }
}

impl Coordinator {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                token: CancellationToken::new(),
                reason: OnceLock::new(),
            }),
        }
    }

    /// Request cancellation.
    ///
    /// Returns `true` if this call won the race and set the reason. The
    /// reason is recorded before the token fires, so anyone woken by
    /// [`cancelled`](Self::cancelled) observes it.
    pub fn trigger(&self, reason: CancelReason) -> bool {
        if self.inner.reason.set(reason).is_ok() {
            info!(reason = ?reason, "Cancellation triggered");
            self.inner.token.cancel();
            true
        } else {
            debug!(
                reason = ?reason,
                latched = ?self.reason(),
                "Cancellation already latched, ignoring trigger"
            );
            false
        }
    }

    /// The latched reason, once triggered.
    pub fn reason(&self) -> Option<CancelReason> {
        self.inner.reason.get().copied()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Resolves once any trigger has fired.
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await;
    }

    /// Wait for cancellation and return the winning reason.
    pub async fn wait(&self) -> CancelReason {
        self.cancelled().await;
        // The reason is always set before the token is cancelled.
        self.reason().unwrap_or(CancelReason::TransportError)
    }

    /// Token that fires with the coordinator, for code that only needs to observe.
    pub fn child_token(&self) -> CancellationToken {
        self.inner.token.child_token()
    }
}
