//! Stream listener errors.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

use crate::config::ConfigError;

/// Errors that end the stream listener.
#[derive(Debug, Error)]
pub enum StreamError {
    /// No usable stream endpoint could be resolved.
    #[error("invalid stream endpoint: {0}")]
    Endpoint(#[from] ConfigError),

    /// The stream endpoint could not be dialed.
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },

    /// The stream handshake did not finish in time.
    #[error("connecting to {url} timed out after {timeout_secs}s")]
    ConnectTimeout { url: String, timeout_secs: u64 },

    /// Reading from the connection failed.
    #[error("failed to read from stream: {0}")]
    Read(#[source] tungstenite::Error),

    /// A frame was not a valid progress event.
    #[error("failed to decode progress event: {0}")]
    Decode(#[from] serde_json::Error),

    /// Sending a keepalive ping failed.
    #[error("keepalive failed: {0}")]
    Keepalive(#[source] tungstenite::Error),

    /// The server ended the stream before reporting completion.
    #[error("stream closed before the job completed")]
    ClosedBeforeDone,
}
