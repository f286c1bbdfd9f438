//! Errors for requests to the download server.

use thiserror::Error;

/// Result type for server requests.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while talking to the download server.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The HTTP client could not be constructed.
    #[error("failed to create HTTP client: {0}")]
    Build(String),

    /// The request could not be sent or the connection failed.
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The request did not complete in time.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// The server answered with a non-success status.
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    /// The response body was not the expected shape.
    #[error("unexpected response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

impl ClientError {
    pub(crate) fn from_reqwest(url: &str, timeout_secs: u64, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            ClientError::Timeout {
                url: url.to_string(),
                timeout_secs,
            }
        } else {
            ClientError::Request {
                url: url.to_string(),
                source,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let err = ClientError::Status {
            url: "http://localhost:9999/fetch".to_string(),
            status: 502,
        };
        assert_eq!(
            err.to_string(),
            "http://localhost:9999/fetch returned status 502"
        );
    }

    #[test]
    fn test_timeout_display() {
        let err = ClientError::Timeout {
            url: "http://localhost:9999/stop/abc".to_string(),
            timeout_secs: 30,
        };
        assert!(err.to_string().contains("timed out after 30s"));
    }
}
