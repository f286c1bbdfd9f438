//! Session errors.

use thiserror::Error;

use crate::cancellation::CancelReason;
use crate::client::ClientError;
use crate::config::ConfigError;

/// Errors that end a session before a job exists.
///
/// Once a job has been created every failure becomes a cancellation
/// trigger instead and is reported through the session outcome.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The fetch request failed.
    #[error(transparent)]
    Request(#[from] ClientError),

    /// Cancellation fired while the fetch request was in flight.
    #[error("cancelled before the job was created ({0})")]
    Cancelled(CancelReason),
}

impl SessionError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionError::Cancelled(reason) => reason.exit_code(),
            _ => 1,
        }
    }
}
