//! CLI error type and exit codes.

use std::fmt;

use rapid::client::ClientError;
use rapid::config::ConfigError;
use rapid::session::SessionError;

/// Errors surfaced to the user by a command.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be loaded or is invalid.
    Config(String),
    /// The log file could not be opened.
    Logging(std::io::Error),
    /// The async runtime could not be started.
    Runtime(std::io::Error),
    /// A command-line argument was malformed.
    InvalidArgument(String),
    /// A direct request to the server failed.
    Request(ClientError),
    /// The download session ended before a job existed.
    Session(SessionError),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Session(e) => e.exit_code(),
            _ => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Logging(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start runtime: {}", e),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Request(e) => write!(f, "{}", e),
            CliError::Session(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Logging(e) | CliError::Runtime(e) => Some(e),
            CliError::Request(e) => Some(e),
            CliError::Session(e) => Some(e),
            CliError::Config(_) | CliError::InvalidArgument(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<ClientError> for CliError {
    fn from(e: ClientError) -> Self {
        CliError::Request(e)
    }
}

impl From<SessionError> for CliError {
    fn from(e: SessionError) -> Self {
        CliError::Session(e)
    }
}
