//! Client configuration.
//!
//! [`ClientConfig`] is the resolved configuration handed to the session. It
//! is built from defaults, then the optional INI file ([`ConfigFile`]), then
//! whatever the command line overrides.

mod file;

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

pub use file::{config_file_path, ConfigFile};

/// Default download server address.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:9999";

/// Default client identifier used in download and stream paths.
pub const DEFAULT_CLIENT_ID: &str = "cli";

pub use crate::job::DEFAULT_PROVIDER;

/// Default timeout for HTTP requests to the server.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on the polite stream close.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Default interval between keepalive pings on the stream.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file exists but could not be read or parsed.
    #[error("failed to read config file {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    /// A key holds a value of the wrong shape.
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// A server or stream URL cannot be used.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Resolved configuration for one client process.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the download server (`http` or `https`).
    pub server_url: String,

    /// Explicit stream endpoint. Derived from `server_url` when unset.
    pub stream_url: Option<String>,

    /// Identifier of this client in download and stream paths.
    pub client_id: String,

    /// Provider requested when the command line names none.
    pub provider: String,

    /// Timeout for each HTTP request (fetch, download trigger, stop).
    pub request_timeout: Duration,

    /// Upper bound on sending the close frame during teardown.
    pub close_timeout: Duration,

    /// Interval between keepalive pings on the stream.
    pub keepalive_interval: Duration,

    /// Directory for log files.
    pub log_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            stream_url: None,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            provider: DEFAULT_PROVIDER.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            log_dir: default_log_dir(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from defaults overlaid with the values present in `file`.
    pub fn from_file(file: &ConfigFile) -> Self {
        let mut config = Self::default();
        if let Some(url) = &file.server.url {
            config.server_url = url.clone();
        }
        if let Some(url) = &file.server.stream_url {
            config.stream_url = Some(url.clone());
        }
        if let Some(id) = &file.server.client_id {
            config.client_id = id.clone();
        }
        if let Some(secs) = file.server.timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(provider) = &file.download.provider {
            config.provider = provider.clone();
        }
        if let Some(secs) = file.download.keepalive_secs {
            config.keepalive_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = file.download.close_timeout_ms {
            config.close_timeout = Duration::from_millis(ms);
        }
        if let Some(dir) = &file.logging.directory {
            config.log_dir = dir.clone();
        }
        config
    }

    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    pub fn with_stream_url(mut self, url: impl Into<String>) -> Self {
        self.stream_url = Some(url.into());
        self
    }

    pub fn with_client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = id.into();
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    pub fn with_log_dir(mut self, dir: PathBuf) -> Self {
        self.log_dir = dir;
        self
    }

    /// Check that the server URL is usable and the stream endpoint resolves.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.server_url).map_err(|e| ConfigError::InvalidUrl {
            url: self.server_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: self.server_url.clone(),
                reason: "server URL must use http or https".to_string(),
            });
        }
        if self.client_id.is_empty() || self.client_id.contains('/') {
            return Err(ConfigError::InvalidValue {
                key: "server.client_id".to_string(),
                value: self.client_id.clone(),
                reason: "must be non-empty and contain no '/'".to_string(),
            });
        }
        self.stream_endpoint().map(|_| ())
    }

    fn base(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }

    /// `POST` endpoint that creates a job.
    pub fn fetch_url(&self) -> String {
        format!("{}/fetch", self.base())
    }

    /// `GET` endpoint that starts the transfer of `job_id`.
    pub fn download_url(&self, job_id: &str) -> String {
        format!("{}/{}/download/{}", self.base(), self.client_id, job_id)
    }

    /// `PUT` endpoint that aborts `job_id`.
    pub fn stop_url(&self, job_id: &str) -> String {
        format!("{}/stop/{}", self.base(), job_id)
    }

    /// WebSocket endpoint for progress events.
    pub fn stream_endpoint(&self) -> Result<String, ConfigError> {
        if let Some(url) = &self.stream_url {
            return Ok(url.clone());
        }

        let base = self.base();
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            return Err(ConfigError::InvalidUrl {
                url: self.server_url.clone(),
                reason: "cannot derive stream URL from a non-http scheme".to_string(),
            });
        };
        Ok(format!("{}/ws/{}", ws_base, self.client_id))
    }
}

fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("rapid")
        .join("logs")
}
