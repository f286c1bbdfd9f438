//! Shared setup for commands: configuration, logging, runtime and signals.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use rapid::cancellation::{CancelReason, Coordinator};
use rapid::config::{ClientConfig, ConfigFile};
use rapid::logging::{init_logging, LoggingGuard};
use tokio::runtime::Runtime;
use tracing::info;

use crate::error::CliError;

/// Environment variable naming the server base URL.
pub const SERVER_ENV: &str = "RAPID_SERVER";

/// Global command-line overrides.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub server: Option<String>,
    pub client_id: Option<String>,
    pub verbose: bool,
}

/// Everything a command needs before it talks to the server.
///
/// Owns the log writer guard; dropping the runner flushes the log.
pub struct CliRunner {
    config: ClientConfig,
    runtime: Runtime,
    logging: LoggingGuard,
}

impl CliRunner {
    pub fn new(overrides: &Overrides) -> Result<Self, CliError> {
        let file = ConfigFile::load()?;
        let config = resolve_config(&file, std::env::var(SERVER_ENV).ok(), overrides);
        config.validate()?;

        let logging = init_logging(&config.log_dir, overrides.verbose).map_err(CliError::Logging)?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(CliError::Runtime)?;

        Ok(Self {
            config,
            runtime,
            logging,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Log the startup line for `command`.
    pub fn log_startup(&self, command: &str) {
        info!(
            version = rapid::VERSION,
            command = command,
            server = %self.config.server_url,
            client_id = %self.config.client_id,
            log_file = %self.logging.path().display(),
            "Rapid starting"
        );
    }

    /// Run `future` to completion on the runner's runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Route Ctrl+C into `coordinator`.
    ///
    /// The first interrupt triggers a graceful teardown. A second one exits
    /// immediately with status 130.
    pub fn install_interrupt_handler(&self, coordinator: Coordinator) -> Result<(), CliError> {
        let interrupts = AtomicUsize::new(0);
        ctrlc::set_handler(move || {
            if interrupts.fetch_add(1, Ordering::SeqCst) == 0 {
                eprintln!();
                eprintln!("Interrupted, stopping download... (press Ctrl+C again to force)");
                coordinator.trigger(CancelReason::UserInterrupt);
            } else {
                eprintln!("Forced exit");
                std::process::exit(CancelReason::UserInterrupt.exit_code());
            }
        })
        .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))
    }
}

/// Layer configuration: flags over environment over file over defaults.
pub fn resolve_config(
    file: &ConfigFile,
    env_server: Option<String>,
    overrides: &Overrides,
) -> ClientConfig {
    let mut config = ClientConfig::from_file(file);

    if let Some(server) = env_server.filter(|s| !s.is_empty()) {
        config = config.with_server_url(server);
    }
    if let Some(server) = &overrides.server {
        config = config.with_server_url(server.clone());
    }
    if let Some(client_id) = &overrides.client_id {
        config = config.with_client_id(client_id.clone());
    }
    config
}
