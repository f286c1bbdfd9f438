//! Rapid - client core for remote chunked downloads
//!
//! This library asks a download server to fetch a file, then follows the
//! server-side transfer over a streaming connection, rendering one progress
//! tracker per chunk until the job completes, the user interrupts, or the
//! connection fails.
//!
//! # Architecture
//!
//! ```text
//!  DownloadSession ──fetch──► ServerClient ──► POST /fetch
//!        │
//!        ├── JobStore (single active job)
//!        │
//!        ├── TaskRegistry ──create_all──► StreamListener ──► ProgressMultiplexer ──► ProgressSink
//!        │        │                              │
//!        │        └──shutdown_all──► close()     └── trigger(RemoteDone | TransportError)
//!        │
//!        ├── Coordinator ◄── trigger(UserInterrupt) from the CLI
//!        │
//!        └── StopNotifier ──► PUT /stop/{id} (abnormal exits only)
//! ```

pub mod background;
pub mod cancellation;
pub mod client;
pub mod config;
pub mod format;
pub mod job;
pub mod listener;
pub mod logging;
pub mod notifier;
pub mod progress;
pub mod session;

/// Version of the rapid library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
