//! Foreground download session.
//!
//! A session drives one job from request to teardown:
//!
//! ```text
//! fetch ──► JobStore::set ──► create_all ──► start_download
//!                                                  │
//!                        Coordinator::wait ◄───────┘
//!                                │
//!         seal ──► shutdown_all ──► notify_stop (abnormal only) ──► close trackers
//! ```

mod download;
mod error;

pub use download::{startup_tasks, DownloadSession, SessionOutcome, TASK_JOIN_TIMEOUT};
pub use error::SessionError;
