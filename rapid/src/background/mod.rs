//! Background task lifecycle.
//!
//! Background tasks run alongside the foreground command for the whole
//! session. The [`TaskRegistry`] is filled once at startup with factories,
//! starts one task per factory on its own tokio task, and tears them all
//! down at the end.
//!
//! # Lifecycle
//!
//! ```text
//! TaskRegistry::new().register(f1).register(f2)     (startup, once)
//!        │
//!        ▼
//! create_all(ctx) ──► [TaskHandle, TaskHandle]        (each task spawned)
//!        │
//!        ▼  coordinator cancelled
//! shutdown_all(handles)
//!        ├── close() every task that has a closer, failures logged
//!        └── join every task, abort stragglers
//! ```

mod registry;
mod task;

pub use registry::{ShutdownReport, TaskFactory, TaskHandle, TaskRegistry};
pub use task::{BackgroundTask, BoxFuture, Readiness, TaskCloser, TaskContext, TaskError};
