//! Download job model.
//!
//! A [`Job`] is the server's descriptor for one chunked download, returned by
//! the fetch request. The [`JobStore`] holds the single job this process is
//! following so the stream listener can clear it on completion and the stop
//! notifier can read it on an early exit.

mod store;
mod types;

pub use store::JobStore;
pub use types::{Cookie, FetchRequest, Job, DEFAULT_PROVIDER};
