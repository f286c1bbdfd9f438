//! Per-chunk progress aggregation.
//!
//! The stream listener reports absolute byte counts per chunk. The
//! [`ProgressMultiplexer`] keeps one tracker per chunk index, created lazily
//! on the first event for that index, and forwards every accepted change to
//! a [`ProgressSink`] for rendering.
//!
//! ```text
//! StreamListener ──update(i, bytes, total)──► ProgressMultiplexer ──► ProgressSink
//!                                               │                      (indicatif bars,
//!                                               └── DashMap<i, tracker>  or nothing)
//! ```

mod multiplexer;
mod sink;

pub use multiplexer::{ChunkSnapshot, ProgressMultiplexer, UpdateOutcome};
pub use sink::{NullSink, ProgressSink};
