//! Rendering capability for chunk progress.

/// Receives chunk progress for display.
///
/// Calls for one chunk arrive in the order the multiplexer applied them;
/// calls for different chunks may arrive concurrently.
pub trait ProgressSink: Send + Sync {
    /// A chunk reached `current` of `total` bytes.
    fn update(&self, chunk: usize, current: u64, total: u64);

    /// No further updates will follow. Called once on teardown.
    fn finish(&self) {}
}

/// Sink that renders nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn update(&self, _chunk: usize, _current: u64, _total: u64) {}
}
