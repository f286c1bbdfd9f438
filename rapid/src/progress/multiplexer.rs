//! Chunk-indexed progress trackers.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use super::sink::ProgressSink;

/// Point-in-time copy of one chunk tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSnapshot {
    pub index: usize,
    pub current: u64,
    pub total: u64,
}

impl ChunkSnapshot {
    pub fn is_complete(&self) -> bool {
        self.current >= self.total
    }
}

/// What an [`update`](ProgressMultiplexer::update) call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// First event for the chunk; a tracker was created.
    Created,
    /// The tracker moved forward.
    Advanced,
    /// The value was not above the recorded one and was dropped.
    Ignored,
    /// Teardown has begun; the update was discarded.
    Sealed,
}

#[derive(Debug)]
struct ChunkTracker {
    total: u64,
    current: Mutex<u64>,
}

/// Concurrent map of chunk index to progress tracker.
///
/// Trackers are monotonic: a `downloaded` value below the recorded one is
/// ignored and values above the chunk size are clamped to it. Updates for
/// different chunks only share the map shard briefly while the tracker is
/// looked up; updates for the same chunk are serialized by the tracker's
/// own lock.
pub struct ProgressMultiplexer {
    trackers: DashMap<usize, Arc<ChunkTracker>>,
    /// Held shared by every update and exclusively by [`seal`](Self::seal),
    /// so no update can land after sealing returns.
    sealed: RwLock<bool>,
    sink: Arc<dyn ProgressSink>,
}

impl ProgressMultiplexer {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            trackers: DashMap::new(),
            sealed: RwLock::new(false),
            sink,
        }
    }

    /// Record that chunk `index` has `downloaded` of `total` bytes.
    ///
    /// `downloaded` is an absolute count, not an increment.
    pub fn update(&self, index: usize, downloaded: u64, total: u64) -> UpdateOutcome {
        let sealed = self.sealed.read();
        if *sealed {
            trace!(chunk = index, "Update after seal discarded");
            return UpdateOutcome::Sealed;
        }

        let mut created = false;
        let existing = self
            .trackers
            .get(&index)
            .map(|tracker| Arc::clone(tracker.value()));
        let tracker = match existing {
            Some(tracker) => tracker,
            None => {
                let entry = self.trackers.entry(index).or_insert_with(|| {
                    created = true;
                    Arc::new(ChunkTracker {
                        total,
                        current: Mutex::new(0),
                    })
                });
                Arc::clone(entry.value())
            }
        };

        let mut current = tracker.current.lock();
        let next = downloaded.min(tracker.total);
        let advanced = next > *current;
        if advanced {
            *current = next;
        } else if downloaded < *current {
            debug!(
                chunk = index,
                recorded = *current,
                received = downloaded,
                "Progress regression ignored"
            );
        }

        if created {
            debug!(chunk = index, total = tracker.total, "Chunk tracker created");
        }
        if created || advanced {
            self.sink.update(index, *current, tracker.total);
        }

        match (created, advanced) {
            (true, _) => UpdateOutcome::Created,
            (false, true) => UpdateOutcome::Advanced,
            (false, false) => UpdateOutcome::Ignored,
        }
    }

    /// Snapshot of one chunk.
    pub fn get(&self, index: usize) -> Option<ChunkSnapshot> {
        self.trackers.get(&index).map(|tracker| ChunkSnapshot {
            index,
            current: *tracker.current.lock(),
            total: tracker.total,
        })
    }

    /// Snapshot of every chunk, ordered by index.
    pub fn snapshot(&self) -> Vec<ChunkSnapshot> {
        let mut chunks: Vec<ChunkSnapshot> = self
            .trackers
            .iter()
            .map(|entry| ChunkSnapshot {
                index: *entry.key(),
                current: *entry.value().current.lock(),
                total: entry.value().total,
            })
            .collect();
        chunks.sort_by_key(|chunk| chunk.index);
        chunks
    }

    /// Bytes downloaded across all chunks.
    pub fn downloaded_bytes(&self) -> u64 {
        self.trackers
            .iter()
            .map(|entry| *entry.value().current.lock())
            .sum()
    }

    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    /// Stop accepting updates. Waits for in-flight updates to finish.
    pub fn seal(&self) {
        *self.sealed.write() = true;
    }

    pub fn is_sealed(&self) -> bool {
        *self.sealed.read()
    }

    /// Seal, drop every tracker and finish the sink.
    ///
    /// Returns the final state of the trackers that were dropped.
    pub fn close(&self) -> Vec<ChunkSnapshot> {
        self.seal();
        let chunks = self.snapshot();
        self.trackers.clear();
        self.sink.finish();
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullSink;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Sink that records every call.
    #[derive(Default)]
    struct RecordingSink {
        updates: Mutex<Vec<(usize, u64, u64)>>,
        finished: AtomicUsize,
    }

    impl ProgressSink for RecordingSink {
        fn update(&self, chunk: usize, current: u64, total: u64) {
            self.updates.lock().push((chunk, current, total));
        }

        fn finish(&self) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn multiplexer() -> ProgressMultiplexer {
        ProgressMultiplexer::new(Arc::new(NullSink))
    }

    #[test]
    fn test_first_update_creates_tracker() {
        let mux = multiplexer();

        assert_eq!(mux.update(0, 100, 500), UpdateOutcome::Created);

        let chunk = mux.get(0).unwrap();
        assert_eq!(chunk.current, 100);
        assert_eq!(chunk.total, 500);
        assert_eq!(mux.len(), 1);
    }

    #[test]
    fn test_update_sets_absolute_value() {
        let mux = multiplexer();
        mux.update(0, 100, 500);
        mux.update(0, 250, 500);
        mux.update(0, 400, 500);
        assert_eq!(mux.get(0).unwrap().current, 400);
    }

    #[test]
    fn test_regression_is_ignored() {
        let mux = multiplexer();
        mux.update(3, 300, 500);

        assert_eq!(mux.update(3, 200, 500), UpdateOutcome::Ignored);
        assert_eq!(mux.get(3).unwrap().current, 300);
    }

    #[test]
    fn test_value_clamped_to_total() {
        let mux = multiplexer();
        mux.update(1, 900, 500);
        assert_eq!(mux.get(1).unwrap().current, 500);
        assert!(mux.get(1).unwrap().is_complete());
    }

    #[test]
    fn test_total_fixed_at_creation() {
        let mux = multiplexer();
        mux.update(0, 10, 100);
        mux.update(0, 50, 1000);
        assert_eq!(mux.get(0).unwrap().total, 100);
    }

    #[test]
    fn test_sink_receives_created_and_advanced_only() {
        let sink = Arc::new(RecordingSink::default());
        let mux = ProgressMultiplexer::new(sink.clone());

        mux.update(0, 100, 500);
        mux.update(0, 100, 500);
        mux.update(0, 50, 500);
        mux.update(0, 500, 500);

        assert_eq!(
            *sink.updates.lock(),
            vec![(0, 100, 500), (0, 500, 500)]
        );
    }

    #[test]
    fn test_sealed_multiplexer_discards_updates() {
        let sink = Arc::new(RecordingSink::default());
        let mux = ProgressMultiplexer::new(sink.clone());
        mux.update(0, 100, 500);

        mux.seal();

        assert!(mux.is_sealed());
        assert_eq!(mux.update(0, 200, 500), UpdateOutcome::Sealed);
        assert_eq!(mux.update(1, 200, 500), UpdateOutcome::Sealed);
        assert_eq!(mux.get(0).unwrap().current, 100);
        assert!(mux.get(1).is_none());
        assert_eq!(sink.updates.lock().len(), 1);
    }

    #[test]
    fn test_close_drops_trackers_and_finishes_sink() {
        let sink = Arc::new(RecordingSink::default());
        let mux = ProgressMultiplexer::new(sink.clone());
        mux.update(1, 500, 500);
        mux.update(0, 250, 500);

        let chunks = mux.close();

        assert_eq!(
            chunks,
            vec![
                ChunkSnapshot { index: 0, current: 250, total: 500 },
                ChunkSnapshot { index: 1, current: 500, total: 500 },
            ]
        );
        assert!(mux.is_empty());
        assert_eq!(sink.finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_downloaded_bytes_sums_chunks() {
        let mux = multiplexer();
        mux.update(0, 500, 500);
        mux.update(1, 120, 500);
        assert_eq!(mux.downloaded_bytes(), 620);
    }

    #[test]
    fn test_concurrent_updates_to_distinct_chunks() {
        let mux = Arc::new(multiplexer());
        let threads: Vec<_> = (0..8)
            .map(|index| {
                let mux = Arc::clone(&mux);
                std::thread::spawn(move || {
                    for bytes in 1..=1000u64 {
                        mux.update(index, bytes, 1000);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(mux.len(), 8);
        for chunk in mux.snapshot() {
            assert_eq!(chunk.current, 1000);
        }
    }

    proptest! {
        #[test]
        fn prop_strictly_increasing_ends_at_last(mut values in prop::collection::vec(1u64..10_000, 1..50)) {
            values.sort_unstable();
            values.dedup();
            let mux = multiplexer();
            for v in &values {
                mux.update(0, *v, 10_000);
            }
            prop_assert_eq!(mux.get(0).unwrap().current, *values.last().unwrap());
        }

        #[test]
        fn prop_interleaving_distinct_chunks_commutes(
            a in prop::collection::vec(0u64..1000, 1..20),
            b in prop::collection::vec(0u64..1000, 1..20),
            order in prop::collection::vec(any::<bool>(), 40),
        ) {
            let sequential = multiplexer();
            for v in &a { sequential.update(0, *v, 1000); }
            for v in &b { sequential.update(1, *v, 1000); }

            let interleaved = multiplexer();
            let (mut ia, mut ib) = (a.iter(), b.iter());
            for pick_a in order {
                let next = if pick_a { ia.next().map(|v| (0, v)) } else { ib.next().map(|v| (1, v)) };
                if let Some((chunk, v)) = next {
                    interleaved.update(chunk, *v, 1000);
                }
            }
            for v in ia { interleaved.update(0, *v, 1000); }
            for v in ib { interleaved.update(1, *v, 1000); }

            prop_assert_eq!(sequential.snapshot(), interleaved.snapshot());
        }
    }
}
