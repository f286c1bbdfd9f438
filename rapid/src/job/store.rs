//! Single-slot store for the active job.

use std::sync::Arc;

use parking_lot::Mutex;

use super::Job;

/// Holds at most one active [`Job`].
///
/// Cloning the store shares the slot. The stream listener clears it when the
/// server reports completion; the stop notifier reads it during shutdown.
#[derive(Debug, Clone, Default)]
pub struct JobStore {
    slot: Arc<Mutex<Option<Job>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `job`, replacing any previous one.
    pub fn set(&self, job: Job) {
        *self.slot.lock() = Some(job);
    }

    /// Copy of the active job, if any.
    pub fn get(&self) -> Option<Job> {
        self.slot.lock().clone()
    }

    /// Remove and return the active job.
    pub fn clear(&self) -> Option<Job> {
        self.slot.lock().take()
    }

    /// Id of the active job, if any.
    pub fn active_id(&self) -> Option<String> {
        self.slot.lock().as_ref().map(|job| job.id.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str) -> Job {
        Job {
            id: id.to_string(),
            name: String::new(),
            location: String::new(),
            size: 0,
            filetype: String::new(),
            url: String::new(),
            resumable: false,
            chunk_count: 1,
            download_provider: String::new(),
        }
    }

    #[test]
    fn test_store_starts_empty() {
        let store = JobStore::new();
        assert!(store.is_empty());
        assert!(store.get().is_none());
    }

    #[test]
    fn test_set_overwrites_previous_job() {
        let store = JobStore::new();
        store.set(job("first"));
        store.set(job("second"));
        assert_eq!(store.active_id().as_deref(), Some("second"));
    }

    #[test]
    fn test_clear_empties_shared_slot() {
        let store = JobStore::new();
        let reader = store.clone();
        store.set(job("abc123"));

        let cleared = store.clear();

        assert_eq!(cleared.map(|j| j.id), Some("abc123".to_string()));
        assert!(reader.is_empty());
        assert!(store.clear().is_none());
    }
}
