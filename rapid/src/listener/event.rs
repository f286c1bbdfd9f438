//! Progress event frames.

use serde::Deserialize;

/// One update pushed by the server.
///
/// Field names follow the server (`id`, `index`, `size`); the longer
/// `jobId`, `chunkIndex` and `chunkSize` spellings are accepted too. Every
/// field defaults, so a bare `{"done": true}` is a valid completion frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "id", alias = "jobId", default)]
    pub job_id: String,

    /// Zero-based chunk index.
    #[serde(rename = "index", alias = "chunkIndex", default)]
    pub chunk_index: usize,

    /// Absolute bytes downloaded for this chunk.
    #[serde(default)]
    pub downloaded: u64,

    /// Server-computed percentage. Informational only.
    #[serde(default)]
    pub progress: f64,

    /// Size of this chunk in bytes.
    #[serde(rename = "size", alias = "chunkSize", default)]
    pub chunk_size: u64,

    /// The whole job has finished.
    #[serde(default)]
    pub done: bool,
}

impl ProgressEvent {
    /// Decode a frame payload.
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Whether this event concerns `job_id`. Events without an id match any job.
    pub fn belongs_to(&self, job_id: &str) -> bool {
        self.job_id.is_empty() || self.job_id == job_id
    }
}
