//! Terminal rendering for downloads.
//!
//! # Module Structure
//!
//! - `progress` - per-chunk progress bars and the fetch spinner

pub mod progress;

pub use progress::{fetch_spinner, ChunkBars};
