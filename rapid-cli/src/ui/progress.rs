//! indicatif-backed chunk progress.

use std::time::Duration;

use dashmap::DashMap;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use rapid::progress::ProgressSink;

const BAR_TEMPLATE: &str =
    "{prefix:>10.bold} [{bar:40.cyan/blue}] {bytes:>10}/{total_bytes:<10} {bytes_per_sec:>12}";

const SPINNER_TEMPLATE: &str = "{spinner:.yellow} {msg}";

/// One byte-counting bar per chunk, created on the chunk's first update.
pub struct ChunkBars {
    multi: MultiProgress,
    bars: DashMap<usize, ProgressBar>,
    style: ProgressStyle,
}

impl ChunkBars {
    /// Bars drawn to stderr.
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// Bars that track state without drawing.
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: DashMap::new(),
            style,
        }
    }

    fn bar(&self, chunk: usize, total: u64) -> ProgressBar {
        self.bars
            .entry(chunk)
            .or_insert_with(|| {
                let bar = self.multi.add(ProgressBar::new(total));
                bar.set_style(self.style.clone());
                bar.set_prefix(format!("Chunk {}", chunk));
                bar
            })
            .clone()
    }

    #[cfg(test)]
    fn position(&self, chunk: usize) -> Option<(u64, Option<u64>, bool)> {
        self.bars
            .get(&chunk)
            .map(|bar| (bar.position(), bar.length(), bar.is_finished()))
    }
}

impl Default for ChunkBars {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ChunkBars {
    fn update(&self, chunk: usize, current: u64, total: u64) {
        let bar = self.bar(chunk, total);
        bar.set_length(total);
        bar.set_position(current);
        if total > 0 && current >= total {
            bar.finish();
        }
    }

    fn finish(&self) {
        for bar in self.bars.iter() {
            if !bar.is_finished() {
                bar.abandon();
            }
        }
    }
}

/// Spinner shown while the server accepts the request.
pub fn fetch_spinner(url: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template(SPINNER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "),
    );
    spinner.set_message(format!("Fetching {}", url));
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_created_on_first_update() {
        let bars = ChunkBars::hidden();
        assert!(bars.position(0).is_none());

        bars.update(0, 250, 500);
        assert_eq!(bars.position(0), Some((250, Some(500), false)));
    }

    #[test]
    fn test_bar_finishes_at_total() {
        let bars = ChunkBars::hidden();
        bars.update(1, 100, 500);
        bars.update(1, 500, 500);
        assert_eq!(bars.position(1), Some((500, Some(500), true)));
    }

    #[test]
    fn test_finish_stops_every_bar() {
        let bars = ChunkBars::hidden();
        bars.update(0, 10, 500);
        bars.update(1, 20, 500);
        bars.finish();
        assert!(bars.position(0).unwrap().2);
        assert!(bars.position(1).unwrap().2);
    }

    #[test]
    fn test_quiet_spinner_is_hidden() {
        assert!(fetch_spinner("http://example.com/file.bin", true).is_hidden());
    }
}
