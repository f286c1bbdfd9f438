//! Human-readable formatting helpers.

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

/// Format a byte count as KB, MB or GB with two decimals.
///
/// Sizes below one megabyte are always shown in kilobytes, so a 512 byte
/// file reads as `0.50 KB`.
pub fn format_size(bytes: u64) -> String {
    if bytes < MB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    }
}
