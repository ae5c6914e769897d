//! Utility functions for title normalization, logging helpers, timestamps,
//! and file system checks.

use chrono::Local;
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

/// Normalize a post title into its dedup key.
///
/// Trims and collapses internal whitespace; the forum renders the same post
/// with varying padding depending on which container it appears in.
pub fn normalize_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate a string for logging purposes.
///
/// Counts characters, not bytes, so CJK titles never split mid-codepoint.
/// Longer strings get an ellipsis and a byte-count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((byte_idx, _)) => {
            format!("{}…(+{} bytes)", &s[..byte_idx], s.len() - byte_idx)
        }
    }
}

/// Capture instant in the `%Y-%m-%d %H:%M:%S` form stored on each post.
pub fn crawl_stamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Compact local timestamp used in output file names.
pub fn file_stamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then performs a write test by creating
/// and immediately deleting a probe file.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
