//! Utility functions for timestamps, number formatting, logging and file system checks.
//!
//! This module provides helper functions used throughout the crate:
//! - W3C datetime formatting for index `<lastmod>` values
//! - Thousands separators for status lines
//! - String truncation for log previews
//! - File system validation for output directories

use chrono::{DateTime, Utc};
use itertools::Itertools;
use std::fs;
use std::path::Path;
use tracing::{info, instrument};

use crate::errors::{Result, SitemapError};

/// Format a UTC instant as `YYYY-MM-DDTHH:MM:SS+00:00`.
///
/// # Examples
///
/// ```ignore
/// let t = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
/// assert_eq!(w3c_timestamp(t), "2025-01-02T03:04:05+00:00");
/// ```
pub fn w3c_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S+00:00").to_string()
}

/// Group digits in threes with commas (`1234567` -> `"1,234,567"`).
pub fn format_thousands(n: u64) -> String {
    let digits = n.to_string();
    let first = digits.len() % 3;
    let mut groups = Vec::with_capacity(digits.len() / 3 + 1);
    if first > 0 {
        groups.push(&digits[..first]);
    }
    groups.extend(
        digits.as_bytes()[first..]
            .chunks(3)
            .filter_map(|c| std::str::from_utf8(c).ok()),
    );
    groups.into_iter().join(",")
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` bytes (on a char boundary) with an ellipsis
/// and byte count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and removes a probe file.
///
/// # Errors
///
/// Returns [`SitemapError::Io`] if the directory cannot be created or written.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn ensure_writable_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| SitemapError::io(path, e))?;

    let probe_path = path.join("..__probe_write__");
    match fs::File::create(&probe_path) {
        Ok(_) => {
            let _ = fs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(SitemapError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_w3c_timestamp() {
        let t = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(w3c_timestamp(t), "2025-01-02T03:04:05+00:00");
    }

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1000), "1,000");
        assert_eq!(format_thousands(50_000), "50,000");
        assert_eq!(format_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        let result = truncate_for_log("ééé", 3);
        assert!(result.starts_with('é'));
    }

    #[test]
    fn test_ensure_writable_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("public").join("sitemaps");
        ensure_writable_dir(&nested).unwrap();
        assert!(nested.is_dir());
        assert!(!nested.join("..__probe_write__").exists());
    }
}
