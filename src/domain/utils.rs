//! Small helpers shared by the managers: sizes and download progress

use std::path::Path;
use walkdir::WalkDir;

/// Total size in bytes of every file below `path`; unreadable entries count as zero.
pub fn directory_size(path: &Path) -> u64 {
    if !path.is_dir() {
        return 0;
    }
    WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}

/// Human readable size with one decimal, e.g. `1.5 GB`
pub fn format_bytes(bytes: u64) -> String {
    const SUFFIXES: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut number = bytes as f64;
    let mut counter = 0;
    while (number / 1024.0).round() >= 1.0 && counter < SUFFIXES.len() - 1 {
        number /= 1024.0;
        counter += 1;
    }
    format!("{:.1} {}", number, SUFFIXES[counter])
}

/// Tracks download progress in completed 10 % steps
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: Option<u64>,
    received: u64,
    last_reported: u8,
}

impl ProgressTracker {
    /// Unknown or zero totals never report.
    pub fn new(total: Option<u64>) -> Self {
        Self {
            total: total.filter(|t| *t > 0),
            received: 0,
            last_reported: 0,
        }
    }

    /// Record `bytes` more and return the new 10 % step if one was crossed.
    pub fn advance(&mut self, bytes: u64) -> Option<u8> {
        self.received += bytes;
        let total = self.total?;
        let percent = (self.received.saturating_mul(100) / total).min(100) as u8;
        let step = percent / 10 * 10;
        if step > self.last_reported {
            self.last_reported = step;
            Some(step)
        } else {
            None
        }
    }

    pub fn received(&self) -> u64 {
        self.received
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0.0 B");
        assert_eq!(format_bytes(500), "500.0 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.0 GB");
    }

    #[test]
    fn test_progress_reports_each_step_once() {
        let mut tracker = ProgressTracker::new(Some(1000));
        assert_eq!(tracker.advance(50), None);
        assert_eq!(tracker.advance(60), Some(10));
        assert_eq!(tracker.advance(10), None);
        assert_eq!(tracker.advance(300), Some(40));
        assert_eq!(tracker.advance(580), Some(100));
        assert_eq!(tracker.received(), 1000);
    }

    #[test]
    fn test_progress_without_length_is_silent() {
        let mut tracker = ProgressTracker::new(None);
        assert_eq!(tracker.advance(1_000_000), None);
        let mut zero = ProgressTracker::new(Some(0));
        assert_eq!(zero.advance(10), None);
    }

    #[test]
    fn test_directory_size() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), vec![0u8; 100]).unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("b.bin"), vec![0u8; 23]).unwrap();

        assert_eq!(directory_size(dir.path()), 123);
        assert_eq!(directory_size(&dir.path().join("missing")), 0);
    }
}
