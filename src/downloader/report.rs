//! End-of-run summary and failure export.

use chrono::Local;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::model::FailureRecord;

/// Outcome of one batch run.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub success: bool,
    pub message: String,
    pub elapsed: Duration,
    /// Tracks written by a provider during this run
    pub downloaded: usize,
    /// Tracks already on disk
    pub skipped: usize,
    pub failures: Vec<FailureRecord>,
}

impl BatchReport {
    pub fn elapsed_display(&self) -> String {
        format_seconds(self.elapsed.as_secs_f64())
    }
}

/// `Xd Xh Xm Xs`, omitting zero units and always showing at least seconds.
pub fn format_seconds(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let mins = (total % 3_600) / 60;
    let secs = total % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if mins > 0 {
        parts.push(format!("{}m", mins));
    }
    if secs > 0 || parts.is_empty() {
        parts.push(format!("{}s", secs));
    }
    parts.join(" ")
}

/// Loop delay for humans: `45 minutes`, `2 hours 5 minutes`, `1 days 0 hours 30 minutes`.
pub fn format_minutes(minutes: u64) -> String {
    if minutes < 60 {
        format!("{} minutes", minutes)
    } else if minutes < 1_440 {
        format!("{} hours {} minutes", minutes / 60, minutes % 60)
    } else {
        format!(
            "{} days {} hours {} minutes",
            minutes / 1_440,
            (minutes % 1_440) / 60,
            minutes % 60
        )
    }
}

#[derive(Serialize)]
struct FailureFile<'a> {
    generated_at: String,
    source: &'a str,
    failures: &'a [FailureRecord],
}

/// Write the failed tracks of a run as pretty JSON.
///
/// Uses a temp file and rename so a crash never leaves half a file.
pub fn write_failures(
    path: &Path,
    source: &str,
    failures: &[FailureRecord],
) -> std::io::Result<PathBuf> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let document = FailureFile {
        generated_at: Local::now().to_rfc3339(),
        source,
        failures,
    };
    let json = serde_json::to_string_pretty(&document)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let temp = path.with_extension("json.tmp");
    std::fs::write(&temp, json)?;
    std::fs::rename(&temp, path)?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(0.0), "0s");
        assert_eq!(format_seconds(59.6), "1m");
        assert_eq!(format_seconds(61.0), "1m 1s");
        assert_eq!(format_seconds(3_600.0), "1h");
        assert_eq!(format_seconds(90_061.0), "1d 1h 1m 1s");
    }

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(45), "45 minutes");
        assert_eq!(format_minutes(125), "2 hours 5 minutes");
        assert_eq!(format_minutes(1_470), "1 days 0 hours 30 minutes");
    }

    #[test]
    fn test_write_failures() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reports").join("failed.json");
        let failures = vec![FailureRecord {
            title: "Song".into(),
            artists: "A, B".into(),
            error: "HTTP 404: Not Found".into(),
        }];

        write_failures(&path, "https://open.spotify.com/album/x", &failures).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["source"], "https://open.spotify.com/album/x");
        assert_eq!(value["failures"][0]["error"], "HTTP 404: Not Found");
        assert!(value["generated_at"].as_str().unwrap().contains('T'));
        assert!(!path.with_extension("json.tmp").exists());
    }
}
