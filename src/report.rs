use crate::error::{JarStripError, Result};
use crate::filter::{ExcludedEntry, FilterProgress};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterReport {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub summary: FilterSummary,
    pub excluded: Vec<ExcludedEntry>,
    pub patterns: Vec<String>,
    pub atomic_write: bool,
    pub dry_run: bool,
    pub filter_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSummary {
    pub entries_total: usize,
    pub entries_retained: usize,
    pub entries_excluded: usize,
    pub bytes_retained: u64,
    pub duration: Duration,
}

impl From<&FilterProgress> for FilterSummary {
    fn from(progress: &FilterProgress) -> Self {
        Self {
            entries_total: progress.entries_total,
            entries_retained: progress.entries_retained,
            entries_excluded: progress.entries_excluded(),
            bytes_retained: progress.bytes_retained,
            duration: progress.elapsed(),
        }
    }
}

impl FilterReport {
    pub fn new(input: &Path, output: Option<&Path>, progress: &FilterProgress) -> Self {
        Self {
            input: input.to_path_buf(),
            output: output.map(Path::to_path_buf),
            summary: FilterSummary::from(progress),
            excluded: progress.excluded.clone(),
            patterns: Vec::new(),
            atomic_write: false,
            dry_run: output.is_none(),
            filter_time: Utc::now(),
        }
    }

    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_atomic_write(mut self, atomic: bool) -> Self {
        self.atomic_write = atomic;
        self
    }

    /// Patterns that never matched an entry.
    pub fn unused_patterns(&self) -> Vec<&str> {
        self.patterns
            .iter()
            .filter(|pattern| !self.excluded.iter().any(|e| &e.pattern == *pattern))
            .map(String::as_str)
            .collect()
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json_content =
            serde_json::to_string_pretty(self).map_err(|e| JarStripError::Config {
                message: format!("Failed to serialize report to JSON: {}", e),
            })?;

        fs::write(path.as_ref(), json_content).map_err(JarStripError::Io)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_progress() -> FilterProgress {
        let mut progress = FilterProgress::new(3);
        progress.record_retained(10);
        progress.record_retained(20);
        progress.record_excluded("lib/dep.so", "^lib/");
        progress
    }

    #[test]
    fn test_summary_from_progress() {
        let report = FilterReport::new(
            Path::new("in.jar"),
            Some(Path::new("out.jar")),
            &sample_progress(),
        );

        assert_eq!(report.summary.entries_total, 3);
        assert_eq!(report.summary.entries_retained, 2);
        assert_eq!(report.summary.entries_excluded, 1);
        assert_eq!(report.summary.bytes_retained, 30);
        assert!(!report.dry_run);
    }

    #[test]
    fn test_dry_run_has_no_output() {
        let report = FilterReport::new(Path::new("in.jar"), None, &sample_progress());
        assert!(report.dry_run);
        assert!(report.output.is_none());
    }

    #[test]
    fn test_unused_patterns() {
        let report = FilterReport::new(Path::new("in.jar"), None, &sample_progress())
            .with_patterns(["^lib/", r"\.dll$"]);

        assert_eq!(report.unused_patterns(), vec![r"\.dll$"]);
    }

    #[test]
    fn test_save_json() {
        let temp_dir = TempDir::new().unwrap();
        let report_path = temp_dir.path().join("report.json");

        let report = FilterReport::new(
            Path::new("in.jar"),
            Some(Path::new("out.jar")),
            &sample_progress(),
        )
        .with_atomic_write(true);
        report.save_json(&report_path).unwrap();

        let content = fs::read_to_string(&report_path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["summary"]["entries_excluded"], 1);
        assert_eq!(value["excluded"][0]["name"], "lib/dep.so");
        assert_eq!(value["atomic_write"], true);
    }
}
