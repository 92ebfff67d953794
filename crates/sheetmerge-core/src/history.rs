//! Export history
//!
//! Records every export so a user can see what was written, when, and from
//! which sheets.

use crate::error::{Error, Result};
use crate::export::ExportFormat;
use crate::recipe::RunReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default history file name, created next to the exported file
pub const DEFAULT_HISTORY_FILE: &str = "sheetmerge-history.json";

/// A record of one export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// When the export happened
    pub timestamp: DateTime<Utc>,
    /// File that was written
    pub output: PathBuf,
    /// Format written
    pub format: ExportFormat,
    /// Data rows written
    pub rows: usize,
    /// Columns written
    pub columns: usize,
    /// Sheets that took part in the merge
    pub sources: Vec<String>,
}

impl HistoryEntry {
    /// Create an entry stamped with the current time
    pub fn from_report(report: &RunReport) -> Self {
        Self {
            timestamp: Utc::now(),
            output: report.output.clone(),
            format: report.format,
            rows: report.rows,
            columns: report.columns,
            sources: report.sources.clone(),
        }
    }
}

/// History file containing all exports, oldest first
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HistoryFile {
    /// Entries in the order they were recorded
    pub entries: Vec<HistoryEntry>,
}

impl HistoryFile {
    /// Create a new empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Default history location for an export destination
    pub fn default_path_for(output: &Path) -> PathBuf {
        output
            .parent()
            .map(|dir| dir.join(DEFAULT_HISTORY_FILE))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_FILE))
    }

    /// Load history from a file, or create empty if not exists
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save history to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Add an entry to the history
    pub fn add_entry(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    /// Entries that wrote the given file
    pub fn entries_for(&self, output: &Path) -> Vec<&HistoryEntry> {
        self.entries.iter().filter(|e| e.output == output).collect()
    }

    /// The most recent entry
    pub fn last_entry(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// Get total number of entries
    pub fn total_entries(&self) -> usize {
        self.entries.len()
    }
}

/// Append one report to the history file at `path`
pub fn record_export<P: AsRef<Path>>(path: P, report: &RunReport) -> Result<HistoryEntry> {
    let path = path.as_ref();
    let mut history = HistoryFile::load(path)?;
    let entry = HistoryEntry::from_report(report);
    history.add_entry(entry.clone());
    history.save(path)?;
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(output: &str) -> RunReport {
        RunReport {
            output: PathBuf::from(output),
            format: ExportFormat::Csv,
            rows: 3,
            columns: 2,
            sources: vec!["a.csv / a".to_string()],
        }
    }

    #[test]
    fn test_history_add_and_get() {
        let mut history = HistoryFile::new();
        history.add_entry(HistoryEntry::from_report(&report("out.csv")));
        history.add_entry(HistoryEntry::from_report(&report("other.csv")));

        assert_eq!(history.total_entries(), 2);
        assert_eq!(history.entries_for(Path::new("out.csv")).len(), 1);
        assert_eq!(history.last_entry().unwrap().output, PathBuf::from("other.csv"));
    }

    #[test]
    fn test_record_export_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_HISTORY_FILE);

        record_export(&path, &report("one.csv")).unwrap();
        record_export(&path, &report("two.csv")).unwrap();

        let history = HistoryFile::load(&path).unwrap();
        assert_eq!(history.total_entries(), 2);
        assert_eq!(history.entries[0].rows, 3);
    }

    #[test]
    fn test_load_missing_is_empty() {
        let history = HistoryFile::load("/no/such/history.json").unwrap();
        assert_eq!(history.total_entries(), 0);
    }

    #[test]
    fn test_default_path() {
        assert_eq!(
            HistoryFile::default_path_for(Path::new("exports/out.csv")),
            PathBuf::from("exports").join(DEFAULT_HISTORY_FILE)
        );
    }
}
