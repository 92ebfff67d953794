//! Input discovery: turns files and directories into source tables

use crate::error::Result;
use crate::parser::{is_sheet_file, read_sources};
use crate::table::SourceTable;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Result of scanning input paths
#[derive(Debug, Clone)]
pub struct ScanResult {
    /// Paths that were scanned
    pub roots: Vec<PathBuf>,
    /// Loaded sheets, files in path order
    pub sheets: Vec<SourceTable>,
    /// Files that were found but could not be read, with the reason
    pub skipped: Vec<(PathBuf, String)>,
}

impl ScanResult {
    /// Find a sheet by sheet name or file name
    pub fn find_sheet(&self, name: &str) -> Option<&SourceTable> {
        self.sheets
            .iter()
            .find(|s| s.sheet_name == name || s.file_name == name)
    }

    /// Get all sheet names
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.sheet_name.as_str()).collect()
    }
}

/// Load every sheet reachable from the given paths
///
/// Files are read directly: workbooks by worksheet, anything else as
/// delimited text. Directories are walked recursively for sheet and workbook
/// files, sorted by path. Directory entries that fail to parse are skipped
/// with a warning; an explicitly named file that fails is an error.
pub fn scan_paths<P: AsRef<Path>>(roots: &[P]) -> Result<ScanResult> {
    let mut sheets = Vec::new();
    let mut skipped = Vec::new();

    for root in roots {
        let root = root.as_ref();

        if !root.is_dir() {
            sheets.extend(read_sources(root)?);
            continue;
        }

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type().is_file() && is_sheet_file(path) {
                files.push(path.to_path_buf());
            }
        }
        files.sort();

        for path in files {
            match read_sources(&path) {
                Ok(found) => sheets.extend(found),
                Err(e) => {
                    log::warn!("skipping {}: {}", path.display(), e);
                    skipped.push((path, e.to_string()));
                }
            }
        }
    }

    Ok(ScanResult {
        roots: roots.iter().map(|r| r.as_ref().to_path_buf()).collect(),
        sheets,
        skipped,
    })
}
