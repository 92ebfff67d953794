//! Recipe files: a whole pipeline run described in JSON
//!
//! A recipe names the input sheets, how to merge them, an optional group-by,
//! the view (filters, sort, visible columns) and where to export the result.
//! A batch file lists several recipes to run in order.

use crate::aggregate::Aggregate;
use crate::error::{Error, Result};
use crate::export::{export_table, ExportFormat};
use crate::merger::MergeMode;
use crate::scanner::scan_paths;
use crate::view::{Filter, SortSpec};
use crate::workspace::Workspace;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// How to merge the selected sheets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSpec {
    /// Merge strategy
    #[serde(default)]
    pub mode: MergeMode,
    /// Join keys, used by the join mode
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
}

/// Optional group-by step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    /// Columns to group by
    pub keys: Vec<String>,
    /// Columns to aggregate (ignored for count)
    #[serde(default)]
    pub columns: Vec<String>,
    /// Aggregate function
    #[serde(default)]
    pub aggregate: Aggregate,
}

/// A full pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    /// Sheet files or directories to load
    pub inputs: Vec<PathBuf>,
    /// Sheet or file names to leave out of the merge
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    /// Merge step
    #[serde(default)]
    pub merge: MergeSpec,
    /// Group-by step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupSpec>,
    /// Row filters, all of which must match
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
    /// Sort column and direction
    #[serde(default)]
    pub sort: SortSpec,
    /// Visible columns in display order; all columns when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    /// Export destination
    pub output: PathBuf,
    /// Export format
    #[serde(default)]
    pub format: ExportFormat,
}

impl Recipe {
    /// Create a recipe that appends `inputs` into `output` as CSV
    pub fn new(inputs: Vec<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            inputs,
            exclude: Vec::new(),
            merge: MergeSpec::default(),
            group: None,
            filters: Vec::new(),
            sort: SortSpec::default(),
            columns: None,
            output: output.into(),
            format: ExportFormat::default(),
        }
    }

    /// Load a recipe from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the recipe to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Build the workspace this recipe describes, up to the final view
    pub fn prepare(&self) -> Result<Workspace> {
        let scan = scan_paths(&self.inputs)?;
        let mut sources = scan.sheets;
        for source in &mut sources {
            if self
                .exclude
                .iter()
                .any(|name| *name == source.sheet_name || *name == source.file_name)
            {
                source.included = false;
            }
        }

        let mut workspace = Workspace::new(sources);
        workspace.merge(self.merge.mode, &self.merge.keys)?;
        if let Some(group) = &self.group {
            workspace.group_by(&group.keys, &group.columns, group.aggregate)?;
        }
        workspace.set_filters(self.filters.clone());
        workspace.set_sort(self.sort.clone());
        if let Some(columns) = &self.columns {
            workspace.show_columns_by_name(columns.as_slice())?;
        }
        Ok(workspace)
    }

    /// Run the recipe and export its view
    pub fn run(&self) -> Result<RunReport> {
        let workspace = self.prepare()?;
        let view = workspace.view()?;
        let rows = export_table(&view.table, &self.output, self.format)?;

        Ok(RunReport {
            output: self.output.clone(),
            format: self.format,
            rows,
            columns: view.table.column_count(),
            sources: workspace
                .included_sources()
                .iter()
                .map(|s| s.label())
                .collect(),
        })
    }
}

/// What a recipe run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// File written
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

/// A batch file listing recipes to run in order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFile {
    /// Recipe files to run
    pub recipes: Vec<PathBuf>,
}

impl BatchFile {
    /// Load a batch file from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the batch file to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Run every recipe, collecting failures instead of stopping
    pub fn run(&self) -> BatchResult {
        let mut result = BatchResult::default();
        for path in &self.recipes {
            match Recipe::load(path).and_then(|r| r.run()) {
                Ok(report) => result.reports.push(report),
                Err(e) => {
                    log::warn!("recipe {} failed: {}", path.display(), e);
                    result.errors.push((path.clone(), e.to_string()));
                }
            }
        }
        result
    }
}

/// Outcome of a batch run
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    /// Reports of recipes that succeeded
    pub reports: Vec<RunReport>,
    /// Recipes that failed (recipe path, error message)
    pub errors: Vec<(PathBuf, String)>,
}
