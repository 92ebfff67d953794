//! sheetmerge-core: Core library for merging and aggregating tabular sheets
//!
//! This library provides functionality to:
//! - Read CSV/TSV sheets and workbook worksheets, and scan directories for them
//! - Merge sheets by appending, joining on keys, or an automatic mix of both
//! - Group a merged table and aggregate its columns
//! - Derive a filtered, sorted, column-projected view of the active table
//! - Edit the active table through that view, and export the result (CSV, TSV, JSON or XLSX)

pub mod aggregate;
pub mod error;
pub mod export;
pub mod history;
pub mod merger;
pub mod parser;
pub mod recipe;
pub mod scanner;
pub mod table;
pub mod view;
pub mod workspace;

pub use aggregate::{group_by, Aggregate};
pub use error::{Error, Result};
pub use export::{export_table, to_tsv, write_table, ExportFormat};
pub use history::{record_export, HistoryEntry, HistoryFile};
pub use merger::{append_merge, auto_merge, common_columns, join_merge, merge_sources, MergeMode};
pub use parser::{read_sheet, read_sheet_str, read_sources, read_workbook};
pub use recipe::{BatchFile, GroupSpec, MergeSpec, Recipe, RunReport};
pub use scanner::{scan_paths, ScanResult};
pub use table::{CellValue, SourceTable, Table};
pub use view::{derive_view, ColumnOrder, Filter, SortSpec, View};
pub use workspace::{SelectMode, Selection, Stage, Workspace};
