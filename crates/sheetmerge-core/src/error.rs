//! Error types for sheetmerge-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sheetmerge-core
///
/// Every variant is recoverable: the workspace validates before it commits,
/// so an error never leaves a half-applied merge or group-by behind.
#[derive(Debug, Error)]
pub enum Error {
    /// Merge invoked with no included sheets
    #[error("select at least one sheet to merge")]
    NoTargetsSelected,

    /// Manual join requested with one or more empty key selections
    #[error("every join key must name a column")]
    IncompleteJoinKeys,

    /// Manual join over fewer than two sheets
    #[error("a join needs at least two sheets, {found} selected")]
    NotEnoughJoinTargets { found: usize },

    /// Manual join key missing from a selected sheet
    #[error("join key '{key}' is not present in sheet '{sheet}'")]
    JoinKeyNotUniversal { key: String, sheet: String },

    /// Manual join produced only a header row
    #[error("no rows could be joined on the selected keys")]
    EmptyJoinResult,

    /// Group-by invoked without group columns
    #[error("select at least one group-by column")]
    MissingGroupKeys,

    /// Group-by with a numeric aggregate but no aggregate columns
    #[error("select at least one column to aggregate")]
    MissingAggregateColumns,

    /// An operation needs a merged table but nothing has been merged yet
    #[error("no merged table; run a merge first")]
    NoActiveTable,

    /// Cancel-group requested while no grouped table exists
    #[error("no grouped table to cancel")]
    NoGroupedTable,

    /// Displayed row index does not resolve
    #[error("row {index} out of range (view has {len} rows)")]
    RowOutOfRange { index: usize, len: usize },

    /// Displayed column index does not resolve
    #[error("column {index} out of range (view has {len} columns)")]
    ColumnOutOfRange { index: usize, len: usize },

    /// Sheet index that does not exist
    #[error("sheet {index} out of range ({len} sheets loaded)")]
    SheetOutOfRange { index: usize, len: usize },

    /// Filter index that does not exist
    #[error("filter {index} out of range ({len} filters)")]
    FilterOutOfRange { index: usize, len: usize },

    /// Column name that does not exist in the active table
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    /// Unrecognized aggregate name
    #[error("unknown aggregate '{0}' (expected count, sum, avg, min or max)")]
    UnknownAggregate(String),

    /// Unrecognized merge mode name
    #[error("unknown merge mode '{0}' (expected append, auto or join)")]
    UnknownMergeMode(String),

    /// Unrecognized export format name
    #[error("unknown format '{0}' (expected csv, tsv, json or xlsx)")]
    UnknownFormat(String),

    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV parsing error from the csv crate
    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Spreadsheet workbook could not be opened or read
    #[error("workbook error in '{path}': {message}")]
    Workbook { path: PathBuf, message: String },

    /// Spreadsheet workbook could not be written
    #[error("failed to write workbook: {0}")]
    WorkbookWrite(String),

    /// Directory traversal error
    #[error("failed to traverse directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
