//! Sheet readers
//!
//! Turns a CSV/TSV file into one [`SourceTable`] and a spreadsheet workbook
//! into one [`SourceTable`] per worksheet. Raw string rows with row 0 as the
//! header; text cells are kept verbatim.

use crate::error::{Error, Result};
use crate::table::{format_number, SourceTable, Table};
use calamine::{open_workbook_auto, Data, Reader};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Delimited-text extensions
pub const TEXT_EXTENSIONS: &[&str] = &["csv", "tsv", "tab"];

/// Workbook extensions, read one source per worksheet
pub const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Check whether a path is a spreadsheet workbook
pub fn is_workbook_file(path: &Path) -> bool {
    extension(path).is_some_and(|ext| WORKBOOK_EXTENSIONS.contains(&ext.as_str()))
}

/// Check whether a path looks like a readable sheet or workbook
pub fn is_sheet_file(path: &Path) -> bool {
    is_workbook_file(path)
        || extension(path).is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.as_str()))
}

/// Pick the field delimiter from the file extension
fn delimiter_for(path: &Path) -> u8 {
    match extension(path).as_deref() {
        Some("tsv") | Some("tab") => b'\t',
        _ => b',',
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Read every sheet a file holds
///
/// Workbooks yield one source per worksheet, in workbook order; anything
/// else is read as a single delimited-text sheet.
pub fn read_sources<P: AsRef<Path>>(path: P) -> Result<Vec<SourceTable>> {
    let path = path.as_ref();
    if is_workbook_file(path) {
        read_workbook(path)
    } else {
        Ok(vec![read_sheet(path)?])
    }
}

/// Read each worksheet of a workbook into its own SourceTable
pub fn read_workbook<P: AsRef<Path>>(path: P) -> Result<Vec<SourceTable>> {
    let path = path.as_ref();
    let workbook_err = |e: calamine::Error| Error::Workbook {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut workbook = open_workbook_auto(path).map_err(workbook_err)?;
    let file_name = file_name_of(path);
    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();

    let mut sources = Vec::with_capacity(sheet_names.len());
    for sheet_name in sheet_names {
        let range = workbook.worksheet_range(&sheet_name).map_err(workbook_err)?;
        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect())
            .collect();
        let table = Table::from_rows(rows);

        log::debug!(
            "read worksheet {} / {} ({} columns, {} rows)",
            path.display(),
            sheet_name,
            table.column_count(),
            table.row_count()
        );
        sources.push(SourceTable::new(file_name.clone(), sheet_name, table));
    }
    Ok(sources)
}

/// Render a workbook cell the way it reads as text
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Float(n) => format_number(*n),
        Data::Int(n) => n.to_string(),
        Data::Bool(true) => "TRUE".to_string(),
        Data::Bool(false) => "FALSE".to_string(),
        Data::Error(e) => format!("#{:?}", e),
        // Serial date number, 1900 date system
        Data::DateTime(dt) => format_number(dt.as_f64()),
    }
}

/// Read a sheet file into a SourceTable
pub fn read_sheet<P: AsRef<Path>>(path: P) -> Result<SourceTable> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let table = read_rows(BufReader::new(file), delimiter_for(path), path)?;

    let file_name = file_name_of(path);
    let sheet_name = path
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.clone());

    log::debug!(
        "read sheet {} ({} columns, {} rows)",
        path.display(),
        table.column_count(),
        table.row_count()
    );

    Ok(SourceTable::new(file_name, sheet_name, table))
}

/// Read CSV content from a string (useful for testing)
///
/// `source_name` doubles as file and sheet name.
pub fn read_sheet_str(content: &str, source_name: &str) -> Result<SourceTable> {
    let path = PathBuf::from(source_name);
    let table = read_rows(content.as_bytes(), b',', &path)?;
    Ok(SourceTable::new(source_name, source_name, table))
}

fn read_rows<R: Read>(reader: R, delimiter: u8, path: &Path) -> Result<Table> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true) // Allow varying number of fields
        .delimiter(delimiter)
        .from_reader(reader);

    let mut rows = Vec::new();
    for result in csv_reader.records() {
        let record = result.map_err(|e| Error::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;
        rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    Ok(Table::from_rows(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_simple_csv() {
        let sheet = read_sheet_str("city,v\nNY,1\nLA,3\n", "test.csv").unwrap();

        assert_eq!(sheet.table.header, vec!["city", "v"]);
        assert_eq!(sheet.table.row_count(), 2);
        assert_eq!(sheet.table.rows[1], vec!["LA", "3"]);
        assert!(sheet.included);
    }

    #[test]
    fn test_ragged_rows_kept_verbatim() {
        let sheet = read_sheet_str("a,b,c\n1\n1,2,3,4\n", "ragged.csv").unwrap();

        assert_eq!(sheet.table.rows[0], vec!["1"]);
        assert_eq!(sheet.table.rows[1].len(), 4);
        assert_eq!(sheet.table.cell(0, 2), "");
    }

    #[test]
    fn test_cells_not_trimmed() {
        let sheet = read_sheet_str("name\n  padded \n", "t.csv").unwrap();
        assert_eq!(sheet.table.rows[0][0], "  padded ");
    }

    #[test]
    fn test_empty_content() {
        let sheet = read_sheet_str("", "empty.csv").unwrap();
        assert!(sheet.table.is_empty());
    }

    #[test]
    fn test_read_tsv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.tsv");
        fs::write(&path, "name\tscore\nann\t7\n").unwrap();

        let sheet = read_sheet(&path).unwrap();
        assert_eq!(sheet.file_name, "scores.tsv");
        assert_eq!(sheet.sheet_name, "scores");
        assert_eq!(sheet.table.header, vec!["name", "score"]);
        assert_eq!(sheet.table.rows[0], vec!["ann", "7"]);
    }

    #[test]
    fn test_missing_file() {
        let err = read_sheet("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }

    #[test]
    fn test_is_sheet_file() {
        assert!(is_sheet_file(Path::new("a/b.csv")));
        assert!(is_sheet_file(Path::new("b.TSV")));
        assert!(is_sheet_file(Path::new("b.xlsx")));
        assert!(is_workbook_file(Path::new("b.ODS")));
        assert!(!is_workbook_file(Path::new("b.csv")));
        assert!(!is_sheet_file(Path::new("noext")));
    }

    fn write_book(path: &Path) {
        let mut book = rust_xlsxwriter::Workbook::new();
        let people = book.add_worksheet().set_name("People").unwrap();
        people.write_string(0, 0, "name").unwrap();
        people.write_string(0, 1, "age").unwrap();
        people.write_string(1, 0, "ann").unwrap();
        people.write_number(1, 1, 30).unwrap();
        people.write_string(2, 0, "bob").unwrap();
        people.write_number(2, 1, 9.5).unwrap();

        let scores = book.add_worksheet().set_name("Scores").unwrap();
        scores.write_string(0, 0, "name").unwrap();
        scores.write_string(0, 1, "ok").unwrap();
        scores.write_string(1, 0, "ann").unwrap();
        scores.write_boolean(1, 1, true).unwrap();

        book.save(path).unwrap();
    }

    #[test]
    fn test_read_workbook_one_source_per_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        write_book(&path);

        let sheets = read_sources(&path).unwrap();

        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[0].file_name, "book.xlsx");
        assert_eq!(sheets[0].sheet_name, "People");
        assert_eq!(sheets[0].label(), "book.xlsx / People");
        assert_eq!(sheets[0].table.header, vec!["name", "age"]);
        assert_eq!(sheets[0].table.rows, vec![vec!["ann", "30"], vec!["bob", "9.5"]]);
        assert_eq!(sheets[1].sheet_name, "Scores");
        assert_eq!(sheets[1].table.rows, vec![vec!["ann", "TRUE"]]);
    }

    #[test]
    fn test_read_sources_delimited_is_single_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.csv");
        fs::write(&path, "a\n1\n").unwrap();

        let sheets = read_sources(&path).unwrap();
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].sheet_name, "one");
    }

    #[test]
    fn test_corrupt_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        fs::write(&path, "not a zip archive").unwrap();

        let err = read_workbook(&path).unwrap_err();
        assert!(matches!(err, Error::Workbook { .. }));
    }
}
