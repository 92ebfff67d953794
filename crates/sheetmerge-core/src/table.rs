//! Core table types shared by every pipeline stage

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A header row plus data rows of string cells
///
/// Column identity is positional: column `i` is `header[i]`. Rows are not
/// forced to the header's length; a missing cell reads as an empty string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Column names, in column order
    pub header: Vec<String>,
    /// Data rows (the header is not stored here)
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Create a table with the given header and no rows
    pub fn new(header: Vec<String>) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }

    /// Build a table from raw rows where row 0 is the header
    pub fn from_rows(mut rows: Vec<Vec<String>>) -> Self {
        if rows.is_empty() {
            return Self::default();
        }
        let header = rows.remove(0);
        Self { header, rows }
    }

    /// Flatten back to raw rows, header first
    pub fn to_rows(&self) -> Vec<Vec<String>> {
        let mut out = Vec::with_capacity(self.rows.len() + 1);
        out.push(self.header.clone());
        out.extend(self.rows.iter().cloned());
        out
    }

    /// Get the number of columns
    pub fn column_count(&self) -> usize {
        self.header.len()
    }

    /// Get the number of data rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// True when the table has neither header nor rows
    pub fn is_empty(&self) -> bool {
        self.header.is_empty() && self.rows.is_empty()
    }

    /// Index of the first column with this name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// True if the header contains this name
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cell value by position, empty when the row is short
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Append a data row
    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Overwrite one cell, padding a short row with empty cells first
    ///
    /// Returns false if the row does not exist.
    pub fn set_cell(&mut self, row: usize, col: usize, value: String) -> bool {
        let Some(cells) = self.rows.get_mut(row) else {
            return false;
        };
        if cells.len() <= col {
            log::warn!("padding row {} from {} to {} cells", row, cells.len(), col + 1);
            cells.resize(col + 1, String::new());
        }
        cells[col] = value;
        true
    }

    /// Remove the given data rows; indices that do not exist are ignored
    pub fn remove_rows(&mut self, rows: &BTreeSet<usize>) {
        let mut idx = 0;
        self.rows.retain(|_| {
            let keep = !rows.contains(&idx);
            idx += 1;
            keep
        });
    }

    /// Remove the given columns from the header and from every row
    pub fn remove_columns(&mut self, cols: &BTreeSet<usize>) {
        retain_positions(&mut self.header, cols);
        for row in &mut self.rows {
            retain_positions(row, cols);
        }
    }
}

fn retain_positions(cells: &mut Vec<String>, drop: &BTreeSet<usize>) {
    let mut idx = 0;
    cells.retain(|_| {
        let keep = !drop.contains(&idx);
        idx += 1;
        keep
    });
}

/// One imported sheet: a table plus where it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceTable {
    /// Origin file name (e.g., "sales.csv")
    pub file_name: String,
    /// Origin sheet name within the file
    pub sheet_name: String,
    /// Header and rows as read
    pub table: Table,
    /// Whether this sheet takes part in the next merge
    pub included: bool,
}

impl SourceTable {
    /// Create an included source table
    pub fn new(file_name: impl Into<String>, sheet_name: impl Into<String>, table: Table) -> Self {
        Self {
            file_name: file_name.into(),
            sheet_name: sheet_name.into(),
            table,
            included: true,
        }
    }

    /// Human readable "file / sheet" label
    pub fn label(&self) -> String {
        if self.file_name == self.sheet_name {
            self.file_name.clone()
        } else {
            format!("{} / {}", self.file_name, self.sheet_name)
        }
    }
}

/// A cell value classified for sorting and aggregation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellValue<'a> {
    /// Text starting with a parseable number
    Number(f64),
    /// Any other non-blank text
    Text(&'a str),
    /// Blank cell
    Empty,
}

impl<'a> CellValue<'a> {
    /// Classify a raw cell string
    pub fn parse(s: &'a str) -> Self {
        if s.trim().is_empty() {
            return CellValue::Empty;
        }
        match parse_number(s) {
            Some(n) => CellValue::Number(n),
            None => CellValue::Text(s),
        }
    }

    /// The numeric value, if any
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// Parse the longest numeric prefix of a cell, ignoring leading whitespace
///
/// `"12.5kg"` reads as 12.5 and `"1e3"` as 1000; text with no leading
/// number (including "NaN") is not numeric. `"Infinity"` is accepted.
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    if s[end..].starts_with("Infinity") {
        let value = f64::INFINITY;
        return Some(if bytes[0] == b'-' { -value } else { value });
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }
    if digits == 0 {
        return None;
    }

    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok()
}

/// Render a number the way it is shown in cells: no trailing ".0"
///
/// Non-finite values render as an empty string.
pub fn format_number(n: f64) -> String {
    if !n.is_finite() {
        return String::new();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    n.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_rows(vec![
            vec!["city".into(), "v".into()],
            vec!["NY".into(), "1".into()],
            vec!["LA".into()],
        ])
    }

    #[test]
    fn test_from_rows_splits_header() {
        let table = sample();
        assert_eq!(table.header, vec!["city", "v"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_count(), 2);
    }

    #[test]
    fn test_from_rows_empty() {
        let table = Table::from_rows(Vec::new());
        assert!(table.is_empty());
        assert_eq!(table.to_rows(), vec![Vec::<String>::new()]);
    }

    #[test]
    fn test_short_row_reads_empty() {
        let table = sample();
        assert_eq!(table.cell(1, 1), "");
        assert_eq!(table.cell(9, 0), "");
        assert_eq!(table.cell(0, 1), "1");
    }

    #[test]
    fn test_set_cell_pads_short_row() {
        let mut table = sample();
        assert!(table.set_cell(1, 1, "3".into()));
        assert_eq!(table.rows[1], vec!["LA", "3"]);
        assert!(!table.set_cell(5, 0, "x".into()));
    }

    #[test]
    fn test_remove_rows_and_columns() {
        let mut table = sample();
        table.remove_rows(&BTreeSet::from([0]));
        assert_eq!(table.rows, vec![vec!["LA".to_string()]]);

        let mut table = sample();
        table.remove_columns(&BTreeSet::from([0]));
        assert_eq!(table.header, vec!["v"]);
        assert_eq!(table.rows[0], vec!["1"]);
        assert!(table.rows[1].is_empty());
    }

    #[test]
    fn test_parse_number_prefix() {
        assert_eq!(parse_number("42"), Some(42.0));
        assert_eq!(parse_number("  -2.5"), Some(-2.5));
        assert_eq!(parse_number("12.5kg"), Some(12.5));
        assert_eq!(parse_number(".5"), Some(0.5));
        assert_eq!(parse_number("1e3"), Some(1000.0));
        assert_eq!(parse_number("2e"), Some(2.0));
        assert_eq!(parse_number("-Infinity"), Some(f64::NEG_INFINITY));
    }

    #[test]
    fn test_parse_number_rejects_text() {
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("."), None);
        assert_eq!(parse_number("-"), None);
    }

    #[test]
    fn test_cell_value_parse() {
        assert_eq!(CellValue::parse("3"), CellValue::Number(3.0));
        assert_eq!(CellValue::parse("x1"), CellValue::Text("x1"));
        assert_eq!(CellValue::parse("   "), CellValue::Empty);
        assert_eq!(CellValue::parse(""), CellValue::Empty);
        assert_eq!(CellValue::parse("7").as_number(), Some(7.0));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(f64::INFINITY), "");
    }

    #[test]
    fn test_source_label() {
        let s = SourceTable::new("book.csv", "book", Table::default());
        assert_eq!(s.label(), "book.csv / book");
        assert!(s.included);
    }
}
