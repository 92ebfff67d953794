//! Export of a final (projected) table to CSV, TSV, JSON or XLSX

use crate::error::{Error, Result};
use crate::table::{format_number, Table};
use rust_xlsxwriter::{Workbook, XlsxError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// Output file format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Comma-separated values
    #[default]
    Csv,
    /// Tab-separated values
    Tsv,
    /// `{"header": [...], "rows": [[...]]}`
    Json,
    /// Single-worksheet spreadsheet workbook
    Xlsx,
}

/// Worksheet name used for exported workbooks
pub const XLSX_SHEET_NAME: &str = "Sheet1";

impl ExportFormat {
    /// Guess the format from a file extension, defaulting to CSV
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
            .unwrap_or_default()
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "tsv" | "tab" => Ok(ExportFormat::Tsv),
            "json" => Ok(ExportFormat::Json),
            "xlsx" => Ok(ExportFormat::Xlsx),
            _ => Err(Error::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Tsv => "tsv",
            ExportFormat::Json => "json",
            ExportFormat::Xlsx => "xlsx",
        };
        f.write_str(name)
    }
}

/// Write `table` to `writer`; returns the number of data rows written
pub fn write_table<W: Write>(table: &Table, writer: W, format: ExportFormat) -> Result<usize> {
    match format {
        ExportFormat::Csv => write_delimited(table, writer, b','),
        ExportFormat::Tsv => write_delimited(table, writer, b'\t'),
        ExportFormat::Json => {
            let mut writer = writer;
            serde_json::to_writer_pretty(&mut writer, table)?;
            writeln!(writer)?;
            Ok(table.row_count())
        }
        ExportFormat::Xlsx => {
            let mut writer = writer;
            writer.write_all(&workbook_bytes(table)?)?;
            writer.flush()?;
            Ok(table.row_count())
        }
    }
}

/// Build an in-memory workbook holding `table` on one worksheet
///
/// Cells that read back as the same number are written as numbers, the rest
/// as text. Empty cells are left blank.
fn workbook_bytes(table: &Table) -> Result<Vec<u8>> {
    let xlsx_err = |e: XlsxError| Error::WorkbookWrite(e.to_string());

    let mut workbook = Workbook::new();
    let worksheet = workbook
        .add_worksheet()
        .set_name(XLSX_SHEET_NAME)
        .map_err(xlsx_err)?;

    for (r, row) in table.to_rows().iter().enumerate() {
        let row_num = u32::try_from(r)
            .map_err(|_| Error::WorkbookWrite(format!("row {} exceeds the worksheet limit", r)))?;
        for (c, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let col_num = u16::try_from(c)
                .map_err(|_| Error::WorkbookWrite(format!("column {} exceeds the worksheet limit", c)))?;
            match value.parse::<f64>() {
                Ok(n) if format_number(n) == *value => {
                    worksheet.write_number(row_num, col_num, n).map_err(xlsx_err)?;
                }
                _ => {
                    worksheet.write_string(row_num, col_num, value).map_err(xlsx_err)?;
                }
            }
        }
    }

    workbook.save_to_buffer().map_err(xlsx_err)
}

fn write_delimited<W: Write>(table: &Table, writer: W, delimiter: u8) -> Result<usize> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_writer(writer);

    let csv_err = |e: csv::Error| Error::Csv {
        path: "<output>".into(),
        source: e,
    };

    csv_writer.write_record(&table.header).map_err(csv_err)?;
    for row in &table.rows {
        csv_writer.write_record(row).map_err(csv_err)?;
    }
    csv_writer.flush()?;
    Ok(table.row_count())
}

/// Export `table` to a file, creating or truncating it
pub fn export_table<P: AsRef<Path>>(table: &Table, path: P, format: ExportFormat) -> Result<usize> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let rows = write_table(table, BufWriter::new(file), format)?;
    log::debug!("exported {} rows as {} to {}", rows, format, path.display());
    Ok(rows)
}

/// Render a table as tab-separated text for the clipboard
///
/// Tabs and newlines inside cells become spaces so the grid stays intact.
pub fn to_tsv(table: &Table) -> String {
    let clean = |cell: &String| cell.replace(['\t', '\n', '\r'], " ");
    std::iter::once(&table.header)
        .chain(table.rows.iter())
        .map(|row| row.iter().map(clean).collect::<Vec<_>>().join("\t"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sample() -> Table {
        Table::from_rows(vec![
            vec!["name".into(), "note".into()],
            vec!["ann".into(), "a,b".into()],
            vec!["bob".into(), "say \"hi\"".into()],
        ])
    }

    #[test]
    fn test_csv_quoting() {
        let mut out = Vec::new();
        let rows = write_table(&sample(), &mut out, ExportFormat::Csv).unwrap();

        assert_eq!(rows, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "name,note\nann,\"a,b\"\nbob,\"say \"\"hi\"\"\"\n"
        );
    }

    #[test]
    fn test_tsv_output() {
        let mut out = Vec::new();
        write_table(&sample(), &mut out, ExportFormat::Tsv).unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("name\tnote\nann\ta,b\n"));
    }

    #[test]
    fn test_json_export_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        export_table(&sample(), &path, ExportFormat::Json).unwrap();

        let loaded: Table = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_to_tsv_replaces_separators() {
        let table = Table::from_rows(vec![
            vec!["a".into(), "b".into()],
            vec!["x\ty".into(), "line\nbreak".into()],
        ]);
        assert_eq!(to_tsv(&table), "a\tb\nx y\tline break");
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("xlsx".parse::<ExportFormat>().unwrap(), ExportFormat::Xlsx);
        assert!("pdf".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::from_path(Path::new("result.XLSX")), ExportFormat::Xlsx);
        assert_eq!(ExportFormat::from_path(Path::new("out.tsv")), ExportFormat::Tsv);
        assert_eq!(ExportFormat::from_path(Path::new("out")), ExportFormat::Csv);
    }

    #[test]
    fn test_xlsx_export_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.xlsx");
        let table = Table::from_rows(vec![
            vec!["city".into(), "SUM(v)".into(), "code".into()],
            vec!["LA".into(), "30".into(), "007".into()],
            vec!["NY".into(), "2.5".into(), "".into()],
        ]);

        let rows = export_table(&table, &path, ExportFormat::Xlsx).unwrap();
        assert_eq!(rows, 2);

        let sheets = crate::parser::read_workbook(&path).unwrap();
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].sheet_name, XLSX_SHEET_NAME);
        assert_eq!(sheets[0].table, table);
    }
}
