//! Group-by aggregation over a merged table

use crate::error::{Error, Result};
use crate::table::{format_number, CellValue, Table};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between the values of a composite group key
const GROUP_SEPARATOR: &str = "\u{241f}";

/// Aggregate function applied per group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    /// Number of rows in the group
    #[default]
    Count,
    /// Sum of numeric values
    Sum,
    /// Mean over the group's rows, two decimals
    Avg,
    /// Smallest numeric value
    Min,
    /// Largest numeric value
    Max,
}

impl Aggregate {
    /// Upper-case name used in derived column headers
    pub fn label(&self) -> &'static str {
        match self {
            Aggregate::Count => "COUNT",
            Aggregate::Sum => "SUM",
            Aggregate::Avg => "AVG",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
        }
    }
}

impl FromStr for Aggregate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "count" => Ok(Aggregate::Count),
            "sum" => Ok(Aggregate::Sum),
            "avg" | "mean" => Ok(Aggregate::Avg),
            "min" => Ok(Aggregate::Min),
            "max" => Ok(Aggregate::Max),
            _ => Err(Error::UnknownAggregate(s.to_string())),
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label().to_ascii_lowercase())
    }
}

/// Running totals for one aggregate column within one group
#[derive(Debug, Clone)]
struct Accumulator {
    sum: f64,
    min: f64,
    max: f64,
    numeric: usize,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            numeric: 0,
        }
    }
}

impl Accumulator {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.numeric += 1;
    }
}

#[derive(Debug, Clone)]
struct Group {
    keys: Vec<String>,
    count: usize,
    columns: Vec<Accumulator>,
}

/// Validate group-by arguments without computing anything
pub fn validate_group_by(group_keys: &[String], agg_cols: &[String], aggregate: Aggregate) -> Result<()> {
    if group_keys.is_empty() {
        return Err(Error::MissingGroupKeys);
    }
    if aggregate != Aggregate::Count && agg_cols.is_empty() {
        return Err(Error::MissingAggregateColumns);
    }
    Ok(())
}

/// Group `table` by `group_keys` and aggregate `agg_cols`
///
/// Groups appear in first-seen order. Cells that do not start with a number
/// are left out of sum/min/max but still count toward the group's row count.
/// Unknown column names read as empty cells.
pub fn group_by(
    table: &Table,
    group_keys: &[String],
    agg_cols: &[String],
    aggregate: Aggregate,
) -> Result<Table> {
    validate_group_by(group_keys, agg_cols, aggregate)?;

    let key_idx: Vec<Option<usize>> = group_keys.iter().map(|k| table.column_index(k)).collect();
    let agg_idx: Vec<Option<usize>> = agg_cols.iter().map(|c| table.column_index(c)).collect();

    let mut groups: IndexMap<String, Group> = IndexMap::new();

    for r in 0..table.row_count() {
        let keys: Vec<String> = key_idx
            .iter()
            .map(|idx| idx.map(|c| table.cell(r, c)).unwrap_or("").to_string())
            .collect();

        let group = groups
            .entry(keys.join(GROUP_SEPARATOR))
            .or_insert_with(|| Group {
                keys,
                count: 0,
                columns: vec![Accumulator::default(); agg_idx.len()],
            });

        group.count += 1;
        for (acc, idx) in group.columns.iter_mut().zip(&agg_idx) {
            let value = idx.map(|c| CellValue::parse(table.cell(r, c)));
            if let Some(n) = value.and_then(|v| v.as_number()) {
                acc.add(n);
            }
        }
    }

    let mut header = group_keys.to_vec();
    if aggregate == Aggregate::Count {
        header.push(Aggregate::Count.label().to_string());
    } else {
        header.extend(agg_cols.iter().map(|c| format!("{}({})", aggregate.label(), c)));
    }

    let mut result = Table::new(header);
    for group in groups.values() {
        let mut row = group.keys.clone();
        if aggregate == Aggregate::Count {
            row.push(group.count.to_string());
        } else {
            row.extend(group.columns.iter().map(|acc| render(acc, group.count, aggregate)));
        }
        result.push_row(row);
    }

    log::debug!(
        "grouped {} rows into {} groups by {:?}",
        table.row_count(),
        groups.len(),
        group_keys
    );
    Ok(result)
}

fn render(acc: &Accumulator, rows: usize, aggregate: Aggregate) -> String {
    if acc.numeric == 0 {
        return String::new();
    }
    match aggregate {
        Aggregate::Count => rows.to_string(),
        Aggregate::Sum => format_number(acc.sum),
        Aggregate::Avg => format!("{:.2}", acc.sum / rows as f64),
        Aggregate::Min => format_number(acc.min),
        Aggregate::Max => format_number(acc.max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::read_sheet_str;

    fn cities() -> Table {
        read_sheet_str("city,v\nNY,1\nNY,2\nLA,3\n", "t.csv").unwrap().table
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_group_count() {
        let result = group_by(&cities(), &strings(&["city"]), &[], Aggregate::Count).unwrap();

        assert_eq!(
            result.to_rows(),
            vec![
                strings(&["city", "COUNT"]),
                strings(&["NY", "2"]),
                strings(&["LA", "1"]),
            ]
        );
    }

    #[test]
    fn test_group_avg_two_decimals() {
        let result = group_by(&cities(), &strings(&["city"]), &strings(&["v"]), Aggregate::Avg).unwrap();

        assert_eq!(result.header, strings(&["city", "AVG(v)"]));
        assert_eq!(result.rows[0], strings(&["NY", "1.50"]));
        assert_eq!(result.rows[1], strings(&["LA", "3.00"]));
    }

    #[test]
    fn test_group_sum_min_max() {
        let table = cities();
        let keys = strings(&["city"]);
        let cols = strings(&["v"]);

        let sum = group_by(&table, &keys, &cols, Aggregate::Sum).unwrap();
        assert_eq!(sum.rows[0], strings(&["NY", "3"]));

        let min = group_by(&table, &keys, &cols, Aggregate::Min).unwrap();
        assert_eq!(min.rows[0], strings(&["NY", "1"]));

        let max = group_by(&table, &keys, &cols, Aggregate::Max).unwrap();
        assert_eq!(max.header, strings(&["city", "MAX(v)"]));
        assert_eq!(max.rows[0], strings(&["NY", "2"]));
        assert_eq!(max.rows[1], strings(&["LA", "3"]));
    }

    #[test]
    fn test_non_numeric_group_renders_empty() {
        let table = read_sheet_str("k,v\na,x\na,\nb,4\n", "t.csv").unwrap().table;
        let keys = strings(&["k"]);
        let cols = strings(&["v"]);

        for aggregate in [Aggregate::Sum, Aggregate::Avg, Aggregate::Min, Aggregate::Max] {
            let result = group_by(&table, &keys, &cols, aggregate).unwrap();
            assert_eq!(result.rows[0], strings(&["a", ""]), "{aggregate}");
            assert_eq!(result.rows[1][0], "b");
        }
    }

    #[test]
    fn test_avg_divides_by_group_rows() {
        let table = read_sheet_str("k,v\na,4\na,n/a\n", "t.csv").unwrap().table;
        let result = group_by(&table, &strings(&["k"]), &strings(&["v"]), Aggregate::Avg).unwrap();
        assert_eq!(result.rows[0], strings(&["a", "2.00"]));
    }

    #[test]
    fn test_composite_group_keys() {
        let table = read_sheet_str("a,b,v\n1,x,1\n1,y,2\n1,x,3\n", "t.csv").unwrap().table;
        let result = group_by(&table, &strings(&["a", "b"]), &strings(&["v"]), Aggregate::Sum).unwrap();

        assert_eq!(result.header, strings(&["a", "b", "SUM(v)"]));
        assert_eq!(result.rows, vec![strings(&["1", "x", "4"]), strings(&["1", "y", "2"])]);
    }

    #[test]
    fn test_multiple_aggregate_columns() {
        let table = read_sheet_str("k,p,q\na,1,10\na,2,20\n", "t.csv").unwrap().table;
        let result = group_by(&table, &strings(&["k"]), &strings(&["p", "q"]), Aggregate::Max).unwrap();

        assert_eq!(result.header, strings(&["k", "MAX(p)", "MAX(q)"]));
        assert_eq!(result.rows[0], strings(&["a", "2", "20"]));
    }

    #[test]
    fn test_validation() {
        let table = cities();
        assert!(matches!(
            group_by(&table, &[], &[], Aggregate::Count),
            Err(Error::MissingGroupKeys)
        ));
        assert!(matches!(
            group_by(&table, &strings(&["city"]), &[], Aggregate::Sum),
            Err(Error::MissingAggregateColumns)
        ));
    }

    #[test]
    fn test_aggregate_parse() {
        assert_eq!("AVG".parse::<Aggregate>().unwrap(), Aggregate::Avg);
        assert_eq!(Aggregate::Min.to_string(), "min");
        assert!("median".parse::<Aggregate>().is_err());
    }
}
