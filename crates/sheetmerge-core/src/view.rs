//! View pipeline: filter, sort and column projection over the active table
//!
//! [`derive_view`] is a pure function of its inputs. Alongside the rendered
//! table it returns the mapping from displayed positions back to the
//! underlying table, which edit operations use to address the right cells.

use crate::error::{Error, Result};
use crate::table::{CellValue, Table};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Case-insensitive substring predicate on one column
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Column name to test
    pub column: String,
    /// Text that must appear in the cell
    pub keyword: String,
}

impl Filter {
    /// Create a filter
    pub fn new(column: impl Into<String>, keyword: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            keyword: keyword.into(),
        }
    }
}

/// Current sort column and direction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    /// Column to sort by, if any
    #[serde(default)]
    pub column: Option<String>,
    /// Sort descending instead of ascending
    #[serde(default)]
    pub descending: bool,
}

impl SortSpec {
    /// Sort by `column` ascending
    pub fn ascending(column: impl Into<String>) -> Self {
        Self {
            column: Some(column.into()),
            descending: false,
        }
    }

    /// Sort by `column` descending
    pub fn descending(column: impl Into<String>) -> Self {
        Self {
            column: Some(column.into()),
            descending: true,
        }
    }

    /// Advance the header-click cycle for `column`: asc, desc, then unsorted
    ///
    /// Clicking a different column starts that column ascending.
    pub fn toggle(&mut self, column: &str) {
        *self = match (&self.column, self.descending) {
            (Some(c), false) if c == column => Self::descending(column),
            (Some(c), true) if c == column => Self::default(),
            _ => Self::ascending(column),
        };
    }

    /// True when no column is sorted
    pub fn is_unsorted(&self) -> bool {
        self.column.is_none()
    }
}

/// Visible columns, in display order, as indices into the active header
///
/// Hidden columns are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnOrder(Vec<usize>);

impl ColumnOrder {
    /// Every column, in table order
    pub fn identity(column_count: usize) -> Self {
        Self((0..column_count).collect())
    }

    /// Build an order from raw indices, checking they are valid and distinct
    pub fn from_indices(indices: Vec<usize>, column_count: usize) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for &i in &indices {
            if i >= column_count || !seen.insert(i) {
                return Err(Error::ColumnOutOfRange {
                    index: i,
                    len: column_count,
                });
            }
        }
        Ok(Self(indices))
    }

    /// Build an order from column names against a header
    pub fn from_names<S: AsRef<str>>(header: &[String], names: &[S]) -> Result<Self> {
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let idx = header
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| Error::UnknownColumn(name.to_string()))?;
            if !indices.contains(&idx) {
                indices.push(idx);
            }
        }
        Ok(Self(indices))
    }

    /// Underlying indices in display order
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// Number of visible columns
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when every column is hidden
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Underlying column for a displayed column
    pub fn underlying(&self, displayed: usize) -> Result<usize> {
        self.0.get(displayed).copied().ok_or(Error::ColumnOutOfRange {
            index: displayed,
            len: self.0.len(),
        })
    }

    /// Hide the column at a displayed position
    pub fn hide(&mut self, displayed: usize) -> Result<usize> {
        let underlying = self.underlying(displayed)?;
        self.0.remove(displayed);
        Ok(underlying)
    }

    /// Show a hidden underlying column again, at the end
    pub fn show(&mut self, underlying: usize, column_count: usize) -> Result<()> {
        if underlying >= column_count {
            return Err(Error::ColumnOutOfRange {
                index: underlying,
                len: column_count,
            });
        }
        if !self.0.contains(&underlying) {
            self.0.push(underlying);
        }
        Ok(())
    }

    /// Move the displayed columns in `moving` as one block before `to`
    ///
    /// `to` is a displayed position in the current order; when it lies after
    /// the block it is shifted left by the block's size.
    pub fn move_columns(&mut self, moving: &BTreeSet<usize>, to: usize) -> Result<()> {
        if let Some(&bad) = moving.iter().find(|&&i| i >= self.0.len()) {
            return Err(Error::ColumnOutOfRange {
                index: bad,
                len: self.0.len(),
            });
        }
        let Some(&last) = moving.iter().next_back() else {
            return Ok(());
        };

        let block: Vec<usize> = moving.iter().map(|&i| self.0[i]).collect();
        let mut rest: Vec<usize> = self
            .0
            .iter()
            .enumerate()
            .filter(|(i, _)| !moving.contains(i))
            .map(|(_, &c)| c)
            .collect();

        let mut insert_at = to;
        if insert_at > last {
            insert_at = insert_at.saturating_sub(block.len());
        }
        let insert_at = insert_at.min(rest.len());

        let tail = rest.split_off(insert_at);
        rest.extend(block);
        rest.extend(tail);
        self.0 = rest;
        Ok(())
    }

    /// Drop the given underlying columns and renumber the rest
    ///
    /// Keeps the order valid after those columns are removed from the table.
    pub fn remove_underlying(&mut self, removed: &BTreeSet<usize>) {
        self.0.retain(|c| !removed.contains(c));
        for c in &mut self.0 {
            let shift = removed.range(..*c).count();
            *c -= shift;
        }
    }
}

/// The table as displayed, plus how to get back to the underlying table
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    /// Projected header and rows
    pub table: Table,
    /// Underlying data-row index for each displayed data row
    pub row_map: Vec<usize>,
    /// Underlying column index for each displayed column
    pub column_map: Vec<usize>,
}

impl View {
    /// Underlying data row for a displayed data row
    pub fn underlying_row(&self, displayed: usize) -> Result<usize> {
        self.row_map.get(displayed).copied().ok_or(Error::RowOutOfRange {
            index: displayed,
            len: self.row_map.len(),
        })
    }

    /// Underlying column for a displayed column
    pub fn underlying_column(&self, displayed: usize) -> Result<usize> {
        self.column_map
            .get(displayed)
            .copied()
            .ok_or(Error::ColumnOutOfRange {
                index: displayed,
                len: self.column_map.len(),
            })
    }
}

/// True when a data row passes every filter
///
/// A filter naming a column the table does not have is ignored.
pub fn row_matches(table: &Table, row: usize, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| match table.column_index(&filter.column) {
        Some(col) => table
            .cell(row, col)
            .to_lowercase()
            .contains(&filter.keyword.to_lowercase()),
        None => true,
    })
}

/// Sort order of two classified cells
///
/// Blank cells come first, then numbers by value, then text in natural
/// order. Each cell is classified on its own, so this is a total order.
pub fn compare_values(a: &CellValue<'_>, b: &CellValue<'_>) -> Ordering {
    match (a, b) {
        (CellValue::Number(x), CellValue::Number(y)) => x.total_cmp(y),
        (CellValue::Text(x), CellValue::Text(y)) => natural_cmp(x, y),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

fn kind_rank(value: &CellValue<'_>) -> u8 {
    match value {
        CellValue::Empty => 0,
        CellValue::Number(_) => 1,
        CellValue::Text(_) => 2,
    }
}

/// Text comparison where runs of digits compare by numeric value and
/// letters compare case-insensitively, lower case first on ties
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_primary(a, b).then_with(|| {
        a.chars()
            .map(swap_case)
            .cmp(b.chars().map(swap_case))
    })
}

fn swap_case(c: char) -> char {
    if c.is_lowercase() {
        c.to_uppercase().next().unwrap_or(c)
    } else if c.is_uppercase() {
        c.to_lowercase().next().unwrap_or(c)
    } else {
        c
    }
}

fn natural_primary(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();

    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let left = take_digits(&mut a);
                let right = take_digits(&mut b);
                let ord = compare_digit_runs(&left, &right);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                a.next();
                b.next();
                let ord = x.to_lowercase().cmp(y.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn take_digits<I: Iterator<Item = char>>(chars: &mut std::iter::Peekable<I>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.next_if(|c| c.is_ascii_digit()) {
        run.push(c);
    }
    run
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a_trim = a.trim_start_matches('0');
    let b_trim = b.trim_start_matches('0');
    a_trim
        .len()
        .cmp(&b_trim.len())
        .then_with(|| a_trim.cmp(b_trim))
}

/// Run filter, sort and projection over `table`
///
/// The header is never filtered or sorted. Sorting needs at least two
/// remaining rows and a sort column present in the header.
pub fn derive_view(table: &Table, filters: &[Filter], sort: &SortSpec, order: &ColumnOrder) -> View {
    let mut row_map: Vec<usize> = (0..table.row_count())
        .filter(|&r| row_matches(table, r, filters))
        .collect();

    if let Some(col) = sort.column.as_deref().and_then(|c| table.column_index(c)) {
        if row_map.len() >= 2 {
            let keys: Vec<CellValue<'_>> = (0..table.row_count())
                .map(|r| CellValue::parse(table.cell(r, col)))
                .collect();
            row_map.sort_by(|&x, &y| {
                let ord = compare_values(&keys[x], &keys[y]);
                if sort.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }
    }

    let column_map: Vec<usize> = order.indices().to_vec();
    let header = column_map
        .iter()
        .map(|&c| table.header.get(c).cloned().unwrap_or_default())
        .collect();
    let rows = row_map
        .iter()
        .map(|&r| column_map.iter().map(|&c| table.cell(r, c).to_string()).collect())
        .collect();

    View {
        table: Table { header, rows },
        row_map,
        column_map,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::read_sheet_str;

    fn people() -> Table {
        read_sheet_str(
            "name,age,city\nann,30,Seoul\nBob,9,busan\ncho,100,SEOUL\n",
            "t.csv",
        )
        .unwrap()
        .table
    }

    fn compare_cells(a: &str, b: &str) -> Ordering {
        compare_values(&CellValue::parse(a), &CellValue::parse(b))
    }

    fn names(view: &View) -> Vec<&str> {
        view.table.rows.iter().map(|r| r[0].as_str()).collect()
    }

    #[test]
    fn test_filter_case_insensitive_substring() {
        let table = people();
        let filters = vec![Filter::new("city", "seo")];
        let view = derive_view(&table, &filters, &SortSpec::default(), &ColumnOrder::identity(3));

        assert_eq!(names(&view), vec!["ann", "cho"]);
        assert_eq!(view.row_map, vec![0, 2]);
        assert_eq!(view.table.header, table.header);
    }

    #[test]
    fn test_filters_are_anded() {
        let table = people();
        let filters = vec![Filter::new("city", "seoul"), Filter::new("name", "C")];
        let view = derive_view(&table, &filters, &SortSpec::default(), &ColumnOrder::identity(3));
        assert_eq!(names(&view), vec!["cho"]);
    }

    #[test]
    fn test_unknown_filter_column_passes() {
        let table = people();
        let filters = vec![Filter::new("nope", "zzz")];
        let view = derive_view(&table, &filters, &SortSpec::default(), &ColumnOrder::identity(3));
        assert_eq!(view.table.row_count(), 3);
    }

    #[test]
    fn test_sort_numeric() {
        let table = people();
        let order = ColumnOrder::identity(3);

        let asc = derive_view(&table, &[], &SortSpec::ascending("age"), &order);
        assert_eq!(names(&asc), vec!["Bob", "ann", "cho"]);

        let desc = derive_view(&table, &[], &SortSpec::descending("age"), &order);
        assert_eq!(names(&desc), vec!["cho", "ann", "Bob"]);
        assert_eq!(desc.row_map, vec![2, 0, 1]);
    }

    #[test]
    fn test_sort_text_case_insensitive() {
        let table = people();
        let view = derive_view(&table, &[], &SortSpec::ascending("name"), &ColumnOrder::identity(3));
        assert_eq!(names(&view), vec!["ann", "Bob", "cho"]);
    }

    #[test]
    fn test_sort_unknown_column_keeps_order() {
        let table = people();
        let view = derive_view(&table, &[], &SortSpec::ascending("zzz"), &ColumnOrder::identity(3));
        assert_eq!(view.row_map, vec![0, 1, 2]);
    }

    #[test]
    fn test_projection_reorders_and_hides() {
        let table = people();
        let order = ColumnOrder::from_indices(vec![2, 0], 3).unwrap();
        let view = derive_view(&table, &[], &SortSpec::default(), &order);

        assert_eq!(view.table.header, vec!["city", "name"]);
        assert_eq!(view.table.rows[0], vec!["Seoul", "ann"]);
        assert_eq!(view.underlying_column(0).unwrap(), 2);
        assert!(view.underlying_column(2).is_err());
    }

    #[test]
    fn test_view_is_deterministic() {
        let table = people();
        let filters = vec![Filter::new("city", "s")];
        let sort = SortSpec::descending("name");
        let order = ColumnOrder::from_indices(vec![1, 0], 3).unwrap();

        let first = derive_view(&table, &filters, &sort, &order);
        let second = derive_view(&table, &filters, &sort, &order);
        assert_eq!(first, second);
    }

    #[test]
    fn test_sort_toggle_cycle() {
        let mut sort = SortSpec::default();
        sort.toggle("age");
        assert_eq!(sort, SortSpec::ascending("age"));
        sort.toggle("age");
        assert_eq!(sort, SortSpec::descending("age"));
        sort.toggle("age");
        assert!(sort.is_unsorted());

        sort.toggle("age");
        sort.toggle("name");
        assert_eq!(sort, SortSpec::ascending("name"));
    }

    #[test]
    fn test_natural_cmp() {
        assert_eq!(natural_cmp("file2", "file10"), Ordering::Less);
        assert_eq!(natural_cmp("a", "B"), Ordering::Less);
        assert_eq!(natural_cmp("a", "A"), Ordering::Less);
        assert_eq!(natural_cmp("item007", "item7"), Ordering::Less);
        assert_eq!(natural_cmp("abc", "abc"), Ordering::Equal);
        assert_eq!(natural_cmp("", "a"), Ordering::Less);
    }

    #[test]
    fn test_compare_cells_mixed() {
        assert_eq!(compare_cells("9", "10"), Ordering::Less);
        assert_eq!(compare_cells("2.5", "10"), Ordering::Less);
        assert_eq!(compare_cells("x", "10"), Ordering::Greater);
        assert_eq!(compare_cells("", "-5"), Ordering::Less);
        assert_eq!(compare_cells("  ", ""), Ordering::Equal);
    }

    #[test]
    fn test_compare_cells_leading_space_is_consistent() {
        // " 10" is numeric, "#x" is text: numbers always sort before text.
        assert_eq!(compare_cells("9", " 10"), Ordering::Less);
        assert_eq!(compare_cells(" 10", "#x"), Ordering::Less);
        assert_eq!(compare_cells("9", "#x"), Ordering::Less);
        assert_eq!(compare_cells("-", "9"), Ordering::Greater);
    }

    #[test]
    fn test_sort_large_mixed_column() {
        let pool = [" 10", "9", "-", " 3", "5", " 25", "12", "#x", "", "n/a", "1e2", "abc10", "abc9"];
        let mut rows = vec![vec!["v".to_string()]];
        let mut seed: u64 = 7;
        for _ in 0..400 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            rows.push(vec![pool[(seed >> 33) as usize % pool.len()].to_string()]);
        }
        let table = Table::from_rows(rows);
        let order = ColumnOrder::identity(1);

        for sort in [SortSpec::ascending("v"), SortSpec::descending("v")] {
            let view = derive_view(&table, &[], &sort, &order);
            assert_eq!(view.table.row_count(), 400);

            let cells: Vec<&str> = view.table.rows.iter().map(|r| r[0].as_str()).collect();
            for pair in cells.windows(2) {
                let ord = compare_cells(pair[0], pair[1]);
                if sort.descending {
                    assert_ne!(ord, Ordering::Less, "{:?}", pair);
                } else {
                    assert_ne!(ord, Ordering::Greater, "{:?}", pair);
                }
            }
        }

        let asc = derive_view(&table, &[], &SortSpec::ascending("v"), &order);
        let first_text = asc
            .table
            .rows
            .iter()
            .position(|r| matches!(CellValue::parse(&r[0]), CellValue::Text(_)))
            .unwrap();
        assert!(asc.table.rows[first_text..]
            .iter()
            .all(|r| matches!(CellValue::parse(&r[0]), CellValue::Text(_))));
        assert_eq!(asc.table.rows[0][0], "");
    }

    #[test]
    fn test_column_order_from_names() {
        let header: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        let order = ColumnOrder::from_names(&header, &["c", "a", "c"]).unwrap();
        assert_eq!(order.indices(), &[2, 0]);
        assert!(matches!(
            ColumnOrder::from_names(&header, &["z"]),
            Err(Error::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_column_order_validation() {
        assert!(ColumnOrder::from_indices(vec![0, 0], 2).is_err());
        assert!(ColumnOrder::from_indices(vec![2], 2).is_err());
    }

    #[test]
    fn test_move_columns_forward_and_back() {
        let mut order = ColumnOrder::identity(5);
        order.move_columns(&BTreeSet::from([0, 1]), 4).unwrap();
        assert_eq!(order.indices(), &[2, 3, 0, 1, 4]);

        let mut order = ColumnOrder::identity(5);
        order.move_columns(&BTreeSet::from([3]), 1).unwrap();
        assert_eq!(order.indices(), &[0, 3, 1, 2, 4]);

        let mut order = ColumnOrder::identity(3);
        assert!(order.move_columns(&BTreeSet::from([3]), 0).is_err());
    }

    #[test]
    fn test_hide_show_and_remove() {
        let mut order = ColumnOrder::identity(4);
        assert_eq!(order.hide(1).unwrap(), 1);
        assert_eq!(order.indices(), &[0, 2, 3]);
        order.show(1, 4).unwrap();
        assert_eq!(order.indices(), &[0, 2, 3, 1]);
        assert!(order.show(4, 4).is_err());

        order.remove_underlying(&BTreeSet::from([2]));
        assert_eq!(order.indices(), &[0, 2, 1]);
    }
}
