//! Workspace: the loaded sheets, the active table and its view state
//!
//! The workspace moves between three stages:
//!
//! ```text
//!   Unmerged --merge--> Merged --group_by--> Grouped
//!      ^                  ^  \__merge__/        |
//!      |                  +----cancel_group-----+
//!      +------------------ load (from any stage)
//! ```
//!
//! Every transition resets the view state (column order, filters, sort and
//! selection) in one place, `reset_view_state`. Transitions validate
//! before they commit, so a failed merge or group-by changes nothing.

use crate::aggregate::{group_by, Aggregate};
use crate::error::{Error, Result};
use crate::merger::{common_columns, merge_sources, MergeMode};
use crate::table::{SourceTable, Table};
use crate::view::{derive_view, ColumnOrder, Filter, SortSpec, View};
use std::collections::BTreeSet;

/// Which table is authoritative for viewing and editing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Sheets loaded, nothing merged yet
    Unmerged,
    /// The merged table is active
    Merged,
    /// A grouped table derived from the merged table is active
    Grouped,
}

#[derive(Debug, Clone)]
enum State {
    Unmerged,
    Merged { merged: Table },
    Grouped { merged: Table, grouped: Table },
}

/// How a click changes a selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectMode {
    /// Select only this index
    Replace,
    /// Add or remove this index (ctrl/meta-click)
    Toggle,
    /// Add the range from the last anchor to this index (shift-click)
    Extend,
}

/// Selected displayed indices along one axis
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    selected: BTreeSet<usize>,
    anchor: Option<usize>,
}

impl Selection {
    /// Apply a click at `index`
    pub fn select(&mut self, index: usize, mode: SelectMode) {
        match (mode, self.anchor) {
            (SelectMode::Toggle, _) => {
                if !self.selected.remove(&index) {
                    self.selected.insert(index);
                }
                self.anchor = Some(index);
            }
            (SelectMode::Extend, Some(anchor)) => {
                let (lo, hi) = if anchor <= index { (anchor, index) } else { (index, anchor) };
                self.selected.extend(lo..=hi);
            }
            _ => {
                self.selected = BTreeSet::from([index]);
                self.anchor = Some(index);
            }
        }
    }

    /// Selected indices, ascending
    pub fn indices(&self) -> &BTreeSet<usize> {
        &self.selected
    }

    /// True if `index` is selected
    pub fn contains(&self, index: usize) -> bool {
        self.selected.contains(&index)
    }

    /// True when nothing is selected
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Drop the selection and its anchor
    pub fn clear(&mut self) {
        self.selected.clear();
        self.anchor = None;
    }
}

/// Loaded sheets plus the active table and everything derived from it
#[derive(Debug, Clone)]
pub struct Workspace {
    sources: Vec<SourceTable>,
    state: State,
    filters: Vec<Filter>,
    sort: SortSpec,
    order: ColumnOrder,
    selected_rows: Selection,
    selected_columns: Selection,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Workspace {
    /// Create a workspace over freshly loaded sheets
    pub fn new(sources: Vec<SourceTable>) -> Self {
        Self {
            sources,
            state: State::Unmerged,
            filters: Vec::new(),
            sort: SortSpec::default(),
            order: ColumnOrder::default(),
            selected_rows: Selection::default(),
            selected_columns: Selection::default(),
        }
    }

    /// Replace all sheets, discarding any merged or grouped table
    pub fn load(&mut self, sources: Vec<SourceTable>) {
        log::debug!("loaded {} sheets", sources.len());
        self.sources = sources;
        self.state = State::Unmerged;
        self.reset_view_state(0);
    }

    /// Reset everything derived from the active table's shape
    ///
    /// Called on every stage transition: identity column order for
    /// `column_count` columns, no filters, no sort, no selection.
    fn reset_view_state(&mut self, column_count: usize) {
        self.order = ColumnOrder::identity(column_count);
        self.filters.clear();
        self.sort = SortSpec::default();
        self.selected_rows.clear();
        self.selected_columns.clear();
    }

    // ----- sheets -----

    /// All loaded sheets
    pub fn sources(&self) -> &[SourceTable] {
        &self.sources
    }

    /// Sheets currently selected for merging
    pub fn included_sources(&self) -> Vec<&SourceTable> {
        self.sources.iter().filter(|s| s.included).collect()
    }

    /// Flip one sheet's inclusion flag
    pub fn toggle_source(&mut self, index: usize) -> Result<()> {
        let len = self.sources.len();
        let source = self
            .sources
            .get_mut(index)
            .ok_or(Error::SheetOutOfRange { index, len })?;
        source.included = !source.included;
        Ok(())
    }

    /// Include or exclude every sheet
    pub fn set_all_included(&mut self, included: bool) {
        for source in &mut self.sources {
            source.included = included;
        }
    }

    /// Columns usable as manual join keys: present in every included sheet
    pub fn join_key_options(&self) -> Vec<String> {
        let tables: Vec<&Table> = self
            .sources
            .iter()
            .filter(|s| s.included)
            .map(|s| &s.table)
            .collect();
        common_columns(&tables)
    }

    // ----- transitions -----

    /// Current stage
    pub fn stage(&self) -> Stage {
        match self.state {
            State::Unmerged => Stage::Unmerged,
            State::Merged { .. } => Stage::Merged,
            State::Grouped { .. } => Stage::Grouped,
        }
    }

    /// Merge the included sheets, replacing any previous result
    pub fn merge(&mut self, mode: MergeMode, keys: &[String]) -> Result<()> {
        let merged = merge_sources(&self.sources, mode, keys)?;
        let columns = merged.column_count();
        self.state = State::Merged { merged };
        self.reset_view_state(columns);
        Ok(())
    }

    /// Group the merged table, making the grouped table active
    ///
    /// Always recomputes from the merged table, discarding edits made to a
    /// previous grouped table.
    pub fn group_by(&mut self, keys: &[String], columns: &[String], aggregate: Aggregate) -> Result<()> {
        let merged = self.merged_table().ok_or(Error::NoActiveTable)?;
        let grouped = group_by(merged, keys, columns, aggregate)?;
        let width = grouped.column_count();

        let state = std::mem::replace(&mut self.state, State::Unmerged);
        self.state = match state {
            State::Merged { merged } | State::Grouped { merged, .. } => State::Grouped { merged, grouped },
            State::Unmerged => return Err(Error::NoActiveTable),
        };
        self.reset_view_state(width);
        Ok(())
    }

    /// Drop the grouped table and return to the merged table
    pub fn cancel_group(&mut self) -> Result<()> {
        let state = std::mem::replace(&mut self.state, State::Unmerged);
        match state {
            State::Grouped { merged, .. } => {
                let columns = merged.column_count();
                self.state = State::Merged { merged };
                self.reset_view_state(columns);
                Ok(())
            }
            other => {
                self.state = other;
                Err(Error::NoGroupedTable)
            }
        }
    }

    /// The merged table, if a merge has happened
    pub fn merged_table(&self) -> Option<&Table> {
        match &self.state {
            State::Unmerged => None,
            State::Merged { merged } | State::Grouped { merged, .. } => Some(merged),
        }
    }

    /// The grouped table, if grouped
    pub fn grouped_table(&self) -> Option<&Table> {
        match &self.state {
            State::Grouped { grouped, .. } => Some(grouped),
            _ => None,
        }
    }

    /// The table that views and edits address
    pub fn active_table(&self) -> Option<&Table> {
        match &self.state {
            State::Unmerged => None,
            State::Merged { merged } => Some(merged),
            State::Grouped { grouped, .. } => Some(grouped),
        }
    }

    fn active_table_mut(&mut self) -> Result<&mut Table> {
        match &mut self.state {
            State::Unmerged => Err(Error::NoActiveTable),
            State::Merged { merged } => Ok(merged),
            State::Grouped { grouped, .. } => Ok(grouped),
        }
    }

    // ----- view state -----

    /// Derive the displayed table from the active table
    pub fn view(&self) -> Result<View> {
        let table = self.active_table().ok_or(Error::NoActiveTable)?;
        Ok(derive_view(table, &self.filters, &self.sort, &self.order))
    }

    /// Current filters
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Replace all filters
    pub fn set_filters(&mut self, filters: Vec<Filter>) {
        self.filters = filters;
    }

    /// Append an empty filter
    pub fn add_filter(&mut self) {
        self.filters.push(Filter::default());
    }

    /// Change filter `index`
    pub fn update_filter(&mut self, index: usize, column: &str, keyword: &str) -> Result<()> {
        let len = self.filters.len();
        let filter = self
            .filters
            .get_mut(index)
            .ok_or(Error::FilterOutOfRange { index, len })?;
        filter.column = column.to_string();
        filter.keyword = keyword.to_string();
        Ok(())
    }

    /// Remove filter `index`
    pub fn remove_filter(&mut self, index: usize) -> Result<()> {
        if index >= self.filters.len() {
            return Err(Error::FilterOutOfRange {
                index,
                len: self.filters.len(),
            });
        }
        self.filters.remove(index);
        Ok(())
    }

    /// Remove every filter
    pub fn clear_filters(&mut self) {
        self.filters.clear();
    }

    /// Current sort
    pub fn sort(&self) -> &SortSpec {
        &self.sort
    }

    /// Replace the sort
    pub fn set_sort(&mut self, sort: SortSpec) {
        self.sort = sort;
    }

    /// Header click on a displayed column: cycle its sort and select it
    pub fn click_header(&mut self, displayed: usize) -> Result<()> {
        let underlying = self.order.underlying(displayed)?;
        let table = self.active_table().ok_or(Error::NoActiveTable)?;
        let name = table.header.get(underlying).cloned().unwrap_or_default();
        self.sort.toggle(&name);
        self.selected_columns.select(displayed, SelectMode::Replace);
        Ok(())
    }

    /// Current column order
    pub fn column_order(&self) -> &ColumnOrder {
        &self.order
    }

    fn active_width(&self) -> usize {
        self.active_table().map(Table::column_count).unwrap_or(0)
    }

    /// Replace the column order, validated against the active table
    pub fn set_column_order(&mut self, indices: Vec<usize>) -> Result<()> {
        self.order = ColumnOrder::from_indices(indices, self.active_width())?;
        Ok(())
    }

    /// Show only the named columns, in the given order
    pub fn show_columns_by_name<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        let table = self.active_table().ok_or(Error::NoActiveTable)?;
        self.order = ColumnOrder::from_names(&table.header, names)?;
        Ok(())
    }

    /// Drop a dragged column at displayed position `to`
    ///
    /// Moves the whole column selection when the dragged column is part of
    /// it, otherwise just the dragged column.
    pub fn drag_column(&mut self, from: usize, to: usize) -> Result<()> {
        if from == to {
            return Ok(());
        }
        let moving = if self.selected_columns.contains(from) {
            self.selected_columns.indices().clone()
        } else {
            BTreeSet::from([from])
        };
        self.order.move_columns(&moving, to)
    }

    /// Hide a displayed column without deleting it
    pub fn hide_column(&mut self, displayed: usize) -> Result<()> {
        self.order.hide(displayed)?;
        self.selected_columns.clear();
        Ok(())
    }

    /// Show a hidden underlying column at the end of the order
    pub fn show_column(&mut self, underlying: usize) -> Result<()> {
        let width = self.active_width();
        self.order.show(underlying, width)
    }

    /// Show every column in table order
    pub fn reset_columns(&mut self) {
        self.order = ColumnOrder::identity(self.active_width());
    }

    // ----- selection -----

    /// Click a displayed row's checkbox
    pub fn select_row(&mut self, displayed: usize, mode: SelectMode) {
        self.selected_rows.select(displayed, mode);
    }

    /// Click a displayed column's checkbox
    pub fn select_column(&mut self, displayed: usize, mode: SelectMode) {
        self.selected_columns.select(displayed, mode);
    }

    /// Selected displayed rows
    pub fn selected_rows(&self) -> &Selection {
        &self.selected_rows
    }

    /// Selected displayed columns
    pub fn selected_columns(&self) -> &Selection {
        &self.selected_columns
    }

    // ----- edits -----

    /// Overwrite the cell shown at displayed (row, column)
    pub fn edit_cell(&mut self, row: usize, col: usize, value: impl Into<String>) -> Result<()> {
        let view = self.view()?;
        let underlying_row = view.underlying_row(row)?;
        let underlying_col = view.underlying_column(col)?;

        let table = self.active_table_mut()?;
        table.set_cell(underlying_row, underlying_col, value.into());
        Ok(())
    }

    /// Delete displayed rows; returns how many were removed
    pub fn delete_rows(&mut self, displayed: &BTreeSet<usize>) -> Result<usize> {
        let view = self.view()?;
        let underlying = displayed
            .iter()
            .map(|&r| view.underlying_row(r))
            .collect::<Result<BTreeSet<usize>>>()?;

        self.active_table_mut()?.remove_rows(&underlying);
        self.selected_rows.clear();
        log::debug!("deleted {} rows", underlying.len());
        Ok(underlying.len())
    }

    /// Delete the selected rows
    pub fn delete_selected_rows(&mut self) -> Result<usize> {
        let selected = self.selected_rows.indices().clone();
        self.delete_rows(&selected)
    }

    /// Delete displayed columns from the table and the order
    ///
    /// The rest of the column order is renumbered, not reset: remaining
    /// columns keep their positions and hidden columns stay hidden.
    pub fn delete_columns(&mut self, displayed: &BTreeSet<usize>) -> Result<usize> {
        let underlying = displayed
            .iter()
            .map(|&c| self.order.underlying(c))
            .collect::<Result<BTreeSet<usize>>>()?;

        self.active_table_mut()?.remove_columns(&underlying);
        self.order.remove_underlying(&underlying);
        self.selected_columns.clear();
        log::debug!("deleted {} columns", underlying.len());
        Ok(underlying.len())
    }

    /// Delete the selected columns
    pub fn delete_selected_columns(&mut self) -> Result<usize> {
        let selected = self.selected_columns.indices().clone();
        self.delete_columns(&selected)
    }
}
