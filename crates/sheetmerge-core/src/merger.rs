//! Merge engine: combines source tables into one table
//!
//! Three strategies are provided:
//! - [`append_merge`] stacks rows under the union of all headers
//! - [`join_merge`] performs a full outer join on a composite key
//! - [`auto_merge`] joins the sheets that share columns and appends the rest

use crate::error::{Error, Result};
use crate::table::{SourceTable, Table};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between the parts of a composite join key
const KEY_SEPARATOR: &str = "\u{1f}";

/// How selected sheets are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Stack rows under the union of all headers
    #[default]
    Append,
    /// Join sheets sharing columns, append the others
    Auto,
    /// Full outer join on user-chosen key columns
    Join,
}

impl FromStr for MergeMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "append" => Ok(MergeMode::Append),
            "auto" => Ok(MergeMode::Auto),
            "join" | "manual" => Ok(MergeMode::Join),
            _ => Err(Error::UnknownMergeMode(s.to_string())),
        }
    }
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MergeMode::Append => "append",
            MergeMode::Auto => "auto",
            MergeMode::Join => "join",
        };
        f.write_str(name)
    }
}

/// Merge the included sheets with the given mode
///
/// Validates the selection first; nothing is computed for an invalid
/// request. `keys` is only consulted for [`MergeMode::Join`].
pub fn merge_sources(sources: &[SourceTable], mode: MergeMode, keys: &[String]) -> Result<Table> {
    let targets: Vec<&SourceTable> = sources.iter().filter(|s| s.included).collect();
    if targets.is_empty() {
        return Err(Error::NoTargetsSelected);
    }
    let tables: Vec<&Table> = targets.iter().map(|s| &s.table).collect();

    let merged = match mode {
        MergeMode::Append => append_merge(&tables),
        MergeMode::Auto => auto_merge(&tables),
        MergeMode::Join => {
            validate_join(&targets, keys)?;
            let joined = join_merge(&tables, keys);
            if joined.rows.is_empty() {
                return Err(Error::EmptyJoinResult);
            }
            joined
        }
    };

    log::debug!(
        "{} merge of {} sheets: {} columns, {} rows",
        mode,
        targets.len(),
        merged.column_count(),
        merged.row_count()
    );
    Ok(merged)
}

fn validate_join(targets: &[&SourceTable], keys: &[String]) -> Result<()> {
    if keys.is_empty() || keys.iter().any(|k| k.is_empty()) {
        return Err(Error::IncompleteJoinKeys);
    }
    if targets.len() < 2 {
        return Err(Error::NotEnoughJoinTargets {
            found: targets.len(),
        });
    }
    for key in keys {
        if let Some(sheet) = targets.iter().find(|t| !t.table.has_column(key)) {
            return Err(Error::JoinKeyNotUniversal {
                key: key.clone(),
                sheet: sheet.label(),
            });
        }
    }
    Ok(())
}

/// Ordered union of header names, first-seen order, duplicates collapsed
fn unified_header<'a>(tables: &[&'a Table]) -> IndexSet<&'a str> {
    tables
        .iter()
        .flat_map(|&t| t.header.iter().map(String::as_str))
        .collect()
}

/// For each column of `table`, its position in the unified header
///
/// A later duplicate name in the same table maps to the same target and
/// therefore wins when applied in order.
fn column_mapping(table: &Table, header: &IndexSet<&str>) -> Vec<(usize, usize)> {
    table
        .header
        .iter()
        .enumerate()
        .filter_map(|(i, name)| header.get_index_of(name.as_str()).map(|u| (i, u)))
        .collect()
}

fn header_table(header: &IndexSet<&str>) -> Table {
    Table::new(header.iter().map(|name| name.to_string()).collect())
}

/// Stack all rows under the union of all headers
///
/// Each output cell is the source row's value for that column name, or an
/// empty string when the source sheet lacks the column. Rows keep target
/// order, then their order within the target.
pub fn append_merge(targets: &[&Table]) -> Table {
    let header = unified_header(targets);
    let width = header.len();

    let mut merged = header_table(&header);
    for table in targets {
        let mapping = column_mapping(table, &header);
        for r in 0..table.row_count() {
            let mut row = vec![String::new(); width];
            for &(src, dst) in &mapping {
                row[dst] = table.cell(r, src).to_string();
            }
            merged.push_row(row);
        }
    }
    merged
}

fn composite_key(table: &Table, row: usize, key_cols: &[Option<usize>]) -> String {
    key_cols
        .iter()
        .map(|col| col.map(|c| table.cell(row, c)).unwrap_or(""))
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR)
}

/// Full outer join of all targets on the composite of `keys`
///
/// Output rows follow the order in which keys first appear across targets.
/// Each row overlays every target's record for that key in target order, so
/// later targets overwrite earlier ones on shared columns. Within one target
/// a repeated key keeps its last row.
pub fn join_merge<S: AsRef<str>>(targets: &[&Table], keys: &[S]) -> Table {
    let header = unified_header(targets);
    let width = header.len();

    // composite key -> matching row in each target
    let mut records: IndexMap<String, Vec<Option<usize>>> = IndexMap::new();
    for (t, table) in targets.iter().enumerate() {
        let key_cols: Vec<Option<usize>> = keys
            .iter()
            .map(|k| table.column_index(k.as_ref()))
            .collect();
        for r in 0..table.row_count() {
            let slots = records
                .entry(composite_key(table, r, &key_cols))
                .or_insert_with(|| vec![None; targets.len()]);
            slots[t] = Some(r);
        }
    }

    let mappings: Vec<Vec<(usize, usize)>> = targets
        .iter()
        .map(|t| column_mapping(t, &header))
        .collect();

    let mut merged = header_table(&header);
    for slots in records.values() {
        let mut row = vec![String::new(); width];
        for ((table, slot), mapping) in targets.iter().zip(slots).zip(&mappings) {
            if let Some(r) = *slot {
                for &(src, dst) in mapping {
                    row[dst] = table.cell(r, src).to_string();
                }
            }
        }
        merged.push_row(row);
    }
    merged
}

/// Column names that occur in more than one target's header
///
/// Returned in first-seen order; a name repeated within one header counts once.
pub fn join_candidates(targets: &[&Table]) -> Vec<String> {
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for table in targets {
        let names: IndexSet<&str> = table.header.iter().map(String::as_str).collect();
        for name in names {
            *counts.entry(name).or_insert(0) += 1;
        }
    }

    counts
        .into_iter()
        .filter(|&(_, count)| count > 1)
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Column names present in every target, in the first target's order
pub fn common_columns(targets: &[&Table]) -> Vec<String> {
    let Some((first, rest)) = targets.split_first() else {
        return Vec::new();
    };
    let names: IndexSet<&str> = first.header.iter().map(String::as_str).collect();
    names
        .into_iter()
        .filter(|name| rest.iter().all(|t| t.has_column(name)))
        .map(str::to_string)
        .collect()
}

/// Join the targets that share columns, append the rest
///
/// Targets containing every join candidate form the join group and are
/// joined on the first candidate; all others are appended. A join group of
/// one falls back to the append group. With no candidates at all this is
/// exactly [`append_merge`].
pub fn auto_merge(targets: &[&Table]) -> Table {
    let candidates = join_candidates(targets);
    if candidates.is_empty() {
        log::debug!("auto merge: no shared columns, appending");
        return append_merge(targets);
    }

    let (mut join_group, mut append_group): (Vec<&Table>, Vec<&Table>) = targets
        .iter()
        .copied()
        .partition(|t| candidates.iter().all(|c| t.has_column(c)));

    log::debug!(
        "auto merge: candidates {:?}, join group {}, append group {}",
        candidates,
        join_group.len(),
        append_group.len()
    );

    let joined = match join_group.len() {
        0 => None,
        1 => {
            append_group.append(&mut join_group);
            None
        }
        _ => Some(join_merge(&join_group, &candidates[..1])),
    };

    let appended = if append_group.is_empty() {
        None
    } else {
        Some(append_merge(&append_group))
    };

    match (joined, appended) {
        (Some(j), Some(a)) => append_merge(&[&j, &a]),
        (Some(j), None) => j,
        (None, Some(a)) => a,
        (None, None) => Table::default(),
    }
}
