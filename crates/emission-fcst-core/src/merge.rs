//! Outer-joining combined series into one wide, period-keyed table.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::combine::CombinedSeries;
use crate::error::{ForecastError, Result};
use crate::periods::Period;

/// A column that was renamed to avoid shadowing an earlier one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRename {
    pub requested: String,
    pub assigned: String,
}

/// Period-keyed table of original/prediction columns across many series.
///
/// Every row has one cell per column; cells with no data are `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MergedTable {
    columns: Vec<String>,
    rows: BTreeMap<Period, Vec<Option<f64>>>,
    renamed: Vec<ColumnRename>,
}

impl MergedTable {
    /// Build a table from already-aligned parts.
    ///
    /// Column names must be unique and every row must have one cell per column.
    pub fn from_parts(
        columns: Vec<String>,
        rows: BTreeMap<Period, Vec<Option<f64>>>,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(ForecastError::InvalidInput(format!(
                    "Duplicate column '{}'",
                    name
                )));
            }
        }
        for (period, cells) in &rows {
            if cells.len() != columns.len() {
                return Err(ForecastError::InvalidInput(format!(
                    "Row {} has {} cells but table has {} columns",
                    period,
                    cells.len(),
                    columns.len()
                )));
            }
        }
        Ok(Self {
            columns,
            rows,
            renamed: Vec::new(),
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Renames applied while merging, in column order.
    pub fn renamed(&self) -> &[ColumnRename] {
        &self.renamed
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn periods(&self) -> impl Iterator<Item = Period> + '_ {
        self.rows.keys().copied()
    }

    pub fn first_period(&self) -> Option<Period> {
        self.rows.keys().next().copied()
    }

    pub fn last_period(&self) -> Option<Period> {
        self.rows.keys().next_back().copied()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn row(&self, period: Period) -> Option<&[Option<f64>]> {
        self.rows.get(&period).map(Vec::as_slice)
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = (Period, &[Option<f64>])> + '_ {
        self.rows.iter().map(|(p, cells)| (*p, cells.as_slice()))
    }

    /// Cell at `period` in column `name`; `None` when the row or column is absent.
    pub fn get(&self, period: Period, name: &str) -> Option<Option<f64>> {
        let idx = self.column_index(name)?;
        self.rows.get(&period).map(|cells| cells[idx])
    }

    /// All cells of one column in period order.
    pub fn column(&self, name: &str) -> Result<Vec<(Period, Option<f64>)>> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| ForecastError::UnknownColumn(name.to_string()))?;
        Ok(self.rows.iter().map(|(p, cells)| (*p, cells[idx])).collect())
    }

    /// Project onto `names`, keeping every row.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<MergedTable> {
        let indices = names
            .iter()
            .map(|n| {
                self.column_index(n.as_ref())
                    .ok_or_else(|| ForecastError::UnknownColumn(n.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let columns = indices.iter().map(|&i| self.columns[i].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|(p, cells)| (*p, indices.iter().map(|&i| cells[i]).collect()))
            .collect();

        MergedTable::from_parts(columns, rows)
    }
}

/// Pick a name for `requested` that is not in `used`, appending `.1`, `.2`, ...
fn unique_name(requested: &str, used: &HashSet<String>) -> String {
    if !used.contains(requested) {
        return requested.to_string();
    }
    (1..)
        .map(|n| format!("{}.{}", requested, n))
        .find(|candidate| !used.contains(candidate))
        .unwrap_or_else(|| requested.to_string())
}

/// Full outer join of `series` on period.
///
/// Columns keep input order. A name already taken gets a positional suffix so
/// that no column is overwritten.
pub fn merge(series: &[CombinedSeries]) -> MergedTable {
    let mut used: HashSet<String> = HashSet::new();
    let mut columns: Vec<String> = Vec::with_capacity(series.len() * 2);
    let mut renamed = Vec::new();

    for s in series {
        for name in s.column_names() {
            let assigned = unique_name(name, &used);
            if assigned != name {
                debug!(requested = name, assigned = %assigned, "renamed colliding column");
                renamed.push(ColumnRename {
                    requested: name.to_string(),
                    assigned: assigned.clone(),
                });
            }
            used.insert(assigned.clone());
            columns.push(assigned);
        }
    }

    let width = columns.len();
    let mut rows: BTreeMap<Period, Vec<Option<f64>>> = BTreeMap::new();
    for (i, s) in series.iter().enumerate() {
        for (period, row) in s.iter() {
            let cells = rows.entry(period).or_insert_with(|| vec![None; width]);
            cells[2 * i] = row.original;
            cells[2 * i + 1] = row.prediction;
        }
    }

    MergedTable {
        columns,
        rows,
        renamed,
    }
}
