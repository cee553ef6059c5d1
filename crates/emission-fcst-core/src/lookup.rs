//! Milestone lookups against a merged table.

use std::fmt;

use serde::Serialize;

use crate::error::{ForecastError, Result};
use crate::merge::MergedTable;
use crate::periods::Period;

/// Text shown in place of a milestone value that the table does not cover.
pub const UNAVAILABLE_TEXT: &str = "data not available";

/// Result of looking up a period in a merged table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Lookup {
    /// The period exists; one `(column, cell)` pair per requested column.
    Available { values: Vec<(String, Option<f64>)> },
    /// The period lies outside the table, e.g. beyond the forecast horizon.
    Unavailable { period: Period },
}

impl Lookup {
    pub fn is_available(&self) -> bool {
        matches!(self, Lookup::Available { .. })
    }

    /// Cell for `column`, if the lookup succeeded and the column was requested.
    pub fn value(&self, column: &str) -> Option<f64> {
        match self {
            Lookup::Available { values } => values
                .iter()
                .find(|(name, _)| name == column)
                .and_then(|(_, v)| *v),
            Lookup::Unavailable { .. } => None,
        }
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Unavailable { period } => write!(f, "{}: {}", period, UNAVAILABLE_TEXT),
            Lookup::Available { values } => {
                let parts: Vec<String> = values
                    .iter()
                    .map(|(name, v)| match v {
                        Some(v) => format!("{} = {:.2}", name, v),
                        None => format!("{} = -", name),
                    })
                    .collect();
                f.write_str(&parts.join(", "))
            }
        }
    }
}

/// Values of `columns` at `period`.
///
/// A period missing from the table is reported as [`Lookup::Unavailable`];
/// only an unknown column name is an error.
pub fn lookup<S: AsRef<str>>(table: &MergedTable, period: Period, columns: &[S]) -> Result<Lookup> {
    let indices = columns
        .iter()
        .map(|c| {
            table
                .column_index(c.as_ref())
                .map(|i| (c.as_ref().to_string(), i))
                .ok_or_else(|| ForecastError::UnknownColumn(c.as_ref().to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    let Some(cells) = table.row(period) else {
        return Ok(Lookup::Unavailable { period });
    };

    Ok(Lookup::Available {
        values: indices
            .into_iter()
            .map(|(name, i)| (name, cells[i]))
            .collect(),
    })
}

/// Look up several milestone periods at once, in the given order.
pub fn lookup_milestones<S: AsRef<str>>(
    table: &MergedTable,
    milestones: &[Period],
    columns: &[S],
) -> Result<Vec<(Period, Lookup)>> {
    milestones
        .iter()
        .map(|&p| lookup(table, p, columns).map(|l| (p, l)))
        .collect()
}
