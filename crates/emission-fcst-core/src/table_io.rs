//! CSV reading and writing for historical files and the merged-table download.
//!
//! Every file is indexed by a `Year` column holding a year or a date. Empty
//! cells are nulls.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use crate::error::{ForecastError, Result};
use crate::merge::MergedTable;
use crate::periods::Period;
use crate::series::{HistoricalSeries, Scope, SeriesKey};

/// Header of the period column.
pub const INDEX_COLUMN: &str = "Year";

fn parse_cell(raw: &str, row: usize, column: &str) -> Result<Option<f64>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    raw.parse::<f64>().map(Some).map_err(|_| {
        ForecastError::InvalidInput(format!(
            "Row {}: value '{}' in column '{}' is not numeric",
            row, raw, column
        ))
    })
}

/// A parsed period-indexed CSV: value column names and one row per period.
struct RawTable {
    columns: Vec<String>,
    rows: Vec<(Period, Vec<Option<f64>>)>,
}

fn read_raw<R: Read>(reader: R) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new().flexible(false).from_reader(reader);
    let headers = reader.headers()?.clone();

    let index = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(INDEX_COLUMN))
        .unwrap_or(0);
    if headers.is_empty() {
        return Err(ForecastError::InvalidInput("CSV has no header".to_string()));
    }

    let columns: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(_, h)| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (n, record) in reader.records().enumerate() {
        let record = record?;
        let row_no = n + 2;
        let period_raw = record.get(index).unwrap_or_default();
        let period: Period = period_raw.parse().map_err(|e| {
            ForecastError::InvalidInput(format!("Row {}: {}", row_no, e))
        })?;

        let mut cells = Vec::with_capacity(columns.len());
        let value_fields = record.iter().enumerate().filter(|(i, _)| *i != index);
        for ((_, raw), name) in value_fields.zip(columns.iter()) {
            cells.push(parse_cell(raw, row_no, name)?);
        }
        rows.push((period, cells));
    }

    Ok(RawTable { columns, rows })
}

fn column_series(raw: &RawTable, idx: usize, key: SeriesKey) -> Result<HistoricalSeries> {
    let points = raw.rows.iter().map(|(p, cells)| (*p, cells[idx])).collect();
    HistoricalSeries::new(key, points)
}

/// Read one historical series from a `Year`-indexed CSV.
///
/// `column` names the value column; without it the first non-index column is used.
pub fn read_history<R: Read>(
    reader: R,
    key: SeriesKey,
    column: Option<&str>,
) -> Result<HistoricalSeries> {
    let raw = read_raw(reader)?;
    let idx = match column {
        Some(name) => raw
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| ForecastError::UnknownColumn(name.to_string()))?,
        None if raw.columns.is_empty() => {
            return Err(ForecastError::InvalidInput(
                "CSV has no value column".to_string(),
            ))
        }
        None => 0,
    };
    column_series(&raw, idx, key)
}

/// Read a historical series from a file on disk.
pub fn load_history(
    path: impl AsRef<Path>,
    key: SeriesKey,
    column: Option<&str>,
) -> Result<HistoricalSeries> {
    let file = File::open(path.as_ref())?;
    read_history(BufReader::new(file), key, column)
}

/// A scope column read from a multi-scope upload.
#[derive(Debug, Clone)]
pub struct ScopeColumn {
    pub scope: Scope,
    /// Header as written in the file.
    pub header: String,
    pub series: HistoricalSeries,
}

/// Read every `Scope 1/2/3` column of an upload, in scope order.
///
/// Columns that are not scopes are ignored; a file without any is an error.
pub fn read_scopes<R: Read>(reader: R, entity: &str) -> Result<Vec<ScopeColumn>> {
    let raw = read_raw(reader)?;

    let mut found: Vec<(Scope, usize)> = Vec::new();
    for (idx, name) in raw.columns.iter().enumerate() {
        if let Ok(scope) = name.parse::<Scope>() {
            if found.iter().any(|(s, _)| *s == scope) {
                return Err(ForecastError::InvalidInput(format!(
                    "Upload has more than one '{}' column",
                    scope
                )));
            }
            found.push((scope, idx));
        }
    }
    if found.is_empty() {
        return Err(ForecastError::InvalidInput(format!(
            "Upload has no scope columns, expected {}",
            Scope::ALL
                .iter()
                .map(Scope::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }
    found.sort_by_key(|(scope, _)| *scope);

    found
        .into_iter()
        .map(|(scope, idx)| {
            Ok(ScopeColumn {
                scope,
                header: raw.columns[idx].clone(),
                series: column_series(&raw, idx, SeriesKey::new(entity, scope))?,
            })
        })
        .collect()
}

/// Write `table` as CSV: `Year` first, then every column; nulls are empty cells.
pub fn write_table<W: Write>(table: &MergedTable, writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);

    let mut header = vec![INDEX_COLUMN.to_string()];
    header.extend(table.columns().iter().cloned());
    writer.write_record(&header)?;

    for (period, cells) in table.iter_rows() {
        let mut record = Vec::with_capacity(cells.len() + 1);
        record.push(period.to_string());
        record.extend(cells.iter().map(|c| c.map(|v| v.to_string()).unwrap_or_default()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Render `table` as a CSV string.
pub fn table_to_csv(table: &MergedTable) -> Result<String> {
    let mut buf = Vec::new();
    write_table(table, &mut buf)?;
    String::from_utf8(buf)
        .map_err(|e| ForecastError::ComputationError(format!("CSV is not UTF-8: {}", e)))
}

/// Parse a CSV written by [`write_table`] back into a table.
pub fn read_table<R: Read>(reader: R) -> Result<MergedTable> {
    let raw = read_raw(reader)?;
    let mut rows = BTreeMap::new();
    for (period, cells) in raw.rows {
        if rows.insert(period, cells).is_some() {
            return Err(ForecastError::InvalidInput(format!(
                "Duplicate period {} in table",
                period
            )));
        }
    }
    MergedTable::from_parts(raw.columns, rows)
}
