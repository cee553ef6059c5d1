//! Chart-ready data handed to an external plotting front end.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::merge::MergedTable;
use crate::periods::Period;

pub const X_LABEL: &str = "Year";
pub const Y_LABEL: &str = "Emissions (in metric tons)";

/// How the front end should draw the series. Purely a rendering hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    Line,
    Bar,
    Scatter,
}

impl FromStr for ChartKind {
    type Err = ForecastError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "line" => Ok(ChartKind::Line),
            "bar" => Ok(ChartKind::Bar),
            "scatter" => Ok(ChartKind::Scatter),
            _ => Err(ForecastError::InvalidInput(format!(
                "Unknown chart kind: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChartKind::Line => "line",
            ChartKind::Bar => "bar",
            ChartKind::Scatter => "scatter",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartPoint {
    pub period: Period,
    pub value: f64,
}

/// One plotted line/bar group; null cells are left out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub name: String,
    pub points: Vec<ChartPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub title: String,
    pub kind: ChartKind,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<ChartSeries>,
}

impl ChartData {
    /// One chart series per table column, in column order.
    pub fn from_table(table: &MergedTable, title: impl Into<String>, kind: ChartKind) -> Self {
        let series = table
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, name)| ChartSeries {
                name: name.clone(),
                points: table
                    .iter_rows()
                    .filter_map(|(period, cells)| {
                        cells[idx].map(|value| ChartPoint { period, value })
                    })
                    .collect(),
            })
            .collect();

        Self {
            title: title.into(),
            kind,
            x_label: X_LABEL.to_string(),
            y_label: Y_LABEL.to_string(),
            series,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ForecastError::ComputationError(format!("Failed to encode chart: {}", e)))
    }
}
