//! Combining a historical series with its generated forecast.

use std::collections::BTreeMap;

use crate::error::{ForecastError, Result};
use crate::periods::{forecast_index, Period};
use crate::series::{ForecastValues, HistoricalSeries};

/// One row of a combined series.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CombinedRow {
    pub original: Option<f64>,
    pub prediction: Option<f64>,
}

/// A historical series followed by its forecast, as two named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedSeries {
    original_name: String,
    prediction_name: String,
    rows: BTreeMap<Period, CombinedRow>,
}

impl CombinedSeries {
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn prediction_name(&self) -> &str {
        &self.prediction_name
    }

    /// Column names in output order: original, then prediction.
    pub fn column_names(&self) -> [&str; 2] {
        [&self.original_name, &self.prediction_name]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, period: Period) -> Option<CombinedRow> {
        self.rows.get(&period).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Period, CombinedRow)> + '_ {
        self.rows.iter().map(|(p, r)| (*p, *r))
    }

    /// First period that carries a prediction.
    pub fn forecast_start(&self) -> Option<Period> {
        self.rows
            .iter()
            .find(|(_, r)| r.prediction.is_some())
            .map(|(p, _)| *p)
    }

    /// Last period of the combined series, i.e. the end of the forecast horizon.
    pub fn last_period(&self) -> Option<Period> {
        self.rows.keys().next_back().copied()
    }
}

/// Column name of the original values for `label`.
pub fn original_column(label: &str) -> String {
    format!("{} Original", label)
}

/// Column name of the predictions for `label`.
pub fn prediction_column(label: &str) -> String {
    format!("{} Prediction", label)
}

/// Combine `history` with `forecast` under `label`.
///
/// Historical rows keep their value as original with a null prediction; the
/// forecast occupies the periods after the last historical one with a null
/// original. `original_name` replaces `"<label> Original"` when given.
pub fn combine(
    history: &HistoricalSeries,
    forecast: &ForecastValues,
    label: &str,
    original_name: Option<&str>,
) -> Result<CombinedSeries> {
    if history.is_empty() {
        return Err(ForecastError::MissingAnchor(history.label()));
    }
    if forecast.is_empty() {
        return Err(ForecastError::LengthMismatch {
            expected: 1,
            got: 0,
        });
    }

    let periods = forecast_index(history, forecast.len())?;

    let mut rows: BTreeMap<Period, CombinedRow> = history
        .iter()
        .map(|(period, value)| {
            (
                period,
                CombinedRow {
                    original: value,
                    prediction: None,
                },
            )
        })
        .collect();

    for (period, &value) in periods.into_iter().zip(forecast.as_slice()) {
        rows.insert(
            period,
            CombinedRow {
                original: None,
                prediction: Some(value),
            },
        );
    }

    Ok(CombinedSeries {
        original_name: original_name
            .map(str::to_string)
            .unwrap_or_else(|| original_column(label)),
        prediction_name: prediction_column(label),
        rows,
    })
}

/// Like [`combine`], but also requires the forecast to cover exactly `horizon` periods.
pub fn combine_checked(
    history: &HistoricalSeries,
    forecast: &ForecastValues,
    horizon: usize,
    label: &str,
    original_name: Option<&str>,
) -> Result<CombinedSeries> {
    if forecast.len() != horizon {
        return Err(ForecastError::LengthMismatch {
            expected: horizon,
            got: forecast.len(),
        });
    }
    combine(history, forecast, label, original_name)
}
