//! Yearly periods and forecast index generation.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::series::HistoricalSeries;

/// A calendar year, the join key of every series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Period(i32);

impl Period {
    pub const fn new(year: i32) -> Self {
        Period(year)
    }

    pub const fn year(self) -> i32 {
        self.0
    }

    /// The period `steps` years after this one.
    pub fn offset(self, steps: i32) -> Result<Self> {
        self.0.checked_add(steps).map(Period).ok_or_else(|| {
            ForecastError::InvalidPeriod(format!("year {} + {} is out of range", self.0, steps))
        })
    }

    pub fn next(self) -> Result<Self> {
        self.offset(1)
    }

    /// Number of years from `self` to `later`, or `None` if it does not fit.
    pub fn years_until(self, later: Period) -> Option<u32> {
        later.0.checked_sub(self.0).and_then(|d| u32::try_from(d).ok())
    }

    /// Inclusive range of yearly periods from `start` to `end`.
    pub fn range_inclusive(start: Period, end: Period) -> impl Iterator<Item = Period> {
        (start.0..=end.0).map(Period)
    }
}

impl From<i32> for Period {
    fn from(year: i32) -> Self {
        Period(year)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Accepts a bare year (`2017`) or a date whose year is taken
/// (`2017-12-31`, `2017-01-01 00:00:00`, `2017/12/31`).
impl FromStr for Period {
    type Err = ForecastError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(year) = s.parse::<i32>() {
            return Ok(Period(year));
        }

        for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y"] {
            if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
                return Ok(Period(date.year()));
            }
        }

        for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Ok(Period(dt.year()));
            }
        }

        Err(ForecastError::InvalidPeriod(format!(
            "'{}' is neither a year nor a date",
            s
        )))
    }
}

/// Generate the `horizon` periods that follow the last historical period.
///
/// The first generated period is one year after the history's last period
/// and the rest follow without gaps.
pub fn forecast_index(history: &HistoricalSeries, horizon: usize) -> Result<Vec<Period>> {
    let last = history
        .last_period()
        .ok_or_else(|| ForecastError::MissingAnchor(history.label()))?;

    let steps = i32::try_from(horizon).map_err(|_| {
        ForecastError::InvalidInput(format!("Forecast horizon {} is too large", horizon))
    })?;
    (1..=steps).map(|h| last.offset(h)).collect()
}
