//! Historical series, forecast values and their identities.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::periods::Period;

/// Widest first-to-last span a history may cover, in years.
pub const MAX_HISTORY_SPAN: u32 = 500;

/// Greenhouse-gas accounting scope, treated as an opaque series tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scope {
    #[serde(rename = "Scope 1")]
    Scope1,
    #[serde(rename = "Scope 2")]
    Scope2,
    #[serde(rename = "Scope 3")]
    Scope3,
}

impl Scope {
    pub const ALL: [Scope; 3] = [Scope::Scope1, Scope::Scope2, Scope::Scope3];

    pub fn number(self) -> u8 {
        match self {
            Scope::Scope1 => 1,
            Scope::Scope2 => 2,
            Scope::Scope3 => 3,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scope {}", self.number())
    }
}

impl FromStr for Scope {
    type Err = ForecastError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();

        match normalized.trim_start_matches("scope") {
            "1" => Ok(Scope::Scope1),
            "2" => Ok(Scope::Scope2),
            "3" => Ok(Scope::Scope3),
            _ => Err(ForecastError::InvalidInput(format!("Unknown scope: {}", s))),
        }
    }
}

/// Identity of a series: an entity and, for bundled data, a scope.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeriesKey {
    pub entity: String,
    pub scope: Option<Scope>,
}

impl SeriesKey {
    pub fn new(entity: impl Into<String>, scope: Scope) -> Self {
        Self {
            entity: entity.into(),
            scope: Some(scope),
        }
    }

    /// Key for a series that carries no scope tag, e.g. a single uploaded column.
    pub fn unscoped(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            scope: None,
        }
    }

    /// Display label, `"<Entity> <Scope>"` or just the entity.
    pub fn label(&self) -> String {
        match self.scope {
            Some(scope) => format!("{} {}", self.entity, scope),
            None => self.entity.clone(),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Emission values for one series, ordered by period.
///
/// Periods are contiguous: interior years missing from the input are stored as
/// explicit `None` values.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalSeries {
    key: SeriesKey,
    points: BTreeMap<Period, Option<f64>>,
}

impl HistoricalSeries {
    /// Build a series from `(period, value)` pairs in any order.
    ///
    /// Duplicate periods are rejected. Non-finite values are treated as missing.
    pub fn new(key: SeriesKey, points: Vec<(Period, Option<f64>)>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for (period, value) in points {
            let value = value.filter(|v| v.is_finite());
            if map.insert(period, value).is_some() {
                return Err(ForecastError::InvalidInput(format!(
                    "Duplicate period {} in series '{}'",
                    period, key
                )));
            }
        }

        // Fill interior gaps so the series stays contiguous
        if let (Some(&first), Some(&last)) = (map.keys().next(), map.keys().next_back()) {
            match first.years_until(last) {
                Some(span) if span <= MAX_HISTORY_SPAN => {}
                _ => {
                    return Err(ForecastError::InvalidInput(format!(
                        "Series '{}' spans {} to {}, more than {} years",
                        key, first, last, MAX_HISTORY_SPAN
                    )))
                }
            }
            for period in Period::range_inclusive(first, last) {
                map.entry(period).or_insert(None);
            }
        }

        Ok(Self { key, points: map })
    }

    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    pub fn label(&self) -> String {
        self.key.label()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_period(&self) -> Option<Period> {
        self.points.keys().next().copied()
    }

    pub fn last_period(&self) -> Option<Period> {
        self.points.keys().next_back().copied()
    }

    pub fn get(&self, period: Period) -> Option<f64> {
        self.points.get(&period).copied().flatten()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Period, Option<f64>)> + '_ {
        self.points.iter().map(|(p, v)| (*p, *v))
    }

    /// Values in period order, `None` where missing.
    pub fn values(&self) -> Vec<Option<f64>> {
        self.points.values().copied().collect()
    }
}

/// Point forecasts for consecutive future periods, without period labels.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ForecastValues(Vec<f64>);

impl ForecastValues {
    pub fn new(values: Vec<f64>) -> Self {
        ForecastValues(values)
    }

    /// The forecast horizon.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl From<Vec<f64>> for ForecastValues {
    fn from(values: Vec<f64>) -> Self {
        ForecastValues(values)
    }
}
