//! Forecasting models behind the `Predictor` boundary.
//!
//! A [`FittedModel`] is created once per series when the registry loads and
//! afterwards only produces point forecasts. ETS uses the `anofox-forecast`
//! crate; the remaining models are small closed-form point forecasters.

use std::fmt;
use std::str::FromStr;

use anofox_forecast::models::exponential::{ETSSpec, ETS as ETSModel};
use anofox_forecast::prelude::Forecaster;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ForecastError, Result};
use crate::series::{ForecastValues, HistoricalSeries};

/// Minimum number of observations a model is fitted on.
pub const MIN_OBSERVATIONS: usize = 3;

/// ETS notation used when an ETS model names none.
pub const DEFAULT_ETS_SPEC: &str = "AAN";

/// Anything that turns a forecast horizon into point forecasts.
pub trait Predictor {
    /// Produce `horizon` point forecasts, one per period after the history.
    fn predict(&self, horizon: usize) -> Result<ForecastValues>;

    /// Human-readable model name.
    fn model_name(&self) -> String;
}

/// Available forecast models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum ModelKind {
    /// Picks Naive, SES or Holt from the series' trend.
    Auto,
    Naive,
    SMA,
    RandomWalkDrift,
    SES,
    Holt,
    Theta,
    ARIMA,
    ETS,
}

impl FromStr for ModelKind {
    type Err = ForecastError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ModelKind::Auto),
            "naive" => Ok(ModelKind::Naive),
            "sma" => Ok(ModelKind::SMA),
            "randomwalkdrift" | "random_walk_drift" | "rwd" | "drift" => {
                Ok(ModelKind::RandomWalkDrift)
            }
            "ses" => Ok(ModelKind::SES),
            "holt" => Ok(ModelKind::Holt),
            "theta" => Ok(ModelKind::Theta),
            "arima" | "autoarima" | "auto_arima" => Ok(ModelKind::ARIMA),
            "ets" | "autoets" | "auto_ets" => Ok(ModelKind::ETS),
            _ => Err(ForecastError::InvalidModel(format!("Unknown model: {}", s))),
        }
    }
}

impl TryFrom<String> for ModelKind {
    type Error = ForecastError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl ModelKind {
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Auto => "Auto",
            ModelKind::Naive => "Naive",
            ModelKind::SMA => "SMA",
            ModelKind::RandomWalkDrift => "RandomWalkDrift",
            ModelKind::SES => "SES",
            ModelKind::Holt => "Holt",
            ModelKind::Theta => "Theta",
            ModelKind::ARIMA => "ARIMA",
            ModelKind::ETS => "ETS",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Model choice for one series, as written in the registry config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelSpec {
    pub model: ModelKind,
    /// ETS notation such as "AAN" or "AAdN"; only read for `ETS`.
    #[serde(default)]
    pub ets_spec: Option<String>,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            model: ModelKind::Auto,
            ets_spec: None,
        }
    }
}

impl ModelSpec {
    pub fn new(model: ModelKind) -> Self {
        Self {
            model,
            ets_spec: None,
        }
    }

    /// Fit this model on `history`.
    pub fn fit(&self, history: &HistoricalSeries) -> Result<FittedModel> {
        FittedModel::fit(self, history)
    }
}

/// A model bound to the cleaned history it was fitted on.
#[derive(Debug, Clone)]
pub struct FittedModel {
    kind: ModelKind,
    ets_spec: Option<String>,
    values: Vec<f64>,
}

impl FittedModel {
    pub fn fit(spec: &ModelSpec, history: &HistoricalSeries) -> Result<Self> {
        let values = interpolate_interior(&history.values());
        if values.len() < MIN_OBSERVATIONS {
            return Err(ForecastError::InsufficientData {
                needed: MIN_OBSERVATIONS,
                got: values.len(),
            });
        }

        let mut kind = match spec.model {
            ModelKind::Auto => select_model(&values),
            other => other,
        };

        let mut ets_spec = None;
        if kind == ModelKind::ETS {
            let notation = spec.ets_spec.as_deref().unwrap_or(DEFAULT_ETS_SPEC);
            let parsed = parse_ets_spec(notation)?;
            match forecast_with_ets_spec(&values, 1, &parsed) {
                Ok(_) => ets_spec = Some(notation.to_string()),
                Err(e) => {
                    warn!(series = %history.key(), error = %e, "ETS fit failed, using Holt");
                    kind = ModelKind::Holt;
                }
            }
        }

        debug!(series = %history.key(), model = kind.name(), n = values.len(), "fitted model");

        Ok(Self {
            kind,
            ets_spec,
            values,
        })
    }

    /// The concrete model in use; `Auto` is resolved at fit time.
    pub fn kind(&self) -> ModelKind {
        self.kind
    }
}

impl Predictor for FittedModel {
    fn predict(&self, horizon: usize) -> Result<ForecastValues> {
        if horizon == 0 {
            return Err(ForecastError::InvalidInput(
                "Forecast horizon must be at least 1".to_string(),
            ));
        }

        let values = &self.values;
        let point = match self.kind {
            ModelKind::Auto => forecast_naive(values, horizon),
            ModelKind::Naive => forecast_naive(values, horizon),
            ModelKind::SMA => forecast_sma(values, horizon, 3),
            ModelKind::RandomWalkDrift => forecast_drift(values, horizon),
            ModelKind::SES => forecast_ses(values, horizon, 0.3),
            ModelKind::Holt => forecast_holt(values, horizon, 0.3, 0.1),
            ModelKind::Theta => forecast_theta(values, horizon),
            ModelKind::ARIMA => forecast_arima(values, horizon),
            ModelKind::ETS => forecast_ets(values, horizon, self.ets_spec.as_deref())?,
        };

        if point.len() != horizon {
            return Err(ForecastError::LengthMismatch {
                expected: horizon,
                got: point.len(),
            });
        }
        Ok(ForecastValues::new(point))
    }

    fn model_name(&self) -> String {
        match (self.kind, self.ets_spec.as_deref()) {
            (ModelKind::ETS, Some(spec)) => format!("ETS({})", spec),
            (kind, _) => kind.name().to_string(),
        }
    }
}

/// Drop leading and trailing gaps, linearly interpolate interior ones.
fn interpolate_interior(values: &[Option<f64>]) -> Vec<f64> {
    let known: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|x| (i, x)))
        .collect();

    let mut out = Vec::with_capacity(values.len());
    for pair in known.windows(2) {
        let ((i0, v0), (i1, v1)) = (pair[0], pair[1]);
        let slope = (v1 - v0) / (i1 - i0) as f64;
        for step in 0..(i1 - i0) {
            out.push(v0 + slope * step as f64);
        }
    }
    if let Some(&(_, last)) = known.last() {
        out.push(last);
    }
    out
}

/// Choose between Naive, SES and Holt from the series' trend.
fn select_model(values: &[f64]) -> ModelKind {
    let n = values.len();
    if n < 4 {
        return ModelKind::Naive;
    }

    let first_half_mean = values[..n / 2].iter().sum::<f64>() / (n / 2) as f64;
    let second_half_mean = values[n / 2..].iter().sum::<f64>() / (n - n / 2) as f64;
    let mean_abs_dev = values
        .iter()
        .map(|v| (v - first_half_mean).abs())
        .sum::<f64>()
        / n as f64;

    if (second_half_mean - first_half_mean).abs() > mean_abs_dev * 0.5 {
        ModelKind::Holt
    } else {
        ModelKind::SES
    }
}

// Model implementations. Callers guarantee at least MIN_OBSERVATIONS values.

fn forecast_naive(values: &[f64], horizon: usize) -> Vec<f64> {
    let last = values[values.len() - 1];
    vec![last; horizon]
}

fn forecast_sma(values: &[f64], horizon: usize, window: usize) -> Vec<f64> {
    let w = window.min(values.len());
    let mean = values.iter().rev().take(w).sum::<f64>() / w as f64;
    vec![mean; horizon]
}

fn forecast_drift(values: &[f64], horizon: usize) -> Vec<f64> {
    let n = values.len();
    let last = values[n - 1];
    let drift = (last - values[0]) / (n - 1) as f64;
    (1..=horizon).map(|h| last + drift * h as f64).collect()
}

fn forecast_ses(values: &[f64], horizon: usize, alpha: f64) -> Vec<f64> {
    let level = values
        .iter()
        .skip(1)
        .fold(values[0], |level, &v| alpha * v + (1.0 - alpha) * level);
    vec![level; horizon]
}

fn forecast_holt(values: &[f64], horizon: usize, alpha: f64, beta: f64) -> Vec<f64> {
    let mut level = values[0];
    let mut trend = values[1] - values[0];

    for &v in values.iter().skip(1) {
        let prev_level = level;
        level = alpha * v + (1.0 - alpha) * (level + trend);
        trend = beta * (level - prev_level) + (1.0 - beta) * trend;
    }

    (1..=horizon).map(|h| level + trend * h as f64).collect()
}

fn forecast_theta(values: &[f64], horizon: usize) -> Vec<f64> {
    // Theta = 2: equal weight on SES and drift
    forecast_ses(values, horizon, 0.3)
        .into_iter()
        .zip(forecast_drift(values, horizon))
        .map(|(s, d)| (s + d) / 2.0)
        .collect()
}

fn forecast_arima(values: &[f64], horizon: usize) -> Vec<f64> {
    // AR(1) on the first differences with a fixed coefficient
    if values.len() < 5 {
        return forecast_drift(values, horizon);
    }

    let diff: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let mean_diff = diff.iter().sum::<f64>() / diff.len() as f64;
    let ar_coef = 0.5;

    let mut prev_diff = diff[diff.len() - 1];
    let mut level = values[values.len() - 1];
    let mut point = Vec::with_capacity(horizon);
    for _ in 0..horizon {
        let next_diff = mean_diff + ar_coef * (prev_diff - mean_diff);
        level += next_diff;
        point.push(level);
        prev_diff = next_diff;
    }
    point
}

/// Validate ETS notation: `[E][T][S]` or `[E][T]d[S]`, E in A/M, T and S in A/M/N.
fn is_valid_ets_notation(notation: &str) -> bool {
    let chars: Vec<char> = notation.chars().collect();
    let error_ok = |c: char| c == 'A' || c == 'M';
    let component_ok = |c: char| c == 'A' || c == 'M' || c == 'N';

    match chars.as_slice() {
        [e, t, s] => error_ok(*e) && component_ok(*t) && component_ok(*s),
        [e, t, 'd', s] => error_ok(*e) && error_ok(*t) && component_ok(*s),
        _ => false,
    }
}

fn parse_ets_spec(notation: &str) -> Result<ETSSpec> {
    if !is_valid_ets_notation(notation) {
        return Err(ForecastError::InvalidModel(format!(
            "Invalid ETS specification '{}', expected notation like 'AAN' or 'AAdN'",
            notation
        )));
    }

    let spec = ETSSpec::from_notation(notation).map_err(|e| {
        ForecastError::InvalidModel(format!("Invalid ETS specification '{}': {}", notation, e))
    })?;

    if !spec.is_valid() {
        return Err(ForecastError::InvalidModel(format!(
            "ETS specification '{}' is unstable",
            notation
        )));
    }
    Ok(spec)
}

fn forecast_ets(values: &[f64], horizon: usize, notation: Option<&str>) -> Result<Vec<f64>> {
    let spec = parse_ets_spec(notation.unwrap_or(DEFAULT_ETS_SPEC))?;
    forecast_with_ets_spec(values, horizon, &spec)
}

/// Forecast with the `anofox-forecast` ETS model. Yearly data is non-seasonal.
fn forecast_with_ets_spec(values: &[f64], horizon: usize, spec: &ETSSpec) -> Result<Vec<f64>> {
    use anofox_forecast::core::TimeSeriesBuilder;

    let time_series = TimeSeriesBuilder::new()
        .values(values.to_vec())
        .build()
        .map_err(|e| {
            ForecastError::ComputationError(format!("Failed to build TimeSeries: {}", e))
        })?;

    let mut forecaster = ETSModel::new(*spec, 1);
    forecaster
        .fit(&time_series)
        .map_err(|e| ForecastError::ComputationError(format!("Failed to fit ETS model: {}", e)))?;

    let forecast = forecaster.predict(horizon).map_err(|e| {
        ForecastError::ComputationError(format!("Failed to generate ETS forecasts: {}", e))
    })?;

    let point = forecast.point().first().cloned().unwrap_or_default();
    if point.len() != horizon {
        return Err(ForecastError::LengthMismatch {
            expected: horizon,
            got: point.len(),
        });
    }
    Ok(point)
}
