//! Core library for the emission forecast dashboards.
//!
//! This crate aligns historical emission series with generated forecasts,
//! merges many (company, scope) series into one period-keyed table and
//! answers milestone-year lookups against it.

pub mod chart;
pub mod combine;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod forecast;
pub mod lookup;
pub mod merge;
pub mod periods;
pub mod registry;
pub mod series;
pub mod table_io;

// Re-exports for convenience
pub use chart::{ChartData, ChartKind, ChartPoint, ChartSeries};
pub use combine::{
    combine, combine_checked, original_column, prediction_column, CombinedRow, CombinedSeries,
};
pub use config::{
    AppConfig, ComparisonMode, DashboardConfig, DashboardDefaults, DataSource, RegistryConfig,
    SeriesEntry, Upload, DEFAULT_HORIZON,
};
pub use dashboard::{Dashboard, DashboardView, SeriesView, SkippedSeries, BUNDLED_EXPORT_NAME};
pub use error::{ForecastError, Result};
pub use forecast::{
    FittedModel, ModelKind, ModelSpec, Predictor, DEFAULT_ETS_SPEC, MIN_OBSERVATIONS,
};
pub use lookup::{lookup, lookup_milestones, Lookup, UNAVAILABLE_TEXT};
pub use merge::{merge, ColumnRename, MergedTable};
pub use periods::{forecast_index, Period};
pub use registry::{LoadFailure, Registry, RegistryEntry};
pub use series::{ForecastValues, HistoricalSeries, Scope, SeriesKey, MAX_HISTORY_SPAN};
pub use table_io::{
    load_history, read_history, read_scopes, read_table, table_to_csv, write_table, ScopeColumn,
};
