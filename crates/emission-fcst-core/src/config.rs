//! Configuration: the registry file and the per-request dashboard settings.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::chart::ChartKind;
use crate::error::{ForecastError, Result};
use crate::forecast::ModelSpec;
use crate::periods::Period;
use crate::series::Scope;

/// Forecast horizon used when none is configured.
pub const DEFAULT_HORIZON: usize = 30;

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_horizon() -> usize {
    DEFAULT_HORIZON
}

fn default_companies() -> Vec<String> {
    ["Meta", "Fujitsu", "Amazon", "Google", "Microsoft"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_milestones() -> Vec<Period> {
    [2024, 2030, 2050].into_iter().map(Period::new).collect()
}

/// Per-series override of the file location and model.
#[derive(Debug, Clone, Deserialize)]
pub struct SeriesEntry {
    pub entity: String,
    pub scope: Scope,
    /// File path, relative to `data_dir` unless absolute.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Value column; defaults to the first non-index column.
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub model: Option<ModelSpec>,
}

/// Where bundled data lives and which model each series uses.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_companies")]
    pub companies: Vec<String>,
    #[serde(default)]
    pub default_model: ModelSpec,
    #[serde(default)]
    pub series: Vec<SeriesEntry>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            companies: default_companies(),
            default_model: ModelSpec::default(),
            series: Vec::new(),
        }
    }
}

impl RegistryConfig {
    fn entry(&self, entity: &str, scope: Scope) -> Option<&SeriesEntry> {
        self.series
            .iter()
            .find(|e| e.entity.eq_ignore_ascii_case(entity) && e.scope == scope)
    }

    /// File of a bundled series: the override, else `<entity>_scope<n>.csv` in `data_dir`.
    pub fn history_path(&self, entity: &str, scope: Scope) -> PathBuf {
        match self.entry(entity, scope).and_then(|e| e.path.as_ref()) {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => self.data_dir.join(p),
            None => self.data_dir.join(format!(
                "{}_scope{}.csv",
                entity.to_lowercase(),
                scope.number()
            )),
        }
    }

    pub fn history_column(&self, entity: &str, scope: Scope) -> Option<&str> {
        self.entry(entity, scope).and_then(|e| e.column.as_deref())
    }

    pub fn model_for(&self, entity: &str, scope: Scope) -> &ModelSpec {
        self.entry(entity, scope)
            .and_then(|e| e.model.as_ref())
            .unwrap_or(&self.default_model)
    }

    fn validate(&self) -> Result<()> {
        if self.companies.is_empty() {
            return Err(ForecastError::Config(
                "at least one company must be configured".to_string(),
            ));
        }
        for entry in &self.series {
            if !self
                .companies
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&entry.entity))
            {
                return Err(ForecastError::Config(format!(
                    "series entry for '{}' does not name a configured company",
                    entry.entity
                )));
            }
        }
        Ok(())
    }
}

/// Dashboard defaults read from the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardDefaults {
    #[serde(default)]
    pub chart: ChartKind,
    #[serde(default = "default_milestones")]
    pub milestones: Vec<Period>,
    #[serde(default = "default_horizon")]
    pub horizon: usize,
}

impl Default for DashboardDefaults {
    fn default() -> Self {
        Self {
            chart: ChartKind::default(),
            milestones: default_milestones(),
            horizon: DEFAULT_HORIZON,
        }
    }
}

/// Whole configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub dashboard: DashboardDefaults,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            ForecastError::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .map_err(|e| ForecastError::Config(format!("Failed to parse config: {}", e)))?;
        config.registry.validate()?;
        if config.dashboard.horizon == 0 {
            return Err(ForecastError::Config(
                "dashboard.horizon must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }
}

/// An uploaded CSV file and how to forecast it.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content: String,
    /// Forecast a single named column; ignored when `multi_scope` is set.
    pub target_column: Option<String>,
    /// Forecast every `Scope 1/2/3` column of the file.
    pub multi_scope: bool,
    pub model: ModelSpec,
}

impl Upload {
    /// Display label: the file name up to the first `_`, without extension.
    pub fn label(&self) -> String {
        let stem = Path::new(&self.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.file_name);
        stem.split('_').next().unwrap_or(stem).to_string()
    }

    /// Default download name for this upload.
    pub fn export_file_name(&self) -> String {
        format!("{}_emissions_predictions.csv", self.label())
    }
}

/// Where the historical data of a request comes from.
#[derive(Debug, Clone)]
pub enum DataSource {
    Bundled,
    /// The upload, joined onto the bundled comparison entities.
    Uploaded(Upload),
    /// The upload on its own.
    UploadOnly(Upload),
}

/// Which bundled entities a request shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComparisonMode {
    Single(String),
    Multi(Vec<String>),
}

impl ComparisonMode {
    /// The selected entity, or the comparison set when it is non-empty.
    pub fn from_selection(selected: impl Into<String>, compare: Vec<String>) -> Self {
        if compare.is_empty() {
            ComparisonMode::Single(selected.into())
        } else {
            ComparisonMode::Multi(compare)
        }
    }

    pub fn entities(&self) -> Vec<&str> {
        match self {
            ComparisonMode::Single(e) => vec![e.as_str()],
            ComparisonMode::Multi(es) => es.iter().map(String::as_str).collect(),
        }
    }
}

/// Everything one dashboard render depends on.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub data_source: DataSource,
    pub comparison: ComparisonMode,
    pub chart: ChartKind,
    pub milestones: Vec<Period>,
    pub horizon: usize,
}

impl DashboardConfig {
    /// Bundled single-entity view using the configured defaults.
    pub fn bundled(entity: impl Into<String>, defaults: &DashboardDefaults) -> Self {
        Self {
            data_source: DataSource::Bundled,
            comparison: ComparisonMode::Single(entity.into()),
            chart: defaults.chart,
            milestones: defaults.milestones.clone(),
            horizon: defaults.horizon,
        }
    }
}
