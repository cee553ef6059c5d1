//! Read-only registry of bundled historical series and their fitted models.
//!
//! Built once at start-up and then shared by reference. A series whose file or
//! model fails to load is recorded as a [`LoadFailure`] and left out.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::config::RegistryConfig;
use crate::error::Result;
use crate::forecast::{FittedModel, Predictor};
use crate::series::{HistoricalSeries, Scope, SeriesKey};
use crate::table_io::load_history;

/// A loaded series and the model that forecasts it.
pub struct RegistryEntry {
    pub history: HistoricalSeries,
    pub model: Box<dyn Predictor>,
}

/// A series that could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub key: SeriesKey,
    pub reason: String,
}

#[derive(Default)]
pub struct Registry {
    companies: Vec<String>,
    entries: BTreeMap<SeriesKey, RegistryEntry>,
    failures: Vec<LoadFailure>,
}

impl Registry {
    /// An empty registry offering `companies`.
    pub fn new(companies: Vec<String>) -> Self {
        Self {
            companies,
            entries: BTreeMap::new(),
            failures: Vec::new(),
        }
    }

    /// Load every (company, scope) series named by `config` and fit its model.
    pub fn load(config: &RegistryConfig) -> Self {
        let mut registry = Registry::new(config.companies.clone());

        for company in &config.companies {
            for scope in Scope::ALL {
                let key = SeriesKey::new(company.as_str(), scope);
                match load_entry(config, company, scope, &key) {
                    Ok((history, model)) => {
                        registry.insert(history, model);
                    }
                    Err(e) => {
                        warn!(series = %key, error = %e, "skipping series");
                        registry.failures.push(LoadFailure {
                            key,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            loaded = registry.entries.len(),
            failed = registry.failures.len(),
            "registry ready"
        );
        registry
    }

    /// Add a series under its own key, replacing any previous entry.
    pub fn insert(&mut self, history: HistoricalSeries, model: impl Predictor + 'static) {
        let key = history.key().clone();
        self.entries.insert(
            key,
            RegistryEntry {
                history,
                model: Box::new(model),
            },
        );
    }

    pub fn companies(&self) -> &[String] {
        &self.companies
    }

    /// Configured spelling of `name`, matched case-insensitively.
    pub fn resolve_company(&self, name: &str) -> Option<&str> {
        self.companies
            .iter()
            .find(|c| c.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    pub fn get(&self, key: &SeriesKey) -> Option<&RegistryEntry> {
        self.entries.get(key)
    }

    /// Loaded scopes of `entity`, in scope order.
    pub fn scopes_of(&self, entity: &str) -> Vec<(&SeriesKey, &RegistryEntry)> {
        self.entries
            .iter()
            .filter(|(k, _)| k.entity == entity)
            .collect()
    }

    pub fn failures(&self) -> &[LoadFailure] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn load_entry(
    config: &RegistryConfig,
    company: &str,
    scope: Scope,
    key: &SeriesKey,
) -> Result<(HistoricalSeries, FittedModel)> {
    let path = config.history_path(company, scope);
    let history = load_history(&path, key.clone(), config.history_column(company, scope))?;
    let model = config.model_for(company, scope).fit(&history)?;
    Ok((history, model))
}
