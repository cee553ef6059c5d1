//! The single parameterized dashboard pipeline.
//!
//! Every render selects its series (bundled entities or an upload), forecasts
//! and combines each one, merges them into one table and derives the chart,
//! per-series views and milestone lookups from that table.

use tracing::{debug, warn};

use crate::chart::ChartData;
use crate::combine::{combine_checked, CombinedSeries};
use crate::config::{ComparisonMode, DashboardConfig, DataSource, Upload};
use crate::error::{ForecastError, Result};
use crate::forecast::Predictor;
use crate::lookup::{lookup_milestones, Lookup};
use crate::merge::{merge, MergedTable};
use crate::periods::Period;
use crate::registry::Registry;
use crate::series::{HistoricalSeries, SeriesKey};
use crate::table_io::{read_history, read_scopes};

/// Download name for bundled data.
pub const BUNDLED_EXPORT_NAME: &str = "emission_predictions.csv";

/// Original/prediction columns of one series, as they appear in the merged table.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesView {
    pub label: String,
    pub model: String,
    pub table: MergedTable,
}

/// A series left out of a render, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSeries {
    pub label: String,
    pub reason: String,
}

/// Everything the front end shows for one request.
#[derive(Debug, Clone)]
pub struct DashboardView {
    pub title: String,
    pub table: MergedTable,
    pub chart: ChartData,
    pub series: Vec<SeriesView>,
    pub milestones: Vec<(Period, Lookup)>,
    pub skipped: Vec<SkippedSeries>,
    pub export_file_name: String,
}

/// A combined series and the model that produced its forecast.
struct Rendered {
    label: String,
    model: String,
    combined: CombinedSeries,
}

/// Renders dashboard views against a shared, read-only registry.
pub struct Dashboard<'a> {
    registry: &'a Registry,
}

impl<'a> Dashboard<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    pub fn render(&self, config: &DashboardConfig) -> Result<DashboardView> {
        if config.horizon == 0 {
            return Err(ForecastError::InvalidInput(
                "Forecast horizon must be at least 1".to_string(),
            ));
        }

        let mut skipped = Vec::new();
        let (title, export_file_name, rendered) = match &config.data_source {
            DataSource::Bundled => {
                let entities = self.resolve_entities(&config.comparison)?;
                let rendered = self.render_bundled(&entities, config.horizon, &mut skipped)?;
                (
                    format!("{}: Scopes 1, 2, and 3 (Original vs Predictions)", entities.join(", ")),
                    BUNDLED_EXPORT_NAME.to_string(),
                    rendered,
                )
            }
            DataSource::Uploaded(upload) => {
                let entities = self.resolve_entities(&config.comparison)?;
                let mut rendered = self.render_bundled(&entities, config.horizon, &mut skipped)?;
                rendered.extend(render_upload(upload, config.horizon, false, &mut skipped)?);
                (
                    format!(
                        "{}: Compare against {} Original",
                        entities.join(", "),
                        upload.label()
                    ),
                    upload.export_file_name(),
                    rendered,
                )
            }
            DataSource::UploadOnly(upload) => (
                format!("{} (Original vs Predictions)", upload.label()),
                upload.export_file_name(),
                render_upload(upload, config.horizon, true, &mut skipped)?,
            ),
        };

        let combined: Vec<CombinedSeries> = rendered.iter().map(|r| r.combined.clone()).collect();
        let table = merge(&combined);

        let series = rendered
            .into_iter()
            .enumerate()
            .map(|(i, r)| {
                let columns = &table.columns()[2 * i..2 * i + 2];
                Ok(SeriesView {
                    label: r.label,
                    model: r.model,
                    table: table.select(columns)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let milestones = lookup_milestones(&table, &config.milestones, table.columns())?;
        let chart = ChartData::from_table(&table, title.clone(), config.chart);

        debug!(
            rows = table.len(),
            columns = table.columns().len(),
            skipped = skipped.len(),
            "rendered dashboard"
        );

        Ok(DashboardView {
            title,
            table,
            chart,
            series,
            milestones,
            skipped,
            export_file_name,
        })
    }

    fn resolve_entities(&self, comparison: &ComparisonMode) -> Result<Vec<String>> {
        comparison
            .entities()
            .into_iter()
            .map(|name| {
                self.registry
                    .resolve_company(name)
                    .map(str::to_string)
                    .ok_or_else(|| ForecastError::UnknownEntity(name.to_string()))
            })
            .collect()
    }

    fn render_bundled(
        &self,
        entities: &[String],
        horizon: usize,
        skipped: &mut Vec<SkippedSeries>,
    ) -> Result<Vec<Rendered>> {
        let mut rendered = Vec::new();
        for entity in entities {
            let scopes = self.registry.scopes_of(entity);
            if scopes.is_empty() {
                warn!(entity = %entity, "no series loaded for entity");
            }
            for (key, entry) in scopes {
                if let Some(r) = forecast_series(
                    &entry.history,
                    entry.model.as_ref(),
                    horizon,
                    &key.label(),
                    None,
                    skipped,
                )? {
                    rendered.push(r);
                }
            }
        }
        Ok(rendered)
    }
}

/// Forecast and combine one series.
///
/// A failing predictor, or a forecast that runs past the last representable
/// year, skips the series.
fn forecast_series(
    history: &HistoricalSeries,
    model: &dyn Predictor,
    horizon: usize,
    label: &str,
    original_name: Option<&str>,
    skipped: &mut Vec<SkippedSeries>,
) -> Result<Option<Rendered>> {
    let forecast = match model.predict(horizon) {
        Ok(f) => f,
        Err(e) => {
            warn!(series = label, error = %e, "prediction failed");
            skipped.push(SkippedSeries {
                label: label.to_string(),
                reason: e.to_string(),
            });
            return Ok(None);
        }
    };

    let combined = match combine_checked(history, &forecast, horizon, label, original_name) {
        Ok(c) => c,
        Err(e @ ForecastError::InvalidPeriod(_)) => {
            warn!(series = label, error = %e, "forecast periods out of range");
            skipped.push(SkippedSeries {
                label: label.to_string(),
                reason: e.to_string(),
            });
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    Ok(Some(Rendered {
        label: label.to_string(),
        model: model.model_name(),
        combined,
    }))
}

/// Series parsed from an upload: history, label and original column name.
///
/// With `keep_headers` scope columns keep the file's header as their original
/// column name; otherwise they are named `<label> Scope N Original`.
fn upload_series(
    upload: &Upload,
    keep_headers: bool,
) -> Result<Vec<(HistoricalSeries, String, Option<String>)>> {
    let label = upload.label();
    if upload.multi_scope {
        Ok(read_scopes(upload.content.as_bytes(), &label)?
            .into_iter()
            .map(|col| {
                let series_label = col.series.key().label();
                let original = keep_headers.then_some(col.header);
                (col.series, series_label, original)
            })
            .collect())
    } else {
        let history = read_history(
            upload.content.as_bytes(),
            SeriesKey::unscoped(label.as_str()),
            upload.target_column.as_deref(),
        )?;
        Ok(vec![(history, label, upload.target_column.clone())])
    }
}

/// Forecast an upload. Parse and fit failures skip the upload instead of failing.
fn render_upload(
    upload: &Upload,
    horizon: usize,
    keep_headers: bool,
    skipped: &mut Vec<SkippedSeries>,
) -> Result<Vec<Rendered>> {
    let parsed = match upload_series(upload, keep_headers) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(file = %upload.file_name, error = %e, "failed to read upload");
            skipped.push(SkippedSeries {
                label: upload.label(),
                reason: e.to_string(),
            });
            return Ok(Vec::new());
        }
    };

    let mut rendered = Vec::new();
    for (history, label, original_name) in parsed {
        let model = match upload.model.fit(&history) {
            Ok(model) => model,
            Err(e) => {
                warn!(series = %label, error = %e, "failed to fit upload model");
                skipped.push(SkippedSeries {
                    label,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        if let Some(r) = forecast_series(
            &history,
            &model,
            horizon,
            &label,
            original_name.as_deref(),
            skipped,
        )? {
            rendered.push(r);
        }
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartKind;
    use crate::forecast::{ModelKind, ModelSpec};
    use crate::series::{ForecastValues, Scope};

    /// Predicts a constant; `None` makes every prediction fail.
    struct FixedPredictor(Option<f64>);

    impl Predictor for FixedPredictor {
        fn predict(&self, horizon: usize) -> Result<ForecastValues> {
            match self.0 {
                Some(v) => Ok(ForecastValues::new(vec![v; horizon])),
                None => Err(ForecastError::ComputationError("model file corrupt".into())),
            }
        }

        fn model_name(&self) -> String {
            "Fixed".to_string()
        }
    }

    fn history(entity: &str, scope: Scope, first: i32, last: i32) -> HistoricalSeries {
        let points = (first..=last)
            .map(|y| (Period::new(y), Some(y as f64)))
            .collect();
        HistoricalSeries::new(SeriesKey::new(entity, scope), points).unwrap()
    }

    fn registry() -> Registry {
        let mut r = Registry::new(vec!["Meta".into(), "Google".into(), "Amazon".into()]);
        for scope in Scope::ALL {
            r.insert(history("Meta", scope, 2017, 2022), FixedPredictor(Some(1.0)));
            r.insert(history("Google", scope, 2015, 2022), FixedPredictor(Some(2.0)));
        }
        r.insert(history("Amazon", Scope::Scope1, 2019, 2022), FixedPredictor(None));
        r
    }

    fn config(comparison: ComparisonMode) -> DashboardConfig {
        DashboardConfig {
            data_source: DataSource::Bundled,
            comparison,
            chart: ChartKind::Line,
            milestones: vec![Period::new(2030), Period::new(2071)],
            horizon: 30,
        }
    }

    fn acme(content: &str, target: Option<&str>, multi_scope: bool) -> Upload {
        Upload {
            file_name: "acme_data.csv".to_string(),
            content: content.to_string(),
            target_column: target.map(String::from),
            multi_scope,
            model: ModelSpec::new(ModelKind::Naive),
        }
    }

    fn upload(content: &str, target: Option<&str>, multi_scope: bool) -> DataSource {
        DataSource::UploadOnly(acme(content, target, multi_scope))
    }

    #[test]
    fn test_single_entity_view() {
        let registry = registry();
        let view = Dashboard::new(&registry)
            .render(&config(ComparisonMode::Single("meta".into())))
            .unwrap();

        assert_eq!(view.table.columns().len(), 6);
        assert_eq!(view.table.len(), 36);
        assert_eq!(view.series.len(), 3);
        assert_eq!(view.series[1].label, "Meta Scope 2");
        assert_eq!(view.series[1].model, "Fixed");
        assert_eq!(view.title, "Meta: Scopes 1, 2, and 3 (Original vs Predictions)");
        assert_eq!(view.export_file_name, BUNDLED_EXPORT_NAME);
        assert_eq!(view.chart.series.len(), 6);
    }

    #[test]
    fn test_milestones_in_and_out_of_horizon() {
        let registry = registry();
        let view = Dashboard::new(&registry)
            .render(&config(ComparisonMode::Single("Meta".into())))
            .unwrap();

        let (p, in_range) = &view.milestones[0];
        assert_eq!(*p, Period::new(2030));
        assert_eq!(in_range.value("Meta Scope 1 Prediction"), Some(1.0));
        assert!(!view.milestones[1].1.is_available());
    }

    #[test]
    fn test_multi_entity_outer_join() {
        let registry = registry();
        let mode = ComparisonMode::Multi(vec!["Meta".into(), "Google".into()]);
        let view = Dashboard::new(&registry).render(&config(mode)).unwrap();

        // Google starts in 2015, Meta's forecast ends in 2052 and Google's in 2052
        assert_eq!(view.table.first_period(), Some(Period::new(2015)));
        assert_eq!(view.table.columns().len(), 12);
        assert_eq!(
            view.table.get(Period::new(2015), "Meta Scope 1 Original"),
            Some(None)
        );
    }

    #[test]
    fn test_failing_predictor_is_skipped() {
        let registry = registry();
        let mode = ComparisonMode::Multi(vec!["Amazon".into(), "Meta".into()]);
        let view = Dashboard::new(&registry).render(&config(mode)).unwrap();

        assert_eq!(view.skipped.len(), 1);
        assert_eq!(view.skipped[0].label, "Amazon Scope 1");
        assert_eq!(view.series.len(), 3);
    }

    #[test]
    fn test_unknown_entity_is_an_error() {
        let registry = registry();
        let err = Dashboard::new(&registry)
            .render(&config(ComparisonMode::Single("Apple".into())))
            .unwrap_err();
        assert!(matches!(err, ForecastError::UnknownEntity(_)));
    }

    #[test]
    fn test_upload_single_column() {
        let registry = registry();
        let mut cfg = config(ComparisonMode::Single("Meta".into()));
        cfg.data_source = upload(
            "Year,Total\n2018,10\n2019,11\n2020,12\n2021,13\n",
            Some("Total"),
            false,
        );
        cfg.horizon = 5;
        let view = Dashboard::new(&registry).render(&cfg).unwrap();

        assert_eq!(view.table.columns(), &["Total".to_string(), "acme Prediction".to_string()]);
        assert_eq!(view.table.len(), 9);
        assert_eq!(view.table.get(Period::new(2026), "acme Prediction"), Some(Some(13.0)));
        assert_eq!(view.export_file_name, "acme_emissions_predictions.csv");
        assert_eq!(view.title, "acme (Original vs Predictions)");
    }

    #[test]
    fn test_upload_multi_scope() {
        let registry = registry();
        let mut cfg = config(ComparisonMode::Single("Meta".into()));
        cfg.data_source = upload(
            "Year,Scope 1,Scope 2\n2019,1,5\n2020,2,6\n2021,3,7\n",
            None,
            true,
        );
        let view = Dashboard::new(&registry).render(&cfg).unwrap();

        assert_eq!(
            view.table.columns(),
            &[
                "Scope 1".to_string(),
                "acme Scope 1 Prediction".to_string(),
                "Scope 2".to_string(),
                "acme Scope 2 Prediction".to_string(),
            ]
        );
        assert_eq!(view.series[1].label, "acme Scope 2");
    }

    #[test]
    fn test_upload_compared_against_selection() {
        let registry = registry();
        let mut cfg = config(ComparisonMode::Single("Meta".into()));
        cfg.data_source = DataSource::Uploaded(acme(
            "Year,Scope 1,Scope 2\n2019,1,5\n2020,2,6\n2021,3,7\n",
            None,
            true,
        ));
        let view = Dashboard::new(&registry).render(&cfg).unwrap();

        assert_eq!(view.series.len(), 5);
        assert_eq!(view.table.columns().len(), 10);
        assert!(view.table.column_index("Meta Scope 1 Original").is_some());
        assert!(view.table.column_index("acme Scope 1 Original").is_some());
        assert!(view.table.column_index("acme Scope 2 Prediction").is_some());
        assert_eq!(view.table.first_period(), Some(Period::new(2017)));
        assert_eq!(view.title, "Meta: Compare against acme Original");
        assert_eq!(view.export_file_name, "acme_emissions_predictions.csv");

        // Upload milestones come from the joined table
        let (_, at_2030) = &view.milestones[0];
        assert_eq!(at_2030.value("acme Scope 2 Prediction"), Some(7.0));
        assert_eq!(at_2030.value("Meta Scope 1 Prediction"), Some(1.0));
    }

    #[test]
    fn test_upload_comparison_unknown_entity() {
        let registry = registry();
        let mut cfg = config(ComparisonMode::Single("Apple".into()));
        cfg.data_source = DataSource::Uploaded(acme("Year,Total\n2019,1\n", None, false));
        let err = Dashboard::new(&registry).render(&cfg).unwrap_err();
        assert!(matches!(err, ForecastError::UnknownEntity(_)));
    }

    #[test]
    fn test_upload_at_last_year_is_skipped() {
        let registry = registry();
        let mut cfg = config(ComparisonMode::Single("Meta".into()));
        cfg.data_source = DataSource::Uploaded(acme(
            "Year,Total\n2147483645,1\n2147483646,2\n2147483647,3\n",
            Some("Total"),
            false,
        ));
        let view = Dashboard::new(&registry).render(&cfg).unwrap();

        assert_eq!(view.skipped.len(), 1);
        assert_eq!(view.skipped[0].label, "acme");
        assert_eq!(view.series.len(), 3);
        assert_eq!(view.table.last_period(), Some(Period::new(2052)));
    }

    #[test]
    fn test_upload_with_huge_year_span_is_skipped() {
        let registry = registry();
        let mut cfg = config(ComparisonMode::Single("Meta".into()));
        cfg.data_source = upload("Year,Total\n1,1\n2000000000,2\n", Some("Total"), false);
        let view = Dashboard::new(&registry).render(&cfg).unwrap();

        assert!(view.table.is_empty());
        assert_eq!(view.skipped.len(), 1);
        assert!(view.skipped[0].reason.contains("years"));
    }

    #[test]
    fn test_bad_upload_is_reported_not_fatal() {
        let registry = registry();
        let mut cfg = config(ComparisonMode::Single("Meta".into()));
        cfg.data_source = upload("Year,Total\n2019,abc\n", Some("Total"), false);
        let view = Dashboard::new(&registry).render(&cfg).unwrap();

        assert!(view.table.is_empty());
        assert_eq!(view.skipped.len(), 1);
        assert_eq!(view.skipped[0].label, "acme");
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let registry = registry();
        let mut cfg = config(ComparisonMode::Single("Meta".into()));
        cfg.horizon = 0;
        assert!(Dashboard::new(&registry).render(&cfg).is_err());
    }
}
