//! End-to-end tests: bundled CSV files -> registry -> dashboard -> CSV download.

use std::fs;
use std::path::Path;

use emission_fcst_core::{
    read_table, table_to_csv, AppConfig, ComparisonMode, Dashboard, DashboardConfig, DataSource,
    Lookup, Period, Registry, UNAVAILABLE_TEXT,
};

// ── Fixtures ──────────────────────────────────────────────────────────

/// Write `<company>_scope<n>.csv` files with six years of history each.
fn write_bundle(dir: &Path, companies: &[&str]) {
    for (c, company) in companies.iter().enumerate() {
        for scope in 1..=3 {
            let mut body = String::from("Year,Emissions\n");
            for (i, year) in (2017..=2022).enumerate() {
                let value = 1000.0 * (c + 1) as f64 + 100.0 * scope as f64 - 15.5 * i as f64;
                body.push_str(&format!("{}-12-31,{}\n", year, value));
            }
            let name = format!("{}_scope{}.csv", company.to_lowercase(), scope);
            fs::write(dir.join(name), body).unwrap();
        }
    }
}

fn load(dir: &Path, extra: &str) -> (AppConfig, Registry) {
    let toml = format!(
        "[registry]\ndata_dir = {:?}\ncompanies = [\"Meta\", \"Fujitsu\"]\n{}\n[dashboard]\nhorizon = 38\nmilestones = [2030, 2060, 2071]\n",
        dir.display().to_string(),
        extra
    );
    let config = AppConfig::from_toml(&toml).unwrap();
    let registry = Registry::load(&config.registry);
    (config, registry)
}

// ── Tests ─────────────────────────────────────────────────────────────

#[test]
fn test_bundled_single_company() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path(), &["Meta", "Fujitsu"]);
    let (config, registry) = load(dir.path(), "");

    assert_eq!(registry.len(), 6);
    assert!(registry.failures().is_empty());

    let request = DashboardConfig::bundled("Meta", &config.dashboard);
    let view = Dashboard::new(&registry).render(&request).unwrap();

    // 2017..2022 history + 38 forecast years -> 2017..2060
    assert_eq!(view.table.len(), 44);
    assert_eq!(view.table.last_period(), Some(Period::new(2060)));
    for (period, cells) in view.table.iter_rows() {
        let historical = period.year() <= 2022;
        for pair in cells.chunks(2) {
            assert_eq!(pair[0].is_some(), historical, "original at {}", period);
            assert_eq!(pair[1].is_some(), !historical, "prediction at {}", period);
        }
    }

    let milestone_2060 = &view.milestones[1].1;
    assert!(milestone_2060.is_available());
    assert!(milestone_2060.value("Meta Scope 3 Prediction").is_some());

    let milestone_2071 = &view.milestones[2].1;
    assert_eq!(
        *milestone_2071,
        Lookup::Unavailable {
            period: Period::new(2071)
        }
    );
    assert!(milestone_2071.to_string().ends_with(UNAVAILABLE_TEXT));
}

#[test]
fn test_comparison_replaces_default_selection() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path(), &["Meta", "Fujitsu"]);
    let (config, registry) = load(dir.path(), "");

    let mut request = DashboardConfig::bundled("Meta", &config.dashboard);
    request.comparison = ComparisonMode::from_selection("Meta", vec!["Fujitsu".to_string()]);
    let view = Dashboard::new(&registry).render(&request).unwrap();

    assert_eq!(view.table.columns().len(), 6);
    assert!(view.table.columns().iter().all(|c| c.starts_with("Fujitsu")));
}

#[test]
fn test_missing_company_files_are_omitted() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path(), &["Meta"]);
    let (config, registry) = load(dir.path(), "");

    assert_eq!(registry.len(), 3);
    assert_eq!(registry.failures().len(), 3);

    let mut request = DashboardConfig::bundled("Meta", &config.dashboard);
    request.comparison = ComparisonMode::Multi(vec!["Meta".into(), "Fujitsu".into()]);
    let view = Dashboard::new(&registry).render(&request).unwrap();
    assert_eq!(view.series.len(), 3);
}

#[test]
fn test_model_override_from_config() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path(), &["Meta", "Fujitsu"]);
    let extra = "[[registry.series]]\nentity = \"Meta\"\nscope = \"Scope 1\"\nmodel = { model = \"naive\" }\n";
    let (config, registry) = load(dir.path(), extra);

    let view = Dashboard::new(&registry)
        .render(&DashboardConfig::bundled("Meta", &config.dashboard))
        .unwrap();
    assert_eq!(view.series[0].model, "Naive");

    // Naive repeats the last observation (2022) over the whole horizon
    let last = view
        .table
        .get(Period::new(2022), "Meta Scope 1 Original")
        .flatten()
        .unwrap();
    let at_2045 = view
        .table
        .get(Period::new(2045), "Meta Scope 1 Prediction")
        .flatten()
        .unwrap();
    assert_eq!(last, at_2045);
}

#[test]
fn test_csv_download_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path(), &["Meta", "Fujitsu"]);
    let (config, registry) = load(dir.path(), "");

    let mut request = DashboardConfig::bundled("Meta", &config.dashboard);
    request.comparison = ComparisonMode::Multi(vec!["Meta".into(), "Fujitsu".into()]);
    let view = Dashboard::new(&registry).render(&request).unwrap();

    let csv = table_to_csv(&view.table).unwrap();
    assert!(csv.starts_with("Year,Meta Scope 1 Original,Meta Scope 1 Prediction"));

    let parsed = read_table(csv.as_bytes()).unwrap();
    assert_eq!(parsed.columns(), view.table.columns());
    assert_eq!(parsed.len(), view.table.len());
    for ((p1, a), (p2, b)) in parsed.iter_rows().zip(view.table.iter_rows()) {
        assert_eq!(p1, p2);
        assert_eq!(a, b);
    }
}

#[test]
fn test_upload_alongside_registry() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path(), &["Meta", "Fujitsu"]);
    let (config, registry) = load(dir.path(), "");

    let mut request = DashboardConfig::bundled("Meta", &config.dashboard);
    request.data_source = DataSource::Uploaded(emission_fcst_core::Upload {
        file_name: "contoso_2024_report.csv".to_string(),
        content: "Year,Scope 1,Scope 2,Scope 3\n2019,5,6,7\n2020,5,6,8\n2021,6,6,9\n2022,6,7,9\n"
            .to_string(),
        target_column: None,
        multi_scope: true,
        model: Default::default(),
    });
    let view = Dashboard::new(&registry).render(&request).unwrap();

    assert_eq!(view.series.len(), 6);
    let columns = view.table.columns();
    assert!(columns.iter().any(|c| c == "Meta Scope 1 Original"));
    assert!(columns.iter().any(|c| c == "contoso Scope 1 Original"));
    assert!(columns.iter().any(|c| c == "contoso Scope 1 Prediction"));
    assert_eq!(view.table.first_period(), Some(Period::new(2017)));
    assert_eq!(view.table.last_period(), Some(Period::new(2060)));
    assert_eq!(view.title, "Meta: Compare against contoso Original");
    assert_eq!(view.export_file_name, "contoso_emissions_predictions.csv");

    let at_2030 = &view.milestones[0].1;
    assert!(at_2030.value("contoso Scope 3 Prediction").is_some());
    assert!(at_2030.value("Meta Scope 3 Prediction").is_some());
}

#[test]
fn test_upload_only_leaves_registry_out() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path(), &["Meta", "Fujitsu"]);
    let (config, registry) = load(dir.path(), "");

    let mut request = DashboardConfig::bundled("Meta", &config.dashboard);
    request.data_source = DataSource::UploadOnly(emission_fcst_core::Upload {
        file_name: "contoso.csv".to_string(),
        content: "Year,Total\n2019,5\n2020,6\n2021,6\n2022,7\n".to_string(),
        target_column: Some("Total".to_string()),
        multi_scope: false,
        model: Default::default(),
    });
    let view = Dashboard::new(&registry).render(&request).unwrap();

    assert_eq!(view.table.columns(), &["Total", "contoso Prediction"]);
    assert_eq!(view.table.first_period(), Some(Period::new(2019)));
    assert_eq!(view.title, "contoso (Original vs Predictions)");
}
