//! # emission-fcst
//!
//! Command-line shell for the emission forecast dashboards.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use emission_fcst_core::{
    table_to_csv, AppConfig, ChartKind, ComparisonMode, Dashboard, DashboardConfig,
    DashboardView, DataSource, Lookup, ModelKind, ModelSpec, Period, Registry, Upload,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG: &str = "emission-fcst.toml";

#[derive(Parser)]
#[command(name = "emission-fcst")]
#[command(about = "Carbon emission forecasts per company and scope", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured companies and the series that loaded
    List,

    /// Forecast one company, a comparison set or an uploaded file
    Forecast(ForecastArgs),

    /// Print forecast values for specific years
    Lookup {
        /// Company to look up
        #[arg(long)]
        company: String,

        /// Years to look up
        #[arg(long = "year", num_args = 1.., required = true)]
        years: Vec<i32>,

        /// Number of years to forecast
        #[arg(long)]
        horizon: Option<usize>,
    },
}

#[derive(clap::Args)]
struct ForecastArgs {
    /// Company to show
    #[arg(long)]
    company: Option<String>,

    /// Companies to compare; replaces the single company view
    #[arg(long, num_args = 1..)]
    compare: Vec<String>,

    #[command(flatten)]
    upload: UploadArgs,

    /// Chart kind (line, bar, scatter)
    #[arg(long)]
    chart: Option<ChartKind>,

    /// Milestone years to report
    #[arg(long = "milestone", num_args = 1..)]
    milestones: Vec<i32>,

    /// Number of years to forecast
    #[arg(long)]
    horizon: Option<usize>,

    /// CSV output file (defaults to the dashboard's download name)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write chart data as JSON to this file
    #[arg(long)]
    chart_json: Option<PathBuf>,
}

#[derive(clap::Args)]
struct UploadArgs {
    /// Forecast this CSV file next to the selected companies
    #[arg(long)]
    upload: Option<PathBuf>,

    /// Column of the upload to forecast
    #[arg(long, requires = "upload")]
    target_column: Option<String>,

    /// Forecast every Scope 1/2/3 column of the upload
    #[arg(long, requires = "upload", conflicts_with = "target_column")]
    multi_scope: bool,

    /// Show only the upload instead of comparing it against the companies
    #[arg(long, requires = "upload")]
    upload_only: bool,

    /// Model used for the upload
    #[arg(long, default_value = "auto_arima")]
    model: ModelKind,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "emission_fcst_core=info,emission_fcst=info".into()),
        )
        .init();
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(p) => AppConfig::from_file(p).with_context(|| format!("loading {}", p.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            AppConfig::from_file(DEFAULT_CONFIG).context("loading default config")
        }
        None => Ok(AppConfig::default()),
    }
}

fn read_upload(args: &UploadArgs) -> Result<Option<Upload>> {
    let Some(path) = &args.upload else {
        return Ok(None);
    };
    let content =
        fs::read_to_string(path).with_context(|| format!("reading upload {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.csv")
        .to_string();

    Ok(Some(Upload {
        file_name,
        content,
        target_column: args.target_column.clone(),
        multi_scope: args.multi_scope,
        model: ModelSpec::new(args.model),
    }))
}

fn print_view(view: &DashboardView) {
    println!("{}", view.title);
    for series in &view.series {
        println!("  {} ({})", series.label, series.model);
    }
    for skipped in &view.skipped {
        println!("  skipped {}: {}", skipped.label, skipped.reason);
    }
    for (period, lookup) in &view.milestones {
        match lookup {
            Lookup::Unavailable { .. } => println!("{}", lookup),
            Lookup::Available { .. } => println!("{}: {}", period, lookup),
        }
    }
}

fn cmd_list(config: &AppConfig) {
    let registry = Registry::load(&config.registry);
    for company in registry.companies() {
        let scopes: Vec<String> = registry
            .scopes_of(company)
            .into_iter()
            .filter_map(|(key, _)| key.scope.map(|s| s.to_string()))
            .collect();
        println!("{}: {}", company, scopes.join(", "));
    }
    for failure in registry.failures() {
        println!("not loaded {}: {}", failure.key, failure.reason);
    }
}

fn cmd_forecast(config: &AppConfig, args: ForecastArgs) -> Result<()> {
    let registry = Registry::load(&config.registry);

    let selected = match args.company {
        Some(c) => c,
        None => match registry.companies().first() {
            Some(c) => c.clone(),
            None => bail!("no companies configured"),
        },
    };

    let mut request = DashboardConfig::bundled(selected.clone(), &config.dashboard);
    request.comparison = ComparisonMode::from_selection(selected, args.compare);
    if let Some(upload) = read_upload(&args.upload)? {
        request.data_source = if args.upload.upload_only {
            DataSource::UploadOnly(upload)
        } else {
            DataSource::Uploaded(upload)
        };
    }
    if let Some(kind) = args.chart {
        request.chart = kind;
    }
    if !args.milestones.is_empty() {
        request.milestones = args.milestones.into_iter().map(Period::new).collect();
    }
    if let Some(h) = args.horizon {
        request.horizon = h;
    }

    let view = Dashboard::new(&registry).render(&request)?;
    print_view(&view);

    let output = args.output.unwrap_or_else(|| PathBuf::from(&view.export_file_name));
    fs::write(&output, table_to_csv(&view.table)?)
        .with_context(|| format!("writing {}", output.display()))?;
    info!(path = %output.display(), rows = view.table.len(), "wrote forecast table");

    if let Some(path) = args.chart_json {
        fs::write(&path, view.chart.to_json()?)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "wrote chart data");
    }
    Ok(())
}

fn cmd_lookup(
    config: &AppConfig,
    company: String,
    years: Vec<i32>,
    horizon: Option<usize>,
) -> Result<()> {
    let registry = Registry::load(&config.registry);

    let mut request = DashboardConfig::bundled(company, &config.dashboard);
    request.milestones = years.into_iter().map(Period::new).collect();
    if let Some(h) = horizon {
        request.horizon = h;
    }

    let view = Dashboard::new(&registry).render(&request)?;
    let predictions: Vec<&str> = view
        .series
        .iter()
        .flat_map(|s| s.table.columns().iter().map(String::as_str))
        .filter(|c| c.ends_with(" Prediction"))
        .collect();

    for &period in &request.milestones {
        let lookup = emission_fcst_core::lookup(&view.table, period, &predictions)?;
        println!("{}", serde_json::json!({ "year": period, "result": lookup }));
    }
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::List => {
            cmd_list(&config);
            Ok(())
        }
        Commands::Forecast(args) => cmd_forecast(&config, args),
        Commands::Lookup {
            company,
            years,
            horizon,
        } => cmd_lookup(&config, company, years, horizon),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forecast_args() {
        let cli = Cli::try_parse_from([
            "emission-fcst",
            "forecast",
            "--company",
            "Meta",
            "--compare",
            "Google",
            "Amazon",
            "--chart",
            "bar",
            "--milestone",
            "2030",
            "2050",
        ])
        .unwrap();

        match cli.command {
            Commands::Forecast(args) => {
                assert_eq!(args.company.as_deref(), Some("Meta"));
                assert_eq!(args.compare, vec!["Google", "Amazon"]);
                assert_eq!(args.chart, Some(ChartKind::Bar));
                assert_eq!(args.milestones, vec![2030, 2050]);
                assert!(args.upload.upload.is_none());
            }
            _ => panic!("expected forecast command"),
        }
    }

    #[test]
    fn test_upload_flags_require_upload() {
        let result = Cli::try_parse_from(["emission-fcst", "forecast", "--multi-scope"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_upload_model_parses() {
        let cli = Cli::try_parse_from([
            "emission-fcst",
            "forecast",
            "--upload",
            "acme_2023.csv",
            "--model",
            "holt",
        ])
        .unwrap();
        match cli.command {
            Commands::Forecast(args) => {
                assert_eq!(args.upload.model, ModelKind::Holt);
                assert!(!args.upload.upload_only);
            }
            _ => panic!("expected forecast command"),
        }
    }

    #[test]
    fn test_upload_only_requires_upload() {
        let result = Cli::try_parse_from(["emission-fcst", "forecast", "--upload-only"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from([
            "emission-fcst",
            "forecast",
            "--upload",
            "acme.csv",
            "--upload-only",
        ])
        .unwrap();
        match cli.command {
            Commands::Forecast(args) => assert!(args.upload.upload_only),
            _ => panic!("expected forecast command"),
        }
    }

    #[test]
    fn test_lookup_requires_year() {
        assert!(Cli::try_parse_from(["emission-fcst", "lookup", "--company", "Meta"]).is_err());
    }

    #[test]
    fn test_read_upload_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acme_2023.csv");
        fs::write(&path, "Year,Total\n2020,1\n").unwrap();

        let args = UploadArgs {
            upload: Some(path),
            target_column: Some("Total".to_string()),
            multi_scope: false,
            upload_only: false,
            model: ModelKind::Naive,
        };
        let upload = read_upload(&args).unwrap().unwrap();
        assert_eq!(upload.file_name, "acme_2023.csv");
        assert_eq!(upload.label(), "acme");
    }

    #[test]
    fn test_default_config_when_absent() {
        let config = load_config(None).unwrap();
        assert_eq!(config.dashboard.horizon, emission_fcst_core::DEFAULT_HORIZON);
    }
}
