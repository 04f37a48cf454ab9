//! ODDSIGHT — Football Betting Odds Value Scanner
//!
//! Entry point. Loads configuration, initialises structured logging,
//! and dispatches the CLI subcommands: full analysis, compliance-only
//! report, provider validation, and offline calibration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use oddsight::analysis::{ConfidenceWeights, CriterionFilter};
use oddsight::calibration;
use oddsight::config::AppConfig;
use oddsight::engine::analyzer::{AnalyzerConfig, OddsAnalyzer};
use oddsight::providers::odds_api_io::OddsApiIoClient;
use oddsight::providers::the_odds_api::TheOddsApiClient;
use oddsight::providers::OddsProvider;
use oddsight::report::{self, ReportGenerator};
use oddsight::types::FilterCriteria;

const BANNER: &str = r#"
   ___   ____   ____   ____  ___   ____  _   _  _____
  / _ \ |  _ \ |  _ \ / ___||_ _| / ___|| | | ||_   _|
 | | | || | | || | | |\___ \ | | | |  _ | |_| |  | |
 | |_| || |_| || |_| | ___) || | | |_| ||  _  |  | |
  \___/ |____/ |____/ |____/|___| \____||_| |_|  |_|

  Football Betting Odds Value Scanner
  v0.1.0
"#;

#[derive(Parser)]
#[command(name = "oddsight")]
#[command(version, about = "Football betting odds value scanner", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full odds analysis and export a CSV
    Analyze {
        /// Minimum acceptable best price (overrides config)
        #[arg(long)]
        min_odds: Option<f64>,
        /// Minimum acceptable implied probability (overrides config)
        #[arg(long)]
        min_probability: Option<f64>,
        /// Fixture search window in hours (overrides config)
        #[arg(long)]
        hours_ahead: Option<i64>,
        /// Show only compliant markets in the console table
        #[arg(long)]
        only_compliant: bool,
        /// Output CSV path (timestamped name in the output dir when omitted)
        #[arg(long)]
        export_csv: Option<String>,
    },
    /// Report only the compliant markets, in rank order
    Compliance {
        #[arg(long)]
        min_odds: Option<f64>,
        #[arg(long)]
        min_probability: Option<f64>,
    },
    /// Validate configuration and provider connectivity
    Validate,
    /// Fit the calibration model over a historical dataset
    Calibrate {
        /// Historical CSV (export schema plus result/confidence columns)
        #[arg(long)]
        input: String,
        /// Fraction of verified rows held out as the test set
        #[arg(long, default_value_t = 0.2)]
        test_frac: f64,
        #[arg(long, default_value_t = 0.05)]
        learning_rate: f64,
        #[arg(long, default_value_t = 0.5)]
        l2: f64,
        #[arg(long, default_value_t = 2000)]
        iterations: usize,
        /// Augmented CSV output ("<input>_calibrated.csv" when omitted)
        #[arg(long)]
        output_csv: Option<String>,
        /// Markdown report output (printed to stdout when omitted)
        #[arg(long)]
        output_report: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    let cfg = AppConfig::load(&cli.config)?;

    init_logging();
    println!("{BANNER}");

    match cli.command {
        Commands::Analyze {
            min_odds,
            min_probability,
            hours_ahead,
            only_compliant,
            export_csv,
        } => {
            let criteria = build_criteria(
                &cfg,
                min_odds,
                min_probability,
                hours_ahead,
                only_compliant,
            );
            run_analyze(&cfg, criteria, export_csv).await
        }
        Commands::Compliance {
            min_odds,
            min_probability,
        } => {
            let criteria = build_criteria(&cfg, min_odds, min_probability, None, true);
            run_compliance(&cfg, criteria).await
        }
        Commands::Validate => run_validate(&cfg).await,
        Commands::Calibrate {
            input,
            test_frac,
            learning_rate,
            l2,
            iterations,
            output_csv,
            output_report,
        } => run_calibrate(
            &input,
            calibration::CalibrationParams {
                test_frac,
                learning_rate,
                l2,
                iterations,
                ..Default::default()
            },
            output_csv,
            output_report,
        ),
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Collapse config + CLI overrides into the run's immutable criteria.
fn build_criteria(
    cfg: &AppConfig,
    min_odds: Option<f64>,
    min_probability: Option<f64>,
    hours_ahead: Option<i64>,
    only_compliant: bool,
) -> FilterCriteria {
    FilterCriteria::new(
        min_odds.unwrap_or(cfg.analysis.min_odds),
        min_probability.or(cfg.analysis.min_probability),
        hours_ahead.unwrap_or(cfg.analysis.hours_ahead),
        only_compliant || cfg.analysis.only_compliant,
    )
}

/// Build the analyzer with every enabled provider.
fn build_analyzer(cfg: &AppConfig, criteria: FilterCriteria) -> Result<OddsAnalyzer> {
    let mut providers: Vec<Box<dyn OddsProvider>> = Vec::new();

    if cfg.providers.the_odds_api.enabled {
        let api_key = AppConfig::resolve_env(&cfg.providers.the_odds_api.api_key_env)
            .context("The Odds API key is required for analysis")?;
        providers.push(Box::new(TheOddsApiClient::new(
            api_key,
            cfg.providers.the_odds_api.regions.clone(),
            cfg.providers.the_odds_api.bookmakers.clone(),
        )?));
    }

    if cfg.providers.odds_api_io.enabled {
        let api_key = std::env::var(&cfg.providers.odds_api_io.api_key_env).ok();
        providers.push(Box::new(OddsApiIoClient::new(
            api_key,
            cfg.providers.odds_api_io.bookmaker.clone(),
        )?));
    }

    if providers.is_empty() {
        anyhow::bail!("No odds provider is enabled in the configuration");
    }

    Ok(OddsAnalyzer::new(
        providers,
        CriterionFilter::new(criteria, ConfidenceWeights::from(&cfg.confidence)),
        AnalyzerConfig {
            priority_window_hours: cfg.analysis.priority_window_hours,
            request_pause: std::time::Duration::from_millis(cfg.scanner.request_pause_ms),
            fetch_concurrency: cfg.scanner.fetch_concurrency,
        },
    ))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn run_analyze(
    cfg: &AppConfig,
    criteria: FilterCriteria,
    export_csv: Option<String>,
) -> Result<()> {
    let analyzer = build_analyzer(cfg, criteria)?;
    let generator = ReportGenerator::new(cfg.report.timezone_offset_hours);

    info!(
        scanner = %cfg.scanner.name,
        criteria = %analyzer.criteria(),
        "Starting analysis"
    );

    let statuses = analyzer.validate_connections().await;
    if statuses.iter().all(|(_, ok)| !ok) {
        anyhow::bail!("No odds provider is reachable — cannot analyse without live data");
    }

    let results = analyzer.analyze_all().await?;
    if results.is_empty() {
        println!("No markets found inside the analysis window.");
        return Ok(());
    }

    let show_all = !analyzer.criteria().only_compliant;
    println!("{}", generator.analysis_table(&results, analyzer.criteria(), show_all));
    println!("{}", generator.summary_stats(&results));

    let path = match export_csv {
        Some(p) => PathBuf::from(p),
        None => {
            let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
            Path::new(&cfg.report.output_dir).join(format!("market_analysis_{stamp}.csv"))
        }
    };
    report::csv::export(&results, cfg.report.timezone_offset_hours, &path)?;
    println!("Results exported to {}", path.display());

    Ok(())
}

async fn run_compliance(cfg: &AppConfig, criteria: FilterCriteria) -> Result<()> {
    let analyzer = build_analyzer(cfg, criteria)?;
    let generator = ReportGenerator::new(cfg.report.timezone_offset_hours);

    let results = analyzer.analyze_all().await?;
    println!("{}", generator.compliance_report(&results));
    Ok(())
}

async fn run_validate(cfg: &AppConfig) -> Result<()> {
    println!("Checking configuration…");

    let primary_key = std::env::var(&cfg.providers.the_odds_api.api_key_env).is_ok();
    let supplement_key = std::env::var(&cfg.providers.odds_api_io.api_key_env).is_ok();
    println!(
        "  {} {} ({})",
        tick(primary_key),
        cfg.providers.the_odds_api.api_key_env,
        if primary_key { "set" } else { "missing" },
    );
    println!(
        "  {} {} ({})",
        tick(supplement_key),
        cfg.providers.odds_api_io.api_key_env,
        if supplement_key { "set" } else { "optional, missing" },
    );

    if !primary_key {
        warn!("Primary provider key missing — analysis cannot run");
        return Ok(());
    }

    let analyzer = build_analyzer(
        cfg,
        FilterCriteria::new(
            cfg.analysis.min_odds,
            cfg.analysis.min_probability,
            cfg.analysis.hours_ahead,
            cfg.analysis.only_compliant,
        ),
    )?;

    println!("Probing providers…");
    let statuses = analyzer.validate_connections().await;
    for (name, ok) in &statuses {
        println!("  {} {}", tick(*ok), name);
    }

    if statuses.iter().all(|(_, ok)| *ok) {
        println!("All providers reachable.");
    } else {
        println!("Some providers are unavailable.");
    }
    Ok(())
}

fn run_calibrate(
    input: &str,
    params: calibration::CalibrationParams,
    output_csv: Option<String>,
    output_report: Option<String>,
) -> Result<()> {
    let input_path = Path::new(input);
    let records = calibration::load_dataset(input_path)?;
    let outcome = calibration::calibrate(&records, &params)?;

    let report_text = calibration::render_report(&outcome, &params);
    match output_report {
        Some(path) => {
            std::fs::write(&path, &report_text)
                .with_context(|| format!("Failed to write report: {path}"))?;
            println!("Report written to {path}");
        }
        None => println!("{report_text}"),
    }

    let output_csv = output_csv.map(PathBuf::from).unwrap_or_else(|| {
        let stem = input_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("dataset");
        input_path.with_file_name(format!("{stem}_calibrated.csv"))
    });
    calibration::write_augmented_csv(input_path, &output_csv, &outcome)?;
    println!("Augmented dataset written to {}", output_csv.display());

    println!(
        "AUC calibrated train/test: {:.4} / {:.4}",
        outcome.train_metrics.auc, outcome.test_metrics.auc,
    );
    println!(
        "AUC baseline   train/test: {:.4} / {:.4}",
        outcome.baseline_auc_train, outcome.baseline_auc_test,
    );

    Ok(())
}

fn tick(ok: bool) -> &'static str {
    if ok {
        "[ok]"
    } else {
        "[--]"
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("oddsight=info"));

    let json_logging = std::env::var("ODDSIGHT_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
