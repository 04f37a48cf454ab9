//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys) are referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub scanner: ScannerConfig,
    pub analysis: AnalysisConfig,
    pub confidence: ConfidenceConfig,
    pub providers: ProvidersConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScannerConfig {
    pub name: String,
    /// Pause between per-match odds requests, in milliseconds.
    pub request_pause_ms: u64,
    /// How many per-match odds fetches may run concurrently.
    pub fetch_concurrency: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    /// Minimum acceptable best price.
    pub min_odds: f64,
    /// Minimum acceptable implied probability. Redundant with `min_odds`
    /// (`probability = 1/price`); the two are collapsed to one effective
    /// threshold when the run's `FilterCriteria` is built.
    #[serde(default)]
    pub min_probability: Option<f64>,
    /// Fixture search window in hours.
    pub hours_ahead: i64,
    /// Show only compliant markets in reports.
    pub only_compliant: bool,
    /// Fixtures kicking off within this many hours are fetched first
    /// (odds are most likely to be posted for near matches).
    pub priority_window_hours: i64,
}

/// Weights of the confidence score used to rank compliant markets.
/// Tunable configuration, not domain truth.
#[derive(Debug, Deserialize, Clone)]
pub struct ConfidenceConfig {
    pub roi_weight: f64,
    pub volatility_weight: f64,
    pub margin_weight: f64,
    pub dispersion_weight: f64,
    /// Historical ROI prior per market key ("1x", "x2", "over", "under").
    pub market_roi: HashMap<String, f64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProvidersConfig {
    pub the_odds_api: TheOddsApiConfig,
    pub odds_api_io: OddsApiIoConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TheOddsApiConfig {
    pub enabled: bool,
    pub api_key_env: String,
    /// Regions parameter passed to the API, e.g. "eu,us".
    pub regions: String,
    /// Bookmakers allow-list; quotes from any other book are dropped.
    pub bookmakers: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OddsApiIoConfig {
    pub enabled: bool,
    pub api_key_env: String,
    /// The single bookmaker this secondary source contributes.
    pub bookmaker: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    /// Offset applied to kickoff times in reports (hours from UTC).
    pub timezone_offset_hours: i64,
    /// Directory CSV exports are written to.
    pub output_dir: String,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
