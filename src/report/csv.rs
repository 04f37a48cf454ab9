//! CSV export with a stable, versioned column schema.
//!
//! Downstream tooling (historical datasets, the offline calibration
//! command) depends on these exact column names and numeric semantics:
//! prices are decimal odds (> 1.0), probabilities are 0–1 floats,
//! percentages are 0–100 floats. Optional metrics are empty cells,
//! never zeros. Rows are sorted by dispersion score descending.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Duration;
use tracing::info;

use crate::types::AnalyzedMarket;

/// Bump when a column is added, removed, or changes meaning.
pub const SCHEMA_VERSION: u32 = 1;

/// The exported column set, in order.
pub const COLUMNS: &[&str] = &[
    "match",
    "kickoff_local",
    "league",
    "market_family",
    "market",
    "outcome",
    "best_price",
    "best_bookmaker",
    "bookmaker_count",
    "avg_price",
    "implied_probability",
    "volatility_pct",
    "bookmaker_margin_pct",
    "avg_market_margin_pct",
    "margin_advantage_pct",
    "price_advantage",
    "score_final",
    "score_basis",
    "disagreement_index",
    "compliant",
    "confidence",
    "rank",
];

/// Serialise results into CSV bytes. Exposed separately from the file
/// writer so tests can assert on content without touching disk.
pub fn render(results: &[AnalyzedMarket], timezone_offset_hours: i64) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(COLUMNS)
        .context("Failed to write CSV header")?;

    let mut sorted: Vec<&AnalyzedMarket> = results.iter().collect();
    sorted.sort_by(|a, b| {
        b.result
            .summary
            .score
            .value
            .partial_cmp(&a.result.summary.score.value)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.fixture.id.cmp(&b.fixture.id))
    });

    for market in sorted {
        let summary = &market.result.summary;
        let kickoff_local = (market.fixture.kickoff_time
            + Duration::hours(timezone_offset_hours))
        .format("%Y-%m-%d %H:%M")
        .to_string();

        writer
            .write_record(&[
                market.fixture.to_string(),
                kickoff_local,
                market.fixture.league.clone(),
                summary.market.family().to_string(),
                summary.market.to_string(),
                summary.outcome.clone(),
                format!("{}", summary.best_price),
                summary.best_bookmaker.clone(),
                summary.bookmaker_count.to_string(),
                format!("{:.4}", summary.avg_price),
                format!("{:.6}", summary.implied_probability),
                format!("{:.2}", summary.volatility_pct),
                opt(summary.bookmaker_margin_pct, 2),
                opt(summary.avg_market_margin_pct, 2),
                opt(summary.margin_advantage_pct(), 2),
                format!("{:.4}", summary.price_advantage()),
                format!("{:.4}", summary.score.value),
                summary.score.basis.to_string(),
                opt(summary.disagreement_index, 4),
                if market.result.compliant { "yes" } else { "no" }.to_string(),
                format!("{:.4}", market.result.confidence),
                market
                    .result
                    .rank
                    .map(|r| r.to_string())
                    .unwrap_or_default(),
            ])
            .context("Failed to write CSV row")?;
    }

    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV writer: {e}"))
}

/// Write results to a CSV file.
pub fn export(
    results: &[AnalyzedMarket],
    timezone_offset_hours: i64,
    path: &Path,
) -> Result<()> {
    let bytes = render(results, timezone_offset_hours)?;
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
    file.write_all(&bytes)
        .with_context(|| format!("Failed to write CSV file: {}", path.display()))?;

    info!(
        path = %path.display(),
        rows = results.len(),
        schema = SCHEMA_VERSION,
        "Results exported"
    );
    Ok(())
}

/// An optional metric as a cell: formatted when present, empty when not.
fn opt(value: Option<f64>, decimals: usize) -> String {
    value
        .map(|v| format!("{v:.decimals$}"))
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
