//! Report rendering.
//!
//! Formats analysis results into console tables and summary blocks.
//! CSV export lives in the `csv` submodule. Kickoff times are shifted
//! into the report timezone here and nowhere else — everything upstream
//! is UTC.

pub mod csv;

use std::collections::HashMap;

use chrono::Duration;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::types::{AnalyzedMarket, FilterCriteria};

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct AnalysisRow {
    #[tabled(rename = "Match")]
    fixture: String,
    #[tabled(rename = "Market")]
    market: String,
    #[tabled(rename = "Best")]
    best_price: String,
    #[tabled(rename = "Bookmaker")]
    bookmaker: String,
    #[tabled(rename = "Margin")]
    margin: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Ok?")]
    compliant: String,
    #[tabled(rename = "Kickoff")]
    kickoff: String,
    #[tabled(rename = "League")]
    league: String,
}

#[derive(Tabled)]
struct ComplianceRow {
    #[tabled(rename = "#")]
    rank: String,
    #[tabled(rename = "Match")]
    fixture: String,
    #[tabled(rename = "Market")]
    market: String,
    #[tabled(rename = "Best")]
    best_price: String,
    #[tabled(rename = "Bookmaker")]
    bookmaker: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
    #[tabled(rename = "Kickoff")]
    kickoff: String,
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Renders analysis results for the console.
pub struct ReportGenerator {
    /// Hours from UTC applied to kickoff times in rendered output.
    timezone_offset_hours: i64,
}

impl ReportGenerator {
    pub fn new(timezone_offset_hours: i64) -> Self {
        Self {
            timezone_offset_hours,
        }
    }

    fn local_kickoff(&self, market: &AnalyzedMarket) -> String {
        (market.fixture.kickoff_time + Duration::hours(self.timezone_offset_hours))
            .format("%d/%m %H:%M")
            .to_string()
    }

    /// Full analysis table with a summary header.
    pub fn analysis_table(
        &self,
        results: &[AnalyzedMarket],
        criteria: &FilterCriteria,
        show_all: bool,
    ) -> String {
        if results.is_empty() {
            return "No markets analysed — nothing to report.".to_string();
        }

        let shown: Vec<&AnalyzedMarket> = results
            .iter()
            .filter(|m| show_all || m.result.compliant)
            .collect();
        let compliant = results.iter().filter(|m| m.result.compliant).count();
        let rate = compliant as f64 / results.len() as f64 * 100.0;

        let rows: Vec<AnalysisRow> = shown
            .iter()
            .map(|m| {
                let summary = &m.result.summary;
                AnalysisRow {
                    fixture: m.fixture.to_string(),
                    market: format!("{} {}", summary.market.family(), summary.outcome),
                    best_price: format!("{:.2}", summary.best_price),
                    bookmaker: summary.best_bookmaker.clone(),
                    margin: summary
                        .bookmaker_margin_pct
                        .map(|v| format!("{v:.1}%"))
                        .unwrap_or_else(|| "N/A".to_string()),
                    score: format!("{:.4}", summary.score.value),
                    compliant: if m.result.compliant { "yes" } else { "no" }.to_string(),
                    kickoff: self.local_kickoff(m),
                    league: m.fixture.league.clone(),
                }
            })
            .collect();

        let table = Table::new(rows).with(Style::sharp()).to_string();

        format!(
            "FOOTBALL ODDS ANALYSIS\n\
             ======================\n\
             Markets analysed: {}\n\
             Compliant: {} ({rate:.1}%)\n\
             Criteria: {criteria}\n\
             \n\
             {table}\n\
             \n\
             1X = home win or draw | X2 = draw or away win\n\
             Margin = bookmaker overround (lower is better for the bettor)\n\
             Score = margin advantage / bookmaker margin (MAD fallback)\n",
            results.len(),
            compliant,
        )
    }

    /// Compliant subset only, in rank order.
    pub fn compliance_report(&self, results: &[AnalyzedMarket]) -> String {
        let compliant: Vec<&AnalyzedMarket> =
            results.iter().filter(|m| m.result.compliant).collect();

        if compliant.is_empty() {
            return "COMPLIANCE REPORT\n\
                    =================\n\
                    No market meets the configured criteria.\n\
                    Consider widening the thresholds."
                .to_string();
        }

        let rows: Vec<ComplianceRow> = compliant
            .iter()
            .map(|m| {
                let summary = &m.result.summary;
                ComplianceRow {
                    rank: m
                        .result
                        .rank
                        .map(|r| r.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    fixture: m.fixture.to_string(),
                    market: format!("{}", summary.market),
                    best_price: format!("{:.2}", summary.best_price),
                    bookmaker: summary.best_bookmaker.clone(),
                    confidence: format!("{:.4}", m.result.confidence),
                    kickoff: self.local_kickoff(m),
                }
            })
            .collect();

        let table = Table::new(rows).with(Style::sharp()).to_string();

        format!(
            "COMPLIANCE REPORT\n\
             =================\n\
             Compliant markets: {}/{}\n\
             \n\
             {table}\n",
            compliant.len(),
            results.len(),
        )
    }

    /// Aggregate statistics over one run's results.
    pub fn summary_stats(&self, results: &[AnalyzedMarket]) -> SummaryStats {
        let total = results.len();
        let compliant = results.iter().filter(|m| m.result.compliant).count();

        let mut by_family: HashMap<String, usize> = HashMap::new();
        let mut by_league: HashMap<String, usize> = HashMap::new();
        let mut by_bookmaker: HashMap<String, usize> = HashMap::new();
        for m in results {
            *by_family
                .entry(m.result.summary.market.family().to_string())
                .or_default() += 1;
            *by_league.entry(m.fixture.league.clone()).or_default() += 1;
            *by_bookmaker
                .entry(m.result.summary.best_bookmaker.clone())
                .or_default() += 1;
        }

        let prices: Vec<f64> = results.iter().map(|m| m.result.summary.best_price).collect();
        let probs: Vec<f64> = results
            .iter()
            .map(|m| m.result.summary.implied_probability)
            .collect();

        SummaryStats {
            total_markets: total,
            compliant_markets: compliant,
            compliance_rate_pct: if total > 0 {
                compliant as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            markets_by_family: by_family,
            markets_by_league: by_league,
            markets_by_bookmaker: by_bookmaker,
            best_price_range: range_of(&prices),
            implied_probability_range: range_of(&probs),
        }
    }
}

/// (min, mean, max) of a value set; zeros when empty.
fn range_of(values: &[f64]) -> (f64, f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    (min, mean, max)
}

/// Aggregate statistics block for the end of a run.
#[derive(Debug, Clone)]
pub struct SummaryStats {
    pub total_markets: usize,
    pub compliant_markets: usize,
    pub compliance_rate_pct: f64,
    pub markets_by_family: HashMap<String, usize>,
    pub markets_by_league: HashMap<String, usize>,
    pub markets_by_bookmaker: HashMap<String, usize>,
    /// (min, mean, max) of best prices.
    pub best_price_range: (f64, f64, f64),
    /// (min, mean, max) of implied probabilities.
    pub implied_probability_range: (f64, f64, f64),
}

impl std::fmt::Display for SummaryStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Markets: {} ({} compliant, {:.1}%)",
            self.total_markets, self.compliant_markets, self.compliance_rate_pct)?;
        let (pmin, pmean, pmax) = self.best_price_range;
        writeln!(f, "Best price: min {pmin:.2} / avg {pmean:.2} / max {pmax:.2}")?;
        let (qmin, qmean, qmax) = self.implied_probability_range;
        writeln!(
            f,
            "Implied probability: min {:.1}% / avg {:.1}% / max {:.1}%",
            qmin * 100.0,
            qmean * 100.0,
            qmax * 100.0
        )?;

        let mut leagues: Vec<(&String, &usize)> = self.markets_by_league.iter().collect();
        leagues.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        for (league, count) in leagues {
            writeln!(f, "  {league}: {count}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
