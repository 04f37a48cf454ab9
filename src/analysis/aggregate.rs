//! Market aggregation.
//!
//! Turns the unordered collection of per-bookmaker quotes for a single
//! (match, market, outcome) into one `MarketSummary`: average price,
//! best price and its source, volatility, bookmaker margin, and the
//! cross-bookmaker dispersion score.

use tracing::debug;

use crate::analysis::disagreement;
use crate::types::{
    AnalysisError, ComplementSet, DispersionScore, MarketSummary, Quote, ScoreBasis,
};

/// Aggregate all quotes for one (match, market, outcome) into a summary.
///
/// `complements` carries, per bookmaker, the full set of complementary
/// prices for the market (all three 1/X/2 prices for double-chance
/// markets, both sides of the line for totals). Bookmakers without a
/// complete complementary set are simply absent from it — margin is then
/// reported as `None` for them, never as zero.
///
/// Pure function of its input. Fails only on an empty or heterogeneous
/// quote collection; the caller should skip that market and continue.
pub fn aggregate(
    quotes: &[Quote],
    complements: &[ComplementSet],
) -> Result<MarketSummary, AnalysisError> {
    let first = quotes.first().ok_or(AnalysisError::EmptyQuotes)?;

    for q in &quotes[1..] {
        if q.match_id != first.match_id {
            return Err(AnalysisError::MixedQuotes(format!(
                "match {} vs {}",
                first.match_id, q.match_id
            )));
        }
        if q.market != first.market {
            return Err(AnalysisError::MixedQuotes(format!(
                "market {} vs {}",
                first.market, q.market
            )));
        }
        if q.outcome != first.outcome {
            return Err(AnalysisError::MixedQuotes(format!(
                "outcome {} vs {}",
                first.outcome, q.outcome
            )));
        }
    }

    let prices: Vec<f64> = quotes.iter().map(|q| q.price).collect();
    let avg_price = mean(&prices);

    // Higher decimal price is always better for the bettor. On a tie any
    // of the tied bookmakers may be reported; the first one wins here.
    let mut best = first;
    for q in &quotes[1..] {
        if q.price > best.price {
            best = q;
        }
    }

    let implied_probability = 1.0 / best.price;
    let volatility_pct = volatility_pct(&prices, avg_price);

    let bookmaker_margin_pct = complements
        .iter()
        .find(|c| c.bookmaker == best.bookmaker)
        .map(|c| c.overround_pct());

    let avg_market_margin_pct = if complements.is_empty() {
        None
    } else {
        let margins: Vec<f64> = complements.iter().map(|c| c.overround_pct()).collect();
        Some(mean(&margins))
    };

    let score = dispersion_score(&prices, bookmaker_margin_pct, avg_market_margin_pct);
    let disagreement_index = disagreement::disagreement_index(complements);

    debug!(
        match_id = %first.match_id,
        market = %first.market,
        outcome = %first.outcome,
        best_price = best.price,
        best_bookmaker = %best.bookmaker,
        books = quotes.len(),
        score = score.value,
        basis = %score.basis,
        "Market aggregated"
    );

    Ok(MarketSummary {
        match_id: first.match_id.clone(),
        market: first.market,
        outcome: first.outcome.clone(),
        avg_price,
        best_price: best.price,
        best_bookmaker: best.bookmaker.clone(),
        implied_probability,
        volatility_pct,
        bookmaker_margin_pct,
        avg_market_margin_pct,
        bookmaker_count: quotes.len(),
        score,
        disagreement_index,
    })
}

/// Arithmetic mean. Callers guarantee a non-empty slice.
fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Coefficient of variation of the prices as a percentage:
/// population standard deviation divided by the mean, × 100.
/// A single observation has no computable variance — defined as 0.
fn volatility_pct(prices: &[f64], avg: f64) -> f64 {
    if prices.len() < 2 || avg <= 0.0 {
        return 0.0;
    }
    let variance = prices.iter().map(|p| (p - avg).powi(2)).sum::<f64>() / prices.len() as f64;
    variance.sqrt() / avg * 100.0
}

/// The canonical dispersion score ("final score").
///
/// Primary formula: margin advantage of the best-price bookmaker over the
/// market average, divided by that bookmaker's own margin. Requires both
/// margins known and a positive bookmaker margin. Fallback: mean absolute
/// deviation of the quotes' implied probabilities from their mean. The
/// basis in effect is recorded on the result.
fn dispersion_score(
    prices: &[f64],
    bookmaker_margin_pct: Option<f64>,
    avg_market_margin_pct: Option<f64>,
) -> DispersionScore {
    if let (Some(own), Some(avg)) = (bookmaker_margin_pct, avg_market_margin_pct) {
        if own > 0.0 {
            return DispersionScore {
                value: (avg - own) / own,
                basis: ScoreBasis::MarginRatio,
            };
        }
    }

    let probs: Vec<f64> = prices.iter().map(|p| 1.0 / p).collect();
    let mean_prob = mean(&probs);
    let mad = probs.iter().map(|p| (p - mean_prob).abs()).sum::<f64>() / probs.len() as f64;

    DispersionScore {
        value: mad,
        basis: ScoreBasis::MeanAbsDeviation,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
