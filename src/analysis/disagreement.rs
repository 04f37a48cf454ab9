//! Bookmaker disagreement metrics.
//!
//! Computes a disagreement index over the bookmakers quoting one market:
//! each book's prices are first normalised into a fair (vig-removed)
//! probability distribution, then scored by Jensen–Shannon divergence
//! against the consensus (mean) distribution. The index is the mean JSD,
//! which in base 2 is bounded to [0, 1].

use crate::types::ComplementSet;

/// Floor applied to probabilities inside the KL term to keep logs finite.
const EPS: f64 = 1e-12;

/// Convert raw decimal prices into a fair probability distribution.
///
/// For prices o_i, compute r_i = 1/o_i and normalise so the vector sums
/// to 1, removing the bookmaker's overround. Non-positive prices are
/// skipped; an empty vector is returned when nothing survives.
pub fn remove_vig(prices: &[f64]) -> Vec<f64> {
    let raw: Vec<f64> = prices
        .iter()
        .filter(|p| **p > 0.0)
        .map(|p| 1.0 / p)
        .collect();
    let total: f64 = raw.iter().sum();
    if total <= 0.0 {
        return Vec::new();
    }
    raw.into_iter().map(|r| r / total).collect()
}

/// KL divergence D(p‖q) in base 2. Zero-probability entries of `p`
/// contribute nothing; zero entries of `q` are floored at `EPS`.
fn kl_divergence(p: &[f64], q: &[f64]) -> f64 {
    p.iter()
        .zip(q.iter())
        .filter(|(pi, _)| **pi > 0.0)
        .map(|(pi, qi)| pi * (pi / qi.max(EPS)).log2())
        .sum()
}

/// Jensen–Shannon divergence between two distributions of equal length,
/// in base 2: symmetric, finite, and in [0, 1].
pub fn jensen_shannon(p: &[f64], q: &[f64]) -> f64 {
    let m: Vec<f64> = p
        .iter()
        .zip(q.iter())
        .map(|(pi, qi)| (pi + qi) / 2.0)
        .collect();
    0.5 * (kl_divergence(p, &m) + kl_divergence(q, &m))
}

/// Mean Jensen–Shannon divergence of each bookmaker's fair distribution
/// against the consensus distribution.
///
/// Only sets with the same outcome count as the first complete set are
/// compared (a 3-way book can't be scored against a 2-way one). Returns
/// `None` with fewer than two comparable books — disagreement is not
/// measurable from a single opinion.
pub fn disagreement_index(sets: &[ComplementSet]) -> Option<f64> {
    let fair: Vec<Vec<f64>> = sets
        .iter()
        .map(|s| remove_vig(&s.prices))
        .filter(|f| !f.is_empty())
        .collect();

    let width = fair.first()?.len();
    let rows: Vec<&Vec<f64>> = fair.iter().filter(|f| f.len() == width).collect();
    if rows.len() < 2 {
        return None;
    }

    let n = rows.len() as f64;
    let mut consensus = vec![0.0; width];
    for row in &rows {
        for (slot, value) in consensus.iter_mut().zip(row.iter()) {
            *slot += value;
        }
    }
    for slot in consensus.iter_mut() {
        *slot /= n;
    }

    let total: f64 = rows.iter().map(|row| jensen_shannon(row, &consensus)).sum();
    Some(total / n)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
