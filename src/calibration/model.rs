//! Logistic regression and evaluation metrics.
//!
//! A deliberately small numeric core: gradient-descent logistic fit with
//! L2 on the weights (bias excluded), rank-based AUC with tie handling,
//! log-loss, Brier score, top-k ROI, and a calibration table. Everything
//! operates on plain `f64` slices.

use serde::Serialize;

/// Numerically safe sigmoid.
pub fn sigmoid(z: f64) -> f64 {
    let z = z.clamp(-35.0, 35.0);
    1.0 / (1.0 + (-z).exp())
}

/// Fit logistic regression by full-batch gradient descent.
///
/// `rows` is the design matrix (one inner Vec per observation), `y` the
/// 0/1 outcomes. Returns `[bias, w_1, …, w_p]`. L2 regularisation applies
/// to the weights only.
pub fn fit_logistic(
    rows: &[Vec<f64>],
    y: &[f64],
    learning_rate: f64,
    l2: f64,
    iterations: usize,
) -> Vec<f64> {
    let n = rows.len();
    let p = rows.first().map(|r| r.len()).unwrap_or(0);
    let mut w = vec![0.0; p + 1];
    if n == 0 {
        return w;
    }

    for _ in 0..iterations {
        let mut grad = vec![0.0; p + 1];
        for (row, yi) in rows.iter().zip(y.iter()) {
            let z = w[0] + row.iter().zip(&w[1..]).map(|(x, wi)| x * wi).sum::<f64>();
            let err = sigmoid(z) - yi;
            grad[0] += err;
            for (g, x) in grad[1..].iter_mut().zip(row.iter()) {
                *g += err * x;
            }
        }
        w[0] -= learning_rate * grad[0] / n as f64;
        let (_, weights) = w.split_at_mut(1);
        for (wi, gi) in weights.iter_mut().zip(&grad[1..]) {
            *wi -= learning_rate * (*gi / n as f64 + l2 * *wi);
        }
    }

    w
}

/// Predicted probabilities for a design matrix under fitted weights.
pub fn predict_proba(rows: &[Vec<f64>], w: &[f64]) -> Vec<f64> {
    rows.iter()
        .map(|row| {
            let z = w[0] + row.iter().zip(&w[1..]).map(|(x, wi)| x * wi).sum::<f64>();
            sigmoid(z)
        })
        .collect()
}

/// Rank-based AUC (Mann–Whitney) with average ranks over score ties.
/// NaN when either class is absent.
pub fn auc(scores: &[f64], y: &[f64]) -> f64 {
    let n = scores.len();
    let n_pos = y.iter().filter(|v| **v > 0.5).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return f64::NAN;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|a, b| {
        scores[*a]
            .partial_cmp(&scores[*b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Average ranks across runs of equal scores.
    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg_rank = (i + 1 + j + 1) as f64 / 2.0;
        for index in &order[i..=j] {
            ranks[*index] = avg_rank;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = y
        .iter()
        .zip(ranks.iter())
        .filter(|(yi, _)| **yi > 0.5)
        .map(|(_, r)| r)
        .sum();

    (pos_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0) / (n_pos * n_neg) as f64
}

/// Mean negative log-likelihood, probabilities clipped away from {0, 1}.
pub fn log_loss(p: &[f64], y: &[f64]) -> f64 {
    if p.is_empty() {
        return f64::NAN;
    }
    let total: f64 = p
        .iter()
        .zip(y.iter())
        .map(|(pi, yi)| {
            let pi = pi.clamp(1e-12, 1.0 - 1e-12);
            -(yi * pi.ln() + (1.0 - yi) * (1.0 - pi).ln())
        })
        .sum();
    total / p.len() as f64
}

/// Brier score: mean squared error between probability and outcome.
/// 0.0 is perfect; 0.25 is an always-50% predictor on balanced outcomes.
pub fn brier(p: &[f64], y: &[f64]) -> f64 {
    if p.is_empty() {
        return f64::NAN;
    }
    p.iter()
        .zip(y.iter())
        .map(|(pi, yi)| (pi - yi).powi(2))
        .sum::<f64>()
        / p.len() as f64
}

/// The three headline metrics together.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Metrics {
    pub auc: f64,
    pub log_loss: f64,
    pub brier: f64,
}

pub fn metrics(p: &[f64], y: &[f64]) -> Metrics {
    Metrics {
        auc: auc(p, y),
        log_loss: log_loss(p, y),
        brier: brier(p, y),
    }
}

// ---------------------------------------------------------------------------
// ROI
// ---------------------------------------------------------------------------

/// Flat-stake profit: odds − 1 on a win, −1 on a loss.
fn profit(won: bool, odds: f64) -> f64 {
    if won {
        odds - 1.0
    } else {
        -1.0
    }
}

/// Performance of the top fraction of rows selected by a score.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RoiSummary {
    pub n: usize,
    pub roi_pct: f64,
    pub winrate_pct: f64,
    pub avg_odds: f64,
}

impl RoiSummary {
    pub fn empty() -> Self {
        Self {
            n: 0,
            roi_pct: f64::NAN,
            winrate_pct: f64::NAN,
            avg_odds: f64::NAN,
        }
    }
}

/// Flat-stake ROI of the top `k_frac` of rows ranked by `scores`.
/// Rows with a non-finite score or odds are excluded before selection.
pub fn roi_top_k(scores: &[f64], y: &[f64], odds: &[f64], k_frac: f64) -> RoiSummary {
    let mut rows: Vec<(f64, f64, f64)> = scores
        .iter()
        .zip(y.iter())
        .zip(odds.iter())
        .filter(|((s, _), o)| s.is_finite() && o.is_finite())
        .map(|((s, yi), o)| (*s, *yi, *o))
        .collect();

    if rows.is_empty() {
        return RoiSummary::empty();
    }

    rows.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    let k = ((k_frac * rows.len() as f64).floor() as usize).max(1);
    let top = &rows[..k.min(rows.len())];

    let profits: Vec<f64> = top.iter().map(|(_, yi, o)| profit(*yi > 0.5, *o)).collect();
    let wins = top.iter().filter(|(_, yi, _)| *yi > 0.5).count();

    RoiSummary {
        n: top.len(),
        roi_pct: profits.iter().sum::<f64>() / top.len() as f64 * 100.0,
        winrate_pct: wins as f64 / top.len() as f64 * 100.0,
        avg_odds: top.iter().map(|(_, _, o)| o).sum::<f64>() / top.len() as f64,
    }
}

// ---------------------------------------------------------------------------
// Calibration table
// ---------------------------------------------------------------------------

/// One probability bin: predicted mean vs realised win rate.
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationBin {
    pub bin: usize,
    pub n: usize,
    pub p_min: f64,
    pub p_max: f64,
    pub p_mean: f64,
    pub winrate_pct: f64,
    /// realised rate − predicted mean (positive = model under-predicts).
    pub gap: f64,
}

/// Equal-count probability bins (quantile style), sorted ascending.
pub fn calibration_table(p: &[f64], y: &[f64], bins: usize) -> Vec<CalibrationBin> {
    let mut rows: Vec<(f64, f64)> = p
        .iter()
        .zip(y.iter())
        .filter(|(pi, _)| pi.is_finite())
        .map(|(pi, yi)| (*pi, *yi))
        .collect();
    if rows.is_empty() || bins == 0 {
        return Vec::new();
    }
    rows.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let n = rows.len();
    let per_bin = (n as f64 / bins as f64).ceil() as usize;
    let mut table = Vec::new();

    for (index, chunk) in rows.chunks(per_bin.max(1)).enumerate() {
        let count = chunk.len();
        let p_mean = chunk.iter().map(|(pi, _)| pi).sum::<f64>() / count as f64;
        let winrate = chunk.iter().filter(|(_, yi)| *yi > 0.5).count() as f64 / count as f64;
        table.push(CalibrationBin {
            bin: index,
            n: count,
            p_min: chunk.first().map(|(pi, _)| *pi).unwrap_or(f64::NAN),
            p_max: chunk.last().map(|(pi, _)| *pi).unwrap_or(f64::NAN),
            p_mean,
            winrate_pct: winrate * 100.0,
            gap: winrate - p_mean,
        });
    }

    table
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid_bounds() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!(sigmoid(100.0) > 0.999_999);
        assert!(sigmoid(-100.0) < 1e-6);
        assert!(sigmoid(f64::MAX).is_finite());
    }

    #[test]
    fn test_auc_perfect_separation() {
        let scores = [0.1, 0.2, 0.8, 0.9];
        let y = [0.0, 0.0, 1.0, 1.0];
        assert!((auc(&scores, &y) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_auc_inverted_separation() {
        let scores = [0.9, 0.8, 0.2, 0.1];
        let y = [0.0, 0.0, 1.0, 1.0];
        assert!(auc(&scores, &y).abs() < 1e-12);
    }

    #[test]
    fn test_auc_constant_score_is_half() {
        let scores = [0.5, 0.5, 0.5, 0.5];
        let y = [1.0, 0.0, 1.0, 0.0];
        assert!((auc(&scores, &y) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_auc_single_class_nan() {
        let scores = [0.1, 0.9];
        assert!(auc(&scores, &[1.0, 1.0]).is_nan());
        assert!(auc(&scores, &[0.0, 0.0]).is_nan());
    }

    #[test]
    fn test_brier_always_half_on_balanced() {
        let p = vec![0.5; 100];
        let y: Vec<f64> = (0..100).map(|i| (i % 2) as f64).collect();
        assert!((brier(&p, &y) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_brier_perfect_and_terrible() {
        assert!(brier(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-12);
        assert!((brier(&[0.0, 1.0], &[1.0, 0.0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_log_loss_clips_extremes() {
        let loss = log_loss(&[1.0], &[0.0]);
        assert!(loss.is_finite());
        assert!(loss > 10.0);
    }

    #[test]
    fn test_fit_separable_data() {
        // One feature, cleanly separated at 0.
        let rows: Vec<Vec<f64>> = (-10..10).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (-10..10).map(|i| if i >= 0 { 1.0 } else { 0.0 }).collect();

        let w = fit_logistic(&rows, &y, 0.1, 0.01, 2000);
        let p = predict_proba(&rows, &w);

        assert!(w[1] > 0.0); // positive slope on the separating feature
        assert!(auc(&p, &y) > 0.9);
        assert!(p[0] < 0.5); // far-negative sample
        assert!(p[19] > 0.5); // far-positive sample
    }

    #[test]
    fn test_fit_empty_is_zero_weights() {
        let w = fit_logistic(&[], &[], 0.05, 0.5, 100);
        assert_eq!(w, vec![0.0]);
    }

    #[test]
    fn test_l2_shrinks_weights() {
        let rows: Vec<Vec<f64>> = (-10..10).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (-10..10).map(|i| if i >= 0 { 1.0 } else { 0.0 }).collect();

        let loose = fit_logistic(&rows, &y, 0.1, 0.0, 2000);
        let tight = fit_logistic(&rows, &y, 0.1, 2.0, 2000);
        assert!(tight[1].abs() < loose[1].abs());
    }

    #[test]
    fn test_roi_top_k_selects_best() {
        // Highest-scored half wins at odds 2.0 → ROI +100%.
        let scores = [0.9, 0.8, 0.2, 0.1];
        let y = [1.0, 1.0, 0.0, 0.0];
        let odds = [2.0, 2.0, 2.0, 2.0];
        let roi = roi_top_k(&scores, &y, &odds, 0.5);

        assert_eq!(roi.n, 2);
        assert!((roi.roi_pct - 100.0).abs() < 1e-9);
        assert!((roi.winrate_pct - 100.0).abs() < 1e-9);
        assert!((roi.avg_odds - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_roi_top_k_losers() {
        let scores = [0.9, 0.1];
        let y = [0.0, 1.0];
        let odds = [1.5, 1.5];
        let roi = roi_top_k(&scores, &y, &odds, 0.5);
        assert_eq!(roi.n, 1);
        assert!((roi.roi_pct + 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_roi_skips_non_finite() {
        let scores = [f64::NAN, 0.8];
        let y = [1.0, 1.0];
        let odds = [2.0, 1.8];
        let roi = roi_top_k(&scores, &y, &odds, 1.0);
        assert_eq!(roi.n, 1);
        assert!((roi.avg_odds - 1.8).abs() < 1e-12);
    }

    #[test]
    fn test_roi_empty() {
        let roi = roi_top_k(&[], &[], &[], 0.2);
        assert_eq!(roi.n, 0);
        assert!(roi.roi_pct.is_nan());
    }

    #[test]
    fn test_calibration_table_bins() {
        let p: Vec<f64> = (0..100).map(|i| i as f64 / 100.0).collect();
        // Outcome follows probability exactly in aggregate: win iff p ≥ 0.5
        let y: Vec<f64> = p.iter().map(|pi| if *pi >= 0.5 { 1.0 } else { 0.0 }).collect();
        let table = calibration_table(&p, &y, 10);

        assert_eq!(table.len(), 10);
        assert_eq!(table.iter().map(|b| b.n).sum::<usize>(), 100);
        // Bins sorted ascending by probability
        for pair in table.windows(2) {
            assert!(pair[0].p_max <= pair[1].p_min + 1e-12);
        }
        // Low bins lose, high bins win
        assert!(table.first().unwrap().winrate_pct < 1e-9);
        assert!((table.last().unwrap().winrate_pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_calibration_table_empty() {
        assert!(calibration_table(&[], &[], 10).is_empty());
    }

    #[test]
    fn test_metrics_bundle() {
        let p = [0.9, 0.1];
        let y = [1.0, 0.0];
        let m = metrics(&p, &y);
        assert!((m.auc - 1.0).abs() < 1e-12);
        assert!(m.brier < 0.05);
        assert!(m.log_loss < 0.2);
    }
}
