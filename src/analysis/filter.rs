//! Criterion filtering and confidence ranking.
//!
//! Classifies market summaries against the run's `FilterCriteria` and
//! ranks the compliant set by a weighted confidence score. Compliance is
//! a single-threshold predicate on the best price; the confidence score
//! never participates in the pass/fail decision.

use std::collections::HashMap;

use tracing::debug;

use crate::config::ConfidenceConfig;
use crate::types::{ComplianceResult, FilterCriteria, MarketSummary};

// ---------------------------------------------------------------------------
// Confidence weights
// ---------------------------------------------------------------------------

/// Weights of the confidence score components.
///
/// These are tunable configuration, not derived invariants — the defaults
/// (30/15/25/30) reflect the historical weighting of the source analysis
/// and can be overridden per run via `config.toml`.
#[derive(Debug, Clone)]
pub struct ConfidenceWeights {
    /// Weight of the historical-ROI prior for the market kind.
    pub roi: f64,
    /// Weight of the inverse-volatility term.
    pub volatility: f64,
    /// Weight of the inverse-margin term (contributes zero when the
    /// margin is undefined — a documented degraded computation).
    pub margin: f64,
    /// Weight of the dispersion score.
    pub dispersion: f64,
    /// Historical ROI prior per market key ("1x", "x2", "over", "under"),
    /// expressed as a fraction (0.03 = +3% historical ROI).
    pub market_roi: HashMap<String, f64>,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        let mut market_roi = HashMap::new();
        market_roi.insert("1x".to_string(), 0.031);
        market_roi.insert("x2".to_string(), 0.014);
        market_roi.insert("over".to_string(), 0.022);
        market_roi.insert("under".to_string(), 0.009);
        Self {
            roi: 0.30,
            volatility: 0.15,
            margin: 0.25,
            dispersion: 0.30,
            market_roi,
        }
    }
}

impl From<&ConfidenceConfig> for ConfidenceWeights {
    fn from(cfg: &ConfidenceConfig) -> Self {
        Self {
            roi: cfg.roi_weight,
            volatility: cfg.volatility_weight,
            margin: cfg.margin_weight,
            dispersion: cfg.dispersion_weight,
            market_roi: cfg.market_roi.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Applies the compliance predicate and confidence scoring to summaries.
pub struct CriterionFilter {
    criteria: FilterCriteria,
    weights: ConfidenceWeights,
}

impl CriterionFilter {
    pub fn new(criteria: FilterCriteria, weights: ConfidenceWeights) -> Self {
        Self { criteria, weights }
    }

    /// Access the criteria in effect.
    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    /// Classify one summary. Never fails for well-formed input: a summary
    /// with undefined margin simply yields a confidence score computed
    /// without the margin term.
    pub fn evaluate(&self, summary: &MarketSummary) -> ComplianceResult {
        let compliant = summary.best_price >= self.criteria.effective_min_price();
        let confidence = self.confidence(summary);

        debug!(
            match_id = %summary.match_id,
            market = %summary.market,
            best_price = summary.best_price,
            threshold = self.criteria.effective_min_price(),
            compliant,
            confidence,
            "Market evaluated"
        );

        ComplianceResult {
            summary: summary.clone(),
            compliant,
            confidence,
            rank: None,
        }
    }

    /// Evaluate a batch of summaries and rank the compliant subset.
    ///
    /// Ordering is a total order: confidence descending, ties broken by
    /// best price descending, then by match id ascending for determinism.
    /// Ranks 1..n are assigned to compliant results only; non-compliant
    /// results follow in the same ordering with no rank.
    pub fn evaluate_all(&self, summaries: &[MarketSummary]) -> Vec<ComplianceResult> {
        let mut results: Vec<ComplianceResult> =
            summaries.iter().map(|s| self.evaluate(s)).collect();

        results.sort_by(|a, b| {
            b.compliant
                .cmp(&a.compliant)
                .then_with(|| {
                    b.confidence
                        .partial_cmp(&a.confidence)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| {
                    b.summary
                        .best_price
                        .partial_cmp(&a.summary.best_price)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.summary.match_id.cmp(&b.summary.match_id))
        });

        let mut rank = 0usize;
        for result in results.iter_mut() {
            if result.compliant {
                rank += 1;
                result.rank = Some(rank);
            }
        }

        results
    }

    /// Weighted confidence score.
    ///
    /// roi term: historical ROI prior of the market kind (0 when the kind
    /// has no configured prior). volatility and margin terms shrink from 1
    /// toward 0 as the respective percentage grows. dispersion term is the
    /// raw dispersion score.
    fn confidence(&self, summary: &MarketSummary) -> f64 {
        let roi_term = self
            .weights
            .market_roi
            .get(summary.market.key())
            .copied()
            .unwrap_or(0.0);

        let volatility_term = 1.0 / (1.0 + summary.volatility_pct.max(0.0));

        let margin_term = match summary.bookmaker_margin_pct {
            Some(m) => 1.0 / (1.0 + m.max(0.0)),
            None => 0.0,
        };

        self.weights.roi * roi_term
            + self.weights.volatility * volatility_term
            + self.weights.margin * margin_term
            + self.weights.dispersion * summary.score.value
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DispersionScore, MarketKind, ScoreBasis};

    fn make_summary(match_id: &str, best_price: f64) -> MarketSummary {
        MarketSummary {
            match_id: match_id.to_string(),
            market: MarketKind::DoubleChance1X,
            outcome: "1X".to_string(),
            avg_price: best_price - 0.02,
            best_price,
            best_bookmaker: "pinnacle".to_string(),
            implied_probability: 1.0 / best_price,
            volatility_pct: 1.2,
            bookmaker_margin_pct: Some(5.0),
            avg_market_margin_pct: Some(6.0),
            bookmaker_count: 3,
            score: DispersionScore {
                value: 0.2,
                basis: ScoreBasis::MarginRatio,
            },
            disagreement_index: Some(0.02),
        }
    }

    fn make_filter(min_price: f64) -> CriterionFilter {
        CriterionFilter::new(
            FilterCriteria::new(min_price, None, 168, false),
            ConfidenceWeights::default(),
        )
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let filter = make_filter(1.30);
        assert!(!filter.evaluate(&make_summary("m1", 1.29)).compliant);
        assert!(filter.evaluate(&make_summary("m1", 1.30)).compliant);
        assert!(filter.evaluate(&make_summary("m1", 1.31)).compliant);
    }

    #[test]
    fn test_raising_threshold_only_removes() {
        let summaries: Vec<MarketSummary> = [1.25, 1.30, 1.45, 1.80, 2.40]
            .iter()
            .enumerate()
            .map(|(i, p)| make_summary(&format!("m{i}"), *p))
            .collect();

        let mut previous: Option<Vec<String>> = None;
        for threshold in [1.20, 1.30, 1.50, 2.00, 3.00] {
            let filter = make_filter(threshold);
            let compliant: Vec<String> = filter
                .evaluate_all(&summaries)
                .into_iter()
                .filter(|r| r.compliant)
                .map(|r| r.summary.match_id)
                .collect();
            if let Some(prev) = &previous {
                // Monotonic: every id compliant now was compliant before
                assert!(compliant.iter().all(|id| prev.contains(id)));
                assert!(compliant.len() <= prev.len());
            }
            previous = Some(compliant);
        }
    }

    #[test]
    fn test_equivalent_thresholds_same_compliant_set() {
        // The regression test guarding against the double-filtering bug:
        // min_probability = 1/min_price must produce the identical set.
        let summaries: Vec<MarketSummary> = [1.28, 1.305, 1.31, 1.52, 2.10]
            .iter()
            .enumerate()
            .map(|(i, p)| make_summary(&format!("m{i}"), *p))
            .collect();

        let price_only = CriterionFilter::new(
            FilterCriteria::new(1.30, None, 168, false),
            ConfidenceWeights::default(),
        );
        let prob_only = CriterionFilter::new(
            FilterCriteria::new(f64::NEG_INFINITY, Some(1.0 / 1.30), 168, false),
            ConfidenceWeights::default(),
        );
        let both = CriterionFilter::new(
            FilterCriteria::new(1.30, Some(1.0 / 1.30), 168, false),
            ConfidenceWeights::default(),
        );

        let ids = |filter: &CriterionFilter| -> Vec<String> {
            filter
                .evaluate_all(&summaries)
                .into_iter()
                .filter(|r| r.compliant)
                .map(|r| r.summary.match_id)
                .collect()
        };

        assert_eq!(ids(&price_only), ids(&prob_only));
        assert_eq!(ids(&price_only), ids(&both));
    }

    #[test]
    fn test_confidence_never_decides_compliance() {
        // Zero weights → zero confidence, compliance unchanged.
        let filter = CriterionFilter::new(
            FilterCriteria::new(1.30, None, 168, false),
            ConfidenceWeights {
                roi: 0.0,
                volatility: 0.0,
                margin: 0.0,
                dispersion: 0.0,
                market_roi: HashMap::new(),
            },
        );
        let result = filter.evaluate(&make_summary("m1", 1.45));
        assert!(result.compliant);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_undefined_margin_drops_margin_term() {
        let filter = make_filter(1.30);
        let with_margin = make_summary("m1", 1.45);
        let mut without_margin = make_summary("m1", 1.45);
        without_margin.bookmaker_margin_pct = None;

        let full = filter.evaluate(&with_margin).confidence;
        let degraded = filter.evaluate(&without_margin).confidence;
        // Exactly the margin term is missing: w_margin × 1/(1+5)
        let expected_delta = 0.25 * (1.0 / 6.0);
        assert!((full - degraded - expected_delta).abs() < 1e-12);
    }

    #[test]
    fn test_ranking_is_total_order() {
        let mut summaries = Vec::new();
        for (i, score) in [0.5, 0.1, 0.9, 0.3].iter().enumerate() {
            let mut s = make_summary(&format!("m{i}"), 1.50);
            s.score.value = *score;
            summaries.push(s);
        }
        let filter = make_filter(1.30);
        let results = filter.evaluate_all(&summaries);

        for pair in results.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
        // Ranks assigned 1..n over the compliant set
        let ranks: Vec<usize> = results.iter().filter_map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_confidence_tie_broken_by_best_price() {
        let a = make_summary("m-a", 1.60);
        let b = make_summary("m-b", 1.90);
        // Identical everything except best price → identical component
        // inputs except the price; force equal confidence by zeroing all
        // weights so only the tie-breaks order the results.
        let filter = CriterionFilter::new(
            FilterCriteria::new(1.30, None, 168, false),
            ConfidenceWeights {
                roi: 0.0,
                volatility: 0.0,
                margin: 0.0,
                dispersion: 0.0,
                market_roi: HashMap::new(),
            },
        );
        let results = filter.evaluate_all(&[a, b]);
        assert_eq!(results[0].summary.match_id, "m-b"); // higher price first
        assert_eq!(results[1].summary.match_id, "m-a");
    }

    #[test]
    fn test_price_tie_broken_by_match_id() {
        let a = make_summary("m-z", 1.60);
        let b = make_summary("m-a", 1.60);
        let filter = CriterionFilter::new(
            FilterCriteria::new(1.30, None, 168, false),
            ConfidenceWeights {
                roi: 0.0,
                volatility: 0.0,
                margin: 0.0,
                dispersion: 0.0,
                market_roi: HashMap::new(),
            },
        );
        let results = filter.evaluate_all(&[a, b]);
        assert_eq!(results[0].summary.match_id, "m-a");
    }

    #[test]
    fn test_non_compliant_unranked_and_last() {
        let summaries = vec![make_summary("m-pass", 1.50), make_summary("m-fail", 1.10)];
        let filter = make_filter(1.30);
        let results = filter.evaluate_all(&summaries);

        assert_eq!(results[0].summary.match_id, "m-pass");
        assert_eq!(results[0].rank, Some(1));
        assert_eq!(results[1].summary.match_id, "m-fail");
        assert_eq!(results[1].rank, None);
    }

    #[test]
    fn test_weights_from_config() {
        let cfg = ConfidenceConfig {
            roi_weight: 0.4,
            volatility_weight: 0.1,
            margin_weight: 0.2,
            dispersion_weight: 0.3,
            market_roi: HashMap::from([("1x".to_string(), 0.05)]),
        };
        let weights = ConfidenceWeights::from(&cfg);
        assert_eq!(weights.roi, 0.4);
        assert_eq!(weights.market_roi.get("1x"), Some(&0.05));
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let w = ConfidenceWeights::default();
        assert!((w.roi + w.volatility + w.margin + w.dispersion - 1.0).abs() < 1e-12);
    }
}
