//! Offline calibration.
//!
//! Batch job over historical analysis CSV rows (the export schema plus
//! `result`/`confidence` columns filled in after matches settle). Fits a
//! logistic regression on the verified rows with a time-based train/test
//! split, evaluates AUC/log-loss/Brier and top-k ROI against the naive
//! confidence baseline, and produces a calibrated win probability for
//! every row.
//!
//! This is statistical evaluation of the scanner's own history, not a
//! betting model.

pub mod model;

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use tracing::{info, warn};

use model::{CalibrationBin, Metrics, RoiSummary};

/// Numeric feature columns fed to the model, by CSV header name.
pub const NUM_FEATURES: &[&str] = &[
    "score_final",
    "volatility_pct",
    "bookmaker_margin_pct",
    "bookmaker_count",
    "avg_price",
    "price_advantage",
    "best_price",
];

/// One-hot encoded categorical feature.
pub const CAT_FEATURE: &str = "market";

const RESULT_COLUMN: &str = "result";
const CONFIDENCE_COLUMN: &str = "confidence";
const KICKOFF_COLUMN: &str = "kickoff_local";
const KICKOFF_FORMAT: &str = "%Y-%m-%d %H:%M";

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// Settled outcome of a historical row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Won,
    Lost,
}

/// One historical CSV row, parsed leniently: anything unreadable is a
/// `None` and will be median-imputed (numerics) or excluded (outcome).
#[derive(Debug, Clone)]
pub struct HistoricalRecord {
    /// Zero-based data-row index in the source file.
    pub row: usize,
    pub kickoff: Option<NaiveDateTime>,
    pub market: String,
    pub outcome: Option<Outcome>,
    pub best_price: Option<f64>,
    /// Naive confidence score at analysis time (the baseline).
    pub confidence: Option<f64>,
    /// Aligned with `NUM_FEATURES`.
    pub features: Vec<Option<f64>>,
}

impl HistoricalRecord {
    fn y(&self) -> Option<f64> {
        match self.outcome? {
            Outcome::Won => Some(1.0),
            Outcome::Lost => Some(0.0),
        }
    }
}

/// Load a historical dataset. Columns are located by header name, so
/// extra columns and column order are irrelevant; a missing feature
/// column merely yields all-`None` for that feature.
pub fn load_dataset(path: &Path) -> Result<Vec<HistoricalRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open dataset: {}", path.display()))?;

    let headers = reader
        .headers()
        .context("Failed to read dataset header")?
        .clone();
    let index_of = |name: &str| headers.iter().position(|h| h == name);

    let result_col = index_of(RESULT_COLUMN);
    let confidence_col = index_of(CONFIDENCE_COLUMN);
    let kickoff_col = index_of(KICKOFF_COLUMN);
    let market_col = index_of(CAT_FEATURE);
    let best_price_col = index_of("best_price");
    let feature_cols: Vec<Option<usize>> = NUM_FEATURES.iter().map(|f| index_of(f)).collect();

    if result_col.is_none() {
        warn!(path = %path.display(), "Dataset has no `result` column — no rows are verifiable");
    }

    let mut records = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read dataset row {row}"))?;
        let cell = |col: Option<usize>| col.and_then(|c| record.get(c)).unwrap_or("").trim();

        let outcome = match cell(result_col).to_lowercase().as_str() {
            "won" => Some(Outcome::Won),
            "lost" => Some(Outcome::Lost),
            _ => None,
        };
        let kickoff = NaiveDateTime::parse_from_str(cell(kickoff_col), KICKOFF_FORMAT).ok();

        records.push(HistoricalRecord {
            row,
            kickoff,
            market: cell(market_col).to_string(),
            outcome,
            best_price: cell(best_price_col).parse().ok(),
            confidence: cell(confidence_col).parse().ok(),
            features: feature_cols
                .iter()
                .map(|col| cell(*col).parse().ok())
                .collect(),
        });
    }

    info!(
        path = %path.display(),
        rows = records.len(),
        verified = records.iter().filter(|r| r.outcome.is_some()).count(),
        "Dataset loaded"
    );
    Ok(records)
}

/// Time-based split: sort verified rows by kickoff (undated rows last,
/// stable) and cut the most recent `test_frac` off as the test set.
pub fn time_split(
    records: &[&HistoricalRecord],
    test_frac: f64,
) -> (Vec<usize>, Vec<usize>) {
    let mut order: Vec<usize> = (0..records.len()).collect();
    order.sort_by_key(|i| (records[*i].kickoff.is_none(), records[*i].kickoff));

    let cut = ((1.0 - test_frac) * order.len() as f64).floor() as usize;
    let test = order.split_off(cut);
    (order, test)
}

// ---------------------------------------------------------------------------
// Design matrix
// ---------------------------------------------------------------------------

/// Imputation and standardisation statistics fitted on the training set
/// and reused verbatim on test/full data.
#[derive(Debug, Clone)]
pub struct Standardizer {
    medians: Vec<f64>,
    means: Vec<f64>,
    stds: Vec<f64>,
    /// One-hot levels of the categorical feature, in fitted order.
    cat_levels: Vec<String>,
}

impl Standardizer {
    /// Fit medians, means, stds, and categorical levels on `records`.
    pub fn fit(records: &[&HistoricalRecord]) -> Self {
        let p = NUM_FEATURES.len();

        let mut medians = vec![0.0; p];
        for (feature, median_slot) in medians.iter_mut().enumerate() {
            let mut values: Vec<f64> = records
                .iter()
                .filter_map(|r| r.features[feature])
                .filter(|v| v.is_finite())
                .collect();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            *median_slot = median_of_sorted(&values);
        }

        let mut means = vec![0.0; p];
        let mut stds = vec![1.0; p];
        if !records.is_empty() {
            for feature in 0..p {
                let values: Vec<f64> = records
                    .iter()
                    .map(|r| r.features[feature].filter(|v| v.is_finite()).unwrap_or(medians[feature]))
                    .collect();
                let mean = values.iter().sum::<f64>() / values.len() as f64;
                let var =
                    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
                means[feature] = mean;
                stds[feature] = if var.sqrt() == 0.0 { 1.0 } else { var.sqrt() };
            }
        }

        let mut cat_levels: Vec<String> = records
            .iter()
            .map(|r| r.market.clone())
            .collect::<std::collections::BTreeSet<String>>()
            .into_iter()
            .collect();
        cat_levels.sort();

        Self {
            medians,
            means,
            stds,
            cat_levels,
        }
    }

    /// Transform records into design rows: imputed + standardised
    /// numerics followed by the one-hot market indicator.
    pub fn transform(&self, records: &[&HistoricalRecord]) -> Vec<Vec<f64>> {
        records
            .iter()
            .map(|r| {
                let mut row: Vec<f64> = (0..NUM_FEATURES.len())
                    .map(|feature| {
                        let raw = r.features[feature]
                            .filter(|v| v.is_finite())
                            .unwrap_or(self.medians[feature]);
                        (raw - self.means[feature]) / self.stds[feature]
                    })
                    .collect();
                for level in &self.cat_levels {
                    row.push(if &r.market == level { 1.0 } else { 0.0 });
                }
                row
            })
            .collect()
    }

    /// Column names matching `transform` output, bias excluded.
    pub fn feature_names(&self) -> Vec<String> {
        NUM_FEATURES
            .iter()
            .map(|f| format!("num:{f}"))
            .chain(
                self.cat_levels
                    .iter()
                    .map(|l| format!("cat:{CAT_FEATURE}={l}")),
            )
            .collect()
    }
}

fn median_of_sorted(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

// ---------------------------------------------------------------------------
// Calibration run
// ---------------------------------------------------------------------------

/// Tunable fit parameters (CLI flags map straight onto these).
#[derive(Debug, Clone)]
pub struct CalibrationParams {
    pub test_frac: f64,
    pub learning_rate: f64,
    pub l2: f64,
    pub iterations: usize,
    /// Fraction selected for the ROI comparison.
    pub top_fraction: f64,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            test_frac: 0.2,
            learning_rate: 0.05,
            l2: 0.5,
            iterations: 2000,
            top_fraction: 0.2,
        }
    }
}

/// Everything a calibration run produced.
#[derive(Debug, Clone)]
pub struct CalibrationOutcome {
    pub n_train: usize,
    pub n_test: usize,
    pub train_metrics: Metrics,
    pub test_metrics: Metrics,
    /// AUC of the naive confidence baseline (NaN when absent).
    pub baseline_auc_train: f64,
    pub baseline_auc_test: f64,
    pub roi_calibrated_train: RoiSummary,
    pub roi_calibrated_test: RoiSummary,
    pub roi_baseline_train: RoiSummary,
    pub roi_baseline_test: RoiSummary,
    /// Decile calibration of the test predictions.
    pub calibration_table: Vec<CalibrationBin>,
    /// (name, coefficient) sorted by |coefficient| descending, bias first
    /// in name "bias".
    pub coefficients: Vec<(String, f64)>,
    /// Calibrated probability per source row (aligned with `row`).
    pub probabilities: HashMap<usize, f64>,
    /// "train" / "test" marker per verified source row.
    pub split_markers: HashMap<usize, &'static str>,
}

/// Fit and evaluate over a loaded dataset.
///
/// Fails only when there are no verified rows to learn from.
pub fn calibrate(
    records: &[HistoricalRecord],
    params: &CalibrationParams,
) -> Result<CalibrationOutcome> {
    let verified: Vec<&HistoricalRecord> =
        records.iter().filter(|r| r.outcome.is_some()).collect();
    if verified.is_empty() {
        anyhow::bail!("No verified rows (result = won/lost) in the dataset");
    }

    let (train_idx, test_idx) = time_split(&verified, params.test_frac);
    let train: Vec<&HistoricalRecord> = train_idx.iter().map(|i| verified[*i]).collect();
    let test: Vec<&HistoricalRecord> = test_idx.iter().map(|i| verified[*i]).collect();

    let y_train: Vec<f64> = train.iter().filter_map(|r| r.y()).collect();
    let y_test: Vec<f64> = test.iter().filter_map(|r| r.y()).collect();

    let standardizer = Standardizer::fit(&train);
    let x_train = standardizer.transform(&train);
    let x_test = standardizer.transform(&test);

    let w = model::fit_logistic(
        &x_train,
        &y_train,
        params.learning_rate,
        params.l2,
        params.iterations,
    );

    let p_train = model::predict_proba(&x_train, &w);
    let p_test = model::predict_proba(&x_test, &w);

    // Baseline: the naive confidence column ranked the same way.
    let baseline = |rows: &[&HistoricalRecord], y: &[f64]| -> f64 {
        let paired: Vec<(f64, f64)> = rows
            .iter()
            .zip(y.iter())
            .filter_map(|(r, yi)| r.confidence.map(|c| (c, *yi)))
            .collect();
        if paired.is_empty() {
            return f64::NAN;
        }
        let (scores, outcomes): (Vec<f64>, Vec<f64>) = paired.into_iter().unzip();
        model::auc(&scores, &outcomes)
    };

    let odds_of = |rows: &[&HistoricalRecord]| -> Vec<f64> {
        rows.iter()
            .map(|r| r.best_price.unwrap_or(f64::NAN))
            .collect()
    };
    let confidence_of = |rows: &[&HistoricalRecord]| -> Vec<f64> {
        rows.iter()
            .map(|r| r.confidence.unwrap_or(f64::NAN))
            .collect()
    };

    // Probabilities for every row, verified or not, under the train fit.
    let all_refs: Vec<&HistoricalRecord> = records.iter().collect();
    let p_all = model::predict_proba(&standardizer.transform(&all_refs), &w);
    let probabilities: HashMap<usize, f64> = records
        .iter()
        .zip(p_all.iter())
        .map(|(r, p)| (r.row, *p))
        .collect();

    let mut split_markers = HashMap::new();
    for r in &train {
        split_markers.insert(r.row, "train");
    }
    for r in &test {
        split_markers.insert(r.row, "test");
    }

    let mut coefficients: Vec<(String, f64)> = std::iter::once(("bias".to_string(), w[0]))
        .chain(
            standardizer
                .feature_names()
                .into_iter()
                .zip(w[1..].iter().copied()),
        )
        .collect();
    coefficients.sort_by(|a, b| {
        b.1.abs()
            .partial_cmp(&a.1.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let outcome = CalibrationOutcome {
        n_train: train.len(),
        n_test: test.len(),
        train_metrics: model::metrics(&p_train, &y_train),
        test_metrics: model::metrics(&p_test, &y_test),
        baseline_auc_train: baseline(&train, &y_train),
        baseline_auc_test: baseline(&test, &y_test),
        roi_calibrated_train: model::roi_top_k(
            &p_train,
            &y_train,
            &odds_of(&train),
            params.top_fraction,
        ),
        roi_calibrated_test: model::roi_top_k(
            &p_test,
            &y_test,
            &odds_of(&test),
            params.top_fraction,
        ),
        roi_baseline_train: model::roi_top_k(
            &confidence_of(&train),
            &y_train,
            &odds_of(&train),
            params.top_fraction,
        ),
        roi_baseline_test: model::roi_top_k(
            &confidence_of(&test),
            &y_test,
            &odds_of(&test),
            params.top_fraction,
        ),
        calibration_table: model::calibration_table(&p_test, &y_test, 10),
        coefficients,
        probabilities,
        split_markers,
    };

    info!(
        train = outcome.n_train,
        test = outcome.n_test,
        auc_train = outcome.train_metrics.auc,
        auc_test = outcome.test_metrics.auc,
        "Calibration complete"
    );
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// Render the run as a markdown report.
pub fn render_report(outcome: &CalibrationOutcome, params: &CalibrationParams) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push("# Confidence calibration".to_string());
    lines.push(String::new());
    lines.push(format!(
        "Time-based split, test fraction {:.2}: {} train / {} test rows.",
        params.test_frac, outcome.n_train, outcome.n_test,
    ));
    lines.push(String::new());

    lines.push("## Metrics".to_string());
    lines.push(String::new());
    let tm = &outcome.train_metrics;
    let sm = &outcome.test_metrics;
    lines.push(format!(
        "- Calibrated AUC: train {:.4}, test {:.4}",
        tm.auc, sm.auc
    ));
    lines.push(format!(
        "- Calibrated log-loss: train {:.4}, test {:.4}",
        tm.log_loss, sm.log_loss
    ));
    lines.push(format!(
        "- Calibrated Brier: train {:.4}, test {:.4}",
        tm.brier, sm.brier
    ));
    lines.push(format!(
        "- Naive confidence AUC: train {:.4}, test {:.4}",
        outcome.baseline_auc_train, outcome.baseline_auc_test
    ));
    lines.push(String::new());

    lines.push(format!(
        "## ROI of top {:.0}% by score",
        params.top_fraction * 100.0
    ));
    lines.push(String::new());
    lines.push("| score | split | n | winrate | ROI | avg odds |".to_string());
    lines.push("|---|---|---:|---:|---:|---:|".to_string());
    for (label, split, roi) in [
        ("calibrated", "train", &outcome.roi_calibrated_train),
        ("calibrated", "test", &outcome.roi_calibrated_test),
        ("baseline", "train", &outcome.roi_baseline_train),
        ("baseline", "test", &outcome.roi_baseline_test),
    ] {
        lines.push(format!(
            "| {label} | {split} | {} | {:.1}% | {:+.2}% | {:.3} |",
            roi.n, roi.winrate_pct, roi.roi_pct, roi.avg_odds,
        ));
    }
    lines.push(String::new());

    lines.push("## Calibration (test deciles)".to_string());
    lines.push(String::new());
    if outcome.calibration_table.is_empty() {
        lines.push("(no test data)".to_string());
    } else {
        lines.push("| bin | n | p range | p mean | winrate | gap |".to_string());
        lines.push("|---:|---:|---|---:|---:|---:|".to_string());
        for bin in &outcome.calibration_table {
            lines.push(format!(
                "| {} | {} | {:.3}–{:.3} | {:.3} | {:.1}% | {:+.3} |",
                bin.bin, bin.n, bin.p_min, bin.p_max, bin.p_mean, bin.winrate_pct, bin.gap,
            ));
        }
    }
    lines.push(String::new());

    lines.push("## Coefficients (standardised space)".to_string());
    lines.push(String::new());
    lines.push("| feature | coefficient | odds ratio |".to_string());
    lines.push("|---|---:|---:|".to_string());
    for (name, coef) in &outcome.coefficients {
        lines.push(format!(
            "| {name} | {coef:+.4} | {:.3} |",
            coef.clamp(-10.0, 10.0).exp(),
        ));
    }
    lines.push(String::new());

    lines.join("\n")
}

/// Copy the input CSV adding `p_win_calibrated`, `confidence_calibrated`
/// and `calibration_split` columns.
pub fn write_augmented_csv(
    input: &Path,
    output: &Path,
    outcome: &CalibrationOutcome,
) -> Result<()> {
    let mut reader = csv::Reader::from_path(input)
        .with_context(|| format!("Failed to open dataset: {}", input.display()))?;
    let mut writer = csv::Writer::from_path(output)
        .with_context(|| format!("Failed to create output CSV: {}", output.display()))?;

    let mut header = reader
        .headers()
        .context("Failed to read dataset header")?
        .clone();
    header.push_field("p_win_calibrated");
    header.push_field("confidence_calibrated");
    header.push_field("calibration_split");
    writer
        .write_record(&header)
        .context("Failed to write output header")?;

    for (row, record) in reader.records().enumerate() {
        let mut record = record.with_context(|| format!("Failed to read dataset row {row}"))?;
        match outcome.probabilities.get(&row) {
            Some(p) => {
                record.push_field(&format!("{p:.6}"));
                record.push_field(&format!("{:.2}", p * 100.0));
            }
            None => {
                record.push_field("");
                record.push_field("");
            }
        }
        record.push_field(outcome.split_markers.get(&row).copied().unwrap_or(""));
        writer
            .write_record(&record)
            .context("Failed to write output row")?;
    }

    writer.flush().context("Failed to flush output CSV")?;
    info!(output = %output.display(), "Augmented dataset written");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
