//! Shared types for the ODDSIGHT scanner.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that provider, analysis,
//! and report modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

/// An upcoming football match as listed by an odds provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    pub league: String,
    pub country: String,
    /// Scheduled kickoff (UTC).
    pub kickoff_time: DateTime<Utc>,
    /// Provider sport key, e.g. "soccer_epl".
    pub sport_key: String,
}

impl fmt::Display for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} vs {}", self.home_team, self.away_team)
    }
}

impl Fixture {
    /// Whether kickoff is still in the future.
    pub fn is_upcoming(&self) -> bool {
        self.kickoff_time > Utc::now()
    }

    /// Whether kickoff falls inside the next `hours` hours.
    pub fn starts_within(&self, hours: i64) -> bool {
        let now = Utc::now();
        self.kickoff_time > now && self.kickoff_time <= now + chrono::Duration::hours(hours)
    }

    /// Helper to build a test fixture with sensible defaults.
    #[cfg(test)]
    pub fn sample() -> Self {
        Fixture {
            id: "fx-001".to_string(),
            home_team: "Arsenal".to_string(),
            away_team: "Chelsea".to_string(),
            league: "Premier League".to_string(),
            country: "England".to_string(),
            kickoff_time: Utc::now() + chrono::Duration::hours(48),
            sport_key: "soccer_epl".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Market kinds
// ---------------------------------------------------------------------------

/// The betting markets the scanner analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketKind {
    /// Double chance: home win or draw.
    DoubleChance1X,
    /// Double chance: draw or away win.
    DoubleChanceX2,
    /// Total goals over a line.
    TotalsOver,
    /// Total goals under a line.
    TotalsUnder,
}

impl MarketKind {
    /// All known market kinds (useful for iteration).
    pub const ALL: &'static [MarketKind] = &[
        MarketKind::DoubleChance1X,
        MarketKind::DoubleChanceX2,
        MarketKind::TotalsOver,
        MarketKind::TotalsUnder,
    ];

    /// Stable lowercase key used in configuration maps and CSV rows.
    pub fn key(&self) -> &'static str {
        match self {
            MarketKind::DoubleChance1X => "1x",
            MarketKind::DoubleChanceX2 => "x2",
            MarketKind::TotalsOver => "over",
            MarketKind::TotalsUnder => "under",
        }
    }

    /// Human-readable market family for report headers.
    pub fn family(&self) -> &'static str {
        match self {
            MarketKind::DoubleChance1X | MarketKind::DoubleChanceX2 => "Double Chance",
            MarketKind::TotalsOver | MarketKind::TotalsUnder => "Goals (Over/Under)",
        }
    }
}

impl fmt::Display for MarketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketKind::DoubleChance1X => write!(f, "1X"),
            MarketKind::DoubleChanceX2 => write!(f, "X2"),
            MarketKind::TotalsOver => write!(f, "Over"),
            MarketKind::TotalsUnder => write!(f, "Under"),
        }
    }
}

/// Attempt to parse a string into a MarketKind (case-insensitive).
impl std::str::FromStr for MarketKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1x" => Ok(MarketKind::DoubleChance1X),
            "x2" => Ok(MarketKind::DoubleChanceX2),
            "over" | "totals-over" => Ok(MarketKind::TotalsOver),
            "under" | "totals-under" => Ok(MarketKind::TotalsUnder),
            _ => Err(anyhow::anyhow!("Unknown market kind: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Quotes
// ---------------------------------------------------------------------------

/// One bookmaker's decimal price for one outcome of one market,
/// at one observation time. Immutable; discarded after aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub match_id: String,
    pub market: MarketKind,
    /// Outcome label, e.g. "1X" or "Over 2.5".
    pub outcome: String,
    pub bookmaker: String,
    /// Decimal odds. Always > 1.0 for a well-formed quote.
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} @ {:.2}",
            self.bookmaker, self.market, self.outcome, self.price,
        )
    }
}

impl Quote {
    /// Break-even win probability implied by the price (1 / price).
    pub fn implied_probability(&self) -> f64 {
        1.0 / self.price
    }

    /// Whether the price is a valid decimal odd (> 1.0).
    pub fn has_valid_price(&self) -> bool {
        self.price > 1.0
    }
}

/// One bookmaker's complete set of complementary prices for a market
/// (all three 1/X/2 prices, or both sides of an Over/Under line).
/// Used for margin and disagreement computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplementSet {
    pub bookmaker: String,
    /// Decimal prices covering every outcome of the market, order-free.
    pub prices: Vec<f64>,
    pub timestamp: DateTime<Utc>,
}

impl ComplementSet {
    /// The bookmaker's overround as a fraction: Σ(1/price) − 1.
    pub fn overround(&self) -> f64 {
        self.prices.iter().map(|p| 1.0 / p).sum::<f64>() - 1.0
    }

    /// The overround as a percentage.
    pub fn overround_pct(&self) -> f64 {
        self.overround() * 100.0
    }
}

impl fmt::Display for ComplementSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prices: Vec<String> = self.prices.iter().map(|p| format!("{p:.2}")).collect();
        write!(
            f,
            "[{}] {} (margin {:.2}%)",
            self.bookmaker,
            prices.join("/"),
            self.overround_pct(),
        )
    }
}

// ---------------------------------------------------------------------------
// Fixture odds
// ---------------------------------------------------------------------------

/// The complement-map key covering a (market, outcome) slice: both
/// double-chance markets share the H2H triple; each totals line has its
/// own Over/Under pair.
pub fn complement_key(market: MarketKind, outcome: &str) -> String {
    match market {
        MarketKind::DoubleChance1X | MarketKind::DoubleChanceX2 => "h2h".to_string(),
        MarketKind::TotalsOver | MarketKind::TotalsUnder => match outcome.rsplit_once(' ') {
            Some((_, line)) => format!("totals {line}"),
            None => "totals".to_string(),
        },
    }
}

/// Everything a provider returned for one fixture: the raw quotes plus
/// the per-bookmaker complementary price sets, keyed by market slice
/// (see [`complement_key`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureOdds {
    pub quotes: Vec<Quote>,
    pub complements: std::collections::HashMap<String, Vec<ComplementSet>>,
}

impl FixtureOdds {
    /// Whether the provider returned nothing usable.
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// Complement sets covering the given (market, outcome) slice.
    pub fn complements_for(&self, market: MarketKind, outcome: &str) -> &[ComplementSet] {
        self.complements
            .get(&complement_key(market, outcome))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Fold another provider's odds for the same fixture into this one.
    pub fn merge(&mut self, other: FixtureOdds) {
        self.quotes.extend(other.quotes);
        for (key, sets) in other.complements {
            self.complements.entry(key).or_default().extend(sets);
        }
    }
}

// ---------------------------------------------------------------------------
// Dispersion score
// ---------------------------------------------------------------------------

/// Which formula produced a dispersion score.
///
/// The score is a relative ranking signal only. One canonical formula is
/// applied per record and recorded here so downstream consumers never have
/// to guess which one was in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreBasis {
    /// Margin advantage over the market average divided by the best-price
    /// bookmaker's own margin. Used whenever both margins are known and the
    /// bookmaker margin is positive.
    MarginRatio,
    /// Mean absolute deviation of the quotes' implied probabilities from
    /// their mean. Fallback when margin data is unavailable.
    MeanAbsDeviation,
}

impl fmt::Display for ScoreBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreBasis::MarginRatio => write!(f, "margin-ratio"),
            ScoreBasis::MeanAbsDeviation => write!(f, "mad"),
        }
    }
}

/// The cross-bookmaker dispersion score of a market summary,
/// tagged with the formula that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DispersionScore {
    pub value: f64,
    pub basis: ScoreBasis,
}

impl fmt::Display for DispersionScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4} ({})", self.value, self.basis)
    }
}

// ---------------------------------------------------------------------------
// Market summary
// ---------------------------------------------------------------------------

/// Aggregation of all quotes for one (match, market, outcome) across
/// bookmakers. Created once per analysis run; immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSummary {
    pub match_id: String,
    pub market: MarketKind,
    pub outcome: String,
    /// Arithmetic mean of all contributing quote prices.
    pub avg_price: f64,
    /// Maximum quote price (best for the bettor).
    pub best_price: f64,
    pub best_bookmaker: String,
    /// 1 / best_price. Strictly in (0, 1) for any price > 1.0.
    pub implied_probability: f64,
    /// Coefficient of variation of the quote prices, as a percentage.
    /// Defined as 0.0 when only one quote contributes.
    pub volatility_pct: f64,
    /// Overround of the best-price bookmaker. None when that bookmaker's
    /// complementary prices were unavailable — never reported as zero.
    pub bookmaker_margin_pct: Option<f64>,
    /// Mean overround across bookmakers with complete complementary data.
    pub avg_market_margin_pct: Option<f64>,
    /// Number of contributing bookmakers (≥ 1).
    pub bookmaker_count: usize,
    pub score: DispersionScore,
    /// Jensen–Shannon disagreement index across bookmakers, in [0, 1]
    /// for binary markets. None with fewer than two complete books.
    pub disagreement_index: Option<f64>,
}

impl MarketSummary {
    /// Margin advantage of the best-price bookmaker over the market
    /// average (positive = that book is cheaper than the field).
    pub fn margin_advantage_pct(&self) -> Option<f64> {
        match (self.avg_market_margin_pct, self.bookmaker_margin_pct) {
            (Some(avg), Some(own)) => Some(avg - own),
            _ => None,
        }
    }

    /// Difference between the best price and the market average price.
    pub fn price_advantage(&self) -> f64 {
        self.best_price - self.avg_price
    }
}

impl fmt::Display for MarketSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let margin = match self.bookmaker_margin_pct {
            Some(m) => format!("{m:.2}%"),
            None => "n/a".to_string(),
        };
        write!(
            f,
            "{} {} | best {:.2} ({}) avg {:.2} | p={:.1}% vol={:.2}% margin={} books={}",
            self.market,
            self.outcome,
            self.best_price,
            self.best_bookmaker,
            self.avg_price,
            self.implied_probability * 100.0,
            self.volatility_pct,
            margin,
            self.bookmaker_count,
        )
    }
}

// ---------------------------------------------------------------------------
// Filter criteria
// ---------------------------------------------------------------------------

/// Immutable per-run filter configuration.
///
/// The minimum-price and minimum-probability knobs are mathematically
/// inverse constraints (`probability = 1/price`), so they are collapsed
/// into a single effective minimum price at construction. The private
/// field keeps every caller on that single threshold — the two user-facing
/// knobs exist only at the CLI boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterCriteria {
    effective_min_price: f64,
    /// How far ahead (in hours) to look for fixtures.
    pub hours_ahead: i64,
    /// Whether reports should show only compliant markets.
    pub only_compliant: bool,
}

impl FilterCriteria {
    /// Build criteria from the user-facing knobs, collapsing the redundant
    /// pair to whichever is more restrictive: max(min_price, 1/min_prob).
    pub fn new(
        min_price: f64,
        min_probability: Option<f64>,
        hours_ahead: i64,
        only_compliant: bool,
    ) -> Self {
        let from_probability = min_probability
            .filter(|p| *p > 0.0)
            .map(|p| 1.0 / p)
            .unwrap_or(f64::NEG_INFINITY);
        Self {
            effective_min_price: min_price.max(from_probability),
            hours_ahead,
            only_compliant,
        }
    }

    /// The single threshold the compliance predicate applies.
    pub fn effective_min_price(&self) -> f64 {
        self.effective_min_price
    }
}

impl fmt::Display for FilterCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "price >= {:.2} (window {}h)",
            self.effective_min_price, self.hours_ahead,
        )
    }
}

// ---------------------------------------------------------------------------
// Compliance result
// ---------------------------------------------------------------------------

/// A market summary paired with its compliance verdict and ranking score.
/// Derived read-only from a summary and criteria; recomputed each run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub summary: MarketSummary,
    pub compliant: bool,
    /// Ranking signal within the compliant set; never part of pass/fail.
    pub confidence: f64,
    /// 1-based position after ranking. None until ranked or non-compliant.
    pub rank: Option<usize>,
}

impl fmt::Display for ComplianceResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.compliant { "PASS" } else { "fail" };
        write!(f, "{} [{}] conf={:.3}", self.summary, verdict, self.confidence)
    }
}

/// A fixture together with one analysed market on it — the unit the
/// report and CSV layers consume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzedMarket {
    pub fixture: Fixture,
    pub result: ComplianceResult,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain errors of the analysis core.
///
/// Undefined metrics (margin, disagreement) are expected, common cases and
/// are represented as `None` fields on `MarketSummary`, never as errors.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("no quotes supplied for aggregation")]
    EmptyQuotes,

    #[error("heterogeneous quote collection: {0}")]
    MixedQuotes(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_quote(bookmaker: &str, price: f64) -> Quote {
        Quote {
            match_id: "fx-001".to_string(),
            market: MarketKind::DoubleChance1X,
            outcome: "1X".to_string(),
            bookmaker: bookmaker.to_string(),
            price,
            timestamp: Utc::now(),
        }
    }

    // -- Fixture tests --

    #[test]
    fn test_fixture_display() {
        let fx = Fixture::sample();
        assert_eq!(format!("{fx}"), "Arsenal vs Chelsea");
    }

    #[test]
    fn test_fixture_is_upcoming() {
        let fx = Fixture::sample(); // kickoff = now + 48h
        assert!(fx.is_upcoming());
    }

    #[test]
    fn test_fixture_starts_within() {
        let fx = Fixture::sample();
        assert!(fx.starts_within(72));
        assert!(!fx.starts_within(24));
    }

    #[test]
    fn test_fixture_past_kickoff_not_upcoming() {
        let mut fx = Fixture::sample();
        fx.kickoff_time = Utc::now() - Duration::hours(1);
        assert!(!fx.is_upcoming());
        assert!(!fx.starts_within(168));
    }

    #[test]
    fn test_fixture_serialization_roundtrip() {
        let fx = Fixture::sample();
        let json = serde_json::to_string(&fx).unwrap();
        let parsed: Fixture = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, "fx-001");
        assert_eq!(parsed.league, "Premier League");
    }

    // -- MarketKind tests --

    #[test]
    fn test_market_kind_display() {
        assert_eq!(format!("{}", MarketKind::DoubleChance1X), "1X");
        assert_eq!(format!("{}", MarketKind::DoubleChanceX2), "X2");
        assert_eq!(format!("{}", MarketKind::TotalsOver), "Over");
        assert_eq!(format!("{}", MarketKind::TotalsUnder), "Under");
    }

    #[test]
    fn test_market_kind_from_str() {
        assert_eq!("1X".parse::<MarketKind>().unwrap(), MarketKind::DoubleChance1X);
        assert_eq!("x2".parse::<MarketKind>().unwrap(), MarketKind::DoubleChanceX2);
        assert_eq!("OVER".parse::<MarketKind>().unwrap(), MarketKind::TotalsOver);
        assert_eq!("totals-under".parse::<MarketKind>().unwrap(), MarketKind::TotalsUnder);
        assert!("btts".parse::<MarketKind>().is_err());
    }

    #[test]
    fn test_market_kind_keys_unique() {
        let keys: std::collections::HashSet<_> =
            MarketKind::ALL.iter().map(|k| k.key()).collect();
        assert_eq!(keys.len(), MarketKind::ALL.len());
    }

    #[test]
    fn test_market_kind_family() {
        assert_eq!(MarketKind::DoubleChance1X.family(), "Double Chance");
        assert_eq!(MarketKind::TotalsUnder.family(), "Goals (Over/Under)");
    }

    #[test]
    fn test_market_kind_serialization_roundtrip() {
        for kind in MarketKind::ALL {
            let json = serde_json::to_string(kind).unwrap();
            let parsed: MarketKind = serde_json::from_str(&json).unwrap();
            assert_eq!(*kind, parsed);
        }
    }

    // -- Quote tests --

    #[test]
    fn test_quote_implied_probability() {
        let q = make_quote("pinnacle", 2.61);
        assert!((q.implied_probability() - 1.0 / 2.61).abs() < 1e-12);
        assert!(q.implied_probability() > 0.0 && q.implied_probability() < 1.0);
    }

    #[test]
    fn test_quote_valid_price() {
        assert!(make_quote("pinnacle", 1.01).has_valid_price());
        assert!(!make_quote("pinnacle", 1.0).has_valid_price());
        assert!(!make_quote("pinnacle", 0.5).has_valid_price());
    }

    #[test]
    fn test_quote_display() {
        let q = make_quote("betsson", 1.45);
        let display = format!("{q}");
        assert!(display.contains("betsson"));
        assert!(display.contains("1.45"));
    }

    // -- ComplementSet tests --

    #[test]
    fn test_overround_three_way() {
        // 2.0 / 3.5 / 4.0 → 0.5 + 0.2857 + 0.25 = 1.0357 → 3.57% margin
        let set = ComplementSet {
            bookmaker: "pinnacle".to_string(),
            prices: vec![2.0, 3.5, 4.0],
            timestamp: Utc::now(),
        };
        assert!((set.overround() - 0.035714285714).abs() < 1e-9);
        assert!((set.overround_pct() - 3.5714285714).abs() < 1e-6);
    }

    #[test]
    fn test_overround_order_invariant() {
        let a = ComplementSet {
            bookmaker: "a".to_string(),
            prices: vec![1.8, 2.05],
            timestamp: Utc::now(),
        };
        let b = ComplementSet {
            bookmaker: "a".to_string(),
            prices: vec![2.05, 1.8],
            timestamp: Utc::now(),
        };
        assert!((a.overround() - b.overround()).abs() < 1e-12);
    }

    // -- FilterCriteria tests --

    #[test]
    fn test_criteria_price_only() {
        let c = FilterCriteria::new(1.30, None, 168, false);
        assert!((c.effective_min_price() - 1.30).abs() < 1e-12);
    }

    #[test]
    fn test_criteria_collapses_redundant_knobs() {
        // min_probability 0.5 → implied min price 2.0, stricter than 1.30
        let c = FilterCriteria::new(1.30, Some(0.5), 168, false);
        assert!((c.effective_min_price() - 2.0).abs() < 1e-12);

        // min_probability 0.9 → implied min price ~1.11, weaker than 1.30
        let c = FilterCriteria::new(1.30, Some(0.9), 168, false);
        assert!((c.effective_min_price() - 1.30).abs() < 1e-12);
    }

    #[test]
    fn test_criteria_equivalent_knobs_identical() {
        // min_probability = 1/min_price must change nothing
        let base = FilterCriteria::new(1.30, None, 168, false);
        let both = FilterCriteria::new(1.30, Some(1.0 / 1.30), 168, false);
        assert!((base.effective_min_price() - both.effective_min_price()).abs() < 1e-9);
    }

    #[test]
    fn test_criteria_ignores_nonpositive_probability() {
        let c = FilterCriteria::new(1.30, Some(0.0), 168, false);
        assert!((c.effective_min_price() - 1.30).abs() < 1e-12);
    }

    // -- FixtureOdds tests --

    #[test]
    fn test_complement_key() {
        assert_eq!(complement_key(MarketKind::DoubleChance1X, "1X"), "h2h");
        assert_eq!(complement_key(MarketKind::DoubleChanceX2, "X2"), "h2h");
        assert_eq!(complement_key(MarketKind::TotalsOver, "Over 2.5"), "totals 2.5");
        assert_eq!(complement_key(MarketKind::TotalsUnder, "Under 3.5"), "totals 3.5");
    }

    #[test]
    fn test_fixture_odds_merge() {
        let mut a = FixtureOdds {
            quotes: vec![make_quote("pinnacle", 1.45)],
            complements: std::collections::HashMap::from([(
                "h2h".to_string(),
                vec![ComplementSet {
                    bookmaker: "pinnacle".to_string(),
                    prices: vec![2.0, 3.5, 4.0],
                    timestamp: Utc::now(),
                }],
            )]),
        };
        let b = FixtureOdds {
            quotes: vec![make_quote("bwin", 1.47)],
            complements: std::collections::HashMap::from([(
                "h2h".to_string(),
                vec![ComplementSet {
                    bookmaker: "bwin".to_string(),
                    prices: vec![2.1, 3.4, 3.9],
                    timestamp: Utc::now(),
                }],
            )]),
        };
        a.merge(b);
        assert_eq!(a.quotes.len(), 2);
        assert_eq!(a.complements_for(MarketKind::DoubleChance1X, "1X").len(), 2);
    }

    #[test]
    fn test_fixture_odds_empty_lookup() {
        let odds = FixtureOdds::default();
        assert!(odds.is_empty());
        assert!(odds.complements_for(MarketKind::TotalsOver, "Over 2.5").is_empty());
    }

    // -- DispersionScore tests --

    #[test]
    fn test_score_basis_display() {
        assert_eq!(format!("{}", ScoreBasis::MarginRatio), "margin-ratio");
        assert_eq!(format!("{}", ScoreBasis::MeanAbsDeviation), "mad");
    }

    #[test]
    fn test_dispersion_score_serialization_roundtrip() {
        let score = DispersionScore {
            value: 0.42,
            basis: ScoreBasis::MarginRatio,
        };
        let json = serde_json::to_string(&score).unwrap();
        let parsed: DispersionScore = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, score);
    }

    // -- MarketSummary tests --

    fn make_summary() -> MarketSummary {
        MarketSummary {
            match_id: "fx-001".to_string(),
            market: MarketKind::DoubleChance1X,
            outcome: "1X".to_string(),
            avg_price: 2.58,
            best_price: 2.61,
            best_bookmaker: "pinnacle".to_string(),
            implied_probability: 1.0 / 2.61,
            volatility_pct: 0.95,
            bookmaker_margin_pct: Some(4.0),
            avg_market_margin_pct: Some(6.5),
            bookmaker_count: 3,
            score: DispersionScore {
                value: 0.625,
                basis: ScoreBasis::MarginRatio,
            },
            disagreement_index: Some(0.01),
        }
    }

    #[test]
    fn test_summary_margin_advantage() {
        let s = make_summary();
        assert!((s.margin_advantage_pct().unwrap() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_summary_margin_advantage_undefined() {
        let mut s = make_summary();
        s.bookmaker_margin_pct = None;
        assert!(s.margin_advantage_pct().is_none());
    }

    #[test]
    fn test_summary_price_advantage() {
        let s = make_summary();
        assert!((s.price_advantage() - 0.03).abs() < 1e-9);
    }

    #[test]
    fn test_summary_display() {
        let s = make_summary();
        let display = format!("{s}");
        assert!(display.contains("pinnacle"));
        assert!(display.contains("2.61"));
    }

    #[test]
    fn test_summary_display_undefined_margin() {
        let mut s = make_summary();
        s.bookmaker_margin_pct = None;
        assert!(format!("{s}").contains("n/a"));
    }

    #[test]
    fn test_summary_serialization_roundtrip() {
        let s = make_summary();
        let json = serde_json::to_string(&s).unwrap();
        let parsed: MarketSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.best_bookmaker, "pinnacle");
        assert_eq!(parsed.bookmaker_count, 3);
        assert_eq!(parsed.score.basis, ScoreBasis::MarginRatio);
    }

    // -- ComplianceResult tests --

    #[test]
    fn test_compliance_result_display() {
        let r = ComplianceResult {
            summary: make_summary(),
            compliant: true,
            confidence: 0.512,
            rank: Some(1),
        };
        let display = format!("{r}");
        assert!(display.contains("PASS"));
        assert!(display.contains("0.512"));
    }

    // -- AnalysisError tests --

    #[test]
    fn test_analysis_error_display() {
        let e = AnalysisError::EmptyQuotes;
        assert_eq!(format!("{e}"), "no quotes supplied for aggregation");

        let e = AnalysisError::MixedQuotes("market 1X vs X2".to_string());
        assert!(format!("{e}").contains("1X vs X2"));
    }
}
