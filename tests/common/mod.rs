//! Mock odds provider for integration testing.
//!
//! Provides a deterministic `OddsProvider` implementation that returns
//! known fixtures and quotes — all in-memory with no external
//! dependencies.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};

use oddsight::providers::OddsProvider;
use oddsight::types::{ComplementSet, Fixture, FixtureOdds, MarketKind, Quote};

/// A mock odds provider for deterministic testing.
///
/// Fixtures and odds are fully controllable from test code. An optional
/// forced error makes every odds fetch fail.
pub struct MockProvider {
    name: String,
    fixtures: Vec<Fixture>,
    odds: HashMap<String, FixtureOdds>,
    force_error: Mutex<Option<String>>,
}

impl MockProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fixtures: Vec::new(),
            odds: HashMap::new(),
            force_error: Mutex::new(None),
        }
    }

    /// Register a fixture together with the odds to serve for it.
    pub fn with_fixture(mut self, fixture: Fixture, odds: FixtureOdds) -> Self {
        self.odds.insert(fixture.id.clone(), odds);
        self.fixtures.push(fixture);
        self
    }

    /// Force all subsequent odds fetches to fail.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }
}

#[async_trait]
impl OddsProvider for MockProvider {
    async fn fetch_fixtures(&self) -> Result<Vec<Fixture>> {
        Ok(self.fixtures.clone())
    }

    async fn fetch_odds(&self, fixture: &Fixture) -> Result<FixtureOdds> {
        if let Some(msg) = self.force_error.lock().unwrap().clone() {
            return Err(anyhow!("{msg}"));
        }
        Ok(self.odds.get(&fixture.id).cloned().unwrap_or_default())
    }

    async fn remaining_requests(&self) -> Result<Option<u32>> {
        Ok(Some(500))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn make_fixture(id: &str, home: &str, away: &str, hours_out: i64) -> Fixture {
    Fixture {
        id: id.to_string(),
        home_team: home.to_string(),
        away_team: away.to_string(),
        league: "Premier League".to_string(),
        country: "England".to_string(),
        kickoff_time: Utc::now() + Duration::hours(hours_out),
        sport_key: "soccer_epl".to_string(),
    }
}

pub fn make_quote(match_id: &str, market: MarketKind, outcome: &str, bookmaker: &str, price: f64) -> Quote {
    Quote {
        match_id: match_id.to_string(),
        market,
        outcome: outcome.to_string(),
        bookmaker: bookmaker.to_string(),
        price,
        timestamp: Utc::now(),
    }
}

pub fn make_complement(bookmaker: &str, prices: &[f64]) -> ComplementSet {
    ComplementSet {
        bookmaker: bookmaker.to_string(),
        prices: prices.to_vec(),
        timestamp: Utc::now(),
    }
}

/// Double-chance odds for one fixture from three books, with full H2H
/// complement data, plus a totals market at the 2.5 line.
pub fn standard_odds(match_id: &str) -> FixtureOdds {
    FixtureOdds {
        quotes: vec![
            make_quote(match_id, MarketKind::DoubleChance1X, "1X", "pinnacle", 1.45),
            make_quote(match_id, MarketKind::DoubleChance1X, "1X", "betsson", 1.42),
            make_quote(match_id, MarketKind::DoubleChance1X, "1X", "marathonbet", 1.44),
            make_quote(match_id, MarketKind::DoubleChanceX2, "X2", "pinnacle", 2.61),
            make_quote(match_id, MarketKind::DoubleChanceX2, "X2", "betsson", 2.55),
            make_quote(match_id, MarketKind::DoubleChanceX2, "X2", "marathonbet", 2.58),
            make_quote(match_id, MarketKind::TotalsOver, "Over 2.5", "pinnacle", 1.85),
            make_quote(match_id, MarketKind::TotalsUnder, "Under 2.5", "pinnacle", 1.98),
        ],
        complements: HashMap::from([
            (
                "h2h".to_string(),
                vec![
                    make_complement("pinnacle", &[2.0, 3.5, 4.0]),
                    make_complement("betsson", &[1.95, 3.4, 3.9]),
                    make_complement("marathonbet", &[1.98, 3.45, 3.95]),
                ],
            ),
            (
                "totals 2.5".to_string(),
                vec![make_complement("pinnacle", &[1.85, 1.98])],
            ),
        ]),
    }
}
