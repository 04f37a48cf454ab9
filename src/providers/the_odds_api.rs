//! The Odds API integration — primary odds source.
//!
//! Fixture listings and per-event bookmaker prices for the configured
//! soccer leagues. H2H (1X2) prices are fetched for an allow-listed set
//! of bookmakers and folded into double-chance quotes; totals markets
//! contribute Over/Under quotes per goal line.
//!
//! API docs: https://the-odds-api.com/
//! Base URL: https://api.the-odds-api.com/v4
//! Quota: reported via the `x-requests-remaining` response header.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::OddsProvider;
use crate::types::{ComplementSet, Fixture, FixtureOdds, MarketKind, Quote};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const BASE_URL: &str = "https://api.the-odds-api.com/v4";
const PROVIDER_NAME: &str = "the_odds_api";

/// Pause between per-league listing requests (free-tier rate limits).
const LEAGUE_PAUSE_MS: u64 = 200;

/// Soccer leagues covered by the scanner: (sport key, league, country).
const SOCCER_LEAGUES: &[(&str, &str, &str)] = &[
    ("soccer_epl", "Premier League", "England"),
    ("soccer_spain_la_liga", "La Liga", "Spain"),
    ("soccer_germany_bundesliga", "Bundesliga", "Germany"),
    ("soccer_italy_serie_a", "Serie A", "Italy"),
    ("soccer_france_ligue_one", "Ligue 1", "France"),
    ("soccer_uefa_champs_league", "Champions League", "Europe"),
    ("soccer_uefa_europa_league", "Europa League", "Europe"),
    ("soccer_netherlands_eredivisie", "Eredivisie", "Netherlands"),
    ("soccer_portugal_primeira_liga", "Primeira Liga", "Portugal"),
    ("soccer_brazil_campeonato", "Brasileirão", "Brazil"),
    ("soccer_argentina_primera_division", "Primera División", "Argentina"),
    ("soccer_mexico_ligamx", "Liga MX", "Mexico"),
    ("soccer_usa_mls", "MLS", "USA"),
];

// ---------------------------------------------------------------------------
// API response types (The Odds API JSON → Rust)
// ---------------------------------------------------------------------------

/// `/sports/{key}/events` entry. Only the fields we need.
#[derive(Debug, Deserialize)]
struct EventDto {
    id: String,
    home_team: String,
    away_team: String,
    commence_time: DateTime<Utc>,
}

/// `/sports/{key}/events/{id}/odds` response.
#[derive(Debug, Deserialize)]
struct EventOddsDto {
    home_team: String,
    away_team: String,
    #[serde(default)]
    bookmakers: Vec<BookmakerDto>,
}

#[derive(Debug, Deserialize)]
struct BookmakerDto {
    key: String,
    #[serde(default)]
    markets: Vec<MarketDto>,
}

#[derive(Debug, Deserialize)]
struct MarketDto {
    key: String,
    last_update: DateTime<Utc>,
    #[serde(default)]
    outcomes: Vec<OutcomeDto>,
}

#[derive(Debug, Deserialize)]
struct OutcomeDto {
    name: String,
    price: f64,
    #[serde(default)]
    point: Option<f64>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// The Odds API client.
pub struct TheOddsApiClient {
    http: Client,
    api_key: Secret<String>,
    regions: String,
    /// Bookmaker allow-list; quotes from any other book are dropped.
    bookmakers: Vec<String>,
}

impl TheOddsApiClient {
    pub fn new(api_key: String, regions: String, bookmakers: Vec<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("ODDSIGHT/0.1.0 (odds-scanner)")
            .build()
            .context("Failed to build HTTP client for The Odds API")?;

        Ok(Self {
            http,
            api_key: Secret::new(api_key),
            regions,
            bookmakers,
        })
    }

    /// Fetch the event listing for one league. Failures are the caller's
    /// to log-and-skip: one dark league must not sink the scan.
    async fn fetch_league(&self, sport_key: &str, league: &str, country: &str) -> Result<Vec<Fixture>> {
        let url = format!("{BASE_URL}/sports/{sport_key}/events");
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("apiKey", self.api_key.expose_secret().as_str()),
                ("dateFormat", "iso"),
            ])
            .send()
            .await
            .context("The Odds API events request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("The Odds API error {status} listing {sport_key}");
        }

        let events: Vec<EventDto> = resp
            .json()
            .await
            .context("Failed to parse The Odds API events response")?;

        Ok(events
            .into_iter()
            .map(|e| Fixture {
                id: e.id,
                home_team: e.home_team,
                away_team: e.away_team,
                league: league.to_string(),
                country: country.to_string(),
                kickoff_time: e.commence_time,
                sport_key: sport_key.to_string(),
            })
            .collect())
    }

    /// Convert one event-odds payload into quotes + complement sets.
    ///
    /// H2H triples become double-chance quotes (`1X = 1/(1/home + 1/draw)`,
    /// `X2 = 1/(1/draw + 1/away)`) plus an "h2h" complement set when all
    /// three prices are present. Totals outcomes become Over/Under quotes
    /// per line, with a complement pair per (bookmaker, line) when both
    /// sides are quoted.
    fn convert_event_odds(&self, fixture: &Fixture, dto: EventOddsDto) -> FixtureOdds {
        let mut odds = FixtureOdds::default();

        for bookmaker in &dto.bookmakers {
            if !self.bookmakers.iter().any(|b| b == &bookmaker.key) {
                continue;
            }

            for market in &bookmaker.markets {
                match market.key.as_str() {
                    "h2h" => self.convert_h2h(fixture, &dto, bookmaker, market, &mut odds),
                    "totals" => Self::convert_totals(fixture, bookmaker, market, &mut odds),
                    _ => {}
                }
            }
        }

        odds
    }

    fn convert_h2h(
        &self,
        fixture: &Fixture,
        dto: &EventOddsDto,
        bookmaker: &BookmakerDto,
        market: &MarketDto,
        odds: &mut FixtureOdds,
    ) {
        let price_of = |name: &str| -> Option<f64> {
            market
                .outcomes
                .iter()
                .find(|o| o.name == name)
                .map(|o| o.price)
        };

        let home = price_of(&dto.home_team);
        let draw = price_of("Draw");
        let away = price_of(&dto.away_team);

        if let (Some(h), Some(d), Some(a)) = (home, draw, away) {
            odds.complements
                .entry("h2h".to_string())
                .or_default()
                .push(ComplementSet {
                    bookmaker: bookmaker.key.clone(),
                    prices: vec![h, d, a],
                    timestamp: market.last_update,
                });
        }

        if let (Some(h), Some(d)) = (home, draw) {
            odds.quotes.push(Quote {
                match_id: fixture.id.clone(),
                market: MarketKind::DoubleChance1X,
                outcome: "1X".to_string(),
                bookmaker: bookmaker.key.clone(),
                price: round2(1.0 / (1.0 / h + 1.0 / d)),
                timestamp: market.last_update,
            });
        }

        if let (Some(d), Some(a)) = (draw, away) {
            odds.quotes.push(Quote {
                match_id: fixture.id.clone(),
                market: MarketKind::DoubleChanceX2,
                outcome: "X2".to_string(),
                bookmaker: bookmaker.key.clone(),
                price: round2(1.0 / (1.0 / d + 1.0 / a)),
                timestamp: market.last_update,
            });
        }
    }

    fn convert_totals(
        fixture: &Fixture,
        bookmaker: &BookmakerDto,
        market: &MarketDto,
        odds: &mut FixtureOdds,
    ) {
        // Over/Under quotes per goal line, complement pair when a book
        // quotes both sides of the same line.
        let mut lines: Vec<f64> = Vec::new();

        for outcome in &market.outcomes {
            let Some(point) = outcome.point else { continue };
            let kind = match outcome.name.as_str() {
                "Over" => MarketKind::TotalsOver,
                "Under" => MarketKind::TotalsUnder,
                _ => continue,
            };
            if !lines.contains(&point) {
                lines.push(point);
            }
            odds.quotes.push(Quote {
                match_id: fixture.id.clone(),
                market: kind,
                outcome: format!("{} {}", outcome.name, fmt_line(point)),
                bookmaker: bookmaker.key.clone(),
                price: outcome.price,
                timestamp: market.last_update,
            });
        }

        for line in lines {
            let side = |name: &str| -> Option<f64> {
                market
                    .outcomes
                    .iter()
                    .find(|o| o.name == name && o.point == Some(line))
                    .map(|o| o.price)
            };
            if let (Some(over), Some(under)) = (side("Over"), side("Under")) {
                odds.complements
                    .entry(format!("totals {}", fmt_line(line)))
                    .or_default()
                    .push(ComplementSet {
                        bookmaker: bookmaker.key.clone(),
                        prices: vec![over, under],
                        timestamp: market.last_update,
                    });
            }
        }
    }
}

/// Round a derived price to 2 decimals (derived double-chance quotes only;
/// prices straight from the API are passed through untouched).
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Goal-line label shared by quote outcomes and complement keys.
fn fmt_line(point: f64) -> String {
    format!("{point}")
}

// ---------------------------------------------------------------------------
// OddsProvider implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl OddsProvider for TheOddsApiClient {
    async fn fetch_fixtures(&self) -> Result<Vec<Fixture>> {
        let mut all = Vec::new();

        for (sport_key, league, country) in SOCCER_LEAGUES {
            match self.fetch_league(sport_key, league, country).await {
                Ok(fixtures) => {
                    info!(league, count = fixtures.len(), "Fixtures listed");
                    all.extend(fixtures);
                }
                Err(e) => {
                    warn!(league, error = %e, "League listing failed, skipping");
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(LEAGUE_PAUSE_MS)).await;
        }

        info!(total = all.len(), "Fixture listing complete");
        Ok(all)
    }

    async fn fetch_odds(&self, fixture: &Fixture) -> Result<FixtureOdds> {
        let url = format!(
            "{BASE_URL}/sports/{}/events/{}/odds",
            fixture.sport_key,
            urlencoding::encode(&fixture.id),
        );
        let bookmakers = self.bookmakers.join(",");

        let resp = self
            .http
            .get(&url)
            .query(&[
                ("apiKey", self.api_key.expose_secret().as_str()),
                ("regions", self.regions.as_str()),
                ("markets", "h2h,totals"),
                ("oddsFormat", "decimal"),
                ("dateFormat", "iso"),
                ("bookmakers", bookmakers.as_str()),
            ])
            .send()
            .await
            .context("The Odds API odds request failed")?;

        // 404 = odds not posted yet, normal for far-out fixtures.
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(fixture = %fixture, "No odds posted yet (404)");
            return Ok(FixtureOdds::default());
        }

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("The Odds API error {status} fetching odds for {}", fixture.id);
        }

        let dto: EventOddsDto = resp
            .json()
            .await
            .context("Failed to parse The Odds API odds response")?;

        let odds = self.convert_event_odds(fixture, dto);
        debug!(
            fixture = %fixture,
            quotes = odds.quotes.len(),
            "Odds fetched"
        );
        Ok(odds)
    }

    async fn remaining_requests(&self) -> Result<Option<u32>> {
        let url = format!("{BASE_URL}/sports");
        let resp = self
            .http
            .get(&url)
            .query(&[("apiKey", self.api_key.expose_secret().as_str())])
            .send()
            .await
            .context("The Odds API quota probe failed")?;

        let remaining = resp
            .headers()
            .get("x-requests-remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u32>().ok());

        if let Some(n) = remaining {
            info!(remaining = n, "The Odds API quota");
        }
        Ok(remaining)
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
