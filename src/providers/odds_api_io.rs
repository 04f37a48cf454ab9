//! Odds-API.io integration — optional supplementary source.
//!
//! Contributes one extra bookmaker's moneyline (1X2) prices per fixture.
//! Cannot enumerate fixtures itself: events are located by fuzzy team-name
//! matching against the primary provider's fixture. Disabled entirely when
//! no API key is configured.
//!
//! API docs: https://docs.odds-api.io/

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use tracing::{debug, warn};

use super::OddsProvider;
use crate::types::{ComplementSet, Fixture, FixtureOdds, MarketKind, Quote};

const BASE_URL: &str = "https://api.odds-api.io/v3";
const PROVIDER_NAME: &str = "odds_api_io";

/// How many events to page through when searching for a fixture.
const EVENT_SEARCH_LIMIT: u32 = 100;

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct EventDto {
    id: String,
    #[serde(default)]
    home: String,
    #[serde(default)]
    away: String,
}

#[derive(Debug, Deserialize)]
struct EventOddsDto {
    #[serde(default)]
    bookmakers: std::collections::HashMap<String, Vec<MarketDto>>,
}

#[derive(Debug, Deserialize)]
struct MarketDto {
    #[serde(default)]
    name: String,
    #[serde(default)]
    odds: Vec<MoneylineDto>,
}

#[derive(Debug, Deserialize)]
struct MoneylineDto {
    #[serde(default)]
    home: Option<f64>,
    #[serde(default)]
    draw: Option<f64>,
    #[serde(default)]
    away: Option<f64>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Odds-API.io client for one supplementary bookmaker.
pub struct OddsApiIoClient {
    http: Client,
    api_key: Option<Secret<String>>,
    /// The bookmaker whose prices this source contributes, e.g. "Bwin".
    bookmaker: String,
}

impl OddsApiIoClient {
    /// `api_key = None` builds a disabled client: every fetch returns
    /// empty odds without touching the network.
    pub fn new(api_key: Option<String>, bookmaker: String) -> Result<Self> {
        if api_key.is_none() {
            warn!("Odds-API.io key not configured — supplementary bookmaker disabled");
        }
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("ODDSIGHT/0.1.0 (odds-scanner)")
            .build()
            .context("Failed to build HTTP client for Odds-API.io")?;

        Ok(Self {
            http,
            api_key: api_key.map(Secret::new),
            bookmaker,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Locate the provider's event id for a fixture by team names.
    async fn find_event(&self, key: &Secret<String>, fixture: &Fixture) -> Result<Option<String>> {
        let url = format!("{BASE_URL}/events");
        let limit = EVENT_SEARCH_LIMIT.to_string();
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("apiKey", key.expose_secret().as_str()),
                ("sport", "football"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .context("Odds-API.io events request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("Odds-API.io error {status} listing events");
        }

        let events: Vec<EventDto> = resp
            .json()
            .await
            .context("Failed to parse Odds-API.io events response")?;

        Ok(events
            .into_iter()
            .find(|e| teams_match(&e.home, &e.away, &fixture.home_team, &fixture.away_team))
            .map(|e| e.id))
    }

    /// Convert a moneyline triple into quotes + the H2H complement set.
    fn convert_moneyline(&self, fixture: &Fixture, ml: &MoneylineDto) -> FixtureOdds {
        let mut odds = FixtureOdds::default();
        let (Some(home), Some(draw), Some(away)) = (ml.home, ml.draw, ml.away) else {
            return odds;
        };
        if home <= 1.0 || draw <= 1.0 || away <= 1.0 {
            return odds;
        }

        let now = Utc::now();
        odds.complements
            .entry("h2h".to_string())
            .or_default()
            .push(ComplementSet {
                bookmaker: self.bookmaker.clone(),
                prices: vec![home, draw, away],
                timestamp: now,
            });

        odds.quotes.push(Quote {
            match_id: fixture.id.clone(),
            market: MarketKind::DoubleChance1X,
            outcome: "1X".to_string(),
            bookmaker: self.bookmaker.clone(),
            price: round4(1.0 / (1.0 / home + 1.0 / draw)),
            timestamp: now,
        });
        odds.quotes.push(Quote {
            match_id: fixture.id.clone(),
            market: MarketKind::DoubleChanceX2,
            outcome: "X2".to_string(),
            bookmaker: self.bookmaker.clone(),
            price: round4(1.0 / (1.0 / draw + 1.0 / away)),
            timestamp: now,
        });

        odds
    }
}

/// Case-insensitive containment match in either direction — provider
/// team names rarely agree exactly ("Man United" vs "Manchester United").
fn teams_match(event_home: &str, event_away: &str, home: &str, away: &str) -> bool {
    let contains = |a: &str, b: &str| -> bool {
        let a = a.to_lowercase();
        let b = b.to_lowercase();
        !a.is_empty() && !b.is_empty() && (a.contains(&b) || b.contains(&a))
    };
    contains(event_home, home) && contains(event_away, away)
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

// ---------------------------------------------------------------------------
// OddsProvider implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl OddsProvider for OddsApiIoClient {
    /// Supplement-only: cannot enumerate fixtures.
    async fn fetch_fixtures(&self) -> Result<Vec<Fixture>> {
        Ok(Vec::new())
    }

    async fn fetch_odds(&self, fixture: &Fixture) -> Result<FixtureOdds> {
        let Some(key) = self.api_key.as_ref() else {
            return Ok(FixtureOdds::default());
        };

        let Some(event_id) = self.find_event(key, fixture).await? else {
            debug!(fixture = %fixture, "No Odds-API.io event match");
            return Ok(FixtureOdds::default());
        };

        let url = format!("{BASE_URL}/odds");
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("apiKey", key.expose_secret().as_str()),
                ("eventId", event_id.as_str()),
                ("bookmakers", self.bookmaker.as_str()),
            ])
            .send()
            .await
            .context("Odds-API.io odds request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("Odds-API.io error {status} fetching odds for event {event_id}");
        }

        let dto: EventOddsDto = resp
            .json()
            .await
            .context("Failed to parse Odds-API.io odds response")?;

        let Some(markets) = dto.bookmakers.get(&self.bookmaker) else {
            debug!(bookmaker = %self.bookmaker, event_id, "Bookmaker absent from response");
            return Ok(FixtureOdds::default());
        };

        let odds = markets
            .iter()
            .find(|m| m.name == "ML")
            .and_then(|m| m.odds.first())
            .map(|ml| self.convert_moneyline(fixture, ml))
            .unwrap_or_default();

        if odds.is_empty() {
            debug!(fixture = %fixture, "No usable moneyline from supplement");
        }
        Ok(odds)
    }

    async fn remaining_requests(&self) -> Result<Option<u32>> {
        // Quota is not exposed by this API.
        Ok(None)
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
