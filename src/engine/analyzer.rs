//! Scan orchestration.
//!
//! Pulls upcoming fixtures from every configured provider, fetches odds
//! per fixture with bounded concurrency, groups quotes by (market,
//! outcome), runs the aggregation and compliance cores, and returns the
//! globally-ranked result list. A market whose aggregation fails is
//! skipped with a warning — one bad market never aborts the run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::analysis::{aggregate, CriterionFilter};
use crate::providers::OddsProvider;
use crate::types::{
    AnalyzedMarket, Fixture, FixtureOdds, FilterCriteria, MarketKind, MarketSummary, Quote,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Engine tuning knobs (see `[scanner]` / `[analysis]` in config.toml).
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Fixtures kicking off within this window are fetched first — odds
    /// are most likely to be posted for near matches.
    pub priority_window_hours: i64,
    /// Pause before each per-fixture odds fetch (provider rate limits).
    pub request_pause: Duration,
    /// How many per-fixture fetches may be in flight at once.
    pub fetch_concurrency: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            priority_window_hours: 72,
            request_pause: Duration::from_millis(500),
            fetch_concurrency: 4,
        }
    }
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// One-shot odds analyzer over a set of providers.
pub struct OddsAnalyzer {
    providers: Vec<Box<dyn OddsProvider>>,
    filter: CriterionFilter,
    config: AnalyzerConfig,
}

impl OddsAnalyzer {
    pub fn new(
        providers: Vec<Box<dyn OddsProvider>>,
        filter: CriterionFilter,
        config: AnalyzerConfig,
    ) -> Self {
        Self {
            providers,
            filter,
            config,
        }
    }

    /// The criteria this run applies.
    pub fn criteria(&self) -> &FilterCriteria {
        self.filter.criteria()
    }

    /// Probe every provider's connectivity/quota. The scan itself treats
    /// provider failures as soft; this is for the `validate` command.
    pub async fn validate_connections(&self) -> Vec<(String, bool)> {
        let mut statuses = Vec::new();
        for provider in &self.providers {
            let ok = match provider.remaining_requests().await {
                Ok(Some(remaining)) => {
                    info!(provider = provider.name(), remaining, "Provider quota");
                    remaining > 0
                }
                Ok(None) => true,
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Provider unreachable");
                    false
                }
            };
            statuses.push((provider.name().to_string(), ok));
        }
        statuses
    }

    /// All upcoming fixtures inside the criteria window, deduplicated
    /// across providers, near matches first.
    pub async fn upcoming_fixtures(&self) -> Result<Vec<Fixture>> {
        let hours_ahead = self.filter.criteria().hours_ahead;
        let mut seen = std::collections::HashSet::new();
        let mut fixtures: Vec<Fixture> = Vec::new();

        for provider in &self.providers {
            match provider.fetch_fixtures().await {
                Ok(listed) => {
                    for fx in listed {
                        if seen.insert(fx.id.clone()) {
                            fixtures.push(fx);
                        }
                    }
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Fixture listing failed");
                }
            }
        }

        fixtures.retain(|fx| fx.starts_within(hours_ahead));

        // Near fixtures first, sorted by kickoff; the long tail keeps its
        // listing order after them.
        let window = self.config.priority_window_hours;
        let (mut near, far): (Vec<Fixture>, Vec<Fixture>) = fixtures
            .into_iter()
            .partition(|fx| fx.starts_within(window));
        near.sort_by_key(|fx| fx.kickoff_time);

        info!(
            near = near.len(),
            far = far.len(),
            window_hours = hours_ahead,
            "Fixtures selected"
        );

        near.extend(far);
        Ok(near)
    }

    /// Run the full scan: fetch, aggregate, evaluate, rank.
    pub async fn analyze_all(&self) -> Result<Vec<AnalyzedMarket>> {
        let fixtures = self.upcoming_fixtures().await?;
        if fixtures.is_empty() {
            warn!("No fixtures inside the analysis window");
            return Ok(Vec::new());
        }

        let total = fixtures.len();
        let done = AtomicUsize::new(0);

        let fetched: Vec<(Fixture, FixtureOdds)> = stream::iter(fixtures)
            .map(|fixture| {
                let done = &done;
                async move {
                    tokio::time::sleep(self.config.request_pause).await;
                    let odds = self.fetch_merged_odds(&fixture).await;
                    let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                    if finished % 10 == 0 {
                        info!(progress = format!("{finished}/{total}"), "Odds fetch progress");
                    }
                    (fixture, odds)
                }
            })
            .buffered(self.config.fetch_concurrency.max(1))
            .collect()
            .await;

        let mut summaries: Vec<MarketSummary> = Vec::new();
        let mut fixtures_by_id: HashMap<String, Fixture> = HashMap::new();
        let mut with_odds = 0usize;
        let mut without_odds = 0usize;

        for (fixture, odds) in fetched {
            if odds.is_empty() {
                without_odds += 1;
                continue;
            }
            with_odds += 1;
            summaries.extend(self.summarize_fixture(&fixture, &odds));
            fixtures_by_id.insert(fixture.id.clone(), fixture);
        }

        let results = self.filter.evaluate_all(&summaries);

        info!(
            with_odds,
            without_odds,
            markets = results.len(),
            compliant = results.iter().filter(|r| r.compliant).count(),
            "Analysis complete"
        );

        Ok(results
            .into_iter()
            .filter_map(|result| {
                fixtures_by_id
                    .get(&result.summary.match_id)
                    .cloned()
                    .map(|fixture| AnalyzedMarket { fixture, result })
            })
            .collect())
    }

    /// Odds for one fixture, merged across every provider. Per-provider
    /// failures are soft: log, skip, keep what the others returned.
    async fn fetch_merged_odds(&self, fixture: &Fixture) -> FixtureOdds {
        let mut merged = FixtureOdds::default();
        for provider in &self.providers {
            match provider.fetch_odds(fixture).await {
                Ok(odds) => {
                    if !odds.is_empty() {
                        debug!(
                            provider = provider.name(),
                            fixture = %fixture,
                            quotes = odds.quotes.len(),
                            "Quotes merged"
                        );
                    }
                    merged.merge(odds);
                }
                Err(e) => {
                    warn!(
                        provider = provider.name(),
                        fixture = %fixture,
                        error = %e,
                        "Odds fetch failed, skipping provider for this fixture"
                    );
                }
            }
        }
        merged
    }

    /// Group a fixture's quotes by (market, outcome) and aggregate each
    /// group. Groups that fail aggregation are skipped with a warning.
    fn summarize_fixture(&self, fixture: &Fixture, odds: &FixtureOdds) -> Vec<MarketSummary> {
        let mut groups: HashMap<(MarketKind, String), Vec<Quote>> = HashMap::new();
        for quote in &odds.quotes {
            if !quote.has_valid_price() {
                warn!(quote = %quote, "Dropping quote with invalid price");
                continue;
            }
            groups
                .entry((quote.market, quote.outcome.clone()))
                .or_default()
                .push(quote.clone());
        }

        let mut keys: Vec<(MarketKind, String)> = groups.keys().cloned().collect();
        keys.sort_by(|a, b| (a.0.key(), &a.1).cmp(&(b.0.key(), &b.1)));

        let mut summaries = Vec::new();
        for key in keys {
            let quotes = &groups[&key];
            let complements = odds.complements_for(key.0, &key.1);
            match aggregate(quotes, complements) {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    warn!(
                        fixture = %fixture,
                        market = %key.0,
                        outcome = %key.1,
                        error = %e,
                        "Aggregation failed, market skipped"
                    );
                }
            }
        }
        summaries
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
