//! Odds provider integrations.
//!
//! Defines the `OddsProvider` trait and provides implementations for:
//! - The Odds API — primary source, fixture listings + H2H/totals prices
//! - Odds-API.io — optional supplement contributing one extra bookmaker
//!
//! Supplement-only providers cannot enumerate fixtures and return an
//! empty listing for that operation.

pub mod odds_api_io;
pub mod the_odds_api;

use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::types::{Fixture, FixtureOdds};

/// Abstraction over betting odds sources.
///
/// Implementors supply upcoming fixtures and the per-bookmaker quotes and
/// complementary price sets for one fixture. All network error handling
/// lives behind this boundary: the analysis core only ever sees valid,
/// already-validated collections.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OddsProvider: Send + Sync {
    /// List upcoming fixtures across all covered leagues.
    /// Supplement-only providers return an empty list.
    async fn fetch_fixtures(&self) -> Result<Vec<Fixture>>;

    /// Fetch all quotes and complement sets for one fixture.
    /// "No odds posted yet" is an empty `FixtureOdds`, not an error.
    async fn fetch_odds(&self, fixture: &Fixture) -> Result<FixtureOdds>;

    /// Remaining API request quota, when the provider reports one.
    async fn remaining_requests(&self) -> Result<Option<u32>>;

    /// Provider name for logging and identification.
    fn name(&self) -> &str;
}
