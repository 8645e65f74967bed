// Value types handed across the cache boundary. Callers only ever hold
// copies of these; the cache keeps its own entries behind per-token locks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Último precio obtenido con éxito para un token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub token_id: String,
    /// USD price, never negative
    pub price: f64,
    pub fetched_at: DateTime<Utc>,
}

/// Where the price in a [`PriceLookup`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    /// Served from a cache entry younger than the TTL
    Fresh,
    /// Fetched from the provider during this call
    Refreshed,
    /// Refresh failed, previous value reused
    Stale,
    /// No value was ever obtained
    Unavailable,
}

impl PriceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceSource::Fresh => "fresh",
            PriceSource::Refreshed => "refreshed",
            PriceSource::Stale => "stale",
            PriceSource::Unavailable => "unavailable",
        }
    }

    /// `true` when the price can be shown as a real quote.
    pub fn has_price(&self) -> bool {
        !matches!(self, PriceSource::Unavailable)
    }
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of `PriceCache::get_price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLookup {
    pub price: f64,
    pub last_updated: Option<DateTime<Utc>>,
    pub source: PriceSource,
}

impl PriceLookup {
    pub fn from_entry(entry: &CacheEntry, source: PriceSource) -> Self {
        Self {
            price: entry.price,
            last_updated: Some(entry.fetched_at),
            source,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            price: 0.0,
            last_updated: None,
            source: PriceSource::Unavailable,
        }
    }
}

/// Valuation of a quantity of one token at the cached price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingsValuation {
    pub token_id: String,
    pub current_price: f64,
    pub tokens_held: f64,
    pub total_value: f64,
    pub last_updated: Option<DateTime<Utc>>,
    pub data_source: PriceSource,
}

impl HoldingsValuation {
    pub fn new(token_id: &str, tokens_held: f64, lookup: PriceLookup) -> Self {
        Self {
            token_id: token_id.to_string(),
            current_price: lookup.price,
            tokens_held,
            total_value: crate::holdings::total_value(lookup.price, tokens_held),
            last_updated: lookup.last_updated,
            data_source: lookup.source,
        }
    }
}
