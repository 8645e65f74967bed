//! # Token Price Cache
//!
//! Price layer for a client holdings dashboard: a time-bounded, failure
//! tolerant cache in front of a slow and rate-limited price API, plus the
//! arithmetic that turns a cached price into a holding value and a
//! profit/loss figure.
//!
//! ## Overview
//!
//! - **Providers**: one upstream request per call, typed failures
//!   ([`providers::PriceProvider`], [`providers::CoinGeckoProvider`])
//! - **Cache**: per-token TTL, stale fallback when refresh fails, one
//!   upstream request per expired token no matter how many callers
//!   ([`PriceCache`])
//! - **Holdings**: value and profit/loss with guards against an unavailable
//!   price or an empty investment basis ([`holdings`], [`portfolio`])
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use token_price_cache::{PriceCache, PriceSource, Settings};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let settings = Settings::new()?;
//! let cache = Arc::new(PriceCache::from_settings(&settings)?);
//!
//! let valuation = cache.calculate_holdings("Bitcoin", 0.5).await;
//! if valuation.data_source == PriceSource::Unavailable {
//!     println!("no data");
//! }
//! # Ok(())
//! # }
//! ```

/// Error types
pub mod error;
/// Value types returned by the cache
pub mod models;
/// Time source abstraction
pub mod clock;
/// Upstream price providers
pub mod providers;
/// TTL price cache
pub mod price_cache;
/// Holdings arithmetic
pub mod holdings;
/// Fiat to USD conversion
pub mod conversion;
/// Client position valuation
pub mod portfolio;
/// Configuration management
pub mod settings;

pub use clock::{Clock, ManualClock, SystemClock};
pub use conversion::FiatConverter;
pub use error::{BuildError, FetchError};
pub use holdings::ProfitLoss;
pub use models::{CacheEntry, HoldingsValuation, PriceLookup, PriceSource};
pub use portfolio::{ClientPosition, PositionReport};
pub use price_cache::{CacheMetricsSnapshot, PriceCache};
pub use providers::PriceProvider;
pub use settings::Settings;
