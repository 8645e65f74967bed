//! Upstream price sources.
//!
//! A provider performs exactly one lookup per `fetch` call: no caching, no
//! retries. Both live in [`crate::price_cache::PriceCache`].

pub mod coingecko;
pub mod static_prices;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{BuildError, FetchError};
use crate::settings::{ProviderKind, ProviderSettings};

pub use coingecko::CoinGeckoProvider;
pub use static_prices::StaticPriceProvider;

/// Trait for price feed providers
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Name used in log lines
    fn name(&self) -> &str;

    /// Whether `token_id` is in this provider's token table.
    /// The cache checks this before allocating any per-token state.
    fn supports(&self, token_id: &str) -> bool;

    /// USD price of `token_id`
    async fn fetch(&self, token_id: &str) -> Result<f64, FetchError>;
}

/// Builds the provider selected by `settings.kind`.
pub fn build_provider(settings: &ProviderSettings) -> Result<Arc<dyn PriceProvider>, BuildError> {
    match settings.kind {
        ProviderKind::Coingecko => Ok(Arc::new(CoinGeckoProvider::from_settings(settings)?)),
        ProviderKind::Static => Ok(Arc::new(StaticPriceProvider::new(settings.static_prices.clone()))),
    }
}

/// Token tables are matched case-insensitively; `config` may lowercase keys
/// read from TOML.
pub(crate) fn normalize_token(token_id: &str) -> String {
    token_id.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_build_static_provider() {
        let mut settings = ProviderSettings::default();
        settings.kind = ProviderKind::Static;
        settings.static_prices = HashMap::from([("Bitcoin".to_string(), 50_000.0)]);

        let provider = build_provider(&settings).unwrap();
        assert_eq!(provider.name(), "static");
        assert!(provider.supports("bitcoin"));
        assert!(!provider.supports("Ethereum"));
    }

    #[test]
    fn test_build_coingecko_provider() {
        let provider = build_provider(&ProviderSettings::default()).unwrap();
        assert_eq!(provider.name(), "coingecko");
        assert!(provider.supports("Ethereum"));
        assert!(!provider.supports("Dogecoin"));
    }

    #[test]
    fn test_normalize_token() {
        assert_eq!(normalize_token("  Bitcoin "), "bitcoin");
    }
}
