use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;

use super::{normalize_token, PriceProvider};
use crate::error::FetchError;

/// Provider backed by a fixed price table. No network access.
#[derive(Debug, Clone, Default)]
pub struct StaticPriceProvider {
    prices: HashMap<String, f64>,
}

impl StaticPriceProvider {
    pub fn new(prices: HashMap<String, f64>) -> Self {
        let prices = prices
            .into_iter()
            .map(|(token, price)| (normalize_token(&token), price))
            .collect();
        Self { prices }
    }
}

#[async_trait]
impl PriceProvider for StaticPriceProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn supports(&self, token_id: &str) -> bool {
        self.prices.contains_key(&normalize_token(token_id))
    }

    async fn fetch(&self, token_id: &str) -> Result<f64, FetchError> {
        match self.prices.get(&normalize_token(token_id)) {
            Some(&price) if price >= 0.0 && price.is_finite() => {
                debug!("Static price for {}: ${}", token_id, price);
                Ok(price)
            }
            Some(&price) => Err(FetchError::Parse(format!(
                "configured price for {} is not a valid USD amount: {}",
                token_id, price
            ))),
            None => Err(FetchError::UnknownToken(token_id.to_string())),
        }
    }
}
