//! Client positions valued through the price cache.
//!
//! This is the composition the admin and client dashboards perform per
//! request: convert the fiat investment basis to USD, value the holding at
//! the cached price, then derive profit/loss.

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::conversion::{ConversionError, FiatConverter};
use crate::holdings::ProfitLoss;
use crate::models::HoldingsValuation;
use crate::price_cache::PriceCache;

fn default_currency() -> String {
    "AED".to_string()
}

/// One client's holding as stored by the surrounding application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientPosition {
    pub name: String,
    pub token_id: String,
    pub tokens_held: f64,
    pub amount_invested: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionReport {
    pub name: String,
    pub amount_invested: f64,
    pub currency: String,
    pub holdings: HoldingsValuation,
    #[serde(flatten)]
    pub profit_loss: ProfitLoss,
}

/// Values a single position. Fails only on an unknown currency; price
/// problems show up as `holdings.data_source`.
pub async fn value_position(
    cache: &PriceCache,
    converter: &FiatConverter,
    position: &ClientPosition,
) -> Result<PositionReport, ConversionError> {
    let converted_investment = converter.to_usd(position.amount_invested, &position.currency)?;
    Ok(report(cache, position, converted_investment).await)
}

/// Values every position concurrently, in input order.
///
/// All currencies are checked before any price lookup, so a bad record does
/// not cost upstream requests.
pub async fn value_positions(
    cache: &PriceCache,
    converter: &FiatConverter,
    positions: &[ClientPosition],
) -> Result<Vec<PositionReport>, ConversionError> {
    let bases = positions
        .iter()
        .map(|p| converter.to_usd(p.amount_invested, &p.currency))
        .collect::<Result<Vec<f64>, _>>()?;

    let tasks = positions
        .iter()
        .zip(bases)
        .map(|(position, basis)| report(cache, position, basis));

    Ok(join_all(tasks).await)
}

async fn report(cache: &PriceCache, position: &ClientPosition, converted_investment: f64) -> PositionReport {
    let holdings = cache
        .calculate_holdings(&position.token_id, position.tokens_held)
        .await;
    let profit_loss = ProfitLoss::for_valuation(&holdings, converted_investment);

    PositionReport {
        name: position.name.clone(),
        amount_invested: position.amount_invested,
        currency: position.currency.clone(),
        holdings,
        profit_loss,
    }
}
