use std::collections::HashMap;

use crate::settings::ConversionSettings;

/// Static fiat -> USD conversion table.
///
/// Currency codes are matched case-insensitively (`aed` == `AED`).
#[derive(Debug, Clone)]
pub struct FiatConverter {
    rates_to_usd: HashMap<String, f64>,
}

impl FiatConverter {
    pub fn new(rates_to_usd: HashMap<String, f64>) -> Self {
        let rates_to_usd = rates_to_usd
            .into_iter()
            .map(|(code, rate)| (code.trim().to_uppercase(), rate))
            .collect();
        Self { rates_to_usd }
    }

    pub fn from_settings(settings: &ConversionSettings) -> Self {
        Self::new(settings.rates_to_usd.clone())
    }

    pub fn rate(&self, currency: &str) -> Result<f64, ConversionError> {
        let code = currency.trim().to_uppercase();
        match self.rates_to_usd.get(&code) {
            Some(&rate) if rate.is_finite() && rate > 0.0 => Ok(rate),
            Some(&rate) => Err(ConversionError::InvalidRate { currency: code, rate }),
            None => Err(ConversionError::UnsupportedCurrency(code)),
        }
    }

    pub fn to_usd(&self, amount: f64, currency: &str) -> Result<f64, ConversionError> {
        Ok(amount * self.rate(currency)?)
    }
}

impl Default for FiatConverter {
    fn default() -> Self {
        Self::from_settings(&ConversionSettings::default())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),
    #[error("Invalid rate for {currency}: {rate}")]
    InvalidRate { currency: String, rate: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aed_to_usd() {
        let converter = FiatConverter::default();
        let usd = converter.to_usd(10_000.0, "AED").unwrap();
        assert!((usd - 2_700.0).abs() < 1e-9);
        assert_eq!(converter.to_usd(15.0, "usd"), Ok(15.0));
    }

    #[test]
    fn test_unsupported_and_invalid() {
        let converter = FiatConverter::new(HashMap::from([("eur".to_string(), 0.0)]));
        assert_eq!(
            converter.to_usd(1.0, "GBP"),
            Err(ConversionError::UnsupportedCurrency("GBP".to_string()))
        );
        assert_eq!(
            converter.rate("EUR"),
            Err(ConversionError::InvalidRate {
                currency: "EUR".to_string(),
                rate: 0.0
            })
        );
    }
}
