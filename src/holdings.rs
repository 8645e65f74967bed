//! Holdings arithmetic.
//!
//! Pure functions, no I/O. The profit/loss figures are only reported when the
//! holding has a positive value: an `unavailable` price (0.0) must never be
//! shown as a 100% loss, and a zero investment basis must never produce
//! `inf` or `NaN`.

use serde::{Deserialize, Serialize};

use crate::models::HoldingsValuation;

pub fn total_value(unit_price: f64, quantity_held: f64) -> f64 {
    unit_price * quantity_held
}

/// Profit/loss of a holding against its USD investment basis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProfitLoss {
    pub converted_investment: f64,
    pub profit_loss: f64,
    pub profit_loss_percentage: f64,
}

impl ProfitLoss {
    pub fn compute(total_value: f64, converted_investment: f64) -> Self {
        if total_value <= 0.0 {
            return Self {
                converted_investment,
                ..Self::default()
            };
        }

        let profit_loss = total_value - converted_investment;
        let profit_loss_percentage = if converted_investment > 0.0 {
            (profit_loss / converted_investment) * 100.0
        } else {
            0.0
        };

        Self {
            converted_investment,
            profit_loss,
            profit_loss_percentage,
        }
    }

    /// Shortcut over a valuation returned by the cache.
    pub fn for_valuation(valuation: &HoldingsValuation, converted_investment: f64) -> Self {
        Self::compute(valuation.total_value, converted_investment)
    }

    pub fn is_gain(&self) -> bool {
        self.profit_loss > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_value() {
        assert_eq!(total_value(10.0, 3.0), 30.0);
        assert_eq!(total_value(10.0, 0.0), 0.0);
        assert_eq!(total_value(10.0, -1.5), -15.0);
    }

    #[test]
    fn test_gain_and_percentage() {
        // 10_000 AED at 0.27 = 2_700 USD basis
        let pl = ProfitLoss::compute(3_375.0, 2_700.0);
        assert_eq!(pl.profit_loss, 675.0);
        assert_eq!(pl.profit_loss_percentage, 25.0);
        assert!(pl.is_gain());
    }

    #[test]
    fn test_loss() {
        let pl = ProfitLoss::compute(50.0, 200.0);
        assert_eq!(pl.profit_loss, -150.0);
        assert_eq!(pl.profit_loss_percentage, -75.0);
        assert!(!pl.is_gain());
    }

    #[test]
    fn test_zero_value_reports_nothing() {
        let pl = ProfitLoss::compute(0.0, 2_700.0);
        assert_eq!(pl.profit_loss, 0.0);
        assert_eq!(pl.profit_loss_percentage, 0.0);
        assert_eq!(pl.converted_investment, 2_700.0);

        let negative = ProfitLoss::compute(-20.0, 100.0);
        assert_eq!(negative.profit_loss, 0.0);
        assert_eq!(negative.profit_loss_percentage, 0.0);
    }

    #[test]
    fn test_zero_basis_is_finite() {
        let pl = ProfitLoss::compute(500.0, 0.0);
        assert_eq!(pl.profit_loss, 500.0);
        assert_eq!(pl.profit_loss_percentage, 0.0);
        assert!(pl.profit_loss_percentage.is_finite());

        let negative_basis = ProfitLoss::compute(500.0, -10.0);
        assert_eq!(negative_basis.profit_loss_percentage, 0.0);
    }
}
