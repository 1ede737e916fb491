//! GST (Goods and Services Tax) decomposition of commission figures

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::types::CommissionFigures;

/// GST percentage charged on platform commissions
pub const GST_RATE_PERCENT: u32 = 18;

/// The standard GST rate as a fraction (0.18)
pub fn standard_gst_rate() -> BigDecimal {
    BigDecimal::from(GST_RATE_PERCENT) / BigDecimal::from(100)
}

/// GST breakdown of a single figure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GstCalculation {
    /// Base amount (before GST)
    pub base_amount: BigDecimal,
    /// Rate used, as a fraction
    pub rate: BigDecimal,
    /// GST on the base amount
    pub gst_amount: BigDecimal,
    /// Base amount plus GST
    pub total_amount: BigDecimal,
}

impl GstCalculation {
    /// Calculate GST on a base amount
    pub fn calculate(base_amount: BigDecimal, rate: BigDecimal) -> Result<Self, GstError> {
        validate_rate(&rate)?;

        let gst_amount = &base_amount * &rate;
        let total_amount = &base_amount + &gst_amount;

        Ok(Self {
            base_amount,
            rate,
            gst_amount,
            total_amount,
        })
    }

    /// Calculate base amount from a GST-inclusive total (reverse calculation)
    pub fn reverse_calculate(total_amount: BigDecimal, rate: BigDecimal) -> Result<Self, GstError> {
        validate_rate(&rate)?;

        let divisor = BigDecimal::from(1) + &rate;
        let base_amount = &total_amount / &divisor;

        Self::calculate(base_amount, rate)
    }
}

/// GST and GST-inclusive versions of a set of commission figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GstBreakdown {
    pub gst_amounts: CommissionFigures,
    pub with_gst: CommissionFigures,
}

/// GST calculation engine for commission figures
#[derive(Debug, Clone)]
pub struct GstCalculator {
    rate: BigDecimal,
}

impl Default for GstCalculator {
    fn default() -> Self {
        Self {
            rate: standard_gst_rate(),
        }
    }
}

impl GstCalculator {
    /// Create a calculator with an explicit rate
    pub fn new(rate: BigDecimal) -> Result<Self, GstError> {
        validate_rate(&rate)?;
        Ok(Self { rate })
    }

    pub fn rate(&self) -> &BigDecimal {
        &self.rate
    }

    /// Apply this calculator's rate to every figure
    pub fn apply(&self, figures: &CommissionFigures) -> GstBreakdown {
        let gst_amounts = figures.map(|figure| figure * &self.rate);
        let with_gst = figures.map(|figure| figure + &(figure * &self.rate));

        GstBreakdown {
            gst_amounts,
            with_gst,
        }
    }
}

/// Apply `rate` to every figure
pub fn apply(rate: &BigDecimal, figures: &CommissionFigures) -> Result<GstBreakdown, GstError> {
    Ok(GstCalculator::new(rate.clone())?.apply(figures))
}

fn validate_rate(rate: &BigDecimal) -> Result<(), GstError> {
    if *rate < BigDecimal::from(0) {
        return Err(GstError::InvalidRate(format!(
            "GST rate cannot be negative: {}",
            rate
        )));
    }
    Ok(())
}

/// GST-related errors
#[derive(Debug, thiserror::Error)]
pub enum GstError {
    #[error("Invalid GST rate: {0}")]
    InvalidRate(String),
}
