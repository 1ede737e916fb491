//! Tier resolution over an ordered list of range charges

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::*;

/// Ordered charge tiers for one `(platform_type, payment_mode)` pair
///
/// Resolution scans tiers in stored order and the first tier whose bound
/// accepts the amount wins. Tiers are not sorted on the way in, so callers
/// own the ordering: a catch-all placed before a finite tier shadows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RangeTable {
    tiers: Vec<RangeCharge>,
}

impl RangeTable {
    /// Wrap tiers as stored, without reordering or validation
    pub fn new(tiers: Vec<RangeCharge>) -> Self {
        Self { tiers }
    }

    pub fn tiers(&self) -> &[RangeCharge] {
        &self.tiers
    }

    /// First tier, in stored order, that accepts `amount`
    pub fn select(&self, amount: &BigDecimal) -> FeeResult<&RangeCharge> {
        for (index, tier) in self.tiers.iter().enumerate() {
            if tier.matches(amount) {
                debug!(tier = index, upto = ?tier.upto, %amount, "tier selected");
                return Ok(tier);
            }
        }

        Err(FeeError::NoMatchingTier(amount.clone()))
    }

    /// Fee charged on `amount` by the selected tier
    pub fn resolve(&self, amount: &BigDecimal) -> FeeResult<BigDecimal> {
        self.select(amount).map(|tier| tier.fee_for(amount))
    }

    /// Check that the table has exactly one catch-all tier
    pub fn validate(&self) -> FeeResult<()> {
        if self.tiers.is_empty() {
            return Err(FeeError::Validation(
                "Range table must have at least one tier".to_string(),
            ));
        }

        let catch_alls = self.tiers.iter().filter(|t| t.upto.is_none()).count();
        if catch_alls != 1 {
            return Err(FeeError::Validation(format!(
                "Range table must have exactly one unbounded tier, found {}",
                catch_alls
            )));
        }

        Ok(())
    }
}

impl From<Vec<RangeCharge>> for RangeTable {
    fn from(tiers: Vec<RangeCharge>) -> Self {
        Self::new(tiers)
    }
}
