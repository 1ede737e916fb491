//! Validation utilities

use bigdecimal::BigDecimal;

use crate::traits::*;
use crate::types::*;

/// Validate that an owner or school identifier is usable as a key
pub fn validate_identifier(id: &str) -> FeeResult<()> {
    if id.trim().is_empty() {
        return Err(FeeError::Validation(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if id.len() > 64 {
        return Err(FeeError::Validation(
            "Identifier cannot exceed 64 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate a single tier's numbers
pub fn validate_tier(tier: &RangeCharge) -> FeeResult<()> {
    let zero = BigDecimal::from(0);

    if tier.charge < zero {
        return Err(FeeError::Validation(format!(
            "Charge cannot be negative: {}",
            tier.charge
        )));
    }

    if tier.charge_type == ChargeType::Percent && tier.charge > BigDecimal::from(100) {
        return Err(FeeError::Validation(format!(
            "Percent charge cannot exceed 100: {}",
            tier.charge
        )));
    }

    if let Some(upto) = &tier.upto {
        if *upto <= zero {
            return Err(FeeError::Validation(format!(
                "Tier bound must be positive: {}",
                upto
            )));
        }
    }

    Ok(())
}

/// Validate that a batch input names at least one school
///
/// Individual ids are checked per school so one bad id cannot fail the batch.
pub fn validate_school_batch<T>(schools: &[T]) -> FeeResult<()> {
    if schools.is_empty() {
        return Err(FeeError::Validation(
            "School list cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validator that also checks every tier's numbers
pub struct StrictChargeValidator;

impl ChargeValidator for StrictChargeValidator {
    fn validate_charge(&self, entry: &PlatformCharge) -> FeeResult<()> {
        DefaultChargeValidator.validate_charge(entry)?;

        for tier in &entry.range_charge {
            validate_tier(tier)?;
        }

        // Out-of-order bounds are legal but usually a data-entry mistake
        let bounds: Vec<&BigDecimal> = entry
            .range_charge
            .iter()
            .filter_map(|t| t.upto.as_ref())
            .collect();
        if bounds.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(FeeError::Validation(format!(
                "Tier bounds for {}/{} must be strictly ascending",
                entry.platform_type, entry.payment_mode
            )));
        }

        Ok(())
    }
}
