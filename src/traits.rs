//! Traits for the external collaborators the engine reads from and reports to

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::rates::{ChargeCatalog, RangeTable};
use crate::reconciliation::Alert;
use crate::types::*;

/// Storage abstraction for rate sheets
///
/// Each owner (gateway, trustee base sheet, school base override, school final
/// sheet) has at most one catalog. Implement this over whatever database holds
/// the sheets.
#[async_trait]
pub trait RateSheetStore: Send + Sync {
    /// Get the catalog of an owner, `None` when the owner has no sheet
    async fn get(&self, owner: &OwnerKey) -> FeeResult<Option<ChargeCatalog>>;

    /// Replace the catalog of an owner
    async fn put(&mut self, owner: &OwnerKey, catalog: ChargeCatalog) -> FeeResult<()>;
}

/// Source of the captured order amount of a transaction
#[async_trait]
pub trait PaymentStatusSource: Send + Sync {
    /// `Ok(None)` when the transaction is known but carries no amount
    async fn get_order_amount(&self, transaction_ref: &str) -> FeeResult<Option<BigDecimal>>;
}

/// Live rate the payments backend applies to a school
#[async_trait]
pub trait AppliedRateSource: Send + Sync {
    async fn get_applied_rate(
        &self,
        school_id: &str,
        payment_mode: &str,
        platform_type: &str,
        amount: &BigDecimal,
    ) -> FeeResult<Option<RangeCharge>>;
}

/// Platform-side transaction feed (successful orders only)
#[async_trait]
pub trait TransactionAggregateSource: Send + Sync {
    /// Total order amount for the window, `None` when there is no data
    async fn get_total(&self, school_id: &str, window: &DateWindow)
        -> FeeResult<Option<BigDecimal>>;
}

/// Gateway settlement feed
#[async_trait]
pub trait SettlementAggregateSource: Send + Sync {
    /// Total settled order amount for the window, `None` when there is no data
    async fn get_total(&self, school_id: &str, window: &DateWindow)
        -> FeeResult<Option<BigDecimal>>;
}

/// Per-school check for whether any transaction settled on a date
#[async_trait]
pub trait SettlementExistenceSource: Send + Sync {
    /// Number of transactions the backend reports for `price_key` on `date`
    async fn count_transactions(&self, price_key: &str, date: NaiveDate) -> FeeResult<u64>;
}

/// One-way notification channel for structured reports
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, alert: Alert) -> FeeResult<()>;
}

/// Trait for implementing custom rate sheet validation rules
pub trait ChargeValidator: Send + Sync {
    /// Validate an entry before it is added to a catalog
    fn validate_charge(&self, entry: &PlatformCharge) -> FeeResult<()>;
}

/// Default validator: non-empty keys and a well-formed tier table
pub struct DefaultChargeValidator;

impl ChargeValidator for DefaultChargeValidator {
    fn validate_charge(&self, entry: &PlatformCharge) -> FeeResult<()> {
        if entry.platform_type.trim().is_empty() {
            return Err(FeeError::Validation(
                "Platform type cannot be empty".to_string(),
            ));
        }

        if entry.payment_mode.trim().is_empty() {
            return Err(FeeError::Validation(
                "Payment mode cannot be empty".to_string(),
            ));
        }

        RangeTable::new(entry.range_charge.clone()).validate()
    }
}
