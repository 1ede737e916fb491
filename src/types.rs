//! Core types and data structures for commission and reconciliation

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Payment mode used as the generic fallback inside a platform type
pub const OTHERS_MODE: &str = "Others";

/// How a tier's `charge` turns into a fee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChargeType {
    /// Fee is the stored charge, independent of the amount
    Flat,
    /// Fee is `charge` percent of the amount
    Percent,
}

/// One row of a tiered pricing table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeCharge {
    /// Inclusive upper bound; `None` is the catch-all tier
    pub upto: Option<BigDecimal>,
    pub charge_type: ChargeType,
    pub charge: BigDecimal,
}

impl RangeCharge {
    /// Create a tier bounded by `upto`
    pub fn upto(upto: BigDecimal, charge_type: ChargeType, charge: BigDecimal) -> Self {
        Self {
            upto: Some(upto),
            charge_type,
            charge,
        }
    }

    /// Create the unbounded catch-all tier
    pub fn catch_all(charge_type: ChargeType, charge: BigDecimal) -> Self {
        Self {
            upto: None,
            charge_type,
            charge,
        }
    }

    /// Whether this tier accepts the given amount
    pub fn matches(&self, amount: &BigDecimal) -> bool {
        match &self.upto {
            None => true,
            Some(upto) => amount <= upto,
        }
    }

    /// Fee this tier charges on `amount`
    pub fn fee_for(&self, amount: &BigDecimal) -> BigDecimal {
        match self.charge_type {
            ChargeType::Flat => self.charge.clone(),
            ChargeType::Percent => (&self.charge * amount) / BigDecimal::from(100),
        }
    }
}

/// Tiered charges for one `(platform_type, payment_mode)` pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformCharge {
    pub platform_type: String,
    pub payment_mode: String,
    pub range_charge: Vec<RangeCharge>,
}

impl PlatformCharge {
    /// Create a new platform charge entry
    pub fn new(
        platform_type: impl Into<String>,
        payment_mode: impl Into<String>,
        range_charge: Vec<RangeCharge>,
    ) -> Self {
        Self {
            platform_type: platform_type.into(),
            payment_mode: payment_mode.into(),
            range_charge,
        }
    }

    /// The default sheet every platform starts with: two zero flat tiers split at 2000
    pub fn zero_rated(platform_type: impl Into<String>, payment_mode: impl Into<String>) -> Self {
        Self::new(
            platform_type,
            payment_mode,
            vec![
                RangeCharge::upto(BigDecimal::from(2000), ChargeType::Flat, BigDecimal::from(0)),
                RangeCharge::catch_all(ChargeType::Flat, BigDecimal::from(0)),
            ],
        )
    }

    /// Case-insensitive identity check against a `(platform_type, payment_mode)` key
    pub fn has_key(&self, platform_type: &str, payment_mode: &str) -> bool {
        self.platform_type.eq_ignore_ascii_case(platform_type)
            && self.payment_mode.eq_ignore_ascii_case(payment_mode)
    }
}

/// Owner of a rate sheet
///
/// A school owns two sheets: an optional base-rate override and its final
/// customer-facing sheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum OwnerKey {
    Gateway(String),
    TrusteeBase(String),
    SchoolBase(String),
    SchoolFinal(String),
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerKey::Gateway(id) => write!(f, "gateway:{id}"),
            OwnerKey::TrusteeBase(id) => write!(f, "trustee-base:{id}"),
            OwnerKey::SchoolBase(id) => write!(f, "school-base:{id}"),
            OwnerKey::SchoolFinal(id) => write!(f, "school-final:{id}"),
        }
    }
}

/// The four pricing layers of a commission cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLayer {
    /// What the gateway charges the platform
    GatewayBuying,
    /// Trustee-assigned (or school-overridden) base rate
    SchoolBase,
    /// Customer-facing rate of the school
    SchoolFinal,
    /// Rate the payments backend actually applied
    PgFinal,
}

impl fmt::Display for RateLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RateLayer::GatewayBuying => "gateway buying rate",
            RateLayer::SchoolBase => "school base rate",
            RateLayer::SchoolFinal => "school final rate",
            RateLayer::PgFinal => "payments backend rate",
        };
        f.write_str(name)
    }
}

/// The five earning figures derived from a cascade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionFigures {
    /// Trustee (ERP) share: school final minus school base
    pub erp_commission: BigDecimal,
    /// Platform margin over the gateway buying rate
    pub edviron_earning_base: BigDecimal,
    /// Platform margin between school final and the backend-applied rate
    pub edviron_earning_school: BigDecimal,
    pub edviron_earning: BigDecimal,
    pub total_commission: BigDecimal,
}

impl CommissionFigures {
    /// Apply `f` to every figure
    pub fn map(&self, f: impl Fn(&BigDecimal) -> BigDecimal) -> Self {
        Self {
            erp_commission: f(&self.erp_commission),
            edviron_earning_base: f(&self.edviron_earning_base),
            edviron_earning_school: f(&self.edviron_earning_school),
            edviron_earning: f(&self.edviron_earning),
            total_commission: f(&self.total_commission),
        }
    }

    /// Whether the totals equal the sum of their parts
    pub fn is_consistent(&self) -> bool {
        self.edviron_earning == &self.edviron_earning_base + &self.edviron_earning_school
            && self.total_commission == &self.erp_commission + &self.edviron_earning
    }
}

/// A school together with the trustee that owns it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchoolRef {
    pub school_id: String,
    pub trustee_id: String,
}

impl SchoolRef {
    pub fn new(school_id: impl Into<String>, trustee_id: impl Into<String>) -> Self {
        Self {
            school_id: school_id.into(),
            trustee_id: trustee_id.into(),
        }
    }
}

/// Onboarding record of a school, as scanned for duplicates and settlement gaps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolRecord {
    pub school: SchoolRef,
    pub school_name: String,
    pub email: Option<String>,
    pub client_id: Option<String>,
    /// Payments backend price key; schools without one are not live yet
    pub price_key: Option<String>,
}

impl SchoolRecord {
    pub fn new(school: SchoolRef, school_name: impl Into<String>) -> Self {
        Self {
            school,
            school_name: school_name.into(),
            email: None,
            client_id: None,
            price_key: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_price_key(mut self, price_key: impl Into<String>) -> Self {
        self.price_key = Some(price_key.into());
        self
    }
}

/// Inclusive date range used for aggregate queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Create a window, rejecting `start > end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> FeeResult<Self> {
        if start > end {
            return Err(FeeError::Validation(format!(
                "window start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Window covering a single day
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Errors that can occur while pricing or reconciling transactions
#[derive(Debug, thiserror::Error)]
pub enum FeeError {
    #[error("No tier matches amount {0}")]
    NoMatchingTier(BigDecimal),
    #[error("No charge configured for {platform_type}/{payment_mode}")]
    NoChargeConfigured {
        platform_type: String,
        payment_mode: String,
    },
    #[error("Charge already exists for {platform_type}/{payment_mode}")]
    DuplicateChargeKey {
        platform_type: String,
        payment_mode: String,
    },
    #[error("Charge not found for {platform_type}/{payment_mode}")]
    ChargeNotFound {
        platform_type: String,
        payment_mode: String,
    },
    #[error("Order amount unavailable for transaction {0}")]
    AmountUnavailable(String),
    #[error("Upstream source unavailable: {0}")]
    Unavailable(String),
    #[error("{layer} not found: {source}")]
    LayerFailed {
        layer: RateLayer,
        #[source]
        source: Box<FeeError>,
    },
    #[error("School {school_id} failed: {reason}")]
    PerSchoolFailure { school_id: String, reason: String },
    #[error("Call timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Gst(#[from] crate::tax::gst::GstError),
}

impl FeeError {
    /// Tag an error with the cascade layer it came from
    pub fn in_layer(self, layer: RateLayer) -> Self {
        FeeError::LayerFailed {
            layer,
            source: Box::new(self),
        }
    }

    /// Layer that failed, if this error came out of a cascade
    pub fn layer(&self) -> Option<RateLayer> {
        match self {
            FeeError::LayerFailed { layer, .. } => Some(*layer),
            _ => None,
        }
    }
}

/// Result type for fee operations
pub type FeeResult<T> = Result<T, FeeError>;
