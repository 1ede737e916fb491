//! Engine configuration

use bigdecimal::BigDecimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::tax::gst::standard_gst_rate;
use crate::types::{FeeError, FeeResult};

/// Settings shared by the commission cascade and the reconciliation engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Owner id of the gateway whose sheet holds the buying rates
    pub gateway_owner_id: String,
    /// GST rate as a fraction
    pub gst_rate: BigDecimal,
    /// Maximum number of schools processed at once in batch passes
    pub max_concurrency: usize,
    /// Deadline for each external call
    pub call_timeout: Duration,
    /// Totals differing by at most this much are not mismatches
    pub mismatch_tolerance: BigDecimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gateway_owner_id: "edviron-pg".to_string(),
            gst_rate: standard_gst_rate(),
            max_concurrency: 8,
            call_timeout: Duration::from_millis(10_000),
            mismatch_tolerance: BigDecimal::from(0),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> FeeResult<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let config = Self {
            gateway_owner_id: env::var("COMMISSION_GATEWAY_ID")
                .unwrap_or(defaults.gateway_owner_id),
            gst_rate: parse_var("COMMISSION_GST_RATE", defaults.gst_rate, |raw| {
                BigDecimal::from_str(raw).ok()
            })?,
            max_concurrency: parse_var("COMMISSION_MAX_CONCURRENCY", defaults.max_concurrency, |raw| {
                raw.parse().ok()
            })?,
            call_timeout: parse_var("COMMISSION_CALL_TIMEOUT_MS", defaults.call_timeout, |raw| {
                raw.parse().ok().map(Duration::from_millis)
            })?,
            mismatch_tolerance: parse_var(
                "COMMISSION_MISMATCH_TOLERANCE",
                defaults.mismatch_tolerance,
                |raw| BigDecimal::from_str(raw).ok(),
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> FeeResult<()> {
        if self.gateway_owner_id.trim().is_empty() {
            return Err(FeeError::Configuration(
                "Gateway owner id cannot be empty".to_string(),
            ));
        }

        if self.max_concurrency == 0 {
            return Err(FeeError::Configuration(
                "Max concurrency must be greater than 0".to_string(),
            ));
        }

        if self.call_timeout.is_zero() {
            return Err(FeeError::Configuration(
                "Call timeout must be greater than 0".to_string(),
            ));
        }

        if self.gst_rate < BigDecimal::from(0) {
            return Err(FeeError::Configuration(
                "GST rate cannot be negative".to_string(),
            ));
        }

        if self.mismatch_tolerance < BigDecimal::from(0) {
            return Err(FeeError::Configuration(
                "Mismatch tolerance cannot be negative".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_var<T>(key: &str, default: T, parse: impl Fn(&str) -> Option<T>) -> FeeResult<T> {
    match env::var(key) {
        Ok(raw) => parse(raw.trim()).ok_or_else(|| FeeError::Configuration(format!("Invalid {key}"))),
        Err(_) => Ok(default),
    }
}
