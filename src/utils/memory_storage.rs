//! In-memory collaborators for testing and development

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use crate::rates::ChargeCatalog;
use crate::reconciliation::Alert;
use crate::traits::*;
use crate::types::*;

fn poisoned<T>(_: T) -> FeeError {
    FeeError::Storage("in-memory lock poisoned".to_string())
}

/// In-memory rate sheet storage
#[derive(Debug, Clone, Default)]
pub struct MemoryRateSheetStore {
    catalogs: Arc<RwLock<HashMap<OwnerKey, ChargeCatalog>>>,
}

impl MemoryRateSheetStore {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) -> FeeResult<()> {
        self.catalogs.write().map_err(poisoned)?.clear();
        Ok(())
    }
}

#[async_trait]
impl RateSheetStore for MemoryRateSheetStore {
    async fn get(&self, owner: &OwnerKey) -> FeeResult<Option<ChargeCatalog>> {
        Ok(self.catalogs.read().map_err(poisoned)?.get(owner).cloned())
    }

    async fn put(&mut self, owner: &OwnerKey, catalog: ChargeCatalog) -> FeeResult<()> {
        self.catalogs
            .write()
            .map_err(poisoned)?
            .insert(owner.clone(), catalog);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct BackendState {
    order_amounts: HashMap<String, BigDecimal>,
    applied_rates: HashMap<(String, String, String), RangeCharge>,
    settled_counts: HashMap<(String, NaiveDate), u64>,
    unavailable: HashSet<String>,
}

/// In-memory payments backend: order amounts, applied rates and settlement counts
///
/// Keys registered with [`MemoryPaymentsBackend::fail_for`] (transaction refs,
/// school ids or price keys) answer with `FeeError::Unavailable`.
#[derive(Debug, Clone, Default)]
pub struct MemoryPaymentsBackend {
    state: Arc<RwLock<BackendState>>,
}

impl MemoryPaymentsBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, f: impl FnOnce(&mut BackendState)) {
        let mut state = self.state.write().unwrap_or_else(|p| p.into_inner());
        f(&mut state);
    }

    pub fn set_order_amount(&self, transaction_ref: &str, amount: BigDecimal) {
        self.update(|s| {
            s.order_amounts.insert(transaction_ref.to_string(), amount);
        });
    }

    pub fn set_applied_rate(
        &self,
        school_id: &str,
        platform_type: &str,
        payment_mode: &str,
        tier: RangeCharge,
    ) {
        let key = rate_key(school_id, platform_type, payment_mode);
        self.update(|s| {
            s.applied_rates.insert(key, tier);
        });
    }

    pub fn set_settled_count(&self, price_key: &str, date: NaiveDate, count: u64) {
        self.update(|s| {
            s.settled_counts.insert((price_key.to_string(), date), count);
        });
    }

    pub fn fail_for(&self, key: &str) {
        self.update(|s| {
            s.unavailable.insert(key.to_string());
        });
    }

    fn check_available(&self, key: &str) -> FeeResult<()> {
        if self.state.read().map_err(poisoned)?.unavailable.contains(key) {
            return Err(FeeError::Unavailable(format!("backend refused {key}")));
        }
        Ok(())
    }
}

fn rate_key(school_id: &str, platform_type: &str, payment_mode: &str) -> (String, String, String) {
    (
        school_id.to_string(),
        platform_type.to_ascii_lowercase(),
        payment_mode.to_ascii_lowercase(),
    )
}

#[async_trait]
impl PaymentStatusSource for MemoryPaymentsBackend {
    async fn get_order_amount(&self, transaction_ref: &str) -> FeeResult<Option<BigDecimal>> {
        self.check_available(transaction_ref)?;
        Ok(self
            .state
            .read()
            .map_err(poisoned)?
            .order_amounts
            .get(transaction_ref)
            .cloned())
    }
}

#[async_trait]
impl AppliedRateSource for MemoryPaymentsBackend {
    async fn get_applied_rate(
        &self,
        school_id: &str,
        payment_mode: &str,
        platform_type: &str,
        _amount: &BigDecimal,
    ) -> FeeResult<Option<RangeCharge>> {
        self.check_available(school_id)?;
        let key = rate_key(school_id, platform_type, payment_mode);
        Ok(self
            .state
            .read()
            .map_err(poisoned)?
            .applied_rates
            .get(&key)
            .cloned())
    }
}

#[async_trait]
impl SettlementExistenceSource for MemoryPaymentsBackend {
    async fn count_transactions(&self, price_key: &str, date: NaiveDate) -> FeeResult<u64> {
        self.check_available(price_key)?;
        Ok(self
            .state
            .read()
            .map_err(poisoned)?
            .settled_counts
            .get(&(price_key.to_string(), date))
            .copied()
            .unwrap_or(0))
    }
}

#[derive(Debug, Default)]
struct FeedState {
    totals: HashMap<String, BigDecimal>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
}

/// In-memory aggregate feed; usable as either side of a reconciliation
///
/// Totals are keyed by school only and returned for any window.
#[derive(Debug, Clone, Default)]
pub struct MemoryAggregateFeed {
    state: Arc<RwLock<FeedState>>,
}

impl MemoryAggregateFeed {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, f: impl FnOnce(&mut FeedState)) {
        let mut state = self.state.write().unwrap_or_else(|p| p.into_inner());
        f(&mut state);
    }

    pub fn set_total(&self, school_id: &str, total: BigDecimal) {
        self.update(|s| {
            s.totals.insert(school_id.to_string(), total);
        });
    }

    pub fn fail_for(&self, school_id: &str) {
        self.update(|s| {
            s.failing.insert(school_id.to_string());
        });
    }

    /// Make calls for a school take `delay` before answering
    pub fn delay_for(&self, school_id: &str, delay: Duration) {
        self.update(|s| {
            s.delays.insert(school_id.to_string(), delay);
        });
    }

    async fn total(&self, school_id: &str) -> FeeResult<Option<BigDecimal>> {
        let delay = {
            let state = self.state.read().map_err(poisoned)?;
            if state.failing.contains(school_id) {
                return Err(FeeError::Unavailable(format!(
                    "feed refused school {school_id}"
                )));
            }
            state.delays.get(school_id).copied()
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        Ok(self
            .state
            .read()
            .map_err(poisoned)?
            .totals
            .get(school_id)
            .cloned())
    }
}

#[async_trait]
impl TransactionAggregateSource for MemoryAggregateFeed {
    async fn get_total(
        &self,
        school_id: &str,
        _window: &DateWindow,
    ) -> FeeResult<Option<BigDecimal>> {
        self.total(school_id).await
    }
}

#[async_trait]
impl SettlementAggregateSource for MemoryAggregateFeed {
    async fn get_total(
        &self,
        school_id: &str,
        _window: &DateWindow,
    ) -> FeeResult<Option<BigDecimal>> {
        self.total(school_id).await
    }
}

/// Alert sink that keeps every alert it receives
#[derive(Debug, Clone, Default)]
pub struct MemoryAlertSink {
    sent: Arc<Mutex<Vec<Alert>>>,
}

impl MemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alerts received so far
    pub fn sent(&self) -> Vec<Alert> {
        self.sent
            .lock()
            .map(|alerts| alerts.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AlertSink for MemoryAlertSink {
    async fn send(&self, alert: Alert) -> FeeResult<()> {
        self.sent.lock().map_err(poisoned)?.push(alert);
        Ok(())
    }
}
