//! Structured reconciliation output and the alerts built from it

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::reconciliation::duplicates::DuplicateGroup;
use crate::types::*;

/// Which side of a comparison had no data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSide {
    /// Platform transaction feed returned nothing
    Local,
    /// Gateway settlement feed returned nothing
    Remote,
    Both,
}

/// Comparison of one school's totals for one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationRecord {
    pub school_id: String,
    pub trustee_id: String,
    pub window: DateWindow,
    /// Zero when the local side is missing
    pub local_total_order_amount: BigDecimal,
    /// Zero when the remote side is missing
    pub remote_total_order_amount: BigDecimal,
    pub mismatched: bool,
    /// Local minus remote; zero unless both sides reported
    pub diff: BigDecimal,
    pub missing: Option<MissingSide>,
}

impl ReconciliationRecord {
    /// Compare two optional totals; only two present totals can mismatch
    pub fn compare(
        school: &SchoolRef,
        window: DateWindow,
        local: Option<BigDecimal>,
        remote: Option<BigDecimal>,
        tolerance: &BigDecimal,
    ) -> Self {
        let zero = BigDecimal::from(0);

        let (local_total, remote_total, diff, mismatched, missing) = match (local, remote) {
            (Some(local), Some(remote)) => {
                let diff = &local - &remote;
                let mismatched = diff.abs() > *tolerance;
                (local, remote, diff, mismatched, None)
            }
            (Some(local), None) => (local, zero.clone(), zero, false, Some(MissingSide::Remote)),
            (None, Some(remote)) => (zero.clone(), remote, zero, false, Some(MissingSide::Local)),
            (None, None) => (zero.clone(), zero.clone(), zero, false, Some(MissingSide::Both)),
        };

        Self {
            school_id: school.school_id.clone(),
            trustee_id: school.trustee_id.clone(),
            window,
            local_total_order_amount: local_total,
            remote_total_order_amount: remote_total,
            mismatched,
            diff,
            missing,
        }
    }
}

/// Outcome of one reconciliation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub run_id: Uuid,
    pub generated_at: NaiveDateTime,
    pub window: DateWindow,
    /// One record per school that could be compared, in input order
    pub records: Vec<ReconciliationRecord>,
    /// Schools whose fetch failed or timed out, or whose id was invalid
    pub skipped: Vec<String>,
    /// Whether the run was cut short by its caller
    pub cancelled: bool,
}

impl ReconciliationReport {
    pub fn mismatched(&self) -> impl Iterator<Item = &ReconciliationRecord> {
        self.records.iter().filter(|r| r.mismatched)
    }

    pub fn missing(&self) -> impl Iterator<Item = &ReconciliationRecord> {
        self.records.iter().filter(|r| r.missing.is_some())
    }

    pub fn has_mismatches(&self) -> bool {
        self.records.iter().any(|r| r.mismatched)
    }

    /// Sum of absolute differences over mismatched schools
    pub fn total_discrepancy(&self) -> BigDecimal {
        self.mismatched().map(|r| r.diff.abs()).sum()
    }
}

/// A live school with no settled transaction on a date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementGap {
    pub school: SchoolRef,
    pub school_name: String,
    pub price_key: String,
    pub date: NaiveDate,
}

/// Schools not settled on a date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementGapReport {
    pub run_id: Uuid,
    pub date: NaiveDate,
    pub gaps: Vec<SettlementGap>,
    /// Schools whose existence check failed or whose id was invalid
    pub skipped: Vec<String>,
}

/// Duplicate onboarding records, one list per key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuplicateReport {
    pub by_email: Vec<DuplicateGroup<SchoolRecord>>,
    pub by_client_id: Vec<DuplicateGroup<SchoolRecord>>,
    pub by_price_key: Vec<DuplicateGroup<SchoolRecord>>,
}

impl DuplicateReport {
    pub fn is_empty(&self) -> bool {
        self.by_email.is_empty() && self.by_client_id.is_empty() && self.by_price_key.is_empty()
    }
}

/// Payload handed to an [`AlertSink`](crate::traits::AlertSink)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "report", rename_all = "snake_case")]
pub enum Alert {
    Mismatches(ReconciliationReport),
    SettlementGaps(SettlementGapReport),
    Duplicates(DuplicateReport),
}
