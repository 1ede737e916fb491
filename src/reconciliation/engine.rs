//! Cross-source reconciliation of per-school transaction totals

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use std::future::{self as std_future, Future};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::reconciliation::report::*;
use crate::traits::*;
use crate::types::*;
use crate::utils::{validate_identifier, validate_school_batch, with_deadline};

/// Compares the platform's transaction feed with the gateway's settlement feed
///
/// Every school is handled independently: a school whose fetch fails or
/// times out is logged and left out, the rest of the batch carries on.
pub struct ReconciliationEngine {
    transactions: Arc<dyn TransactionAggregateSource>,
    settlements: Arc<dyn SettlementAggregateSource>,
    existence: Arc<dyn SettlementExistenceSource>,
    alerts: Arc<dyn AlertSink>,
    call_timeout: Duration,
    max_concurrency: usize,
    tolerance: BigDecimal,
}

impl ReconciliationEngine {
    /// Create a new engine
    pub fn new(
        transactions: Arc<dyn TransactionAggregateSource>,
        settlements: Arc<dyn SettlementAggregateSource>,
        existence: Arc<dyn SettlementExistenceSource>,
        alerts: Arc<dyn AlertSink>,
        config: &EngineConfig,
    ) -> FeeResult<Self> {
        config.validate()?;

        Ok(Self {
            transactions,
            settlements,
            existence,
            alerts,
            call_timeout: config.call_timeout,
            max_concurrency: config.max_concurrency,
            tolerance: config.mismatch_tolerance.clone(),
        })
    }

    async fn reconcile_school(
        &self,
        school: &SchoolRef,
        window: &DateWindow,
    ) -> FeeResult<ReconciliationRecord> {
        validate_identifier(&school.school_id).map_err(|e| per_school(&school.school_id, e))?;

        let (local, remote) = futures::try_join!(
            with_deadline(
                self.call_timeout,
                self.transactions.get_total(&school.school_id, window),
            ),
            with_deadline(
                self.call_timeout,
                self.settlements.get_total(&school.school_id, window),
            ),
        )
        .map_err(|e| per_school(&school.school_id, e))?;

        Ok(ReconciliationRecord::compare(
            school,
            *window,
            local,
            remote,
            &self.tolerance,
        ))
    }

    /// Reconcile every school for `window`, returning the comparable records
    pub async fn reconcile_window(
        &self,
        schools: &[SchoolRef],
        window: DateWindow,
    ) -> FeeResult<Vec<ReconciliationRecord>> {
        Ok(self.reconcile(schools, window).await?.records)
    }

    /// Reconcile every school for `window`
    pub async fn reconcile(
        &self,
        schools: &[SchoolRef],
        window: DateWindow,
    ) -> FeeResult<ReconciliationReport> {
        self.reconcile_window_until(schools, window, std_future::pending())
            .await
    }

    /// Reconcile until done or until `cancel` resolves
    ///
    /// On cancellation in-flight calls are dropped and the records gathered so
    /// far are returned with `cancelled` set.
    pub async fn reconcile_window_until<C>(
        &self,
        schools: &[SchoolRef],
        window: DateWindow,
        cancel: C,
    ) -> FeeResult<ReconciliationReport>
    where
        C: Future<Output = ()>,
    {
        validate_school_batch(schools)?;

        let run_id = Uuid::new_v4();
        info!(%run_id, schools = schools.len(), %window, "reconciliation started");

        let mut pending = stream::iter(schools.iter().enumerate())
            .map(|(index, school)| async move {
                (index, school, self.reconcile_school(school, &window).await)
            })
            .buffer_unordered(self.max_concurrency);

        tokio::pin!(cancel);

        let mut records = Vec::with_capacity(schools.len());
        let mut skipped = Vec::new();
        let mut cancelled = false;

        loop {
            tokio::select! {
                next = pending.next() => match next {
                    Some((index, _, Ok(record))) => records.push((index, record)),
                    Some((_, school, Err(e))) => {
                        warn!(%run_id, error = %e, "school skipped");
                        skipped.push(school.school_id.clone());
                    }
                    None => break,
                },
                _ = &mut cancel => {
                    warn!(%run_id, gathered = records.len(), "reconciliation cancelled");
                    cancelled = true;
                    break;
                }
            }
        }

        records.sort_by_key(|(index, _)| *index);
        let report = ReconciliationReport {
            run_id,
            generated_at: chrono::Utc::now().naive_utc(),
            window,
            records: records.into_iter().map(|(_, record)| record).collect(),
            skipped,
            cancelled,
        };

        info!(
            %run_id,
            compared = report.records.len(),
            mismatched = report.mismatched().count(),
            missing = report.missing().count(),
            skipped = report.skipped.len(),
            "reconciliation finished"
        );

        Ok(report)
    }

    /// Live schools with no transaction settled on the day before `as_of`
    ///
    /// Schools without a price key are not live and are not checked.
    pub async fn find_daily_settlement_gaps(
        &self,
        records: &[SchoolRecord],
        as_of: NaiveDate,
    ) -> FeeResult<SettlementGapReport> {
        validate_school_batch(records)?;

        let date = as_of
            .pred_opt()
            .ok_or_else(|| FeeError::Validation(format!("No day before {as_of}")))?;
        let run_id = Uuid::new_v4();

        let live: Vec<(usize, &SchoolRecord, &str)> = records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                record
                    .price_key
                    .as_deref()
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .map(|key| (index, record, key))
            })
            .collect();

        info!(%run_id, %date, live = live.len(), "checking daily settlements");

        let mut outcomes: Vec<(usize, &SchoolRecord, &str, FeeResult<u64>)> =
            stream::iter(live)
                .map(|(index, record, key)| async move {
                    let school_id = &record.school.school_id;
                    let count = match validate_identifier(school_id) {
                        Ok(()) => {
                            with_deadline(
                                self.call_timeout,
                                self.existence.count_transactions(key, date),
                            )
                            .await
                        }
                        Err(e) => Err(e),
                    }
                    .map_err(|e| per_school(school_id, e));
                    (index, record, key, count)
                })
                .buffer_unordered(self.max_concurrency)
                .collect()
                .await;
        outcomes.sort_by_key(|(index, ..)| *index);

        let mut gaps = Vec::new();
        let mut skipped = Vec::new();

        for (_, record, key, count) in outcomes {
            match count {
                Ok(0) => gaps.push(SettlementGap {
                    school: record.school.clone(),
                    school_name: record.school_name.clone(),
                    price_key: key.to_string(),
                    date,
                }),
                Ok(_) => {}
                Err(e) => {
                    warn!(%run_id, error = %e, "settlement check skipped");
                    skipped.push(record.school.school_id.clone());
                }
            }
        }

        info!(%run_id, gaps = gaps.len(), skipped = skipped.len(), "daily settlement check finished");

        Ok(SettlementGapReport {
            run_id,
            date,
            gaps,
            skipped,
        })
    }

    /// Send the report to the alert sink if any school mismatched
    pub async fn notify_mismatches(&self, report: &ReconciliationReport) -> FeeResult<bool> {
        if !report.has_mismatches() {
            return Ok(false);
        }
        self.alerts.send(Alert::Mismatches(report.clone())).await?;
        Ok(true)
    }

    /// Send the report to the alert sink if any school is unsettled
    pub async fn notify_settlement_gaps(&self, report: &SettlementGapReport) -> FeeResult<bool> {
        if report.gaps.is_empty() {
            return Ok(false);
        }
        self.alerts.send(Alert::SettlementGaps(report.clone())).await?;
        Ok(true)
    }

    /// Send the report to the alert sink if it found any duplicate
    pub async fn notify_duplicates(&self, report: &DuplicateReport) -> FeeResult<bool> {
        if report.is_empty() {
            return Ok(false);
        }
        self.alerts.send(Alert::Duplicates(report.clone())).await?;
        Ok(true)
    }
}

fn per_school(school_id: &str, e: FeeError) -> FeeError {
    FeeError::PerSchoolFailure {
        school_id: school_id.to_string(),
        reason: e.to_string(),
    }
}
