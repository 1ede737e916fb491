//! Four-layer commission cascade for a single transaction

use bigdecimal::BigDecimal;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::tax::gst::GstCalculator;
use crate::traits::*;
use crate::types::*;
use crate::utils::with_deadline;

/// One value per pricing layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerValues<T> {
    pub gateway_buying: T,
    pub school_base: T,
    pub school_final: T,
    pub pg_final: T,
}

/// Where a resolved rate came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    /// A stored rate sheet
    Sheet(OwnerKey),
    /// The live payments backend
    PaymentsBackend,
}

/// Tier picked for an amount, with the fee it yields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRate {
    pub source: RateSource,
    pub tier: RangeCharge,
    pub fee: BigDecimal,
}

/// Input of a commission computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionRequest {
    pub school: SchoolRef,
    pub transaction_ref: String,
    pub payment_mode: String,
    pub platform_type: String,
}

impl CommissionRequest {
    pub fn new(
        school: SchoolRef,
        transaction_ref: impl Into<String>,
        payment_mode: impl Into<String>,
        platform_type: impl Into<String>,
    ) -> Self {
        Self {
            school,
            transaction_ref: transaction_ref.into(),
            payment_mode: payment_mode.into(),
            platform_type: platform_type.into(),
        }
    }
}

/// Earnings of every party on one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionResult {
    pub transaction_ref: String,
    pub order_amount: BigDecimal,
    /// Tier selected at each layer
    pub mdr: LayerValues<RangeCharge>,
    /// Fee charged at each layer
    pub mdr_amount: LayerValues<BigDecimal>,
    pub sources: LayerValues<RateSource>,
    pub commission_without_gst: CommissionFigures,
    pub commission_with_gst: CommissionFigures,
    pub commission_gst_amount: CommissionFigures,
}

/// Derive the earning waterfall from the four layer fees
pub fn derive_figures(mdr_amount: &LayerValues<BigDecimal>) -> CommissionFigures {
    let erp_commission = &mdr_amount.school_final - &mdr_amount.school_base;
    let edviron_earning_base = &mdr_amount.school_base - &mdr_amount.gateway_buying;
    let edviron_earning_school = &mdr_amount.school_final - &mdr_amount.pg_final;
    let edviron_earning = &edviron_earning_base + &edviron_earning_school;
    let total_commission = &erp_commission + &edviron_earning;

    CommissionFigures {
        erp_commission,
        edviron_earning_base,
        edviron_earning_school,
        edviron_earning,
        total_commission,
    }
}

/// Computes commissions from the gateway, trustee and school rate sheets
pub struct CommissionCascade<S: RateSheetStore> {
    storage: S,
    payments: Arc<dyn PaymentStatusSource>,
    applied_rates: Arc<dyn AppliedRateSource>,
    gateway: OwnerKey,
    gst: GstCalculator,
    call_timeout: Duration,
    max_concurrency: usize,
}

impl<S: RateSheetStore> CommissionCascade<S> {
    /// Create a new cascade over the given rate sheets and data sources
    pub fn new(
        storage: S,
        payments: Arc<dyn PaymentStatusSource>,
        applied_rates: Arc<dyn AppliedRateSource>,
        config: &EngineConfig,
    ) -> FeeResult<Self> {
        config.validate()?;

        Ok(Self {
            storage,
            payments,
            applied_rates,
            gateway: OwnerKey::Gateway(config.gateway_owner_id.clone()),
            gst: GstCalculator::new(config.gst_rate.clone())?,
            call_timeout: config.call_timeout,
            max_concurrency: config.max_concurrency,
        })
    }

    /// Resolve a rate from the first owner in `chain` that prices the key
    ///
    /// An owner with no sheet, or whose sheet has neither the exact key nor an
    /// `Others` entry for the platform, passes resolution to the next owner.
    pub async fn resolve_for_owners(
        &self,
        chain: &[OwnerKey],
        platform_type: &str,
        payment_mode: &str,
        amount: &BigDecimal,
    ) -> FeeResult<ResolvedRate> {
        let mut last_miss = None;

        for owner in chain {
            let catalog = match self.storage.get(owner).await? {
                Some(catalog) => catalog,
                None => {
                    debug!(%owner, "no rate sheet, trying next owner");
                    continue;
                }
            };

            match catalog.lookup(platform_type, payment_mode) {
                Ok(table) => {
                    let tier = table.select(amount)?.clone();
                    let fee = tier.fee_for(amount);
                    return Ok(ResolvedRate {
                        source: RateSource::Sheet(owner.clone()),
                        tier,
                        fee,
                    });
                }
                Err(miss @ FeeError::NoChargeConfigured { .. }) => {
                    debug!(%owner, platform_type, payment_mode, "no charge, trying next owner");
                    last_miss = Some(miss);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_miss.unwrap_or_else(|| FeeError::NoChargeConfigured {
            platform_type: platform_type.to_string(),
            payment_mode: payment_mode.to_string(),
        }))
    }

    /// Rate the payments backend applied, or the school's final sheet when it has no answer
    async fn resolve_applied(
        &self,
        school: &SchoolRef,
        platform_type: &str,
        payment_mode: &str,
        amount: &BigDecimal,
    ) -> FeeResult<ResolvedRate> {
        let live = with_deadline(
            self.call_timeout,
            self.applied_rates
                .get_applied_rate(&school.school_id, payment_mode, platform_type, amount),
        )
        .await;

        match live {
            Ok(Some(tier)) => {
                let fee = tier.fee_for(amount);
                Ok(ResolvedRate {
                    source: RateSource::PaymentsBackend,
                    tier,
                    fee,
                })
            }
            Ok(None) => {
                debug!(school_id = %school.school_id, "no applied rate, using school final sheet");
                self.resolve_school_final(school, platform_type, payment_mode, amount)
                    .await
            }
            Err(e) => {
                warn!(
                    school_id = %school.school_id,
                    error = %e,
                    "applied rate lookup failed, using school final sheet"
                );
                self.resolve_school_final(school, platform_type, payment_mode, amount)
                    .await
            }
        }
    }

    async fn resolve_school_final(
        &self,
        school: &SchoolRef,
        platform_type: &str,
        payment_mode: &str,
        amount: &BigDecimal,
    ) -> FeeResult<ResolvedRate> {
        let chain = [OwnerKey::SchoolFinal(school.school_id.clone())];
        self.resolve_for_owners(&chain, platform_type, payment_mode, amount)
            .await
    }

    /// Compute the commission waterfall of one transaction
    ///
    /// Any missing amount or rate aborts the computation; the error names the
    /// layer that failed.
    pub async fn compute(
        &self,
        school: &SchoolRef,
        transaction_ref: &str,
        payment_mode: &str,
        platform_type: &str,
    ) -> FeeResult<CommissionResult> {
        let order_amount = with_deadline(
            self.call_timeout,
            self.payments.get_order_amount(transaction_ref),
        )
        .await?
        .ok_or_else(|| FeeError::AmountUnavailable(transaction_ref.to_string()))?;

        let gateway_chain = [self.gateway.clone()];
        let base_chain = [
            OwnerKey::SchoolBase(school.school_id.clone()),
            OwnerKey::TrusteeBase(school.trustee_id.clone()),
        ];

        let (gateway_buying, school_base, school_final, pg_final) = futures::try_join!(
            async {
                self.resolve_for_owners(&gateway_chain, platform_type, payment_mode, &order_amount)
                    .await
                    .map_err(|e| e.in_layer(RateLayer::GatewayBuying))
            },
            async {
                self.resolve_for_owners(&base_chain, platform_type, payment_mode, &order_amount)
                    .await
                    .map_err(|e| e.in_layer(RateLayer::SchoolBase))
            },
            async {
                self.resolve_school_final(school, platform_type, payment_mode, &order_amount)
                    .await
                    .map_err(|e| e.in_layer(RateLayer::SchoolFinal))
            },
            async {
                self.resolve_applied(school, platform_type, payment_mode, &order_amount)
                    .await
                    .map_err(|e| e.in_layer(RateLayer::PgFinal))
            },
        )?;

        let mdr_amount = LayerValues {
            gateway_buying: gateway_buying.fee,
            school_base: school_base.fee,
            school_final: school_final.fee,
            pg_final: pg_final.fee,
        };
        let commission_without_gst = derive_figures(&mdr_amount);
        let gst = self.gst.apply(&commission_without_gst);

        debug!(
            transaction_ref,
            %order_amount,
            total_commission = %commission_without_gst.total_commission,
            "commission computed"
        );

        Ok(CommissionResult {
            transaction_ref: transaction_ref.to_string(),
            order_amount,
            mdr: LayerValues {
                gateway_buying: gateway_buying.tier,
                school_base: school_base.tier,
                school_final: school_final.tier,
                pg_final: pg_final.tier,
            },
            mdr_amount,
            sources: LayerValues {
                gateway_buying: gateway_buying.source,
                school_base: school_base.source,
                school_final: school_final.source,
                pg_final: pg_final.source,
            },
            commission_without_gst,
            commission_with_gst: gst.with_gst,
            commission_gst_amount: gst.gst_amounts,
        })
    }

    /// Compute many transactions concurrently
    ///
    /// Returns one result per request, in request order. A failed request
    /// does not affect the others.
    pub async fn compute_batch(
        &self,
        requests: &[CommissionRequest],
    ) -> Vec<FeeResult<CommissionResult>> {
        info!(count = requests.len(), "computing commission batch");

        stream::iter(requests)
            .map(|request| {
                self.compute(
                    &request.school,
                    &request.transaction_ref,
                    &request.payment_mode,
                    &request.platform_type,
                )
            })
            .buffered(self.max_concurrency)
            .collect::<Vec<_>>()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::ChargeCatalog;
    use crate::utils::memory_storage::{MemoryPaymentsBackend, MemoryRateSheetStore};
    use std::str::FromStr;

    fn dec(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    fn flat(upto: Option<&str>, charge: &str) -> RangeCharge {
        RangeCharge {
            upto: upto.map(dec),
            charge_type: ChargeType::Flat,
            charge: dec(charge),
        }
    }

    fn sheet(platform: &str, mode: &str, tiers: Vec<RangeCharge>) -> ChargeCatalog {
        ChargeCatalog::from_entries(vec![PlatformCharge::new(platform, mode, tiers)]).unwrap()
    }

    async fn fixture() -> (MemoryRateSheetStore, MemoryPaymentsBackend, SchoolRef) {
        let mut store = MemoryRateSheetStore::new();
        let school = SchoolRef::new("school-1", "trustee-1");

        store
            .put(
                &OwnerKey::Gateway("edviron-pg".to_string()),
                sheet("UPI", OTHERS_MODE, vec![flat(Some("2000"), "2"), flat(None, "5")]),
            )
            .await
            .unwrap();
        store
            .put(
                &OwnerKey::TrusteeBase("trustee-1".to_string()),
                sheet("UPI", OTHERS_MODE, vec![flat(Some("2000"), "4"), flat(None, "8")]),
            )
            .await
            .unwrap();
        store
            .put(
                &OwnerKey::SchoolFinal("school-1".to_string()),
                sheet("UPI", OTHERS_MODE, vec![flat(Some("2000"), "10"), flat(None, "15")]),
            )
            .await
            .unwrap();

        let backend = MemoryPaymentsBackend::new();
        backend.set_order_amount("txn-1", dec("2500"));

        (store, backend, school)
    }

    fn cascade(
        store: MemoryRateSheetStore,
        backend: &MemoryPaymentsBackend,
    ) -> CommissionCascade<MemoryRateSheetStore> {
        CommissionCascade::new(
            store,
            Arc::new(backend.clone()),
            Arc::new(backend.clone()),
            &EngineConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_derive_figures() {
        let figures = derive_figures(&LayerValues {
            gateway_buying: dec("5"),
            school_base: dec("8"),
            school_final: dec("15"),
            pg_final: dec("12"),
        });

        assert_eq!(figures.erp_commission, dec("7"));
        assert_eq!(figures.edviron_earning_base, dec("3"));
        assert_eq!(figures.edviron_earning_school, dec("3"));
        assert_eq!(figures.edviron_earning, dec("6"));
        assert_eq!(figures.total_commission, dec("13"));
        assert!(figures.is_consistent());
    }

    #[tokio::test]
    async fn test_compute_with_applied_rate() {
        let (store, backend, school) = fixture().await;
        backend.set_applied_rate("school-1", "UPI", "Corporate", flat(None, "12"));
        let cascade = cascade(store, &backend);

        let result = cascade
            .compute(&school, "txn-1", "Corporate", "UPI")
            .await
            .unwrap();

        assert_eq!(result.order_amount, dec("2500"));
        assert_eq!(result.mdr_amount.gateway_buying, dec("5"));
        assert_eq!(result.mdr_amount.school_base, dec("8"));
        assert_eq!(result.mdr_amount.school_final, dec("15"));
        assert_eq!(result.mdr_amount.pg_final, dec("12"));
        assert_eq!(result.sources.pg_final, RateSource::PaymentsBackend);
        assert_eq!(result.commission_without_gst.total_commission, dec("13"));
        assert_eq!(result.commission_gst_amount.total_commission, dec("2.34"));
        assert_eq!(result.commission_with_gst.total_commission, dec("15.34"));
    }

    #[tokio::test]
    async fn test_applied_rate_falls_back_to_school_final() {
        let (store, backend, school) = fixture().await;
        let cascade = cascade(store, &backend);

        let result = cascade
            .compute(&school, "txn-1", "Corporate", "UPI")
            .await
            .unwrap();

        assert_eq!(result.mdr_amount.pg_final, dec("15"));
        assert_eq!(
            result.sources.pg_final,
            RateSource::Sheet(OwnerKey::SchoolFinal("school-1".to_string()))
        );
        assert_eq!(result.commission_without_gst.edviron_earning_school, dec("0"));
    }

    #[tokio::test]
    async fn test_school_base_override_wins_over_trustee() {
        let (mut store, backend, school) = fixture().await;
        store
            .put(
                &OwnerKey::SchoolBase("school-1".to_string()),
                sheet("UPI", OTHERS_MODE, vec![flat(None, "6")]),
            )
            .await
            .unwrap();
        let cascade = cascade(store, &backend);

        let result = cascade
            .compute(&school, "txn-1", "Corporate", "UPI")
            .await
            .unwrap();

        assert_eq!(result.mdr_amount.school_base, dec("6"));
    }

    #[tokio::test]
    async fn test_school_base_override_without_platform_falls_to_trustee() {
        let (mut store, backend, school) = fixture().await;
        store
            .put(
                &OwnerKey::SchoolBase("school-1".to_string()),
                sheet("NetBanking", OTHERS_MODE, vec![flat(None, "6")]),
            )
            .await
            .unwrap();
        let cascade = cascade(store, &backend);

        let result = cascade
            .compute(&school, "txn-1", "Corporate", "UPI")
            .await
            .unwrap();

        assert_eq!(result.mdr_amount.school_base, dec("8"));
        assert_eq!(
            result.sources.school_base,
            RateSource::Sheet(OwnerKey::TrusteeBase("trustee-1".to_string()))
        );
    }

    #[tokio::test]
    async fn test_missing_layer_is_named() {
        let (store, backend, _) = fixture().await;
        let cascade = cascade(store, &backend);
        let orphan = SchoolRef::new("school-1", "trustee-without-sheet");

        let err = cascade
            .compute(&orphan, "txn-1", "Corporate", "UPI")
            .await
            .unwrap_err();

        assert_eq!(err.layer(), Some(RateLayer::SchoolBase));
    }

    #[tokio::test]
    async fn test_missing_amount_aborts() {
        let (store, backend, school) = fixture().await;
        let cascade = cascade(store, &backend);

        let err = cascade
            .compute(&school, "unknown-txn", "Corporate", "UPI")
            .await
            .unwrap_err();

        assert!(matches!(err, FeeError::AmountUnavailable(_)));
    }

    #[tokio::test]
    async fn test_batch_keeps_order_and_isolates_failures() {
        let (store, backend, school) = fixture().await;
        backend.set_order_amount("txn-2", dec("1000"));
        let cascade = cascade(store, &backend);

        let results = cascade
            .compute_batch(&[
                CommissionRequest::new(school.clone(), "txn-1", "Corporate", "UPI"),
                CommissionRequest::new(school.clone(), "missing", "Corporate", "UPI"),
                CommissionRequest::new(school.clone(), "txn-2", "Corporate", "UPI"),
            ])
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().order_amount, dec("2500"));
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().mdr_amount.gateway_buying, dec("2"));
    }
}
