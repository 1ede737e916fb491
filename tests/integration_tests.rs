//! Integration tests for commission-core

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use commission_core::{
    utils::{MemoryAggregateFeed, MemoryAlertSink, MemoryPaymentsBackend, MemoryRateSheetStore},
    Alert, CatalogManager, ChargeCatalog, ChargeType, CommissionCascade, CommissionRequest,
    DateWindow, DuplicateDetector, EngineConfig, FeeError, OwnerKey, PlatformCharge, RangeCharge,
    RangeTable, RateLayer, RateSheetStore, ReconciliationEngine, SchoolRecord, SchoolRef,
    OTHERS_MODE,
};
use std::str::FromStr;
use std::sync::Arc;

fn dec(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).unwrap()
}

fn tiers(bands: &[(Option<&str>, ChargeType, &str)]) -> Vec<RangeCharge> {
    bands
        .iter()
        .map(|(upto, charge_type, charge)| RangeCharge {
            upto: upto.map(dec),
            charge_type: *charge_type,
            charge: dec(charge),
        })
        .collect()
}

async fn seeded_store() -> MemoryRateSheetStore {
    let store = MemoryRateSheetStore::new();
    let mut manager = CatalogManager::new(store.clone());

    let gateway = OwnerKey::Gateway("edviron-pg".to_string());
    manager.ensure_defaults(&gateway).await.unwrap();
    manager
        .update_charge(
            &gateway,
            PlatformCharge::new(
                "NetBanking",
                OTHERS_MODE,
                tiers(&[
                    (Some("2000"), ChargeType::Flat, "5"),
                    (None, ChargeType::Percent, "0.5"),
                ]),
            ),
        )
        .await
        .unwrap();

    let trustee = OwnerKey::TrusteeBase("trustee-1".to_string());
    manager
        .add_charge(
            &trustee,
            PlatformCharge::new(
                "NetBanking",
                OTHERS_MODE,
                tiers(&[
                    (Some("2000"), ChargeType::Flat, "8"),
                    (None, ChargeType::Percent, "0.8"),
                ]),
            ),
        )
        .await
        .unwrap();

    let school_final = OwnerKey::SchoolFinal("school-1".to_string());
    manager
        .add_charge(
            &school_final,
            PlatformCharge::new(
                "NetBanking",
                OTHERS_MODE,
                tiers(&[
                    (Some("2000"), ChargeType::Flat, "12"),
                    (None, ChargeType::Percent, "1.2"),
                ]),
            ),
        )
        .await
        .unwrap();

    store
}

#[tokio::test]
async fn test_complete_commission_workflow() {
    let store = seeded_store().await;
    let backend = MemoryPaymentsBackend::new();
    backend.set_order_amount("order-small", dec("1500"));
    backend.set_order_amount("order-large", dec("10000"));
    backend.set_applied_rate(
        "school-1",
        "NetBanking",
        "HDFC",
        RangeCharge::catch_all(ChargeType::Percent, dec("1")),
    );

    let cascade = CommissionCascade::new(
        store,
        Arc::new(backend.clone()),
        Arc::new(backend.clone()),
        &EngineConfig::default(),
    )
    .unwrap();
    let school = SchoolRef::new("school-1", "trustee-1");

    // Small order lands in the flat tier, live rate is percent
    let small = cascade
        .compute(&school, "order-small", "HDFC", "NetBanking")
        .await
        .unwrap();
    assert_eq!(small.mdr_amount.gateway_buying, dec("5"));
    assert_eq!(small.mdr_amount.school_base, dec("8"));
    assert_eq!(small.mdr_amount.school_final, dec("12"));
    assert_eq!(small.mdr_amount.pg_final, dec("15"));
    assert_eq!(small.commission_without_gst.erp_commission, dec("4"));
    assert_eq!(small.commission_without_gst.edviron_earning_base, dec("3"));
    assert_eq!(small.commission_without_gst.edviron_earning_school, dec("-3"));
    assert_eq!(small.commission_without_gst.total_commission, dec("4"));

    // Large order lands in the percent tiers
    let large = cascade
        .compute(&school, "order-large", "HDFC", "NetBanking")
        .await
        .unwrap();
    assert_eq!(large.mdr_amount.gateway_buying, dec("50"));
    assert_eq!(large.mdr_amount.school_base, dec("80"));
    assert_eq!(large.mdr_amount.school_final, dec("120"));
    assert_eq!(large.mdr_amount.pg_final, dec("100"));
    assert_eq!(large.commission_without_gst.erp_commission, dec("40"));
    assert_eq!(large.commission_without_gst.edviron_earning, dec("50"));
    assert_eq!(large.commission_without_gst.total_commission, dec("90"));
    assert_eq!(large.commission_gst_amount.total_commission, dec("16.2"));
    assert_eq!(large.commission_with_gst.total_commission, dec("106.2"));
    assert!(large.commission_without_gst.is_consistent());
}

#[tokio::test]
async fn test_batch_isolates_failures() {
    let store = seeded_store().await;
    let backend = MemoryPaymentsBackend::new();
    backend.set_order_amount("order-1", dec("1000"));
    backend.set_order_amount("order-3", dec("3000"));

    let cascade = CommissionCascade::new(
        store,
        Arc::new(backend.clone()),
        Arc::new(backend.clone()),
        &EngineConfig::default(),
    )
    .unwrap();
    let school = SchoolRef::new("school-1", "trustee-1");

    let requests = vec![
        CommissionRequest::new(school.clone(), "order-1", "SBI", "NetBanking"),
        CommissionRequest::new(school.clone(), "order-2", "SBI", "NetBanking"),
        CommissionRequest::new(school.clone(), "order-3", "SBI", "NetBanking"),
    ];

    let results = cascade.compute_batch(&requests).await;

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(FeeError::AmountUnavailable(_))));
    assert_eq!(results[2].as_ref().unwrap().order_amount, dec("3000"));
}

#[tokio::test]
async fn test_missing_school_final_sheet_names_that_layer() {
    let store = seeded_store().await;
    let backend = MemoryPaymentsBackend::new();
    backend.set_order_amount("order-1", dec("1000"));
    // Live rate known, so only the school's final sheet is missing
    backend.set_applied_rate(
        "school-2",
        "NetBanking",
        "SBI",
        RangeCharge::catch_all(ChargeType::Flat, dec("10")),
    );

    let cascade = CommissionCascade::new(
        store,
        Arc::new(backend.clone()),
        Arc::new(backend.clone()),
        &EngineConfig::default(),
    )
    .unwrap();

    let err = cascade
        .compute(
            &SchoolRef::new("school-2", "trustee-1"),
            "order-1",
            "SBI",
            "NetBanking",
        )
        .await
        .unwrap_err();

    assert_eq!(err.layer(), Some(RateLayer::SchoolFinal));
    assert!(err.to_string().starts_with("school final rate not found"));
}

#[tokio::test]
async fn test_missing_trustee_sheet_names_base_layer() {
    let store = seeded_store().await;
    let backend = MemoryPaymentsBackend::new();
    backend.set_order_amount("order-1", dec("1000"));

    let cascade = CommissionCascade::new(
        store,
        Arc::new(backend.clone()),
        Arc::new(backend.clone()),
        &EngineConfig::default(),
    )
    .unwrap();

    // School final sheet exists, neither school base nor trustee base does
    let err = cascade
        .compute(
            &SchoolRef::new("school-1", "trustee-unknown"),
            "order-1",
            "SBI",
            "NetBanking",
        )
        .await
        .unwrap_err();

    assert_eq!(err.layer(), Some(RateLayer::SchoolBase));
}

#[tokio::test]
async fn test_catalog_fallback_and_uniqueness() {
    let mut catalog = ChargeCatalog::new();
    catalog
        .add(PlatformCharge::zero_rated("UPI", OTHERS_MODE))
        .unwrap();

    let table = catalog.lookup("UPI", "Corporate").unwrap();
    assert_eq!(table.resolve(&dec("2500")).unwrap(), dec("0"));
    assert!(matches!(
        catalog.lookup("NetBanking", "Corporate"),
        Err(FeeError::NoChargeConfigured { .. })
    ));

    assert!(matches!(
        catalog.add(PlatformCharge::zero_rated("UPI", OTHERS_MODE)),
        Err(FeeError::DuplicateChargeKey { .. })
    ));
    catalog.delete("UPI", OTHERS_MODE).unwrap();
    assert!(catalog
        .add(PlatformCharge::zero_rated("UPI", OTHERS_MODE))
        .is_ok());
}

#[tokio::test]
async fn test_catalog_survives_storage_round_trip() {
    let mut store = MemoryRateSheetStore::new();
    let owner = OwnerKey::SchoolFinal("school-7".to_string());
    store
        .put(&owner, ChargeCatalog::with_default_platforms())
        .await
        .unwrap();

    let loaded = store.get(&owner).await.unwrap().unwrap();
    let json = serde_json::to_string(&loaded).unwrap();
    let decoded: ChargeCatalog = serde_json::from_str(&json).unwrap();

    assert_eq!(decoded, loaded);
    assert!(decoded.lookup("CORPORATE CARDS", "Visa").is_ok());
}

#[test]
fn test_tier_order_is_respected() {
    let shadowed = RangeTable::new(tiers(&[
        (None, ChargeType::Flat, "9"),
        (Some("1000"), ChargeType::Flat, "1"),
    ]));
    assert_eq!(shadowed.resolve(&dec("10")).unwrap(), dec("9"));

    let ordered = RangeTable::new(tiers(&[
        (Some("1000"), ChargeType::Flat, "1"),
        (None, ChargeType::Flat, "9"),
    ]));
    assert_eq!(ordered.resolve(&dec("1000")).unwrap(), dec("1"));
    assert_eq!(ordered.resolve(&dec("1000.01")).unwrap(), dec("9"));
}

#[tokio::test]
async fn test_reconciliation_and_alerts() {
    let local = MemoryAggregateFeed::new();
    let remote = MemoryAggregateFeed::new();
    let backend = MemoryPaymentsBackend::new();
    let alerts = MemoryAlertSink::new();

    local.set_total("x", dec("100"));
    remote.fail_for("x");
    local.set_total("y", dec("250.50"));
    remote.set_total("y", dec("250.5"));
    local.set_total("z", dec("300"));
    remote.set_total("z", dec("310"));

    let engine = ReconciliationEngine::new(
        Arc::new(local),
        Arc::new(remote),
        Arc::new(backend),
        Arc::new(alerts.clone()),
        &EngineConfig::default(),
    )
    .unwrap();

    let window = DateWindow::new(
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
    )
    .unwrap();
    let schools = vec![
        SchoolRef::new("x", "t"),
        SchoolRef::new("y", "t"),
        SchoolRef::new("z", "t"),
    ];

    let report = engine.reconcile(&schools, window).await.unwrap();

    assert_eq!(report.skipped, vec!["x".to_string()]);
    assert_eq!(report.records.len(), 2);
    assert!(!report.records[0].mismatched);
    assert!(report.records[1].mismatched);
    assert_eq!(report.total_discrepancy(), dec("10"));

    assert!(engine.notify_mismatches(&report).await.unwrap());
    match alerts.sent().as_slice() {
        [Alert::Mismatches(sent)] => assert_eq!(sent.run_id, report.run_id),
        other => panic!("unexpected alerts: {:?}", other),
    }
}

#[tokio::test]
async fn test_duplicate_scan_and_alert() {
    let records = vec![
        SchoolRecord::new(SchoolRef::new("s1", "t"), "One").with_email("a"),
        SchoolRecord::new(SchoolRef::new("s2", "t"), "Two").with_email("a"),
        SchoolRecord::new(SchoolRef::new("s3", "t"), "Three").with_email("b"),
        SchoolRecord::new(SchoolRef::new("s4", "t"), "Four"),
    ];

    let report = DuplicateDetector::scan(&records);
    assert_eq!(report.by_email.len(), 1);
    assert_eq!(report.by_email[0].key_value, "a");
    assert_eq!(report.by_email[0].count, 2);

    let alerts = MemoryAlertSink::new();
    let engine = ReconciliationEngine::new(
        Arc::new(MemoryAggregateFeed::new()),
        Arc::new(MemoryAggregateFeed::new()),
        Arc::new(MemoryPaymentsBackend::new()),
        Arc::new(alerts.clone()),
        &EngineConfig::default(),
    )
    .unwrap();

    assert!(engine.notify_duplicates(&report).await.unwrap());
    assert!(!engine
        .notify_duplicates(&DuplicateDetector::scan(&records[2..]))
        .await
        .unwrap());
    assert_eq!(alerts.sent().len(), 1);
}
