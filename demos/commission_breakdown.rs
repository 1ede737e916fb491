//! Commission waterfall for a single school-fee payment

use bigdecimal::{BigDecimal, ParseBigDecimalError};
use commission_core::{
    telemetry, utils::MemoryPaymentsBackend, utils::MemoryRateSheetStore, CatalogManager,
    ChargeType, CommissionCascade, CommissionFigures, EngineConfig, GstCalculation, OwnerKey,
    PlatformCharge, RangeCharge, SchoolRef, OTHERS_MODE,
};
use std::sync::Arc;

fn upi_sheet(small: u32, large_percent: &str) -> Result<PlatformCharge, ParseBigDecimalError> {
    Ok(PlatformCharge::new(
        "UPI",
        OTHERS_MODE,
        vec![
            RangeCharge::upto(BigDecimal::from(2000), ChargeType::Flat, BigDecimal::from(small)),
            RangeCharge::catch_all(ChargeType::Percent, large_percent.parse()?),
        ],
    ))
}

fn print_figures(title: &str, figures: &CommissionFigures) {
    println!("{title}");
    println!("  ERP commission:          ₹{}", figures.erp_commission);
    println!("  Platform earning (base): ₹{}", figures.edviron_earning_base);
    println!("  Platform earning (pg):   ₹{}", figures.edviron_earning_school);
    println!("  Platform earning:        ₹{}", figures.edviron_earning);
    println!("  Total commission:        ₹{}", figures.total_commission);
    println!();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    telemetry::init_tracing("commission_core=info")?;

    let config = EngineConfig::from_env()?;
    let store = MemoryRateSheetStore::new();
    let mut manager = CatalogManager::new(store.clone());

    let gateway = OwnerKey::Gateway(config.gateway_owner_id.clone());
    manager.ensure_defaults(&gateway).await?;
    manager.update_charge(&gateway, upi_sheet(2, "0.3")?).await?;
    manager
        .add_charge(
            &OwnerKey::TrusteeBase("trustee-42".to_string()),
            upi_sheet(4, "0.5")?,
        )
        .await?;
    manager
        .add_charge(
            &OwnerKey::SchoolFinal("school-7".to_string()),
            upi_sheet(8, "0.9")?,
        )
        .await?;

    let backend = MemoryPaymentsBackend::new();
    backend.set_order_amount("order-1001", BigDecimal::from(25000));

    let cascade = CommissionCascade::new(
        store,
        Arc::new(backend.clone()),
        Arc::new(backend),
        &config,
    )?;

    let school = SchoolRef::new("school-7", "trustee-42");
    let result = cascade
        .compute(&school, "order-1001", "GPay", "UPI")
        .await?;

    println!("Order {}: ₹{}\n", result.transaction_ref, result.order_amount);
    println!("Fee per layer:");
    println!("  Gateway buying: ₹{}", result.mdr_amount.gateway_buying);
    println!("  School base:    ₹{}", result.mdr_amount.school_base);
    println!("  School final:   ₹{}", result.mdr_amount.school_final);
    println!("  Payments final: ₹{}", result.mdr_amount.pg_final);
    println!();

    print_figures("Without GST:", &result.commission_without_gst);
    print_figures("GST:", &result.commission_gst_amount);
    print_figures("With GST:", &result.commission_with_gst);

    let inclusive = GstCalculation::reverse_calculate(
        result.commission_with_gst.total_commission.clone(),
        config.gst_rate.clone(),
    )?;
    println!(
        "Reverse check: ₹{} incl. GST = ₹{} + ₹{} GST",
        inclusive.total_amount, inclusive.base_amount, inclusive.gst_amount
    );

    Ok(())
}
