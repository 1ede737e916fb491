//! # Commission Core
//!
//! Commission and reconciliation engine for school-fee payments routed through
//! a payment gateway.
//!
//! ## Features
//!
//! - **Tiered rate sheets**: amount-banded flat or percent charges per platform and payment mode
//! - **Charge catalogs**: per-owner sheets with an "Others" fallback mode
//! - **Commission cascade**: four-layer rate resolution splitting each fee between the parties
//! - **GST**: 18% GST breakdown over every commission figure
//! - **Reconciliation**: per-school comparison of platform and gateway totals with
//!   bounded concurrency, deadlines and cancellation
//! - **Settlement and duplicate checks**: unsettled live schools and repeated onboarding keys
//! - **Storage abstraction**: every collaborator sits behind an async trait
//!
//! ## Quick Start
//!
//! ```rust
//! use commission_core::{ChargeType, RangeCharge, RangeTable};
//! use bigdecimal::BigDecimal;
//!
//! let table = RangeTable::new(vec![
//!     RangeCharge::upto(BigDecimal::from(1000), ChargeType::Flat, BigDecimal::from(5)),
//!     RangeCharge::catch_all(ChargeType::Percent, BigDecimal::from(1)),
//! ]);
//!
//! let fee = table.resolve(&BigDecimal::from(2000)).unwrap();
//! assert_eq!(fee, BigDecimal::from(20));
//! ```

pub mod config;
pub mod rates;
pub mod reconciliation;
pub mod tax;
pub mod telemetry;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::EngineConfig;
pub use rates::*;
pub use reconciliation::*;
pub use tax::gst::*;
pub use traits::*;
pub use types::*;
