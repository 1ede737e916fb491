//! Reconciliation of platform and gateway totals, settlement gap checks and
//! duplicate onboarding detection

pub mod duplicates;
pub mod engine;
pub mod report;

pub use duplicates::*;
pub use engine::*;
pub use report::*;
