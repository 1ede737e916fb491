//! Rate sheets: tier resolution, catalogs and the commission cascade

pub mod cascade;
pub mod catalog;
pub mod range_table;

pub use cascade::*;
pub use catalog::*;
pub use range_table::*;
