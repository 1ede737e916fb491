//! Tax calculations applied to commissions

pub mod gst;
