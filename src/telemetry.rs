//! Tracing subscriber setup

use std::error::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global subscriber filtered by `RUST_LOG`, or `default_filter` when unset
///
/// Fails instead of panicking when a global subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}
