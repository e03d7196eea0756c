//! Structured logging setup
//!
//! The pipeline emits `tracing` events at every stage transition (`debug`),
//! for aborted requests (`warn`), and for store failures (`error`). Nothing is
//! printed until a subscriber is installed; services that do not install
//! their own call [`init_tracing`] once at startup.

use tracing::Subscriber;
use tracing_subscriber::EnvFilter;

use crate::{config::Config, error::Error, error::Result};

/// Install a JSON subscriber filtered by `service.log_level`
///
/// `RUST_LOG`, when set, takes precedence over the configured level. Fails if
/// a global subscriber is already installed.
pub fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level_filter(&config.service.log_level));

    tracing::subscriber::set_global_default(json_subscriber(filter))
        .map_err(|e| Error::Configuration(format!("tracing already initialized: {}", e)))?;

    tracing::info!(
        service = %config.service.name,
        level = %config.service.log_level,
        "Tracing initialized"
    );

    Ok(())
}

/// Filter for a configured level; an unparseable level falls back to `info`
fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn json_subscriber(filter: EnvFilter) -> impl Subscriber + Send + Sync + 'static {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .finish()
}
