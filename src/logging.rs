//! Structured logging setup.
//!
//! Development gets human-readable, ANSI-colored output; production gets
//! JSON lines suitable for a log aggregator. Verbosity is controlled by
//! `RUST_LOG` when set, falling back to `AppConfig::log_level` otherwise.

use crate::config::AppConfig;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let registry = tracing_subscriber::registry().with(filter);

    if config.is_production() {
        registry
            .with(fmt::layer().json().with_target(true).with_ansi(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_ansi(true))
            .init();
    }
}
