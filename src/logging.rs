//! Structured logging initialization.
//!
//! Console output with an env-filter (`RUST_LOG`), switchable to JSON lines
//! for machine ingestion via `DRSENTINEL_LOG_FORMAT=json`. Safe to call more
//! than once; later calls are no-ops.

use std::sync::OnceLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

pub fn init_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let json = std::env::var("DRSENTINEL_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let result = if json {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_target(true))
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_target(true))
                .try_init()
        };

        // A subscriber may already be installed (tests, embedding callers);
        // that is not an error.
        if result.is_err() {
            tracing::debug!("global tracing subscriber already initialized");
        }
    });
}
