//! Logging initialization.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with an env-filter; `RUST_LOG` overrides the
/// configured level when set. Call once at process start.
pub fn init(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("upline={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
