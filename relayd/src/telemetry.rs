//! Telemetry initialization (tracing + fmt subscriber).
//!
//! Log verbosity is controlled via the standard `RUST_LOG` environment variable
//! and defaults to `info` when unset:
//!
//! ```bash
//! RUST_LOG=relayd=debug,tower_http=debug relayd
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize tracing with a fmt layer and env-filter.
///
/// Safe to call once at startup; returns an error if a global subscriber is
/// already installed.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}
