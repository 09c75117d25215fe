use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "draftkit=debug";

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter` (or `draftkit=debug`).
///
/// Returns an error instead of panicking when a global subscriber is
/// already installed.
pub fn init_telemetry(default_filter: Option<&str>) -> Result<(), TryInitError> {
    let fallback = default_filter.unwrap_or(DEFAULT_FILTER).to_string();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    tracing::debug!("Tracing initialized");
    Ok(())
}

/// Counterpart of [`init_telemetry`]. The fmt layer writes synchronously, so
/// there is nothing buffered to flush.
pub fn shutdown_telemetry() {
    tracing::debug!("Telemetry shutdown");
}
