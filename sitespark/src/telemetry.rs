//! Tracing initialization.
//!
//! Sets up `tracing-subscriber` with an `EnvFilter` (from `RUST_LOG`, defaulting to `info`) and a
//! fmt layer that writes either human-readable text or one JSON object per line, selected by the
//! `log_format` configuration field.

use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LogFormat;

/// Initialize the global tracing subscriber
///
/// Fails if a global subscriber has already been installed.
pub fn init_telemetry(format: LogFormat) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .try_init()?;
        }
    }

    info!(?format, "Telemetry initialized");
    Ok(())
}
