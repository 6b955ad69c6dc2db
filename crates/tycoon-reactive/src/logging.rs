#![forbid(unsafe_code)]

//! Process-wide `tracing` subscriber installation.
//!
//! Library code only emits records through the `tracing` facade; binaries
//! and test harnesses decide where they go. The filter comes from
//! `RUST_LOG` and falls back to `info`.

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Output format for [`install`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Plain,
    /// One JSON object per record.
    Json,
}

/// A global subscriber was already set for this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("a global tracing subscriber is already installed")]
pub struct AlreadyInstalled;

/// Install a `tracing-subscriber` fmt subscriber as the global default.
///
/// # Errors
///
/// [`AlreadyInstalled`] if another subscriber got there first.
pub fn install(format: LogFormat) -> Result<(), AlreadyInstalled> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match format {
        LogFormat::Plain => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|_| AlreadyInstalled)
}
