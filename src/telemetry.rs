//! Tracing subscriber initialisation.
//!
//! The engine only emits `tracing` events; installing a subscriber is the
//! embedding process's choice. This helper covers the common case.

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Errors raised while installing the tracing subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The default directive could not be parsed.
    #[error("invalid tracing directive: {0}")]
    Directive(#[from] tracing_subscriber::filter::ParseError),

    /// A global subscriber is already installed.
    #[error("tracing subscriber already installed: {0}")]
    AlreadyInstalled(String),
}

/// Installs a formatting subscriber filtered by `RUST_LOG`.
///
/// `default_directive` (for example `"switchyard=info"`) is added to the
/// filter so engine events are visible without any environment set.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the directive is malformed or a global
/// subscriber already exists.
pub fn init_tracing(default_directive: &str) -> Result<(), TelemetryError> {
    let filter = EnvFilter::from_default_env().add_directive(default_directive.parse()?);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|err| TelemetryError::AlreadyInstalled(err.to_string()))?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "switchyard tracing initialised");
    Ok(())
}
