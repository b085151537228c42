/*!
 * Logging functionality for Astroflow.
 *
 * This module installs the `tracing` subscriber used by the Astroflow crates
 * and provides span helpers so device and handler logs carry the same fields.
 */
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Initialize the logging system with default configuration
pub fn init() -> Result<()> {
    init_with_filter("info")
}

/// Initialize the logging system with a specific filter
///
/// `RUST_LOG` takes precedence over `filter` when it is set.
///
/// # Arguments
///
/// * `filter` - The log filter string (e.g., "info", "debug", "astroflow_devices=trace")
pub fn init_with_filter(filter: &str) -> Result<()> {
    let filter = build_filter(filter)?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .map_err(|e| Error::logging(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

/// Initialize the logging system from the `[logging]` configuration section
pub fn init_from_config(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(&config.level)?;

    let result = if config.json_format {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(config.with_target))
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(config.with_target))
            .with(filter)
            .try_init()
    };

    result.map_err(|e| Error::logging(format!("Failed to initialize logging: {}", e)))
}

fn build_filter(fallback: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(fallback)
            .map_err(|e| Error::logging(format!("Invalid log filter '{}': {}", fallback, e))),
    }
}

/// A convenience macro for creating structured logs with fields
#[macro_export]
macro_rules! log_with_fields {
    ($level:expr, $message:expr, $($field:tt)+) => {
        tracing::event!($level, $($field)+, message = $message)
    };
}

/// A type alias for a tracing span
pub type Span = tracing::Span;

/// Create a new span for a component
///
/// # Arguments
///
/// * `name` - The name of the component
/// * `id` - An optional ID for the component instance
pub fn component_span(name: &str, id: Option<&str>) -> Span {
    match id {
        Some(id) => tracing::info_span!("component", name = %name, id = %id),
        None => tracing::info_span!("component", name = %name),
    }
}

/// Create a new span for an operation on a device
pub fn operation_span(name: &str, device: &str) -> Span {
    tracing::debug_span!("operation", name = %name, device = %device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_init_twice_reports_error() {
        // Only one global subscriber can be installed per process
        let _ = init_with_filter("debug");
        assert!(matches!(init_with_filter("debug"), Err(Error::Logging(_))));
    }

    #[test]
    fn test_build_filter_accepts_directives() {
        assert!(build_filter("astroflow_devices=trace,info").is_ok());
    }

    #[test]
    fn test_spans_without_subscriber() {
        let span = component_span("handler", Some("123"));
        let _entered = span.enter();
        let span = operation_span("handle", "CCD Simulator");
        let _entered = span.enter();
        crate::log_with_fields!(Level::INFO, "inside span", device = "CCD Simulator");
    }
}
