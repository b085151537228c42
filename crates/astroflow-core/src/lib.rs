/*!
 * Astroflow Core
 *
 * This crate provides the ambient functionality shared by the Astroflow
 * crates: configuration, error types, logging setup, identifiers and the
 * synchronous event dispatcher used to deliver device events.
 */

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod prelude;
pub mod types;

/// Re-export of dependencies that are part of the public API
pub mod deps {
    pub use chrono;
    pub use serde;
    pub use tokio;
    pub use tracing;
    pub use uuid;
}

/// Astroflow core crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library initialization
pub fn init() -> Result<(), error::Error> {
    logging::init()?;
    tracing::info!("Astroflow Core {} initialized", VERSION);
    Ok(())
}

/// Library initialization from a loaded configuration
pub fn init_with_config(config: &config::Config) -> Result<(), error::Error> {
    logging::init_from_config(&config.logging)?;
    tracing::info!(
        app = %config.general.app_name,
        environment = %config.general.environment,
        "Astroflow Core {} initialized",
        VERSION
    );
    Ok(())
}
