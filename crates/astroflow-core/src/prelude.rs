/*!
 * Prelude module for Astroflow Core.
 *
 * This module re-exports commonly used types and functions from the Astroflow Core crate
 * to make them easier to import.
 */

// Re-export error types
pub use crate::error::{Error, Result};

// Re-export core types
pub use crate::types::{Id, Timestamp};

// Re-export event types
pub use crate::event::{ChannelListener, EventDispatcher, Listener, SharedListener};

// Re-export config types
pub use crate::config::{Config, ConfigBuilder, HandlerConfig, SharedConfig};

// Re-export logging macros
pub use crate::log_with_fields;
pub use tracing::{debug, error, info, trace, warn};

// Re-export core initialization
pub use crate::{init, init_with_config};
