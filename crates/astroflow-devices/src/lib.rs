/*!
 * Astroflow Devices
 *
 * Client-side handling of the INDI device protocol: drivers are classified
 * by their capability bitmask, property vectors are mirrored into shared
 * [`Device`] objects, messages that arrive ahead of their device are
 * reordered, and every change is published as a [`DeviceEvent`].
 */

#![warn(missing_docs)]

// Re-export core types
pub use astroflow_core::prelude;

pub mod device;
pub mod devices;
pub mod event;
pub mod handler;
pub mod property;
pub mod protocol;
pub mod registry;
pub mod reorder;
pub mod sender;

pub use device::{Attachment, Device, DeviceError, DeviceKind, DriverInfo, DriverInterface, Result};
pub use devices::KindState;
pub use event::DeviceEvent;
pub use handler::DeviceProtocolHandler;
pub use property::{Property, PropertyVector, Vector, VectorType};
pub use protocol::{Message, OutboundMessage, PropertyPermission, PropertyState};
pub use registry::{DeviceRegistry, DriverTable};
pub use sender::{ChannelSender, MessageSender, NullSender};

/// Astroflow devices crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the device system
pub fn init() -> std::result::Result<(), astroflow_core::error::Error> {
    tracing::info!("Astroflow Devices {} initialized", VERSION);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert!(init().is_ok());
    }
}
