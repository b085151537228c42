/*!
 * Device events.
 *
 * Every state change the protocol handler observes is reported as a
 * [`DeviceEvent`] through the handler's event dispatcher.
 */
use std::sync::Arc;

use crate::device::{Device, DeviceKind};
use crate::devices::{
    camera::CameraChange, filter_wheel::FilterWheelChange, focuser::FocuserChange, gps::GpsChange,
    guide_output::GuideOutputChange, mount::MountChange, rotator::RotatorChange,
    thermometer::ThermometerChange,
};
use crate::property::Vector;

/// Lifecycle and change events emitted by the protocol handler
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// A device started acting as `kind`
    Attached {
        /// The attached kind
        kind: DeviceKind,
        /// The device
        device: Arc<Device>,
    },
    /// A device stopped acting as `kind`
    Detached {
        /// The detached kind
        kind: DeviceKind,
        /// The device
        device: Arc<Device>,
    },
    /// The device reported a connection
    Connected {
        /// The device
        device: Arc<Device>,
    },
    /// The device reported a disconnection
    Disconnected {
        /// The device
        device: Arc<Device>,
    },
    /// A connection attempt failed
    ConnectionFailed {
        /// The device
        device: Arc<Device>,
    },
    /// A vector was defined or updated
    PropertyChanged {
        /// The device
        device: Arc<Device>,
        /// Snapshot of the vector after the change
        property: Vector,
    },
    /// A vector was deleted
    PropertyDeleted {
        /// The device
        device: Arc<Device>,
        /// The vector as it was before deletion
        property: Vector,
    },
    /// A driver or server message was received
    MessageReceived {
        /// The device, if the message named a known one
        device: Option<Arc<Device>>,
        /// Timestamped message text
        text: String,
    },
    /// Camera state changed
    Camera {
        /// The device
        device: Arc<Device>,
        /// What changed
        change: CameraChange,
    },
    /// Mount state changed
    Mount {
        /// The device
        device: Arc<Device>,
        /// What changed
        change: MountChange,
    },
    /// Focuser state changed
    Focuser {
        /// The device
        device: Arc<Device>,
        /// What changed
        change: FocuserChange,
    },
    /// Filter wheel state changed
    FilterWheel {
        /// The device
        device: Arc<Device>,
        /// What changed
        change: FilterWheelChange,
    },
    /// Rotator state changed
    Rotator {
        /// The device
        device: Arc<Device>,
        /// What changed
        change: RotatorChange,
    },
    /// GPS state changed
    Gps {
        /// The device
        device: Arc<Device>,
        /// What changed
        change: GpsChange,
    },
    /// Guide output state changed
    GuideOutput {
        /// The device
        device: Arc<Device>,
        /// What changed
        change: GuideOutputChange,
    },
    /// Thermometer reading changed
    Thermometer {
        /// The device
        device: Arc<Device>,
        /// What changed
        change: ThermometerChange,
    },
}

impl DeviceEvent {
    /// The device the event is about, if any
    pub fn device(&self) -> Option<&Arc<Device>> {
        match self {
            DeviceEvent::MessageReceived { device, .. } => device.as_ref(),
            DeviceEvent::Attached { device, .. }
            | DeviceEvent::Detached { device, .. }
            | DeviceEvent::Connected { device }
            | DeviceEvent::Disconnected { device }
            | DeviceEvent::ConnectionFailed { device }
            | DeviceEvent::PropertyChanged { device, .. }
            | DeviceEvent::PropertyDeleted { device, .. }
            | DeviceEvent::Camera { device, .. }
            | DeviceEvent::Mount { device, .. }
            | DeviceEvent::Focuser { device, .. }
            | DeviceEvent::FilterWheel { device, .. }
            | DeviceEvent::Rotator { device, .. }
            | DeviceEvent::Gps { device, .. }
            | DeviceEvent::GuideOutput { device, .. }
            | DeviceEvent::Thermometer { device, .. } => Some(device),
        }
    }

    /// Name of the device the event is about, if any
    pub fn device_name(&self) -> Option<&str> {
        self.device().map(|d| d.name())
    }

    /// Short event name, for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            DeviceEvent::Attached { .. } => "attached",
            DeviceEvent::Detached { .. } => "detached",
            DeviceEvent::Connected { .. } => "connected",
            DeviceEvent::Disconnected { .. } => "disconnected",
            DeviceEvent::ConnectionFailed { .. } => "connection_failed",
            DeviceEvent::PropertyChanged { .. } => "property_changed",
            DeviceEvent::PropertyDeleted { .. } => "property_deleted",
            DeviceEvent::MessageReceived { .. } => "message_received",
            DeviceEvent::Camera { .. } => "camera",
            DeviceEvent::Mount { .. } => "mount",
            DeviceEvent::Focuser { .. } => "focuser",
            DeviceEvent::FilterWheel { .. } => "filter_wheel",
            DeviceEvent::Rotator { .. } => "rotator",
            DeviceEvent::Gps { .. } => "gps",
            DeviceEvent::GuideOutput { .. } => "guide_output",
            DeviceEvent::Thermometer { .. } => "thermometer",
        }
    }
}
