/*!
 * Device model and core device abstractions.
 *
 * A [`Device`] is the client-side mirror of one INDI device: its driver
 * identity, the property vectors it has defined, a bounded log of driver
 * messages and the device kinds (camera, mount, ...) it currently acts as.
 * One `Device` object is shared by every kind table that refers to it.
 */
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bitflags::bitflags;
use chrono::{SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, trace};

use astroflow_core::{error::Error as CoreError, types::Id};

use crate::devices::{self, KindState, KindStates};
use crate::event::DeviceEvent;
use crate::property::Vector;
use crate::protocol::{
    elements, DefVector, OutboundMessage, PropertyState, SetVector, TextMessage, CONNECTION,
};
use crate::sender::MessageSender;

/// Error type for device operations
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The device is not connected
    #[error("Device not connected: {0}")]
    NotConnected(String),

    /// The device does not support the operation
    #[error("Operation not supported by {device}: {operation}")]
    Unsupported {
        /// The device name
        device: String,
        /// The rejected operation
        operation: String,
    },

    /// A command argument is out of range or unknown
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// The outbound message could not be delivered to the sender
    #[error("Send error: {0}")]
    Send(String),

    /// A lock was poisoned by a panicking thread
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl DeviceError {
    /// Create an unsupported-operation error
    pub fn unsupported<D: AsRef<str>, O: AsRef<str>>(device: D, operation: O) -> Self {
        DeviceError::Unsupported {
            device: device.as_ref().to_string(),
            operation: operation.as_ref().to_string(),
        }
    }

    /// Create an invalid-value error
    pub fn invalid_value<S: AsRef<str>>(msg: S) -> Self {
        DeviceError::InvalidValue(msg.as_ref().to_string())
    }

    /// Create a lock-poisoned error
    pub fn lock_poisoned<S: AsRef<str>>(what: S) -> Self {
        DeviceError::LockPoisoned(what.as_ref().to_string())
    }
}

/// Result type for device operations
pub type Result<T> = std::result::Result<T, DeviceError>;

bitflags! {
    /// Capability bitmask advertised by a driver in `DRIVER_INTERFACE`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct DriverInterface: u32 {
        /// Mount
        const TELESCOPE = 1 << 0;
        /// Camera
        const CCD = 1 << 1;
        /// Guide output
        const GUIDER = 1 << 2;
        /// Focuser
        const FOCUSER = 1 << 3;
        /// Filter wheel
        const FILTER = 1 << 4;
        /// Dome
        const DOME = 1 << 5;
        /// GPS
        const GPS = 1 << 6;
        /// Weather station
        const WEATHER = 1 << 7;
        /// Adaptive optics
        const AO = 1 << 8;
        /// Dust cap
        const DUSTCAP = 1 << 9;
        /// Light box
        const LIGHTBOX = 1 << 10;
        /// Detector
        const DETECTOR = 1 << 11;
        /// Rotator
        const ROTATOR = 1 << 12;
        /// Spectrograph
        const SPECTROGRAPH = 1 << 13;
        /// Correlator
        const CORRELATOR = 1 << 14;
        /// Auxiliary device
        const AUX = 1 << 15;
        /// Digital output
        const OUTPUT = 1 << 16;
        /// Digital input
        const INPUT = 1 << 17;
        /// Power box
        const POWER = 1 << 18;
    }
}

/// Device kinds modelled by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceKind {
    /// Camera (CCD bit)
    Camera,
    /// Mount (TELESCOPE bit)
    Mount,
    /// Focuser
    Focuser,
    /// Filter wheel
    FilterWheel,
    /// Rotator
    Rotator,
    /// GPS receiver
    Gps,
    /// Pulse guide output (GUIDER bit, or timed-guide vectors)
    GuideOutput,
    /// Temperature sensor, only ever a secondary capability
    Thermometer,
}

impl DeviceKind {
    /// Kinds that can be selected by the capability bitmask, in attach order
    pub const PRIMARY: [DeviceKind; 7] = [
        DeviceKind::Camera,
        DeviceKind::Mount,
        DeviceKind::Focuser,
        DeviceKind::FilterWheel,
        DeviceKind::Rotator,
        DeviceKind::Gps,
        DeviceKind::GuideOutput,
    ];

    /// Capability bit selecting this kind
    pub fn interface(&self) -> Option<DriverInterface> {
        match self {
            DeviceKind::Camera => Some(DriverInterface::CCD),
            DeviceKind::Mount => Some(DriverInterface::TELESCOPE),
            DeviceKind::Focuser => Some(DriverInterface::FOCUSER),
            DeviceKind::FilterWheel => Some(DriverInterface::FILTER),
            DeviceKind::Rotator => Some(DriverInterface::ROTATOR),
            DeviceKind::Gps => Some(DriverInterface::GPS),
            DeviceKind::GuideOutput => Some(DriverInterface::GUIDER),
            DeviceKind::Thermometer => None,
        }
    }

    /// Primary kinds selected by a capability bitmask
    pub fn from_interface(interface: DriverInterface) -> Vec<DeviceKind> {
        DeviceKind::PRIMARY
            .into_iter()
            .filter(|kind| kind.interface().is_some_and(|bit| interface.contains(bit)))
            .collect()
    }

    /// Element of `ACTIVE_DEVICES` naming a snooped device of this kind
    pub fn snoop_element(&self) -> Option<&'static str> {
        match self {
            DeviceKind::Camera => Some("ACTIVE_CCD"),
            DeviceKind::Mount => Some("ACTIVE_TELESCOPE"),
            DeviceKind::Focuser => Some("ACTIVE_FOCUSER"),
            DeviceKind::FilterWheel => Some("ACTIVE_FILTER"),
            DeviceKind::Rotator => Some("ACTIVE_ROTATOR"),
            DeviceKind::Gps => Some("ACTIVE_GPS"),
            DeviceKind::GuideOutput | DeviceKind::Thermometer => None,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceKind::Camera => "camera",
            DeviceKind::Mount => "mount",
            DeviceKind::Focuser => "focuser",
            DeviceKind::FilterWheel => "filter wheel",
            DeviceKind::Rotator => "rotator",
            DeviceKind::Gps => "gps",
            DeviceKind::GuideOutput => "guide output",
            DeviceKind::Thermometer => "thermometer",
        };
        f.write_str(name)
    }
}

/// How a kind was attached to a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attachment {
    /// Selected by the capability bitmask
    Primary,
    /// Discovered from the vectors the device defined
    Secondary,
}

/// Driver identity from the `DRIVER_INFO` vector
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DriverInfo {
    /// Driver display name
    pub name: String,
    /// Driver executable
    pub executable: String,
    /// Driver version
    pub version: String,
    /// Capability bitmask
    pub interface: DriverInterface,
}

impl DriverInfo {
    /// Extract driver identity from a `DRIVER_INFO` definition.
    ///
    /// A missing or malformed `DRIVER_INTERFACE` yields an empty bitmask.
    pub fn from_def(def: &DefVector) -> Self {
        let text = |name: &str| def.text_value(name).unwrap_or_default().to_string();
        let interface = def
            .text_value("DRIVER_INTERFACE")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .map(DriverInterface::from_bits_truncate)
            .unwrap_or_default();

        Self {
            name: text("DRIVER_NAME"),
            executable: text("DRIVER_EXEC"),
            version: text("DRIVER_VERSION"),
            interface,
        }
    }
}

/// Bounded, most-recent-first log of driver messages
#[derive(Debug, Clone)]
pub struct MessageLog {
    entries: VecDeque<String>,
    capacity: usize,
}

impl MessageLog {
    /// Create a log holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a message, evicting the oldest one when full
    pub fn push(&mut self, text: String) {
        self.entries.push_front(text);
        self.entries.truncate(self.capacity);
    }

    /// Messages, newest first
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.entries.iter()
    }

    /// Number of messages held
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of messages held
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Mutable device state, guarded by the device lock
#[derive(Debug)]
pub(crate) struct DeviceInner {
    pub(crate) connected: bool,
    pub(crate) properties: IndexMap<String, Vector>,
    pub(crate) messages: MessageLog,
    pub(crate) roles: IndexMap<DeviceKind, Attachment>,
    pub(crate) kinds: KindStates,
    pub(crate) snooped: Vec<(String, String)>,
}

/// A remote INDI device
#[derive(Debug)]
pub struct Device {
    id: Id,
    name: String,
    driver: DriverInfo,
    sender: Arc<dyn MessageSender>,
    inner: RwLock<DeviceInner>,
}

/// Format a driver message the way it is stored in the device log
pub(crate) fn format_message(message: &TextMessage) -> String {
    let timestamp = message.timestamp.unwrap_or_else(Utc::now);
    format!(
        "[{}]: {}",
        timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        message.message
    )
}

impl Device {
    pub(crate) fn new(
        name: String,
        driver: DriverInfo,
        sender: Arc<dyn MessageSender>,
        message_log_capacity: usize,
    ) -> Self {
        Self {
            id: Id::new(),
            name,
            driver,
            sender,
            inner: RwLock::new(DeviceInner {
                connected: false,
                properties: IndexMap::new(),
                messages: MessageLog::new(message_log_capacity),
                roles: IndexMap::new(),
                kinds: KindStates::default(),
                snooped: Vec::new(),
            }),
        }
    }

    /// Client-assigned identifier
    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Protocol-assigned device name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Driver identity
    pub fn driver(&self) -> &DriverInfo {
        &self.driver
    }

    /// Whether the device reported itself connected
    pub fn is_connected(&self) -> bool {
        self.read_state().connected
    }

    /// Snapshot of a property vector
    pub fn property(&self, name: &str) -> Option<Vector> {
        self.read_state().properties.get(name).cloned()
    }

    /// Snapshot of every property vector, in definition order
    pub fn properties(&self) -> Vec<Vector> {
        self.read_state().properties.values().cloned().collect()
    }

    /// Names of the defined property vectors, in definition order
    pub fn property_names(&self) -> Vec<String> {
        self.read_state().properties.keys().cloned().collect()
    }

    /// Driver messages, newest first
    pub fn messages(&self) -> Vec<String> {
        self.read_state().messages.iter().cloned().collect()
    }

    /// Kinds currently attached, in attach order
    pub fn roles(&self) -> Vec<DeviceKind> {
        self.read_state().roles.keys().copied().collect()
    }

    /// Whether the device currently acts as `kind`
    pub fn has_role(&self, kind: DeviceKind) -> bool {
        self.read_state().roles.contains_key(&kind)
    }

    /// How `kind` was attached, if it is
    pub fn attachment(&self, kind: DeviceKind) -> Option<Attachment> {
        self.read_state().roles.get(&kind).copied()
    }

    /// `(ACTIVE_* element, device name)` pairs last sent by [`Device::snoop`]
    pub fn snooped(&self) -> Vec<(String, String)> {
        self.read_state().snooped.clone()
    }

    pub(crate) fn read_state(&self) -> RwLockReadGuard<'_, DeviceInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write_state(&self) -> RwLockWriteGuard<'_, DeviceInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_read_state(&self) -> Result<RwLockReadGuard<'_, DeviceInner>> {
        self.inner
            .read()
            .map_err(|_| DeviceError::lock_poisoned(format!("device {}", self.name)))
    }

    /// Read kind state for a command. Fails when the device is disconnected
    /// or `select` finds nothing for the kind.
    pub(crate) fn inspect<T>(
        &self,
        kind: DeviceKind,
        select: impl FnOnce(&DeviceInner) -> Option<T>,
    ) -> Result<T> {
        let inner = self.try_read_state()?;
        if !inner.connected {
            return Err(DeviceError::NotConnected(self.name.clone()));
        }
        select(&inner).ok_or_else(|| DeviceError::unsupported(&self.name, format!("{} commands", kind)))
    }

    /// Send new number values for a vector
    pub fn send_new_number<S, I>(&self, vector: &str, values: I) -> Result<()>
    where
        S: Into<String>,
        I: IntoIterator<Item = (S, f64)>,
    {
        self.sender.send_message(OutboundMessage::NewNumberVector {
            device: self.name.clone(),
            name: vector.to_string(),
            elements: elements(values),
        })
    }

    /// Send new text values for a vector
    pub fn send_new_text<S, V, I>(&self, vector: &str, values: I) -> Result<()>
    where
        S: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (S, V)>,
    {
        let values = values.into_iter().map(|(n, v)| (n, v.into()));
        self.sender.send_message(OutboundMessage::NewTextVector {
            device: self.name.clone(),
            name: vector.to_string(),
            elements: elements(values),
        })
    }

    /// Send new switch values for a vector
    pub fn send_new_switch<S, I>(&self, vector: &str, values: I) -> Result<()>
    where
        S: Into<String>,
        I: IntoIterator<Item = (S, bool)>,
    {
        self.sender.send_message(OutboundMessage::NewSwitchVector {
            device: self.name.clone(),
            name: vector.to_string(),
            elements: elements(values),
        })
    }

    /// Ask the server to resend this device's definitions
    pub fn get_properties(&self, property: Option<&str>) -> Result<()> {
        self.sender.send_message(OutboundMessage::GetProperties {
            device: Some(self.name.clone()),
            property: property.map(str::to_string),
        })
    }

    /// Request a connection, unless already connected
    pub fn connect(&self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        self.send_new_switch(CONNECTION, [("CONNECT", true)])
    }

    /// Request a disconnection
    pub fn disconnect(&self) -> Result<()> {
        self.send_new_switch(CONNECTION, [("DISCONNECT", true)])
    }

    /// Tell the driver which devices to snoop on.
    ///
    /// Each device is listed under the `ACTIVE_*` element of its first
    /// attached kind that has one; devices with no such kind are skipped.
    pub fn snoop(&self, devices: &[Arc<Device>]) -> Result<()> {
        let active: Vec<(String, String)> = devices
            .iter()
            .filter_map(|device| {
                device
                    .roles()
                    .into_iter()
                    .find_map(|kind| kind.snoop_element())
                    .map(|element| (element.to_string(), device.name.clone()))
            })
            .collect();

        info!(device = %self.name, snooped = ?active, "Snooping devices");

        self.write_state().snooped = active.clone();
        self.send_new_text("ACTIVE_DEVICES", active)
    }

    /// Attach a kind. Returns the `Attached` event, or `None` if the kind
    /// was already attached.
    pub(crate) fn attach(self: &Arc<Self>, state: KindState, attachment: Attachment) -> Option<DeviceEvent> {
        let kind = state.kind();
        let mut inner = self.write_state();
        if inner.roles.contains_key(&kind) {
            return None;
        }
        inner.roles.insert(kind, attachment);
        inner.kinds.insert(state);
        drop(inner);

        info!(device = %self.name, %kind, ?attachment, "{} attached", kind);
        Some(DeviceEvent::Attached {
            kind,
            device: self.clone(),
        })
    }

    /// Detach every kind, secondary roles first, and clear the device state
    pub(crate) fn detach_all(self: &Arc<Self>) -> Vec<DeviceEvent> {
        let mut inner = self.write_state();
        let roles = std::mem::take(&mut inner.roles);
        inner.kinds = KindStates::default();
        inner.properties.clear();
        inner.connected = false;
        drop(inner);

        let (secondary, primary): (Vec<_>, Vec<_>) = roles
            .into_iter()
            .partition(|(_, attachment)| *attachment == Attachment::Secondary);

        secondary
            .into_iter()
            .chain(primary)
            .map(|(kind, _)| {
                info!(device = %self.name, %kind, "{} detached", kind);
                DeviceEvent::Detached {
                    kind,
                    device: self.clone(),
                }
            })
            .collect()
    }

    /// Merge a vector definition
    pub(crate) fn apply_def(self: &Arc<Self>, def: &DefVector) -> Vec<DeviceEvent> {
        let vector = Vector::from_def(def);
        let mut events = Vec::new();

        let mut guard = self.write_state();
        let inner = &mut *guard;
        inner.properties.insert(def.name.clone(), vector.clone());

        if let Some(kind) = devices::secondary_role(&def.name) {
            if !inner.roles.contains_key(&kind) {
                inner.roles.insert(kind, Attachment::Secondary);
                inner.kinds.insert(KindState::default_for(kind));
                info!(device = %self.name, %kind, "{} attached", kind);
                events.push(DeviceEvent::Attached {
                    kind,
                    device: self.clone(),
                });
            }
        }

        inner.kinds.on_vector(self, &vector, true, &mut events);

        if def.name == CONNECTION {
            let flag = connection_flag(|e| def.switch_value(e));
            self.update_connection(inner, flag, vector.state(), &mut events);
        }
        drop(guard);

        trace!(device = %self.name, vector = %def.name, "Vector defined");
        events.push(DeviceEvent::PropertyChanged {
            device: self.clone(),
            property: vector,
        });
        events
    }

    /// Merge a vector update. Updates for unknown vectors, or carrying the
    /// wrong value type, are ignored without events.
    pub(crate) fn apply_set(self: &Arc<Self>, set: &SetVector) -> Vec<DeviceEvent> {
        let mut events = Vec::new();

        let mut guard = self.write_state();
        let inner = &mut *guard;
        let Some(vector) = inner.properties.get_mut(&set.name) else {
            debug!(device = %self.name, vector = %set.name, "Ignoring update for undefined vector");
            return events;
        };
        if !vector.apply_set(set) {
            debug!(device = %self.name, vector = %set.name, "Ignoring update with mismatched type");
            return events;
        }
        let vector = vector.clone();

        inner.kinds.on_vector(self, &vector, false, &mut events);

        if set.name == CONNECTION {
            let flag = connection_flag(|e| set.switch_value(e));
            self.update_connection(inner, flag, vector.state(), &mut events);
        }
        drop(guard);

        events.push(DeviceEvent::PropertyChanged {
            device: self.clone(),
            property: vector,
        });
        events
    }

    /// Remove one vector
    pub(crate) fn remove_property(self: &Arc<Self>, name: &str) -> Option<DeviceEvent> {
        let removed = self.write_state().properties.shift_remove(name)?;
        Some(DeviceEvent::PropertyDeleted {
            device: self.clone(),
            property: removed,
        })
    }

    /// Store a driver message in the log
    pub(crate) fn record_message(self: &Arc<Self>, message: &TextMessage) -> DeviceEvent {
        let text = format_message(message);
        self.write_state().messages.push(text.clone());
        DeviceEvent::MessageReceived {
            device: Some(self.clone()),
            text,
        }
    }

    fn update_connection(
        self: &Arc<Self>,
        inner: &mut DeviceInner,
        flag: Option<bool>,
        state: PropertyState,
        events: &mut Vec<DeviceEvent>,
    ) {
        match flag {
            Some(true) if !inner.connected => {
                inner.connected = true;
                info!(device = %self.name, "Device connected");
                events.push(DeviceEvent::Connected {
                    device: self.clone(),
                });
            }
            Some(false) if inner.connected => {
                inner.connected = false;
                info!(device = %self.name, "Device disconnected");
                events.push(DeviceEvent::Disconnected {
                    device: self.clone(),
                });
            }
            Some(false) if state == PropertyState::Alert => {
                events.push(DeviceEvent::ConnectionFailed {
                    device: self.clone(),
                });
            }
            _ => {}
        }
    }
}

/// Connect flag carried by a `CONNECTION` message: `CONNECT` if present,
/// otherwise the negation of `DISCONNECT`.
fn connection_flag(switch: impl Fn(&str) -> Option<bool>) -> Option<bool> {
    switch("CONNECT").or_else(|| switch("DISCONNECT").map(|on| !on))
}
