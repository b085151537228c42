/*!
 * INDI message model.
 *
 * This module defines the decoded messages exchanged with an INDI server.
 * Parsing the XML wire format is left to the transport; everything here is
 * plain data with `serde` support so messages can also be replayed from JSON.
 */
use serde::{Deserialize, Serialize};

use astroflow_core::types::Timestamp;

/// Vector name carrying driver identity and the capability bitmask
pub const DRIVER_INFO: &str = "DRIVER_INFO";

/// Vector name of the standard connection switch
pub const CONNECTION: &str = "CONNECTION";

/// State of a property vector as reported by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PropertyState {
    /// Nothing in progress
    #[default]
    Idle,
    /// Last operation succeeded
    Ok,
    /// An operation is in progress
    Busy,
    /// Last operation failed
    Alert,
}

/// Client permission on a property vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PropertyPermission {
    /// Read only
    #[serde(rename = "ro")]
    ReadOnly,
    /// Read and write
    #[default]
    #[serde(rename = "rw")]
    ReadWrite,
    /// Write only
    #[serde(rename = "wo")]
    WriteOnly,
}

impl PropertyPermission {
    /// Whether the client may write to the vector
    pub fn is_writable(&self) -> bool {
        !matches!(self, PropertyPermission::ReadOnly)
    }
}

/// Switch vector rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SwitchRule {
    /// Exactly one switch is on
    #[default]
    OneOfMany,
    /// At most one switch is on
    AtMostOne,
    /// Any number of switches may be on
    AnyOfMany,
}

/// A named value inside a `Set` or `New` vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element<T> {
    /// Element name
    pub name: String,
    /// Element value
    pub value: T,
}

impl<T> Element<T> {
    /// Create a new element
    pub fn new<S: Into<String>>(name: S, value: T) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Collect `(name, value)` pairs into elements
pub fn elements<S, T, I>(pairs: I) -> Vec<Element<T>>
where
    S: Into<String>,
    I: IntoIterator<Item = (S, T)>,
{
    pairs
        .into_iter()
        .map(|(name, value)| Element::new(name, value))
        .collect()
}

/// A number element as declared by a `Def`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefNumber {
    /// Element name
    pub name: String,
    /// Display label
    #[serde(default)]
    pub label: String,
    /// printf-style format
    #[serde(default)]
    pub format: String,
    /// Minimum value
    #[serde(default)]
    pub min: f64,
    /// Maximum value
    #[serde(default)]
    pub max: f64,
    /// Step
    #[serde(default)]
    pub step: f64,
    /// Initial value
    pub value: f64,
}

impl DefNumber {
    /// Create a number element with bounds
    pub fn new<S: Into<String>>(name: S, value: f64, min: f64, max: f64, step: f64) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            format: "%g".to_string(),
            min,
            max,
            step,
            value,
        }
    }
}

/// A text element as declared by a `Def`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefText {
    /// Element name
    pub name: String,
    /// Display label
    #[serde(default)]
    pub label: String,
    /// Initial value
    #[serde(default)]
    pub value: String,
}

impl DefText {
    /// Create a text element
    pub fn new<S: Into<String>, V: Into<String>>(name: S, value: V) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            value: value.into(),
        }
    }
}

/// A switch element as declared by a `Def`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefSwitch {
    /// Element name
    pub name: String,
    /// Display label
    #[serde(default)]
    pub label: String,
    /// Initial value
    pub value: bool,
}

impl DefSwitch {
    /// Create a switch element
    pub fn new<S: Into<String>>(name: S, value: bool) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            value,
        }
    }
}

/// A light element as declared by a `Def`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefLight {
    /// Element name
    pub name: String,
    /// Display label
    #[serde(default)]
    pub label: String,
    /// Initial value
    pub value: PropertyState,
}

impl DefLight {
    /// Create a light element
    pub fn new<S: Into<String>>(name: S, value: PropertyState) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            value,
        }
    }
}

/// Typed element list of a `Def` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DefElements {
    /// Number elements
    Number(Vec<DefNumber>),
    /// Text elements
    Text(Vec<DefText>),
    /// Switch elements and their rule
    Switch {
        /// Switch rule
        #[serde(default)]
        rule: SwitchRule,
        /// Switch elements
        elements: Vec<DefSwitch>,
    },
    /// Light elements
    Light(Vec<DefLight>),
}

/// Typed element list of a `Set` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SetElements {
    /// Number values
    Number(Vec<Element<f64>>),
    /// Text values
    Text(Vec<Element<String>>),
    /// Switch values
    Switch(Vec<Element<bool>>),
    /// Light values
    Light(Vec<Element<PropertyState>>),
}

/// Declares a property vector and its elements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefVector {
    /// Device name
    pub device: String,
    /// Vector name
    pub name: String,
    /// Display label
    #[serde(default)]
    pub label: String,
    /// Display group
    #[serde(default)]
    pub group: String,
    /// Client permission
    #[serde(default)]
    pub permission: PropertyPermission,
    /// Vector state
    #[serde(default)]
    pub state: PropertyState,
    /// Driver timestamp
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    /// Optional driver message
    #[serde(default)]
    pub message: Option<String>,
    /// Declared elements
    pub elements: DefElements,
}

impl DefVector {
    /// Create a read-write, idle vector in the "Main Control" group
    pub fn new<D: Into<String>, N: Into<String>>(device: D, name: N, elements: DefElements) -> Self {
        let name = name.into();
        Self {
            device: device.into(),
            label: name.clone(),
            name,
            group: "Main Control".to_string(),
            permission: PropertyPermission::ReadWrite,
            state: PropertyState::Idle,
            timestamp: None,
            message: None,
            elements,
        }
    }

    /// Declare a number vector
    pub fn number<D: Into<String>, N: Into<String>>(device: D, name: N, elements: Vec<DefNumber>) -> Self {
        Self::new(device, name, DefElements::Number(elements))
    }

    /// Declare a text vector
    pub fn text<D: Into<String>, N: Into<String>>(device: D, name: N, elements: Vec<DefText>) -> Self {
        Self::new(device, name, DefElements::Text(elements))
    }

    /// Declare a switch vector
    pub fn switch<D: Into<String>, N: Into<String>>(
        device: D,
        name: N,
        rule: SwitchRule,
        elements: Vec<DefSwitch>,
    ) -> Self {
        Self::new(device, name, DefElements::Switch { rule, elements })
    }

    /// Declare a light vector
    pub fn light<D: Into<String>, N: Into<String>>(device: D, name: N, elements: Vec<DefLight>) -> Self {
        Self::new(device, name, DefElements::Light(elements))
    }

    /// Set the vector state
    pub fn with_state(mut self, state: PropertyState) -> Self {
        self.state = state;
        self
    }

    /// Set the client permission
    pub fn with_permission(mut self, permission: PropertyPermission) -> Self {
        self.permission = permission;
        self
    }

    /// Set the display group
    pub fn with_group<S: Into<String>>(mut self, group: S) -> Self {
        self.group = group.into();
        self
    }

    /// Value of a text element, if this is a text vector holding it
    pub fn text_value(&self, element: &str) -> Option<&str> {
        match &self.elements {
            DefElements::Text(elements) => elements
                .iter()
                .find(|e| e.name == element)
                .map(|e| e.value.as_str()),
            _ => None,
        }
    }

    /// Value of a switch element, if this is a switch vector holding it
    pub fn switch_value(&self, element: &str) -> Option<bool> {
        match &self.elements {
            DefElements::Switch { elements, .. } => elements
                .iter()
                .find(|e| e.name == element)
                .map(|e| e.value),
            _ => None,
        }
    }
}

/// Updates the state and values of a previously declared vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetVector {
    /// Device name
    pub device: String,
    /// Vector name
    pub name: String,
    /// New vector state, unchanged when absent
    #[serde(default)]
    pub state: Option<PropertyState>,
    /// Driver timestamp
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    /// Optional driver message
    #[serde(default)]
    pub message: Option<String>,
    /// Updated values
    pub elements: SetElements,
}

impl SetVector {
    fn new<D: Into<String>, N: Into<String>>(
        device: D,
        name: N,
        state: PropertyState,
        elements: SetElements,
    ) -> Self {
        Self {
            device: device.into(),
            name: name.into(),
            state: Some(state),
            timestamp: None,
            message: None,
            elements,
        }
    }

    /// Update number values
    pub fn number<D, N, S, I>(device: D, name: N, state: PropertyState, values: I) -> Self
    where
        D: Into<String>,
        N: Into<String>,
        S: Into<String>,
        I: IntoIterator<Item = (S, f64)>,
    {
        Self::new(device, name, state, SetElements::Number(elements(values)))
    }

    /// Update text values
    pub fn text<D, N, S, V, I>(device: D, name: N, state: PropertyState, values: I) -> Self
    where
        D: Into<String>,
        N: Into<String>,
        S: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (S, V)>,
    {
        let values = values.into_iter().map(|(n, v)| (n, v.into()));
        Self::new(device, name, state, SetElements::Text(elements(values)))
    }

    /// Update switch values
    pub fn switch<D, N, S, I>(device: D, name: N, state: PropertyState, values: I) -> Self
    where
        D: Into<String>,
        N: Into<String>,
        S: Into<String>,
        I: IntoIterator<Item = (S, bool)>,
    {
        Self::new(device, name, state, SetElements::Switch(elements(values)))
    }

    /// Update light values
    pub fn light<D, N, S, I>(device: D, name: N, state: PropertyState, values: I) -> Self
    where
        D: Into<String>,
        N: Into<String>,
        S: Into<String>,
        I: IntoIterator<Item = (S, PropertyState)>,
    {
        Self::new(device, name, state, SetElements::Light(elements(values)))
    }

    /// Value of a switch element carried by this message
    pub fn switch_value(&self, element: &str) -> Option<bool> {
        match &self.elements {
            SetElements::Switch(elements) => elements
                .iter()
                .find(|e| e.name == element)
                .map(|e| e.value),
            _ => None,
        }
    }
}

/// Removes one vector, or the whole device when `name` is empty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelProperty {
    /// Device name
    pub device: String,
    /// Vector name, empty for the whole device
    #[serde(default)]
    pub name: String,
    /// Driver timestamp
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    /// Optional driver message
    #[serde(default)]
    pub message: Option<String>,
}

impl DelProperty {
    /// Delete a single vector
    pub fn vector<D: Into<String>, N: Into<String>>(device: D, name: N) -> Self {
        Self {
            device: device.into(),
            name: name.into(),
            timestamp: None,
            message: None,
        }
    }

    /// Delete the whole device
    pub fn device<D: Into<String>>(device: D) -> Self {
        Self::vector(device, "")
    }

    /// Whether this removes the whole device
    pub fn is_whole_device(&self) -> bool {
        self.name.is_empty()
    }
}

/// Free-text message from a driver or the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMessage {
    /// Device name, empty for server-wide messages
    #[serde(default)]
    pub device: String,
    /// Driver timestamp
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    /// Message text
    pub message: String,
}

impl TextMessage {
    /// Create a text message stamped with the current time
    pub fn new<D: Into<String>, M: Into<String>>(device: D, message: M) -> Self {
        Self {
            device: device.into(),
            timestamp: Some(chrono::Utc::now()),
            message: message.into(),
        }
    }
}

/// A decoded inbound protocol message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    /// Vector declaration
    DefVector(DefVector),
    /// Vector update
    SetVector(SetVector),
    /// Vector or device removal
    DelProperty(DelProperty),
    /// Free-text message
    Message(TextMessage),
}

impl Message {
    /// Target device name
    pub fn device(&self) -> &str {
        match self {
            Message::DefVector(m) => &m.device,
            Message::SetVector(m) => &m.device,
            Message::DelProperty(m) => &m.device,
            Message::Message(m) => &m.device,
        }
    }

    /// Target vector name, if the message addresses a vector
    pub fn vector_name(&self) -> Option<&str> {
        match self {
            Message::DefVector(m) => Some(&m.name),
            Message::SetVector(m) => Some(&m.name),
            Message::DelProperty(m) => Some(&m.name),
            Message::Message(_) => None,
        }
    }

    /// Message type name, as used in the serialized `type` tag
    pub fn message_type(&self) -> &'static str {
        match self {
            Message::DefVector(_) => "defVector",
            Message::SetVector(_) => "setVector",
            Message::DelProperty(_) => "delProperty",
            Message::Message(_) => "message",
        }
    }
}

impl From<DefVector> for Message {
    fn from(m: DefVector) -> Self {
        Message::DefVector(m)
    }
}

impl From<SetVector> for Message {
    fn from(m: SetVector) -> Self {
        Message::SetVector(m)
    }
}

impl From<DelProperty> for Message {
    fn from(m: DelProperty) -> Self {
        Message::DelProperty(m)
    }
}

impl From<TextMessage> for Message {
    fn from(m: TextMessage) -> Self {
        Message::Message(m)
    }
}

/// A message sent from the client to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundMessage {
    /// Ask the server to (re)send property definitions
    GetProperties {
        /// Device name, all devices when absent
        device: Option<String>,
        /// Vector name, all vectors when absent
        property: Option<String>,
    },
    /// New number values
    NewNumberVector {
        /// Device name
        device: String,
        /// Vector name
        name: String,
        /// Values to set
        elements: Vec<Element<f64>>,
    },
    /// New text values
    NewTextVector {
        /// Device name
        device: String,
        /// Vector name
        name: String,
        /// Values to set
        elements: Vec<Element<String>>,
    },
    /// New switch values
    NewSwitchVector {
        /// Device name
        device: String,
        /// Vector name
        name: String,
        /// Values to set
        elements: Vec<Element<bool>>,
    },
}

impl OutboundMessage {
    /// Target device name, if any
    pub fn device(&self) -> Option<&str> {
        match self {
            OutboundMessage::GetProperties { device, .. } => device.as_deref(),
            OutboundMessage::NewNumberVector { device, .. }
            | OutboundMessage::NewTextVector { device, .. }
            | OutboundMessage::NewSwitchVector { device, .. } => Some(device),
        }
    }

    /// Target vector name, if any
    pub fn vector_name(&self) -> Option<&str> {
        match self {
            OutboundMessage::GetProperties { property, .. } => property.as_deref(),
            OutboundMessage::NewNumberVector { name, .. }
            | OutboundMessage::NewTextVector { name, .. }
            | OutboundMessage::NewSwitchVector { name, .. } => Some(name),
        }
    }
}
