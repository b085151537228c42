/*!
 * Property vector state.
 *
 * A device's state is a set of named property vectors, each an ordered map of
 * typed properties. Vectors are built from `Def` messages and updated in
 * place by `Set` messages; the set of properties is fixed at definition time.
 */
use std::fmt::Debug;

use indexmap::IndexMap;

use astroflow_core::types::Timestamp;

use crate::protocol::{
    DefElements, DefVector, Element, PropertyPermission, PropertyState, SetElements, SetVector,
    SwitchRule,
};

/// A value type that can be held by a property
pub trait PropertyValue: Clone + Debug + PartialEq + Send + Sync + 'static {
    /// Extra per-property data declared alongside the value
    type Meta: Clone + Debug + PartialEq + Default + Send + Sync + 'static;
}

/// Bounds and format declared for a number property
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NumberMeta {
    /// Minimum value
    pub min: f64,
    /// Maximum value
    pub max: f64,
    /// Step
    pub step: f64,
    /// printf-style format
    pub format: String,
}

impl PropertyValue for f64 {
    type Meta = NumberMeta;
}

impl PropertyValue for String {
    type Meta = ();
}

impl PropertyValue for bool {
    type Meta = ();
}

impl PropertyValue for PropertyState {
    type Meta = ();
}

/// A single named value of a vector
#[derive(Debug, Clone, PartialEq)]
pub struct Property<T: PropertyValue> {
    /// Property name
    pub name: String,
    /// Display label
    pub label: String,
    /// Current value
    pub value: T,
    /// Declared metadata
    pub meta: T::Meta,
}

impl Property<f64> {
    /// Declared minimum
    pub fn min(&self) -> f64 {
        self.meta.min
    }

    /// Declared maximum
    pub fn max(&self) -> f64 {
        self.meta.max
    }

    /// Declared step
    pub fn step(&self) -> f64 {
        self.meta.step
    }
}

/// An ordered, typed collection of properties
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyVector<T: PropertyValue> {
    /// Vector name
    pub name: String,
    /// Display label
    pub label: String,
    /// Display group
    pub group: String,
    /// Client permission
    pub permission: PropertyPermission,
    /// Current state
    pub state: PropertyState,
    /// Switch rule, switch vectors only
    pub rule: Option<SwitchRule>,
    /// Last driver timestamp
    pub timestamp: Option<Timestamp>,
    properties: IndexMap<String, Property<T>>,
}

impl<T: PropertyValue> PropertyVector<T> {
    fn from_def<I>(def: &DefVector, rule: Option<SwitchRule>, properties: I) -> Self
    where
        I: IntoIterator<Item = Property<T>>,
    {
        Self {
            name: def.name.clone(),
            label: def.label.clone(),
            group: def.group.clone(),
            permission: def.permission,
            state: def.state,
            rule,
            timestamp: def.timestamp,
            properties: properties
                .into_iter()
                .map(|p| (p.name.clone(), p))
                .collect(),
        }
    }

    /// Property by name
    pub fn get(&self, name: &str) -> Option<&Property<T>> {
        self.properties.get(name)
    }

    /// Value of a property by name
    pub fn value(&self, name: &str) -> Option<&T> {
        self.properties.get(name).map(|p| &p.value)
    }

    /// Whether a property with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Properties in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Property<T>> {
        self.properties.values()
    }

    /// Property names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether the vector has no properties
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Whether the vector is busy
    pub fn is_busy(&self) -> bool {
        self.state == PropertyState::Busy
    }

    /// Apply a `Set` payload: update the state and every known property.
    /// Unknown property names are ignored.
    fn update(&mut self, state: Option<PropertyState>, timestamp: Option<Timestamp>, values: &[Element<T>]) {
        if let Some(state) = state {
            self.state = state;
        }
        if timestamp.is_some() {
            self.timestamp = timestamp;
        }
        for element in values {
            if let Some(property) = self.properties.get_mut(&element.name) {
                property.value = element.value.clone();
            }
        }
    }
}

impl PropertyVector<bool> {
    /// Name of the first switch that is on
    pub fn first_on(&self) -> Option<&str> {
        self.iter().find(|p| p.value).map(|p| p.name.as_str())
    }
}

/// The kind of values a vector holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VectorType {
    /// Numbers
    Number,
    /// Text
    Text,
    /// Switches
    Switch,
    /// Lights
    Light,
}

/// A property vector of any type
#[derive(Debug, Clone, PartialEq)]
pub enum Vector {
    /// Number vector
    Number(PropertyVector<f64>),
    /// Text vector
    Text(PropertyVector<String>),
    /// Switch vector
    Switch(PropertyVector<bool>),
    /// Light vector
    Light(PropertyVector<PropertyState>),
}

macro_rules! on_vector {
    ($self:expr, $v:ident => $body:expr) => {
        match $self {
            Vector::Number($v) => $body,
            Vector::Text($v) => $body,
            Vector::Switch($v) => $body,
            Vector::Light($v) => $body,
        }
    };
}

impl Vector {
    /// Build a vector from its definition
    pub fn from_def(def: &DefVector) -> Self {
        match &def.elements {
            DefElements::Number(elements) => Vector::Number(PropertyVector::from_def(
                def,
                None,
                elements.iter().map(|e| Property {
                    name: e.name.clone(),
                    label: e.label.clone(),
                    value: e.value,
                    meta: NumberMeta {
                        min: e.min,
                        max: e.max,
                        step: e.step,
                        format: e.format.clone(),
                    },
                }),
            )),
            DefElements::Text(elements) => Vector::Text(PropertyVector::from_def(
                def,
                None,
                elements.iter().map(|e| Property {
                    name: e.name.clone(),
                    label: e.label.clone(),
                    value: e.value.clone(),
                    meta: (),
                }),
            )),
            DefElements::Switch { rule, elements } => Vector::Switch(PropertyVector::from_def(
                def,
                Some(*rule),
                elements.iter().map(|e| Property {
                    name: e.name.clone(),
                    label: e.label.clone(),
                    value: e.value,
                    meta: (),
                }),
            )),
            DefElements::Light(elements) => Vector::Light(PropertyVector::from_def(
                def,
                None,
                elements.iter().map(|e| Property {
                    name: e.name.clone(),
                    label: e.label.clone(),
                    value: e.value,
                    meta: (),
                }),
            )),
        }
    }

    /// Apply a `Set` message. Returns `false` without touching the vector
    /// when the message carries a different value type.
    pub fn apply_set(&mut self, set: &SetVector) -> bool {
        match (self, &set.elements) {
            (Vector::Number(v), SetElements::Number(values)) => v.update(set.state, set.timestamp, values),
            (Vector::Text(v), SetElements::Text(values)) => v.update(set.state, set.timestamp, values),
            (Vector::Switch(v), SetElements::Switch(values)) => v.update(set.state, set.timestamp, values),
            (Vector::Light(v), SetElements::Light(values)) => v.update(set.state, set.timestamp, values),
            _ => return false,
        }
        true
    }

    /// Vector name
    pub fn name(&self) -> &str {
        on_vector!(self, v => &v.name)
    }

    /// Display label
    pub fn label(&self) -> &str {
        on_vector!(self, v => &v.label)
    }

    /// Display group
    pub fn group(&self) -> &str {
        on_vector!(self, v => &v.group)
    }

    /// Current state
    pub fn state(&self) -> PropertyState {
        on_vector!(self, v => v.state)
    }

    /// Client permission
    pub fn permission(&self) -> PropertyPermission {
        on_vector!(self, v => v.permission)
    }

    /// Whether the vector is busy
    pub fn is_busy(&self) -> bool {
        self.state() == PropertyState::Busy
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        on_vector!(self, v => v.len())
    }

    /// Whether the vector has no properties
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value type of the vector
    pub fn vector_type(&self) -> VectorType {
        match self {
            Vector::Number(_) => VectorType::Number,
            Vector::Text(_) => VectorType::Text,
            Vector::Switch(_) => VectorType::Switch,
            Vector::Light(_) => VectorType::Light,
        }
    }

    /// The number vector, if this is one
    pub fn as_number(&self) -> Option<&PropertyVector<f64>> {
        match self {
            Vector::Number(v) => Some(v),
            _ => None,
        }
    }

    /// The text vector, if this is one
    pub fn as_text(&self) -> Option<&PropertyVector<String>> {
        match self {
            Vector::Text(v) => Some(v),
            _ => None,
        }
    }

    /// The switch vector, if this is one
    pub fn as_switch(&self) -> Option<&PropertyVector<bool>> {
        match self {
            Vector::Switch(v) => Some(v),
            _ => None,
        }
    }

    /// The light vector, if this is one
    pub fn as_light(&self) -> Option<&PropertyVector<PropertyState>> {
        match self {
            Vector::Light(v) => Some(v),
            _ => None,
        }
    }

    /// Value of a number property
    pub fn number(&self, element: &str) -> Option<f64> {
        self.as_number().and_then(|v| v.value(element)).copied()
    }

    /// Value of a text property
    pub fn text(&self, element: &str) -> Option<&str> {
        self.as_text()
            .and_then(|v| v.value(element))
            .map(String::as_str)
    }

    /// Value of a switch property
    pub fn switch(&self, element: &str) -> Option<bool> {
        self.as_switch().and_then(|v| v.value(element)).copied()
    }

    /// Name of the first switch that is on
    pub fn first_on(&self) -> Option<&str> {
        self.as_switch().and_then(|v| v.first_on())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{DefNumber, DefSwitch};

    fn frame_def() -> DefVector {
        DefVector::number(
            "CCD Simulator",
            "CCD_FRAME",
            vec![
                DefNumber::new("X", 0.0, 0.0, 1279.0, 1.0),
                DefNumber::new("WIDTH", 1280.0, 1.0, 1280.0, 1.0),
            ],
        )
    }

    #[test]
    fn test_from_def_preserves_order_and_bounds() {
        let vector = Vector::from_def(&frame_def());
        let numbers = vector.as_number().unwrap();

        assert_eq!(numbers.names().collect::<Vec<_>>(), vec!["X", "WIDTH"]);
        assert_eq!(numbers.get("WIDTH").unwrap().max(), 1280.0);
        assert_eq!(vector.vector_type(), VectorType::Number);
        assert_eq!(vector.state(), PropertyState::Idle);
    }

    #[test]
    fn test_apply_set_updates_known_properties_only() {
        let mut vector = Vector::from_def(&frame_def());
        let set = SetVector::number(
            "CCD Simulator",
            "CCD_FRAME",
            PropertyState::Ok,
            [("X", 10.0), ("BOGUS", 99.0)],
        );

        assert!(vector.apply_set(&set));
        assert_eq!(vector.number("X"), Some(10.0));
        assert_eq!(vector.number("BOGUS"), None);
        assert_eq!(vector.len(), 2);
        assert_eq!(vector.state(), PropertyState::Ok);
    }

    #[test]
    fn test_apply_set_with_wrong_type_is_rejected() {
        let mut vector = Vector::from_def(&frame_def());
        let before = vector.clone();
        let set = SetVector::switch("CCD Simulator", "CCD_FRAME", PropertyState::Busy, [("X", true)]);

        assert!(!vector.apply_set(&set));
        assert_eq!(vector, before);
    }

    #[test]
    fn test_first_on_switch() {
        let def = DefVector::switch(
            "Telescope Simulator",
            "TELESCOPE_PIER_SIDE",
            SwitchRule::AtMostOne,
            vec![DefSwitch::new("PIER_WEST", false), DefSwitch::new("PIER_EAST", true)],
        );
        let vector = Vector::from_def(&def);
        assert_eq!(vector.first_on(), Some("PIER_EAST"));
        assert_eq!(vector.as_switch().unwrap().rule, Some(SwitchRule::AtMostOne));
    }
}
