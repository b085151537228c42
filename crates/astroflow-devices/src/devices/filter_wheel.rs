/*!
 * Filter wheel specialization.
 *
 * Slots are numbered from 1, as in `FILTER_SLOT`.
 */
use super::update;
use crate::device::{Device, DeviceError, DeviceKind, Result};
use crate::property::Vector;

/// Filter wheel state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterWheelState {
    /// Number of slots
    pub count: u32,
    /// Current slot, 1-based; 0 before the first report
    pub position: u32,
    /// Whether the wheel is moving
    pub moving: bool,
    /// Slot names, in slot order
    pub names: Vec<String>,
    /// `FILTER_NAME` element of each slot
    slot_elements: Vec<String>,
}

/// A filter wheel state change
#[derive(Debug, Clone, PartialEq)]
pub enum FilterWheelChange {
    /// Slot count changed
    Count(u32),
    /// Current slot changed
    Position(u32),
    /// Move started or stopped
    Moving(bool),
    /// Slot names changed
    Names(Vec<String>),
}

pub(crate) fn on_vector(
    state: &mut FilterWheelState,
    vector: &Vector,
    defined: bool,
    changes: &mut Vec<FilterWheelChange>,
) {
    match vector {
        Vector::Number(v) if v.name == "FILTER_SLOT" => {
            let Some(slot) = v.get("FILTER_SLOT_VALUE") else {
                return;
            };
            if defined {
                let count = slot.max().max(0.0) as u32;
                if update(&mut state.count, count) {
                    changes.push(FilterWheelChange::Count(count));
                }
            }
            let position = slot.value.max(0.0) as u32;
            if update(&mut state.position, position) {
                changes.push(FilterWheelChange::Position(position));
            }
            let moving = v.is_busy();
            if update(&mut state.moving, moving) {
                changes.push(FilterWheelChange::Moving(moving));
            }
        }
        Vector::Text(v) if v.name == "FILTER_NAME" => {
            state.slot_elements = v.names().map(str::to_string).collect();
            let names: Vec<String> = v.iter().map(|p| p.value.clone()).collect();
            if update(&mut state.names, names.clone()) {
                changes.push(FilterWheelChange::Names(names));
            }
        }
        _ => {}
    }
}

impl Device {
    /// Filter wheel state snapshot, if this device is a filter wheel
    pub fn filter_wheel(&self) -> Option<FilterWheelState> {
        self.read_state().kinds.filter_wheel.clone()
    }

    fn filter_wheel_state<T>(&self, f: impl FnOnce(&FilterWheelState) -> T) -> Result<T> {
        self.inspect(DeviceKind::FilterWheel, |inner| inner.kinds.filter_wheel.as_ref().map(f))
    }

    /// Move to a slot, 1-based
    pub fn move_filter_wheel_to(&self, slot: u32) -> Result<()> {
        let count = self.filter_wheel_state(|w| w.count)?;
        if slot == 0 || slot > count {
            return Err(DeviceError::invalid_value(format!("slot {} outside 1..={}", slot, count)));
        }
        self.send_new_number("FILTER_SLOT", [("FILTER_SLOT_VALUE", slot as f64)])
    }

    /// Rename a slot, 1-based
    pub fn set_filter_name(&self, slot: u32, name: &str) -> Result<()> {
        let element = self.filter_wheel_state(|w| {
            slot.checked_sub(1)
                .and_then(|index| w.slot_elements.get(index as usize))
                .cloned()
        })?;
        let element = element.ok_or_else(|| DeviceError::invalid_value(format!("no name element for slot {}", slot)))?;
        self.send_new_text("FILTER_NAME", [(element, name)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::tests::connected_device;
    use crate::devices::KindState;
    use crate::event::DeviceEvent;
    use crate::protocol::{DefNumber, DefText, DefVector, OutboundMessage, PropertyState, SetVector};

    const WHEEL: &str = "Filter Simulator";

    fn wheel_changes(events: &[DeviceEvent]) -> Vec<FilterWheelChange> {
        events
            .iter()
            .filter_map(|e| match e {
                DeviceEvent::FilterWheel { change, .. } => Some(change.clone()),
                _ => None,
            })
            .collect()
    }

    fn wheel() -> (std::sync::Arc<Device>, tokio::sync::mpsc::UnboundedReceiver<OutboundMessage>) {
        let (device, rx) = connected_device(WHEEL, KindState::FilterWheel(FilterWheelState::default()));
        device.apply_def(&DefVector::number(
            WHEEL,
            "FILTER_SLOT",
            vec![DefNumber::new("FILTER_SLOT_VALUE", 1.0, 1.0, 5.0, 1.0)],
        ));
        device.apply_def(&DefVector::text(
            WHEEL,
            "FILTER_NAME",
            vec![
                DefText::new("FILTER_SLOT_NAME_1", "Red"),
                DefText::new("FILTER_SLOT_NAME_2", "Green"),
                DefText::new("FILTER_SLOT_NAME_3", "Blue"),
                DefText::new("FILTER_SLOT_NAME_4", "Luminance"),
                DefText::new("FILTER_SLOT_NAME_5", "H-Alpha"),
            ],
        ));
        (device, rx)
    }

    #[test]
    fn test_slot_and_names() {
        let (device, _rx) = wheel();
        let state = device.filter_wheel().unwrap();
        assert_eq!(state.count, 5);
        assert_eq!(state.position, 1);
        assert_eq!(state.names[4], "H-Alpha");

        let moving = SetVector::number(WHEEL, "FILTER_SLOT", PropertyState::Busy, [("FILTER_SLOT_VALUE", 3.0)]);
        let changes = wheel_changes(&device.apply_set(&moving));
        assert_eq!(changes, vec![FilterWheelChange::Position(3), FilterWheelChange::Moving(true)]);
    }

    #[test]
    fn test_move_validates_slot() {
        let (device, mut rx) = wheel();
        assert!(matches!(device.move_filter_wheel_to(0), Err(DeviceError::InvalidValue(_))));
        assert!(matches!(device.move_filter_wheel_to(6), Err(DeviceError::InvalidValue(_))));

        device.move_filter_wheel_to(5).unwrap();
        match rx.try_recv().unwrap() {
            OutboundMessage::NewNumberVector { elements, .. } => assert_eq!(elements[0].value, 5.0),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_rename_slot() {
        let (device, mut rx) = wheel();
        device.set_filter_name(2, "OIII").unwrap();
        match rx.try_recv().unwrap() {
            OutboundMessage::NewTextVector { elements, .. } => {
                assert_eq!(elements[0].name, "FILTER_SLOT_NAME_2");
                assert_eq!(elements[0].value, "OIII");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(device.set_filter_name(9, "SII"), Err(DeviceError::InvalidValue(_))));
    }
}
