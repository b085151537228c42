/*!
 * Temperature sensor role, attached to cameras and focusers that report a
 * temperature.
 */
use super::update;
use crate::property::Vector;

/// Thermometer state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ThermometerState {
    /// Last reading, degrees Celsius
    pub temperature: f64,
}

/// A thermometer state change
#[derive(Debug, Clone, PartialEq)]
pub enum ThermometerChange {
    /// New reading
    TemperatureChanged(f64),
}

pub(crate) fn on_vector(
    state: &mut ThermometerState,
    vector: &Vector,
    _defined: bool,
    changes: &mut Vec<ThermometerChange>,
) {
    let reading = match vector.name() {
        "CCD_TEMPERATURE" => vector.number("CCD_TEMPERATURE_VALUE"),
        "FOCUS_TEMPERATURE" => vector.number("TEMPERATURE"),
        _ => None,
    };
    if let Some(temperature) = reading {
        if update(&mut state.temperature, temperature) {
            changes.push(ThermometerChange::TemperatureChanged(temperature));
        }
    }
}

impl crate::device::Device {
    /// Thermometer state snapshot, if this device reports a temperature
    pub fn thermometer(&self) -> Option<ThermometerState> {
        self.read_state().kinds.thermometer.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::tests::connected_device;
    use crate::device::{Attachment, DeviceKind};
    use crate::devices::{CameraState, KindState};
    use crate::event::DeviceEvent;
    use crate::protocol::{DefNumber, DefVector, PropertyState, SetVector};

    #[test]
    fn test_camera_temperature_attaches_thermometer() {
        let (device, _rx) = connected_device("CCD Simulator", KindState::Camera(CameraState::default()));
        let events = device.apply_def(&DefVector::number(
            "CCD Simulator",
            "CCD_TEMPERATURE",
            vec![DefNumber::new("CCD_TEMPERATURE_VALUE", 20.0, -50.0, 50.0, 0.0)],
        ));

        assert!(matches!(
            events[0],
            DeviceEvent::Attached {
                kind: DeviceKind::Thermometer,
                ..
            }
        ));
        assert_eq!(device.attachment(DeviceKind::Thermometer), Some(Attachment::Secondary));
        assert!(device.camera().unwrap().has_cooler);

        let cooling = SetVector::number(
            "CCD Simulator",
            "CCD_TEMPERATURE",
            PropertyState::Busy,
            [("CCD_TEMPERATURE_VALUE", 15.5)],
        );
        let events = device.apply_set(&cooling);
        assert!(events.iter().any(|e| matches!(
            e,
            DeviceEvent::Thermometer {
                change: ThermometerChange::TemperatureChanged(t),
                ..
            } if *t == 15.5
        )));
        assert_eq!(device.thermometer().unwrap().temperature, 15.5);

        // Redefining the vector keeps the role without a second attachment
        let events = device.apply_def(&DefVector::number(
            "CCD Simulator",
            "CCD_TEMPERATURE",
            vec![DefNumber::new("CCD_TEMPERATURE_VALUE", 15.5, -50.0, 50.0, 0.0)],
        ));
        assert!(!events.iter().any(|e| matches!(e, DeviceEvent::Attached { .. })));
        assert_eq!(device.attachment(DeviceKind::Thermometer), Some(Attachment::Secondary));
        assert_eq!(device.roles().iter().filter(|k| **k == DeviceKind::Thermometer).count(), 1);
    }
}
