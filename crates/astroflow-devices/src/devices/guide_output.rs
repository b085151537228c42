/*!
 * Pulse guide output.
 *
 * Held as a primary kind by drivers with the `GUIDER` bit and attached as a
 * secondary role by any device that defines the timed-guide vectors.
 */
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::update;
use crate::device::{Device, DeviceKind, Result};
use crate::property::Vector;

/// Direction of a guide pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GuideDirection {
    /// North
    North,
    /// South
    South,
    /// East
    East,
    /// West
    West,
}

impl GuideDirection {
    /// Vector and element carrying a pulse in this direction
    pub fn element(&self) -> (&'static str, &'static str) {
        match self {
            GuideDirection::North => ("TELESCOPE_TIMED_GUIDE_NS", "TIMED_GUIDE_N"),
            GuideDirection::South => ("TELESCOPE_TIMED_GUIDE_NS", "TIMED_GUIDE_S"),
            GuideDirection::East => ("TELESCOPE_TIMED_GUIDE_WE", "TIMED_GUIDE_E"),
            GuideDirection::West => ("TELESCOPE_TIMED_GUIDE_WE", "TIMED_GUIDE_W"),
        }
    }
}

/// Guide output state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GuideOutputState {
    /// Whether a pulse is in progress on either axis
    pub pulsing: bool,
    ns_busy: bool,
    we_busy: bool,
}

/// A guide output state change
#[derive(Debug, Clone, PartialEq)]
pub enum GuideOutputChange {
    /// A pulse started or ended
    PulsingChanged(bool),
}

pub(crate) fn on_vector(
    state: &mut GuideOutputState,
    vector: &Vector,
    _defined: bool,
    changes: &mut Vec<GuideOutputChange>,
) {
    match vector.name() {
        "TELESCOPE_TIMED_GUIDE_NS" => state.ns_busy = vector.is_busy(),
        "TELESCOPE_TIMED_GUIDE_WE" => state.we_busy = vector.is_busy(),
        _ => return,
    }
    let pulsing = state.ns_busy || state.we_busy;
    if update(&mut state.pulsing, pulsing) {
        changes.push(GuideOutputChange::PulsingChanged(pulsing));
    }
}

impl Device {
    /// Guide output state snapshot, if this device can pulse guide
    pub fn guide_output(&self) -> Option<GuideOutputState> {
        self.read_state().kinds.guide_output.clone()
    }

    /// Send a guide pulse
    pub fn pulse_guide(&self, direction: GuideDirection, duration: Duration) -> Result<()> {
        self.inspect(DeviceKind::GuideOutput, |inner| inner.kinds.guide_output.as_ref().map(|_| ()))?;
        let (vector, element) = direction.element();
        self.send_new_number(vector, [(element, duration.as_millis() as f64)])
    }

    /// Pulse north
    pub fn guide_north(&self, duration: Duration) -> Result<()> {
        self.pulse_guide(GuideDirection::North, duration)
    }

    /// Pulse south
    pub fn guide_south(&self, duration: Duration) -> Result<()> {
        self.pulse_guide(GuideDirection::South, duration)
    }

    /// Pulse east
    pub fn guide_east(&self, duration: Duration) -> Result<()> {
        self.pulse_guide(GuideDirection::East, duration)
    }

    /// Pulse west
    pub fn guide_west(&self, duration: Duration) -> Result<()> {
        self.pulse_guide(GuideDirection::West, duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::tests::connected_device;
    use crate::device::DeviceError;
    use crate::devices::KindState;
    use crate::event::DeviceEvent;
    use crate::protocol::{DefNumber, DefVector, OutboundMessage, PropertyState, SetVector};

    const GUIDER: &str = "Guide Simulator";

    fn guide_defs() -> [DefVector; 2] {
        [
            DefVector::number(
                GUIDER,
                "TELESCOPE_TIMED_GUIDE_NS",
                vec![
                    DefNumber::new("TIMED_GUIDE_N", 0.0, 0.0, 60000.0, 1.0),
                    DefNumber::new("TIMED_GUIDE_S", 0.0, 0.0, 60000.0, 1.0),
                ],
            ),
            DefVector::number(
                GUIDER,
                "TELESCOPE_TIMED_GUIDE_WE",
                vec![
                    DefNumber::new("TIMED_GUIDE_W", 0.0, 0.0, 60000.0, 1.0),
                    DefNumber::new("TIMED_GUIDE_E", 0.0, 0.0, 60000.0, 1.0),
                ],
            ),
        ]
    }

    #[test]
    fn test_pulsing_across_axes() {
        let (device, _rx) = connected_device(GUIDER, KindState::GuideOutput(GuideOutputState::default()));
        for def in guide_defs() {
            device.apply_def(&def);
        }

        let pulse = |name: &str, state| SetVector::number(GUIDER, name, state, [("TIMED_GUIDE_N", 0.0)]);
        let pulsing = |events: Vec<DeviceEvent>| {
            events
                .into_iter()
                .filter_map(|e| match e {
                    DeviceEvent::GuideOutput { change, .. } => Some(change),
                    _ => None,
                })
                .collect::<Vec<_>>()
        };

        assert_eq!(
            pulsing(device.apply_set(&pulse("TELESCOPE_TIMED_GUIDE_NS", PropertyState::Busy))),
            vec![GuideOutputChange::PulsingChanged(true)]
        );
        assert!(pulsing(device.apply_set(&pulse("TELESCOPE_TIMED_GUIDE_WE", PropertyState::Busy))).is_empty());
        assert!(pulsing(device.apply_set(&pulse("TELESCOPE_TIMED_GUIDE_NS", PropertyState::Ok))).is_empty());
        assert_eq!(
            pulsing(device.apply_set(&pulse("TELESCOPE_TIMED_GUIDE_WE", PropertyState::Ok))),
            vec![GuideOutputChange::PulsingChanged(false)]
        );
    }

    #[test]
    fn test_pulse_in_milliseconds() {
        let (device, mut rx) = connected_device(GUIDER, KindState::GuideOutput(GuideOutputState::default()));
        device.guide_west(Duration::from_millis(750)).unwrap();
        match rx.try_recv().unwrap() {
            OutboundMessage::NewNumberVector { name, elements, .. } => {
                assert_eq!(name, "TELESCOPE_TIMED_GUIDE_WE");
                assert_eq!(elements[0].name, "TIMED_GUIDE_W");
                assert_eq!(elements[0].value, 750.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_pulse_requires_role() {
        let (device, _rx) = connected_device("Focuser Simulator", KindState::default_for(DeviceKind::Focuser));
        assert!(matches!(
            device.guide_north(Duration::from_millis(100)),
            Err(DeviceError::Unsupported { .. })
        ));
    }
}
