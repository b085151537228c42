/*!
 * Rotator specialization. Angles are in degrees.
 */
use super::update;
use crate::device::{Device, DeviceError, DeviceKind, Result};
use crate::property::Vector;

/// Rotator state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RotatorState {
    /// Whether the rotator is moving
    pub moving: bool,
    /// Current angle
    pub angle: f64,
    /// Smallest angle
    pub min_angle: f64,
    /// Largest angle
    pub max_angle: f64,
    /// Whether the angle can be synced
    pub can_sync: bool,
    /// Whether motion can be aborted
    pub can_abort: bool,
    /// Whether the rotator can find home
    pub can_home: bool,
    /// Whether the direction can be reversed
    pub can_reverse: bool,
    /// Whether the direction is reversed
    pub reversed: bool,
}

/// A rotator state change
#[derive(Debug, Clone, PartialEq)]
pub enum RotatorChange {
    /// Angle limits changed
    AngleMinMax {
        /// Smallest angle
        min: f64,
        /// Largest angle
        max: f64,
    },
    /// Angle changed
    Angle(f64),
    /// Move started or stopped
    Moving(bool),
    /// Sync became available
    CanSync(bool),
    /// Abort became available
    CanAbort(bool),
    /// Home became available
    CanHome(bool),
    /// Reversal became available
    CanReverse(bool),
    /// Direction reversed or restored
    Reversed(bool),
}

pub(crate) fn on_vector(state: &mut RotatorState, vector: &Vector, defined: bool, changes: &mut Vec<RotatorChange>) {
    match vector.name() {
        "ABS_ROTATOR_ANGLE" => {
            let Some(angle) = vector.as_number().and_then(|v| v.get("ANGLE")) else {
                return;
            };
            if defined {
                let (min, max) = (angle.min(), angle.max());
                let changed = update(&mut state.min_angle, min) | update(&mut state.max_angle, max);
                if changed {
                    changes.push(RotatorChange::AngleMinMax { min, max });
                }
                // Drivers define the vector with 0 before reading the hardware
                if angle.value != 0.0 && update(&mut state.angle, angle.value) {
                    changes.push(RotatorChange::Angle(angle.value));
                }
            } else {
                if update(&mut state.angle, angle.value) {
                    changes.push(RotatorChange::Angle(angle.value));
                }
                let moving = vector.is_busy();
                if update(&mut state.moving, moving) {
                    changes.push(RotatorChange::Moving(moving));
                }
            }
        }
        "SYNC_ROTATOR_ANGLE" if defined => {
            let can_sync = vector.permission().is_writable();
            if update(&mut state.can_sync, can_sync) {
                changes.push(RotatorChange::CanSync(can_sync));
            }
        }
        "ROTATOR_ABORT_MOTION" if defined => {
            let can_abort = vector.permission().is_writable();
            if update(&mut state.can_abort, can_abort) {
                changes.push(RotatorChange::CanAbort(can_abort));
            }
        }
        "ROTATOR_HOME" if defined => {
            let can_home = vector.permission().is_writable();
            if update(&mut state.can_home, can_home) {
                changes.push(RotatorChange::CanHome(can_home));
            }
        }
        "ROTATOR_REVERSE" => {
            if defined {
                let can_reverse = vector.permission().is_writable();
                if update(&mut state.can_reverse, can_reverse) {
                    changes.push(RotatorChange::CanReverse(can_reverse));
                }
            }
            let reversed = vector.first_on() == Some("INDI_ENABLED");
            if update(&mut state.reversed, reversed) {
                changes.push(RotatorChange::Reversed(reversed));
            }
        }
        _ => {}
    }
}

impl Device {
    /// Rotator state snapshot, if this device is a rotator
    pub fn rotator(&self) -> Option<RotatorState> {
        self.read_state().kinds.rotator.clone()
    }

    fn rotator_state<T>(&self, f: impl FnOnce(&RotatorState) -> T) -> Result<T> {
        self.inspect(DeviceKind::Rotator, |inner| inner.kinds.rotator.as_ref().map(f))
    }

    fn check_angle(&self, angle: f64) -> Result<()> {
        let (min, max) = self.rotator_state(|r| (r.min_angle, r.max_angle))?;
        if max > min && !(min..=max).contains(&angle) {
            return Err(DeviceError::invalid_value(format!("angle {} outside {}..{}", angle, min, max)));
        }
        Ok(())
    }

    /// Rotate to an angle
    pub fn move_rotator_to(&self, angle: f64) -> Result<()> {
        self.check_angle(angle)?;
        self.send_new_number("ABS_ROTATOR_ANGLE", [("ANGLE", angle)])
    }

    /// Declare the current angle
    pub fn sync_rotator(&self, angle: f64) -> Result<()> {
        if !self.rotator_state(|r| r.can_sync)? {
            return Err(DeviceError::unsupported(self.name(), "sync"));
        }
        self.check_angle(angle)?;
        self.send_new_number("SYNC_ROTATOR_ANGLE", [("ANGLE", angle)])
    }

    /// Move to the home position
    pub fn home_rotator(&self) -> Result<()> {
        if !self.rotator_state(|r| r.can_home)? {
            return Err(DeviceError::unsupported(self.name(), "home"));
        }
        self.send_new_switch("ROTATOR_HOME", [("HOME", true)])
    }

    /// Reverse or restore the rotation direction
    pub fn reverse_rotator(&self, enable: bool) -> Result<()> {
        if !self.rotator_state(|r| r.can_reverse)? {
            return Err(DeviceError::unsupported(self.name(), "reverse"));
        }
        let element = if enable { "INDI_ENABLED" } else { "INDI_DISABLED" };
        self.send_new_switch("ROTATOR_REVERSE", [(element, true)])
    }

    /// Stop the rotator
    pub fn abort_rotator(&self) -> Result<()> {
        if !self.rotator_state(|r| r.can_abort)? {
            return Err(DeviceError::unsupported(self.name(), "abort"));
        }
        self.send_new_switch("ROTATOR_ABORT_MOTION", [("ABORT", true)])
    }
}
