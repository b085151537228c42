/*!
 * Focuser specialization.
 */
use super::update;
use crate::device::{Device, DeviceError, DeviceKind, Result};
use crate::property::{PropertyVector, Vector};
use crate::protocol::PropertyState;

/// Focuser state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FocuserState {
    /// Whether the focuser is moving
    pub moving: bool,
    /// Absolute position, in steps
    pub position: i32,
    /// Whether absolute moves are supported
    pub can_absolute_move: bool,
    /// Whether relative moves are supported
    pub can_relative_move: bool,
    /// Whether motion can be aborted
    pub can_abort: bool,
    /// Whether the direction can be reversed
    pub can_reverse: bool,
    /// Whether the direction is reversed
    pub reversed: bool,
    /// Whether the position can be synced
    pub can_sync: bool,
    /// Largest absolute position
    pub max_position: i32,
    /// Largest relative move, in steps
    pub max_step: i32,
}

/// A focuser state change
#[derive(Debug, Clone, PartialEq)]
pub enum FocuserChange {
    /// Absolute moves became available
    CanAbsoluteMove(bool),
    /// Relative moves became available
    CanRelativeMove(bool),
    /// Abort became available
    CanAbort(bool),
    /// Reversal became available
    CanReverse(bool),
    /// Direction reversed or restored
    Reversed(bool),
    /// Sync became available
    CanSync(bool),
    /// Largest absolute position changed
    MaxPosition(i32),
    /// Largest relative move changed
    MaxStep(i32),
    /// Move started or stopped
    Moving(bool),
    /// A move ended in error
    MoveFailed,
    /// Position changed
    Position(i32),
}

pub(crate) fn on_vector(state: &mut FocuserState, vector: &Vector, defined: bool, changes: &mut Vec<FocuserChange>) {
    match vector {
        Vector::Switch(v) => on_switch(state, v, defined, changes),
        Vector::Number(v) => on_number(state, v, defined, changes),
        _ => {}
    }
}

fn on_switch(state: &mut FocuserState, v: &PropertyVector<bool>, defined: bool, changes: &mut Vec<FocuserChange>) {
    match v.name.as_str() {
        "FOCUS_ABORT_MOTION" if defined => {
            let can_abort = v.permission.is_writable();
            if update(&mut state.can_abort, can_abort) {
                changes.push(FocuserChange::CanAbort(can_abort));
            }
        }
        "FOCUS_REVERSE_MOTION" => {
            if defined {
                let can_reverse = v.permission.is_writable();
                if update(&mut state.can_reverse, can_reverse) {
                    changes.push(FocuserChange::CanReverse(can_reverse));
                }
            }
            let reversed = v.first_on() == Some("INDI_ENABLED");
            if update(&mut state.reversed, reversed) {
                changes.push(FocuserChange::Reversed(reversed));
            }
        }
        _ => {}
    }
}

fn on_number(state: &mut FocuserState, v: &PropertyVector<f64>, defined: bool, changes: &mut Vec<FocuserChange>) {
    match v.name.as_str() {
        "FOCUS_SYNC" if defined => {
            let can_sync = v.permission.is_writable();
            if update(&mut state.can_sync, can_sync) {
                changes.push(FocuserChange::CanSync(can_sync));
            }
        }
        "REL_FOCUS_POSITION" => {
            if defined {
                let writable = v.permission.is_writable();
                if update(&mut state.can_relative_move, writable) {
                    changes.push(FocuserChange::CanRelativeMove(writable));
                }
                if let Some(element) = v.get("FOCUS_RELATIVE_POSITION") {
                    let max = element.max() as i32;
                    if update(&mut state.max_step, max) {
                        changes.push(FocuserChange::MaxStep(max));
                    }
                }
            }
            if v.state == PropertyState::Alert {
                changes.push(FocuserChange::MoveFailed);
            }
            set_moving(state, v.is_busy(), changes);
        }
        "ABS_FOCUS_POSITION" => {
            if defined {
                let writable = v.permission.is_writable();
                if update(&mut state.can_absolute_move, writable) {
                    changes.push(FocuserChange::CanAbsoluteMove(writable));
                }
                if let Some(element) = v.get("FOCUS_ABSOLUTE_POSITION") {
                    let max = element.max() as i32;
                    if update(&mut state.max_position, max) {
                        changes.push(FocuserChange::MaxPosition(max));
                    }
                }
            }
            if let Some(position) = v.value("FOCUS_ABSOLUTE_POSITION") {
                let position = *position as i32;
                if update(&mut state.position, position) {
                    changes.push(FocuserChange::Position(position));
                }
            }
            set_moving(state, v.is_busy(), changes);
        }
        _ => {}
    }
}

fn set_moving(state: &mut FocuserState, moving: bool, changes: &mut Vec<FocuserChange>) {
    if update(&mut state.moving, moving) {
        changes.push(FocuserChange::Moving(moving));
    }
}

impl Device {
    /// Focuser state snapshot, if this device is a focuser
    pub fn focuser(&self) -> Option<FocuserState> {
        self.read_state().kinds.focuser.clone()
    }

    fn focuser_state<T>(&self, f: impl FnOnce(&FocuserState) -> T) -> Result<T> {
        self.inspect(DeviceKind::Focuser, |inner| inner.kinds.focuser.as_ref().map(f))
    }

    fn move_relative(&self, direction: &str, steps: u32) -> Result<()> {
        let (can_move, max) = self.focuser_state(|f| (f.can_relative_move, f.max_step))?;
        if !can_move {
            return Err(DeviceError::unsupported(self.name(), "relative move"));
        }
        if max > 0 && steps as i64 > max as i64 {
            return Err(DeviceError::invalid_value(format!("{} steps exceeds {}", steps, max)));
        }
        self.send_new_switch("FOCUS_MOTION", [(direction, true)])?;
        self.send_new_number("REL_FOCUS_POSITION", [("FOCUS_RELATIVE_POSITION", steps as f64)])
    }

    /// Move inward by a number of steps
    pub fn move_focuser_in(&self, steps: u32) -> Result<()> {
        self.move_relative("FOCUS_INWARD", steps)
    }

    /// Move outward by a number of steps
    pub fn move_focuser_out(&self, steps: u32) -> Result<()> {
        self.move_relative("FOCUS_OUTWARD", steps)
    }

    /// Move to an absolute position
    pub fn move_focuser_to(&self, position: u32) -> Result<()> {
        let (can_move, max) = self.focuser_state(|f| (f.can_absolute_move, f.max_position))?;
        if !can_move {
            return Err(DeviceError::unsupported(self.name(), "absolute move"));
        }
        if max > 0 && position as i64 > max as i64 {
            return Err(DeviceError::invalid_value(format!("position {} exceeds {}", position, max)));
        }
        self.send_new_number("ABS_FOCUS_POSITION", [("FOCUS_ABSOLUTE_POSITION", position as f64)])
    }

    /// Stop the focuser
    pub fn abort_focuser(&self) -> Result<()> {
        if !self.focuser_state(|f| f.can_abort)? {
            return Err(DeviceError::unsupported(self.name(), "abort"));
        }
        self.send_new_switch("FOCUS_ABORT_MOTION", [("ABORT", true)])
    }

    /// Reverse or restore the motion direction
    pub fn reverse_focuser(&self, enable: bool) -> Result<()> {
        if !self.focuser_state(|f| f.can_reverse)? {
            return Err(DeviceError::unsupported(self.name(), "reverse"));
        }
        let element = if enable { "INDI_ENABLED" } else { "INDI_DISABLED" };
        self.send_new_switch("FOCUS_REVERSE_MOTION", [(element, true)])
    }

    /// Declare the current position
    pub fn sync_focuser(&self, position: u32) -> Result<()> {
        if !self.focuser_state(|f| f.can_sync)? {
            return Err(DeviceError::unsupported(self.name(), "sync"));
        }
        self.send_new_number("FOCUS_SYNC", [("FOCUS_SYNC_VALUE", position as f64)])
    }
}
