/*!
 * Device kind specializations.
 *
 * Each module tracks the kind-specific state derived from a device's
 * property vectors, reports changes to it and provides the kind's commands
 * as methods on [`Device`].
 */
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

use crate::device::{Device, DeviceKind};
use crate::event::DeviceEvent;
use crate::property::Vector;

pub mod camera;
pub mod filter_wheel;
pub mod focuser;
pub mod gps;
pub mod guide_output;
pub mod mount;
pub mod rotator;
pub mod thermometer;

pub use camera::{CameraChange, CameraProfile, CameraState, Cfa, Frame, FrameBounds, FrameType};
pub use filter_wheel::{FilterWheelChange, FilterWheelState};
pub use focuser::{FocuserChange, FocuserState};
pub use gps::{GpsChange, GpsState};
pub use guide_output::{GuideDirection, GuideOutputChange, GuideOutputState};
pub use mount::{MountChange, MountProfile, MountState, MountType, PierSide, SlewRate, TrackMode};
pub use rotator::{RotatorChange, RotatorState};
pub use thermometer::{ThermometerChange, ThermometerState};

/// Kind gained by defining `vector`, independent of the capability bitmask
pub(crate) fn secondary_role(vector: &str) -> Option<DeviceKind> {
    match vector {
        "CCD_TEMPERATURE" | "FOCUS_TEMPERATURE" => Some(DeviceKind::Thermometer),
        "TELESCOPE_TIMED_GUIDE_NS" | "TELESCOPE_TIMED_GUIDE_WE" => Some(DeviceKind::GuideOutput),
        _ => None,
    }
}

/// Store `value` in `field`, returning whether it changed
pub(crate) fn update<T: PartialEq>(field: &mut T, value: T) -> bool {
    if *field == value {
        false
    } else {
        *field = value;
        true
    }
}

/// Parse an INDI `UTC` text plus an `OFFSET` in decimal hours
pub(crate) fn parse_time(utc: &str, offset: &str) -> Option<DateTime<FixedOffset>> {
    let utc = utc.trim().trim_end_matches('Z');
    let naive = NaiveDateTime::parse_from_str(utc, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(utc, "%Y-%m-%dT%H:%M:%S"))
        .ok()?;
    let hours: f64 = offset.trim().parse().unwrap_or(0.0);
    let offset = FixedOffset::east_opt((hours * 3600.0).round() as i32)?;
    Some(Utc.from_utc_datetime(&naive).with_timezone(&offset))
}

/// Format a time as INDI `UTC` and `OFFSET` text values
pub(crate) fn format_time(time: &DateTime<FixedOffset>) -> (String, String) {
    let utc = time.with_timezone(&Utc).format("%Y-%m-%dT%H:%M:%S").to_string();
    let hours = time.offset().local_minus_utc() as f64 / 3600.0;
    (utc, format!("{:.2}", hours))
}

/// Initial state of one kind
#[derive(Debug, Clone, PartialEq)]
pub enum KindState {
    /// Camera state
    Camera(CameraState),
    /// Mount state
    Mount(MountState),
    /// Focuser state
    Focuser(FocuserState),
    /// Filter wheel state
    FilterWheel(FilterWheelState),
    /// Rotator state
    Rotator(RotatorState),
    /// GPS state
    Gps(GpsState),
    /// Guide output state
    GuideOutput(GuideOutputState),
    /// Thermometer state
    Thermometer(ThermometerState),
}

impl KindState {
    /// The kind this state belongs to
    pub fn kind(&self) -> DeviceKind {
        match self {
            KindState::Camera(_) => DeviceKind::Camera,
            KindState::Mount(_) => DeviceKind::Mount,
            KindState::Focuser(_) => DeviceKind::Focuser,
            KindState::FilterWheel(_) => DeviceKind::FilterWheel,
            KindState::Rotator(_) => DeviceKind::Rotator,
            KindState::Gps(_) => DeviceKind::Gps,
            KindState::GuideOutput(_) => DeviceKind::GuideOutput,
            KindState::Thermometer(_) => DeviceKind::Thermometer,
        }
    }

    /// Generic state for a kind
    pub fn default_for(kind: DeviceKind) -> Self {
        match kind {
            DeviceKind::Camera => KindState::Camera(CameraState::default()),
            DeviceKind::Mount => KindState::Mount(MountState::default()),
            DeviceKind::Focuser => KindState::Focuser(FocuserState::default()),
            DeviceKind::FilterWheel => KindState::FilterWheel(FilterWheelState::default()),
            DeviceKind::Rotator => KindState::Rotator(RotatorState::default()),
            DeviceKind::Gps => KindState::Gps(GpsState::default()),
            DeviceKind::GuideOutput => KindState::GuideOutput(GuideOutputState::default()),
            DeviceKind::Thermometer => KindState::Thermometer(ThermometerState::default()),
        }
    }
}

/// Per-kind state of one device; `None` for kinds it does not hold
#[derive(Debug, Default)]
pub(crate) struct KindStates {
    pub(crate) camera: Option<CameraState>,
    pub(crate) mount: Option<MountState>,
    pub(crate) focuser: Option<FocuserState>,
    pub(crate) filter_wheel: Option<FilterWheelState>,
    pub(crate) rotator: Option<RotatorState>,
    pub(crate) gps: Option<GpsState>,
    pub(crate) guide_output: Option<GuideOutputState>,
    pub(crate) thermometer: Option<ThermometerState>,
}

macro_rules! dispatch {
    ($states:ident, $device:ident, $vector:ident, $defined:ident, $events:ident;
     $($field:ident => $module:ident::$variant:ident),* $(,)?) => {
        $(
            if let Some(state) = $states.$field.as_mut() {
                let mut changes = Vec::new();
                $module::on_vector(state, $vector, $defined, &mut changes);
                $events.extend(changes.into_iter().map(|change| DeviceEvent::$variant {
                    device: $device.clone(),
                    change,
                }));
            }
        )*
    };
}

impl KindStates {
    pub(crate) fn insert(&mut self, state: KindState) {
        match state {
            KindState::Camera(s) => self.camera = Some(s),
            KindState::Mount(s) => self.mount = Some(s),
            KindState::Focuser(s) => self.focuser = Some(s),
            KindState::FilterWheel(s) => self.filter_wheel = Some(s),
            KindState::Rotator(s) => self.rotator = Some(s),
            KindState::Gps(s) => self.gps = Some(s),
            KindState::GuideOutput(s) => self.guide_output = Some(s),
            KindState::Thermometer(s) => self.thermometer = Some(s),
        }
    }

    /// Run every held kind's handler on a merged vector
    pub(crate) fn on_vector(
        &mut self,
        device: &Arc<Device>,
        vector: &Vector,
        defined: bool,
        events: &mut Vec<DeviceEvent>,
    ) {
        let states = self;
        dispatch!(states, device, vector, defined, events;
            camera => camera::Camera,
            mount => mount::Mount,
            focuser => focuser::Focuser,
            filter_wheel => filter_wheel::FilterWheel,
            rotator => rotator::Rotator,
            gps => gps::Gps,
            guide_output => guide_output::GuideOutput,
            thermometer => thermometer::Thermometer,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_secondary_roles() {
        assert_eq!(secondary_role("CCD_TEMPERATURE"), Some(DeviceKind::Thermometer));
        assert_eq!(secondary_role("TELESCOPE_TIMED_GUIDE_WE"), Some(DeviceKind::GuideOutput));
        assert_eq!(secondary_role("CCD_EXPOSURE"), None);
    }

    #[test]
    fn test_parse_time_with_offset() {
        let time = parse_time("2023-05-01T22:30:00", "-3").unwrap();
        assert_eq!(time.offset().local_minus_utc(), -3 * 3600);
        assert_eq!(time.with_timezone(&Utc).hour(), 22);
        assert_eq!(time.day(), 1);
        assert_eq!(time.hour(), 19);

        assert!(parse_time("2023-05-01T22:30:00.250", "0").is_some());
        assert!(parse_time("yesterday", "0").is_none());
    }

    #[test]
    fn test_format_time() {
        let time = parse_time("2023-05-01T22:30:00", "5.5").unwrap();
        let (utc, offset) = format_time(&time);
        assert_eq!(utc, "2023-05-01T22:30:00");
        assert_eq!(offset, "5.50");
    }

    #[test]
    fn test_update_reports_change() {
        let mut value = 1;
        assert!(!update(&mut value, 1));
        assert!(update(&mut value, 2));
        assert_eq!(value, 2);
    }
}
