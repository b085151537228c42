/*!
 * Mount specialization.
 *
 * Follows slewing, tracking, parking and the reported position, and
 * exposes the standard `TELESCOPE_*` commands. Coordinates are in the
 * epoch of date: right ascension in hours, declination in degrees.
 */
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::{format_time, parse_time, update};
use crate::device::{Device, DeviceError, DeviceKind, Result};
use crate::property::{PropertyVector, Vector};
use crate::protocol::PropertyState;

/// Driver family of a mount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MountProfile {
    /// Standard INDI telescope vectors
    #[default]
    Generic,
    /// iOptron v3 protocol, separate RA and DEC guide rates
    IoptronV3,
}

/// A named slew rate offered by the driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlewRate {
    /// Switch name
    pub name: String,
    /// Display label
    pub label: String,
}

/// Tracking rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackMode {
    /// Sidereal rate
    Sidereal,
    /// Solar rate
    Solar,
    /// Lunar rate
    Lunar,
    /// King rate
    King,
    /// Driver-specific custom rate
    Custom,
}

impl TrackMode {
    /// `TELESCOPE_TRACK_MODE` switch for this mode
    pub fn element(&self) -> &'static str {
        match self {
            TrackMode::Sidereal => "TRACK_SIDEREAL",
            TrackMode::Solar => "TRACK_SOLAR",
            TrackMode::Lunar => "TRACK_LUNAR",
            TrackMode::King => "TRACK_KING",
            TrackMode::Custom => "TRACK_CUSTOM",
        }
    }

    /// Parse a `TRACK_*` switch name
    pub fn from_element(name: &str) -> Option<Self> {
        match name {
            "TRACK_SIDEREAL" => Some(TrackMode::Sidereal),
            "TRACK_SOLAR" => Some(TrackMode::Solar),
            "TRACK_LUNAR" => Some(TrackMode::Lunar),
            "TRACK_KING" => Some(TrackMode::King),
            "TRACK_CUSTOM" => Some(TrackMode::Custom),
            _ => None,
        }
    }
}

/// Side of the pier the telescope is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PierSide {
    /// Unknown or not applicable
    #[default]
    Neither,
    /// West of the pier, pointing east
    West,
    /// East of the pier, pointing west
    East,
}

/// Mechanical mount type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MountType {
    /// Equatorial fork
    EqFork,
    /// German equatorial
    #[default]
    EqGem,
    /// Alt-azimuth
    AltAz,
}

/// Mount state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MountState {
    /// Driver family
    pub profile: MountProfile,
    /// Whether the mount is slewing
    pub slewing: bool,
    /// Whether the mount is tracking
    pub tracking: bool,
    /// Whether a park is in progress
    pub parking: bool,
    /// Whether the mount is parked
    pub parked: bool,
    /// Whether motion can be aborted
    pub can_abort: bool,
    /// Whether the mount can sync
    pub can_sync: bool,
    /// Whether the mount can goto
    pub can_goto: bool,
    /// Whether the mount can park
    pub can_park: bool,
    /// Whether the mount can find home
    pub can_home: bool,
    /// Slew rates offered by the driver
    pub slew_rates: Vec<SlewRate>,
    /// Selected slew rate
    pub slew_rate: Option<String>,
    /// Mechanical type
    pub mount_type: MountType,
    /// Tracking modes offered by the driver
    pub track_modes: Vec<TrackMode>,
    /// Selected tracking mode
    pub track_mode: Option<TrackMode>,
    /// Pier side
    pub pier_side: PierSide,
    /// East-west guide rate, fraction of sidereal
    pub guide_rate_we: f64,
    /// North-south guide rate, fraction of sidereal
    pub guide_rate_ns: f64,
    /// Right ascension, hours
    pub right_ascension: f64,
    /// Declination, degrees
    pub declination: f64,
    /// Site latitude, degrees
    pub latitude: f64,
    /// Site longitude, degrees east
    pub longitude: f64,
    /// Site elevation, metres
    pub elevation: f64,
    /// Mount clock
    pub time: Option<DateTime<FixedOffset>>,
}

impl MountState {
    /// State for an iOptron v3 mount
    pub fn ioptron_v3() -> Self {
        Self {
            profile: MountProfile::IoptronV3,
            ..Self::default()
        }
    }
}

/// A mount state change
#[derive(Debug, Clone, PartialEq)]
pub enum MountChange {
    /// Slew rates offered changed
    SlewRates(Vec<SlewRate>),
    /// Selected slew rate changed
    SlewRate(Option<String>),
    /// Tracking modes offered changed
    TrackModes(Vec<TrackMode>),
    /// Selected tracking mode changed
    TrackMode(TrackMode),
    /// Tracking switched on or off
    Tracking(bool),
    /// Pier side changed
    PierSide(PierSide),
    /// Parking capability changed
    CanPark(bool),
    /// Park started or stopped
    Parking(bool),
    /// Parked state changed
    Parked(bool),
    /// Abort capability changed
    CanAbort(bool),
    /// Sync capability changed
    CanSync(bool),
    /// Goto capability changed
    CanGoto(bool),
    /// Home capability changed
    CanHome(bool),
    /// Slew started or stopped
    Slewing(bool),
    /// A slew ended in error
    SlewFailed,
    /// Position changed
    EquatorialCoordinates {
        /// Right ascension, hours
        right_ascension: f64,
        /// Declination, degrees
        declination: f64,
    },
    /// Guide rates changed
    GuideRate {
        /// East-west rate
        we: f64,
        /// North-south rate
        ns: f64,
    },
    /// Site changed
    Coordinates {
        /// Latitude, degrees
        latitude: f64,
        /// Longitude, degrees east
        longitude: f64,
        /// Elevation, metres
        elevation: f64,
    },
    /// Mount clock changed
    Time(DateTime<FixedOffset>),
}

pub(crate) fn on_vector(state: &mut MountState, vector: &Vector, defined: bool, changes: &mut Vec<MountChange>) {
    match vector {
        Vector::Switch(v) => on_switch(state, v, defined, changes),
        Vector::Number(v) => on_number(state, v, changes),
        Vector::Text(v) if v.name == "TIME_UTC" => {
            let utc = v.value("UTC").map(String::as_str).unwrap_or_default();
            let offset = v.value("OFFSET").map(String::as_str).unwrap_or("0");
            if let Some(time) = parse_time(utc, offset) {
                if update(&mut state.time, Some(time)) {
                    changes.push(MountChange::Time(time));
                }
            }
        }
        _ => {}
    }
}

fn on_switch(state: &mut MountState, v: &PropertyVector<bool>, defined: bool, changes: &mut Vec<MountChange>) {
    match v.name.as_str() {
        "TELESCOPE_SLEW_RATE" => {
            if defined {
                let rates: Vec<SlewRate> = v
                    .iter()
                    .map(|p| SlewRate {
                        name: p.name.clone(),
                        label: p.label.clone(),
                    })
                    .collect();
                if update(&mut state.slew_rates, rates.clone()) {
                    changes.push(MountChange::SlewRates(rates));
                }
            }
            let rate = v.first_on().map(str::to_string);
            if update(&mut state.slew_rate, rate.clone()) {
                changes.push(MountChange::SlewRate(rate));
            }
        }
        "TELESCOPE_TRACK_MODE" => {
            if defined {
                let modes: Vec<TrackMode> = v.names().filter_map(TrackMode::from_element).collect();
                if update(&mut state.track_modes, modes.clone()) {
                    changes.push(MountChange::TrackModes(modes));
                }
            }
            if let Some(mode) = v.first_on().and_then(TrackMode::from_element) {
                if update(&mut state.track_mode, Some(mode)) {
                    changes.push(MountChange::TrackMode(mode));
                }
            }
        }
        "TELESCOPE_TRACK_STATE" => {
            let tracking = v.first_on() == Some("TRACK_ON");
            if update(&mut state.tracking, tracking) {
                changes.push(MountChange::Tracking(tracking));
            }
        }
        "TELESCOPE_PIER_SIDE" => {
            let side = match v.first_on() {
                Some("PIER_WEST") => PierSide::West,
                Some("PIER_EAST") => PierSide::East,
                _ => PierSide::Neither,
            };
            if update(&mut state.pier_side, side) {
                changes.push(MountChange::PierSide(side));
            }
        }
        "TELESCOPE_PARK" => {
            if defined {
                let can_park = v.permission.is_writable();
                if update(&mut state.can_park, can_park) {
                    changes.push(MountChange::CanPark(can_park));
                }
            }
            let parking = v.is_busy();
            if update(&mut state.parking, parking) {
                changes.push(MountChange::Parking(parking));
            }
            let parked = v.first_on() == Some("PARK");
            if update(&mut state.parked, parked) {
                changes.push(MountChange::Parked(parked));
            }
        }
        "TELESCOPE_ABORT_MOTION" => {
            let can_abort = v.permission.is_writable();
            if update(&mut state.can_abort, can_abort) {
                changes.push(MountChange::CanAbort(can_abort));
            }
        }
        "ON_COORD_SET" => {
            let can_sync = v.contains("SYNC");
            if update(&mut state.can_sync, can_sync) {
                changes.push(MountChange::CanSync(can_sync));
            }
            let can_goto = v.contains("TRACK");
            if update(&mut state.can_goto, can_goto) {
                changes.push(MountChange::CanGoto(can_goto));
            }
        }
        "TELESCOPE_HOME" if defined => {
            if update(&mut state.can_home, true) {
                changes.push(MountChange::CanHome(true));
            }
        }
        "MOUNT_TYPE" => {
            let mount_type = match v.first_on() {
                Some("EQ_FORK") => MountType::EqFork,
                Some("ALTAZ") => MountType::AltAz,
                _ => MountType::EqGem,
            };
            state.mount_type = mount_type;
        }
        _ => {}
    }
}

fn on_number(state: &mut MountState, v: &PropertyVector<f64>, changes: &mut Vec<MountChange>) {
    let number = |name: &str| v.value(name).copied();
    match (v.name.as_str(), state.profile) {
        ("EQUATORIAL_EOD_COORD", _) => {
            if v.state == PropertyState::Alert {
                changes.push(MountChange::SlewFailed);
            }
            let slewing = v.is_busy();
            if update(&mut state.slewing, slewing) {
                changes.push(MountChange::Slewing(slewing));
            }
            let ra = number("RA").unwrap_or(state.right_ascension);
            let dec = number("DEC").unwrap_or(state.declination);
            let changed = update(&mut state.right_ascension, ra) | update(&mut state.declination, dec);
            if changed {
                changes.push(MountChange::EquatorialCoordinates {
                    right_ascension: ra,
                    declination: dec,
                });
            }
        }
        ("GEOGRAPHIC_COORD", _) => {
            let latitude = number("LAT").unwrap_or(state.latitude);
            let longitude = number("LONG").unwrap_or(state.longitude);
            let elevation = number("ELEV").unwrap_or(state.elevation);
            let changed = update(&mut state.latitude, latitude)
                | update(&mut state.longitude, longitude)
                | update(&mut state.elevation, elevation);
            if changed {
                changes.push(MountChange::Coordinates {
                    latitude,
                    longitude,
                    elevation,
                });
            }
        }
        ("GUIDE_RATE", MountProfile::Generic) => {
            let we = number("GUIDE_RATE_WE").unwrap_or(state.guide_rate_we);
            let ns = number("GUIDE_RATE_NS").unwrap_or(state.guide_rate_ns);
            update_guide_rate(state, we, ns, changes);
        }
        ("GUIDE_RATE", MountProfile::IoptronV3) => {
            let we = number("RA_GUIDE_RATE").unwrap_or(state.guide_rate_we);
            let ns = number("DE_GUIDE_RATE").unwrap_or(state.guide_rate_ns);
            update_guide_rate(state, we, ns, changes);
        }
        _ => {}
    }
}

fn update_guide_rate(state: &mut MountState, we: f64, ns: f64, changes: &mut Vec<MountChange>) {
    let changed = update(&mut state.guide_rate_we, we) | update(&mut state.guide_rate_ns, ns);
    if changed {
        changes.push(MountChange::GuideRate { we, ns });
    }
}

fn validate_equatorial(right_ascension: f64, declination: f64) -> Result<()> {
    if !(0.0..24.0).contains(&right_ascension) {
        return Err(DeviceError::invalid_value(format!(
            "right ascension {} outside 0..24h",
            right_ascension
        )));
    }
    if !(-90.0..=90.0).contains(&declination) {
        return Err(DeviceError::invalid_value(format!(
            "declination {} outside -90..90",
            declination
        )));
    }
    Ok(())
}

impl Device {
    /// Mount state snapshot, if this device is a mount
    pub fn mount(&self) -> Option<MountState> {
        self.read_state().kinds.mount.clone()
    }

    fn mount_state<T>(&self, f: impl FnOnce(&MountState) -> T) -> Result<T> {
        self.inspect(DeviceKind::Mount, |inner| inner.kinds.mount.as_ref().map(f))
    }

    /// Start or stop tracking
    pub fn set_tracking(&self, enable: bool) -> Result<()> {
        if self.mount_state(|m| m.tracking)? == enable {
            return Ok(());
        }
        let element = if enable { "TRACK_ON" } else { "TRACK_OFF" };
        self.send_new_switch("TELESCOPE_TRACK_STATE", [(element, true)])
    }

    /// Select a tracking mode
    pub fn set_track_mode(&self, mode: TrackMode) -> Result<()> {
        if !self.mount_state(|m| m.track_modes.contains(&mode))? {
            return Err(DeviceError::invalid_value(format!("track mode {:?} not offered", mode)));
        }
        self.send_new_switch("TELESCOPE_TRACK_MODE", [(mode.element(), true)])
    }

    /// Select one of the offered slew rates by name
    pub fn set_slew_rate(&self, rate: &str) -> Result<()> {
        if !self.mount_state(|m| m.slew_rates.iter().any(|r| r.name == rate))? {
            return Err(DeviceError::invalid_value(format!("unknown slew rate {}", rate)));
        }
        self.send_new_switch("TELESCOPE_SLEW_RATE", [(rate, true)])
    }

    fn coord_set(&self, action: &str, right_ascension: f64, declination: f64) -> Result<()> {
        validate_equatorial(right_ascension, declination)?;
        self.send_new_switch("ON_COORD_SET", [(action, true)])?;
        self.send_new_number(
            "EQUATORIAL_EOD_COORD",
            [("RA", right_ascension), ("DEC", declination)],
        )
    }

    /// Slew to a position and keep tracking it
    pub fn goto(&self, right_ascension: f64, declination: f64) -> Result<()> {
        if !self.mount_state(|m| m.can_goto)? {
            return Err(DeviceError::unsupported(self.name(), "goto"));
        }
        self.coord_set("TRACK", right_ascension, declination)
    }

    /// Slew to a position and stop
    pub fn slew_to(&self, right_ascension: f64, declination: f64) -> Result<()> {
        if !self.mount_state(|m| m.can_goto)? {
            return Err(DeviceError::unsupported(self.name(), "slew"));
        }
        self.coord_set("SLEW", right_ascension, declination)
    }

    /// Declare the current pointing to be a position
    pub fn sync(&self, right_ascension: f64, declination: f64) -> Result<()> {
        if !self.mount_state(|m| m.can_sync)? {
            return Err(DeviceError::unsupported(self.name(), "sync"));
        }
        self.coord_set("SYNC", right_ascension, declination)
    }

    /// Park the mount
    pub fn park(&self) -> Result<()> {
        if !self.mount_state(|m| m.can_park)? {
            return Err(DeviceError::unsupported(self.name(), "park"));
        }
        self.send_new_switch("TELESCOPE_PARK", [("PARK", true)])
    }

    /// Unpark the mount
    pub fn unpark(&self) -> Result<()> {
        if !self.mount_state(|m| m.can_park)? {
            return Err(DeviceError::unsupported(self.name(), "unpark"));
        }
        self.send_new_switch("TELESCOPE_PARK", [("UNPARK", true)])
    }

    /// Move to the home position
    pub fn home(&self) -> Result<()> {
        if !self.mount_state(|m| m.can_home)? {
            return Err(DeviceError::unsupported(self.name(), "home"));
        }
        self.send_new_switch("TELESCOPE_HOME", [("GO", true)])
    }

    /// Stop any motion
    pub fn abort_motion(&self) -> Result<()> {
        if !self.mount_state(|m| m.can_abort)? {
            return Err(DeviceError::unsupported(self.name(), "abort motion"));
        }
        self.send_new_switch("TELESCOPE_ABORT_MOTION", [("ABORT", true)])
    }

    /// Set the guide rates, as fractions of sidereal
    pub fn set_guide_rate(&self, we: f64, ns: f64) -> Result<()> {
        let profile = self.mount_state(|m| m.profile)?;
        let elements = match profile {
            MountProfile::Generic => [("GUIDE_RATE_WE", we), ("GUIDE_RATE_NS", ns)],
            MountProfile::IoptronV3 => [("RA_GUIDE_RATE", we), ("DE_GUIDE_RATE", ns)],
        };
        self.send_new_number("GUIDE_RATE", elements)
    }

    /// Set the site location
    pub fn set_coordinates(&self, latitude: f64, longitude: f64, elevation: f64) -> Result<()> {
        self.mount_state(|_| ())?;
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(DeviceError::invalid_value(format!("latitude {} outside -90..90", latitude)));
        }
        let longitude = longitude.rem_euclid(360.0);
        self.send_new_number(
            "GEOGRAPHIC_COORD",
            [("LAT", latitude), ("LONG", longitude), ("ELEV", elevation)],
        )
    }

    /// Set the mount clock
    pub fn set_time(&self, time: DateTime<FixedOffset>) -> Result<()> {
        self.mount_state(|_| ())?;
        let (utc, offset) = format_time(&time);
        self.send_new_text("TIME_UTC", [("UTC", utc), ("OFFSET", offset)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::tests::connected_device;
    use crate::devices::KindState;
    use crate::event::DeviceEvent;
    use crate::protocol::{DefNumber, DefSwitch, DefText, DefVector, OutboundMessage, SetVector, SwitchRule};

    const MOUNT: &str = "Telescope Simulator";

    fn mount_changes(events: &[DeviceEvent]) -> Vec<MountChange> {
        events
            .iter()
            .filter_map(|e| match e {
                DeviceEvent::Mount { change, .. } => Some(change.clone()),
                _ => None,
            })
            .collect()
    }

    fn switch(name: &str, elements: &[(&str, bool)]) -> DefVector {
        DefVector::switch(
            MOUNT,
            name,
            SwitchRule::OneOfMany,
            elements.iter().map(|(n, v)| DefSwitch::new(*n, *v)).collect(),
        )
    }

    #[test]
    fn test_slew_and_failure() {
        let (device, _rx) = connected_device(MOUNT, KindState::Mount(MountState::default()));
        device.apply_def(&DefVector::number(
            MOUNT,
            "EQUATORIAL_EOD_COORD",
            vec![
                DefNumber::new("RA", 0.0, 0.0, 24.0, 0.0),
                DefNumber::new("DEC", 90.0, -90.0, 90.0, 0.0),
            ],
        ));

        let busy = SetVector::number(MOUNT, "EQUATORIAL_EOD_COORD", PropertyState::Busy, [("RA", 5.5), ("DEC", 20.0)]);
        let changes = mount_changes(&device.apply_set(&busy));
        assert!(changes.contains(&MountChange::Slewing(true)));
        assert!(changes.contains(&MountChange::EquatorialCoordinates {
            right_ascension: 5.5,
            declination: 20.0,
        }));

        let alert = SetVector::number(MOUNT, "EQUATORIAL_EOD_COORD", PropertyState::Alert, [("RA", 5.5), ("DEC", 20.0)]);
        let changes = mount_changes(&device.apply_set(&alert));
        assert_eq!(changes, vec![MountChange::SlewFailed, MountChange::Slewing(false)]);
    }

    #[test]
    fn test_park_and_capabilities() {
        let (device, _rx) = connected_device(MOUNT, KindState::Mount(MountState::default()));
        device.apply_def(&switch("TELESCOPE_PARK", &[("PARK", false), ("UNPARK", true)]));
        device.apply_def(&switch("ON_COORD_SET", &[("TRACK", true), ("SLEW", false), ("SYNC", false)]));
        device.apply_def(&switch("TELESCOPE_TRACK_STATE", &[("TRACK_ON", false), ("TRACK_OFF", true)]));

        let state = device.mount().unwrap();
        assert!(state.can_park && state.can_goto && state.can_sync);
        assert!(!state.parked && !state.tracking && !state.can_home);

        let parking = SetVector::switch(MOUNT, "TELESCOPE_PARK", PropertyState::Busy, [("PARK", true), ("UNPARK", false)]);
        let changes = mount_changes(&device.apply_set(&parking));
        assert_eq!(changes, vec![MountChange::Parking(true), MountChange::Parked(true)]);

        let parked = SetVector::switch(MOUNT, "TELESCOPE_PARK", PropertyState::Ok, [("PARK", true), ("UNPARK", false)]);
        let changes = mount_changes(&device.apply_set(&parked));
        assert_eq!(changes, vec![MountChange::Parking(false)]);

        assert!(matches!(device.home(), Err(DeviceError::Unsupported { .. })));
    }

    #[test]
    fn test_slew_rates_and_pier_side() {
        let (device, mut rx) = connected_device(MOUNT, KindState::Mount(MountState::default()));
        device.apply_def(&switch(
            "TELESCOPE_SLEW_RATE",
            &[("1x", false), ("2x", true), ("MAX", false)],
        ));
        device.apply_def(&switch("TELESCOPE_PIER_SIDE", &[("PIER_WEST", false), ("PIER_EAST", true)]));

        let state = device.mount().unwrap();
        assert_eq!(state.slew_rates.len(), 3);
        assert_eq!(state.slew_rate.as_deref(), Some("2x"));
        assert_eq!(state.pier_side, PierSide::East);

        assert!(matches!(device.set_slew_rate("9x"), Err(DeviceError::InvalidValue(_))));
        device.set_slew_rate("MAX").unwrap();
        assert!(matches!(rx.try_recv().unwrap(), OutboundMessage::NewSwitchVector { .. }));
    }

    #[test]
    fn test_goto_sends_coord_set_then_coordinates() {
        let (device, mut rx) = connected_device(MOUNT, KindState::Mount(MountState::default()));
        device.apply_def(&switch("ON_COORD_SET", &[("TRACK", true), ("SLEW", false), ("SYNC", false)]));

        assert!(matches!(device.goto(25.0, 0.0), Err(DeviceError::InvalidValue(_))));
        device.goto(10.5, -30.0).unwrap();

        match rx.try_recv().unwrap() {
            OutboundMessage::NewSwitchVector { name, elements, .. } => {
                assert_eq!(name, "ON_COORD_SET");
                assert_eq!(elements[0].name, "TRACK");
            }
            other => panic!("unexpected {:?}", other),
        }
        match rx.try_recv().unwrap() {
            OutboundMessage::NewNumberVector { name, elements, .. } => {
                assert_eq!(name, "EQUATORIAL_EOD_COORD");
                assert_eq!(elements[0].value, 10.5);
                assert_eq!(elements[1].value, -30.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_ioptron_guide_rate_elements() {
        let (device, mut rx) = connected_device("iOptron CEM40", KindState::Mount(MountState::ioptron_v3()));
        device.apply_def(&DefVector::number(
            "iOptron CEM40",
            "GUIDE_RATE",
            vec![
                DefNumber::new("RA_GUIDE_RATE", 0.5, 0.01, 0.9, 0.01),
                DefNumber::new("DE_GUIDE_RATE", 0.4, 0.1, 0.99, 0.01),
            ],
        ));
        let state = device.mount().unwrap();
        assert_eq!((state.guide_rate_we, state.guide_rate_ns), (0.5, 0.4));

        device.set_guide_rate(0.3, 0.3).unwrap();
        match rx.try_recv().unwrap() {
            OutboundMessage::NewNumberVector { elements, .. } => assert_eq!(elements[0].name, "RA_GUIDE_RATE"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_time_utc() {
        let (device, mut rx) = connected_device(MOUNT, KindState::Mount(MountState::default()));
        let changes = mount_changes(&device.apply_def(&DefVector::text(
            MOUNT,
            "TIME_UTC",
            vec![DefText::new("UTC", "2024-03-10T04:00:00"), DefText::new("OFFSET", "-5.00")],
        )));
        let time = match changes.as_slice() {
            [MountChange::Time(time)] => *time,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(time.offset().local_minus_utc(), -5 * 3600);

        device.set_time(time).unwrap();
        match rx.try_recv().unwrap() {
            OutboundMessage::NewTextVector { elements, .. } => {
                assert_eq!(elements[0].value, "2024-03-10T04:00:00");
                assert_eq!(elements[1].value, "-5.00");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
