/*!
 * GPS specialization: site location and time.
 */
use chrono::{DateTime, FixedOffset};

use super::{parse_time, update};
use crate::property::Vector;

/// GPS state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GpsState {
    /// Latitude, degrees
    pub latitude: f64,
    /// Longitude, degrees east
    pub longitude: f64,
    /// Elevation, metres
    pub elevation: f64,
    /// Receiver time
    pub time: Option<DateTime<FixedOffset>>,
}

/// A GPS state change
#[derive(Debug, Clone, PartialEq)]
pub enum GpsChange {
    /// Location changed
    Coordinates {
        /// Latitude, degrees
        latitude: f64,
        /// Longitude, degrees east
        longitude: f64,
        /// Elevation, metres
        elevation: f64,
    },
    /// Time changed
    Time(DateTime<FixedOffset>),
}

pub(crate) fn on_vector(state: &mut GpsState, vector: &Vector, _defined: bool, changes: &mut Vec<GpsChange>) {
    match vector.name() {
        "GEOGRAPHIC_COORD" => {
            let latitude = vector.number("LAT").unwrap_or(state.latitude);
            let longitude = vector.number("LONG").unwrap_or(state.longitude);
            let elevation = vector.number("ELEV").unwrap_or(state.elevation);
            let changed = update(&mut state.latitude, latitude)
                | update(&mut state.longitude, longitude)
                | update(&mut state.elevation, elevation);
            if changed {
                changes.push(GpsChange::Coordinates {
                    latitude,
                    longitude,
                    elevation,
                });
            }
        }
        "TIME_UTC" => {
            let Some(utc) = vector.text("UTC") else {
                return;
            };
            let offset = vector.text("OFFSET").unwrap_or("0");
            if let Some(time) = parse_time(utc, offset) {
                if update(&mut state.time, Some(time)) {
                    changes.push(GpsChange::Time(time));
                }
            }
        }
        _ => {}
    }
}

impl crate::device::Device {
    /// GPS state snapshot, if this device is a GPS
    pub fn gps(&self) -> Option<GpsState> {
        self.read_state().kinds.gps.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::tests::connected_device;
    use crate::devices::KindState;
    use crate::event::DeviceEvent;
    use crate::protocol::{DefNumber, DefText, DefVector, PropertyState, SetVector};
    use chrono::Timelike;

    const GPS: &str = "GPS Simulator";

    #[test]
    fn test_location_and_time() {
        let (device, _rx) = connected_device(GPS, KindState::Gps(GpsState::default()));
        let events = device.apply_def(&DefVector::number(
            GPS,
            "GEOGRAPHIC_COORD",
            vec![
                DefNumber::new("LAT", 51.48, -90.0, 90.0, 0.0),
                DefNumber::new("LONG", 359.99, 0.0, 360.0, 0.0),
                DefNumber::new("ELEV", 46.0, -200.0, 10000.0, 0.0),
            ],
        ));
        assert!(events.iter().any(|e| matches!(
            e,
            DeviceEvent::Gps {
                change: GpsChange::Coordinates { latitude, .. },
                ..
            } if *latitude == 51.48
        )));

        device.apply_def(&DefVector::text(
            GPS,
            "TIME_UTC",
            vec![DefText::new("UTC", "2024-01-01T00:00:00"), DefText::new("OFFSET", "0")],
        ));
        let update = SetVector::text(
            GPS,
            "TIME_UTC",
            PropertyState::Ok,
            [("UTC", "2024-01-01T12:30:00"), ("OFFSET", "2")],
        );
        device.apply_set(&update);

        let time = device.gps().unwrap().time.unwrap();
        assert_eq!(time.hour(), 14);
        assert_eq!(time.minute(), 30);
    }

    #[test]
    fn test_unparsable_time_is_ignored() {
        let (device, _rx) = connected_device(GPS, KindState::Gps(GpsState::default()));
        device.apply_def(&DefVector::text(
            GPS,
            "TIME_UTC",
            vec![DefText::new("UTC", "not a time"), DefText::new("OFFSET", "0")],
        ));
        assert_eq!(device.gps().unwrap().time, None);
    }
}
