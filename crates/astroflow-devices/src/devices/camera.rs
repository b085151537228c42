/*!
 * Camera specialization.
 *
 * Tracks exposure progress, cooling, framing, binning, gain and offset from
 * the standard `CCD_*` vectors. ZWO ASI drivers report gain and offset in
 * `CCD_CONTROLS` instead of `CCD_GAIN`/`CCD_OFFSET`; [`CameraProfile`]
 * selects which vectors are used.
 */
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::update;
use crate::device::{Device, DeviceError, DeviceKind, Result};
use crate::property::{PropertyVector, Vector};
use crate::protocol::PropertyState;

/// Driver family of a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CameraProfile {
    /// Standard INDI CCD vectors
    #[default]
    Generic,
    /// ZWO ASI drivers
    Asi,
}

impl CameraProfile {
    /// Vector and element carrying the gain
    pub fn gain_element(&self) -> (&'static str, &'static str) {
        match self {
            CameraProfile::Generic => ("CCD_GAIN", "GAIN"),
            CameraProfile::Asi => ("CCD_CONTROLS", "Gain"),
        }
    }

    /// Vector and element carrying the offset
    pub fn offset_element(&self) -> (&'static str, &'static str) {
        match self {
            CameraProfile::Generic => ("CCD_OFFSET", "OFFSET"),
            CameraProfile::Asi => ("CCD_CONTROLS", "Offset"),
        }
    }
}

/// Frame type of the next capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameType {
    /// Light frame
    Light,
    /// Dark frame
    Dark,
    /// Flat frame
    Flat,
    /// Bias frame
    Bias,
}

impl FrameType {
    /// `CCD_FRAME_TYPE` element selecting this type
    pub fn element(&self) -> &'static str {
        match self {
            FrameType::Light => "FRAME_LIGHT",
            FrameType::Dark => "FRAME_DARK",
            FrameType::Flat => "FRAME_FLAT",
            FrameType::Bias => "FRAME_BIAS",
        }
    }
}

/// Sub-frame origin and size, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Frame {
    /// Left edge
    pub x: u32,
    /// Top edge
    pub y: u32,
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

/// Limits of the sub-frame values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameBounds {
    /// Minimum x
    pub min_x: u32,
    /// Maximum x
    pub max_x: u32,
    /// Minimum y
    pub min_y: u32,
    /// Maximum y
    pub max_y: u32,
    /// Minimum width
    pub min_width: u32,
    /// Maximum width
    pub max_width: u32,
    /// Minimum height
    pub min_height: u32,
    /// Maximum height
    pub max_height: u32,
}

/// Colour filter array layout
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cfa {
    /// Pattern x offset
    pub offset_x: i32,
    /// Pattern y offset
    pub offset_y: i32,
    /// Bayer pattern, e.g. `RGGB`
    pub pattern: String,
}

/// Camera state
#[derive(Debug, Clone, PartialEq)]
pub struct CameraState {
    /// Driver family
    pub profile: CameraProfile,
    /// State of `CCD_EXPOSURE`
    pub exposure_state: PropertyState,
    /// Whether an exposure is in progress
    pub exposuring: bool,
    /// Remaining exposure time, in seconds
    pub exposure: f64,
    /// Shortest exposure, in seconds
    pub exposure_min: f64,
    /// Longest exposure, in seconds
    pub exposure_max: f64,
    /// Whether the cooler can be switched
    pub has_cooler_control: bool,
    /// Whether the cooler is on
    pub cooler: bool,
    /// Cooler power, percent
    pub cooler_power: f64,
    /// Whether the camera reports a sensor temperature
    pub has_cooler: bool,
    /// Whether a target temperature can be set
    pub can_set_temperature: bool,
    /// Capture formats offered by the driver
    pub frame_formats: Vec<String>,
    /// Whether an exposure can be aborted
    pub can_abort: bool,
    /// Colour filter array, colour sensors only
    pub cfa: Option<Cfa>,
    /// Pixel width, in micrometres
    pub pixel_size_x: f64,
    /// Pixel height, in micrometres
    pub pixel_size_y: f64,
    /// Whether a sub-frame can be selected
    pub can_sub_frame: bool,
    /// Current sub-frame
    pub frame: Frame,
    /// Sub-frame limits
    pub frame_bounds: FrameBounds,
    /// Whether binning can be changed
    pub can_bin: bool,
    /// Horizontal binning
    pub bin_x: u32,
    /// Vertical binning
    pub bin_y: u32,
    /// Maximum horizontal binning
    pub max_bin_x: u32,
    /// Maximum vertical binning
    pub max_bin_y: u32,
    /// Gain
    pub gain: i32,
    /// Minimum gain
    pub gain_min: i32,
    /// Maximum gain
    pub gain_max: i32,
    /// Offset
    pub offset: i32,
    /// Minimum offset
    pub offset_min: i32,
    /// Maximum offset
    pub offset_max: i32,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            profile: CameraProfile::Generic,
            exposure_state: PropertyState::Idle,
            exposuring: false,
            exposure: 0.0,
            exposure_min: 0.0,
            exposure_max: 0.0,
            has_cooler_control: false,
            cooler: false,
            cooler_power: 0.0,
            has_cooler: false,
            can_set_temperature: false,
            frame_formats: Vec::new(),
            can_abort: false,
            cfa: None,
            pixel_size_x: 0.0,
            pixel_size_y: 0.0,
            can_sub_frame: false,
            frame: Frame::default(),
            frame_bounds: FrameBounds::default(),
            can_bin: false,
            bin_x: 1,
            bin_y: 1,
            max_bin_x: 1,
            max_bin_y: 1,
            gain: 0,
            gain_min: 0,
            gain_max: 0,
            offset: 0,
            offset_min: 0,
            offset_max: 0,
        }
    }
}

impl CameraState {
    /// State for a ZWO ASI camera
    pub fn asi() -> Self {
        Self {
            profile: CameraProfile::Asi,
            ..Self::default()
        }
    }
}

/// A camera state change
#[derive(Debug, Clone, PartialEq)]
pub enum CameraChange {
    /// Cooler switch became available
    CoolerControl(bool),
    /// Cooler switched on or off
    Cooler(bool),
    /// Cooler power changed
    CoolerPower(f64),
    /// Temperature reporting became available
    HasCooler(bool),
    /// Target temperature became settable
    CanSetTemperature(bool),
    /// Capture formats changed
    FrameFormats(Vec<String>),
    /// Abort became available
    CanAbort(bool),
    /// Colour filter array changed
    Cfa(Cfa),
    /// Pixel size changed
    PixelSize {
        /// Pixel width
        x: f64,
        /// Pixel height
        y: f64,
    },
    /// Exposure limits changed
    ExposureMinMax {
        /// Shortest exposure, in seconds
        min: f64,
        /// Longest exposure, in seconds
        max: f64,
    },
    /// Remaining exposure time changed
    ExposureProgress(f64),
    /// Exposure started or stopped
    Exposuring(bool),
    /// Exposure completed
    ExposureFinished,
    /// Exposure was aborted
    ExposureAborted,
    /// Exposure failed
    ExposureFailed,
    /// `CCD_EXPOSURE` state changed
    ExposureState {
        /// State before the update
        previous: PropertyState,
        /// State after the update
        current: PropertyState,
    },
    /// Sub-frame selection became available
    CanSubFrame(bool),
    /// Sub-frame or its limits changed
    Frame(Frame, FrameBounds),
    /// Binning became available
    CanBin(bool),
    /// Binning changed
    Bin {
        /// Horizontal binning
        x: u32,
        /// Vertical binning
        y: u32,
    },
    /// Gain limits changed
    GainMinMax {
        /// Minimum gain
        min: i32,
        /// Maximum gain
        max: i32,
    },
    /// Gain changed
    Gain(i32),
    /// Offset limits changed
    OffsetMinMax {
        /// Minimum offset
        min: i32,
        /// Maximum offset
        max: i32,
    },
    /// Offset changed
    Offset(i32),
}

pub(crate) fn on_vector(
    state: &mut CameraState,
    vector: &Vector,
    defined: bool,
    changes: &mut Vec<CameraChange>,
) {
    match vector {
        Vector::Switch(v) => on_switch(state, v, defined, changes),
        Vector::Text(v) => on_text(state, v, changes),
        Vector::Number(v) => {
            let (gain_vector, gain) = state.profile.gain_element();
            if v.name == gain_vector {
                on_gain(state, v, gain, defined, changes);
            }
            let (offset_vector, offset) = state.profile.offset_element();
            if v.name == offset_vector {
                on_offset(state, v, offset, defined, changes);
            }
            on_number(state, v, defined, changes);
        }
        Vector::Light(_) => {}
    }
}

fn on_switch(
    state: &mut CameraState,
    v: &PropertyVector<bool>,
    defined: bool,
    changes: &mut Vec<CameraChange>,
) {
    match v.name.as_str() {
        "CCD_COOLER" => {
            if defined && update(&mut state.has_cooler_control, true) {
                changes.push(CameraChange::CoolerControl(true));
            }
            let cooler = v.value("COOLER_ON").copied().unwrap_or(false);
            if update(&mut state.cooler, cooler) {
                changes.push(CameraChange::Cooler(cooler));
            }
        }
        "CCD_CAPTURE_FORMAT" if defined && !v.is_empty() => {
            let formats: Vec<String> = v.names().map(str::to_string).collect();
            if update(&mut state.frame_formats, formats.clone()) {
                changes.push(CameraChange::FrameFormats(formats));
            }
        }
        "CCD_ABORT_EXPOSURE" if defined => {
            let can_abort = v.permission.is_writable();
            if update(&mut state.can_abort, can_abort) {
                changes.push(CameraChange::CanAbort(can_abort));
            }
        }
        _ => {}
    }
}

fn on_text(state: &mut CameraState, v: &PropertyVector<String>, changes: &mut Vec<CameraChange>) {
    if v.name != "CCD_CFA" {
        return;
    }
    let int = |name: &str| {
        v.value(name)
            .and_then(|s| s.trim().parse::<i32>().ok())
            .unwrap_or(0)
    };
    let cfa = Cfa {
        offset_x: int("CFA_OFFSET_X"),
        offset_y: int("CFA_OFFSET_Y"),
        pattern: v.value("CFA_TYPE").cloned().unwrap_or_default(),
    };
    if update(&mut state.cfa, Some(cfa.clone())) {
        changes.push(CameraChange::Cfa(cfa));
    }
}

fn on_gain(
    state: &mut CameraState,
    v: &PropertyVector<f64>,
    element: &str,
    defined: bool,
    changes: &mut Vec<CameraChange>,
) {
    let Some(gain) = v.get(element) else {
        return;
    };
    if defined {
        let (min, max) = (gain.min() as i32, gain.max() as i32);
        let changed = update(&mut state.gain_min, min) | update(&mut state.gain_max, max);
        if changed {
            changes.push(CameraChange::GainMinMax { min, max });
        }
    }
    if update(&mut state.gain, gain.value as i32) {
        changes.push(CameraChange::Gain(state.gain));
    }
}

fn on_offset(
    state: &mut CameraState,
    v: &PropertyVector<f64>,
    element: &str,
    defined: bool,
    changes: &mut Vec<CameraChange>,
) {
    let Some(offset) = v.get(element) else {
        return;
    };
    if defined {
        let (min, max) = (offset.min() as i32, offset.max() as i32);
        let changed = update(&mut state.offset_min, min) | update(&mut state.offset_max, max);
        if changed {
            changes.push(CameraChange::OffsetMinMax { min, max });
        }
    }
    if update(&mut state.offset, offset.value as i32) {
        changes.push(CameraChange::Offset(state.offset));
    }
}

fn on_number(
    state: &mut CameraState,
    v: &PropertyVector<f64>,
    defined: bool,
    changes: &mut Vec<CameraChange>,
) {
    match v.name.as_str() {
        "CCD_INFO" => {
            let x = v.value("CCD_PIXEL_SIZE_X").copied().unwrap_or(0.0);
            let y = v.value("CCD_PIXEL_SIZE_Y").copied().unwrap_or(0.0);
            let changed = update(&mut state.pixel_size_x, x) | update(&mut state.pixel_size_y, y);
            if changed {
                changes.push(CameraChange::PixelSize { x, y });
            }
        }
        "CCD_EXPOSURE" => on_exposure(state, v, defined, changes),
        "CCD_COOLER_POWER" => {
            if let Some(power) = v.iter().next().map(|p| p.value) {
                if update(&mut state.cooler_power, power) {
                    changes.push(CameraChange::CoolerPower(power));
                }
            }
        }
        "CCD_TEMPERATURE" if defined => {
            if update(&mut state.has_cooler, true) {
                changes.push(CameraChange::HasCooler(true));
            }
            let writable = v.permission.is_writable();
            if update(&mut state.can_set_temperature, writable) {
                changes.push(CameraChange::CanSetTemperature(writable));
            }
        }
        "CCD_FRAME" => on_frame(state, v, defined, changes),
        "CCD_BINNING" => {
            let (Some(hor), Some(ver)) = (v.get("HOR_BIN"), v.get("VER_BIN")) else {
                return;
            };
            if defined {
                state.max_bin_x = hor.max().max(1.0) as u32;
                state.max_bin_y = ver.max().max(1.0) as u32;
                let can_bin = v.permission.is_writable();
                if update(&mut state.can_bin, can_bin) {
                    changes.push(CameraChange::CanBin(can_bin));
                }
            }
            let (x, y) = (hor.value as u32, ver.value as u32);
            let changed = update(&mut state.bin_x, x) | update(&mut state.bin_y, y);
            if changed {
                changes.push(CameraChange::Bin { x, y });
            }
        }
        _ => {}
    }
}

fn on_exposure(
    state: &mut CameraState,
    v: &PropertyVector<f64>,
    defined: bool,
    changes: &mut Vec<CameraChange>,
) {
    let Some(element) = v.get("CCD_EXPOSURE_VALUE") else {
        return;
    };

    if defined {
        let (min, max) = (element.min(), element.max());
        let changed = update(&mut state.exposure_min, min) | update(&mut state.exposure_max, max);
        if changed {
            changes.push(CameraChange::ExposureMinMax { min, max });
        }
    }

    let previous = state.exposure_state;
    let current = v.state;
    state.exposure_state = current;

    if matches!(current, PropertyState::Busy | PropertyState::Ok) && update(&mut state.exposure, element.value) {
        changes.push(CameraChange::ExposureProgress(element.value));
    }

    let exposuring = current == PropertyState::Busy;
    if update(&mut state.exposuring, exposuring) {
        changes.push(CameraChange::Exposuring(exposuring));
    }

    match (previous, current) {
        (PropertyState::Busy, PropertyState::Idle) => changes.push(CameraChange::ExposureAborted),
        (PropertyState::Busy, PropertyState::Ok) => changes.push(CameraChange::ExposureFinished),
        (p, PropertyState::Alert) if p != PropertyState::Alert => changes.push(CameraChange::ExposureFailed),
        _ => {}
    }

    if previous != current {
        changes.push(CameraChange::ExposureState { previous, current });
    }
}

fn on_frame(
    state: &mut CameraState,
    v: &PropertyVector<f64>,
    defined: bool,
    changes: &mut Vec<CameraChange>,
) {
    if defined {
        let can_sub_frame = v.permission.is_writable();
        if update(&mut state.can_sub_frame, can_sub_frame) {
            changes.push(CameraChange::CanSubFrame(can_sub_frame));
        }
    }

    let (Some(x), Some(y), Some(width), Some(height)) =
        (v.get("X"), v.get("Y"), v.get("WIDTH"), v.get("HEIGHT"))
    else {
        return;
    };

    let bounds = FrameBounds {
        min_x: x.min() as u32,
        max_x: x.max() as u32,
        min_y: y.min() as u32,
        max_y: y.max() as u32,
        min_width: width.min() as u32,
        max_width: width.max() as u32,
        min_height: height.min() as u32,
        max_height: height.max() as u32,
    };
    let frame = Frame {
        x: x.value as u32,
        y: y.value as u32,
        width: width.value as u32,
        height: height.value as u32,
    };

    // Drivers publish zeroed limits before the sensor size is known
    let valid = bounds.max_x != 0
        && bounds.max_y != 0
        && bounds.max_width != 0
        && bounds.max_height != 0
        && bounds.min_width != 0
        && bounds.min_height != 0;

    if valid && (bounds != state.frame_bounds || frame != state.frame) {
        state.frame_bounds = bounds;
        state.frame = frame;
        changes.push(CameraChange::Frame(frame, bounds));
    }
}

impl Device {
    /// Camera state snapshot, if this device is a camera
    pub fn camera(&self) -> Option<CameraState> {
        self.read_state().kinds.camera.clone()
    }

    fn camera_state<T>(&self, f: impl FnOnce(&CameraState) -> T) -> Result<T> {
        self.inspect(DeviceKind::Camera, |inner| inner.kinds.camera.as_ref().map(f))
    }

    /// Start an exposure
    pub fn start_capture(&self, exposure: Duration) -> Result<()> {
        self.camera_state(|_| ())?;
        self.send_new_number("CCD_EXPOSURE", [("CCD_EXPOSURE_VALUE", exposure.as_secs_f64())])
    }

    /// Abort the running exposure
    pub fn abort_capture(&self) -> Result<()> {
        if !self.camera_state(|c| c.can_abort)? {
            return Err(DeviceError::unsupported(self.name(), "abort capture"));
        }
        self.send_new_switch("CCD_ABORT_EXPOSURE", [("ABORT", true)])
    }

    /// Switch the cooler on or off
    pub fn enable_cooler(&self, enable: bool) -> Result<()> {
        let (has_control, cooler) = self.camera_state(|c| (c.has_cooler_control, c.cooler))?;
        if !has_control {
            return Err(DeviceError::unsupported(self.name(), "cooler control"));
        }
        if cooler == enable {
            return Ok(());
        }
        let element = if enable { "COOLER_ON" } else { "COOLER_OFF" };
        self.send_new_switch("CCD_COOLER", [(element, true)])
    }

    /// Set the target sensor temperature, in degrees Celsius
    pub fn set_temperature(&self, celsius: f64) -> Result<()> {
        if !self.camera_state(|c| c.can_set_temperature)? {
            return Err(DeviceError::unsupported(self.name(), "set temperature"));
        }
        self.send_new_number("CCD_TEMPERATURE", [("CCD_TEMPERATURE_VALUE", celsius)])
    }

    /// Select one of the advertised capture formats
    pub fn set_frame_format(&self, format: &str) -> Result<()> {
        let known = self.camera_state(|c| c.frame_formats.iter().any(|f| f == format))?;
        if !known {
            return Err(DeviceError::invalid_value(format!("unknown frame format {}", format)));
        }
        self.send_new_switch("CCD_CAPTURE_FORMAT", [(format, true)])
    }

    /// Select the frame type of the next capture
    pub fn set_frame_type(&self, frame_type: FrameType) -> Result<()> {
        self.camera_state(|_| ())?;
        self.send_new_switch("CCD_FRAME_TYPE", [(frame_type.element(), true)])
    }

    /// Select a sub-frame
    pub fn set_frame(&self, frame: Frame) -> Result<()> {
        if !self.camera_state(|c| c.can_sub_frame)? {
            return Err(DeviceError::unsupported(self.name(), "sub-frame"));
        }
        self.send_new_number(
            "CCD_FRAME",
            [
                ("X", frame.x as f64),
                ("Y", frame.y as f64),
                ("WIDTH", frame.width as f64),
                ("HEIGHT", frame.height as f64),
            ],
        )
    }

    /// Set the binning
    pub fn set_bin(&self, x: u32, y: u32) -> Result<()> {
        let (can_bin, max_x, max_y) = self.camera_state(|c| (c.can_bin, c.max_bin_x, c.max_bin_y))?;
        if !can_bin {
            return Err(DeviceError::unsupported(self.name(), "binning"));
        }
        if x == 0 || y == 0 || x > max_x || y > max_y {
            return Err(DeviceError::invalid_value(format!(
                "binning {}x{} outside 1x1..{}x{}",
                x, y, max_x, max_y
            )));
        }
        self.send_new_number("CCD_BINNING", [("HOR_BIN", x as f64), ("VER_BIN", y as f64)])
    }

    /// Set the gain
    pub fn set_gain(&self, gain: i32) -> Result<()> {
        let (vector, element) = self.camera_state(|c| c.profile.gain_element())?;
        self.send_new_number(vector, [(element, gain as f64)])
    }

    /// Set the offset
    pub fn set_offset(&self, offset: i32) -> Result<()> {
        let (vector, element) = self.camera_state(|c| c.profile.offset_element())?;
        self.send_new_number(vector, [(element, offset as f64)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::tests::connected_device;
    use crate::devices::KindState;
    use crate::event::DeviceEvent;
    use crate::protocol::{DefNumber, DefSwitch, DefVector, OutboundMessage, PropertyPermission, SetVector, SwitchRule};

    const CCD: &str = "CCD Simulator";

    fn camera_changes(events: &[DeviceEvent]) -> Vec<CameraChange> {
        events
            .iter()
            .filter_map(|e| match e {
                DeviceEvent::Camera { change, .. } => Some(change.clone()),
                _ => None,
            })
            .collect()
    }

    fn exposure_def() -> DefVector {
        DefVector::number(
            CCD,
            "CCD_EXPOSURE",
            vec![DefNumber::new("CCD_EXPOSURE_VALUE", 1.0, 0.001, 3600.0, 0.001)],
        )
    }

    #[test]
    fn test_exposure_lifecycle() {
        let (device, _rx) = connected_device(CCD, KindState::Camera(CameraState::default()));

        let changes = camera_changes(&device.apply_def(&exposure_def()));
        assert_eq!(changes, vec![CameraChange::ExposureMinMax { min: 0.001, max: 3600.0 }]);

        let busy = SetVector::number(CCD, "CCD_EXPOSURE", PropertyState::Busy, [("CCD_EXPOSURE_VALUE", 4.0)]);
        let changes = camera_changes(&device.apply_set(&busy));
        assert!(changes.contains(&CameraChange::ExposureProgress(4.0)));
        assert!(changes.contains(&CameraChange::Exposuring(true)));

        let done = SetVector::number(CCD, "CCD_EXPOSURE", PropertyState::Ok, [("CCD_EXPOSURE_VALUE", 0.0)]);
        let changes = camera_changes(&device.apply_set(&done));
        assert!(changes.contains(&CameraChange::ExposureFinished));
        assert!(changes.contains(&CameraChange::Exposuring(false)));
        assert!(changes.contains(&CameraChange::ExposureState {
            previous: PropertyState::Busy,
            current: PropertyState::Ok,
        }));

        let state = device.camera().unwrap();
        assert!(!state.exposuring);
        assert_eq!(state.exposure_state, PropertyState::Ok);
    }

    #[test]
    fn test_exposure_abort_and_failure() {
        let (device, _rx) = connected_device(CCD, KindState::Camera(CameraState::default()));
        device.apply_def(&exposure_def());

        let busy = SetVector::number(CCD, "CCD_EXPOSURE", PropertyState::Busy, [("CCD_EXPOSURE_VALUE", 2.0)]);
        device.apply_set(&busy);
        let idle = SetVector::number(CCD, "CCD_EXPOSURE", PropertyState::Idle, [("CCD_EXPOSURE_VALUE", 0.0)]);
        assert!(camera_changes(&device.apply_set(&idle)).contains(&CameraChange::ExposureAborted));

        let alert = SetVector::number(CCD, "CCD_EXPOSURE", PropertyState::Alert, [("CCD_EXPOSURE_VALUE", 0.0)]);
        assert!(camera_changes(&device.apply_set(&alert)).contains(&CameraChange::ExposureFailed));
        // A repeated alert is not a new failure
        assert!(!camera_changes(&device.apply_set(&alert)).contains(&CameraChange::ExposureFailed));
    }

    #[test]
    fn test_frame_ignores_zeroed_limits() {
        let (device, _rx) = connected_device(CCD, KindState::Camera(CameraState::default()));
        let zeroed = DefVector::number(
            CCD,
            "CCD_FRAME",
            vec![
                DefNumber::new("X", 0.0, 0.0, 0.0, 1.0),
                DefNumber::new("Y", 0.0, 0.0, 0.0, 1.0),
                DefNumber::new("WIDTH", 0.0, 0.0, 0.0, 1.0),
                DefNumber::new("HEIGHT", 0.0, 0.0, 0.0, 1.0),
            ],
        );
        let changes = camera_changes(&device.apply_def(&zeroed));
        assert_eq!(changes, vec![CameraChange::CanSubFrame(true)]);

        let sized = DefVector::number(
            CCD,
            "CCD_FRAME",
            vec![
                DefNumber::new("X", 0.0, 0.0, 1279.0, 1.0),
                DefNumber::new("Y", 0.0, 0.0, 1023.0, 1.0),
                DefNumber::new("WIDTH", 1280.0, 1.0, 1280.0, 1.0),
                DefNumber::new("HEIGHT", 1024.0, 1.0, 1024.0, 1.0),
            ],
        );
        device.apply_def(&sized);
        let state = device.camera().unwrap();
        assert_eq!(state.frame.width, 1280);
        assert_eq!(state.frame_bounds.max_y, 1023);
    }

    #[test]
    fn test_asi_gain_from_controls() {
        let (device, mut rx) = connected_device("ZWO CCD ASI120MM", KindState::Camera(CameraState::asi()));
        let controls = DefVector::number(
            "ZWO CCD ASI120MM",
            "CCD_CONTROLS",
            vec![
                DefNumber::new("Gain", 50.0, 0.0, 100.0, 1.0),
                DefNumber::new("Offset", 10.0, 0.0, 255.0, 1.0),
            ],
        );
        let changes = camera_changes(&device.apply_def(&controls));
        assert!(changes.contains(&CameraChange::Gain(50)));
        assert!(changes.contains(&CameraChange::OffsetMinMax { min: 0, max: 255 }));

        // Merging state never sends anything
        assert!(rx.try_recv().is_err());

        device.set_gain(80).unwrap();
        match rx.try_recv().unwrap() {
            OutboundMessage::NewNumberVector { name, elements, .. } => {
                assert_eq!(name, "CCD_CONTROLS");
                assert_eq!(elements[0].name, "Gain");
                assert_eq!(elements[0].value, 80.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_commands_check_capabilities() {
        let (device, mut rx) = connected_device(CCD, KindState::Camera(CameraState::default()));

        assert!(matches!(device.abort_capture(), Err(DeviceError::Unsupported { .. })));
        assert!(matches!(device.enable_cooler(true), Err(DeviceError::Unsupported { .. })));

        let abort = DefVector::switch(CCD, "CCD_ABORT_EXPOSURE", SwitchRule::AtMostOne, vec![DefSwitch::new("ABORT", false)]);
        device.apply_def(&abort);
        let binning = DefVector::number(
            CCD,
            "CCD_BINNING",
            vec![DefNumber::new("HOR_BIN", 1.0, 1.0, 4.0, 1.0), DefNumber::new("VER_BIN", 1.0, 1.0, 4.0, 1.0)],
        )
        .with_permission(PropertyPermission::ReadWrite);
        device.apply_def(&binning);

        device.abort_capture().unwrap();
        assert!(matches!(rx.try_recv().unwrap(), OutboundMessage::NewSwitchVector { .. }));

        assert!(matches!(device.set_bin(8, 1), Err(DeviceError::InvalidValue(_))));
        device.set_bin(2, 2).unwrap();
        device.start_capture(Duration::from_millis(1500)).unwrap();
        rx.try_recv().unwrap();
        match rx.try_recv().unwrap() {
            OutboundMessage::NewNumberVector { name, elements, .. } => {
                assert_eq!(name, "CCD_EXPOSURE");
                assert_eq!(elements[0].value, 1.5);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
