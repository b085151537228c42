/*!
 * Device registry and driver classifier.
 *
 * Drivers announce themselves with a `DRIVER_INFO` vector whose
 * `DRIVER_INTERFACE` bitmask selects the device kinds to attach. The
 * registry keeps one shared [`Device`] per name and a table per kind; vendor
 * specializations are chosen by driver executable through a [`DriverTable`].
 */
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use astroflow_core::config::DriversConfig;

use crate::device::{Attachment, Device, DeviceError, DeviceKind, DriverInfo, Result};
use crate::devices::{CameraState, KindState, MountState};
use crate::event::DeviceEvent;
use crate::protocol::DefVector;
use crate::sender::MessageSender;

/// Builds the initial state of a camera
pub type CameraFactory = fn() -> CameraState;

/// Builds the initial state of a mount
pub type MountFactory = fn() -> MountState;

/// Vendor specializations keyed by driver executable
#[derive(Debug, Clone)]
pub struct DriverTable {
    cameras: HashMap<String, CameraFactory>,
    mounts: HashMap<String, MountFactory>,
}

impl Default for DriverTable {
    fn default() -> Self {
        Self::empty()
            .with_camera("indi_asi_ccd", CameraState::asi)
            .with_camera("indi_asi_single_ccd", CameraState::asi)
            .with_mount("indi_ioptronv3_telescope", MountState::ioptron_v3)
    }
}

impl DriverTable {
    /// A table without any specialization
    pub fn empty() -> Self {
        Self {
            cameras: HashMap::new(),
            mounts: HashMap::new(),
        }
    }

    /// Use `factory` for cameras driven by `executable`
    pub fn with_camera<S: Into<String>>(mut self, executable: S, factory: CameraFactory) -> Self {
        self.cameras.insert(executable.into(), factory);
        self
    }

    /// Use `factory` for mounts driven by `executable`
    pub fn with_mount<S: Into<String>>(mut self, executable: S, factory: MountFactory) -> Self {
        self.mounts.insert(executable.into(), factory);
        self
    }

    /// The default table extended with the `[drivers]` configuration section
    pub fn from_config(config: &DriversConfig) -> Result<Self> {
        let mut table = Self::default();
        for (executable, profile) in &config.cameras {
            let factory: CameraFactory = match profile.as_str() {
                "asi" => CameraState::asi,
                "generic" => CameraState::default,
                other => {
                    return Err(DeviceError::invalid_value(format!(
                        "unknown camera profile {} for {}",
                        other, executable
                    )))
                }
            };
            table.cameras.insert(executable.clone(), factory);
        }
        for (executable, profile) in &config.mounts {
            let factory: MountFactory = match profile.as_str() {
                "ioptron-v3" => MountState::ioptron_v3,
                "generic" => MountState::default,
                other => {
                    return Err(DeviceError::invalid_value(format!(
                        "unknown mount profile {} for {}",
                        other, executable
                    )))
                }
            };
            table.mounts.insert(executable.clone(), factory);
        }
        Ok(table)
    }

    /// Initial state of `kind` for a device driven by `executable`
    pub fn state_for(&self, kind: DeviceKind, executable: &str) -> KindState {
        match kind {
            DeviceKind::Camera => match self.cameras.get(executable) {
                Some(factory) => KindState::Camera(factory()),
                None => KindState::default_for(kind),
            },
            DeviceKind::Mount => match self.mounts.get(executable) {
                Some(factory) => KindState::Mount(factory()),
                None => KindState::default_for(kind),
            },
            _ => KindState::default_for(kind),
        }
    }
}

/// Outcome of classifying a `DRIVER_INFO` vector
#[derive(Debug)]
pub enum Registration {
    /// The device holds at least one modelled kind
    Registered {
        /// The device
        device: Arc<Device>,
        /// `Attached` events for newly registered kinds; empty on re-registration
        events: Vec<DeviceEvent>,
    },
    /// No modelled capability bit was set
    Rejected {
        /// Whether this is the first rejection of the name
        first: bool,
    },
}

/// Registered devices, by name and by kind
#[derive(Debug)]
pub struct DeviceRegistry {
    devices: IndexMap<String, Arc<Device>>,
    tables: IndexMap<DeviceKind, IndexMap<String, Arc<Device>>>,
    rejected: HashSet<String>,
    drivers: DriverTable,
    sender: Arc<dyn MessageSender>,
    message_log_capacity: usize,
}

impl DeviceRegistry {
    /// Create an empty registry
    pub fn new(drivers: DriverTable, sender: Arc<dyn MessageSender>, message_log_capacity: usize) -> Self {
        Self {
            devices: IndexMap::new(),
            tables: IndexMap::new(),
            rejected: HashSet::new(),
            drivers,
            sender,
            message_log_capacity,
        }
    }

    /// Classify a driver and attach the kinds its capability bitmask selects.
    /// A rejected name stays rejected.
    pub fn on_driver_info(&mut self, def: &DefVector) -> Registration {
        let name = def.device.clone();
        if self.rejected.contains(&name) {
            return Registration::Rejected { first: false };
        }
        let info = DriverInfo::from_def(def);
        let kinds = DeviceKind::from_interface(info.interface);

        if kinds.is_empty() {
            let first = self.rejected.insert(name.clone());
            if first {
                warn!(
                    device = %name,
                    driver = %info.executable,
                    interface = info.interface.bits(),
                    "Driver has no supported interface, ignoring device"
                );
            }
            return Registration::Rejected { first };
        }

        let device = match self.devices.get(&name) {
            Some(device) => device.clone(),
            None => {
                debug!(device = %name, driver = %info.executable, "Creating device");
                let executable = info.executable.clone();
                let device = Arc::new(Device::new(
                    name.clone(),
                    info,
                    self.sender.clone(),
                    self.message_log_capacity,
                ));
                self.devices.insert(name.clone(), device.clone());
                info!(device = %name, driver = %executable, "Device registered");
                device
            }
        };

        let executable = device.driver().executable.clone();
        let mut events = Vec::new();
        for kind in kinds {
            let table = self.tables.entry(kind).or_default();
            if table.contains_key(&name) {
                continue;
            }
            table.insert(name.clone(), device.clone());
            let state = self.drivers.state_for(kind, &executable);
            events.extend(device.attach(state, Attachment::Primary));
        }

        Registration::Registered { device, events }
    }

    /// Whether the name was rejected as unclassifiable
    pub fn is_rejected(&self, name: &str) -> bool {
        self.rejected.contains(name)
    }

    /// Device by name
    pub fn find_by_name(&self, name: &str) -> Option<Arc<Device>> {
        self.devices.get(name).cloned()
    }

    /// Every device, in registration order
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.devices.values().cloned().collect()
    }

    /// Devices currently acting as `kind`, primary or secondary
    pub fn devices_of(&self, kind: DeviceKind) -> Vec<Arc<Device>> {
        self.devices
            .values()
            .filter(|device| device.has_role(kind))
            .cloned()
            .collect()
    }

    /// Devices registered in the table of a primary kind
    pub fn table(&self, kind: DeviceKind) -> Vec<Arc<Device>> {
        self.tables
            .get(&kind)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove a device from every table and detach all its kinds.
    ///
    /// Returns `None` if the device was not registered.
    pub fn unregister(&mut self, device: &Arc<Device>) -> Option<Vec<DeviceEvent>> {
        let name = device.name();
        match self.devices.get(name) {
            Some(registered) if Arc::ptr_eq(registered, device) => {}
            _ => return None,
        }
        self.devices.shift_remove(name);
        for table in self.tables.values_mut() {
            table.shift_remove(name);
        }
        info!(device = %name, "Device unregistered");
        Some(device.detach_all())
    }

    /// Unregister every device, returning the `Detached` events
    pub fn clear(&mut self) -> Vec<DeviceEvent> {
        let devices: Vec<_> = self.devices.values().cloned().collect();
        let events = devices
            .iter()
            .filter_map(|device| self.unregister(device))
            .flatten()
            .collect();
        self.tables.clear();
        self.rejected.clear();
        events
    }

    /// Number of registered devices
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether no device is registered
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::devices::CameraProfile;
    use crate::protocol::{DefText, DRIVER_INFO};
    use crate::sender::NullSender;

    pub(crate) fn driver_info(device: &str, executable: &str, interface: u32) -> DefVector {
        DefVector::text(
            device,
            DRIVER_INFO,
            vec![
                DefText::new("DRIVER_NAME", device),
                DefText::new("DRIVER_EXEC", executable),
                DefText::new("DRIVER_VERSION", "1.0"),
                DefText::new("DRIVER_INTERFACE", interface.to_string()),
            ],
        )
    }

    fn registry() -> DeviceRegistry {
        DeviceRegistry::new(DriverTable::default(), Arc::new(NullSender), 100)
    }

    fn attached(registration: &Registration) -> Vec<DeviceKind> {
        match registration {
            Registration::Registered { events, .. } => events
                .iter()
                .filter_map(|e| match e {
                    DeviceEvent::Attached { kind, .. } => Some(*kind),
                    _ => None,
                })
                .collect(),
            Registration::Rejected { .. } => panic!("unexpected rejection"),
        }
    }

    #[test]
    fn test_bitmask_selects_kinds() {
        let mut registry = registry();
        // TELESCOPE | GUIDER | GPS
        let registration = registry.on_driver_info(&driver_info("EQMod Mount", "indi_eqmod_telescope", 0b100_0101));
        assert_eq!(
            attached(&registration),
            vec![DeviceKind::Mount, DeviceKind::Gps, DeviceKind::GuideOutput]
        );
        assert_eq!(registry.table(DeviceKind::Mount).len(), 1);
        assert_eq!(registry.devices_of(DeviceKind::GuideOutput).len(), 1);
        assert!(registry.table(DeviceKind::Camera).is_empty());
    }

    #[test]
    fn test_reregistration_is_noop() {
        let mut registry = registry();
        let info = driver_info("CCD Simulator", "indi_simulator_ccd", 2);
        assert_eq!(attached(&registry.on_driver_info(&info)), vec![DeviceKind::Camera]);
        assert!(attached(&registry.on_driver_info(&info)).is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unclassifiable_driver_rejected_once() {
        let mut registry = registry();
        // DOME only
        let info = driver_info("Dome Simulator", "indi_simulator_dome", 32);
        assert!(matches!(registry.on_driver_info(&info), Registration::Rejected { first: true }));
        assert!(matches!(registry.on_driver_info(&info), Registration::Rejected { first: false }));
        assert!(registry.is_rejected("Dome Simulator"));
        assert!(registry.find_by_name("Dome Simulator").is_none());

        // A later driver info with a modelled bit does not revive the name
        let info = driver_info("Dome Simulator", "indi_simulator_dome", 32 | 8);
        assert!(matches!(registry.on_driver_info(&info), Registration::Rejected { first: false }));
        assert!(registry.find_by_name("Dome Simulator").is_none());
        assert!(registry.table(DeviceKind::Focuser).is_empty());
    }

    #[test]
    fn test_vendor_specialization_by_executable() {
        let mut registry = registry();
        registry.on_driver_info(&driver_info("ZWO CCD ASI294MC", "indi_asi_ccd", 2));
        let camera = registry.find_by_name("ZWO CCD ASI294MC").unwrap().camera().unwrap();
        assert_eq!(camera.profile, CameraProfile::Asi);
    }

    #[test]
    fn test_driver_table_from_config() {
        let mut config = DriversConfig::default();
        config.cameras.insert("indi_custom_ccd".to_string(), "asi".to_string());
        let table = DriverTable::from_config(&config).unwrap();
        assert!(matches!(
            table.state_for(DeviceKind::Camera, "indi_custom_ccd"),
            KindState::Camera(CameraState { profile: CameraProfile::Asi, .. })
        ));
        assert!(matches!(
            table.state_for(DeviceKind::Camera, "indi_asi_ccd"),
            KindState::Camera(CameraState { profile: CameraProfile::Asi, .. })
        ));

        config.mounts.insert("indi_lx200".to_string(), "lx200".to_string());
        assert!(matches!(DriverTable::from_config(&config), Err(DeviceError::InvalidValue(_))));
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let mut registry = registry();
        let registration = registry.on_driver_info(&driver_info("Focuser Simulator", "indi_simulator_focus", 8));
        let Registration::Registered { device, .. } = registration else {
            panic!("expected registration");
        };

        let events = registry.unregister(&device).unwrap();
        assert!(matches!(
            events.as_slice(),
            [DeviceEvent::Detached {
                kind: DeviceKind::Focuser,
                ..
            }]
        ));
        assert!(registry.unregister(&device).is_none());
        assert!(registry.is_empty());
        assert!(registry.table(DeviceKind::Focuser).is_empty());
    }
}
