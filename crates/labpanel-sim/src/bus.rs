//! In-memory device bus.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use labpanel_core::bus::{DeviceBus, DeviceProxy};
use labpanel_core::error::{BusError, BusErrorKind};
use parking_lot::{Mutex, RwLock};

use crate::device::SimDevice;

/// Name used for database errors.
const DATABASE: &str = "database";

/// Device registry plus the free-property database.
pub struct SimBus {
    devices: RwLock<BTreeMap<String, Arc<SimDevice>>>,
    free_properties: Mutex<HashMap<(String, String), Vec<String>>>,
    database_online: AtomicBool,
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBus {
    /// Empty bus with a reachable database.
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(BTreeMap::new()),
            free_properties: Mutex::new(HashMap::new()),
            database_online: AtomicBool::new(true),
        }
    }

    /// Register a device, replacing any device of the same name.
    pub fn add_device(&self, device: Arc<SimDevice>) -> Arc<SimDevice> {
        let key = device.name().to_lowercase();
        self.devices.write().insert(key, Arc::clone(&device));
        device
    }

    /// Simulated device registered as `name`.
    pub fn device(&self, name: &str) -> Option<Arc<SimDevice>> {
        self.devices.read().get(&name.to_lowercase()).cloned()
    }

    pub fn device_names(&self) -> Vec<String> {
        self.devices
            .read()
            .values()
            .map(|d| d.name().to_string())
            .collect()
    }

    /// Seed a free property without going through [`DeviceBus::put_property`].
    pub fn set_free_property(&self, object: &str, key: &str, values: Vec<String>) {
        self.free_properties
            .lock()
            .insert((object.to_string(), key.to_string()), values);
    }

    /// Make database queries fail, as when the database server is down.
    pub fn set_database_online(&self, online: bool) {
        self.database_online.store(online, Ordering::SeqCst);
    }

    fn check_database(&self) -> Result<(), BusError> {
        if self.database_online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BusError::new(
                DATABASE,
                BusErrorKind::Connection,
                "Database server is not reachable",
            ))
        }
    }
}

impl std::fmt::Debug for SimBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimBus")
            .field("devices", &self.devices.read().len())
            .field("free_properties", &self.free_properties.lock().len())
            .finish()
    }
}

impl DeviceBus for SimBus {
    fn connect(&self, device: &str) -> Result<Arc<dyn DeviceProxy>, BusError> {
        match self.device(device) {
            Some(dev) => Ok(dev),
            None => Err(BusError::new(
                device,
                BusErrorKind::Connection,
                format!("Device {} is not defined in the database", device),
            )),
        }
    }

    fn exported_devices(&self, class: &str) -> Result<Vec<String>, BusError> {
        self.check_database()?;
        Ok(self
            .devices
            .read()
            .values()
            .filter(|d| d.class().eq_ignore_ascii_case(class))
            .map(|d| d.name().to_string())
            .collect())
    }

    fn device_property(&self, device: &str, key: &str) -> Result<Vec<String>, BusError> {
        self.check_database()?;
        let dev = self
            .device(device)
            .ok_or_else(|| BusError::not_found(DATABASE, device))?;
        // Served by the database, the device server may be down.
        Ok(dev.stored_property(key))
    }

    fn get_property(&self, object: &str, key: &str) -> Result<Vec<String>, BusError> {
        self.check_database()?;
        Ok(self
            .free_properties
            .lock()
            .get(&(object.to_string(), key.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn put_property(&self, object: &str, key: &str, values: Vec<String>) -> Result<(), BusError> {
        self.check_database()?;
        tracing::debug!(object, key, ?values, "Storing free property");
        self.set_free_property(object, key, values);
        Ok(())
    }
}
