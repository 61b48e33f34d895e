//! The tracked-device registry.
//!
//! Tracked devices are keyed by id: adding a device whose id is already
//! present is a no-op, and removing matches on id alone.  The TOML-backed
//! implementation persists every successful mutation to `devices.toml`
//! under the data directory; a persist failure rolls the in-memory change
//! back so memory and disk never disagree.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use lansync_core::Device;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Store for the devices this node has paired with.
///
/// `add` and `remove` return whether the registry changed.  Production
/// code uses [`TomlDeviceRegistry`]; tests and embedders can use
/// [`InMemoryDeviceRegistry`].
pub trait DeviceRegistry: Send + Sync {
    /// All tracked devices, in unspecified order.
    fn get(&self) -> Vec<Device>;

    /// Adds `device`; returns `false` when its id is already tracked or
    /// the addition could not be persisted.
    fn add(&self, device: Device) -> bool;

    /// Removes the device with `device`'s id; returns `false` when no
    /// such device is tracked or the removal could not be persisted.
    fn remove(&self, device: &Device) -> bool;
}

fn lock_devices(devices: &Mutex<HashMap<String, Device>>) -> std::sync::MutexGuard<'_, HashMap<String, Device>> {
    devices.lock().unwrap_or_else(|e| e.into_inner())
}

/// Purely in-memory registry.  Nothing survives a restart.
#[derive(Default)]
pub struct InMemoryDeviceRegistry {
    devices: Mutex<HashMap<String, Device>>,
}

impl InMemoryDeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeviceRegistry for InMemoryDeviceRegistry {
    fn get(&self) -> Vec<Device> {
        lock_devices(&self.devices).values().cloned().collect()
    }

    fn add(&self, device: Device) -> bool {
        let mut devices = lock_devices(&self.devices);
        if devices.contains_key(&device.id) {
            return false;
        }
        devices.insert(device.id.clone(), device);
        true
    }

    fn remove(&self, device: &Device) -> bool {
        lock_devices(&self.devices).remove(&device.id).is_some()
    }
}

#[derive(Serialize, Deserialize, Default)]
struct DeviceFile {
    #[serde(default)]
    devices: Vec<Device>,
}

/// Registry persisted to `devices.toml` under the data directory.
pub struct TomlDeviceRegistry {
    path: PathBuf,
    devices: Mutex<HashMap<String, Device>>,
}

impl TomlDeviceRegistry {
    /// Opens the registry, loading `devices.toml` from `data_dir` when it
    /// exists.  A missing file means an empty registry; an unreadable or
    /// unparsable file is an error so tracked devices are never silently
    /// dropped.
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let path = data_dir.join("devices.toml");
        let devices = match std::fs::read_to_string(&path) {
            Ok(text) => {
                let file: DeviceFile = toml::from_str(&text)?;
                debug!("loaded {} tracked devices from {}", file.devices.len(), path.display());
                file.devices.into_iter().map(|d| (d.id.clone(), d)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            devices: Mutex::new(devices),
        })
    }

    /// Writes the current device set to disk, sorted by id for stable
    /// diffs.
    fn persist(&self, devices: &HashMap<String, Device>) -> anyhow::Result<()> {
        let mut list: Vec<Device> = devices.values().cloned().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        let text = toml::to_string_pretty(&DeviceFile { devices: list })?;
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

impl DeviceRegistry for TomlDeviceRegistry {
    fn get(&self) -> Vec<Device> {
        lock_devices(&self.devices).values().cloned().collect()
    }

    fn add(&self, device: Device) -> bool {
        let mut devices = lock_devices(&self.devices);
        if devices.contains_key(&device.id) {
            return false;
        }
        let id = device.id.clone();
        devices.insert(id.clone(), device);
        if let Err(e) = self.persist(&devices) {
            warn!("failed to persist device registry: {e}");
            devices.remove(&id);
            return false;
        }
        true
    }

    fn remove(&self, device: &Device) -> bool {
        let mut devices = lock_devices(&self.devices);
        let Some(removed) = devices.remove(&device.id) else {
            return false;
        };
        if let Err(e) = self.persist(&devices) {
            warn!("failed to persist device registry: {e}");
            devices.insert(removed.id.clone(), removed);
            return false;
        }
        true
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
