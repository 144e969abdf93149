// ── Device store ──
//
// Durable map of device id -> device definition. The file store keeps a
// single JSON document and replaces it atomically on every change.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::debug;

use crate::config::DeviceConfig;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("device store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("device store {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot serialize device store: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Persistence for device definitions.
pub trait DeviceStore: Send + Sync {
    /// All devices, ordered by id.
    fn list(&self) -> Result<Vec<DeviceConfig>, StoreError>;

    /// Insert or replace by id. Returns the stored (normalized) record.
    fn upsert(&self, device: DeviceConfig) -> Result<DeviceConfig, StoreError>;

    /// Returns whether a record was deleted.
    fn remove(&self, id: &str) -> Result<bool, StoreError>;

    fn get(&self, id: &str) -> Result<Option<DeviceConfig>, StoreError> {
        Ok(self.list()?.into_iter().find(|d| d.id == id))
    }
}

type DeviceMap = BTreeMap<String, DeviceConfig>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── FileStore ───────────────────────────────────────────────────────

/// JSON file backed store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    guard: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn load(&self) -> Result<DeviceMap, StoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(DeviceMap::new()),
            Err(e) => return Err(self.io_err(e)),
        };
        if raw.trim().is_empty() {
            return Ok(DeviceMap::new());
        }
        serde_json::from_str(&raw).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn persist(&self, devices: &DeviceMap) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let body = serde_json::to_string_pretty(devices).map_err(StoreError::Serialize)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, body).map_err(|e| self.io_err(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;
        debug!(path = %self.path.display(), devices = devices.len(), "device store written");
        Ok(())
    }
}

impl DeviceStore for FileStore {
    fn list(&self) -> Result<Vec<DeviceConfig>, StoreError> {
        let _guard = lock(&self.guard);
        Ok(self.load()?.into_values().map(DeviceConfig::normalized).collect())
    }

    fn upsert(&self, device: DeviceConfig) -> Result<DeviceConfig, StoreError> {
        let device = device.normalized();
        let _guard = lock(&self.guard);
        let mut devices = self.load()?;
        devices.insert(device.id.clone(), device.clone());
        self.persist(&devices)?;
        Ok(device)
    }

    fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let _guard = lock(&self.guard);
        let mut devices = self.load()?;
        if devices.remove(id).is_none() {
            return Ok(false);
        }
        self.persist(&devices)?;
        Ok(true)
    }
}

// ── MemoryStore ─────────────────────────────────────────────────────

/// Non-persistent store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    devices: Mutex<DeviceMap>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeviceStore for MemoryStore {
    fn list(&self) -> Result<Vec<DeviceConfig>, StoreError> {
        Ok(lock(&self.devices).values().cloned().collect())
    }

    fn upsert(&self, device: DeviceConfig) -> Result<DeviceConfig, StoreError> {
        let device = device.normalized();
        lock(&self.devices).insert(device.id.clone(), device.clone());
        Ok(device)
    }

    fn remove(&self, id: &str) -> Result<bool, StoreError> {
        Ok(lock(&self.devices).remove(id).is_some())
    }
}
