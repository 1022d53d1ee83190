//! Device identity: platform detection, file-backed persistence and the
//! provider that ties them together.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use domain::models::DeviceIdentity;
use domain::services::{IdentityError, IdentityStore};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::DeviceConfig;

const IDENTITY_FILE: &str = "identity.json";

const KEY_DEVICE_ID: &str = "device_id";

const UNKNOWN: &str = "unknown";

/// Identity store persisted as a flat JSON object in `<state_dir>/identity.json`.
///
/// Writes go to a temporary file that is renamed over the original, so a
/// crash never leaves a half-written identity behind.
#[derive(Debug)]
pub struct FileIdentityStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileIdentityStore {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            path: state_dir.as_ref().join(IDENTITY_FILE),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, IdentityError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw).map_err(|e| {
            IdentityError::Corrupt(format!("{}: {}", self.path.display(), e))
        })
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<(), IdentityError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let body = serde_json::to_vec_pretty(values)
            .map_err(|e| IdentityError::Corrupt(e.to_string()))?;

        let staged = self.path.with_extension("json.tmp");
        fs::write(&staged, body)?;
        fs::rename(&staged, &self.path)?;
        Ok(())
    }
}

impl IdentityStore for FileIdentityStore {
    fn get(&self, key: &str) -> Result<Option<String>, IdentityError> {
        let _guard = self.lock.lock().unwrap();
        Ok(self.read_all()?.remove(key))
    }

    fn put(&self, key: &str, value: &str) -> Result<(), IdentityError> {
        let _guard = self.lock.lock().unwrap();
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values)
    }

    fn get_or_create(
        &self,
        key: &str,
        create: &dyn Fn() -> String,
    ) -> Result<String, IdentityError> {
        // Hold the lock across read and write so concurrent callers agree.
        let _guard = self.lock.lock().unwrap();
        let mut values = self.read_all()?;
        if let Some(existing) = values.get(key) {
            return Ok(existing.clone());
        }

        let value = create();
        values.insert(key.to_string(), value.clone());
        self.write_all(&values)?;
        debug!(key, path = %self.path.display(), "Identity value persisted");
        Ok(value)
    }
}

/// What the host reports about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformInfo {
    pub manufacturer: String,
    pub model: String,
    pub os_version: String,
    /// Stable per-installation identifier, if the platform has one.
    pub platform_id: Option<String>,
}

impl PlatformInfo {
    /// Detects host facts, preferring configured overrides.
    ///
    /// On Linux the DMI vendor/product, `/etc/machine-id` and the kernel
    /// release are used. Missing values fall back to `unknown`.
    pub fn detect(overrides: &DeviceConfig) -> Self {
        let manufacturer = overrides
            .manufacturer
            .clone()
            .or_else(|| read_trimmed("/sys/class/dmi/id/sys_vendor"))
            .unwrap_or_else(|| UNKNOWN.to_string());

        let model = overrides
            .model
            .clone()
            .or_else(|| read_trimmed("/sys/class/dmi/id/product_name"))
            .unwrap_or_else(|| UNKNOWN.to_string());

        let os_version = overrides
            .os_version
            .clone()
            .or_else(|| read_trimmed("/proc/sys/kernel/osrelease"))
            .unwrap_or_else(|| UNKNOWN.to_string());

        let platform_id = overrides
            .platform_id
            .clone()
            .or_else(|| read_trimmed("/etc/machine-id"));

        Self {
            manufacturer,
            model,
            os_version,
            platform_id,
        }
    }

    /// Builds a fresh identifier for this host.
    pub fn derive_id(&self) -> String {
        let platform_id = self
            .platform_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        DeviceIdentity::derive_id(&self.manufacturer, &self.model, &platform_id)
    }
}

fn read_trimmed(path: &str) -> Option<String> {
    let value = fs::read_to_string(path).ok()?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Produces the device identity, creating and persisting the identifier on
/// first use.
///
/// Only the identifier is persisted. Manufacturer, model and OS version are
/// taken from the platform on every start. Two providers over the same store
/// agree on the identifier.
pub struct DeviceIdentityProvider {
    store: Arc<dyn IdentityStore>,
    platform: PlatformInfo,
    cached: OnceLock<DeviceIdentity>,
}

impl DeviceIdentityProvider {
    pub fn new(store: Arc<dyn IdentityStore>, platform: PlatformInfo) -> Self {
        Self {
            store,
            platform,
            cached: OnceLock::new(),
        }
    }

    pub fn identity(&self) -> Result<DeviceIdentity, IdentityError> {
        if let Some(identity) = self.cached.get() {
            return Ok(identity.clone());
        }

        let platform = &self.platform;
        let id = self
            .store
            .get_or_create(KEY_DEVICE_ID, &|| platform.derive_id())?;

        if platform.platform_id.is_none() {
            warn!("No platform identifier available, using a generated one");
        }

        let identity = DeviceIdentity {
            id,
            manufacturer: platform.manufacturer.clone(),
            model: platform.model.clone(),
            os_version: platform.os_version.clone(),
        };
        let identity = self.cached.get_or_init(|| identity).clone();
        info!(device_id = %identity.id, name = %identity.display_name(), "Device identity ready");
        Ok(identity)
    }
}
