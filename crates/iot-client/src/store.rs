//! Persisted device record
//!
//! The core reads the record once at boot and treats it as immutable for the
//! rest of the session. It is only written on first boot and on reset.

use iot_core::{IdentifyBody, DEFAULT_PORT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ConfigError;

/// Bump when the stored layout changes; older records are reset to defaults
pub const SCHEMA_VERSION: u32 = 1;

pub const MAX_SSID_LEN: usize = 32;
pub const MAX_PASSWORD_LEN: usize = 32;
pub const MAX_HOST_LEN: usize = 64;
pub const MAX_UUID_LEN: usize = 36;
pub const MAX_PAYLOAD_LEN: usize = 256;

/// Stored device configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub schema_version: u32,
    pub ssid: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub uuid: String,
    pub device_type: String,
    /// Free-form JSON handed to the server on identify
    pub payload: String,
}

impl DeviceConfig {
    /// First-boot record with a fresh UUID
    pub fn defaults(device_type: &str) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            ssid: String::new(),
            password: String::new(),
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            uuid: Uuid::new_v4().to_string(),
            device_type: device_type.to_string(),
            payload: "{\"name\": \"Test Light\"}".to_string(),
        }
    }

    /// Identify reply body for this device
    pub fn identity(&self) -> IdentifyBody {
        IdentifyBody::new(&self.uuid, &self.device_type, &self.payload)
    }

    /// Check the field limits of the stored layout
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ConfigError::SchemaMismatch {
                found: self.schema_version,
                expected: SCHEMA_VERSION,
            });
        }

        let limits = [
            ("ssid", &self.ssid, MAX_SSID_LEN),
            ("password", &self.password, MAX_PASSWORD_LEN),
            ("host", &self.host, MAX_HOST_LEN),
            ("uuid", &self.uuid, MAX_UUID_LEN),
            ("payload", &self.payload, MAX_PAYLOAD_LEN),
        ];
        for (field, value, max) in limits {
            if value.len() > max {
                return Err(ConfigError::Invalid(format!(
                    "{field} is {} bytes (max {max})",
                    value.len()
                )));
            }
        }

        if self.host.is_empty() {
            return Err(ConfigError::Invalid("host is empty".into()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port is 0".into()));
        }
        if self.uuid.is_empty() {
            return Err(ConfigError::Invalid("uuid is empty".into()));
        }
        if self.device_type.is_empty() {
            return Err(ConfigError::Invalid("device_type is empty".into()));
        }
        Ok(())
    }
}

/// Storage for the device record
pub trait ConfigStore: Send {
    /// Read the stored record
    fn load(&self) -> Result<DeviceConfig, ConfigError>;

    /// Replace the stored record
    fn save(&mut self, config: &DeviceConfig) -> Result<(), ConfigError>;

    /// Whether a readable record of the current schema exists
    fn is_valid(&self) -> bool {
        self.load().and_then(|config| config.validate()).is_ok()
    }

    /// Remove the stored record
    fn erase(&mut self) -> Result<(), ConfigError>;
}

/// TOML file store
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<DeviceConfig, ConfigError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::Missing)
            }
            Err(e) => return Err(e.into()),
        };
        Ok(toml::from_str(&text)?)
    }

    fn save(&mut self, config: &DeviceConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let text = toml::to_string_pretty(config)?;

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &self.path)?;

        debug!("Saved configuration to {}", self.path.display());
        Ok(())
    }

    fn erase(&mut self) -> Result<(), ConfigError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    record: Option<DeviceConfig>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding `record` as-is, without validation
    pub fn with_record(record: DeviceConfig) -> Self {
        Self {
            record: Some(record),
        }
    }

    pub fn record(&self) -> Option<&DeviceConfig> {
        self.record.as_ref()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<DeviceConfig, ConfigError> {
        self.record.clone().ok_or(ConfigError::Missing)
    }

    fn save(&mut self, config: &DeviceConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.record = Some(config.clone());
        Ok(())
    }

    fn erase(&mut self) -> Result<(), ConfigError> {
        self.record = None;
        Ok(())
    }
}

/// Why boot asks for a restart
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartReason {
    /// Nothing stored yet; defaults were written
    FirstBoot,
    /// Stored record unusable; reset to defaults
    Corrupted(String),
}

/// Boot decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Boot {
    Ready(DeviceConfig),
    Restart(RestartReason),
}

/// Read the device record, writing defaults on first boot or corruption.
///
/// A `Restart` result means the store was rewritten and the caller should
/// start over, the way the device reboots after writing its flash.
pub fn boot(store: &mut dyn ConfigStore, device_type: &str) -> Result<Boot, ConfigError> {
    if store.is_valid() {
        let config = store.load()?;
        if serde_json::from_str::<serde_json::Value>(&config.payload).is_err() {
            warn!("Device payload is not valid JSON, serving it verbatim");
        }
        info!(
            "Loaded configuration: uuid={} type={} server={}:{}",
            config.uuid, config.device_type, config.host, config.port
        );
        return Ok(Boot::Ready(config));
    }

    let reason = match store.load().and_then(|config| config.validate()) {
        Err(ConfigError::Missing) => RestartReason::FirstBoot,
        Err(e) => RestartReason::Corrupted(e.to_string()),
        Ok(()) => RestartReason::Corrupted("store reported invalid record".into()),
    };

    match &reason {
        RestartReason::FirstBoot => {
            info!("No stored configuration, writing defaults");
        }
        RestartReason::Corrupted(why) => {
            warn!("Stored configuration unusable ({}), resetting to defaults", why);
            store.erase()?;
        }
    }

    let defaults = DeviceConfig::defaults(device_type);
    store.save(&defaults)?;
    info!("Generated device uuid {}", defaults.uuid);
    Ok(Boot::Restart(reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DeviceConfig::defaults("lock");
        config.validate().unwrap();
        assert_eq!(config.port, 8595);
        assert_eq!(config.uuid.len(), 36);
    }

    #[test]
    fn test_validate_limits() {
        let mut config = DeviceConfig::defaults("lock");
        config.ssid = "x".repeat(MAX_SSID_LEN + 1);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = DeviceConfig::defaults("lock");
        config.schema_version = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SchemaMismatch { found: 0, .. })
        ));
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let mut store = MemoryConfigStore::new();
        assert!(!store.is_valid());
        assert!(matches!(store.load(), Err(ConfigError::Missing)));

        let config = DeviceConfig::defaults("rgb_light");
        store.save(&config).unwrap();
        assert!(store.is_valid());
        assert_eq!(store.load().unwrap(), config);

        store.erase().unwrap();
        assert!(!store.is_valid());
    }
}
