use crate::infrastructure::bluetooth::protocol;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Environment variable overriding the settings file location
pub const CONFIG_ENV_VAR: &str = "COLOR_PERIPHERAL_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

/// Identity of the GATT service this peripheral publishes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeripheralConfig {
    #[serde(default = "default_service_uuid")]
    pub service_uuid: String,
    #[serde(default = "default_characteristic_uuid")]
    pub characteristic_uuid: String,
    #[serde(default = "default_local_name")]
    pub local_name: String,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            service_uuid: default_service_uuid(),
            characteristic_uuid: default_characteristic_uuid(),
            local_name: default_local_name(),
        }
    }
}

/// Parsed, checked form of [`PeripheralConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralIdentity {
    pub service_id: Uuid,
    pub characteristic_id: Uuid,
    pub local_name: String,
}

impl PeripheralConfig {
    pub fn validate(&self) -> anyhow::Result<PeripheralIdentity> {
        let service_id = protocol::parse_uuid(&self.service_uuid)
            .with_context(|| format!("Invalid service UUID {:?}", self.service_uuid))?;
        let characteristic_id = protocol::parse_uuid(&self.characteristic_uuid).with_context(
            || format!("Invalid characteristic UUID {:?}", self.characteristic_uuid),
        )?;

        if self.local_name.trim().is_empty() {
            anyhow::bail!("Local name must not be empty");
        }
        if self.local_name.len() > protocol::MAX_LOCAL_NAME_LEN {
            anyhow::bail!(
                "Local name is {} bytes, advertising allows at most {}",
                self.local_name.len(),
                protocol::MAX_LOCAL_NAME_LEN
            );
        }
        if service_id == characteristic_id {
            anyhow::bail!("Service and characteristic UUIDs must differ");
        }

        Ok(PeripheralIdentity {
            service_id,
            characteristic_id,
            local_name: self.local_name.clone(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub peripheral: PeripheralConfig,

    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,

    // Console auto-streaming period, 0 disables it
    #[serde(default = "default_notify_interval_ms")]
    pub notify_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            peripheral: PeripheralConfig::default(),
            log_settings: LogSettings::default(),
            notify_interval_ms: default_notify_interval_ms(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "color_peripheral".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}
fn default_service_uuid() -> String {
    protocol::DEFAULT_SERVICE_UUID.to_string()
}
fn default_characteristic_uuid() -> String {
    protocol::DEFAULT_COLOR_CHAR_UUID.to_string()
}
fn default_local_name() -> String {
    protocol::DEFAULT_LOCAL_NAME.to_string()
}
fn default_notify_interval_ms() -> u64 {
    0
}

/// Read-only settings loader
pub struct SettingsService {
    settings: Settings,
    settings_path: Option<PathBuf>,
}

impl SettingsService {
    /// Load from `$COLOR_PERIPHERAL_CONFIG` or the user config directory.
    /// A missing file yields defaults; a malformed one is an error.
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path();
        let settings = match &settings_path {
            Some(path) if path.exists() => Self::load_from_file(path)?,
            _ => Settings::default(),
        };

        Ok(Self {
            settings,
            settings_path,
        })
    }

    fn get_settings_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            return Some(PathBuf::from(path));
        }
        let mut path = dirs::config_dir()?;
        path.push("ColorPeripheral");
        path.push("settings.json");
        Some(path)
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    pub fn parse(contents: &str) -> anyhow::Result<Settings> {
        let settings = serde_json::from_str(contents)?;
        Ok(settings)
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn path(&self) -> Option<&Path> {
        self.settings_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let settings =
            SettingsService::parse(r#"{ "peripheral": { "local_name": "Lamp" } }"#).unwrap();
        assert_eq!(settings.peripheral.local_name, "Lamp");
        assert_eq!(settings.peripheral.service_uuid, "180D");
        assert_eq!(settings.log_settings.level, "info");
        assert_eq!(settings.notify_interval_ms, 0);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        assert!(SettingsService::parse("{ not json").is_err());
    }

    #[test]
    fn test_default_identity_expands_short_uuids() {
        let identity = PeripheralConfig::default().validate().unwrap();
        assert_eq!(
            identity.service_id,
            Uuid::parse_str("0000180d-0000-1000-8000-00805f9b34fb").unwrap()
        );
        assert_eq!(
            identity.characteristic_id,
            Uuid::parse_str("00002a37-0000-1000-8000-00805f9b34fb").unwrap()
        );
    }

    #[test]
    fn test_validate_rejects_bad_config() {
        let mut config = PeripheralConfig::default();
        config.local_name = "   ".to_string();
        assert!(config.validate().is_err());

        let mut config = PeripheralConfig::default();
        config.local_name = "x".repeat(protocol::MAX_LOCAL_NAME_LEN + 1);
        assert!(config.validate().is_err());

        let mut config = PeripheralConfig::default();
        config.characteristic_uuid = "not-a-uuid".to_string();
        assert!(config.validate().is_err());

        let mut config = PeripheralConfig::default();
        config.characteristic_uuid = config.service_uuid.clone();
        assert!(config.validate().is_err());
    }
}
