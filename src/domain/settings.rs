use crate::domain::heading::HeadingPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Toggle key: prefer the BLE heading over the onboard sensor
pub const TOGGLE_ARDUINO: &str = "arduino";
/// Toggle key: start scanning as soon as the compass opens
pub const TOGGLE_AUTO: &str = "auto";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
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
            file_logging_enabled: default_true(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_true(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
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
    "scan_compass".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Boolean switches keyed by name (see `TOGGLE_*`)
    #[serde(default = "default_toggles")]
    pub toggles: BTreeMap<String, bool>,

    #[serde(default)]
    pub log_settings: LogSettings,

    // BLE heading source
    #[serde(default = "default_target_name")]
    pub ble_target_name: String,
    #[serde(default = "default_service_uuid16")]
    pub ble_service_uuid16: u16,
    #[serde(default = "default_characteristic_uuid16")]
    pub ble_characteristic_uuid16: u16,
    #[serde(default = "default_discovery_max_retries")]
    pub discovery_max_retries: u32,
    #[serde(default = "default_discovery_initial_backoff_ms")]
    pub discovery_initial_backoff_ms: u64,
    #[serde(default = "default_use_simulated_ble")]
    pub use_simulated_ble: bool,

    // Heading display
    #[serde(default)]
    pub heading_policy: HeadingPolicy,
    #[serde(default)]
    pub sensor_smoothing: Option<f64>,
    #[serde(default = "default_true")]
    pub use_simulated_sensor: bool,
    /// Heading shown while neither BLE nor the sensor has a value
    #[serde(default)]
    pub fallback_heading_degrees: f64,

    // Photos
    #[serde(default = "default_photo_dir")]
    pub photo_dir: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            toggles: default_toggles(),
            log_settings: LogSettings::default(),
            ble_target_name: default_target_name(),
            ble_service_uuid16: default_service_uuid16(),
            ble_characteristic_uuid16: default_characteristic_uuid16(),
            discovery_max_retries: default_discovery_max_retries(),
            discovery_initial_backoff_ms: default_discovery_initial_backoff_ms(),
            use_simulated_ble: default_use_simulated_ble(),
            heading_policy: HeadingPolicy::default(),
            sensor_smoothing: None,
            use_simulated_sensor: true,
            fallback_heading_degrees: 0.0,
            photo_dir: default_photo_dir(),
        }
    }
}

fn default_toggles() -> BTreeMap<String, bool> {
    BTreeMap::from([
        (TOGGLE_ARDUINO.to_string(), true),
        (TOGGLE_AUTO.to_string(), false),
    ])
}
fn default_target_name() -> String {
    crate::infrastructure::bluetooth::protocol::TARGET_DEVICE_NAME.to_string()
}
fn default_service_uuid16() -> u16 {
    crate::infrastructure::bluetooth::protocol::HEADING_SERVICE_UUID16
}
fn default_characteristic_uuid16() -> u16 {
    crate::infrastructure::bluetooth::protocol::HEADING_CHAR_UUID16
}
fn default_discovery_max_retries() -> u32 {
    5
}
fn default_discovery_initial_backoff_ms() -> u64 {
    250
}
fn default_use_simulated_ble() -> bool {
    !cfg!(windows)
}
fn default_photo_dir() -> String {
    dirs::picture_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ScanCompass")
        .to_string_lossy()
        .into_owned()
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::with_path(settings_path))
    }

    /// Load from an explicit file, falling back to defaults when it is
    /// missing or unreadable
    pub fn with_path(settings_path: PathBuf) -> Self {
        let settings = match Self::load_from_file(&settings_path) {
            Ok(settings) => settings,
            Err(e) => {
                if settings_path.exists() {
                    tracing::warn!(
                        "Could not read settings from {}: {}. Using defaults.",
                        settings_path.display(),
                        e
                    );
                }
                Settings::default()
            }
        };

        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("ScanCompass");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn get_toggle(&self, key: &str) -> Option<bool> {
        self.settings.toggles.get(key).copied()
    }

    /// Set a toggle and persist immediately
    pub fn put_toggle(&mut self, key: &str, value: bool) -> anyhow::Result<()> {
        self.settings.toggles.insert(key.to_string(), value);
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let service = SettingsService::with_path(dir.path().join("settings.json"));
        assert_eq!(service.get_toggle(TOGGLE_ARDUINO), Some(true));
        assert_eq!(service.get_toggle(TOGGLE_AUTO), Some(false));
        assert_eq!(service.get_toggle("missing"), None);
        assert_eq!(service.get().ble_target_name, "Arduino_GCS");
        assert_eq!(service.get().ble_service_uuid16, 0x180A);
        assert_eq!(service.get().ble_characteristic_uuid16, 0x2A57);
    }

    #[test]
    fn test_toggle_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut service = SettingsService::with_path(path.clone());
        service.put_toggle(TOGGLE_AUTO, true).unwrap();
        service.put_toggle("custom", false).unwrap();

        let reloaded = SettingsService::with_path(path);
        assert_eq!(reloaded.get_toggle(TOGGLE_AUTO), Some(true));
        assert_eq!(reloaded.get_toggle("custom"), Some(false));
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let service = SettingsService::with_path(path);
        assert_eq!(service.get().heading_policy, HeadingPolicy::BlePermanent);
        assert_eq!(service.get().discovery_max_retries, 5);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{ "heading_policy": "FallbackOnDisconnect", "sensor_smoothing": 0.3 }"#,
        )
        .unwrap();

        let service = SettingsService::with_path(path);
        let settings = service.get();
        assert_eq!(settings.heading_policy, HeadingPolicy::FallbackOnDisconnect);
        assert_eq!(settings.sensor_smoothing, Some(0.3));
        assert_eq!(settings.fallback_heading_degrees, 0.0);
        assert_eq!(settings.toggles.get(TOGGLE_ARDUINO), Some(&true));
        assert_eq!(settings.log_settings.rotation, "daily");
    }
}
