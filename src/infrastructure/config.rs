use crate::application::settings_store::{ConfigError, SettingsStore};
use crate::domain::device::Device;
use crate::domain::view::DefaultView;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

pub const DEFAULT_CONFIG_PATH: &str = "config/bitaxe.toml";
const ENV_PREFIX: &str = "BITAXE_MONITOR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HashrateUnit {
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "GH/s")]
    GigaHash,
    #[serde(rename = "TH/s")]
    TeraHash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub devices: Vec<Device>,
    /// Single-address setting from before device lists existed.
    pub bitaxe_ip: String,
    pub refresh_interval: u64,
    pub paused: bool,
    pub sparkline_window_minutes: u64,
    pub default_view: DefaultView,
    pub selected_device_id: String,
    pub hashrate_unit: HashrateUnit,
    pub panel_separator: String,
    pub custom_separator: String,
    pub show_hashrate: bool,
    pub show_temperature: bool,
    pub show_vrm_temp: bool,
    pub show_power: bool,
    pub show_efficiency: bool,
    pub show_fan_rpm: bool,
    pub show_frequency: bool,
    pub show_shares: bool,
    pub show_uptime: bool,
    pub listen_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            bitaxe_ip: String::new(),
            refresh_interval: 10,
            paused: false,
            sparkline_window_minutes: 5,
            default_view: DefaultView::Auto,
            selected_device_id: String::new(),
            hashrate_unit: HashrateUnit::Auto,
            panel_separator: "|".to_string(),
            custom_separator: String::new(),
            show_hashrate: true,
            show_temperature: true,
            show_vrm_temp: false,
            show_power: false,
            show_efficiency: false,
            show_fan_rpm: false,
            show_frequency: false,
            show_shares: false,
            show_uptime: false,
            listen_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

impl Settings {
    pub fn refresh_interval_secs(&self) -> u64 {
        self.refresh_interval.max(1)
    }

    pub fn sparkline_window_secs(&self) -> u64 {
        self.sparkline_window_minutes.max(1) * 60
    }

    /// Separator between panel parts, custom text taking precedence.
    pub fn separator(&self) -> &str {
        if self.custom_separator.is_empty() {
            &self.panel_separator
        } else {
            &self.custom_separator
        }
    }
}

pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    load_layered(path, ENV_PREFIX)
}

fn load_layered(path: &Path, env_prefix: &str) -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path.to_path_buf()).required(false))
        .add_source(
            config::Environment::with_prefix(env_prefix)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Settings backed by a TOML file. Reads are served from memory; `reload`
/// re-reads the file when it changed on disk.
pub struct FileConfigStore {
    path: PathBuf,
    env_prefix: &'static str,
    current: RwLock<Settings>,
    modified: RwLock<Option<SystemTime>>,
}

impl FileConfigStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Self::open_with_env_prefix(path, ENV_PREFIX)
    }

    fn open_with_env_prefix(path: impl Into<PathBuf>, env_prefix: &'static str) -> Result<Self, ConfigError> {
        let path = path.into();
        let settings = load_layered(&path, env_prefix)?;
        let modified = modified_time(&path);
        Ok(Self {
            path,
            env_prefix,
            current: RwLock::new(settings),
            modified: RwLock::new(modified),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file if its modification time moved. Returns the new
    /// settings when something was reloaded.
    pub fn reload_if_changed(&self) -> Result<Option<Settings>, ConfigError> {
        let modified = modified_time(&self.path);
        {
            let last = self.modified.read().unwrap_or_else(|e| e.into_inner());
            if *last == modified {
                return Ok(None);
            }
        }

        let settings = load_layered(&self.path, self.env_prefix)?;
        *self.modified.write().unwrap_or_else(|e| e.into_inner()) = modified;
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = settings.clone();
        Ok(Some(settings))
    }
}

impl SettingsStore for FileConfigStore {
    fn current(&self) -> Settings {
        self.current.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Rewrites only `devices` and `selected_device_id` in the file; every
    /// other key stays as written, and env overrides never reach the disk.
    fn persist_migration(&self, devices: &[Device], selected_device_id: &str) -> Result<(), ConfigError> {
        let mut document = match std::fs::read_to_string(&self.path) {
            Ok(text) => text.parse::<toml::Table>()?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => toml::Table::new(),
            Err(e) => return Err(e.into()),
        };
        document.insert("devices".to_string(), toml::Value::try_from(devices)?);
        document.insert(
            "selected_device_id".to_string(),
            toml::Value::String(selected_device_id.to_string()),
        );

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, toml::to_string_pretty(&document)?)?;

        *self.modified.write().unwrap_or_else(|e| e.into_inner()) = modified_time(&self.path);
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        current.devices = devices.to_vec();
        current.selected_device_id = selected_device_id.to_string();
        Ok(())
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
