// Settings store trait - persisted configuration as seen by the core
use crate::domain::device::Device;
use crate::infrastructure::config::Settings;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("failed to parse settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to write settings: {0}")]
    Io(#[from] std::io::Error),
}

pub trait SettingsStore: Send + Sync {
    /// Snapshot of the current settings.
    fn current(&self) -> Settings;

    /// One-time write of a migrated device list and selection.
    fn persist_migration(&self, devices: &[Device], selected_device_id: &str) -> Result<(), ConfigError>;
}
