//! Config adapter - implements ConfigStore on a JSON file
//! Loaded lazily on first access and cached; read errors fall back to defaults

use crate::config::Settings;
use crate::domain::repositories::{ConfigError, ConfigStore};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

pub const CONFIG_FILE_NAME: &str = "config.json";

pub struct FileConfigStore {
    path: PathBuf,
    cached: RwLock<Option<Settings>>,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: RwLock::new(None),
        }
    }

    /// `<user config dir>/acuhelper/config.json`, or the working directory
    /// when the platform has no config dir.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("acuhelper"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Settings {
        if !self.path.exists() {
            let settings = Settings::default();
            if let Err(e) = settings.write_to(&self.path) {
                tracing::warn!("Could not write default configuration: {}", e);
            }
            return settings;
        }

        match Settings::from_file(&self.path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(
                    "Failed to read configuration from {}, using defaults: {}",
                    self.path.display(),
                    e
                );
                Settings::default()
            }
        }
    }
}

impl ConfigStore for FileConfigStore {
    fn settings(&self) -> Settings {
        if let Ok(guard) = self.cached.read() {
            if let Some(settings) = guard.as_ref() {
                return settings.clone();
            }
        }

        let settings = self.load();
        if let Ok(mut guard) = self.cached.write() {
            *guard = Some(settings.clone());
        }
        settings
    }

    fn save(&self, settings: Settings) -> Result<(), ConfigError> {
        settings.write_to(&self.path)?;
        tracing::debug!("Configuration saved to {}", self.path.display());
        if let Ok(mut guard) = self.cached.write() {
            *guard = Some(settings);
        }
        Ok(())
    }
}
