// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Configuration persistence (save/load).

use crate::config::{AppConfig, HotkeyConfig, SettingsStore};
use directories::ProjectDirs;
use parking_lot::Mutex;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to determine config directory")]
    NoConfigDir,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Manages configuration file persistence.
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager, initializing directories.
    pub fn new() -> Result<Self, ConfigError> {
        let project_dirs =
            ProjectDirs::from("", "", "volknob").ok_or(ConfigError::NoConfigDir)?;

        let config_dir = project_dirs.config_dir().to_path_buf();
        fs::create_dir_all(&config_dir)?;

        Ok(Self { config_dir })
    }

    /// Create a config manager rooted at an explicit directory.
    pub fn with_dir(config_dir: PathBuf) -> Result<Self, ConfigError> {
        fs::create_dir_all(&config_dir)?;
        Ok(Self { config_dir })
    }

    /// Get the path to the main config file.
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Load the application config.
    pub fn load_config(&self) -> Result<AppConfig, ConfigError> {
        let path = self.config_path();
        if path.exists() {
            let content = fs::read_to_string(&path)?;
            Ok(AppConfig::from_toml(&content)?)
        } else {
            Ok(AppConfig::default())
        }
    }

    /// Save the application config.
    pub fn save_config(&self, config: &AppConfig) -> Result<(), ConfigError> {
        let content = config.to_toml()?;
        fs::write(self.config_path(), content)?;
        Ok(())
    }
}

/// File-backed [`SettingsStore`].
///
/// Holds the current config in memory; `save()` writes it out. A config file
/// that fails to parse falls back to defaults rather than blocking startup.
pub struct FileSettings {
    manager: ConfigManager,
    state: Mutex<AppConfig>,
}

impl FileSettings {
    pub fn new(manager: ConfigManager) -> Self {
        let state = manager.load_config().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            AppConfig::default()
        });
        Self {
            manager,
            state: Mutex::new(state),
        }
    }
}

impl SettingsStore for FileSettings {
    fn hotkeys(&self) -> HotkeyConfig {
        self.state.lock().hotkey
    }

    fn set_hotkeys(&self, hotkeys: HotkeyConfig) {
        self.state.lock().hotkey = hotkeys;
    }

    fn show_peak_meter(&self) -> bool {
        self.state.lock().knob.show_peak_meter
    }

    fn set_show_peak_meter(&self, show: bool) {
        self.state.lock().knob.show_peak_meter = show;
    }

    fn launch_at_startup(&self) -> bool {
        self.state.lock().general.launch_at_startup
    }

    fn set_launch_at_startup(&self, launch: bool) {
        self.state.lock().general.launch_at_startup = launch;
    }

    fn manual_mappings(&self) -> Vec<String> {
        self.state.lock().manual_mappings.clone()
    }

    fn set_manual_mappings(&self, mappings: Vec<String>) {
        self.state.lock().manual_mappings = mappings;
    }

    fn save(&self) -> Result<(), ConfigError> {
        let snapshot = self.state.lock().clone();
        self.manager.save_config(&snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_config_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_dir(dir.path().to_path_buf()).unwrap();
        let config = manager.load_config().unwrap();
        assert!(config.manual_mappings.is_empty());
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_dir(dir.path().to_path_buf()).unwrap();

        let mut config = AppConfig::default();
        config.manual_mappings.push("Steam|steam".to_string());
        config.general.launch_at_startup = true;
        manager.save_config(&config).unwrap();

        let loaded = manager.load_config().unwrap();
        assert_eq!(loaded.manual_mappings, vec!["Steam|steam".to_string()]);
        assert!(loaded.general.launch_at_startup);
    }

    #[test]
    fn test_file_settings_save_persists_mappings() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_dir(dir.path().to_path_buf()).unwrap();
        let settings = FileSettings::new(manager);

        settings.set_manual_mappings(vec!["Discord|Discord".to_string()]);
        settings.save().unwrap();

        let manager = ConfigManager::with_dir(dir.path().to_path_buf()).unwrap();
        let reloaded = FileSettings::new(manager);
        assert_eq!(
            reloaded.manual_mappings(),
            vec!["Discord|Discord".to_string()]
        );
    }
}
