// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Application configuration (hotkey modifiers, knob behavior, mappings).

use serde::{Deserialize, Serialize};

/// Modifier keys that must be held for a right-click to qualify.
///
/// The click qualifies only when the held modifiers match these flags
/// exactly and at least one flag is set; an all-off configuration disables
/// the feature rather than triggering on every right-click.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HotkeyConfig {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub win: bool,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            ctrl: true,
            alt: false,
            shift: false,
            win: false,
        }
    }
}

impl HotkeyConfig {
    /// Whether any modifier is required at all.
    pub fn any_required(&self) -> bool {
        self.ctrl || self.alt || self.shift || self.win
    }
}

/// Knob appearance and behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnobConfig {
    /// Show the live peak meter bar on the knob.
    pub show_peak_meter: bool,
}

impl Default for KnobConfig {
    fn default() -> Self {
        Self {
            show_peak_meter: true,
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeneralConfig {
    /// Register the app to launch when the user logs in.
    pub launch_at_startup: bool,
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub hotkey: HotkeyConfig,
    #[serde(default)]
    pub knob: KnobConfig,
    #[serde(default)]
    pub general: GeneralConfig,
    /// Manual mapping entries, encoded `"<uiName>|<proc1>;<proc2>;..."`.
    #[serde(default)]
    pub manual_mappings: Vec<String>,
}

impl AppConfig {
    /// Load config from TOML string.
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Serialize to TOML string.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_hotkey_requires_ctrl() {
        let config = AppConfig::default();
        assert!(config.hotkey.ctrl);
        assert!(!config.hotkey.alt);
        assert!(config.hotkey.any_required());
    }

    #[test]
    fn test_all_modifiers_off_requires_nothing() {
        let hotkey = HotkeyConfig {
            ctrl: false,
            alt: false,
            shift: false,
            win: false,
        };
        assert!(!hotkey.any_required());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = AppConfig::default();
        config
            .manual_mappings
            .push("Spotify Premium|Spotify".to_string());
        config.hotkey.shift = true;

        let toml_str = config.to_toml().unwrap();
        let parsed = AppConfig::from_toml(&toml_str).unwrap();

        assert_eq!(parsed.hotkey, config.hotkey);
        assert_eq!(parsed.manual_mappings, config.manual_mappings);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let parsed = AppConfig::from_toml("").unwrap();
        assert!(parsed.hotkey.ctrl);
        assert!(parsed.knob.show_peak_meter);
        assert!(!parsed.general.launch_at_startup);
        assert!(parsed.manual_mappings.is_empty());
    }
}
