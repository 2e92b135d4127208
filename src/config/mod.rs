// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Configuration management for VolKnob.

pub mod app_config;
pub mod persistence;

pub use app_config::{AppConfig, HotkeyConfig};
pub use persistence::{ConfigError, ConfigManager, FileSettings};

use std::sync::Arc;

/// Typed access to the persisted settings.
///
/// The click path re-reads hotkey flags on every event and the mapping store
/// reads/writes the encoded mapping list, so settings sit behind a trait with
/// a file-backed production implementation and an in-memory test double.
pub trait SettingsStore: Send + Sync {
    fn hotkeys(&self) -> HotkeyConfig;
    fn set_hotkeys(&self, hotkeys: HotkeyConfig);

    fn show_peak_meter(&self) -> bool;
    fn set_show_peak_meter(&self, show: bool);

    fn launch_at_startup(&self) -> bool;
    fn set_launch_at_startup(&self, launch: bool);

    /// Encoded manual mapping entries, `"<uiName>|<proc1>;<proc2>;..."`.
    fn manual_mappings(&self) -> Vec<String>;
    fn set_manual_mappings(&self, mappings: Vec<String>);

    /// Persist the current state.
    fn save(&self) -> Result<(), ConfigError>;
}

/// Shared settings handle.
pub type SharedSettings = Arc<dyn SettingsStore>;
