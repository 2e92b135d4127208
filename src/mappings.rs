// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Manual mappings from taskbar display names to process executable names.
//!
//! When automatic identification fails the user can pin a taskbar name to
//! one or more process names; the pipeline consults these before giving up.
//! Entries persist in the settings file as `"<uiName>|<proc1>;<proc2>;..."`
//! strings, so `|` and `;` are reserved and rejected in names.

use crate::config::SharedSettings;
use crate::platform::UserPrompts;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const NAME_SEPARATOR: char = '|';
const PROCESS_SEPARATOR: char = ';';

/// One mapping: a taskbar display name and its candidate process names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub ui_name: String,
    /// Ordered, de-duplicated case-insensitively, never empty.
    pub process_names: Vec<String>,
}

/// All manual mappings, keys unique under case-insensitive comparison.
#[derive(Debug, Clone, Default)]
pub struct ManualMappings {
    entries: Vec<MappingEntry>,
}

impl ManualMappings {
    /// Parse persisted entries. Malformed lines are skipped, not fatal.
    pub fn parse(lines: &[String]) -> Self {
        let mut mappings = Self::default();
        for line in lines {
            match parse_entry(line) {
                Some(entry) => mappings.insert(entry),
                None => {
                    if !line.trim().is_empty() {
                        debug!("Skipping malformed mapping entry: {:?}", line);
                    }
                }
            }
        }
        mappings
    }

    /// Case-insensitive lookup by taskbar display name.
    pub fn find(&self, ui_name: &str) -> Option<&MappingEntry> {
        self.entries
            .iter()
            .find(|e| e.ui_name.eq_ignore_ascii_case(ui_name))
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add `process_name` under `ui_name`, creating the entry if needed.
    ///
    /// Returns whether anything changed; adding an already-present process
    /// name (case-insensitive) is a no-op.
    pub fn merge(&mut self, ui_name: &str, process_name: &str) -> bool {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.ui_name.eq_ignore_ascii_case(ui_name))
        {
            if entry
                .process_names
                .iter()
                .any(|p| p.eq_ignore_ascii_case(process_name))
            {
                return false;
            }
            entry.process_names.push(process_name.to_string());
            return true;
        }

        self.entries.push(MappingEntry {
            ui_name: ui_name.to_string(),
            process_names: vec![process_name.to_string()],
        });
        true
    }

    /// Remove the entry for `ui_name`, if present.
    pub fn remove(&mut self, ui_name: &str) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| !e.ui_name.eq_ignore_ascii_case(ui_name));
        self.entries.len() != before
    }

    /// Encode back into persisted form.
    pub fn encode(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| {
                format!(
                    "{}{}{}",
                    e.ui_name,
                    NAME_SEPARATOR,
                    e.process_names.join(&PROCESS_SEPARATOR.to_string())
                )
            })
            .collect()
    }

    fn insert(&mut self, entry: MappingEntry) {
        // Last duplicate key wins, matching load-over-load behavior.
        self.remove(&entry.ui_name);
        self.entries.push(entry);
    }
}

fn parse_entry(line: &str) -> Option<MappingEntry> {
    if line.trim().is_empty() {
        return None;
    }

    let (ui_part, process_part) = line.split_once(NAME_SEPARATOR)?;
    // A second separator means the entry is corrupt.
    if process_part.contains(NAME_SEPARATOR) {
        return None;
    }

    let ui_name = ui_part.trim();
    if ui_name.is_empty() || process_part.trim().is_empty() {
        return None;
    }

    let mut process_names: Vec<String> = Vec::new();
    for raw in process_part.split(PROCESS_SEPARATOR) {
        let name = raw.trim();
        if name.is_empty() {
            continue;
        }
        if !process_names.iter().any(|p| p.eq_ignore_ascii_case(name)) {
            process_names.push(name.to_string());
        }
    }

    if process_names.is_empty() {
        return None;
    }

    Some(MappingEntry {
        ui_name: ui_name.to_string(),
        process_names,
    })
}

/// Whether a name may be stored without corrupting the encoding.
fn is_storable_name(name: &str) -> bool {
    !name.contains(NAME_SEPARATOR) && !name.contains(PROCESS_SEPARATOR)
}

/// Persisted mapping store backed by the settings file.
pub struct MappingStore {
    settings: SharedSettings,
}

impl MappingStore {
    pub fn new(settings: SharedSettings) -> Self {
        Self { settings }
    }

    /// Load all mappings from settings.
    pub fn load(&self) -> ManualMappings {
        ManualMappings::parse(&self.settings.manual_mappings())
    }

    /// Add `process_name` under `ui_name` and persist.
    ///
    /// Trims both inputs. Returns false without side effects for blank input
    /// or names containing the reserved `|`/`;` separators (the encoding has
    /// no escape mechanism). Returns true when the pair is stored or was
    /// already present; false only when persisting fails.
    pub fn save_or_update(&self, ui_name: &str, process_name: &str) -> bool {
        let ui_name = ui_name.trim();
        let process_name = process_name.trim();

        if ui_name.is_empty() || process_name.is_empty() {
            return false;
        }
        if !is_storable_name(ui_name) || !is_storable_name(process_name) {
            warn!(
                "Rejecting mapping with reserved separator: {:?} -> {:?}",
                ui_name, process_name
            );
            return false;
        }

        let mut mappings = self.load();
        if !mappings.merge(ui_name, process_name) {
            // Pair already stored; nothing to write.
            return true;
        }

        self.settings.set_manual_mappings(mappings.encode());
        match self.settings.save() {
            Ok(()) => {
                info!("Saved mapping {:?} -> {:?}", ui_name, process_name);
                true
            }
            Err(e) => {
                warn!("Failed to persist mappings: {}", e);
                false
            }
        }
    }

    /// Interactive flow run when identification fails: confirm with the
    /// user, let them pick a process, persist, acknowledge.
    ///
    /// Checks for cancellation (which the shutdown token feeds into) before
    /// every user-facing step and silently does nothing once signaled.
    pub fn prompt_and_save(
        &self,
        ui_name: &str,
        token: &CancellationToken,
        prompts: &dyn UserPrompts,
    ) {
        if token.is_cancelled() {
            return;
        }
        if !prompts.confirm_mapping(ui_name) {
            return;
        }

        if token.is_cancelled() {
            return;
        }
        let Some(process_name) = prompts.pick_process(ui_name) else {
            return;
        };

        if token.is_cancelled() {
            return;
        }
        if self.save_or_update(ui_name, &process_name) {
            prompts.show_info(
                "Mapping saved",
                &format!(
                    "'{}' is now mapped to process '{}'.\nTry the click again.",
                    ui_name, process_name
                ),
            );
        } else {
            prompts.show_error(
                "Mapping not saved",
                &format!("The mapping for '{}' could not be saved.", ui_name),
            );
        }
    }
}
