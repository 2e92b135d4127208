// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Decides whether a right-click qualifies for the volume knob.

use crate::config::{HotkeyConfig, SharedSettings};
use crate::platform::ModifierState;

/// Gate matching clicks against the configured modifier combination.
///
/// Settings are re-read on every event so edits in the settings UI take
/// effect without restarting.
pub struct HotkeyGate {
    settings: SharedSettings,
}

impl HotkeyGate {
    pub fn new(settings: SharedSettings) -> Self {
        Self { settings }
    }

    /// Whether the held modifiers qualify the click.
    pub fn qualifies(&self, held: ModifierState) -> bool {
        modifiers_match(self.settings.hotkeys(), held)
    }
}

/// The held modifiers must match the configuration exactly, and at least
/// one modifier must be configured; an all-off configuration never fires.
pub fn modifiers_match(required: HotkeyConfig, held: ModifierState) -> bool {
    let exact = held.ctrl == required.ctrl
        && held.alt == required.alt
        && held.shift == required.shift
        && held.win == required.win;

    exact && required.any_required()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn held(ctrl: bool, alt: bool, shift: bool, win: bool) -> ModifierState {
        ModifierState {
            ctrl,
            alt,
            shift,
            win,
        }
    }

    fn required(ctrl: bool, alt: bool, shift: bool, win: bool) -> HotkeyConfig {
        HotkeyConfig {
            ctrl,
            alt,
            shift,
            win,
        }
    }

    #[test]
    fn test_exact_match_qualifies() {
        assert!(modifiers_match(
            required(true, false, false, false),
            held(true, false, false, false)
        ));
        assert!(modifiers_match(
            required(true, false, true, false),
            held(true, false, true, false)
        ));
    }

    #[test]
    fn test_extra_modifier_disqualifies() {
        assert!(!modifiers_match(
            required(true, false, false, false),
            held(true, true, false, false)
        ));
    }

    #[test]
    fn test_missing_modifier_disqualifies() {
        assert!(!modifiers_match(
            required(true, true, false, false),
            held(true, false, false, false)
        ));
    }

    #[test]
    fn test_all_modifiers_off_never_qualifies() {
        assert!(!modifiers_match(
            required(false, false, false, false),
            held(false, false, false, false)
        ));
        assert!(!modifiers_match(
            required(false, false, false, false),
            held(true, false, false, false)
        ));
    }
}
