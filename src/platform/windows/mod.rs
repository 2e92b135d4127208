// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Windows production implementations of the collaborator traits.

pub mod audio;
pub mod input;
pub mod knob;
pub mod process;
pub mod screen;
pub mod shell;
pub mod startup;
pub mod tray;
pub mod uia;
pub mod winenum;

pub use audio::WinAudioEndpoint;
pub use input::WinMouseHook;
pub use knob::WinKnobPresenter;
pub use process::WinProcessOracle;
pub use screen::WinScreenMetrics;
pub use shell::{open_in_default_editor, WinPrompts};
pub use startup::WinStartupManager;
pub use tray::{start_tray, TrayHandle};
pub use uia::WinUiAutomation;
pub use winenum::WinWindowEnumerator;
