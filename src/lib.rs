// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! VolKnob - per-application volume knobs for taskbar right-clicks.
//!
//! Right-clicking a taskbar icon with a configured modifier combination
//! held shows a transient volume knob for the application behind the icon,
//! without opening the full volume mixer. The hard part is identification:
//! a taskbar button is just a display name and a screen point, and the
//! process that owns the audio session is often not the process that owns
//! the button. See [`identify`] for the strategy chain and [`pipeline`]
//! for the click orchestration.

pub mod app;
pub mod audio;
pub mod config;
pub mod hotkey;
pub mod identify;
pub mod knobs;
pub mod mappings;
pub mod pipeline;
pub mod platform;
