// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Collaborator boundaries around the operating system.
//!
//! Every OS capability the core logic needs is expressed as a trait here,
//! with one production implementation (Windows) and one in-memory test
//! double. The traits normalize OS failures at the boundary: callers see
//! `Option`/`Result` values, never raw error codes.

use std::sync::mpsc::Sender;
use thiserror::Error;

#[cfg(windows)]
pub mod windows;

#[cfg(test)]
pub mod testing;

/// Process identifier as reported by the OS.
pub type Pid = u32;

/// A point in virtual-screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A rectangle in virtual-screen coordinates (working area of a monitor).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }
}

/// Modifier keys held at the time of a click.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub win: bool,
}

/// A qualifying-candidate right-click release delivered by the global hook.
#[derive(Debug, Clone, Copy)]
pub struct ClickEvent {
    pub x: i32,
    pub y: i32,
    /// Owning pid of the window under the cursor, when the hook could read it.
    pub hwnd_pid: Option<Pid>,
    pub modifiers: ModifierState,
}

/// What the OS reports about a process when probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessProbe {
    /// Process is running; `name` is the executable name without extension.
    Running { name: String },
    /// Process exists but cannot be opened (elevated, protected).
    AccessDenied,
    /// No such process, or it has exited.
    Exited,
}

/// Read-only process table queries.
pub trait ProcessOracle: Send + Sync {
    /// Probe liveness and executable name for a pid.
    fn probe(&self, pid: Pid) -> ProcessProbe;

    /// All pids whose executable name matches (case-insensitive, without
    /// extension), in OS enumeration order.
    fn pids_by_name(&self, name: &str) -> Vec<Pid>;

    /// Executable name (without extension) for a pid, if readable.
    fn image_name(&self, pid: Pid) -> Option<String> {
        match self.probe(pid) {
            ProcessProbe::Running { name } => Some(name),
            _ => None,
        }
    }
}

/// A snapshot of one top-level window.
#[derive(Debug, Clone)]
pub struct WindowInfo {
    pub pid: Pid,
    pub title: String,
    pub visible: bool,
    /// Present but not rendered (suspended UWP apps); excluded from matching.
    pub cloaked: bool,
    pub minimized: bool,
}

/// Read-only top-level window enumeration.
pub trait WindowEnumerator: Send + Sync {
    fn top_level_windows(&self) -> Vec<WindowInfo>;
}

/// An accessibility-tree node, resolved fail-soft.
///
/// Element handles are only ever used on the thread that produced them; the
/// production implementation wraps COM pointers that must not migrate.
pub trait UiElement {
    /// Accessible name, `None` when the read fails.
    fn name(&self) -> Option<String>;

    /// Owning pid of the element's native window handle, when it has one.
    fn hwnd_pid(&self) -> Option<Pid>;

    /// Pid attached directly to the element (no window handle involved).
    fn attached_pid(&self) -> Option<Pid>;

    /// Nearest button/list-item ancestor that belongs to the shell taskbar
    /// window family, bounded by a small search depth.
    fn taskbar_ancestor(&self) -> Option<Box<dyn UiElement>>;
}

/// Screen-point hit testing against the accessibility tree.
pub trait UiAutomation: Send + Sync {
    fn element_from_point(&self, point: Point) -> Option<Box<dyn UiElement>>;
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("No default playback device")]
    NoDefaultDevice,
    #[error("Audio endpoint error: {0}")]
    Endpoint(String),
    #[error("Session control error: {0}")]
    Session(String),
}

/// One per-process audio session on the default render endpoint.
///
/// Dropping the handle releases the underlying OS session object.
pub trait SessionControl: Send {
    fn pid(&self) -> Pid;

    /// Display name the session reports for itself, if any.
    fn reported_name(&self) -> Option<String>;

    fn is_expired(&self) -> bool;

    fn volume(&self) -> Result<f32, AudioError>;
    fn set_volume(&self, volume: f32) -> Result<(), AudioError>;
    fn muted(&self) -> Result<bool, AudioError>;
    fn set_muted(&self, muted: bool) -> Result<(), AudioError>;

    /// Instantaneous peak meter level, 0.0 to 1.0.
    fn peak(&self) -> Result<f32, AudioError>;
}

/// The default playback endpoint's session list.
///
/// Implementations re-acquire the default device on every call; the user can
/// switch devices between clicks.
pub trait AudioEndpoint: Send + Sync {
    fn sessions(&self) -> Result<Vec<Box<dyn SessionControl>>, AudioError>;
}

#[derive(Debug, Error)]
pub enum HookError {
    #[error("Failed to install mouse hook: {0}")]
    Install(String),
}

/// Global low-level mouse hook emitting right-click releases.
pub trait MouseHook: Send {
    /// Install the hook; events flow into `events` until `uninstall`.
    fn install(&mut self, events: Sender<ClickEvent>) -> Result<(), HookError>;

    fn uninstall(&mut self);
}

/// Monitor working-area queries.
pub trait ScreenMetrics: Send + Sync {
    /// Working area of the monitor containing `point`.
    fn working_area_at(&self, point: Point) -> Rect;
}

#[derive(Debug, Error)]
pub enum PresentError {
    #[error("Host is shutting down")]
    ShuttingDown,
    #[error("Failed to present knob: {0}")]
    Failed(String),
}

/// A presented on-screen knob.
pub trait KnobHandle: Send {
    fn hide(&mut self);

    fn is_visible(&self) -> bool;

    /// Rendered size, once known. Used for bottom/right edge re-clamping.
    fn size(&self) -> Option<(i32, i32)>;

    fn move_to(&mut self, position: Point);

    /// Destroy the knob window. Best effort; errors are swallowed.
    fn close(&mut self);
}

/// Creates on-screen knob windows bound to an audio session.
///
/// Production implementations marshal to their UI thread internally.
pub trait KnobPresenter: Send + Sync {
    fn present(
        &self,
        position: Point,
        session: crate::audio::AppAudioSession,
        show_peak: bool,
    ) -> Result<Box<dyn KnobHandle>, PresentError>;
}

/// Blocking user dialogs (message boxes, mapping confirmation, process picker).
pub trait UserPrompts: Send + Sync {
    fn show_info(&self, title: &str, message: &str);

    fn show_error(&self, title: &str, message: &str);

    /// Ask whether the user wants to create a manual mapping for `ui_name`.
    fn confirm_mapping(&self, ui_name: &str) -> bool;

    /// Let the user pick a running process to map `ui_name` to.
    fn pick_process(&self, ui_name: &str) -> Option<String>;
}

/// Launch-at-startup registration.
pub trait StartupManager: Send + Sync {
    fn set_launch_at_startup(&self, enabled: bool) -> Result<(), std::io::Error>;

    fn is_enabled(&self) -> bool;
}
