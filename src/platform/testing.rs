// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! In-memory collaborator doubles shared by the unit tests.

use super::{
    AudioEndpoint, AudioError, KnobHandle, KnobPresenter, Pid, Point, PresentError,
    ProcessOracle, ProcessProbe, Rect, ScreenMetrics, SessionControl, UiAutomation, UiElement,
    UserPrompts, WindowEnumerator, WindowInfo,
};
use crate::audio::{AppAudioSession, SessionResolver};
use crate::config::{ConfigError, HotkeyConfig, SettingsStore};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Process table with canned probe results.
#[derive(Debug, Clone, Default)]
pub struct FakeOracle {
    processes: BTreeMap<Pid, ProcessProbe>,
}

impl FakeOracle {
    pub fn with_process(mut self, pid: Pid, name: &str) -> Self {
        self.processes.insert(
            pid,
            ProcessProbe::Running {
                name: name.to_string(),
            },
        );
        self
    }

    pub fn with_access_denied(mut self, pid: Pid) -> Self {
        self.processes.insert(pid, ProcessProbe::AccessDenied);
        self
    }
}

impl ProcessOracle for FakeOracle {
    fn probe(&self, pid: Pid) -> ProcessProbe {
        self.processes
            .get(&pid)
            .cloned()
            .unwrap_or(ProcessProbe::Exited)
    }

    fn pids_by_name(&self, name: &str) -> Vec<Pid> {
        self.processes
            .iter()
            .filter_map(|(pid, probe)| match probe {
                ProcessProbe::Running { name: n } if n.eq_ignore_ascii_case(name) => Some(*pid),
                _ => None,
            })
            .collect()
    }
}

/// Window enumerator returning a fixed snapshot.
#[derive(Debug, Clone, Default)]
pub struct FakeWindows {
    windows: Vec<WindowInfo>,
}

impl FakeWindows {
    pub fn new(windows: Vec<WindowInfo>) -> Self {
        Self { windows }
    }
}

impl WindowEnumerator for FakeWindows {
    fn top_level_windows(&self) -> Vec<WindowInfo> {
        self.windows.clone()
    }
}

/// Accessibility element with canned properties.
#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    name: Option<String>,
    hwnd_pid: Option<Pid>,
    attached_pid: Option<Pid>,
    ancestor: Option<Box<FakeElement>>,
}

impl FakeElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_hwnd_pid(mut self, pid: Pid) -> Self {
        self.hwnd_pid = Some(pid);
        self
    }

    pub fn with_attached_pid(mut self, pid: Pid) -> Self {
        self.attached_pid = Some(pid);
        self
    }

    pub fn with_ancestor(mut self, ancestor: FakeElement) -> Self {
        self.ancestor = Some(Box::new(ancestor));
        self
    }
}

impl UiElement for FakeElement {
    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    fn hwnd_pid(&self) -> Option<Pid> {
        self.hwnd_pid
    }

    fn attached_pid(&self) -> Option<Pid> {
        self.attached_pid
    }

    fn taskbar_ancestor(&self) -> Option<Box<dyn UiElement>> {
        self.ancestor
            .as_ref()
            .map(|a| Box::new((**a).clone()) as Box<dyn UiElement>)
    }
}

/// Hit-testing double returning one fixed element, or nothing.
#[derive(Debug, Clone, Default)]
pub struct FakeUia {
    element: Option<FakeElement>,
}

impl FakeUia {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_element(element: FakeElement) -> Self {
        Self {
            element: Some(element),
        }
    }
}

impl UiAutomation for FakeUia {
    fn element_from_point(&self, _point: Point) -> Option<Box<dyn UiElement>> {
        self.element
            .as_ref()
            .map(|e| Box::new(e.clone()) as Box<dyn UiElement>)
    }
}

#[derive(Debug, Default)]
struct FakeSessionState {
    volume: f32,
    muted: bool,
}

/// Audio session double; clones share volume/mute state.
#[derive(Debug, Clone)]
pub struct FakeSession {
    pid: Pid,
    reported_name: Option<String>,
    expired: bool,
    failing: bool,
    peak: f32,
    state: Arc<Mutex<FakeSessionState>>,
}

impl FakeSession {
    pub fn new(pid: Pid) -> Self {
        Self {
            pid,
            reported_name: None,
            expired: false,
            failing: false,
            peak: 0.0,
            state: Arc::new(Mutex::new(FakeSessionState::default())),
        }
    }

    pub fn with_reported_name(mut self, name: &str) -> Self {
        self.reported_name = Some(name.to_string());
        self
    }

    pub fn expired(mut self) -> Self {
        self.expired = true;
        self
    }

    /// Every accessor returns an error.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    fn check(&self) -> Result<(), AudioError> {
        if self.failing {
            Err(AudioError::Session("fake failure".to_string()))
        } else {
            Ok(())
        }
    }
}

impl SessionControl for FakeSession {
    fn pid(&self) -> Pid {
        self.pid
    }

    fn reported_name(&self) -> Option<String> {
        self.reported_name.clone()
    }

    fn is_expired(&self) -> bool {
        self.expired
    }

    fn volume(&self) -> Result<f32, AudioError> {
        self.check()?;
        Ok(self.state.lock().volume)
    }

    fn set_volume(&self, volume: f32) -> Result<(), AudioError> {
        self.check()?;
        self.state.lock().volume = volume;
        Ok(())
    }

    fn muted(&self) -> Result<bool, AudioError> {
        self.check()?;
        Ok(self.state.lock().muted)
    }

    fn set_muted(&self, muted: bool) -> Result<(), AudioError> {
        self.check()?;
        self.state.lock().muted = muted;
        Ok(())
    }

    fn peak(&self) -> Result<f32, AudioError> {
        self.check()?;
        Ok(self.peak)
    }
}

/// Endpoint double returning clones of a fixed session list.
#[derive(Debug, Clone, Default)]
pub struct FakeEndpoint {
    sessions: Vec<FakeSession>,
    fail: bool,
}

impl FakeEndpoint {
    pub fn new(sessions: Vec<FakeSession>) -> Self {
        Self {
            sessions,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            sessions: Vec::new(),
            fail: true,
        }
    }
}

impl AudioEndpoint for FakeEndpoint {
    fn sessions(&self) -> Result<Vec<Box<dyn SessionControl>>, AudioError> {
        if self.fail {
            return Err(AudioError::NoDefaultDevice);
        }
        Ok(self
            .sessions
            .iter()
            .map(|s| Box::new(s.clone()) as Box<dyn SessionControl>)
            .collect())
    }
}

/// Single-monitor screen double.
#[derive(Debug, Clone)]
pub struct FakeScreens {
    area: Rect,
}

impl FakeScreens {
    pub fn new(area: Rect) -> Self {
        Self { area }
    }
}

impl ScreenMetrics for FakeScreens {
    fn working_area_at(&self, _point: Point) -> Rect {
        self.area
    }
}

#[derive(Debug, Default)]
struct FakePresenterState {
    presented: usize,
    fail_next: bool,
    last_pid: Option<Pid>,
}

/// Knob presenter double tracking what was shown.
#[derive(Debug, Clone, Default)]
pub struct FakePresenter {
    state: Arc<Mutex<FakePresenterState>>,
}

impl FakePresenter {
    /// Make the next `present` call fail.
    pub fn fail_next(self) -> Self {
        self.state.lock().fail_next = true;
        self
    }

    pub fn presented(&self) -> usize {
        self.state.lock().presented
    }

    pub fn last_session_pid(&self) -> Option<Pid> {
        self.state.lock().last_pid
    }
}

impl KnobPresenter for FakePresenter {
    fn present(
        &self,
        _position: Point,
        session: AppAudioSession,
        _show_peak: bool,
    ) -> Result<Box<dyn KnobHandle>, PresentError> {
        let mut state = self.state.lock();
        if state.fail_next {
            state.fail_next = false;
            return Err(PresentError::Failed("fake presenter failure".to_string()));
        }
        state.presented += 1;
        state.last_pid = Some(session.pid());
        Ok(Box::new(FakeKnob { visible: true }))
    }
}

/// Knob handle double with a plausible rendered size.
#[derive(Debug)]
pub struct FakeKnob {
    visible: bool,
}

impl KnobHandle for FakeKnob {
    fn hide(&mut self) {
        self.visible = false;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn size(&self) -> Option<(i32, i32)> {
        Some((280, 340))
    }

    fn move_to(&mut self, _position: Point) {}

    fn close(&mut self) {
        self.visible = false;
    }
}

#[derive(Debug, Default)]
struct FakePromptsState {
    infos: usize,
    errors: usize,
    confirms: usize,
    last_confirm_name: Option<String>,
    last_info: Option<String>,
}

/// Dialog double with canned answers and call counters.
#[derive(Debug, Clone)]
pub struct FakePrompts {
    confirm_answer: bool,
    pick: Option<String>,
    state: Arc<Mutex<FakePromptsState>>,
}

impl FakePrompts {
    pub fn new(confirm_answer: bool, pick: Option<String>) -> Self {
        Self {
            confirm_answer,
            pick,
            state: Arc::new(Mutex::new(FakePromptsState::default())),
        }
    }

    pub fn infos(&self) -> usize {
        self.state.lock().infos
    }

    pub fn errors(&self) -> usize {
        self.state.lock().errors
    }

    pub fn confirms(&self) -> usize {
        self.state.lock().confirms
    }

    pub fn last_confirm_name(&self) -> Option<String> {
        self.state.lock().last_confirm_name.clone()
    }

    pub fn last_info(&self) -> Option<String> {
        self.state.lock().last_info.clone()
    }
}

impl UserPrompts for FakePrompts {
    fn show_info(&self, _title: &str, message: &str) {
        let mut state = self.state.lock();
        state.infos += 1;
        state.last_info = Some(message.to_string());
    }

    fn show_error(&self, _title: &str, _message: &str) {
        self.state.lock().errors += 1;
    }

    fn confirm_mapping(&self, ui_name: &str) -> bool {
        let mut state = self.state.lock();
        state.confirms += 1;
        state.last_confirm_name = Some(ui_name.to_string());
        self.confirm_answer
    }

    fn pick_process(&self, _ui_name: &str) -> Option<String> {
        self.pick.clone()
    }
}

/// In-memory settings store.
#[derive(Debug, Default)]
pub struct MemorySettings {
    state: Mutex<crate::config::AppConfig>,
}

impl SettingsStore for MemorySettings {
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
        Ok(())
    }
}

/// Build a standalone [`AppAudioSession`] for a pid, via a fake endpoint.
pub fn session_for_pid(pid: Pid) -> AppAudioSession {
    let resolver = SessionResolver::new(
        Arc::new(FakeEndpoint::new(vec![FakeSession::new(pid)])),
        Arc::new(FakeOracle::default()),
    );
    resolver
        .session_for_process(pid)
        .expect("fake endpoint always has the session")
}
