// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Maps process ids to audio sessions on the default playback device.
//!
//! The default device can change between clicks, so the endpoint is
//! re-queried on every resolution rather than cached. Session handles own
//! their OS object; non-matching handles opened during a scan are released
//! when the scan's vector drops.

use crate::platform::{AudioEndpoint, Pid, ProcessOracle, SessionControl};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// A live audio session bound to one process.
///
/// All accessors are fail-soft: an OS error reads as silence (volume 0,
/// unmuted, zero peak) instead of surfacing to the knob. The volume setter
/// clamps to `[0.0, 1.0]`.
pub struct AppAudioSession {
    pid: Pid,
    display_name: String,
    control: Box<dyn SessionControl>,
}

impl AppAudioSession {
    fn new(pid: Pid, display_name: String, control: Box<dyn SessionControl>) -> Self {
        Self {
            pid,
            display_name,
            control,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn volume(&self) -> f32 {
        match self.control.volume() {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to read volume for pid {}: {}", self.pid, e);
                0.0
            }
        }
    }

    pub fn set_volume(&self, volume: f32) {
        let clamped = volume.clamp(0.0, 1.0);
        if let Err(e) = self.control.set_volume(clamped) {
            warn!("Failed to set volume for pid {}: {}", self.pid, e);
        }
    }

    pub fn is_muted(&self) -> bool {
        match self.control.muted() {
            Ok(m) => m,
            Err(e) => {
                warn!("Failed to read mute for pid {}: {}", self.pid, e);
                false
            }
        }
    }

    pub fn set_muted(&self, muted: bool) {
        if let Err(e) = self.control.set_muted(muted) {
            warn!("Failed to set mute for pid {}: {}", self.pid, e);
        }
    }

    /// Instantaneous peak meter level, 0.0 on error.
    pub fn peak(&self) -> f32 {
        self.control.peak().unwrap_or(0.0)
    }
}

impl fmt::Debug for AppAudioSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppAudioSession")
            .field("pid", &self.pid)
            .field("display_name", &self.display_name)
            .finish()
    }
}

/// Resolves processes to sessions on the default render endpoint.
pub struct SessionResolver {
    endpoint: Arc<dyn AudioEndpoint>,
    oracle: Arc<dyn ProcessOracle>,
    /// Pid -> executable name memoization; dropped on lookup failure so an
    /// exited process does not leave a stale name behind.
    name_cache: Mutex<HashMap<Pid, String>>,
}

impl SessionResolver {
    pub fn new(endpoint: Arc<dyn AudioEndpoint>, oracle: Arc<dyn ProcessOracle>) -> Self {
        Self {
            endpoint,
            oracle,
            name_cache: Mutex::new(HashMap::new()),
        }
    }

    /// The session owned by exactly `pid`, or `None`.
    pub fn session_for_process(&self, pid: Pid) -> Option<AppAudioSession> {
        if pid == 0 {
            return None;
        }

        let sessions = match self.endpoint.sessions() {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!("Audio session enumeration failed: {}", e);
                return None;
            }
        };

        for control in sessions {
            if control.pid() == pid {
                let display_name = self.resolve_display_name(control.as_ref());
                debug!("Resolved audio session for pid {} ({})", pid, display_name);
                return Some(AppAudioSession::new(pid, display_name, control));
            }
            // Non-matching handle released here when `control` drops.
        }

        None
    }

    /// Every non-expired session with a real owning process.
    pub fn all_sessions(&self) -> Vec<AppAudioSession> {
        let sessions = match self.endpoint.sessions() {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!("Audio session enumeration failed: {}", e);
                return Vec::new();
            }
        };

        sessions
            .into_iter()
            .filter(|s| !s.is_expired() && s.pid() != 0)
            .map(|control| {
                let display_name = self.resolve_display_name(control.as_ref());
                AppAudioSession::new(control.pid(), display_name, control)
            })
            .collect()
    }

    /// Session for the process owning a window, used by the hook event's
    /// window-under-cursor pid.
    pub fn session_for_window(&self, window_pid: Option<Pid>) -> Option<AppAudioSession> {
        self.session_for_process(window_pid?)
    }

    /// Session-reported name, then executable name, then `"PID: {pid}"`.
    fn resolve_display_name(&self, control: &dyn SessionControl) -> String {
        if let Some(name) = control.reported_name().filter(|n| !n.trim().is_empty()) {
            return name;
        }

        let pid = control.pid();
        if let Some(name) = self.cached_image_name(pid) {
            return name;
        }

        format!("PID: {}", pid)
    }

    fn cached_image_name(&self, pid: Pid) -> Option<String> {
        let mut cache = self.name_cache.lock();
        if let Some(name) = cache.get(&pid) {
            return Some(name.clone());
        }

        match self.oracle.image_name(pid) {
            Some(name) => {
                cache.insert(pid, name.clone());
                Some(name)
            }
            None => {
                cache.remove(&pid);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::testing::{FakeEndpoint, FakeOracle, FakeSession};

    fn resolver(endpoint: FakeEndpoint, oracle: FakeOracle) -> SessionResolver {
        SessionResolver::new(Arc::new(endpoint), Arc::new(oracle))
    }

    #[test]
    fn test_session_for_process_matches_exact_pid_only() {
        let endpoint = FakeEndpoint::new(vec![
            FakeSession::new(100),
            FakeSession::new(200),
        ]);
        let r = resolver(endpoint, FakeOracle::default());

        assert_eq!(r.session_for_process(200).unwrap().pid(), 200);
        assert!(r.session_for_process(300).is_none());
        assert!(r.session_for_process(0).is_none());
    }

    #[test]
    fn test_all_sessions_filters_expired_and_pid_zero() {
        let endpoint = FakeEndpoint::new(vec![
            FakeSession::new(100),
            FakeSession::new(0),
            FakeSession::new(200).expired(),
        ]);
        let r = resolver(endpoint, FakeOracle::default());

        let sessions = r.all_sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].pid(), 100);
    }

    #[test]
    fn test_display_name_prefers_session_reported_name() {
        let endpoint = FakeEndpoint::new(vec![
            FakeSession::new(100).with_reported_name("Spotify Free")
        ]);
        let oracle = FakeOracle::default().with_process(100, "Spotify");
        let r = resolver(endpoint, oracle);

        assert_eq!(
            r.session_for_process(100).unwrap().display_name(),
            "Spotify Free"
        );
    }

    #[test]
    fn test_display_name_falls_back_to_image_name_then_pid() {
        let endpoint = FakeEndpoint::new(vec![FakeSession::new(100), FakeSession::new(200)]);
        let oracle = FakeOracle::default().with_process(100, "Spotify");
        let r = resolver(endpoint, oracle);

        assert_eq!(r.session_for_process(100).unwrap().display_name(), "Spotify");
        assert_eq!(r.session_for_process(200).unwrap().display_name(), "PID: 200");
    }

    #[test]
    fn test_set_volume_clamps_to_unit_range() {
        let endpoint = FakeEndpoint::new(vec![FakeSession::new(100)]);
        let r = resolver(endpoint, FakeOracle::default());
        let session = r.session_for_process(100).unwrap();

        session.set_volume(1.5);
        assert_eq!(session.volume(), 1.0);
        session.set_volume(-0.25);
        assert_eq!(session.volume(), 0.0);
        session.set_volume(0.4);
        assert!((session.volume() - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn test_accessors_fail_soft_on_session_errors() {
        let endpoint = FakeEndpoint::new(vec![FakeSession::new(100).failing()]);
        let r = resolver(endpoint, FakeOracle::default());
        let session = r.session_for_process(100).unwrap();

        assert_eq!(session.volume(), 0.0);
        assert!(!session.is_muted());
        assert_eq!(session.peak(), 0.0);
        // Setters swallow the error.
        session.set_volume(0.5);
        session.set_muted(true);
    }

    #[test]
    fn test_endpoint_failure_yields_empty_results() {
        let r = resolver(FakeEndpoint::failing(), FakeOracle::default());
        assert!(r.session_for_process(100).is_none());
        assert!(r.all_sessions().is_empty());
    }

    #[test]
    fn test_session_for_window_delegates_by_pid() {
        let endpoint = FakeEndpoint::new(vec![FakeSession::new(100)]);
        let r = resolver(endpoint, FakeOracle::default());
        assert!(r.session_for_window(Some(100)).is_some());
        assert!(r.session_for_window(None).is_none());
    }
}
