// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Process identification for clicked taskbar elements.
//!
//! A taskbar button only gives us a display name and, sometimes, a window
//! handle or an attached pid. Naive pid lookups land on shell processes
//! (the taskbar itself is owned by explorer), grouped buttons host several
//! windows, and browsers play audio from helper processes. Identification
//! therefore runs an ordered strategy chain and validates every candidate
//! against a shell-process denylist:
//!
//! 1. Direct - pid from the element's window handle or the element itself.
//! 2. Window title - score all top-level window titles against the name.
//! 3. Manual mapping - user-pinned process names from the mapping store.

use crate::mappings::MappingStore;
use crate::platform::{Pid, ProcessOracle, ProcessProbe, UiElement, WindowEnumerator};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Shell and OS helper processes that are never the user-facing app.
///
/// Taskbar UI elements frequently resolve to these via naive window-handle
/// lookups. "explorer" is special: a shell-owned taskbar button with no
/// deeper app window legitimately resolves to the shell process, but only
/// through the window-handle paths.
const SYSTEM_PROCESS_DENYLIST: &[&str] = &[
    "explorer",
    "svchost",
    "dwm",
    "csrss",
    "wininit",
    "services",
    "lsass",
    "smss",
    "System",
    "Idle",
    "Registry",
    "sihost",
    "ctfmon",
    "fontdrvhost",
    "ApplicationFrameHost",
    "ShellExperienceHost",
    "StartMenuExperienceHost",
    "SearchHost",
    "SearchApp",
    "SearchIndexer",
    "RuntimeBroker",
    "SecurityHealthSystray",
    "TextInputHost",
    "taskhostw",
    "dllhost",
    "consent",
    "audiodg",
];

/// Which strategy produced an identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdMethod {
    /// Pid read straight off the element (window handle or attached pid).
    Direct,
    /// Best-scoring top-level window title match.
    WindowTitle,
    /// User-defined mapping from the mapping store.
    ManualMapping,
}

impl IdMethod {
    pub fn display_name(&self) -> &'static str {
        match self {
            IdMethod::Direct => "direct",
            IdMethod::WindowTitle => "window title",
            IdMethod::ManualMapping => "manual mapping",
        }
    }
}

/// A successfully identified process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identification {
    pub pid: Pid,
    pub app_name: String,
    pub method: IdMethod,
}

/// A scored window-title candidate.
#[derive(Debug, Clone)]
struct TitleMatch {
    pid: Pid,
    score: u32,
    minimized: bool,
}

/// Runs the identification strategy chain.
pub struct ProcessIdentifier {
    own_pid: Pid,
    oracle: Arc<dyn ProcessOracle>,
    windows: Arc<dyn WindowEnumerator>,
    store: Arc<MappingStore>,
}

impl ProcessIdentifier {
    pub fn new(
        own_pid: Pid,
        oracle: Arc<dyn ProcessOracle>,
        windows: Arc<dyn WindowEnumerator>,
        store: Arc<MappingStore>,
    ) -> Self {
        Self {
            own_pid,
            oracle,
            windows,
            store,
        }
    }

    /// Identify the process behind a clicked taskbar element.
    ///
    /// `extracted_name` is the element name with the running-windows suffix
    /// stripped (see [`extract_app_name`]); an empty string disables the
    /// name-based strategies. Returns `None` when every strategy fails or
    /// the token is cancelled.
    pub fn identify(
        &self,
        element: &dyn UiElement,
        extracted_name: &str,
        token: &CancellationToken,
    ) -> Option<Identification> {
        if let Some(result) = self.direct_strategy(element) {
            return Some(result);
        }

        if token.is_cancelled() {
            return None;
        }
        if let Some(result) = self.window_title_strategy(extracted_name, token) {
            return Some(result);
        }

        if token.is_cancelled() {
            return None;
        }
        self.mapping_strategy(extracted_name, token)
    }

    /// Strategy 1: pid straight off the element.
    ///
    /// A pid obtained through the element's native window handle may be the
    /// shell itself; a pid merely attached to the element may not.
    fn direct_strategy(&self, element: &dyn UiElement) -> Option<Identification> {
        let (pid, allow_explorer) = match element.hwnd_pid().filter(|&p| p != 0) {
            Some(pid) => (pid, true),
            None => (element.attached_pid().filter(|&p| p != 0)?, false),
        };

        if !self.is_valid_app_pid(pid, allow_explorer) {
            trace!("Direct candidate pid {} rejected", pid);
            return None;
        }

        Some(Identification {
            pid,
            app_name: self.process_name_or_unknown(pid),
            method: IdMethod::Direct,
        })
    }

    /// Strategy 2: score every visible top-level window title.
    fn window_title_strategy(
        &self,
        extracted_name: &str,
        token: &CancellationToken,
    ) -> Option<Identification> {
        if extracted_name.is_empty() {
            return None;
        }

        let mut matches: Vec<TitleMatch> = Vec::new();
        for window in self.windows.top_level_windows() {
            if token.is_cancelled() {
                return None;
            }
            if !window.visible || window.cloaked || window.title.is_empty() {
                continue;
            }
            if window.pid == 0 || !self.is_valid_app_pid(window.pid, true) {
                continue;
            }

            let score = calculate_match_score(&window.title, extracted_name);
            if score > 0 {
                trace!(
                    "Title candidate {:?} (pid {}) scored {}",
                    window.title,
                    window.pid,
                    score
                );
                matches.push(TitleMatch {
                    pid: window.pid,
                    score,
                    minimized: window.minimized,
                });
            }
        }

        // Highest score wins; between equal scores prefer a window the user
        // can actually see.
        matches.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(a.minimized.cmp(&b.minimized))
        });
        let best = matches.into_iter().next()?;

        Some(Identification {
            pid: best.pid,
            app_name: self.process_name_or_unknown(best.pid),
            method: IdMethod::WindowTitle,
        })
    }

    /// Strategy 3: user-defined mappings, candidates in stored order.
    fn mapping_strategy(
        &self,
        extracted_name: &str,
        token: &CancellationToken,
    ) -> Option<Identification> {
        if extracted_name.is_empty() {
            return None;
        }

        let mappings = self.store.load();
        let entry = mappings.find(extracted_name)?;

        for candidate in &entry.process_names {
            if token.is_cancelled() {
                return None;
            }
            for pid in self.oracle.pids_by_name(candidate) {
                if token.is_cancelled() {
                    return None;
                }
                if self.is_valid_app_pid(pid, false) {
                    debug!(
                        "Mapped {:?} -> {:?} (pid {})",
                        extracted_name, candidate, pid
                    );
                    return Some(Identification {
                        pid,
                        app_name: self
                            .oracle
                            .image_name(pid)
                            .unwrap_or_else(|| candidate.clone()),
                        method: IdMethod::ManualMapping,
                    });
                }
            }
        }

        None
    }

    /// Whether `pid` can be the user-facing app behind a taskbar click.
    ///
    /// Access-denied probes count as valid: the process exists, it is just
    /// unreadable (elevated), and rejecting it would false-negative every
    /// elevated app.
    pub fn is_valid_app_pid(&self, pid: Pid, allow_explorer: bool) -> bool {
        if pid == 0 || pid == self.own_pid {
            return false;
        }

        match self.oracle.probe(pid) {
            ProcessProbe::Exited => false,
            ProcessProbe::AccessDenied => true,
            ProcessProbe::Running { name } => {
                if is_system_process(&name) {
                    allow_explorer && name.eq_ignore_ascii_case("explorer")
                } else {
                    true
                }
            }
        }
    }

    fn process_name_or_unknown(&self, pid: Pid) -> String {
        self.oracle
            .image_name(pid)
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

fn is_system_process(name: &str) -> bool {
    SYSTEM_PROCESS_DENYLIST
        .iter()
        .any(|deny| deny.eq_ignore_ascii_case(name))
}

/// Score a window title against an extracted taskbar name.
///
/// Exact match 100, prefix 90, browser-suffix special case 88, substring 70,
/// otherwise 0. The Firefox case sits above the substring rule: a title like
/// "Some Page - Mozilla Firefox" should rank between prefix and substring
/// matches rather than degrading to a plain substring hit.
pub fn calculate_match_score(window_title: &str, extracted_name: &str) -> u32 {
    let title = window_title.to_lowercase();
    let name = extracted_name.to_lowercase();

    if title == name {
        100
    } else if title.starts_with(&name) {
        90
    } else if name == "firefox" && title.ends_with("mozilla firefox") {
        88
    } else if title.contains(&name) {
        70
    } else {
        0
    }
}

/// Strip the `- N running windows` suffix the taskbar appends to grouped
/// buttons. Returns an empty string for blank input; otherwise the trimmed
/// name (unchanged when the suffix is absent).
pub fn extract_app_name(ui_name: &str) -> String {
    static SUFFIX: OnceLock<Regex> = OnceLock::new();

    if ui_name.trim().is_empty() {
        return String::new();
    }

    let re = SUFFIX.get_or_init(|| {
        Regex::new(r"(?i)^(.*?)(?:\s*-\s*\d+\s+running\s+windows?)?$")
            .expect("running-windows suffix pattern is valid")
    });

    match re.captures(ui_name) {
        Some(caps) => {
            let stripped = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
            if stripped.is_empty() {
                ui_name.trim().to_string()
            } else {
                stripped.to_string()
            }
        }
        None => ui_name.trim().to_string(),
    }
}
