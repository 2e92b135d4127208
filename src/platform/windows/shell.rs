// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Message boxes, the process-picker menu, and shell open helpers.

use crate::platform::{ProcessOracle, UserPrompts, WindowEnumerator};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{HWND, POINT};
use windows::Win32::UI::Shell::ShellExecuteW;
use windows::Win32::UI::WindowsAndMessaging::{
    AppendMenuW, CreatePopupMenu, CreateWindowExW, DestroyMenu, DestroyWindow, GetCursorPos,
    MessageBoxW, SetForegroundWindow, TrackPopupMenu, HMENU, IDYES, MB_ICONERROR,
    MB_ICONINFORMATION, MB_ICONQUESTION, MB_OK, MB_SETFOREGROUND, MB_YESNO, MF_STRING,
    SW_SHOWNORMAL, TPM_NONOTIFY, TPM_RETURNCMD, WINDOW_EX_STYLE, WS_POPUP,
};

/// Null-terminated UTF-16 for PCWSTR arguments.
fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Native dialogs, shutdown-guarded so no window appears mid-teardown.
pub struct WinPrompts {
    shutdown: CancellationToken,
    windows: Arc<dyn WindowEnumerator>,
    oracle: Arc<dyn ProcessOracle>,
}

impl WinPrompts {
    pub fn new(
        shutdown: CancellationToken,
        windows: Arc<dyn WindowEnumerator>,
        oracle: Arc<dyn ProcessOracle>,
    ) -> Self {
        Self {
            shutdown,
            windows,
            oracle,
        }
    }

    /// Processes that own a visible, titled window; the plausible mapping
    /// targets a user would recognize.
    fn candidate_processes(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for window in self.windows.top_level_windows() {
            if !window.visible || window.cloaked || window.title.is_empty() || window.pid == 0 {
                continue;
            }
            if let Some(name) = self.oracle.image_name(window.pid) {
                if !names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
                    names.push(name);
                }
            }
        }
        names.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()));
        names
    }
}

impl UserPrompts for WinPrompts {
    fn show_info(&self, title: &str, message: &str) {
        if self.shutdown.is_cancelled() {
            return;
        }
        let title = to_wide(title);
        let message = to_wide(message);
        unsafe {
            MessageBoxW(
                None,
                PCWSTR(message.as_ptr()),
                PCWSTR(title.as_ptr()),
                MB_OK | MB_ICONINFORMATION | MB_SETFOREGROUND,
            );
        }
    }

    fn show_error(&self, title: &str, message: &str) {
        if self.shutdown.is_cancelled() {
            return;
        }
        let title = to_wide(title);
        let message = to_wide(message);
        unsafe {
            MessageBoxW(
                None,
                PCWSTR(message.as_ptr()),
                PCWSTR(title.as_ptr()),
                MB_OK | MB_ICONERROR | MB_SETFOREGROUND,
            );
        }
    }

    fn confirm_mapping(&self, ui_name: &str) -> bool {
        if self.shutdown.is_cancelled() {
            return false;
        }
        let message = to_wide(&format!(
            "No audio process could be found for the clicked item:\n\n'{}'\n\n\
             Map this name to a running process?",
            ui_name
        ));
        unsafe {
            MessageBoxW(
                None,
                PCWSTR(message.as_ptr()),
                w!("Manual mapping needed"),
                MB_YESNO | MB_ICONQUESTION | MB_SETFOREGROUND,
            ) == IDYES
        }
    }

    fn pick_process(&self, ui_name: &str) -> Option<String> {
        if self.shutdown.is_cancelled() {
            return None;
        }

        let candidates = self.candidate_processes();
        if candidates.is_empty() {
            self.show_info(
                "No processes found",
                "No windowed processes are available to map to.",
            );
            return None;
        }

        unsafe {
            // TrackPopupMenu needs an owner window for focus bookkeeping.
            let owner = CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                w!("STATIC"),
                PCWSTR::null(),
                WS_POPUP,
                0,
                0,
                0,
                0,
                None,
                None,
                None,
                None,
            )
            .ok()?;

            let selection = show_candidate_menu(owner, &candidates);
            let _ = DestroyWindow(owner);

            if selection.is_none() {
                warn!("Process picker dismissed for {:?}", ui_name);
            }
            selection
        }
    }
}

unsafe fn show_candidate_menu(owner: HWND, candidates: &[String]) -> Option<String> {
    unsafe {
        let menu: HMENU = CreatePopupMenu().ok()?;

        // Keep ownership of the wide strings until the menu closes.
        let labels: Vec<Vec<u16>> = candidates.iter().map(|c| to_wide(c)).collect();
        for (index, label) in labels.iter().enumerate() {
            let _ = AppendMenuW(menu, MF_STRING, index + 1, PCWSTR(label.as_ptr()));
        }

        let mut cursor = POINT::default();
        let _ = GetCursorPos(&mut cursor);
        let _ = SetForegroundWindow(owner);

        let picked = TrackPopupMenu(
            menu,
            TPM_RETURNCMD | TPM_NONOTIFY,
            cursor.x,
            cursor.y,
            None,
            owner,
            None,
        );
        let _ = DestroyMenu(menu);

        let index = picked.0 as usize;
        (index >= 1 && index <= candidates.len()).then(|| candidates[index - 1].clone())
    }
}

/// Open the settings file with its associated editor.
pub fn open_in_default_editor(path: &Path) {
    let wide = to_wide(&path.to_string_lossy());
    unsafe {
        ShellExecuteW(
            None,
            w!("open"),
            PCWSTR(wide.as_ptr()),
            None,
            None,
            SW_SHOWNORMAL,
        );
    }
}
