// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Top-level window enumeration with cloaked-state detection.

use crate::platform::{WindowEnumerator, WindowInfo};
use windows::core::BOOL;
use windows::Win32::Foundation::{HWND, LPARAM};
use windows::Win32::Graphics::Dwm::{DwmGetWindowAttribute, DWMWA_CLOAKED};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetWindowTextLengthW, GetWindowTextW, GetWindowThreadProcessId, IsIconic,
    IsWindowVisible,
};

pub struct WinWindowEnumerator;

impl WinWindowEnumerator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WinWindowEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowEnumerator for WinWindowEnumerator {
    fn top_level_windows(&self) -> Vec<WindowInfo> {
        unsafe extern "system" fn enum_proc(hwnd: HWND, lparam: LPARAM) -> BOOL {
            // Safety: the caller passes a valid Vec pointer via LPARAM and
            // the enumeration is synchronous.
            let windows = unsafe { &mut *(lparam.0 as *mut Vec<WindowInfo>) };

            unsafe {
                let visible = IsWindowVisible(hwnd).as_bool();

                let title_len = GetWindowTextLengthW(hwnd);
                let title = if title_len > 0 {
                    let mut buf: Vec<u16> = vec![0; (title_len as usize) + 1];
                    let copied = GetWindowTextW(hwnd, &mut buf);
                    String::from_utf16_lossy(&buf[..copied as usize])
                } else {
                    String::new()
                };

                let mut pid: u32 = 0;
                GetWindowThreadProcessId(hwnd, Some(&mut pid));

                windows.push(WindowInfo {
                    pid,
                    title,
                    visible,
                    cloaked: is_cloaked(hwnd),
                    minimized: IsIconic(hwnd).as_bool(),
                });
            }

            BOOL(1)
        }

        let mut windows: Vec<WindowInfo> = Vec::new();
        unsafe {
            let _ = EnumWindows(Some(enum_proc), LPARAM((&mut windows as *mut _) as isize));
        }
        windows
    }
}

fn is_cloaked(hwnd: HWND) -> bool {
    let mut cloaked: u32 = 0;
    unsafe {
        DwmGetWindowAttribute(
            hwnd,
            DWMWA_CLOAKED,
            (&mut cloaked as *mut u32).cast(),
            std::mem::size_of::<u32>() as u32,
        )
        .map(|_| cloaked != 0)
        .unwrap_or(false)
    }
}
