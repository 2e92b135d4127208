// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Low-level global mouse hook.
//!
//! The hook runs on a dedicated thread with its own message pump; every
//! right-button release is forwarded with the cursor position, the pid of
//! the window under the cursor and the modifier keys held at that instant.
//! A low-level hook procedure carries no user data, so the event sender
//! lives in a process-wide slot guarded by a mutex.

use crate::platform::{ClickEvent, ModifierState, MouseHook, HookError, Pid};
use parking_lot::Mutex;
use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;
use tracing::{info, warn};
use windows::Win32::Foundation::{LPARAM, LRESULT, POINT, WPARAM};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, VK_CONTROL, VK_LWIN, VK_MENU, VK_RWIN, VK_SHIFT,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, GetWindowThreadProcessId, PostThreadMessageW,
    SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, WindowFromPoint, MSLLHOOKSTRUCT,
    MSG, WH_MOUSE_LL, WM_QUIT, WM_RBUTTONUP,
};

static CLICK_SINK: Mutex<Option<Sender<ClickEvent>>> = Mutex::new(None);

pub struct WinMouseHook {
    thread: Option<JoinHandle<()>>,
    thread_id: Option<u32>,
}

impl WinMouseHook {
    pub fn new() -> Self {
        Self {
            thread: None,
            thread_id: None,
        }
    }
}

impl Default for WinMouseHook {
    fn default() -> Self {
        Self::new()
    }
}

impl MouseHook for WinMouseHook {
    fn install(&mut self, events: Sender<ClickEvent>) -> Result<(), HookError> {
        if self.thread.is_some() {
            return Ok(());
        }

        *CLICK_SINK.lock() = Some(events);

        let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, String>>();

        let thread = std::thread::spawn(move || {
            unsafe {
                let hook = match SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_proc), None, 0) {
                    Ok(hook) => hook,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };

                let thread_id = windows::Win32::System::Threading::GetCurrentThreadId();
                let _ = ready_tx.send(Ok(thread_id));
                info!("Mouse hook installed");

                let mut msg = MSG::default();
                while GetMessageW(&mut msg, None, 0, 0).as_bool() {
                    let _ = TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                }

                let _ = UnhookWindowsHookEx(hook);
                info!("Mouse hook removed");
            }
        });

        match ready_rx.recv() {
            Ok(Ok(thread_id)) => {
                self.thread = Some(thread);
                self.thread_id = Some(thread_id);
                Ok(())
            }
            Ok(Err(message)) => {
                *CLICK_SINK.lock() = None;
                let _ = thread.join();
                Err(HookError::Install(message))
            }
            Err(_) => {
                *CLICK_SINK.lock() = None;
                Err(HookError::Install("hook thread died".to_string()))
            }
        }
    }

    fn uninstall(&mut self) {
        if let Some(thread_id) = self.thread_id.take() {
            unsafe {
                if let Err(e) =
                    PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0))
                {
                    warn!("Failed to stop hook thread: {}", e);
                }
            }
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        *CLICK_SINK.lock() = None;
    }
}

impl Drop for WinMouseHook {
    fn drop(&mut self) {
        self.uninstall();
    }
}

unsafe extern "system" fn mouse_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    unsafe {
        if code >= 0 && wparam.0 as u32 == WM_RBUTTONUP {
            let info = &*(lparam.0 as *const MSLLHOOKSTRUCT);
            let point = info.pt;

            if let Some(sink) = CLICK_SINK.lock().as_ref() {
                let _ = sink.send(ClickEvent {
                    x: point.x,
                    y: point.y,
                    hwnd_pid: pid_under_cursor(point),
                    modifiers: read_modifiers(),
                });
            }
        }

        CallNextHookEx(None, code, wparam, lparam)
    }
}

unsafe fn pid_under_cursor(point: POINT) -> Option<Pid> {
    unsafe {
        let hwnd = WindowFromPoint(point);
        if hwnd.is_invalid() {
            return None;
        }
        let mut pid: u32 = 0;
        GetWindowThreadProcessId(hwnd, Some(&mut pid));
        (pid != 0).then_some(pid)
    }
}

/// Modifier keys held right now, sampled in the hook callback so the state
/// belongs to the click rather than to whenever the event is processed.
fn read_modifiers() -> ModifierState {
    fn down(vk: windows::Win32::UI::Input::KeyboardAndMouse::VIRTUAL_KEY) -> bool {
        unsafe { (GetAsyncKeyState(vk.0 as i32) as u16 & 0x8000) != 0 }
    }

    ModifierState {
        ctrl: down(VK_CONTROL),
        alt: down(VK_MENU),
        shift: down(VK_SHIFT),
        win: down(VK_LWIN) || down(VK_RWIN),
    }
}
