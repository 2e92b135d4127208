// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Notification-area icon with a Settings / Exit menu.
//!
//! The icon lives on its own thread with a message-only window; menu picks
//! are forwarded into the app event channel. Like the mouse hook, the
//! window procedure has no per-instance state, so the sender sits in a
//! process-wide slot.

use crate::app::{AppEvent, TrayMessage};
use parking_lot::Mutex;
use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;
use tracing::{error, info, warn};
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, POINT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Shell::{
    Shell_NotifyIconW, NIF_ICON, NIF_MESSAGE, NIF_TIP, NIM_ADD, NIM_DELETE, NOTIFYICONDATAW,
};
use windows::Win32::UI::WindowsAndMessaging::{
    AppendMenuW, CreatePopupMenu, CreateWindowExW, DefWindowProcW, DestroyMenu,
    DispatchMessageW, GetCursorPos, GetMessageW, LoadIconW, PostQuitMessage, PostThreadMessageW,
    RegisterClassW, SetForegroundWindow, TrackPopupMenu, TranslateMessage, IDI_APPLICATION,
    MF_SEPARATOR, MF_STRING, MSG, TPM_NONOTIFY, TPM_RETURNCMD, WINDOW_EX_STYLE, WM_APP,
    WM_CONTEXTMENU, WM_DESTROY, WM_QUIT, WM_RBUTTONUP, WNDCLASSW, WS_POPUP,
};

const WM_TRAY_CALLBACK: u32 = WM_APP + 1;
const TRAY_ICON_ID: u32 = 1;

const MENU_SETTINGS: usize = 1;
const MENU_EXIT: usize = 2;

static TRAY_SINK: Mutex<Option<Sender<AppEvent>>> = Mutex::new(None);

/// Handle to the running tray thread.
pub struct TrayHandle {
    thread: Option<JoinHandle<()>>,
    thread_id: u32,
}

impl TrayHandle {
    /// Remove the icon and stop the tray thread.
    pub fn shutdown(mut self) {
        info!("Shutting down tray icon");
        unsafe {
            let _ = PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        *TRAY_SINK.lock() = None;
    }
}

/// Start the tray icon. Returns `None` when the shell refuses the icon;
/// the app still works without it.
pub fn start_tray(events: Sender<AppEvent>) -> Option<TrayHandle> {
    *TRAY_SINK.lock() = Some(events);

    let (ready_tx, ready_rx) = mpsc::channel::<Option<u32>>();

    let thread = std::thread::spawn(move || unsafe {
        let instance = match GetModuleHandleW(None) {
            Ok(instance) => instance,
            Err(e) => {
                error!("GetModuleHandleW failed: {}", e);
                let _ = ready_tx.send(None);
                return;
            }
        };

        let class = WNDCLASSW {
            lpfnWndProc: Some(tray_proc),
            hInstance: instance.into(),
            lpszClassName: w!("volknob_tray"),
            ..Default::default()
        };
        RegisterClassW(&class);

        let hwnd = match CreateWindowExW(
            WINDOW_EX_STYLE::default(),
            w!("volknob_tray"),
            w!("VolKnob"),
            WS_POPUP,
            0,
            0,
            0,
            0,
            None,
            None,
            Some(instance.into()),
            None,
        ) {
            Ok(hwnd) => hwnd,
            Err(e) => {
                error!("Failed to create tray window: {}", e);
                let _ = ready_tx.send(None);
                return;
            }
        };

        let mut icon_data = NOTIFYICONDATAW {
            cbSize: std::mem::size_of::<NOTIFYICONDATAW>() as u32,
            hWnd: hwnd,
            uID: TRAY_ICON_ID,
            uFlags: NIF_MESSAGE | NIF_ICON | NIF_TIP,
            uCallbackMessage: WM_TRAY_CALLBACK,
            hIcon: LoadIconW(None, IDI_APPLICATION).unwrap_or_default(),
            ..Default::default()
        };
        let tip: Vec<u16> = "VolKnob".encode_utf16().collect();
        icon_data.szTip[..tip.len()].copy_from_slice(&tip);

        if !Shell_NotifyIconW(NIM_ADD, &icon_data).as_bool() {
            warn!("Shell rejected the tray icon");
            let _ = ready_tx.send(None);
            return;
        }

        let thread_id = windows::Win32::System::Threading::GetCurrentThreadId();
        let _ = ready_tx.send(Some(thread_id));
        info!("Tray icon started");

        let mut msg = MSG::default();
        while GetMessageW(&mut msg, None, 0, 0).as_bool() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }

        let _ = Shell_NotifyIconW(NIM_DELETE, &icon_data);
    });

    match ready_rx.recv() {
        Ok(Some(thread_id)) => Some(TrayHandle {
            thread: Some(thread),
            thread_id,
        }),
        _ => {
            let _ = thread.join();
            *TRAY_SINK.lock() = None;
            None
        }
    }
}

unsafe extern "system" fn tray_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    unsafe {
        match msg {
            WM_TRAY_CALLBACK => {
                let event = lparam.0 as u32;
                if event == WM_RBUTTONUP || event == WM_CONTEXTMENU {
                    show_tray_menu(hwnd);
                }
                LRESULT(0)
            }
            WM_DESTROY => {
                PostQuitMessage(0);
                LRESULT(0)
            }
            _ => DefWindowProcW(hwnd, msg, wparam, lparam),
        }
    }
}

unsafe fn show_tray_menu(hwnd: HWND) {
    unsafe {
        let Ok(menu) = CreatePopupMenu() else {
            return;
        };
        let _ = AppendMenuW(menu, MF_STRING, MENU_SETTINGS, w!("Settings"));
        let _ = AppendMenuW(menu, MF_SEPARATOR, 0, PCWSTR::null());
        let _ = AppendMenuW(menu, MF_STRING, MENU_EXIT, w!("Exit"));

        let mut cursor = POINT::default();
        let _ = GetCursorPos(&mut cursor);
        let _ = SetForegroundWindow(hwnd);

        let picked = TrackPopupMenu(
            menu,
            TPM_RETURNCMD | TPM_NONOTIFY,
            cursor.x,
            cursor.y,
            None,
            hwnd,
            None,
        );
        let _ = DestroyMenu(menu);

        let message = match picked.0 as usize {
            MENU_SETTINGS => Some(TrayMessage::OpenSettings),
            MENU_EXIT => Some(TrayMessage::Quit),
            _ => None,
        };

        if let Some(message) = message {
            if let Some(sink) = TRAY_SINK.lock().as_ref() {
                let _ = sink.send(AppEvent::Tray(message));
            }
        }
    }
}
