// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The on-screen knob window.
//!
//! All knob windows are created on one dedicated UI thread owning a
//! message-only controller window; the presenter marshals creation requests
//! to it over a channel. Handles returned to the manager talk to the window
//! with cross-thread-safe calls (ShowWindow, SetWindowPos, PostMessage).
//!
//! The knob itself is a borderless topmost popup with a vertical volume
//! slider, a mute checkbox and an optional peak meter driven by a timer.
//! Deactivating the window (clicking elsewhere) hides it.

use crate::audio::AppAudioSession;
use crate::platform::{KnobHandle, KnobPresenter, Point, PresentError};
use parking_lot::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info, warn};
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, RECT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Controls::{
    InitCommonControlsEx, ICC_BAR_CLASSES, ICC_PROGRESS_CLASS, INITCOMMONCONTROLSEX,
    PBM_SETPOS, PBM_SETRANGE32, PBS_SMOOTH, PBS_VERTICAL, TBM_GETPOS, TBM_SETPOS,
    TBM_SETRANGE, TBS_VERT,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetDlgItem,
    GetMessageW, GetWindowLongPtrW, GetWindowRect, IsWindow, IsWindowVisible, KillTimer,
    PostMessageW, PostQuitMessage, RegisterClassW, SendMessageW, SetTimer, SetWindowLongPtrW,
    SetWindowPos, ShowWindow, TranslateMessage, BM_GETCHECK, BM_SETCHECK, BST_CHECKED,
    BST_UNCHECKED, BS_AUTOCHECKBOX, GWLP_USERDATA, HMENU, HWND_MESSAGE, MSG, SWP_NOACTIVATE,
    SWP_NOSIZE, SWP_NOZORDER, SW_HIDE, SW_SHOW, WA_INACTIVE, WINDOW_EX_STYLE, WINDOW_STYLE,
    WM_ACTIVATE, WM_APP, WM_CLOSE, WM_COMMAND, WM_CREATE, WM_DESTROY, WM_TIMER, WM_VSCROLL,
    WNDCLASSW, WS_BORDER, WS_CHILD, WS_EX_TOOLWINDOW, WS_EX_TOPMOST, WS_POPUP, WS_VISIBLE,
};

const WM_CONTROLLER_COMMAND: u32 = WM_APP + 2;

const KNOB_WIDTH: i32 = 280;
const KNOB_HEIGHT: i32 = 340;

const ID_TITLE: i32 = 101;
const ID_SLIDER: i32 = 102;
const ID_PEAK: i32 = 103;
const ID_MUTE: i32 = 104;

const PEAK_TIMER_ID: usize = 1;
const PEAK_TIMER_MS: u32 = 50;

/// Per-knob state attached to the window.
struct KnobState {
    session: AppAudioSession,
}

enum KnobCommand {
    Create {
        position: Point,
        session: AppAudioSession,
        show_peak: bool,
        reply: Sender<Result<isize, String>>,
    },
}

static COMMAND_QUEUE: Mutex<Option<Receiver<KnobCommand>>> = Mutex::new(None);

/// Knob presenter backed by the dedicated UI thread.
pub struct WinKnobPresenter {
    commands: Mutex<Sender<KnobCommand>>,
    controller: isize,
    ui_thread: Mutex<Option<JoinHandle<()>>>,
    shutdown: tokio_util::sync::CancellationToken,
}

impl WinKnobPresenter {
    /// Spawn the UI thread and its controller window.
    pub fn start(shutdown: tokio_util::sync::CancellationToken) -> Result<Self, PresentError> {
        let (command_tx, command_rx) = mpsc::channel::<KnobCommand>();
        *COMMAND_QUEUE.lock() = Some(command_rx);

        let (ready_tx, ready_rx) = mpsc::channel::<Result<isize, String>>();

        let ui_thread = std::thread::spawn(move || unsafe {
            match create_controller_window() {
                Ok(hwnd) => {
                    let _ = ready_tx.send(Ok(hwnd.0 as isize));
                    info!("Knob UI thread started");

                    let mut msg = MSG::default();
                    while GetMessageW(&mut msg, None, 0, 0).as_bool() {
                        let _ = TranslateMessage(&msg);
                        DispatchMessageW(&msg);
                    }
                }
                Err(e) => {
                    error!("Failed to create knob controller window: {}", e);
                    let _ = ready_tx.send(Err(e));
                }
            }
        });

        match ready_rx.recv() {
            Ok(Ok(controller)) => Ok(Self {
                commands: Mutex::new(command_tx),
                controller,
                ui_thread: Mutex::new(Some(ui_thread)),
                shutdown,
            }),
            Ok(Err(message)) => {
                let _ = ui_thread.join();
                Err(PresentError::Failed(message))
            }
            Err(_) => Err(PresentError::Failed("knob UI thread died".to_string())),
        }
    }

    fn controller_hwnd(&self) -> HWND {
        HWND(self.controller as *mut core::ffi::c_void)
    }
}

impl KnobPresenter for WinKnobPresenter {
    fn present(
        &self,
        position: Point,
        session: AppAudioSession,
        show_peak: bool,
    ) -> Result<Box<dyn KnobHandle>, PresentError> {
        if self.shutdown.is_cancelled() {
            return Err(PresentError::ShuttingDown);
        }

        let (reply_tx, reply_rx) = mpsc::channel();
        self.commands
            .lock()
            .send(KnobCommand::Create {
                position,
                session,
                show_peak,
                reply: reply_tx,
            })
            .map_err(|_| PresentError::Failed("knob UI thread gone".to_string()))?;

        unsafe {
            PostMessageW(
                Some(self.controller_hwnd()),
                WM_CONTROLLER_COMMAND,
                WPARAM(0),
                LPARAM(0),
            )
            .map_err(|e| PresentError::Failed(e.to_string()))?;
        }

        match reply_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(hwnd)) => Ok(Box::new(WinKnobHandle { hwnd })),
            Ok(Err(message)) => Err(PresentError::Failed(message)),
            Err(_) => Err(PresentError::Failed(
                "timed out waiting for knob window".to_string(),
            )),
        }
    }
}

impl Drop for WinKnobPresenter {
    fn drop(&mut self) {
        // Closing the controller posts the quit message from its WM_DESTROY.
        unsafe {
            let _ = PostMessageW(
                Some(self.controller_hwnd()),
                WM_CLOSE,
                WPARAM(0),
                LPARAM(0),
            );
        }
        if let Some(thread) = self.ui_thread.lock().take() {
            let _ = thread.join();
        }
        *COMMAND_QUEUE.lock() = None;
    }
}

/// Handle to one knob window; safe to use from any thread.
struct WinKnobHandle {
    hwnd: isize,
}

impl WinKnobHandle {
    fn hwnd(&self) -> HWND {
        HWND(self.hwnd as *mut core::ffi::c_void)
    }

    fn alive(&self) -> bool {
        unsafe { IsWindow(Some(self.hwnd())).as_bool() }
    }
}

impl KnobHandle for WinKnobHandle {
    fn hide(&mut self) {
        if self.alive() {
            unsafe {
                let _ = ShowWindow(self.hwnd(), SW_HIDE);
            }
        }
    }

    fn is_visible(&self) -> bool {
        self.alive() && unsafe { IsWindowVisible(self.hwnd()).as_bool() }
    }

    fn size(&self) -> Option<(i32, i32)> {
        if !self.alive() {
            return None;
        }
        let mut rect = RECT::default();
        unsafe {
            GetWindowRect(self.hwnd(), &mut rect).ok()?;
        }
        Some((rect.right - rect.left, rect.bottom - rect.top))
    }

    fn move_to(&mut self, position: Point) {
        if self.alive() {
            unsafe {
                let _ = SetWindowPos(
                    self.hwnd(),
                    None,
                    position.x,
                    position.y,
                    0,
                    0,
                    SWP_NOSIZE | SWP_NOZORDER | SWP_NOACTIVATE,
                );
            }
        }
    }

    fn close(&mut self) {
        if self.alive() {
            unsafe {
                let _ = PostMessageW(Some(self.hwnd()), WM_CLOSE, WPARAM(0), LPARAM(0));
            }
        }
    }
}

impl Drop for WinKnobHandle {
    fn drop(&mut self) {
        self.close();
    }
}

unsafe fn create_controller_window() -> Result<HWND, String> {
    unsafe {
        let instance = GetModuleHandleW(None).map_err(|e| e.to_string())?;

        let controls = INITCOMMONCONTROLSEX {
            dwSize: std::mem::size_of::<INITCOMMONCONTROLSEX>() as u32,
            dwICC: ICC_BAR_CLASSES | ICC_PROGRESS_CLASS,
        };
        let _ = InitCommonControlsEx(&controls);

        let controller_class = WNDCLASSW {
            lpfnWndProc: Some(controller_proc),
            hInstance: instance.into(),
            lpszClassName: w!("volknob_controller"),
            ..Default::default()
        };
        RegisterClassW(&controller_class);

        let knob_class = WNDCLASSW {
            lpfnWndProc: Some(knob_proc),
            hInstance: instance.into(),
            lpszClassName: w!("volknob_knob"),
            ..Default::default()
        };
        RegisterClassW(&knob_class);

        CreateWindowExW(
            WINDOW_EX_STYLE::default(),
            w!("volknob_controller"),
            PCWSTR::null(),
            WS_POPUP,
            0,
            0,
            0,
            0,
            Some(HWND_MESSAGE),
            None,
            Some(instance.into()),
            None,
        )
        .map_err(|e| e.to_string())
    }
}

unsafe extern "system" fn controller_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    unsafe {
        match msg {
            WM_CONTROLLER_COMMAND => {
                drain_commands();
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

unsafe fn drain_commands() {
    loop {
        let command = {
            let queue = COMMAND_QUEUE.lock();
            match queue.as_ref() {
                Some(rx) => rx.try_recv().ok(),
                None => None,
            }
        };
        let Some(command) = command else {
            break;
        };

        match command {
            KnobCommand::Create {
                position,
                session,
                show_peak,
                reply,
            } => {
                let result = unsafe { create_knob_window(position, session, show_peak) };
                let _ = reply.send(result.map(|hwnd| hwnd.0 as isize));
            }
        }
    }
}

unsafe fn create_knob_window(
    position: Point,
    session: AppAudioSession,
    show_peak: bool,
) -> Result<HWND, String> {
    unsafe {
        let instance = GetModuleHandleW(None).map_err(|e| e.to_string())?;

        let title: Vec<u16> = session
            .display_name()
            .encode_utf16()
            .chain(std::iter::once(0))
            .collect();

        let initial_volume = session.volume();
        let initial_mute = session.is_muted();

        let state = Box::new(KnobState { session });

        let hwnd = CreateWindowExW(
            WS_EX_TOPMOST | WS_EX_TOOLWINDOW,
            w!("volknob_knob"),
            PCWSTR(title.as_ptr()),
            WS_POPUP | WS_BORDER,
            position.x,
            position.y,
            KNOB_WIDTH,
            KNOB_HEIGHT,
            None,
            None,
            Some(instance.into()),
            None,
        )
        .map_err(|e| e.to_string())?;

        SetWindowLongPtrW(hwnd, GWLP_USERDATA, Box::into_raw(state) as isize);

        // App name label.
        let _ = CreateWindowExW(
            WINDOW_EX_STYLE::default(),
            w!("STATIC"),
            PCWSTR(title.as_ptr()),
            WS_CHILD | WS_VISIBLE,
            10,
            10,
            KNOB_WIDTH - 20,
            22,
            Some(hwnd),
            Some(HMENU(ID_TITLE as *mut core::ffi::c_void)),
            Some(instance.into()),
            None,
        );

        // Vertical volume slider, 0 (top, loud) to 100 (bottom, silent).
        let slider = CreateWindowExW(
            WINDOW_EX_STYLE::default(),
            w!("msctls_trackbar32"),
            PCWSTR::null(),
            WS_CHILD | WS_VISIBLE | WINDOW_STYLE(TBS_VERT as u32),
            60,
            44,
            60,
            230,
            Some(hwnd),
            Some(HMENU(ID_SLIDER as *mut core::ffi::c_void)),
            Some(instance.into()),
            None,
        )
        .map_err(|e| e.to_string())?;
        SendMessageW(
            slider,
            TBM_SETRANGE,
            Some(WPARAM(1)),
            Some(LPARAM((100 << 16) as isize)),
        );
        SendMessageW(
            slider,
            TBM_SETPOS,
            Some(WPARAM(1)),
            Some(LPARAM(volume_to_slider(initial_volume) as isize)),
        );

        // Peak meter.
        if show_peak {
            let peak = CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                w!("msctls_progress32"),
                PCWSTR::null(),
                WS_CHILD | WS_VISIBLE | WINDOW_STYLE((PBS_VERTICAL | PBS_SMOOTH) as u32),
                160,
                44,
                24,
                230,
                Some(hwnd),
                Some(HMENU(ID_PEAK as *mut core::ffi::c_void)),
                Some(instance.into()),
                None,
            )
            .map_err(|e| e.to_string())?;
            SendMessageW(
                peak,
                PBM_SETRANGE32,
                Some(WPARAM(0)),
                Some(LPARAM(100)),
            );
            SetTimer(Some(hwnd), PEAK_TIMER_ID, PEAK_TIMER_MS, None);
        }

        // Mute checkbox.
        let mute = CreateWindowExW(
            WINDOW_EX_STYLE::default(),
            w!("BUTTON"),
            w!("Mute"),
            WS_CHILD | WS_VISIBLE | WINDOW_STYLE(BS_AUTOCHECKBOX as u32),
            10,
            290,
            120,
            26,
            Some(hwnd),
            Some(HMENU(ID_MUTE as *mut core::ffi::c_void)),
            Some(instance.into()),
            None,
        )
        .map_err(|e| e.to_string())?;
        SendMessageW(
            mute,
            BM_SETCHECK,
            Some(WPARAM(if initial_mute {
                BST_CHECKED.0 as usize
            } else {
                BST_UNCHECKED.0 as usize
            })),
            Some(LPARAM(0)),
        );

        let _ = ShowWindow(hwnd, SW_SHOW);
        Ok(hwnd)
    }
}

fn volume_to_slider(volume: f32) -> i32 {
    // Slider position 0 is the top of a vertical trackbar.
    (100.0 - (volume.clamp(0.0, 1.0) * 100.0)).round() as i32
}

fn slider_to_volume(position: i32) -> f32 {
    ((100 - position.clamp(0, 100)) as f32) / 100.0
}

unsafe fn knob_state<'a>(hwnd: HWND) -> Option<&'a KnobState> {
    unsafe {
        let ptr = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *const KnobState;
        ptr.as_ref()
    }
}

unsafe extern "system" fn knob_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    unsafe {
        match msg {
            WM_CREATE => LRESULT(0),
            WM_VSCROLL => {
                if let (Some(state), Ok(slider)) =
                    (knob_state(hwnd), GetDlgItem(Some(hwnd), ID_SLIDER))
                {
                    let position =
                        SendMessageW(slider, TBM_GETPOS, Some(WPARAM(0)), Some(LPARAM(0)));
                    state.session.set_volume(slider_to_volume(position.0 as i32));
                }
                LRESULT(0)
            }
            WM_COMMAND => {
                let control_id = (wparam.0 & 0xFFFF) as i32;
                if control_id == ID_MUTE {
                    if let (Some(state), Ok(button)) =
                        (knob_state(hwnd), GetDlgItem(Some(hwnd), ID_MUTE))
                    {
                        let checked = SendMessageW(
                            button,
                            BM_GETCHECK,
                            Some(WPARAM(0)),
                            Some(LPARAM(0)),
                        );
                        state.session.set_muted(checked.0 as u32 == BST_CHECKED.0);
                    }
                }
                LRESULT(0)
            }
            WM_TIMER => {
                if wparam.0 == PEAK_TIMER_ID {
                    if let (Some(state), Ok(peak_bar)) =
                        (knob_state(hwnd), GetDlgItem(Some(hwnd), ID_PEAK))
                    {
                        let level = (state.session.peak() * 100.0).round() as usize;
                        SendMessageW(
                            peak_bar,
                            PBM_SETPOS,
                            Some(WPARAM(level)),
                            Some(LPARAM(0)),
                        );
                    }
                }
                LRESULT(0)
            }
            WM_ACTIVATE => {
                if (wparam.0 & 0xFFFF) as u32 == WA_INACTIVE {
                    // Clicking anywhere else dismisses the knob.
                    let _ = ShowWindow(hwnd, SW_HIDE);
                }
                LRESULT(0)
            }
            WM_CLOSE => {
                let _ = DestroyWindow(hwnd);
                LRESULT(0)
            }
            WM_DESTROY => {
                let _ = KillTimer(Some(hwnd), PEAK_TIMER_ID);
                let ptr = SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0) as *mut KnobState;
                if !ptr.is_null() {
                    // Releases the audio session handle exactly once.
                    drop(Box::from_raw(ptr));
                } else {
                    warn!("Knob window destroyed without state");
                }
                LRESULT(0)
            }
            _ => DefWindowProcW(hwnd, msg, wparam, lparam),
        }
    }
}
