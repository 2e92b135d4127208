// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! UI Automation hit testing and taskbar ancestor walking.
//!
//! COM objects created here never leave the calling thread; the automation
//! instance is created per lookup so the background worker that happens to
//! run the pipeline owns its own apartment state.

use crate::platform::{Pid, Point, UiAutomation, UiElement};
use windows::Win32::Foundation::POINT;
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CLSCTX_INPROC_SERVER, COINIT_MULTITHREADED,
};
use windows::Win32::UI::Accessibility::{
    CUIAutomation, IUIAutomation, IUIAutomationElement, IUIAutomationTreeWalker,
    UIA_ButtonControlTypeId, UIA_ListItemControlTypeId,
};
use windows::Win32::UI::WindowsAndMessaging::GetWindowThreadProcessId;

/// Window classes of the shell taskbar family.
const TASKBAR_CLASSES: &[&str] = &["Shell_TrayWnd", "Shell_SecondaryTrayWnd"];
const TASKBAR_CLASS_PREFIX: &str = "TaskListWnd";

/// Ancestor walk bounds.
const MAX_ANCESTOR_DEPTH: usize = 32;
const MAX_TASKBAR_CHECK_DEPTH: usize = 10;

pub struct WinUiAutomation;

impl WinUiAutomation {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WinUiAutomation {
    fn default() -> Self {
        Self::new()
    }
}

impl UiAutomation for WinUiAutomation {
    fn element_from_point(&self, point: Point) -> Option<Box<dyn UiElement>> {
        unsafe {
            // Already-initialized apartments return a benign error.
            let _ = CoInitializeEx(None, COINIT_MULTITHREADED);

            let automation: IUIAutomation =
                CoCreateInstance(&CUIAutomation, None, CLSCTX_INPROC_SERVER).ok()?;
            let element = automation
                .ElementFromPoint(POINT {
                    x: point.x,
                    y: point.y,
                })
                .ok()?;
            let walker = automation.ControlViewWalker().ok()?;

            Some(Box::new(WinUiElement { element, walker }))
        }
    }
}

struct WinUiElement {
    element: IUIAutomationElement,
    walker: IUIAutomationTreeWalker,
}

impl UiElement for WinUiElement {
    fn name(&self) -> Option<String> {
        unsafe { self.element.CurrentName().ok().map(|name| name.to_string()) }
    }

    fn hwnd_pid(&self) -> Option<Pid> {
        unsafe {
            let hwnd = self.element.CurrentNativeWindowHandle().ok()?;
            if hwnd.is_invalid() {
                return None;
            }
            let mut pid: u32 = 0;
            GetWindowThreadProcessId(hwnd, Some(&mut pid));
            (pid != 0).then_some(pid)
        }
    }

    fn attached_pid(&self) -> Option<Pid> {
        unsafe {
            let pid = self.element.CurrentProcessId().ok()?;
            (pid > 0).then_some(pid as u32)
        }
    }

    fn taskbar_ancestor(&self) -> Option<Box<dyn UiElement>> {
        unsafe {
            let mut current = self.element.clone();

            for _ in 0..MAX_ANCESTOR_DEPTH {
                if is_taskbar_item(&current) && is_descendant_of_taskbar(&current, &self.walker)
                {
                    return Some(Box::new(WinUiElement {
                        element: current,
                        walker: self.walker.clone(),
                    }));
                }

                current = match self.walker.GetParentElement(&current) {
                    Ok(parent) => parent,
                    Err(_) => return None,
                };
            }

            None
        }
    }
}

unsafe fn is_taskbar_item(element: &IUIAutomationElement) -> bool {
    match unsafe { element.CurrentControlType() } {
        Ok(control_type) => {
            control_type == UIA_ButtonControlTypeId || control_type == UIA_ListItemControlTypeId
        }
        Err(_) => false,
    }
}

unsafe fn is_descendant_of_taskbar(
    element: &IUIAutomationElement,
    walker: &IUIAutomationTreeWalker,
) -> bool {
    let mut current = element.clone();

    for _ in 0..MAX_TASKBAR_CHECK_DEPTH {
        if let Ok(class_name) = unsafe { current.CurrentClassName() } {
            let class_name = class_name.to_string();
            if TASKBAR_CLASSES.contains(&class_name.as_str())
                || class_name.starts_with(TASKBAR_CLASS_PREFIX)
            {
                return true;
            }
        }

        current = match unsafe { walker.GetParentElement(&current) } {
            Ok(parent) => parent,
            Err(_) => return false,
        };
    }

    false
}
