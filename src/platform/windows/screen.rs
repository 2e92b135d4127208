// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Monitor working-area lookup.

use crate::platform::{Point, Rect, ScreenMetrics};
use windows::Win32::Foundation::POINT;
use windows::Win32::Graphics::Gdi::{
    GetMonitorInfoW, MonitorFromPoint, MONITORINFO, MONITOR_DEFAULTTONEAREST,
};

pub struct WinScreenMetrics;

impl WinScreenMetrics {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WinScreenMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenMetrics for WinScreenMetrics {
    fn working_area_at(&self, point: Point) -> Rect {
        unsafe {
            let monitor = MonitorFromPoint(
                POINT {
                    x: point.x,
                    y: point.y,
                },
                MONITOR_DEFAULTTONEAREST,
            );

            let mut info = MONITORINFO {
                cbSize: std::mem::size_of::<MONITORINFO>() as u32,
                ..Default::default()
            };

            if GetMonitorInfoW(monitor, &mut info).as_bool() {
                let work = info.rcWork;
                Rect {
                    x: work.left,
                    y: work.top,
                    width: work.right - work.left,
                    height: work.bottom - work.top,
                }
            } else {
                // Primary-monitor-sized fallback; position math still clamps.
                Rect {
                    x: 0,
                    y: 0,
                    width: 1920,
                    height: 1080,
                }
            }
        }
    }
}
