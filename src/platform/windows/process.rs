// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Process table queries via OpenProcess and the toolhelp snapshot API.

use crate::platform::{Pid, ProcessOracle, ProcessProbe};
use windows::core::PWSTR;
use windows::Win32::Foundation::{CloseHandle, ERROR_ACCESS_DENIED, WAIT_TIMEOUT};
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
    TH32CS_SNAPPROCESS,
};
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, WaitForSingleObject, PROCESS_NAME_WIN32,
    PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_SYNCHRONIZE,
};

pub struct WinProcessOracle;

impl WinProcessOracle {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WinProcessOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessOracle for WinProcessOracle {
    fn probe(&self, pid: Pid) -> ProcessProbe {
        if pid == 0 {
            return ProcessProbe::Exited;
        }

        unsafe {
            let handle = match OpenProcess(
                PROCESS_QUERY_LIMITED_INFORMATION | PROCESS_SYNCHRONIZE,
                false,
                pid,
            ) {
                Ok(h) => h,
                Err(e) => {
                    // The process exists but is not openable (elevated).
                    if e.code() == ERROR_ACCESS_DENIED.to_hresult() {
                        return ProcessProbe::AccessDenied;
                    }
                    return ProcessProbe::Exited;
                }
            };

            // A signaled process handle means the process has exited even
            // though the pid was still openable.
            let alive = WaitForSingleObject(handle, 0) == WAIT_TIMEOUT;
            let name = if alive { image_name_from_handle(handle) } else { None };
            let _ = CloseHandle(handle);

            if !alive {
                return ProcessProbe::Exited;
            }
            match name {
                Some(name) => ProcessProbe::Running { name },
                None => ProcessProbe::AccessDenied,
            }
        }
    }

    fn pids_by_name(&self, name: &str) -> Vec<Pid> {
        let mut pids = Vec::new();

        unsafe {
            let snapshot = match CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) {
                Ok(s) => s,
                Err(_) => return pids,
            };

            let mut entry = PROCESSENTRY32W {
                dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
                ..Default::default()
            };

            if Process32FirstW(snapshot, &mut entry).is_ok() {
                loop {
                    let exe = utf16_to_string(&entry.szExeFile);
                    if strip_exe_suffix(&exe).eq_ignore_ascii_case(name) {
                        pids.push(entry.th32ProcessID);
                    }
                    if Process32NextW(snapshot, &mut entry).is_err() {
                        break;
                    }
                }
            }

            let _ = CloseHandle(snapshot);
        }

        pids
    }
}

unsafe fn image_name_from_handle(
    handle: windows::Win32::Foundation::HANDLE,
) -> Option<String> {
    let mut buf: Vec<u16> = vec![0; 1024];
    let mut size = buf.len() as u32;

    QueryFullProcessImageNameW(
        handle,
        PROCESS_NAME_WIN32,
        PWSTR(buf.as_mut_ptr()),
        &mut size,
    )
    .ok()?;

    if size == 0 {
        return None;
    }

    let path = String::from_utf16_lossy(&buf[..size as usize]);
    let file = path.rsplit(['\\', '/']).next().unwrap_or(&path);
    Some(strip_exe_suffix(file))
}

fn utf16_to_string(buf: &[u16]) -> String {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..len])
}

fn strip_exe_suffix(name: &str) -> String {
    if name.to_ascii_lowercase().ends_with(".exe") {
        name[..name.len() - 4].to_string()
    } else {
        name.to_string()
    }
}
