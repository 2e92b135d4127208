// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Launch-at-startup registration via the HKCU Run key.

use crate::platform::StartupManager;
use std::io;
use tracing::info;
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::ERROR_SUCCESS;
use windows::Win32::System::Registry::{
    RegCloseKey, RegCreateKeyExW, RegDeleteValueW, RegQueryValueExW, RegSetValueExW, HKEY,
    HKEY_CURRENT_USER, KEY_QUERY_VALUE, KEY_SET_VALUE, REG_OPTION_NON_VOLATILE, REG_SZ,
};

const RUN_KEY: PCWSTR = w!("Software\\Microsoft\\Windows\\CurrentVersion\\Run");
const VALUE_NAME: PCWSTR = w!("VolKnob");

pub struct WinStartupManager;

impl WinStartupManager {
    pub fn new() -> Self {
        Self
    }

    fn open_run_key(&self) -> io::Result<HKEY> {
        let mut key = HKEY::default();
        let status = unsafe {
            RegCreateKeyExW(
                HKEY_CURRENT_USER,
                RUN_KEY,
                None,
                PCWSTR::null(),
                REG_OPTION_NON_VOLATILE,
                KEY_SET_VALUE | KEY_QUERY_VALUE,
                None,
                &mut key,
                None,
            )
        };
        if status != ERROR_SUCCESS {
            return Err(io::Error::from_raw_os_error(status.0 as i32));
        }
        Ok(key)
    }
}

impl Default for WinStartupManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StartupManager for WinStartupManager {
    fn set_launch_at_startup(&self, enabled: bool) -> io::Result<()> {
        let key = self.open_run_key()?;

        let result = if enabled {
            let exe = std::env::current_exe()?;
            let command = format!("\"{}\"", exe.display());
            let wide: Vec<u16> = command.encode_utf16().chain(std::iter::once(0)).collect();
            let bytes = unsafe {
                std::slice::from_raw_parts(wide.as_ptr().cast::<u8>(), wide.len() * 2)
            };

            let status =
                unsafe { RegSetValueExW(key, VALUE_NAME, None, REG_SZ, Some(bytes)) };
            if status != ERROR_SUCCESS {
                Err(io::Error::from_raw_os_error(status.0 as i32))
            } else {
                info!("Registered for launch at startup");
                Ok(())
            }
        } else {
            // Removing a value that does not exist is fine.
            let _ = unsafe { RegDeleteValueW(key, VALUE_NAME) };
            info!("Unregistered from launch at startup");
            Ok(())
        };

        unsafe {
            let _ = RegCloseKey(key);
        }
        result
    }

    fn is_enabled(&self) -> bool {
        let Ok(key) = self.open_run_key() else {
            return false;
        };

        let status =
            unsafe { RegQueryValueExW(key, VALUE_NAME, None, None, None, None) };
        unsafe {
            let _ = RegCloseKey(key);
        }
        status == ERROR_SUCCESS
    }
}
