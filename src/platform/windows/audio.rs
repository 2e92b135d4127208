// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! WASAPI session enumeration on the default render endpoint.

use crate::platform::{AudioEndpoint, AudioError, Pid, SessionControl};
use windows::core::Interface;
use windows::Win32::Media::Audio::{
    eMultimedia, eRender, AudioSessionStateExpired, IAudioSessionControl2,
    IAudioSessionManager2, IMMDeviceEnumerator, ISimpleAudioVolume, MMDeviceEnumerator,
};
use windows::Win32::Media::Audio::Endpoints::IAudioMeterInformation;
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoTaskMemFree, CLSCTX_ALL, COINIT_MULTITHREADED,
};

fn ensure_com() {
    // Benign error when the thread's apartment is already initialized.
    unsafe {
        let _ = CoInitializeEx(None, COINIT_MULTITHREADED);
    }
}

pub struct WinAudioEndpoint;

impl WinAudioEndpoint {
    /// Validate that the device enumerator is available. Failure here is
    /// one of the two fatal startup conditions.
    pub fn new() -> Result<Self, AudioError> {
        ensure_com();
        unsafe {
            let _enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                    .map_err(|e| AudioError::Endpoint(e.to_string()))?;
        }
        Ok(Self)
    }
}

impl AudioEndpoint for WinAudioEndpoint {
    fn sessions(&self) -> Result<Vec<Box<dyn SessionControl>>, AudioError> {
        ensure_com();
        unsafe {
            // Re-acquire the default device every call; the user may have
            // switched outputs since the last click.
            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                    .map_err(|e| AudioError::Endpoint(e.to_string()))?;
            let device = enumerator
                .GetDefaultAudioEndpoint(eRender, eMultimedia)
                .map_err(|_| AudioError::NoDefaultDevice)?;
            let manager: IAudioSessionManager2 = device
                .Activate(CLSCTX_ALL, None)
                .map_err(|e| AudioError::Endpoint(e.to_string()))?;
            let list = manager
                .GetSessionEnumerator()
                .map_err(|e| AudioError::Endpoint(e.to_string()))?;
            let count = list
                .GetCount()
                .map_err(|e| AudioError::Endpoint(e.to_string()))?;

            let mut sessions: Vec<Box<dyn SessionControl>> = Vec::new();
            for i in 0..count {
                // A single broken session must not fail the whole scan.
                let Ok(control) = list.GetSession(i) else {
                    continue;
                };
                let Ok(control2) = control.cast::<IAudioSessionControl2>() else {
                    continue;
                };
                let Ok(volume) = control.cast::<ISimpleAudioVolume>() else {
                    continue;
                };
                let Ok(meter) = control.cast::<IAudioMeterInformation>() else {
                    continue;
                };

                let pid = control2.GetProcessId().unwrap_or(0);
                sessions.push(Box::new(WinSessionControl {
                    control: control2,
                    volume,
                    meter,
                    pid,
                }));
            }

            Ok(sessions)
        }
    }
}

struct WinSessionControl {
    control: IAudioSessionControl2,
    volume: ISimpleAudioVolume,
    meter: IAudioMeterInformation,
    pid: Pid,
}

impl SessionControl for WinSessionControl {
    fn pid(&self) -> Pid {
        self.pid
    }

    fn reported_name(&self) -> Option<String> {
        unsafe {
            let pwstr = self.control.GetDisplayName().ok()?;
            let name = pwstr.to_string().ok();
            CoTaskMemFree(Some(pwstr.as_ptr().cast()));

            // Indirect resource strings ("@C:\\...,-123") are useless as
            // display names; let the resolver fall back to the process name.
            name.filter(|n| !n.is_empty() && !n.starts_with('@'))
        }
    }

    fn is_expired(&self) -> bool {
        unsafe {
            self.control
                .GetState()
                .map(|state| state == AudioSessionStateExpired)
                .unwrap_or(true)
        }
    }

    fn volume(&self) -> Result<f32, AudioError> {
        unsafe {
            self.volume
                .GetMasterVolume()
                .map_err(|e| AudioError::Session(e.to_string()))
        }
    }

    fn set_volume(&self, volume: f32) -> Result<(), AudioError> {
        unsafe {
            self.volume
                .SetMasterVolume(volume, std::ptr::null())
                .map_err(|e| AudioError::Session(e.to_string()))
        }
    }

    fn muted(&self) -> Result<bool, AudioError> {
        unsafe {
            self.volume
                .GetMute()
                .map(|m| m.as_bool())
                .map_err(|e| AudioError::Session(e.to_string()))
        }
    }

    fn set_muted(&self, muted: bool) -> Result<(), AudioError> {
        unsafe {
            self.volume
                .SetMute(muted, std::ptr::null())
                .map_err(|e| AudioError::Session(e.to_string()))
        }
    }

    fn peak(&self) -> Result<f32, AudioError> {
        unsafe {
            self.meter
                .GetPeakValue()
                .map_err(|e| AudioError::Session(e.to_string()))
        }
    }
}
