// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Application event loop.
//!
//! The global mouse hook and the tray icon run on their own OS threads and
//! feed one `std::sync::mpsc` channel; the loop here filters clicks through
//! the hotkey gate and hands qualifying ones to the pipeline. Explicit
//! message passing instead of callback subscriptions keeps the hook wiring
//! free of double-subscribe/missed-unsubscribe lifecycles.

use crate::hotkey::HotkeyGate;
use crate::knobs::KnobManager;
use crate::pipeline::ClickPipeline;
use crate::platform::ClickEvent;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Messages from the tray icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayMessage {
    /// Open the settings file.
    OpenSettings,
    /// Quit the application.
    Quit,
}

/// Everything the event loop can receive.
#[derive(Debug, Clone, Copy)]
pub enum AppEvent {
    Click(ClickEvent),
    Tray(TrayMessage),
}

/// Owns the event loop and the shutdown sequence.
pub struct App {
    events: Receiver<AppEvent>,
    gate: HotkeyGate,
    pipeline: Arc<ClickPipeline>,
    knobs: Arc<KnobManager>,
    shutdown: CancellationToken,
    open_settings: Box<dyn Fn() + Send>,
}

impl App {
    pub fn new(
        events: Receiver<AppEvent>,
        gate: HotkeyGate,
        pipeline: Arc<ClickPipeline>,
        knobs: Arc<KnobManager>,
        shutdown: CancellationToken,
        open_settings: Box<dyn Fn() + Send>,
    ) -> Self {
        Self {
            events,
            gate,
            pipeline,
            knobs,
            shutdown,
            open_settings,
        }
    }

    /// Process events until Quit arrives or every sender is gone.
    ///
    /// Must run inside a tokio runtime context; the pipeline dispatches its
    /// work onto blocking workers.
    pub fn run(self) {
        info!("Event loop started");

        for event in self.events.iter() {
            match event {
                AppEvent::Click(click) => {
                    if !self.gate.qualifies(click.modifiers) {
                        continue;
                    }
                    debug!("Qualifying click at ({}, {})", click.x, click.y);
                    self.pipeline.submit(click);
                }
                AppEvent::Tray(TrayMessage::OpenSettings) => {
                    (self.open_settings)();
                }
                AppEvent::Tray(TrayMessage::Quit) => {
                    info!("Quit requested from tray");
                    break;
                }
            }
        }

        self.stop();
    }

    fn stop(&self) {
        info!("Shutting down");
        // Cancel first: in-flight clicks stop marshaling to the UI, the
        // reaper exits, and prompts refuse to open.
        self.shutdown.cancel();
        self.knobs.dispose();
    }
}
