// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Lifecycle of the transient on-screen volume knobs.
//!
//! At most one knob is visible at a time: showing a new one hides all
//! others first. Knobs are keyed by the owning process id, and a periodic
//! reaper hides knobs whose process has exited.

use crate::audio::AppAudioSession;
use crate::config::SharedSettings;
use crate::platform::{
    KnobHandle, KnobPresenter, Pid, Point, ProcessOracle, ProcessProbe, Rect, ScreenMetrics,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Horizontal offset from the click point.
const OFFSET_X: i32 = 140;
/// Vertical offset from the click point; the knob opens above the taskbar.
const OFFSET_Y: i32 = -305;
/// Offset used instead when the click is too close to the top of the screen
/// for the upward placement to fit.
const OFFSET_Y_NEAR_TOP: i32 = 50;
/// Distance from the working-area top under which the reduced offset kicks in.
const SCREEN_TOP_THRESHOLD: i32 = 350;

/// How often the reaper checks knob processes for liveness.
const REAP_INTERVAL: Duration = Duration::from_secs(60);
/// Back-off applied after a reaper iteration fails.
const REAP_RETRY_INTERVAL: Duration = Duration::from_secs(120);

/// Owns every live knob window and the reaper that cleans up after
/// exited processes.
pub struct KnobManager {
    presenter: Arc<dyn KnobPresenter>,
    screens: Arc<dyn ScreenMetrics>,
    oracle: Arc<dyn ProcessOracle>,
    settings: SharedSettings,
    registry: Mutex<HashMap<Pid, Box<dyn KnobHandle>>>,
    shutdown: CancellationToken,
}

impl KnobManager {
    pub fn new(
        presenter: Arc<dyn KnobPresenter>,
        screens: Arc<dyn ScreenMetrics>,
        oracle: Arc<dyn ProcessOracle>,
        settings: SharedSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            presenter,
            screens,
            oracle,
            settings,
            registry: Mutex::new(HashMap::new()),
            shutdown,
        }
    }

    /// Show a knob for `session` near the click point.
    ///
    /// Hides every other knob first, places the knob offset from the click
    /// with edge avoidance, and registers it under the session's pid.
    pub fn show_knob_for_session(&self, x: i32, y: i32, session: AppAudioSession) {
        if self.shutdown.is_cancelled() {
            return;
        }

        self.hide_all_knobs();

        let click = Point::new(x, y);
        let area = self.screens.working_area_at(click);
        let position = knob_position(click, area);
        let pid = session.pid();

        let show_peak = self.settings.show_peak_meter();
        match self.presenter.present(position, session, show_peak) {
            Ok(mut knob) => {
                // The requested position was only clamped against top/left;
                // once the rendered size is known, pull the knob back inside
                // the bottom/right edges too.
                if let Some(size) = knob.size() {
                    if let Some(adjusted) = reclamp_position(position, size, area) {
                        knob.move_to(adjusted);
                    }
                }
                debug!("Knob shown for pid {} at {:?}", pid, position);
                self.registry.lock().insert(pid, knob);
            }
            Err(e) => {
                warn!("Failed to present knob for pid {}: {}", pid, e);
            }
        }
    }

    /// Hide every registered knob.
    ///
    /// Entries leave the registry whether or not hiding succeeds; dropping
    /// the handle closes the underlying window.
    pub fn hide_all_knobs(&self) {
        let knobs: Vec<(Pid, Box<dyn KnobHandle>)> = self.registry.lock().drain().collect();
        for (pid, mut knob) in knobs {
            if knob.is_visible() {
                knob.hide();
            }
            debug!("Knob for pid {} hidden", pid);
        }
    }

    /// Number of registered knobs (visible or not).
    pub fn active_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Start the background reaper. Runs until the shutdown token fires.
    pub fn start_reaper(self: &Arc<Self>, runtime: &tokio::runtime::Handle) {
        let manager = Arc::clone(self);
        let token = self.shutdown.clone();
        runtime.spawn(async move {
            let mut delay = REAP_INTERVAL;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }

                // A failing iteration delays the next one instead of
                // terminating the reaper.
                let result = catch_unwind(AssertUnwindSafe(|| manager.reap_dead_knobs()));
                delay = match result {
                    Ok(reaped) => {
                        if reaped > 0 {
                            info!("Reaped {} knob(s) with exited processes", reaped);
                        }
                        REAP_INTERVAL
                    }
                    Err(_) => {
                        warn!("Knob reaper iteration failed, backing off");
                        REAP_RETRY_INTERVAL
                    }
                };
            }
        });
    }

    /// Hide and deregister knobs whose process has exited.
    ///
    /// An access-denied probe counts as alive: a permission-restricted
    /// process is still running, and hiding its knob would be wrong.
    pub fn reap_dead_knobs(&self) -> usize {
        let pids: Vec<Pid> = self.registry.lock().keys().copied().collect();
        let mut reaped = 0;

        for pid in pids {
            match self.oracle.probe(pid) {
                ProcessProbe::Exited => {
                    if let Some(mut knob) = self.registry.lock().remove(&pid) {
                        if knob.is_visible() {
                            knob.hide();
                        }
                        reaped += 1;
                    }
                }
                ProcessProbe::Running { .. } | ProcessProbe::AccessDenied => {}
            }
        }

        reaped
    }

    /// Force-hide everything and clear state. Called on app shutdown after
    /// the shutdown token (which stops the reaper) has been cancelled.
    pub fn dispose(&self) {
        self.hide_all_knobs();
        self.registry.lock().clear();
    }
}

/// Initial knob position: offset from the click, clamped to the working
/// area's top/left. Near the top of the screen the upward offset would
/// clip, so a small downward offset is used instead.
pub fn knob_position(click: Point, area: Rect) -> Point {
    let y_offset = if click.y - area.y < SCREEN_TOP_THRESHOLD {
        OFFSET_Y_NEAR_TOP
    } else {
        OFFSET_Y
    };

    Point::new(
        (click.x + OFFSET_X).max(area.x),
        (click.y + y_offset).max(area.y),
    )
}

/// Pull an already-placed knob back inside the bottom/right edges once its
/// rendered size is known. Returns `None` when no adjustment is needed.
pub fn reclamp_position(position: Point, size: (i32, i32), area: Rect) -> Option<Point> {
    let (width, height) = size;
    if width <= 0 || height <= 0 {
        return None;
    }

    let mut adjusted = position;
    if adjusted.x + width > area.right() {
        adjusted.x = area.right() - width;
    }
    if adjusted.y + height > area.bottom() {
        adjusted.y = area.bottom() - height;
    }

    (adjusted != position).then_some(adjusted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::testing::{
        session_for_pid, FakeOracle, FakePresenter, FakeScreens, MemorySettings,
    };

    fn manager(presenter: FakePresenter, oracle: FakeOracle) -> Arc<KnobManager> {
        Arc::new(KnobManager::new(
            Arc::new(presenter),
            Arc::new(FakeScreens::new(Rect {
                x: 0,
                y: 0,
                width: 1920,
                height: 1040,
            })),
            Arc::new(oracle),
            Arc::new(MemorySettings::default()),
            CancellationToken::new(),
        ))
    }

    #[test]
    fn test_knob_position_uses_upward_offset_away_from_top() {
        let area = Rect {
            x: 0,
            y: 0,
            width: 1920,
            height: 1040,
        };
        let pos = knob_position(Point::new(500, 1000), area);
        assert_eq!(pos, Point::new(640, 695));
    }

    #[test]
    fn test_knob_position_flips_offset_near_top() {
        let area = Rect {
            x: 0,
            y: 0,
            width: 1920,
            height: 1040,
        };
        let pos = knob_position(Point::new(500, 100), area);
        assert_eq!(pos, Point::new(640, 150));
    }

    #[test]
    fn test_knob_position_clamps_to_top_left() {
        let area = Rect {
            x: 0,
            y: 0,
            width: 1920,
            height: 1040,
        };
        // Mid-screen click: upward offset would land above the working area.
        let pos = knob_position(Point::new(-200, 400), area);
        assert_eq!(pos, Point::new(0, 95));
    }

    #[test]
    fn test_knob_position_respects_monitor_origin() {
        // Secondary monitor to the left of the primary.
        let area = Rect {
            x: -1920,
            y: 0,
            width: 1920,
            height: 1040,
        };
        let pos = knob_position(Point::new(-1900, 1000), area);
        assert_eq!(pos, Point::new(-1760, 695));
    }

    #[test]
    fn test_reclamp_pulls_inside_bottom_right() {
        let area = Rect {
            x: 0,
            y: 0,
            width: 1920,
            height: 1040,
        };
        let adjusted =
            reclamp_position(Point::new(1900, 1000), (200, 300), area).unwrap();
        assert_eq!(adjusted, Point::new(1720, 740));
    }

    #[test]
    fn test_reclamp_no_change_when_inside() {
        let area = Rect {
            x: 0,
            y: 0,
            width: 1920,
            height: 1040,
        };
        assert!(reclamp_position(Point::new(100, 100), (200, 300), area).is_none());
        assert!(reclamp_position(Point::new(100, 100), (0, 0), area).is_none());
    }

    #[test]
    fn test_show_hides_previous_knobs() {
        let presenter = FakePresenter::default();
        let m = manager(presenter.clone(), FakeOracle::default());

        m.show_knob_for_session(100, 900, session_for_pid(1));
        m.show_knob_for_session(200, 900, session_for_pid(2));

        assert_eq!(m.active_count(), 1);
        assert_eq!(presenter.presented(), 2);
    }

    #[test]
    fn test_hide_all_empties_registry() {
        let presenter = FakePresenter::default();
        let m = manager(presenter, FakeOracle::default());

        m.show_knob_for_session(100, 900, session_for_pid(1));
        assert_eq!(m.active_count(), 1);

        m.hide_all_knobs();
        assert_eq!(m.active_count(), 0);
    }

    #[test]
    fn test_present_failure_leaves_registry_empty() {
        let presenter = FakePresenter::default().fail_next();
        let m = manager(presenter, FakeOracle::default());

        m.show_knob_for_session(100, 900, session_for_pid(1));
        assert_eq!(m.active_count(), 0);
    }

    #[test]
    fn test_reap_removes_only_dead_processes() {
        let presenter = FakePresenter::default();
        let oracle = FakeOracle::default()
            .with_process(1, "alive")
            .with_access_denied(2);
        let m = manager(presenter, oracle);

        m.show_knob_for_session(100, 900, session_for_pid(1));
        // Dead process knob, registered directly to bypass hide-all.
        {
            let dead = session_for_pid(3);
            let area = Rect {
                x: 0,
                y: 0,
                width: 1920,
                height: 1040,
            };
            let pos = knob_position(Point::new(100, 900), area);
            let knob = m.presenter.present(pos, dead, false).unwrap();
            m.registry.lock().insert(3, knob);
        }
        {
            let denied = session_for_pid(2);
            let pos = Point::new(0, 0);
            let knob = m.presenter.present(pos, denied, false).unwrap();
            m.registry.lock().insert(2, knob);
        }
        assert_eq!(m.active_count(), 3);

        let reaped = m.reap_dead_knobs();
        assert_eq!(reaped, 1);
        assert_eq!(m.active_count(), 2);
        assert!(m.registry.lock().contains_key(&1));
        assert!(m.registry.lock().contains_key(&2));
    }

    #[test]
    fn test_show_after_shutdown_is_a_no_op() {
        let presenter = FakePresenter::default();
        let token = CancellationToken::new();
        let m = Arc::new(KnobManager::new(
            Arc::new(presenter.clone()),
            Arc::new(FakeScreens::new(Rect {
                x: 0,
                y: 0,
                width: 1920,
                height: 1040,
            })),
            Arc::new(FakeOracle::default()),
            Arc::new(MemorySettings::default()),
            token.clone(),
        ));

        token.cancel();
        m.show_knob_for_session(100, 900, session_for_pid(1));
        assert_eq!(m.active_count(), 0);
        assert_eq!(presenter.presented(), 0);
    }
}
