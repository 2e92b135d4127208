// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The click pipeline: from a qualifying right-click to a knob on screen.
//!
//! One click is processed at a time. Admission is a single-flight gate that
//! rejects (never queues) concurrent clicks; a newer admitted click cancels
//! the previous one's token. The admitted click walks the accessibility
//! tree, identifies the owning process, resolves its audio session and
//! either shows a knob, reports the missing session, or falls back to the
//! manual-mapping prompt.

use crate::audio::SessionResolver;
use crate::identify::{extract_app_name, ProcessIdentifier};
use crate::knobs::KnobManager;
use crate::mappings::MappingStore;
use crate::platform::{ClickEvent, Point, UiAutomation, UserPrompts};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

/// Placeholder used when the element's accessible name cannot be read.
const NAME_UNAVAILABLE: &str = "[name unavailable]";

const ERROR_TITLE: &str = "Error";
const NO_SESSION_TITLE: &str = "No audio session";

/// Orchestrates one click at a time through the resolution stages.
pub struct ClickPipeline {
    uia: Arc<dyn UiAutomation>,
    identifier: ProcessIdentifier,
    resolver: Arc<SessionResolver>,
    knobs: Arc<KnobManager>,
    store: Arc<MappingStore>,
    prompts: Arc<dyn UserPrompts>,
    runtime: tokio::runtime::Handle,
    processing: AtomicBool,
    current: Mutex<Option<CancellationToken>>,
    shutdown: CancellationToken,
}

impl ClickPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        uia: Arc<dyn UiAutomation>,
        identifier: ProcessIdentifier,
        resolver: Arc<SessionResolver>,
        knobs: Arc<KnobManager>,
        store: Arc<MappingStore>,
        prompts: Arc<dyn UserPrompts>,
        runtime: tokio::runtime::Handle,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            uia,
            identifier,
            resolver,
            knobs,
            store,
            prompts,
            runtime,
            processing: AtomicBool::new(false),
            current: Mutex::new(None),
            shutdown,
        }
    }

    /// Admit a qualifying click and process it on a blocking worker.
    ///
    /// Returns false when another click is already in flight; rejected
    /// clicks are dropped, not queued.
    pub fn submit(self: &Arc<Self>, click: ClickEvent) -> bool {
        if !self.try_admit() {
            trace!("Click rejected, another is being processed");
            return false;
        }

        let token = self.begin_click();
        // Clear visual state before resolving the new target.
        self.knobs.hide_all_knobs();

        let pipeline = Arc::clone(self);
        self.runtime.spawn_blocking(move || {
            let _gate = GateGuard(&pipeline.processing);

            let outcome =
                catch_unwind(AssertUnwindSafe(|| pipeline.process_click(click, &token)));
            if let Err(panic) = outcome {
                error!("Click pipeline panicked: {}", panic_message(&panic));
                if !token.is_cancelled() {
                    pipeline.prompts.show_error(
                        ERROR_TITLE,
                        &format!("An unexpected error occurred: {}", panic_message(&panic)),
                    );
                }
            }
        });

        true
    }

    /// Reserve the single-flight gate.
    fn try_admit(&self) -> bool {
        self.processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Cancel the previous click's token and install a fresh one.
    fn begin_click(&self) -> CancellationToken {
        let token = self.shutdown.child_token();
        if let Some(previous) = self.current.lock().replace(token.clone()) {
            previous.cancel();
        }
        token
    }

    /// Run the resolution stages for one admitted click.
    ///
    /// Cancellation is checked between stages; a cancelled click aborts
    /// silently, which is distinct from an error.
    pub fn process_click(&self, click: ClickEvent, token: &CancellationToken) {
        if token.is_cancelled() {
            return;
        }

        let point = Point::new(click.x, click.y);
        let Some(clicked) = self.uia.element_from_point(point) else {
            // Nothing under the cursor worth resolving; not an error.
            debug!("No UI element at ({}, {})", click.x, click.y);
            return;
        };

        if token.is_cancelled() {
            return;
        }
        let target = clicked.taskbar_ancestor().unwrap_or(clicked);

        let raw_name = target.name();
        let extracted = raw_name.as_deref().map(extract_app_name).unwrap_or_default();
        debug!(
            "Clicked element name {:?}, extracted app name {:?}",
            raw_name, extracted
        );

        if token.is_cancelled() {
            return;
        }
        match self.identifier.identify(target.as_ref(), &extracted, token) {
            Some(identification) => {
                if token.is_cancelled() {
                    return;
                }
                match self.resolver.session_for_process(identification.pid) {
                    Some(session) => {
                        // Final UI-affecting step: re-check before showing.
                        if token.is_cancelled() {
                            return;
                        }
                        debug!(
                            "Showing knob for {} (pid {}, via {})",
                            identification.app_name,
                            identification.pid,
                            identification.method.display_name()
                        );
                        self.knobs
                            .show_knob_for_session(click.x, click.y, session);
                    }
                    None => {
                        if token.is_cancelled() {
                            return;
                        }
                        self.prompts.show_info(
                            NO_SESSION_TITLE,
                            &format!(
                                "Found process '{}' (PID {}, via {} lookup), but it has no \
                                 active audio session.\n\nThe volume knob cannot be shown.",
                                identification.app_name,
                                identification.pid,
                                identification.method.display_name()
                            ),
                        );
                    }
                }
            }
            None => {
                if token.is_cancelled() {
                    return;
                }
                let name_to_map = if !extracted.is_empty() {
                    extracted
                } else {
                    raw_name
                        .as_deref()
                        .unwrap_or(NAME_UNAVAILABLE)
                        .trim()
                        .to_string()
                };
                self.store
                    .prompt_and_save(&name_to_map, token, self.prompts.as_ref());
            }
        }
    }
}

/// Releases the single-flight gate on every exit path, panics included.
struct GateGuard<'a>(&'a AtomicBool);

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown error".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SettingsStore;
    use crate::knobs::KnobManager;
    use crate::platform::testing::{
        FakeElement, FakeEndpoint, FakeOracle, FakePresenter, FakePrompts, FakeScreens,
        FakeSession, FakeUia, FakeWindows, MemorySettings,
    };
    use crate::platform::{ModifierState, Rect};

    struct Harness {
        pipeline: Arc<ClickPipeline>,
        prompts: FakePrompts,
        presenter: FakePresenter,
        knobs: Arc<KnobManager>,
        // Keeps the runtime handle held by the pipeline alive.
        _runtime: tokio::runtime::Runtime,
    }

    fn click_at(x: i32, y: i32) -> ClickEvent {
        ClickEvent {
            x,
            y,
            hwnd_pid: None,
            modifiers: ModifierState::default(),
        }
    }

    fn harness(
        uia: FakeUia,
        oracle: FakeOracle,
        windows: FakeWindows,
        endpoint: FakeEndpoint,
        mapping_lines: &[&str],
        confirm: bool,
    ) -> Harness {
        let settings = Arc::new(MemorySettings::default());
        settings.set_manual_mappings(mapping_lines.iter().map(|s| s.to_string()).collect());

        let oracle = Arc::new(oracle);
        let store = Arc::new(MappingStore::new(settings.clone()));
        let prompts = FakePrompts::new(confirm, Some("picked".to_string()));
        let presenter = FakePresenter::default();
        let shutdown = CancellationToken::new();

        let knobs = Arc::new(KnobManager::new(
            Arc::new(presenter.clone()),
            Arc::new(FakeScreens::new(Rect {
                x: 0,
                y: 0,
                width: 1920,
                height: 1040,
            })),
            oracle.clone(),
            settings.clone(),
            shutdown.clone(),
        ));

        let identifier = ProcessIdentifier::new(
            999,
            oracle.clone(),
            Arc::new(windows),
            store.clone(),
        );
        let resolver = Arc::new(SessionResolver::new(Arc::new(endpoint), oracle));

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();

        let pipeline = Arc::new(ClickPipeline::new(
            Arc::new(uia),
            identifier,
            resolver,
            knobs.clone(),
            store,
            Arc::new(prompts.clone()),
            runtime.handle().clone(),
            shutdown,
        ));

        Harness {
            pipeline,
            prompts,
            presenter,
            knobs,
            _runtime: runtime,
        }
    }

    #[test]
    fn test_no_element_is_silent() {
        let h = harness(
            FakeUia::empty(),
            FakeOracle::default(),
            FakeWindows::default(),
            FakeEndpoint::new(vec![]),
            &[],
            true,
        );

        h.pipeline
            .process_click(click_at(10, 10), &CancellationToken::new());

        assert_eq!(h.prompts.infos(), 0);
        assert_eq!(h.prompts.errors(), 0);
        assert_eq!(h.prompts.confirms(), 0);
        assert_eq!(h.knobs.active_count(), 0);
    }

    #[test]
    fn test_failed_identification_prompts_with_extracted_name() {
        // "Spotify Premium - 2 running windows", no mapping, no matching
        // window title, no process named Spotify.
        let element = FakeElement::new().with_name("Spotify Premium - 2 running windows");
        let h = harness(
            FakeUia::with_element(element),
            FakeOracle::default(),
            FakeWindows::default(),
            FakeEndpoint::new(vec![]),
            &[],
            false,
        );

        h.pipeline
            .process_click(click_at(100, 200), &CancellationToken::new());

        assert_eq!(h.prompts.confirms(), 1);
        assert_eq!(
            h.prompts.last_confirm_name().as_deref(),
            Some("Spotify Premium")
        );
        assert_eq!(h.knobs.active_count(), 0);
    }

    #[test]
    fn test_manual_mapping_resolves_and_shows_knob() {
        // Same click, but a mapping exists and the mapped process has an
        // active audio session.
        let element = FakeElement::new().with_name("Spotify Premium - 2 running windows");
        let h = harness(
            FakeUia::with_element(element),
            FakeOracle::default().with_process(40, "Spotify"),
            FakeWindows::default(),
            FakeEndpoint::new(vec![FakeSession::new(40)]),
            &["Spotify Premium|Spotify"],
            false,
        );

        h.pipeline
            .process_click(click_at(100, 200), &CancellationToken::new());

        assert_eq!(h.knobs.active_count(), 1);
        assert_eq!(h.presenter.last_session_pid(), Some(40));
        assert_eq!(h.prompts.confirms(), 0);
    }

    #[test]
    fn test_taskbar_ancestor_preferred_over_hit_element() {
        let ancestor = FakeElement::new()
            .with_name("Notepad")
            .with_attached_pid(21);
        let element = FakeElement::new()
            .with_name("wrong")
            .with_ancestor(ancestor);
        let h = harness(
            FakeUia::with_element(element),
            FakeOracle::default().with_process(21, "notepad"),
            FakeWindows::default(),
            FakeEndpoint::new(vec![FakeSession::new(21)]),
            &[],
            false,
        );

        h.pipeline
            .process_click(click_at(100, 200), &CancellationToken::new());

        assert_eq!(h.presenter.last_session_pid(), Some(21));
    }

    #[test]
    fn test_identified_without_session_reports_info() {
        let element = FakeElement::new()
            .with_name("Notepad")
            .with_attached_pid(21);
        let h = harness(
            FakeUia::with_element(element),
            FakeOracle::default().with_process(21, "notepad"),
            FakeWindows::default(),
            FakeEndpoint::new(vec![]),
            &[],
            true,
        );

        h.pipeline
            .process_click(click_at(100, 200), &CancellationToken::new());

        assert_eq!(h.prompts.infos(), 1);
        assert_eq!(h.prompts.confirms(), 0);
        assert_eq!(h.knobs.active_count(), 0);
        let message = h.prompts.last_info().unwrap();
        assert!(message.contains("notepad"));
        assert!(message.contains("21"));
        assert!(message.contains("direct"));
    }

    #[test]
    fn test_cancelled_click_aborts_silently() {
        let element = FakeElement::new()
            .with_name("Notepad")
            .with_attached_pid(21);
        let h = harness(
            FakeUia::with_element(element),
            FakeOracle::default().with_process(21, "notepad"),
            FakeWindows::default(),
            FakeEndpoint::new(vec![FakeSession::new(21)]),
            &[],
            true,
        );

        let token = CancellationToken::new();
        token.cancel();
        h.pipeline.process_click(click_at(100, 200), &token);

        assert_eq!(h.prompts.infos(), 0);
        assert_eq!(h.prompts.confirms(), 0);
        assert_eq!(h.knobs.active_count(), 0);
    }

    #[test]
    fn test_single_flight_gate_rejects_second_admission() {
        let h = harness(
            FakeUia::empty(),
            FakeOracle::default(),
            FakeWindows::default(),
            FakeEndpoint::new(vec![]),
            &[],
            true,
        );

        assert!(h.pipeline.try_admit());
        assert!(!h.pipeline.try_admit());

        // Released gate admits again.
        h.pipeline.processing.store(false, Ordering::Release);
        assert!(h.pipeline.try_admit());
    }

    #[test]
    fn test_newer_click_cancels_previous_token() {
        let h = harness(
            FakeUia::empty(),
            FakeOracle::default(),
            FakeWindows::default(),
            FakeEndpoint::new(vec![]),
            &[],
            true,
        );

        let first = h.pipeline.begin_click();
        assert!(!first.is_cancelled());
        let second = h.pipeline.begin_click();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
    }

    #[test]
    fn test_submit_processes_and_releases_gate() {
        let element = FakeElement::new().with_name("Notepad").with_attached_pid(21);
        let h = harness(
            FakeUia::with_element(element),
            FakeOracle::default().with_process(21, "notepad"),
            FakeWindows::default(),
            FakeEndpoint::new(vec![FakeSession::new(21)]),
            &[],
            true,
        );

        assert!(h.pipeline.submit(click_at(100, 200)));

        // The blocking task releases the gate when done.
        for _ in 0..100 {
            if !h.pipeline.processing.load(Ordering::Acquire) {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(!h.pipeline.processing.load(Ordering::Acquire));
        assert_eq!(h.knobs.active_count(), 1);
    }
}
