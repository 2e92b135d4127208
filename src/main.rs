// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! VolKnob - per-application volume knobs for taskbar right-clicks.

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("volknob=debug".parse().unwrap()))
        .init();

    info!("Starting VolKnob");
    run();
}

#[cfg(not(windows))]
fn run() {
    eprintln!("VolKnob drives the Windows taskbar and audio sessions; there is nothing to do on this platform.");
    std::process::exit(1);
}

#[cfg(windows)]
fn run() {
    use std::sync::mpsc;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;
    use tracing::{error, warn};
    use volknob::app::{App, AppEvent};
    use volknob::audio::SessionResolver;
    use volknob::config::{ConfigManager, FileSettings, SettingsStore, SharedSettings};
    use volknob::hotkey::HotkeyGate;
    use volknob::identify::ProcessIdentifier;
    use volknob::knobs::KnobManager;
    use volknob::mappings::MappingStore;
    use volknob::pipeline::ClickPipeline;
    use volknob::platform::windows::{
        open_in_default_editor, start_tray, WinAudioEndpoint, WinKnobPresenter, WinMouseHook,
        WinProcessOracle, WinPrompts, WinScreenMetrics, WinStartupManager, WinUiAutomation,
        WinWindowEnumerator,
    };
    use volknob::platform::{MouseHook, StartupManager, UserPrompts};

    let config_manager = ConfigManager::new().unwrap_or_else(|e| {
        warn!("Config directory unavailable ({}), using a temporary one", e);
        ConfigManager::with_dir(std::env::temp_dir().join("volknob"))
            .expect("temp config directory must be creatable")
    });
    let config_path = config_manager.config_path();
    let settings: SharedSettings = Arc::new(FileSettings::new(config_manager));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("tokio runtime");

    let shutdown = CancellationToken::new();
    let oracle = Arc::new(WinProcessOracle::new());
    let windows = Arc::new(WinWindowEnumerator::new());
    let screens = Arc::new(WinScreenMetrics::new());
    let prompts = Arc::new(WinPrompts::new(
        shutdown.clone(),
        windows.clone(),
        oracle.clone(),
    ));

    // Fatal startup condition 1: the audio endpoint enumerator.
    let endpoint = match WinAudioEndpoint::new() {
        Ok(endpoint) => Arc::new(endpoint),
        Err(e) => {
            error!("Audio endpoint unavailable: {}", e);
            prompts.show_error(
                "VolKnob cannot start",
                &format!("The audio device enumerator is unavailable:\n{}", e),
            );
            std::process::exit(1);
        }
    };

    let presenter = match WinKnobPresenter::start(shutdown.clone()) {
        Ok(presenter) => Arc::new(presenter),
        Err(e) => {
            error!("Knob UI thread failed to start: {}", e);
            prompts.show_error(
                "VolKnob cannot start",
                &format!("The knob UI could not be created:\n{}", e),
            );
            std::process::exit(1);
        }
    };

    // Apply the persisted launch-at-startup preference.
    let startup_manager = WinStartupManager::new();
    let wants_startup = settings.launch_at_startup();
    if wants_startup != startup_manager.is_enabled() {
        if let Err(e) = startup_manager.set_launch_at_startup(wants_startup) {
            warn!("Failed to update launch-at-startup registration: {}", e);
        }
    }

    let store = Arc::new(MappingStore::new(settings.clone()));
    let knobs = Arc::new(KnobManager::new(
        presenter,
        screens,
        oracle.clone(),
        settings.clone(),
        shutdown.clone(),
    ));
    knobs.start_reaper(runtime.handle());

    let pipeline = Arc::new(ClickPipeline::new(
        Arc::new(WinUiAutomation::new()),
        ProcessIdentifier::new(
            std::process::id(),
            oracle.clone(),
            windows,
            store.clone(),
        ),
        Arc::new(SessionResolver::new(endpoint, oracle)),
        knobs.clone(),
        store,
        prompts.clone(),
        runtime.handle().clone(),
        shutdown.clone(),
    ));

    let (event_tx, event_rx) = mpsc::channel::<AppEvent>();

    // Bridge the hook's click channel into the app event channel.
    let (click_tx, click_rx) = mpsc::channel();
    let bridge_tx = event_tx.clone();
    std::thread::spawn(move || {
        for click in click_rx.iter() {
            if bridge_tx.send(AppEvent::Click(click)).is_err() {
                break;
            }
        }
    });

    // Fatal startup condition 2: the global mouse hook.
    let mut hook = WinMouseHook::new();
    if let Err(e) = hook.install(click_tx) {
        error!("Mouse hook installation failed: {}", e);
        prompts.show_error(
            "VolKnob cannot start",
            &format!("The global mouse hook could not be installed:\n{}", e),
        );
        std::process::exit(1);
    }

    let tray = start_tray(event_tx);
    if tray.is_none() {
        warn!("Running without a tray icon");
    }

    let app = App::new(
        event_rx,
        HotkeyGate::new(settings),
        pipeline,
        knobs,
        shutdown,
        Box::new(move || open_in_default_editor(&config_path)),
    );
    app.run();

    hook.uninstall();
    if let Some(tray) = tray {
        tray.shutdown();
    }
    info!("VolKnob stopped");
}
