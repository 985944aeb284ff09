//! Application entry point — budgetvoice.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Build the HTTP advice and spreadsheet clients from config.
//! 5. Probe the recognition engine (model file + audio input); fall back to
//!    an unavailable stand-in so the app still launches without a model.
//! 6. Create controller channels (`command`, `update`, `notify`, `event`).
//! 7. Spawn the capture controller on the tokio runtime.
//! 8. Run [`eframe::run_native`] — blocks the main thread until the window
//!    is closed.

use std::sync::Arc;

use tokio::sync::mpsc;

use budgetvoice::{
    app::BudgetVoiceApp,
    budget::VoiceCaptureController,
    config::{AppConfig, AppPaths},
    notify::{ChannelSink, NotificationSink},
    services::{AdviceService, HttpAdviceService, HttpSpreadsheetService, SpreadsheetService},
    speech::{CaptureSource, RecognitionSession, UnavailableSource, WhisperTranscriber},
};

use eframe::egui;

// ---------------------------------------------------------------------------
// Native options builder
// ---------------------------------------------------------------------------

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let mut vp = egui::ViewportBuilder::default()
        .with_inner_size([760.0, 680.0])
        .with_min_inner_size([540.0, 420.0]);

    if let Some((x, y)) = config.ui.window_position {
        vp = vp.with_position(egui::pos2(x, y));
    }

    eframe::NativeOptions {
        viewport: vp,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> eframe::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("budgetvoice starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    let paths = AppPaths::new();

    // 3. Tokio runtime (2 worker threads — HTTP + decode each take one)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    // 4. HTTP services
    let advice: Arc<dyn AdviceService> = Arc::new(HttpAdviceService::from_config(&config.service));
    let spreadsheet: Arc<dyn SpreadsheetService> =
        Arc::new(HttpSpreadsheetService::from_config(&config.service));

    // 5. Recognition engine (may fail if the model is absent — degrade
    //    gracefully; the controller notifies the user once).
    let model_path = paths
        .models_dir
        .join(format!("ggml-{}.bin", config.speech.model));

    let source: Box<dyn CaptureSource> =
        match WhisperTranscriber::load(&model_path, &config.speech.language) {
            Ok(transcriber) => {
                log::info!("recognition model loaded: {}", model_path.display());
                Box::new(RecognitionSession::new(
                    config.speech.clone(),
                    config.audio.clone(),
                    Arc::new(transcriber),
                ))
            }
            Err(e) => {
                log::warn!("recognition unavailable: {e}");
                Box::new(UnavailableSource::new(e.to_string()))
            }
        };

    // 6. Channel setup
    let (command_tx, command_rx) = mpsc::channel(16);
    let (update_tx, update_rx) = mpsc::channel(32);
    let (notify_tx, notify_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::channel(64);

    let notifier: Arc<dyn NotificationSink> = Arc::new(ChannelSink::new(notify_tx));

    // 7. Spawn the capture controller onto the tokio runtime
    let controller = VoiceCaptureController::new(
        &config,
        paths.downloads_dir.clone(),
        source,
        advice,
        spreadsheet,
        notifier,
        update_tx,
        event_tx,
    );
    rt.spawn(controller.run(command_rx, event_rx));

    // 8. Build the egui app and run it (blocks until the window is closed)
    let app = BudgetVoiceApp::new(&config, command_tx, update_rx, notify_rx);
    let options = native_options(&config);

    eframe::run_native(
        "BudgetVoice",
        options,
        Box::new(move |_cc| Ok(Box::new(app))),
    )
}
