use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use voxhold::audio::AudioCapture;
use voxhold::downloader::ModelStore;
use voxhold::hotkeys;
use voxhold::injector::TextInjector;
use voxhold::models::ModelState;
use voxhold::notifier::{DesktopNotifier, Notify};
use voxhold::orchestrator::DictationOrchestrator;
use voxhold::settings::Settings;
use voxhold::utils;
use voxhold::whisper::WhisperManager;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::load();
    info!(
        hotkey = %settings.hotkey.display_string(),
        model = %settings.model,
        "voxhold starting"
    );

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;

    let models_dir = utils::get_models_dir().context("Failed to resolve model cache directory")?;
    let store = ModelStore::with_http(models_dir);
    spawn_model_state_logger(&runtime, &store);

    // Fetch (if needed) and load the selected model up front. Neither
    // step is fatal: without a model the hotkey still records, the
    // transcription step just reports its error.
    let whisper = Arc::new(Mutex::new(WhisperManager::new()));
    match runtime.block_on(store.ensure(settings.model)) {
        Ok(path) => {
            // whisper.cpp wants a deep stack while loading the model.
            let manager = whisper.clone();
            let load_result = std::thread::Builder::new()
                .stack_size(8 * 1024 * 1024)
                .spawn(move || manager.lock().unwrap().load(&path))
                .context("Failed to spawn model load thread")?
                .join()
                .map_err(|_| anyhow::anyhow!("Model load thread panicked"))?;
            match load_result {
                Ok(()) => info!("transcription engine ready"),
                Err(e) => error!("failed to load model: {e}, transcription will be disabled"),
            }
        }
        Err(e) => error!("model download failed: {e}, transcription will be disabled"),
    }

    let notifier: Arc<dyn Notify> = Arc::new(DesktopNotifier);
    let recorder = AudioCapture::new(settings.input_device.clone());
    let injector = TextInjector::new(notifier.clone(), settings.auto_paste);
    let mut orchestrator = DictationOrchestrator::new(
        recorder,
        whisper,
        injector,
        notifier,
        settings.language,
    );

    let binding = Arc::new(Mutex::new(settings.hotkey));
    let (transition_tx, transition_rx) = crossbeam_channel::unbounded();
    let listener_binding = binding.clone();
    std::thread::spawn(move || hotkeys::start_hotkey_listener(listener_binding, transition_tx));
    info!(hotkey = %settings.hotkey.display_string(), "global hotkey listener started");

    orchestrator.run(transition_rx);
    Ok(())
}

/// Mirror model state transitions into the log, which is the headless
/// stand-in for a download progress bar.
fn spawn_model_state_logger(runtime: &tokio::runtime::Runtime, store: &ModelStore) {
    let mut state_rx = store.subscribe();
    runtime.spawn(async move {
        let mut last_decile = -1i32;
        while state_rx.changed().await.is_ok() {
            let state = state_rx.borrow_and_update().clone();
            match state {
                ModelState::NotDownloaded => {}
                ModelState::Downloading(fraction) => {
                    let decile = (fraction * 10.0) as i32;
                    if decile > last_decile {
                        last_decile = decile;
                        info!(percent = decile * 10, "downloading model");
                    }
                }
                ModelState::Ready => {
                    last_decile = -1;
                    info!("model ready");
                }
                ModelState::Error(message) => {
                    last_decile = -1;
                    error!("model state error: {message}");
                }
            }
        }
    });
}
