use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crossbeam_channel::Receiver;
use tracing::{debug, error, info, warn};

use crate::audio::{AudioAsset, AudioCapture};
use crate::downloader::ModelStore;
use crate::error::{CaptureError, SwitchError, TranscribeError};
use crate::injector::{InjectionOutcome, TextInjector};
use crate::models::ModelVariant;
use crate::notifier::Notify;
use crate::types::{DictationState, Language, TranscriptionItem, Transition};
use crate::whisper::WhisperManager;

/// The history shown to the user only ever keeps the last few entries.
pub const HISTORY_LIMIT: usize = 5;

/// Capture seam. `stop` hands back the finalized asset.
pub trait Recorder {
    fn start(&mut self) -> Result<(), CaptureError>;
    fn stop(&mut self) -> Result<AudioAsset, CaptureError>;
}

impl Recorder for AudioCapture {
    fn start(&mut self) -> Result<(), CaptureError> {
        AudioCapture::start(self)
    }

    fn stop(&mut self) -> Result<AudioAsset, CaptureError> {
        AudioCapture::stop(self)
    }
}

/// Transcription seam.
pub trait Transcriber {
    fn transcribe(&self, asset: &Path, language: Language) -> Result<String, TranscribeError>;
}

// The shared manager is the production transcriber; the mutex both
// shares it and serializes calls against the one loaded context.
impl Transcriber for Arc<Mutex<WhisperManager>> {
    fn transcribe(&self, asset: &Path, language: Language) -> Result<String, TranscribeError> {
        self.lock().unwrap().transcribe_file(asset, language)
    }
}

/// Delivery seam.
pub trait Injector {
    fn save_focus_target(&mut self);
    fn deliver(&mut self, text: &str) -> InjectionOutcome;
}

impl Injector for TextInjector {
    fn save_focus_target(&mut self) {
        TextInjector::save_focus_target(self)
    }

    fn deliver(&mut self, text: &str) -> InjectionOutcome {
        TextInjector::deliver(self, text)
    }
}

/// Coordinates one dictation cycle at a time.
///
/// Press starts capture (after saving the focus target), release stops
/// it, transcribes, and delivers. Every failure path reports the error
/// and returns to `Idle`; nothing is fatal. Re-entrant presses while a
/// cycle is running are ignored, so a stuck hotkey or a racing
/// double-trigger cannot start a second session.
pub struct DictationOrchestrator<R, T, I> {
    state: DictationState,
    recorder: R,
    transcriber: T,
    injector: I,
    notifier: Arc<dyn Notify>,
    language: Language,
    history: VecDeque<TranscriptionItem>,
}

impl<R, T, I> DictationOrchestrator<R, T, I>
where
    R: Recorder,
    T: Transcriber,
    I: Injector,
{
    pub fn new(
        recorder: R,
        transcriber: T,
        injector: I,
        notifier: Arc<dyn Notify>,
        language: Language,
    ) -> Self {
        Self {
            state: DictationState::Idle,
            recorder,
            transcriber,
            injector,
            notifier,
            language,
            history: VecDeque::with_capacity(HISTORY_LIMIT),
        }
    }

    pub fn state(&self) -> DictationState {
        self.state
    }

    /// Most recent first.
    pub fn history(&self) -> &VecDeque<TranscriptionItem> {
        &self.history
    }

    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    /// Drive the orchestrator from the hotkey stream. Events are
    /// handled strictly in arrival order; returns when the sending
    /// side shuts down.
    pub fn run(&mut self, events: Receiver<Transition>) {
        info!("dictation loop started");
        for transition in events.iter() {
            self.handle(transition);
        }
        info!("hotkey channel closed, dictation loop exiting");
    }

    pub fn handle(&mut self, transition: Transition) {
        match transition {
            Transition::Pressed => self.on_pressed(),
            Transition::Released => self.on_released(),
        }
    }

    fn on_pressed(&mut self) {
        if self.state != DictationState::Idle {
            debug!(state = ?self.state, "ignoring press while busy");
            return;
        }

        // Focus must be captured before anything else happens; once we
        // start working the frontmost app may change under us.
        self.injector.save_focus_target();

        match self.recorder.start() {
            Ok(()) => {
                self.state = DictationState::Recording;
                info!("recording started");
            }
            Err(e) => {
                self.report_error(&format!("Failed to start recording: {e}"));
            }
        }
    }

    fn on_released(&mut self) {
        if self.state != DictationState::Recording {
            debug!(state = ?self.state, "ignoring release while not recording");
            return;
        }
        self.state = DictationState::Transcribing;

        let asset = match self.recorder.stop() {
            Ok(asset) => asset,
            Err(e) => {
                self.state = DictationState::Idle;
                self.report_error(&format!("Failed to stop recording: {e}"));
                return;
            }
        };

        info!(duration_secs = asset.duration_secs, "transcribing");
        let result = self.transcriber.transcribe(&asset.path, self.language);

        // The temp recording goes away whether transcription worked or
        // not; it exists only to bridge capture and the engine.
        discard_asset(&asset.path);

        match result {
            Ok(text) => {
                if text.is_empty() {
                    info!("no speech detected");
                } else {
                    self.push_history(text.clone());
                    match self.injector.deliver(&text) {
                        InjectionOutcome::Pasted { strategy } => {
                            info!(strategy, chars = text.len(), "text delivered");
                        }
                        InjectionOutcome::ClipboardOnly => {
                            info!(chars = text.len(), "text on clipboard, paste manually");
                        }
                    }
                }
                self.state = DictationState::Idle;
            }
            Err(e) => {
                self.state = DictationState::Idle;
                self.report_error(&format!("Transcription failed: {e}"));
            }
        }
    }

    fn push_history(&mut self, text: String) {
        self.history.push_front(TranscriptionItem::new(text));
        self.history.truncate(HISTORY_LIMIT);
    }

    fn report_error(&self, message: &str) {
        error!("{message}");
        self.notifier.notify("Dictation error", message);
    }
}

impl<R, I> DictationOrchestrator<R, Arc<Mutex<WhisperManager>>, I>
where
    R: Recorder,
    I: Injector,
{
    /// Swap to another model variant: download if needed, then load.
    /// Refused while a dictation cycle is in flight.
    pub fn switch_model(
        &mut self,
        store: &ModelStore,
        runtime: &tokio::runtime::Handle,
        variant: ModelVariant,
    ) -> Result<(), SwitchError> {
        if self.state != DictationState::Idle {
            return Err(SwitchError::Busy(self.state));
        }

        info!(%variant, "switching model");
        let path = runtime.block_on(store.ensure(variant))?;
        self.transcriber.lock().unwrap().load(&path)?;
        info!(%variant, "model switched");
        Ok(())
    }
}

fn discard_asset(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!(path = %path.display(), "failed to remove temp recording: {e}");
    }
}
