//! End-to-end dictation cycles driven through the orchestrator with
//! fake capture, transcription, and delivery seams.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use voxhold::audio::AudioAsset;
use voxhold::downloader::{Fetcher, ModelStore, ProgressFn};
use voxhold::error::{CaptureError, FetchError, SwitchError, TranscribeError};
use voxhold::injector::InjectionOutcome;
use voxhold::models::ModelVariant;
use voxhold::notifier::Notify;
use voxhold::orchestrator::{DictationOrchestrator, Injector, Recorder, Transcriber, HISTORY_LIMIT};
use voxhold::types::{DictationState, Language, Transition};
use voxhold::whisper::WhisperManager;

#[derive(Default)]
struct RecorderState {
    starts: u32,
    stops: u32,
    last_asset: Option<PathBuf>,
}

struct FakeRecorder {
    dir: Arc<tempfile::TempDir>,
    state: Arc<Mutex<RecorderState>>,
    fail_start: bool,
    fail_stop: bool,
}

impl FakeRecorder {
    fn new() -> (Self, Arc<Mutex<RecorderState>>) {
        let state = Arc::new(Mutex::new(RecorderState::default()));
        let recorder = Self {
            dir: Arc::new(tempfile::tempdir().unwrap()),
            state: state.clone(),
            fail_start: false,
            fail_stop: false,
        };
        (recorder, state)
    }
}

impl Recorder for FakeRecorder {
    fn start(&mut self) -> Result<(), CaptureError> {
        if self.fail_start {
            return Err(CaptureError::EngineUnavailable);
        }
        self.state.lock().unwrap().starts += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<AudioAsset, CaptureError> {
        if self.fail_stop {
            return Err(CaptureError::NotRecording);
        }
        let mut state = self.state.lock().unwrap();
        state.stops += 1;
        let path = self.dir.path().join(format!("recording_{}.wav", state.stops));
        std::fs::write(&path, b"pcm bytes").unwrap();
        state.last_asset = Some(path.clone());
        Ok(AudioAsset {
            path,
            duration_secs: 2.0,
        })
    }
}

enum TranscriberBehavior {
    Text(String),
    Fail,
}

struct FakeTranscriber {
    behavior: TranscriberBehavior,
    calls: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeTranscriber {
    fn text(text: &str) -> (Self, Arc<Mutex<Vec<PathBuf>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                behavior: TranscriberBehavior::Text(text.to_string()),
                calls: calls.clone(),
            },
            calls,
        )
    }

    fn failing() -> (Self, Arc<Mutex<Vec<PathBuf>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                behavior: TranscriberBehavior::Fail,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl Transcriber for FakeTranscriber {
    fn transcribe(&self, asset: &Path, _language: Language) -> Result<String, TranscribeError> {
        assert!(asset.exists(), "asset must still exist while transcribing");
        self.calls.lock().unwrap().push(asset.to_path_buf());
        match &self.behavior {
            TranscriberBehavior::Text(text) => Ok(text.clone()),
            TranscriberBehavior::Fail => Err(TranscribeError::Inference("engine exploded".into())),
        }
    }
}

#[derive(Default)]
struct InjectorState {
    focus_saves: u32,
    delivered: Vec<String>,
}

struct FakeInjector {
    state: Arc<Mutex<InjectorState>>,
}

impl FakeInjector {
    fn new() -> (Self, Arc<Mutex<InjectorState>>) {
        let state = Arc::new(Mutex::new(InjectorState::default()));
        (
            Self {
                state: state.clone(),
            },
            state,
        )
    }
}

impl Injector for FakeInjector {
    fn save_focus_target(&mut self) {
        self.state.lock().unwrap().focus_saves += 1;
    }

    fn deliver(&mut self, text: &str) -> InjectionOutcome {
        self.state.lock().unwrap().delivered.push(text.to_string());
        InjectionOutcome::Pasted { strategy: "fake" }
    }
}

#[derive(Default)]
struct RecordingNotifier(Mutex<Vec<(String, String)>>);

impl Notify for RecordingNotifier {
    fn notify(&self, summary: &str, body: &str) {
        self.0
            .lock()
            .unwrap()
            .push((summary.to_string(), body.to_string()));
    }
}

#[test]
fn scenario_press_speak_release_delivers_text() {
    let (recorder, recorder_state) = FakeRecorder::new();
    let (transcriber, transcribe_calls) = FakeTranscriber::text("hello from the microphone");
    let (injector, injector_state) = FakeInjector::new();
    let notifier = Arc::new(RecordingNotifier::default());
    let mut orchestrator = DictationOrchestrator::new(
        recorder,
        transcriber,
        injector,
        notifier.clone(),
        Language::En,
    );

    assert_eq!(orchestrator.state(), DictationState::Idle);
    orchestrator.handle(Transition::Pressed);
    assert_eq!(orchestrator.state(), DictationState::Recording);
    orchestrator.handle(Transition::Released);
    assert_eq!(orchestrator.state(), DictationState::Idle);

    let recorder_state = recorder_state.lock().unwrap();
    assert_eq!(recorder_state.starts, 1);
    assert_eq!(recorder_state.stops, 1);
    // The temp recording is cleaned up once the cycle finishes.
    assert!(!recorder_state.last_asset.as_ref().unwrap().exists());

    assert_eq!(transcribe_calls.lock().unwrap().len(), 1);

    let injector_state = injector_state.lock().unwrap();
    assert_eq!(injector_state.focus_saves, 1);
    assert_eq!(
        injector_state.delivered,
        vec!["hello from the microphone".to_string()]
    );

    assert_eq!(orchestrator.history().len(), 1);
    assert_eq!(
        orchestrator.history()[0].text,
        "hello from the microphone"
    );
    assert!(notifier.0.lock().unwrap().is_empty());
}

#[test]
fn scenario_double_press_collapses_to_one_session() {
    let (recorder, recorder_state) = FakeRecorder::new();
    let (transcriber, _) = FakeTranscriber::text("once");
    let (injector, injector_state) = FakeInjector::new();
    let mut orchestrator = DictationOrchestrator::new(
        recorder,
        transcriber,
        injector,
        Arc::new(RecordingNotifier::default()),
        Language::En,
    );

    orchestrator.handle(Transition::Pressed);
    orchestrator.handle(Transition::Pressed);
    assert_eq!(recorder_state.lock().unwrap().starts, 1);
    // Only the first press saved a focus target.
    assert_eq!(injector_state.lock().unwrap().focus_saves, 1);

    orchestrator.handle(Transition::Released);
    assert_eq!(orchestrator.state(), DictationState::Idle);
    assert_eq!(recorder_state.lock().unwrap().stops, 1);
    assert_eq!(orchestrator.history().len(), 1);
}

#[test]
fn release_without_a_session_is_ignored() {
    let (recorder, recorder_state) = FakeRecorder::new();
    let (transcriber, transcribe_calls) = FakeTranscriber::text("never");
    let (injector, _) = FakeInjector::new();
    let mut orchestrator = DictationOrchestrator::new(
        recorder,
        transcriber,
        injector,
        Arc::new(RecordingNotifier::default()),
        Language::En,
    );

    orchestrator.handle(Transition::Released);
    assert_eq!(orchestrator.state(), DictationState::Idle);
    assert_eq!(recorder_state.lock().unwrap().stops, 0);
    assert!(transcribe_calls.lock().unwrap().is_empty());
}

#[test]
fn capture_start_failure_reports_and_stays_idle() {
    let (mut recorder, recorder_state) = FakeRecorder::new();
    recorder.fail_start = true;
    let (transcriber, transcribe_calls) = FakeTranscriber::text("never");
    let (injector, injector_state) = FakeInjector::new();
    let notifier = Arc::new(RecordingNotifier::default());
    let mut orchestrator = DictationOrchestrator::new(
        recorder,
        transcriber,
        injector,
        notifier.clone(),
        Language::En,
    );

    orchestrator.handle(Transition::Pressed);
    assert_eq!(orchestrator.state(), DictationState::Idle);
    assert_eq!(recorder_state.lock().unwrap().starts, 0);

    let notifications = notifier.0.lock().unwrap();
    assert_eq!(notifications.len(), 1);
    assert!(notifications[0].1.contains("Failed to start recording"));

    // The release that follows the failed press is a no-op.
    drop(notifications);
    orchestrator.handle(Transition::Released);
    assert!(transcribe_calls.lock().unwrap().is_empty());
    assert!(injector_state.lock().unwrap().delivered.is_empty());
}

#[test]
fn transcription_failure_reports_cleans_up_and_recovers() {
    let (recorder, recorder_state) = FakeRecorder::new();
    let (transcriber, _) = FakeTranscriber::failing();
    let (injector, injector_state) = FakeInjector::new();
    let notifier = Arc::new(RecordingNotifier::default());
    let mut orchestrator = DictationOrchestrator::new(
        recorder,
        transcriber,
        injector,
        notifier.clone(),
        Language::En,
    );

    orchestrator.handle(Transition::Pressed);
    orchestrator.handle(Transition::Released);

    assert_eq!(orchestrator.state(), DictationState::Idle);
    // Nothing injected, no history entry, asset removed anyway.
    assert!(injector_state.lock().unwrap().delivered.is_empty());
    assert!(orchestrator.history().is_empty());
    assert!(!recorder_state
        .lock()
        .unwrap()
        .last_asset
        .as_ref()
        .unwrap()
        .exists());
    assert_eq!(notifier.0.lock().unwrap().len(), 1);

    // The next hold works as if nothing happened.
    orchestrator.handle(Transition::Pressed);
    assert_eq!(orchestrator.state(), DictationState::Recording);
}

#[test]
fn empty_transcription_is_success_without_delivery() {
    let (recorder, _) = FakeRecorder::new();
    let (transcriber, _) = FakeTranscriber::text("");
    let (injector, injector_state) = FakeInjector::new();
    let notifier = Arc::new(RecordingNotifier::default());
    let mut orchestrator = DictationOrchestrator::new(
        recorder,
        transcriber,
        injector,
        notifier.clone(),
        Language::En,
    );

    orchestrator.handle(Transition::Pressed);
    orchestrator.handle(Transition::Released);

    assert_eq!(orchestrator.state(), DictationState::Idle);
    assert!(injector_state.lock().unwrap().delivered.is_empty());
    assert!(orchestrator.history().is_empty());
    assert!(notifier.0.lock().unwrap().is_empty());
}

#[test]
fn history_is_bounded_and_most_recent_first() {
    let (recorder, _) = FakeRecorder::new();
    let (transcriber, _) = FakeTranscriber::text("entry");
    let (injector, _) = FakeInjector::new();
    let mut orchestrator = DictationOrchestrator::new(
        recorder,
        transcriber,
        injector,
        Arc::new(RecordingNotifier::default()),
        Language::En,
    );

    for _ in 0..(HISTORY_LIMIT + 2) {
        orchestrator.handle(Transition::Pressed);
        orchestrator.handle(Transition::Released);
    }

    assert_eq!(orchestrator.history().len(), HISTORY_LIMIT);
    let newest = &orchestrator.history()[0];
    let oldest = &orchestrator.history()[HISTORY_LIMIT - 1];
    assert!(newest.timestamp >= oldest.timestamp);
}

/// Pretends to download a model but writes bytes whisper will reject.
struct GarbageFetcher;

impl Fetcher for GarbageFetcher {
    fn fetch<'a>(
        &'a self,
        _url: &'a str,
        dest: &'a Path,
        _progress: ProgressFn,
    ) -> BoxFuture<'a, Result<u64, FetchError>> {
        async move {
            std::fs::write(dest, b"definitely not a ggml model")
                .map_err(|e| FetchError::Io(e.to_string()))?;
            Ok(27)
        }
        .boxed()
    }
}

#[test]
fn switch_model_is_refused_mid_cycle() {
    let (recorder, _) = FakeRecorder::new();
    let whisper = Arc::new(Mutex::new(WhisperManager::new()));
    let (injector, _) = FakeInjector::new();
    let mut orchestrator = DictationOrchestrator::new(
        recorder,
        whisper,
        injector,
        Arc::new(RecordingNotifier::default()),
        Language::En,
    );

    orchestrator.handle(Transition::Pressed);
    assert_eq!(orchestrator.state(), DictationState::Recording);

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let cache = tempfile::tempdir().unwrap();
    let store = ModelStore::new(cache.path().to_path_buf(), Arc::new(GarbageFetcher));

    let err = orchestrator
        .switch_model(&store, runtime.handle(), ModelVariant::Tiny)
        .unwrap_err();
    assert!(matches!(err, SwitchError::Busy(DictationState::Recording)));
}

#[test]
fn switch_model_downloads_but_surfaces_load_failure() {
    let (recorder, _) = FakeRecorder::new();
    let whisper = Arc::new(Mutex::new(WhisperManager::new()));
    let (injector, _) = FakeInjector::new();
    let mut orchestrator = DictationOrchestrator::new(
        recorder,
        whisper.clone(),
        injector,
        Arc::new(RecordingNotifier::default()),
        Language::En,
    );

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let cache = tempfile::tempdir().unwrap();
    let store = ModelStore::new(cache.path().to_path_buf(), Arc::new(GarbageFetcher));

    let err = orchestrator
        .switch_model(&store, runtime.handle(), ModelVariant::Tiny)
        .unwrap_err();
    assert!(matches!(err, SwitchError::Load(TranscribeError::LoadFailed(_))));
    // The download itself landed at the canonical path.
    assert!(store.model_path(ModelVariant::Tiny).exists());
    assert!(!whisper.lock().unwrap().is_loaded());
}
