use std::path::PathBuf;

use thiserror::Error;

use crate::types::DictationState;

/// Errors from the microphone capture pipeline.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no audio input device available")]
    EngineUnavailable,

    #[error("input device exposes no capture stream: {0}")]
    NoInputNode(String),

    #[error("a recording session is already active")]
    AlreadyRecording,

    #[error("not currently recording")]
    NotRecording,

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("recording file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("wav container error: {0}")]
    Wav(#[from] hound::Error),
}

/// Errors from the model download path. Cloneable because a single
/// in-flight download can be awaited by several callers at once.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("model download failed: {0}")]
    Http(String),

    #[error("model file error: {0}")]
    Io(String),

    #[error("download interrupted: {0}")]
    Interrupted(String),
}

/// Errors from the transcription engine.
#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("no model loaded")]
    NotInitialized,

    #[error("model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("failed to load model: {0}")]
    LoadFailed(String),

    #[error("failed to load audio asset: {0}")]
    AudioLoad(String),

    #[error("transcription failed: {0}")]
    Inference(String),
}

/// Errors from switching the active model variant at runtime.
#[derive(Debug, Error)]
pub enum SwitchError {
    #[error("cannot switch models while {0:?}")]
    Busy(DictationState),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Load(#[from] TranscribeError),
}
