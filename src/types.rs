use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the dictation cycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictationState {
    Idle,
    Recording,
    Transcribing,
}

/// One hotkey edge, emitted at most once per physical hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Pressed,
    Released,
}

/// Language hint passed to the transcription engine.
/// `Auto` lets the engine detect the spoken language itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Auto,
    En,
    Es,
    Fr,
    De,
    It,
    Pt,
    Nl,
    Pl,
    Ru,
    Ja,
    Zh,
    Ko,
}

impl Language {
    /// ISO code for the engine, or `None` for auto-detection.
    pub fn code(self) -> Option<&'static str> {
        match self {
            Language::Auto => None,
            Language::En => Some("en"),
            Language::Es => Some("es"),
            Language::Fr => Some("fr"),
            Language::De => Some("de"),
            Language::It => Some("it"),
            Language::Pt => Some("pt"),
            Language::Nl => Some("nl"),
            Language::Pl => Some("pl"),
            Language::Ru => Some("ru"),
            Language::Ja => Some("ja"),
            Language::Zh => Some("zh"),
            Language::Ko => Some("ko"),
        }
    }
}

/// One finished transcription, kept in the bounded history.
#[derive(Debug, Clone)]
pub struct TranscriptionItem {
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl TranscriptionItem {
    pub fn new(text: String) -> Self {
        Self {
            text,
            timestamp: Utc::now(),
        }
    }

    /// Short form for notifications and log lines.
    pub fn preview(&self) -> String {
        crate::utils::truncate_preview(&self.text)
    }
}
