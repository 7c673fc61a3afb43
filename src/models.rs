use std::fmt;

use serde::{Deserialize, Serialize};

/// The fixed catalog of whisper.cpp model variants the app can run.
/// Larger models are slower but more accurate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelVariant {
    #[serde(rename = "tiny")]
    Tiny,
    #[serde(rename = "base")]
    Base,
    #[serde(rename = "small")]
    Small,
    #[serde(rename = "medium.en")]
    MediumEn,
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 4] = [
        ModelVariant::Tiny,
        ModelVariant::Base,
        ModelVariant::Small,
        ModelVariant::MediumEn,
    ];

    pub fn id(self) -> &'static str {
        match self {
            ModelVariant::Tiny => "tiny",
            ModelVariant::Base => "base",
            ModelVariant::Small => "small",
            ModelVariant::MediumEn => "medium.en",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ModelVariant::Tiny => "Tiny (75 MB) - Fastest",
            ModelVariant::Base => "Base (142 MB) - Balanced",
            ModelVariant::Small => "Small (466 MB) - Accurate",
            ModelVariant::MediumEn => "Medium English (1.5 GB) - High Accuracy",
        }
    }

    /// File name inside the model cache directory.
    pub fn file_name(self) -> String {
        format!("ggml-{}.bin", self.id())
    }

    pub fn download_url(self) -> String {
        format!(
            "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/{}",
            self.file_name()
        )
    }

    /// Approximate download size, used for progress math when the
    /// server does not send a Content-Length header.
    pub fn expected_bytes(self) -> u64 {
        match self {
            ModelVariant::Tiny => 75_000_000,
            ModelVariant::Base => 142_000_000,
            ModelVariant::Small => 466_000_000,
            ModelVariant::MediumEn => 1_500_000_000,
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Download/readiness state of the currently selected variant.
/// Only the [`ModelStore`](crate::downloader::ModelStore) transitions
/// this; everyone else observes.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelState {
    NotDownloaded,
    /// Fraction in `0.0..=1.0`, non-decreasing within one download.
    Downloading(f32),
    Ready,
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_follow_ggml_convention() {
        assert_eq!(ModelVariant::Tiny.file_name(), "ggml-tiny.bin");
        assert_eq!(ModelVariant::MediumEn.file_name(), "ggml-medium.en.bin");
    }

    #[test]
    fn variant_serde_round_trip() {
        for variant in ModelVariant::ALL {
            let json = serde_json::to_string(&variant).unwrap();
            let back: ModelVariant = serde_json::from_str(&json).unwrap();
            assert_eq!(back, variant);
        }
        assert_eq!(
            serde_json::to_string(&ModelVariant::MediumEn).unwrap(),
            "\"medium.en\""
        );
    }
}
