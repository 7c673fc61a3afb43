use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::hotkeys::HotkeyBinding;
use crate::models::ModelVariant;
use crate::types::Language;

/// User configuration, persisted as JSON. Unknown fields are ignored
/// and missing fields fall back to defaults, so old files keep working
/// across releases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub hotkey: HotkeyBinding,
    pub model: ModelVariant,
    pub language: Language,
    pub auto_paste: bool,
    pub input_device: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hotkey: HotkeyBinding::default(),
            model: ModelVariant::Small,
            language: Language::En,
            auto_paste: true,
            input_device: None,
        }
    }
}

impl Settings {
    pub fn path() -> io::Result<PathBuf> {
        Ok(crate::utils::get_config_dir()?.join("settings.json"))
    }

    /// Load from the standard location. Any problem reading or parsing
    /// falls back to defaults; settings must never stop startup.
    pub fn load() -> Self {
        match Self::path() {
            Ok(path) => Self::load_from(&path),
            Err(e) => {
                warn!("could not resolve settings path: {e}, using defaults");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("no settings file yet, using defaults");
                return Self::default();
            }
            Err(e) => {
                warn!(path = %path.display(), "could not read settings: {e}, using defaults");
                return Self::default();
            }
        };

        let mut settings: Settings = match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %path.display(), "settings file is malformed: {e}, using defaults");
                return Self::default();
            }
        };

        // A binding triggered by a bare modifier can never fire.
        if !settings.hotkey.is_valid() {
            warn!("configured hotkey has no trigger key, restoring default binding");
            settings.hotkey = HotkeyBinding::default();
        }
        settings
    }

    pub fn save(&self) -> io::Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkeys::{keys, Modifiers};

    #[test]
    fn round_trip_preserves_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let settings = Settings {
            hotkey: HotkeyBinding {
                key_code: keys::F6,
                modifiers: Modifiers::CONTROL | Modifiers::SHIFT,
            },
            model: ModelVariant::MediumEn,
            language: Language::De,
            auto_paste: false,
            input_device: Some("USB Microphone".to_string()),
        };
        settings.save_to(&path).unwrap();

        assert_eq!(Settings::load_from(&path), settings);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("nope.json"));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"language":"ja"}"#).unwrap();

        let settings = Settings::load_from(&path);
        assert_eq!(settings.language, Language::Ja);
        assert_eq!(settings.model, Settings::default().model);
        assert!(settings.auto_paste);
    }

    #[test]
    fn modifier_only_hotkey_is_replaced_with_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            format!(r#"{{"hotkey":{{"key_code":{},"modifiers":0}}}}"#, keys::SHIFT),
        )
        .unwrap();

        let settings = Settings::load_from(&path);
        assert_eq!(settings.hotkey, HotkeyBinding::default());
    }

    #[test]
    fn hotkey_persists_as_two_scalars() {
        let json = serde_json::to_string(&HotkeyBinding::default()).unwrap();
        assert_eq!(json, r#"{"key_code":49,"modifiers":2}"#);
    }
}
