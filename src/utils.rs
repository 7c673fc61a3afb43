use std::io;
use std::path::PathBuf;

/// Notification previews show at most 50 characters of a transcription.
const PREVIEW_LIMIT: usize = 50;

/// Truncate a transcription for display: up to 50 characters, with the
/// last three replaced by an ellipsis when the text is longer.
pub fn truncate_preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_LIMIT {
        return text.to_string();
    }
    let head: String = text.chars().take(PREVIEW_LIMIT - 3).collect();
    format!("{head}...")
}

fn data_dir() -> io::Result<PathBuf> {
    dirs::data_local_dir()
        .map(|d| d.join("voxhold"))
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "could not find local data directory"))
}

/// Find or create the directory where downloaded models live.
pub fn get_models_dir() -> io::Result<PathBuf> {
    let models_dir = data_dir()?.join("models");
    std::fs::create_dir_all(&models_dir)?;
    Ok(models_dir)
}

/// Find or create the directory for in-flight recording files.
pub fn get_recordings_dir() -> io::Result<PathBuf> {
    let recordings_dir = data_dir()?.join("temp");
    std::fs::create_dir_all(&recordings_dir)?;
    Ok(recordings_dir)
}

/// Find or create the directory holding settings.json.
pub fn get_config_dir() -> io::Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .map(|d| d.join("voxhold"))
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "could not find config directory"))?;
    std::fs::create_dir_all(&config_dir)?;
    Ok(config_dir)
}
