//! Push-to-talk dictation: hold a global hotkey to record, release to
//! transcribe with a local whisper.cpp model, and the text lands in
//! whatever application had focus when the hold began.

pub mod audio;
pub mod downloader;
pub mod error;
pub mod hotkeys;
pub mod injector;
pub mod models;
pub mod notifier;
pub mod orchestrator;
pub mod settings;
pub mod types;
pub mod utils;
pub mod whisper;
