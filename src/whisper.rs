use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, warn};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::error::TranscribeError;
use crate::types::Language;

/// Owns the single loaded whisper.cpp instance.
///
/// The context is not reentrant, so callers share the manager behind
/// `Arc<Mutex<..>>`; the mutex is what serializes transcriptions.
pub struct WhisperManager {
    context: Option<WhisperContext>,
    model_path: Option<PathBuf>,
}

impl WhisperManager {
    pub fn new() -> Self {
        Self {
            context: None,
            model_path: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.context.is_some()
    }

    pub fn model_path(&self) -> Option<&Path> {
        self.model_path.as_deref()
    }

    /// Load a model from disk, replacing whatever was held before.
    pub fn load(&mut self, path: &Path) -> Result<(), TranscribeError> {
        if !path.exists() {
            return Err(TranscribeError::ModelNotFound(path.to_path_buf()));
        }

        info!(model = %path.display(), "loading whisper model");
        let path_str = path
            .to_str()
            .ok_or_else(|| TranscribeError::LoadFailed("model path is not valid UTF-8".into()))?;

        let params = WhisperContextParameters::default();
        let ctx = WhisperContext::new_with_params(path_str, params)
            .map_err(|e| TranscribeError::LoadFailed(e.to_string()))?;

        self.context = Some(ctx);
        self.model_path = Some(path.to_path_buf());
        info!("whisper model loaded");
        Ok(())
    }

    /// Transcribe a finalized recording. An empty string is a valid
    /// result and means no speech was detected.
    pub fn transcribe_file(
        &mut self,
        path: &Path,
        language: Language,
    ) -> Result<String, TranscribeError> {
        if self.context.is_none() {
            return Err(TranscribeError::NotInitialized);
        }
        let samples = load_samples(path)?;
        self.transcribe_samples(&samples, language)
    }

    pub fn transcribe_samples(
        &mut self,
        samples: &[f32],
        language: Language,
    ) -> Result<String, TranscribeError> {
        let ctx = self.context.as_ref().ok_or(TranscribeError::NotInitialized)?;

        if samples.is_empty() {
            return Ok(String::new());
        }

        let start = Instant::now();
        let mut state = ctx
            .create_state()
            .map_err(|e| TranscribeError::Inference(e.to_string()))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_n_threads(4);
        params.set_translate(false);
        params.set_language(language.code());
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, samples)
            .map_err(|e| TranscribeError::Inference(e.to_string()))?;

        let num_segments = state
            .full_n_segments()
            .map_err(|e| TranscribeError::Inference(e.to_string()))?;

        let mut transcript = String::new();
        for i in 0..num_segments {
            let segment = state
                .full_get_segment_text(i)
                .map_err(|e| TranscribeError::Inference(e.to_string()))?;
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            if !transcript.is_empty() {
                transcript.push(' ');
            }
            transcript.push_str(segment);
        }
        let text = transcript.trim().to_string();

        let elapsed = start.elapsed();
        let audio_secs = samples.len() as f32 / crate::audio::TARGET_SAMPLE_RATE as f32;
        info!(
            audio_secs,
            elapsed_ms = elapsed.as_millis() as u64,
            speedup = audio_secs / elapsed.as_secs_f32(),
            "transcription finished"
        );

        Ok(text)
    }
}

impl Default for WhisperManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a recording back as normalized float samples. The container
/// header is handled by hound; 16-bit PCM is scaled by 1/32768.
pub fn load_samples(path: &Path) -> Result<Vec<f32>, TranscribeError> {
    let mut reader =
        hound::WavReader::open(path).map_err(|e| TranscribeError::AudioLoad(e.to_string()))?;
    let spec = reader.spec();

    let mut samples: Vec<f32> = Vec::with_capacity(reader.len() as usize);
    if spec.sample_format == hound::SampleFormat::Float {
        samples.extend(reader.samples::<f32>().map(|s| s.unwrap_or(0.0)));
    } else {
        samples.extend(
            reader
                .samples::<i16>()
                .map(|s| s.unwrap_or(0) as f32 / 32768.0),
        );
    }

    // Recordings are written mono; tolerate stereo files anyway.
    if spec.channels == 2 {
        samples = samples
            .chunks(2)
            .map(|frame| (frame[0] + frame[1]) / 2.0)
            .collect();
    } else if spec.channels > 2 {
        warn!(channels = spec.channels, "unexpected channel count");
    }

    Ok(samples)
}
