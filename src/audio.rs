use std::path::PathBuf;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use crossbeam_channel::{unbounded, Sender};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::{error, info, warn};

use crate::error::CaptureError;

/// Everything downstream of capture runs at 16 kHz mono.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

// cpal streams hold raw pointers and are not Send by default. The
// stream is only ever driven by its own audio thread; we move the
// owning handle between threads, never the callbacks.
pub struct SendStream(pub cpal::Stream);
unsafe impl Send for SendStream {}

/// A finalized recording: 16-bit PCM WAV, 16 kHz, mono.
#[derive(Debug, Clone)]
pub struct AudioAsset {
    pub path: PathBuf,
    pub duration_secs: f32,
}

/// The live pieces of one recording session.
struct RecordingHandle {
    stream: SendStream,
    audio_tx: Sender<Vec<f32>>,
    writer_thread: JoinHandle<Result<u64, hound::Error>>,
    path: PathBuf,
}

pub fn wav_spec() -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate: TARGET_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Quantize a float sample to 16-bit PCM. Stays within one
/// quantization step (1/32768) of the input on the way back.
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32768.0).clamp(-32768.0, 32767.0) as i16
}

/// Converts the device's native buffers to mono 16 kHz on the capture
/// callback. The resampler is rebuilt only when the callback chunk
/// size changes, which in practice happens once.
struct MonoResampler {
    channels: usize,
    in_rate: u32,
    resampler: Option<(usize, SincFixedIn<f32>)>,
}

impl MonoResampler {
    fn new(channels: usize, in_rate: u32) -> Self {
        Self {
            channels,
            in_rate,
            resampler: None,
        }
    }

    fn convert(&mut self, data: &[f32]) -> Vec<f32> {
        let mono: Vec<f32> = if self.channels > 1 {
            data.chunks(self.channels)
                .map(|frame| frame.iter().sum::<f32>() / self.channels as f32)
                .collect()
        } else {
            data.to_vec()
        };

        if self.in_rate == TARGET_SAMPLE_RATE || mono.is_empty() {
            return mono;
        }

        let needs_new = match &self.resampler {
            Some((size, _)) => *size != mono.len(),
            None => true,
        };
        if needs_new {
            let params = SincInterpolationParameters {
                sinc_len: 256,
                f_cutoff: 0.95,
                interpolation: SincInterpolationType::Linear,
                window: WindowFunction::BlackmanHarris2,
                oversampling_factor: 128,
            };
            match SincFixedIn::<f32>::new(
                TARGET_SAMPLE_RATE as f64 / self.in_rate as f64,
                2.0,
                params,
                mono.len(),
                1,
            ) {
                Ok(resampler) => self.resampler = Some((mono.len(), resampler)),
                Err(e) => {
                    warn!("failed to create resampler: {e}");
                    return Vec::new();
                }
            }
        }

        let (_, resampler) = self.resampler.as_mut().unwrap();
        match resampler.process(&[mono], None) {
            Ok(mut waves_out) => waves_out.remove(0),
            Err(e) => {
                warn!("resampling failed: {e}");
                Vec::new()
            }
        }
    }
}

fn build_capture_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut converter: MonoResampler,
    tx: Sender<Vec<f32>>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            // Real-time path: convert and hand off, nothing blocking.
            let floats: Vec<f32> = data.iter().map(|s| f32::from_sample(*s)).collect();
            let block = converter.convert(&floats);
            if !block.is_empty() {
                let _ = tx.send(block);
            }
        },
        |err| error!("audio input error: {err}"),
        None,
    )
}

/// Microphone capture with conversion to the transcription format.
///
/// `start` opens the input stream in the device's native format and
/// converts on the callback; a separate writer thread does the file
/// I/O so the callback never touches the disk. `stop` flushes
/// everything queued and returns the finalized asset.
pub struct AudioCapture {
    preferred_device: Option<String>,
    handle: Option<RecordingHandle>,
}

impl AudioCapture {
    pub fn new(preferred_device: Option<String>) -> Self {
        Self {
            preferred_device,
            handle: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.handle.is_some()
    }

    /// Names of all available input devices, for settings.
    pub fn list_input_devices() -> Vec<String> {
        let host = cpal::default_host();
        host.input_devices()
            .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
            .unwrap_or_default()
    }

    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.handle.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }

        let host = cpal::default_host();
        let device = if let Some(ref name) = self.preferred_device {
            host.input_devices()
                .map_err(|_| CaptureError::EngineUnavailable)?
                .find(|d| d.name().ok().as_deref() == Some(name.as_str()))
                .ok_or(CaptureError::EngineUnavailable)?
        } else {
            host.default_input_device()
                .ok_or(CaptureError::EngineUnavailable)?
        };
        info!(device = %device.name().unwrap_or_default(), "using input device");

        let supported = device
            .default_input_config()
            .map_err(|e| CaptureError::NoInputNode(e.to_string()))?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        let recordings_dir = crate::utils::get_recordings_dir()?;
        let path = recordings_dir.join(format!(
            "recording_{}.wav",
            chrono::Utc::now().timestamp_millis()
        ));
        let writer = hound::WavWriter::create(&path, wav_spec())?;
        info!(path = %path.display(), "recording to file");

        let (audio_tx, audio_rx) = unbounded::<Vec<f32>>();

        // Writer thread: drains converted blocks and appends PCM. The
        // channel closing is its signal to finalize the container.
        let writer_thread = std::thread::spawn(move || {
            let mut writer = writer;
            let mut written: u64 = 0;
            while let Ok(samples) = audio_rx.recv() {
                for sample in samples {
                    writer.write_sample(f32_to_i16(sample))?;
                    written += 1;
                }
            }
            writer.finalize()?;
            Ok(written)
        });

        let converter = MonoResampler::new(config.channels as usize, config.sample_rate.0);
        let stream = match sample_format {
            cpal::SampleFormat::F32 => {
                build_capture_stream::<f32>(&device, &config, converter, audio_tx.clone())
            }
            cpal::SampleFormat::I16 => {
                build_capture_stream::<i16>(&device, &config, converter, audio_tx.clone())
            }
            cpal::SampleFormat::U16 => {
                build_capture_stream::<u16>(&device, &config, converter, audio_tx.clone())
            }
            other => {
                return Err(CaptureError::Stream(format!(
                    "unsupported sample format: {other:?}"
                )))
            }
        }
        .map_err(|e| CaptureError::Stream(e.to_string()))?;

        stream.play().map_err(|e| CaptureError::Stream(e.to_string()))?;

        self.handle = Some(RecordingHandle {
            stream: SendStream(stream),
            audio_tx,
            writer_thread,
            path,
        });
        Ok(())
    }

    pub fn stop(&mut self) -> Result<AudioAsset, CaptureError> {
        let handle = self.handle.take().ok_or(CaptureError::NotRecording)?;

        // Stop the microphone first so no new audio arrives, then close
        // the channel so the writer drains what is queued and finalizes.
        drop(handle.stream);
        drop(handle.audio_tx);

        let written = handle
            .writer_thread
            .join()
            .map_err(|_| CaptureError::Stream("writer thread panicked".into()))??;

        let duration_secs = written as f32 / TARGET_SAMPLE_RATE as f32;
        info!(path = %handle.path.display(), duration_secs, "recording finalized");
        Ok(AudioAsset {
            path: handle.path,
            duration_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantization_clamps_and_scales() {
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(1.0), 32767);
        assert_eq!(f32_to_i16(-1.0), -32768);
        assert_eq!(f32_to_i16(2.5), 32767);
        assert_eq!(f32_to_i16(-2.5), -32768);
    }

    #[test]
    fn stereo_downmix_averages_frames() {
        let mut converter = MonoResampler::new(2, TARGET_SAMPLE_RATE);
        let out = converter.convert(&[0.5, -0.5, 1.0, 0.0]);
        assert_eq!(out, vec![0.0, 0.5]);
    }

    #[test]
    fn resampler_reduces_48k_input() {
        let mut converter = MonoResampler::new(1, 48_000);
        let input = vec![0.0f32; 4800];
        let out = converter.convert(&input);
        // 48 kHz to 16 kHz is a 3:1 reduction; sinc filters trim edges
        // slightly, so allow some slack around the nominal 1600.
        assert!(
            out.len() > 1200 && out.len() <= 1700,
            "unexpected output length {}",
            out.len()
        );
    }

    #[test]
    fn stop_without_start_reports_not_recording() {
        let mut capture = AudioCapture::new(None);
        assert!(matches!(capture.stop(), Err(CaptureError::NotRecording)));
    }
}
