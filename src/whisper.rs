//! Whisper transcription backend
//!
//! `Transcriber` implementation over whisper.cpp via whisper-rs. Loads the
//! segment's WAV, mixes to mono, resamples to the 16 kHz the model expects,
//! and runs a greedy decode in the configured language.

use anyhow::{anyhow, Result};
use std::path::Path;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::segment::Segment;
use crate::transcribe::{TranscriptionError, Transcriber};

/// Sample rate whisper models operate on.
const WHISPER_RATE: u32 = 16_000;

/// Whisper-backed transcription engine.
pub struct WhisperTranscriber {
    ctx: WhisperContext,
}

impl WhisperTranscriber {
    /// Load a ggml whisper model (e.g. `ggml-base.bin`).
    pub fn new(model_path: &Path) -> Result<Self> {
        if !model_path.exists() {
            return Err(anyhow!("whisper model not found: {}", model_path.display()));
        }

        let model_str = model_path
            .to_str()
            .ok_or_else(|| anyhow!("model path is not valid UTF-8: {}", model_path.display()))?;

        tracing::info!("loading whisper model from {}", model_path.display());
        let ctx = WhisperContext::new_with_params(model_str, WhisperContextParameters::default())
            .map_err(|e| anyhow!("loading whisper model {}: {e:?}", model_path.display()))?;

        Ok(Self { ctx })
    }

    fn decode(&self, samples: &[f32], language: &str) -> Result<String, TranscriptionError> {
        let start = std::time::Instant::now();

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| TranscriptionError::Engine(format!("creating state: {e:?}")))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(Some(language));
        params.set_translate(false);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, samples)
            .map_err(|e| TranscriptionError::Engine(format!("decode failed: {e:?}")))?;

        let mut text = String::new();
        for segment in state.as_iter() {
            if let Ok(segment_text) = segment.to_str() {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(segment_text);
            }
        }

        let audio_secs = samples.len() as f32 / WHISPER_RATE as f32;
        tracing::debug!(
            "decoded {:.2}s of audio in {:.2}s",
            audio_secs,
            start.elapsed().as_secs_f32()
        );

        Ok(text.trim().to_string())
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(
        &mut self,
        segment: &Segment,
        language: &str,
    ) -> Result<String, TranscriptionError> {
        let samples = load_mono_samples(segment.path())
            .map_err(|e| TranscriptionError::Audio(e.to_string()))?;
        let samples = resample_linear(&samples, segment.sample_rate(), WHISPER_RATE);
        self.decode(&samples, language)
    }
}

/// Load a 16-bit WAV as mono f32 samples in [-1, 1].
fn load_mono_samples(path: &Path) -> Result<Vec<f32>> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
        return Err(anyhow!(
            "unsupported segment format: {} bits {:?}",
            spec.bits_per_sample,
            spec.sample_format
        ));
    }

    let channels = spec.channels.max(1) as usize;
    let samples: Vec<f32> = reader
        .into_samples::<i16>()
        .filter_map(|s| s.ok())
        .map(|s| s as f32 / 32768.0)
        .collect();

    if channels == 1 {
        return Ok(samples);
    }

    Ok(samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect())
}

/// Linear-interpolation resampler. Good enough for speech going into a
/// model; the capture path does no resampling at all.
fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let new_len = (samples.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src = i as f64 * ratio;
        let idx = src as usize;
        let frac = (src - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else {
            samples.get(idx).copied().unwrap_or(0.0)
        };
        output.push(sample);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::SegmentWriter;

    #[test]
    fn test_resample_same_rate_is_identity() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_linear(&samples, 16_000, 16_000), samples);
    }

    #[test]
    fn test_resample_halves_length() {
        let samples: Vec<f32> = (0..480).map(|i| i as f32).collect();
        let out = resample_linear(&samples, 48_000, 24_000);
        assert_eq!(out.len(), 240);
        // Midpoints interpolate between neighbours.
        assert!((out[1] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_resample_empty() {
        assert!(resample_linear(&[], 48_000, 16_000).is_empty());
    }

    #[test]
    fn test_load_mono_samples_from_segment() {
        let mut writer = SegmentWriter::new(16_000, 1).unwrap();
        let segment = writer.write(&[vec![16_384i16, -16_384, 0]]).unwrap();

        let samples = load_mono_samples(segment.path()).unwrap();
        assert_eq!(samples.len(), 3);
        assert!((samples[0] - 0.5).abs() < 1e-3);
        assert!((samples[1] + 0.5).abs() < 1e-3);
        assert_eq!(samples[2], 0.0);
    }

    #[test]
    fn test_load_downmixes_stereo() {
        let mut writer = SegmentWriter::new(16_000, 2).unwrap();
        // Interleaved L/R pairs.
        let segment = writer.write(&[vec![16_384i16, 0, 0, 16_384]]).unwrap();

        let samples = load_mono_samples(segment.path()).unwrap();
        assert_eq!(samples.len(), 2);
        assert!((samples[0] - 0.25).abs() < 1e-3);
        assert!((samples[1] - 0.25).abs() < 1e-3);
    }
}
