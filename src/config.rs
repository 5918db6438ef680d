//! Pipeline configuration
//!
//! All tuning for the capture and dispatch workers lives here. The core has
//! no file or CLI surface of its own; the serde derives exist so embedding
//! applications can persist the config alongside their own settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the voice-typing pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capture sample rate in Hz.
    pub sample_rate: u32,
    /// Capture channel count.
    pub channels: u16,
    /// Samples per frame read from the audio source.
    pub frame_size: usize,
    /// Mean absolute amplitude (i16 scale) below which a frame is silent.
    pub silence_threshold: f32,
    /// Continuous silence that terminates a segment, in seconds.
    pub silence_duration_secs: f32,
    /// Language code passed to the transcription engine (e.g. "en").
    pub language: String,
    /// Worker sleep while the pipeline is not recording, in milliseconds.
    pub idle_poll_ms: u64,
    /// Dequeue timeout for the transcription worker, in milliseconds.
    ///
    /// Short, so state changes are observed promptly even with an empty queue.
    pub dequeue_timeout_ms: u64,
    /// How long shutdown waits for a worker to finish its in-flight work
    /// before detaching it, in milliseconds.
    pub shutdown_grace_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 1,
            frame_size: 1024,
            silence_threshold: 300.0,
            silence_duration_secs: 1.0,
            language: "en".to_string(),
            idle_poll_ms: 50,
            dequeue_timeout_ms: 100,
            shutdown_grace_ms: 3_000,
        }
    }
}

impl EngineConfig {
    /// Number of consecutive silent frames that terminates a segment.
    ///
    /// Truncating division: 1.0 s at 48 kHz with 1024-sample frames is 46
    /// frames, not 47.
    pub fn required_silent_frames(&self) -> usize {
        (self.silence_duration_secs * self.sample_rate as f32 / self.frame_size as f32) as usize
    }

    /// Wall-clock duration of one frame.
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_size as f64 / self.sample_rate.max(1) as f64)
    }

    pub(crate) fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    pub(crate) fn dequeue_timeout(&self) -> Duration {
        Duration::from_millis(self.dequeue_timeout_ms)
    }

    pub(crate) fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Validate the configuration.
    ///
    /// Rejects values that would break segmentation, in particular a silence
    /// window shorter than one frame: that degrades to "every frame boundary
    /// is a cut" and must fail loudly at configuration time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate);
        }
        if self.channels == 0 {
            return Err(ConfigError::InvalidChannels);
        }
        if self.frame_size == 0 {
            return Err(ConfigError::InvalidFrameSize);
        }
        if !self.silence_threshold.is_finite() || self.silence_threshold < 0.0 {
            return Err(ConfigError::InvalidSilenceThreshold(self.silence_threshold));
        }
        if self.required_silent_frames() == 0 {
            return Err(ConfigError::SilenceWindowTooShort {
                duration_secs: self.silence_duration_secs,
            });
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("sample rate must be non-zero")]
    InvalidSampleRate,

    #[error("channel count must be non-zero")]
    InvalidChannels,

    #[error("frame size must be non-zero")]
    InvalidFrameSize,

    #[error("silence threshold must be a finite non-negative amplitude, got {0}")]
    InvalidSilenceThreshold(f32),

    #[error("silence duration of {duration_secs}s is shorter than one frame")]
    SilenceWindowTooShort { duration_secs: f32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sample_rate, 48_000);
        assert_eq!(config.frame_size, 1024);
        assert_eq!(config.silence_threshold, 300.0);
        assert_eq!(config.language, "en");
    }

    #[test]
    fn test_required_silent_frames_truncates() {
        // 48000 / 1024 = 46.875 -> 46
        let config = EngineConfig::default();
        assert_eq!(config.required_silent_frames(), 46);
    }

    #[test]
    fn test_required_silent_frames_exact_division() {
        let config = EngineConfig {
            sample_rate: 16_000,
            frame_size: 800,
            silence_duration_secs: 0.5,
            ..Default::default()
        };
        // 0.5 * 16000 / 800 = 10
        assert_eq!(config.required_silent_frames(), 10);
    }

    #[test]
    fn test_rejects_silence_window_shorter_than_a_frame() {
        let config = EngineConfig {
            sample_rate: 16_000,
            frame_size: 4096,
            silence_duration_secs: 0.1,
            ..Default::default()
        };
        // 0.1 * 16000 / 4096 = 0.39 -> 0 frames
        assert_eq!(config.required_silent_frames(), 0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SilenceWindowTooShort { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_fields() {
        let zero_rate = EngineConfig {
            sample_rate: 0,
            ..Default::default()
        };
        assert_eq!(zero_rate.validate(), Err(ConfigError::InvalidSampleRate));

        let zero_channels = EngineConfig {
            channels: 0,
            ..Default::default()
        };
        assert_eq!(zero_channels.validate(), Err(ConfigError::InvalidChannels));

        let zero_frame = EngineConfig {
            frame_size: 0,
            ..Default::default()
        };
        assert_eq!(zero_frame.validate(), Err(ConfigError::InvalidFrameSize));
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let negative = EngineConfig {
            silence_threshold: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            negative.validate(),
            Err(ConfigError::InvalidSilenceThreshold(_))
        ));

        let nan = EngineConfig {
            silence_threshold: f32::NAN,
            ..Default::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_frame_duration() {
        let config = EngineConfig {
            sample_rate: 16_000,
            frame_size: 1600,
            ..Default::default()
        };
        assert_eq!(config.frame_duration(), Duration::from_millis(100));
    }

    #[test]
    fn test_partial_deserialisation_uses_defaults() {
        let json = r#"{"sample_rate": 16000, "language": "pt"}"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.sample_rate, 16_000);
        assert_eq!(config.language, "pt");
        assert_eq!(config.frame_size, 1024);
        assert_eq!(config.silence_duration_secs, 1.0);
    }

    #[test]
    fn test_serialisation_roundtrip() {
        let config = EngineConfig {
            sample_rate: 44_100,
            channels: 2,
            silence_threshold: 150.0,
            ..Default::default()
        };

        let json = serde_json::to_string(&config).unwrap();
        let restored: EngineConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.sample_rate, 44_100);
        assert_eq!(restored.channels, 2);
        assert_eq!(restored.silence_threshold, 150.0);
    }
}
