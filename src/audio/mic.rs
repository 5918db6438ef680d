//! Microphone capture via cpal
//!
//! `MicCapture` owns the input stream and converts whatever sample format
//! the device delivers into i16 samples in a lock-free ring buffer. The
//! stream object is not `Send`, so it stays on the thread that opened it;
//! `MicSource` is the `Send` half that the collector pulls frames from.

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::ring_buffer::PcmRingBuffer;
use super::source::{AudioReadError, AudioSource};

/// Ring capacity in seconds of audio. Generous, so a slow collector
/// iteration does not drop samples.
const RING_SECONDS: u32 = 4;

/// Extra patience on top of one frame duration before a read is starved.
const READ_GRACE: Duration = Duration::from_millis(500);

/// Poll interval while waiting for the ring to fill a frame.
const READ_POLL: Duration = Duration::from_millis(2);

/// An open microphone stream feeding a ring buffer.
pub struct MicCapture {
    // Held for its lifetime; dropping it stops the capture callback.
    _stream: cpal::Stream,
    ring: Arc<PcmRingBuffer>,
    sample_rate: u32,
    channels: u16,
}

impl MicCapture {
    /// Open the default input device at its native configuration.
    ///
    /// The actual rate and channel count are whatever the device reports;
    /// read them back with `sample_rate()` / `channels()` and build the
    /// pipeline config from those.
    #[allow(deprecated)] // cpal 0.17 deprecates name() but description() is not yet stable
    pub fn open() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("no default input device available"))?;

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        let supported = device
            .default_input_config()
            .context("querying default input config")?;

        let sample_rate = supported.sample_rate();
        let channels = supported.channels();
        let sample_format = supported.sample_format();

        tracing::info!(
            "opening input device '{}': {}Hz, {} channels, format {:?}",
            device_name,
            sample_rate,
            channels,
            sample_format
        );

        let ring = Arc::new(PcmRingBuffer::for_capture(
            sample_rate,
            channels,
            RING_SECONDS,
        ));

        let config: cpal::StreamConfig = supported.into();
        let err_fn = |err| tracing::error!("audio stream error: {}", err);

        let stream = match sample_format {
            cpal::SampleFormat::F32 => {
                let callback_ring = ring.clone();
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        write_f32(&callback_ring, data);
                    },
                    err_fn,
                    None,
                )?
            }
            cpal::SampleFormat::I16 => {
                let callback_ring = ring.clone();
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        write_i16(&callback_ring, data);
                    },
                    err_fn,
                    None,
                )?
            }
            cpal::SampleFormat::U16 => {
                let callback_ring = ring.clone();
                device.build_input_stream(
                    &config,
                    move |data: &[u16], _: &cpal::InputCallbackInfo| {
                        write_u16(&callback_ring, data);
                    },
                    err_fn,
                    None,
                )?
            }
            other => return Err(anyhow!("unsupported input sample format {other:?}")),
        };

        stream.play().context("starting input stream")?;

        Ok(Self {
            _stream: stream,
            ring,
            sample_rate,
            channels,
        })
    }

    /// Native sample rate of the open device.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Native channel count of the open device.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// The `Send` reader half, for the collector thread.
    pub fn source(&self) -> MicSource {
        MicSource {
            ring: self.ring.clone(),
            sample_rate: self.sample_rate,
        }
    }
}

/// Frame reader over the capture ring buffer.
pub struct MicSource {
    ring: Arc<PcmRingBuffer>,
    sample_rate: u32,
}

impl AudioSource for MicSource {
    fn read_frame(&mut self, frame_size: usize) -> Result<Vec<i16>, AudioReadError> {
        let frame_duration =
            Duration::from_secs_f64(frame_size as f64 / self.sample_rate.max(1) as f64);
        let deadline = Instant::now() + frame_duration + READ_GRACE;

        let mut frame = vec![0i16; frame_size];
        let mut filled = 0;

        while filled < frame_size {
            filled += self.ring.read(&mut frame[filled..]);
            if filled == frame_size {
                break;
            }
            if Instant::now() >= deadline {
                return Err(AudioReadError::Starved {
                    wanted: frame_size,
                    got: filled,
                });
            }
            std::thread::sleep(READ_POLL);
        }

        Ok(frame)
    }
}

fn write_f32(ring: &PcmRingBuffer, data: &[f32]) {
    // Convert on the stack in chunks; the callback must not allocate.
    let mut scratch = [0i16; 512];
    for chunk in data.chunks(scratch.len()) {
        for (slot, &sample) in scratch.iter_mut().zip(chunk) {
            *slot = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        }
        write_checked(ring, &scratch[..chunk.len()]);
    }
}

fn write_i16(ring: &PcmRingBuffer, data: &[i16]) {
    write_checked(ring, data);
}

fn write_u16(ring: &PcmRingBuffer, data: &[u16]) {
    let mut scratch = [0i16; 512];
    for chunk in data.chunks(scratch.len()) {
        for (slot, &sample) in scratch.iter_mut().zip(chunk) {
            *slot = (sample as i32 - 32768) as i16;
        }
        write_checked(ring, &scratch[..chunk.len()]);
    }
}

fn write_checked(ring: &PcmRingBuffer, samples: &[i16]) {
    let written = ring.write(samples);
    if written < samples.len() {
        tracing::warn!(
            "capture ring overflow: dropped {} samples",
            samples.len() - written
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // MicCapture needs real hardware; the readable half is tested against
    // a manually fed ring buffer instead.

    #[test]
    fn test_mic_source_reads_full_frames() {
        let ring = Arc::new(PcmRingBuffer::new(4096));
        let mut source = MicSource {
            ring: ring.clone(),
            sample_rate: 16_000,
        };

        let samples: Vec<i16> = (0..640).collect();
        ring.write(&samples);

        let frame = source.read_frame(320).unwrap();
        assert_eq!(frame, samples[..320]);

        let frame = source.read_frame(320).unwrap();
        assert_eq!(frame, samples[320..]);
    }

    #[test]
    fn test_mic_source_waits_for_straggling_samples() {
        let ring = Arc::new(PcmRingBuffer::new(4096));
        let mut source = MicSource {
            ring: ring.clone(),
            sample_rate: 16_000,
        };

        ring.write(&[7i16; 100]);
        let feeder = {
            let ring = ring.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                ring.write(&[9i16; 220]);
            })
        };

        let frame = source.read_frame(320).unwrap();
        feeder.join().unwrap();

        assert_eq!(frame.len(), 320);
        assert_eq!(frame[..100], [7i16; 100]);
        assert_eq!(frame[100..], [9i16; 220]);
    }

    #[test]
    fn test_mic_source_starves_on_empty_ring() {
        let ring = Arc::new(PcmRingBuffer::new(4096));
        let mut source = MicSource {
            ring,
            sample_rate: 48_000,
        };

        let result = source.read_frame(1024);
        assert!(matches!(
            result,
            Err(AudioReadError::Starved { wanted: 1024, got: 0 })
        ));
    }

    #[test]
    fn test_u16_conversion_centres_on_zero() {
        let ring = PcmRingBuffer::new(16);
        write_u16(&ring, &[32768, 0, 65535]);

        let mut output = [0i16; 3];
        ring.read(&mut output);
        assert_eq!(output, [0, -32768, 32767]);
    }
}
