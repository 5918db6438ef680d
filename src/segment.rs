//! Utterance segments and their backing storage
//!
//! A `Segment` is the unit of transcription: one contiguous run of captured
//! frames, persisted as a temporary WAV file. The handle owns the file;
//! dropping the handle removes it, so storage is released exactly once no
//! matter how transcription goes. The temp directory itself lives as long
//! as the writer or any outstanding segment, whichever is longer.

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A finite run of captured audio, persisted as a temp WAV file.
///
/// Exclusively owned by whichever pipeline stage currently holds it;
/// ownership transfers whole at enqueue/dequeue. Dropping the handle
/// deletes the backing file.
pub struct Segment {
    path: PathBuf,
    frames: usize,
    samples: usize,
    sample_rate: u32,
    channels: u16,
    captured_at: DateTime<Utc>,
    // Keeps the temp directory alive while any segment still points into it.
    _dir: Arc<TempDir>,
}

impl Segment {
    /// Path of the backing WAV file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of capture frames in this segment.
    pub fn frame_count(&self) -> usize {
        self.frames
    }

    /// Total interleaved samples in this segment.
    pub fn sample_count(&self) -> usize {
        self.samples
    }

    /// Sample rate of the captured audio.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count of the captured audio.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// When the segment was cut.
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Audio duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples as f64 / (self.sample_rate as f64 * self.channels as f64)
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("released segment storage {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "failed to remove segment file {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("path", &self.path)
            .field("frames", &self.frames)
            .field("duration_secs", &self.duration_secs())
            .finish()
    }
}

/// Errors while persisting a segment.
#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    #[error("failed to create segment directory: {0}")]
    TempDir(#[from] std::io::Error),

    #[error("failed to write segment wav: {0}")]
    Wav(#[from] hound::Error),
}

/// Writes frame runs out as WAV files in a per-run temp directory.
pub struct SegmentWriter {
    dir: Arc<TempDir>,
    sample_rate: u32,
    channels: u16,
    seq: u64,
}

impl SegmentWriter {
    /// Create a writer with a fresh temp directory.
    pub fn new(sample_rate: u32, channels: u16) -> Result<Self, SegmentError> {
        let dir = TempDir::with_prefix("sotto-segments-")?;
        tracing::debug!("segment storage at {}", dir.path().display());
        Ok(Self {
            dir: Arc::new(dir),
            sample_rate,
            channels,
            seq: 0,
        })
    }

    /// Directory holding the segment files.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Persist `frames` as one WAV segment.
    ///
    /// `frames` must be non-empty; the collector never emits empty segments.
    pub fn write(&mut self, frames: &[Vec<i16>]) -> Result<Segment, SegmentError> {
        debug_assert!(!frames.is_empty(), "segments are never empty");

        self.seq += 1;
        let captured_at = Utc::now();
        let path = self.dir.path().join(format!(
            "segment-{:06}-{}.wav",
            self.seq,
            captured_at.format("%H%M%S%3f")
        ));

        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(&path, spec)?;
        let mut samples = 0usize;
        for frame in frames {
            for &sample in frame {
                writer.write_sample(sample)?;
            }
            samples += frame.len();
        }
        writer.finalize()?;

        Ok(Segment {
            path,
            frames: frames.len(),
            samples,
            sample_rate: self.sample_rate,
            channels: self.channels,
            captured_at,
            _dir: self.dir.clone(),
        })
    }
}

/// Sending half of the segment queue (held by the collector).
pub struct SegmentSender(Sender<Segment>);

impl SegmentSender {
    /// Enqueue a segment. Returns `false` if the consumer is gone, in which
    /// case the segment is dropped and its storage released here.
    pub fn send(&self, segment: Segment) -> bool {
        match self.0.send(segment) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("segment queue disconnected, discarding segment");
                drop(e.into_inner());
                false
            }
        }
    }
}

/// Receiving half of the segment queue (held by the transcription worker).
pub struct SegmentReceiver(Receiver<Segment>);

impl SegmentReceiver {
    /// Blocking dequeue with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Segment, RecvTimeoutError> {
        self.0.recv_timeout(timeout)
    }

    /// Non-blocking dequeue.
    pub fn try_recv(&self) -> Option<Segment> {
        self.0.try_recv().ok()
    }

    /// Number of segments currently queued.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Create the unbounded single-producer single-consumer segment queue.
pub fn segment_queue() -> (SegmentSender, SegmentReceiver) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (SegmentSender(tx), SegmentReceiver(rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames_of(frame_count: usize, frame_size: usize, value: i16) -> Vec<Vec<i16>> {
        vec![vec![value; frame_size]; frame_count]
    }

    #[test]
    fn test_written_segment_is_readable_wav() {
        let mut writer = SegmentWriter::new(16_000, 1).unwrap();
        let frames = vec![vec![1i16, 2, 3], vec![4, 5, 6]];
        let segment = writer.write(&frames).unwrap();

        assert_eq!(segment.frame_count(), 2);
        assert_eq!(segment.sample_count(), 6);
        assert_eq!(segment.sample_rate(), 16_000);
        assert!(segment.path().exists());

        let reader = hound::WavReader::open(segment.path()).unwrap();
        assert_eq!(reader.spec().sample_rate, 16_000);
        assert_eq!(reader.spec().channels, 1);
        let samples: Vec<i16> = reader.into_samples().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_drop_removes_backing_file() {
        let mut writer = SegmentWriter::new(16_000, 1).unwrap();
        let segment = writer.write(&frames_of(1, 8, 5)).unwrap();
        let path = segment.path().to_path_buf();

        assert!(path.exists());
        drop(segment);
        assert!(!path.exists());
    }

    #[test]
    fn test_directory_outlives_writer_while_segments_exist() {
        let mut writer = SegmentWriter::new(16_000, 1).unwrap();
        let segment = writer.write(&frames_of(1, 8, 5)).unwrap();
        let dir = writer.dir().to_path_buf();

        drop(writer);
        assert!(dir.exists());
        assert!(segment.path().exists());

        drop(segment);
        assert!(!dir.exists());
    }

    #[test]
    fn test_duration() {
        let mut writer = SegmentWriter::new(8_000, 1).unwrap();
        let segment = writer.write(&frames_of(4, 2_000, 0)).unwrap();
        assert!((segment.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_queue_preserves_fifo_order() {
        let mut writer = SegmentWriter::new(16_000, 1).unwrap();
        let (tx, rx) = segment_queue();

        for frame_count in [3, 5, 7] {
            let segment = writer.write(&frames_of(frame_count, 4, 1)).unwrap();
            assert!(tx.send(segment));
        }

        assert_eq!(rx.len(), 3);
        for expected in [3, 5, 7] {
            let segment = rx.recv_timeout(Duration::from_millis(100)).unwrap();
            assert_eq!(segment.frame_count(), expected);
        }
        assert!(rx.is_empty());
    }

    #[test]
    fn test_dropping_loaded_queue_releases_all_storage() {
        let mut writer = SegmentWriter::new(16_000, 1).unwrap();
        let (tx, rx) = segment_queue();

        let mut paths = Vec::new();
        for _ in 0..3 {
            let segment = writer.write(&frames_of(2, 4, 1)).unwrap();
            paths.push(segment.path().to_path_buf());
            tx.send(segment);
        }
        let dir = writer.dir().to_path_buf();
        drop(writer);

        // Queue torn down with segments still inside.
        drop(tx);
        drop(rx);

        for path in paths {
            assert!(!path.exists(), "{} leaked", path.display());
        }
        assert!(!dir.exists());
    }

    #[test]
    fn test_send_after_receiver_gone_releases_storage() {
        let mut writer = SegmentWriter::new(16_000, 1).unwrap();
        let (tx, rx) = segment_queue();
        drop(rx);

        let segment = writer.write(&frames_of(1, 4, 1)).unwrap();
        let path = segment.path().to_path_buf();
        assert!(!tx.send(segment));
        assert!(!path.exists());
    }

    #[test]
    fn test_recv_timeout_on_empty_queue() {
        let (_tx, rx) = segment_queue();
        let result = rx.recv_timeout(Duration::from_millis(10));
        assert_eq!(result.err(), Some(RecvTimeoutError::Timeout));
    }
}
