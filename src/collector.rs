//! Segment collector
//!
//! Long-lived capture worker. While the activation state is `Recording` it
//! pulls frames from the audio source, watches for runs of silence, and cuts
//! the accumulated audio into segments at silence boundaries. In every other
//! state it flushes whatever it holds and idles. The thread itself lives
//! for the whole process so re-activation never re-opens audio handles.
//!
//! Splice policy: when a cut happens, the trailing silent frames are kept
//! as the seed of the next accumulation buffer rather than discarded. A
//! short pause between two utterances therefore shows up as leading silence
//! on the next segment.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::audio::level;
use crate::audio::source::AudioSource;
use crate::config::EngineConfig;
use crate::pipeline::StatusHub;
use crate::segment::{SegmentSender, SegmentWriter};
use crate::state::{ActivationState, StateMachine};

/// Consecutive read failures that stop the collector.
const MAX_READ_FAILURES: u32 = 3;

/// Backoff after a failed read, so a flapping device doesn't spin the loop.
const READ_RETRY_BACKOFF: Duration = Duration::from_millis(10);

pub(crate) struct SegmentCollector {
    state: StateMachine,
    source: Box<dyn AudioSource>,
    writer: SegmentWriter,
    queue: SegmentSender,
    status: StatusHub,
    shutdown: Arc<AtomicBool>,

    frame_size: usize,
    silence_threshold: f32,
    required_silent_frames: usize,
    idle_poll: Duration,

    frames: Vec<Vec<i16>>,
    silent_run: usize,
    read_failures: u32,
}

impl SegmentCollector {
    pub(crate) fn new(
        config: &EngineConfig,
        state: StateMachine,
        source: Box<dyn AudioSource>,
        writer: SegmentWriter,
        queue: SegmentSender,
        status: StatusHub,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            state,
            source,
            writer,
            queue,
            status,
            shutdown,
            frame_size: config.frame_size,
            silence_threshold: config.silence_threshold,
            required_silent_frames: config.required_silent_frames(),
            idle_poll: config.idle_poll(),
            frames: Vec::new(),
            silent_run: 0,
            read_failures: 0,
        }
    }

    /// Capture loop. Runs until shutdown or a fatal device failure.
    pub(crate) fn run(mut self) {
        tracing::debug!(
            "segment collector started (threshold {}, {} silent frames to cut)",
            self.silence_threshold,
            self.required_silent_frames
        );

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            if self.state.current() != ActivationState::Recording {
                self.flush_pending();
                std::thread::sleep(self.idle_poll);
                continue;
            }

            match self.source.read_frame(self.frame_size) {
                Ok(frame) => {
                    self.read_failures = 0;
                    self.ingest(frame);
                }
                Err(e) => {
                    self.read_failures += 1;
                    tracing::warn!(
                        "audio read failed ({}/{}): {}",
                        self.read_failures,
                        MAX_READ_FAILURES,
                        e
                    );
                    if self.read_failures >= MAX_READ_FAILURES {
                        tracing::error!("audio source failed {} times in a row, capture stopping", MAX_READ_FAILURES);
                        self.status
                            .emit(&format!("microphone capture failed: {e}"));
                        break;
                    }
                    std::thread::sleep(READ_RETRY_BACKOFF);
                }
            }
        }

        self.flush_pending();
        tracing::debug!("segment collector stopped");
    }

    /// Accumulate one frame and cut a segment if a silence boundary closed.
    fn ingest(&mut self, frame: Vec<i16>) {
        let amplitude = level::mean_abs(&frame);
        self.silent_run = if amplitude < self.silence_threshold {
            self.silent_run + 1
        } else {
            0
        };
        self.frames.push(frame);

        // Cut only when real speech precedes the silent run; a buffer that
        // is nothing but silence keeps accumulating until flush.
        if self.silent_run >= self.required_silent_frames && self.frames.len() > self.silent_run {
            let cut = self.frames.len() - self.silent_run;
            let tail = self.frames.split_off(cut);
            let head = std::mem::replace(&mut self.frames, tail);
            self.emit(&head);
        }
    }

    /// Emit whatever is accumulated as a final segment, trailing silence
    /// included. Called when capture leaves `Recording` and at shutdown.
    fn flush_pending(&mut self) {
        if self.frames.is_empty() {
            return;
        }
        let frames = std::mem::take(&mut self.frames);
        self.silent_run = 0;
        tracing::debug!("flushing {} buffered frames", frames.len());
        self.emit(&frames);
    }

    fn emit(&mut self, frames: &[Vec<i16>]) {
        if frames.is_empty() {
            return;
        }
        match self.writer.write(frames) {
            Ok(segment) => {
                tracing::debug!(
                    "segment cut: {} frames, {:.2}s",
                    segment.frame_count(),
                    segment.duration_secs()
                );
                self.queue.send(segment);
            }
            Err(e) => {
                tracing::error!("failed to persist segment, {} frames dropped: {}", frames.len(), e);
            }
        }
    }
}
