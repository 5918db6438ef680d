//! Transcription worker
//!
//! Long-lived dispatch worker. While the activation state is `Recording` it
//! dequeues segments, runs them through the transcription engine, and hands
//! non-empty text to the sink. Pausing stops dequeues but leaves queued
//! segments in place; going `Inactive` discards them. A segment never
//! survives a pass through `Inactive`.
//!
//! Segment storage is released by the handle's Drop at the end of each
//! iteration, so an engine failure (even a panic unwinding through the
//! call) cannot leak a backing file.

use crossbeam_channel::RecvTimeoutError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::pipeline::StatusHub;
use crate::segment::{Segment, SegmentReceiver};
use crate::state::{ActivationState, StateMachine};
use crate::text_insert::TextSink;
use crate::transcribe::Transcriber;

pub(crate) struct TranscriptionWorker {
    state: StateMachine,
    queue: SegmentReceiver,
    transcriber: Box<dyn Transcriber>,
    sink: Box<dyn TextSink>,
    status: StatusHub,
    shutdown: Arc<AtomicBool>,

    language: String,
    dequeue_timeout: Duration,
    idle_poll: Duration,
}

impl TranscriptionWorker {
    pub(crate) fn new(
        config: &EngineConfig,
        state: StateMachine,
        queue: SegmentReceiver,
        transcriber: Box<dyn Transcriber>,
        sink: Box<dyn TextSink>,
        status: StatusHub,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            state,
            queue,
            transcriber,
            sink,
            status,
            shutdown,
            language: config.language.clone(),
            dequeue_timeout: config.dequeue_timeout(),
            idle_poll: config.idle_poll(),
        }
    }

    /// Dispatch loop. Runs until shutdown.
    pub(crate) fn run(mut self) {
        tracing::debug!("transcription worker started (language '{}')", self.language);

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            match self.state.current() {
                ActivationState::Recording => {
                    // Timed dequeue so a state change is noticed promptly
                    // even when the queue stays empty.
                    match self.queue.recv_timeout(self.dequeue_timeout) {
                        Ok(segment) => self.process(segment),
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => {
                            tracing::debug!("segment queue closed, worker stopping");
                            break;
                        }
                    }
                }
                ActivationState::Inactive => {
                    self.discard_queued();
                    std::thread::sleep(self.idle_poll);
                }
                // Ready / Paused: queued segments stay queued.
                _ => std::thread::sleep(self.idle_poll),
            }
        }

        self.discard_queued();
        tracing::debug!("transcription worker stopped");
    }

    /// Transcribe one segment and deliver the text. The segment handle
    /// drops at the end, releasing its storage on every path.
    fn process(&mut self, segment: Segment) {
        tracing::debug!(
            "transcribing segment captured at {} ({:.2}s)",
            segment.captured_at().format("%H:%M:%S%.3f"),
            segment.duration_secs()
        );

        match self.transcriber.transcribe(&segment, &self.language) {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    tracing::debug!("transcription returned empty text");
                } else {
                    match self.sink.inject(text) {
                        Ok(()) => self.status.emit(&format!("typed \u{ab}{text}\u{bb}")),
                        Err(e) => tracing::warn!("text injection failed: {}", e),
                    }
                }
            }
            Err(e) => {
                // Never retried: the engine is stateless, replaying the same
                // audio would only duplicate stale input.
                tracing::warn!("transcription failed, segment dropped: {}", e);
            }
        }
    }

    fn discard_queued(&self) {
        let mut discarded = 0usize;
        while let Some(segment) = self.queue.try_recv() {
            drop(segment);
            discarded += 1;
        }
        if discarded > 0 {
            tracing::info!("discarded {} queued segments", discarded);
        }
    }
}
