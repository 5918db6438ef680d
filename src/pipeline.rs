//! Pipeline orchestration
//!
//! Wires the state machine, the segment collector, and the transcription
//! worker together and exposes the activation surface. Both workers are
//! spawned once and span the whole process, whatever the activation state;
//! re-activating after a deactivation never re-opens audio handles or
//! re-spawns threads.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::audio::source::AudioSource;
use crate::collector::SegmentCollector;
use crate::config::{ConfigError, EngineConfig};
use crate::observer::{ObserverId, ObserverRegistry};
use crate::segment::{segment_queue, SegmentError, SegmentWriter};
use crate::state::{ActivationState, StateMachine};
use crate::text_insert::TextSink;
use crate::transcribe::Transcriber;
use crate::worker::TranscriptionWorker;

/// Errors from building the pipeline. Once `spawn` returns `Ok`, the
/// activation surface itself never fails.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to prepare segment storage: {0}")]
    Storage(#[from] SegmentError),

    #[error("failed to spawn pipeline worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Shared registry for human-readable pipeline events.
///
/// Fired after each successfully injected transcription and for worker
/// failures that stop a worker. Same fault isolation as state observers.
#[derive(Clone)]
pub struct StatusHub {
    observers: Arc<Mutex<ObserverRegistry<String>>>,
}

impl Default for StatusHub {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusHub {
    pub(crate) fn new() -> Self {
        Self {
            observers: Arc::new(Mutex::new(ObserverRegistry::new())),
        }
    }

    /// Register a status observer.
    pub fn subscribe(&self, callback: impl Fn(&str) + Send + 'static) -> ObserverId {
        self.observers
            .lock()
            .subscribe(move |message: &String| callback(message))
    }

    /// Remove a status observer.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.observers.lock().unsubscribe(id)
    }

    pub(crate) fn emit(&self, message: &str) {
        tracing::info!("{}", message);
        self.observers.lock().notify(&message.to_string());
    }
}

/// The assembled voice-typing pipeline.
///
/// Dropping the handle shuts the pipeline down.
pub struct Pipeline {
    state: StateMachine,
    status: StatusHub,
    shutdown: Arc<AtomicBool>,
    shutdown_grace: Duration,
    collector: Option<JoinHandle<()>>,
    worker: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// Validate the config, spawn the capture and dispatch workers, and
    /// return the control handle. The pipeline starts `Inactive`.
    pub fn spawn(
        config: EngineConfig,
        source: Box<dyn AudioSource>,
        transcriber: Box<dyn Transcriber>,
        sink: Box<dyn TextSink>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        let state = StateMachine::new();
        let status = StatusHub::new();
        let shutdown = Arc::new(AtomicBool::new(false));
        let (queue_tx, queue_rx) = segment_queue();

        let writer = SegmentWriter::new(config.sample_rate, config.channels)?;
        let collector = SegmentCollector::new(
            &config,
            state.clone(),
            source,
            writer,
            queue_tx,
            status.clone(),
            shutdown.clone(),
        );
        let worker = TranscriptionWorker::new(
            &config,
            state.clone(),
            queue_rx,
            transcriber,
            sink,
            status.clone(),
            shutdown.clone(),
        );

        let collector_handle = std::thread::Builder::new()
            .name("sotto-collector".to_string())
            .spawn(move || collector.run())?;
        let worker_handle = std::thread::Builder::new()
            .name("sotto-transcriber".to_string())
            .spawn(move || worker.run())?;

        tracing::info!(
            "pipeline up: {}Hz, {} channel(s), frame {} samples, cut after {} silent frames",
            config.sample_rate,
            config.channels,
            config.frame_size,
            config.required_silent_frames()
        );

        Ok(Self {
            state,
            status,
            shutdown,
            shutdown_grace: config.shutdown_grace(),
            collector: Some(collector_handle),
            worker: Some(worker_handle),
        })
    }

    /// `Inactive -> Ready`. No-op from any other state.
    pub fn activate(&self) -> bool {
        self.state.activate()
    }

    /// `Ready | Recording | Paused -> Inactive`. No-op when already inactive.
    pub fn deactivate(&self) -> bool {
        self.state.deactivate()
    }

    /// `Ready | Paused -> Recording`. No-op from any other state.
    pub fn start_recording(&self) -> bool {
        self.state.start_recording()
    }

    /// `Recording -> Paused`. No-op from any other state.
    pub fn pause_recording(&self) -> bool {
        self.state.pause_recording()
    }

    /// Current activation state.
    pub fn current_state(&self) -> ActivationState {
        self.state.current()
    }

    /// Observe activation state changes. Callbacks run synchronously inside
    /// the transition and must not call back into the pipeline.
    pub fn on_state_change(
        &self,
        callback: impl Fn(ActivationState) + Send + 'static,
    ) -> ObserverId {
        self.state.on_state_change(callback)
    }

    /// Observe human-readable pipeline events.
    pub fn on_status(&self, callback: impl Fn(&str) + Send + 'static) -> ObserverId {
        self.status.subscribe(callback)
    }

    /// Stop the pipeline: drive the state to `Inactive`, stop both workers,
    /// and release all segment storage. Idempotent.
    ///
    /// An in-flight transcription is not aborted; each worker gets a bounded
    /// grace period to finish before being detached with an error log.
    pub fn shutdown(&mut self) {
        if self.collector.is_none() && self.worker.is_none() {
            return;
        }

        tracing::info!("pipeline shutting down");
        self.shutdown.store(true, Ordering::SeqCst);
        self.state.force_stop();

        let deadline = Instant::now() + self.shutdown_grace;
        join_with_deadline("collector", self.collector.take(), deadline);
        join_with_deadline("transcription worker", self.worker.take(), deadline);
        tracing::info!("pipeline stopped");
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Wait for a worker until `deadline`; detach it if it does not finish.
/// Detaching rather than blocking keeps shutdown bounded while letting an
/// in-flight engine call run to completion on its own.
fn join_with_deadline(name: &str, handle: Option<JoinHandle<()>>, deadline: Instant) {
    let Some(handle) = handle else { return };

    while !handle.is_finished() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }

    if handle.is_finished() {
        if handle.join().is_err() {
            tracing::error!("{} panicked during shutdown", name);
        }
    } else {
        tracing::error!("{} did not stop within the grace period, detaching", name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::AudioReadError;
    use crate::segment::Segment;
    use crate::text_insert::TextInjectError;
    use crate::transcribe::TranscriptionError;

    struct SilentSource;

    impl AudioSource for SilentSource {
        fn read_frame(&mut self, frame_size: usize) -> Result<Vec<i16>, AudioReadError> {
            // Pace roughly like a real device so the collector doesn't spin.
            std::thread::sleep(Duration::from_millis(1));
            Ok(vec![0; frame_size])
        }
    }

    struct NullTranscriber;

    impl Transcriber for NullTranscriber {
        fn transcribe(
            &mut self,
            _segment: &Segment,
            _language: &str,
        ) -> Result<String, TranscriptionError> {
            Ok(String::new())
        }
    }

    struct NullSink;

    impl TextSink for NullSink {
        fn inject(&mut self, _text: &str) -> Result<(), TextInjectError> {
            Ok(())
        }
    }

    fn test_pipeline() -> Pipeline {
        Pipeline::spawn(
            EngineConfig::default(),
            Box::new(SilentSource),
            Box::new(NullTranscriber),
            Box::new(NullSink),
        )
        .unwrap()
    }

    #[test]
    fn test_spawn_rejects_invalid_config() {
        let config = EngineConfig {
            frame_size: 0,
            ..Default::default()
        };
        let result = Pipeline::spawn(
            config,
            Box::new(SilentSource),
            Box::new(NullTranscriber),
            Box::new(NullSink),
        );
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_activation_surface_drives_state() {
        let mut pipeline = test_pipeline();
        assert_eq!(pipeline.current_state(), ActivationState::Inactive);

        assert!(pipeline.activate());
        assert_eq!(pipeline.current_state(), ActivationState::Ready);

        assert!(pipeline.start_recording());
        assert_eq!(pipeline.current_state(), ActivationState::Recording);

        assert!(pipeline.pause_recording());
        assert_eq!(pipeline.current_state(), ActivationState::Paused);

        assert!(pipeline.deactivate());
        assert_eq!(pipeline.current_state(), ActivationState::Inactive);

        pipeline.shutdown();
    }

    #[test]
    fn test_illegal_transitions_are_noops() {
        let mut pipeline = test_pipeline();

        assert!(!pipeline.start_recording());
        assert!(!pipeline.pause_recording());
        assert!(!pipeline.deactivate());
        assert_eq!(pipeline.current_state(), ActivationState::Inactive);

        pipeline.shutdown();
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut pipeline = test_pipeline();
        pipeline.activate();
        pipeline.start_recording();

        pipeline.shutdown();
        assert_eq!(pipeline.current_state(), ActivationState::Inactive);
        pipeline.shutdown();
        pipeline.shutdown();
    }

    #[test]
    fn test_drop_shuts_down_cleanly() {
        let pipeline = test_pipeline();
        pipeline.activate();
        pipeline.start_recording();
        drop(pipeline);
    }

    #[test]
    fn test_reactivation_after_deactivate() {
        let mut pipeline = test_pipeline();

        pipeline.activate();
        pipeline.start_recording();
        pipeline.deactivate();
        assert_eq!(pipeline.current_state(), ActivationState::Inactive);

        // Workers span the process; a fresh activation cycle just works.
        assert!(pipeline.activate());
        assert!(pipeline.start_recording());
        assert_eq!(pipeline.current_state(), ActivationState::Recording);

        pipeline.shutdown();
    }
}
