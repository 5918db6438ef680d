//! Transcription engine seam
//!
//! The pipeline treats transcription as a synchronous call: a finite
//! segment of audio in, text out. The engine is assumed stateless across
//! calls, which is why a failed segment is dropped rather than retried:
//! retrying would only replay the same stale audio.

use crate::segment::Segment;

/// A speech-to-text engine.
pub trait Transcriber: Send {
    /// Transcribe one segment in the given language.
    ///
    /// This is the dominant latency in the pipeline; implementations may
    /// block for the duration of inference. No pipeline lock is held while
    /// this runs.
    fn transcribe(&mut self, segment: &Segment, language: &str)
        -> Result<String, TranscriptionError>;
}

/// Errors from a transcription attempt. Always non-fatal to the pipeline;
/// the offending segment is discarded and the worker moves on.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    /// The segment's audio could not be loaded or decoded.
    #[error("failed to load segment audio: {0}")]
    Audio(String),

    /// The engine itself failed.
    #[error("transcription engine failure: {0}")]
    Engine(String),
}
