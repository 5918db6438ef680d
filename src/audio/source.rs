//! Audio source abstraction
//!
//! The segment collector pulls fixed-size frames of linear PCM through this
//! trait. The shipped implementation is `MicSource`; tests feed scripted
//! frames through the same seam.

/// A pull-based source of linear PCM audio frames.
pub trait AudioSource: Send {
    /// Read one frame of `frame_size` interleaved i16 samples.
    ///
    /// May block for up to roughly one frame duration while samples arrive.
    fn read_frame(&mut self, frame_size: usize) -> Result<Vec<i16>, AudioReadError>;
}

/// Errors from an audio source read.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AudioReadError {
    /// The capture device failed or disappeared.
    #[error("audio device failure: {0}")]
    Device(String),

    /// The stream stopped delivering samples in time.
    #[error("audio stream starved: wanted {wanted} samples, got {got}")]
    Starved { wanted: usize, got: usize },

    /// The source is closed and will not produce further frames.
    #[error("audio source closed")]
    Closed,
}
