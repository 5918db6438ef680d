//! Audio capture and measurement
//!
//! The microphone path is split in two so the cpal stream (which is not
//! `Send`) never has to cross threads: `MicCapture` owns the stream and
//! feeds a lock-free ring buffer from the audio callback, and `MicSource`
//! reads frames out of that buffer from the collector thread.

pub mod level;
pub mod mic;
pub mod ring_buffer;
pub mod source;

pub use mic::{MicCapture, MicSource};
pub use ring_buffer::PcmRingBuffer;
pub use source::{AudioReadError, AudioSource};
