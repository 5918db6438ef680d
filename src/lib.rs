//! Sotto - hands-free voice typing
//!
//! Captures microphone audio continuously, cuts it into utterance segments
//! at silence boundaries, transcribes each segment, and types the text at
//! the current input focus. A four-state activation machine gates the whole
//! flow; capture and transcription run as independent workers that react to
//! it.
//!
//! The embedding application drives the [`pipeline::Pipeline`] surface
//! (typically from a global hotkey handler or a tray menu) and supplies the
//! three collaborators at the trait seams: an [`audio::AudioSource`], a
//! [`transcribe::Transcriber`], and a [`text_insert::TextSink`]. Concrete
//! implementations ship for all three: cpal microphone capture, a whisper
//! backend (feature `whisper`), and an enigo typing sink.

pub mod audio;
mod collector;
pub mod config;
pub mod observer;
pub mod pipeline;
pub mod segment;
pub mod state;
pub mod text_insert;
pub mod transcribe;
#[cfg(feature = "whisper")]
pub mod whisper;
mod worker;

pub use config::{ConfigError, EngineConfig};
pub use pipeline::{Pipeline, PipelineError};
pub use state::{ActivationState, StateMachine};
