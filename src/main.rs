//! Command-line front end for the sotto pipeline
//!
//! Wires the real collaborators together: microphone capture, whisper
//! transcription, and keystroke injection. Activation is driven from stdin
//! so the pipeline can be exercised without a hotkey daemon:
//!
//! ```text
//! sotto ~/models/ggml-base.bin
//! > on      # activate
//! > rec     # start recording (speak; pauses cut segments)
//! > pause   # pause capture
//! > off     # deactivate
//! > quit
//! ```

use anyhow::{Context, Result};
use std::io::BufRead;
use std::path::PathBuf;

use sotto::audio::MicCapture;
use sotto::text_insert::TypingSink;
use sotto::whisper::WhisperTranscriber;
use sotto::{EngineConfig, Pipeline};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sotto=info".into()),
        )
        .init();

    let model_path: PathBuf = std::env::args_os()
        .nth(1)
        .context("usage: sotto <path-to-ggml-whisper-model>")?
        .into();

    // The capture stream must stay on this thread; only its ring-buffer
    // reader goes into the pipeline.
    let mic = MicCapture::open()?;
    let config = EngineConfig {
        sample_rate: mic.sample_rate(),
        channels: mic.channels(),
        ..EngineConfig::default()
    };

    let transcriber = WhisperTranscriber::new(&model_path)?;
    let mut pipeline = Pipeline::spawn(
        config,
        Box::new(mic.source()),
        Box::new(transcriber),
        Box::new(TypingSink::new()),
    )?;

    pipeline.on_state_change(|state| println!("state: {state}"));
    pipeline.on_status(|message| println!("{message}"));

    println!("commands: on | rec | pause | off | quit");
    for line in std::io::stdin().lock().lines() {
        match line?.trim() {
            "on" => {
                pipeline.activate();
            }
            "rec" => {
                pipeline.start_recording();
            }
            "pause" => {
                pipeline.pause_recording();
            }
            "off" => {
                pipeline.deactivate();
            }
            "quit" => break,
            "" => {}
            other => println!("unknown command: {other}"),
        }
    }

    pipeline.shutdown();
    Ok(())
}
