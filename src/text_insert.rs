//! Text injection at the current input focus
//!
//! The pipeline hands transcribed text to a `TextSink`; the shipped
//! implementation simulates keyboard input so the text lands wherever the
//! cursor currently is. Injection is best-effort: a failure is logged by
//! the caller and never disturbs the pipeline.

use std::thread;
use std::time::Duration;

/// Consumer of transcribed text.
pub trait TextSink: Send {
    /// Deliver one utterance of text at the current input focus.
    fn inject(&mut self, text: &str) -> Result<(), TextInjectError>;
}

/// Errors from a text injection attempt.
#[derive(Debug, thiserror::Error)]
pub enum TextInjectError {
    #[error("keyboard injection failed: {0}")]
    Keyboard(String),

    #[error("clipboard unavailable: {0}")]
    Clipboard(String),
}

/// Method used to insert text into the target application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertionMethod {
    /// Simulate keystrokes. Works almost everywhere, slower for long text.
    #[default]
    Typing,
    /// Put the text on the clipboard and send the platform paste chord.
    Paste,
}

impl InsertionMethod {
    /// Parse an insertion method name, defaulting to typing.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "paste" | "clipboard" => Self::Paste,
            _ => Self::Typing,
        }
    }
}

/// Configuration for the typing sink.
#[derive(Debug, Clone)]
pub struct InsertionConfig {
    /// How the text reaches the target application.
    pub method: InsertionMethod,
    /// Delay between keystrokes in milliseconds (typing method only).
    pub keystroke_delay_ms: u64,
    /// Delay before insertion starts, letting focus settle.
    pub initial_delay_ms: u64,
    /// Append a space after each utterance so consecutive segments don't
    /// run together at the cursor.
    pub append_space: bool,
}

impl Default for InsertionConfig {
    fn default() -> Self {
        Self {
            method: InsertionMethod::Typing,
            keystroke_delay_ms: 0,
            initial_delay_ms: 50,
            append_space: true,
        }
    }
}

/// Keyboard-simulation text sink backed by enigo.
pub struct TypingSink {
    config: InsertionConfig,
}

impl Default for TypingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl TypingSink {
    /// Create a sink with default configuration.
    pub fn new() -> Self {
        Self {
            config: InsertionConfig::default(),
        }
    }

    /// Create a sink with custom configuration.
    pub fn with_config(config: InsertionConfig) -> Self {
        Self { config }
    }

    fn type_text(&self, text: &str) -> Result<(), TextInjectError> {
        use enigo::{Enigo, Keyboard, Settings};

        let mut enigo = Enigo::new(&Settings::default())
            .map_err(|e| TextInjectError::Keyboard(format!("failed to initialise enigo: {e}")))?;

        if self.config.keystroke_delay_ms > 0 {
            for c in text.chars() {
                enigo
                    .text(&c.to_string())
                    .map_err(|e| TextInjectError::Keyboard(format!("typing '{c}': {e}")))?;
                thread::sleep(Duration::from_millis(self.config.keystroke_delay_ms));
            }
        } else {
            enigo
                .text(text)
                .map_err(|e| TextInjectError::Keyboard(e.to_string()))?;
        }

        tracing::debug!("typed {} characters", text.len());
        Ok(())
    }

    fn paste_text(&self, text: &str) -> Result<(), TextInjectError> {
        use enigo::{Direction, Enigo, Key, Keyboard, Settings};

        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| TextInjectError::Clipboard(e.to_string()))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| TextInjectError::Clipboard(e.to_string()))?;

        // Give the clipboard owner a moment before pasting.
        thread::sleep(Duration::from_millis(10));

        let mut enigo = Enigo::new(&Settings::default())
            .map_err(|e| TextInjectError::Keyboard(format!("failed to initialise enigo: {e}")))?;

        #[cfg(target_os = "macos")]
        let modifier = Key::Meta;
        #[cfg(not(target_os = "macos"))]
        let modifier = Key::Control;

        enigo
            .key(modifier, Direction::Press)
            .map_err(|e| TextInjectError::Keyboard(e.to_string()))?;
        let result = enigo
            .key(Key::Unicode('v'), Direction::Click)
            .map_err(|e| TextInjectError::Keyboard(e.to_string()));
        enigo
            .key(modifier, Direction::Release)
            .map_err(|e| TextInjectError::Keyboard(e.to_string()))?;
        result?;

        tracing::debug!("pasted {} characters", text.len());
        Ok(())
    }
}

impl TextSink for TypingSink {
    fn inject(&mut self, text: &str) -> Result<(), TextInjectError> {
        if text.is_empty() {
            return Ok(());
        }

        if self.config.initial_delay_ms > 0 {
            thread::sleep(Duration::from_millis(self.config.initial_delay_ms));
        }

        let padded;
        let text = if self.config.append_space {
            padded = format!("{text} ");
            &padded
        } else {
            text
        };

        match self.config.method {
            InsertionMethod::Typing => self.type_text(text),
            InsertionMethod::Paste => self.paste_text(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_method_parse() {
        assert_eq!(InsertionMethod::parse("typing"), InsertionMethod::Typing);
        assert_eq!(InsertionMethod::parse("paste"), InsertionMethod::Paste);
        assert_eq!(InsertionMethod::parse("clipboard"), InsertionMethod::Paste);
        assert_eq!(InsertionMethod::parse("PASTE"), InsertionMethod::Paste);
        assert_eq!(InsertionMethod::parse("anything"), InsertionMethod::Typing);
    }

    #[test]
    fn test_insertion_config_default() {
        let config = InsertionConfig::default();
        assert_eq!(config.method, InsertionMethod::Typing);
        assert_eq!(config.keystroke_delay_ms, 0);
        assert_eq!(config.initial_delay_ms, 50);
        assert!(config.append_space);
    }

    #[test]
    fn test_empty_text_is_noop() {
        // Must not touch the keyboard or clipboard at all.
        let mut sink = TypingSink::new();
        assert!(sink.inject("").is_ok());
    }

    #[test]
    fn test_with_config() {
        let sink = TypingSink::with_config(InsertionConfig {
            method: InsertionMethod::Paste,
            keystroke_delay_ms: 5,
            initial_delay_ms: 0,
            append_space: false,
        });
        assert_eq!(sink.config.method, InsertionMethod::Paste);
        assert_eq!(sink.config.keystroke_delay_ms, 5);
        assert!(!sink.config.append_space);
    }
}
