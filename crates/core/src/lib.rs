//! Core traits and types for the voice interaction core
//!
//! This crate provides foundational types used across all other crates:
//! - Language definitions (22 scheduled Indian languages + English)
//! - Utterance and audio types
//! - Error taxonomy
//! - Platform events and the best-effort event sink
//! - Exponential backoff retry engine
//! - Model adapter traits (language detection, STT, translation, TTS)

pub mod audio;
pub mod error;
pub mod events;
pub mod language;
pub mod retry;
pub mod service;
pub mod traits;

pub use audio::Utterance;
pub use error::{Error, Result};
pub use events::{EventSink, PlatformEvent, ScalingAction, SwitchEvent};
pub use language::Language;
pub use retry::{retry_if, retry_with_backoff, RetryConfig};
pub use service::{ServiceKind, ServiceStatus};
pub use traits::{
    Detection, LanguageDetector, SpeechSynthesizer, SpeechToText, SynthesizedAudio, Transcription,
    Translation, Translator,
};
