//! Model adapter contracts
//!
//! One trait per externally dependent model. Implementations signal
//! transient vs permanent failures through the error taxonomy so the retry
//! engine and the health controller can tell them apart.

use async_trait::async_trait;

use crate::error::Result;
use crate::language::Language;

/// Result from language identification
#[derive(Debug, Clone)]
pub struct Detection {
    pub language: Language,
    /// 0.0 - 1.0
    pub confidence: f32,
}

/// Result from speech-to-text
#[derive(Debug, Clone)]
pub struct Transcription {
    pub text: String,
    /// 0.0 - 1.0
    pub confidence: f32,
    pub language: Language,
}

/// Result from text translation
#[derive(Debug, Clone)]
pub struct Translation {
    pub text: String,
    /// 0.0 - 1.0
    pub confidence: f32,
    pub source: Language,
    pub target: Language,
}

/// Result from speech synthesis
#[derive(Clone)]
pub struct SynthesizedAudio {
    /// PCM16 little-endian mono
    pub audio: Vec<u8>,
    pub sample_rate: u32,
    pub duration_secs: f32,
}

impl std::fmt::Debug for SynthesizedAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesizedAudio")
            .field("audio_len", &self.audio.len())
            .field("sample_rate", &self.sample_rate)
            .field("duration_secs", &self.duration_secs)
            .finish()
    }
}

/// Spoken language identification
#[async_trait]
pub trait LanguageDetector: Send + Sync {
    /// Identify the language spoken in the audio
    async fn detect(&self, audio: &[u8], sample_rate: u32) -> Result<Detection>;

    /// Model name for logging
    fn model_name(&self) -> &str;
}

/// Speech-to-text
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe the audio in the given language
    async fn transcribe(
        &self,
        audio: &[u8],
        sample_rate: u32,
        language: Language,
    ) -> Result<Transcription>;

    /// Model name for logging
    fn model_name(&self) -> &str;
}

/// Text translation
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate text between two supported languages
    async fn translate(&self, text: &str, source: Language, target: Language)
        -> Result<Translation>;

    /// Model name for logging
    fn model_name(&self) -> &str;
}

/// Text-to-speech
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize speech for the text in the given language
    async fn synthesize(&self, text: &str, language: Language) -> Result<SynthesizedAudio>;

    /// Model name for logging
    fn model_name(&self) -> &str;
}
