//! Deterministic demo adapters
//!
//! In-process implementations of the four model adapter traits, used by
//! tests and demo deployments where no real models are available. Outputs
//! are deterministic functions of the input so assertions stay stable.

use async_trait::async_trait;

use mandi_voice_core::{
    Detection, Error, Language, LanguageDetector, Result, SpeechSynthesizer, SpeechToText,
    SynthesizedAudio, Transcription, Translation, Translator,
};

/// Bytes per PCM16 sample
const PCM16_SAMPLE_BYTES: u64 = 2;

/// Reports a fixed language for every input
#[derive(Debug, Clone)]
pub struct DemoLanguageDetector {
    language: Language,
}

impl DemoLanguageDetector {
    pub fn new(language: Language) -> Self {
        Self { language }
    }
}

impl Default for DemoLanguageDetector {
    fn default() -> Self {
        Self::new(Language::Hindi)
    }
}

#[async_trait]
impl LanguageDetector for DemoLanguageDetector {
    async fn detect(&self, audio: &[u8], _sample_rate: u32) -> Result<Detection> {
        if audio.is_empty() {
            return Err(Error::Validation("audio buffer is empty".into()));
        }
        Ok(Detection {
            language: self.language,
            confidence: 0.92,
        })
    }

    fn model_name(&self) -> &str {
        "demo-langid"
    }
}

/// Produces a transcript describing the audio it was given
#[derive(Debug, Clone, Default)]
pub struct DemoSpeechToText;

#[async_trait]
impl SpeechToText for DemoSpeechToText {
    async fn transcribe(
        &self,
        audio: &[u8],
        sample_rate: u32,
        language: Language,
    ) -> Result<Transcription> {
        if audio.is_empty() {
            return Err(Error::Validation("audio buffer is empty".into()));
        }
        let ms = if sample_rate == 0 {
            0
        } else {
            audio.len() as u64 * 1_000 / (PCM16_SAMPLE_BYTES * sample_rate as u64)
        };
        Ok(Transcription {
            text: format!("demo transcript of {} ms {} speech", ms, language.display_name()),
            confidence: 0.9,
            language,
        })
    }

    fn model_name(&self) -> &str {
        "demo-stt"
    }
}

/// Tags text with the target language instead of translating it
#[derive(Debug, Clone, Default)]
pub struct DemoTranslator;

#[async_trait]
impl Translator for DemoTranslator {
    async fn translate(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> Result<Translation> {
        let (text, confidence) = if source == target {
            (text.to_string(), 1.0)
        } else {
            (format!("[{}] {}", target.code(), text), 0.88)
        };
        Ok(Translation {
            text,
            confidence,
            source,
            target,
        })
    }

    fn model_name(&self) -> &str {
        "demo-translate"
    }
}

/// Synthesizes a sine tone sized to the text length
#[derive(Debug, Clone)]
pub struct DemoSpeechSynthesizer {
    sample_rate: u32,
}

impl DemoSpeechSynthesizer {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl Default for DemoSpeechSynthesizer {
    fn default() -> Self {
        Self::new(16_000)
    }
}

#[async_trait]
impl SpeechSynthesizer for DemoSpeechSynthesizer {
    async fn synthesize(&self, text: &str, _language: Language) -> Result<SynthesizedAudio> {
        if text.is_empty() {
            return Err(Error::Validation("text is empty".into()));
        }

        // 60ms per character, clamped to keep demo output bounded
        let duration_ms = (text.chars().count() as u64 * 60).clamp(250, 4_000);
        let samples = (self.sample_rate as u64 * duration_ms / 1_000) as usize;

        let mut audio = Vec::with_capacity(samples * 2);
        for i in 0..samples {
            let t = i as f32 / self.sample_rate as f32;
            let value = (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.3;
            let pcm = (value * 32767.0) as i16;
            audio.extend_from_slice(&pcm.to_le_bytes());
        }

        Ok(SynthesizedAudio {
            audio,
            sample_rate: self.sample_rate,
            duration_secs: duration_ms as f32 / 1_000.0,
        })
    }

    fn model_name(&self) -> &str {
        "demo-tts"
    }
}
