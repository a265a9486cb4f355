//! Utterance types
//!
//! An [`Utterance`] is one inbound voice request. Audio is PCM16
//! little-endian mono; 16 kHz is assumed at the API edge.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::language::Language;

/// Bytes per PCM16 sample
const PCM16_SAMPLE_BYTES: usize = 2;

/// Immutable input record for one voice request.
///
/// Created at the API edge and consumed exactly once by the pipeline.
#[derive(Clone)]
pub struct Utterance {
    /// Raw PCM16 little-endian mono audio
    pub audio: Arc<[u8]>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Source language, when the caller already knows it
    pub source_hint: Option<Language>,
    /// Language the reply must be spoken in
    pub target: Language,
    /// Conversation this utterance belongs to, if any
    pub session: Option<Uuid>,
    /// When the request entered the system
    pub received_at: DateTime<Utc>,
}

impl std::fmt::Debug for Utterance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Utterance")
            .field("audio_len", &self.audio.len())
            .field("sample_rate", &self.sample_rate)
            .field("source_hint", &self.source_hint)
            .field("target", &self.target)
            .field("session", &self.session)
            .field("received_at", &self.received_at)
            .finish()
    }
}

impl Utterance {
    /// Create a new utterance from raw PCM16 audio
    pub fn new(audio: Vec<u8>, sample_rate: u32, target: Language) -> Self {
        Self {
            audio: audio.into(),
            sample_rate,
            source_hint: None,
            target,
            session: None,
            received_at: Utc::now(),
        }
    }

    /// Set a known source language, skipping detection downstream
    pub fn with_source_hint(mut self, source: Language) -> Self {
        self.source_hint = Some(source);
        self
    }

    /// Attach a conversation handle
    pub fn with_session(mut self, session: Uuid) -> Self {
        self.session = Some(session);
        self
    }

    /// Audio duration derived from the sample count
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let samples = self.audio.len() / PCM16_SAMPLE_BYTES;
        Duration::from_secs_f64(samples as f64 / self.sample_rate as f64)
    }

    /// Audio duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        self.duration().as_millis() as u64
    }

    /// Whether the audio buffer is empty
    pub fn is_empty(&self) -> bool {
        self.audio.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_from_sample_count() {
        // 1.5s at 16kHz mono PCM16 = 48000 bytes
        let utterance = Utterance::new(vec![0u8; 48_000], 16_000, Language::Telugu);
        assert_eq!(utterance.duration_ms(), 1_500);
    }

    #[test]
    fn test_empty_audio() {
        let utterance = Utterance::new(Vec::new(), 16_000, Language::Hindi);
        assert!(utterance.is_empty());
        assert_eq!(utterance.duration(), Duration::ZERO);
    }

    #[test]
    fn test_builder_fields() {
        let session = Uuid::new_v4();
        let utterance = Utterance::new(vec![0u8; 640], 16_000, Language::English)
            .with_source_hint(Language::Hindi)
            .with_session(session);
        assert_eq!(utterance.source_hint, Some(Language::Hindi));
        assert_eq!(utterance.session, Some(session));
    }
}
