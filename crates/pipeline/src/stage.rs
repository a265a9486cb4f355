//! Pipeline stages and result types

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use mandi_voice_core::{Language, ServiceKind};

/// The four sequential processing steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    DetectLanguage,
    Transcribe,
    Translate,
    Synthesize,
}

impl Stage {
    /// All stages in execution order
    pub const ALL: [Stage; 4] = [
        Stage::DetectLanguage,
        Stage::Transcribe,
        Stage::Translate,
        Stage::Synthesize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::DetectLanguage => "detect_language",
            Stage::Transcribe => "transcribe",
            Stage::Translate => "translate",
            Stage::Synthesize => "synthesize",
        }
    }

    /// Service kind this stage depends on.
    ///
    /// Language detection shares the STT kind: it is typically the same
    /// model.
    pub fn service_kind(&self) -> ServiceKind {
        match self {
            Stage::DetectLanguage | Stage::Transcribe => ServiceKind::Stt,
            Stage::Translate => ServiceKind::Translation,
            Stage::Synthesize => ServiceKind::Tts,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a stage's output came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOrigin {
    /// The primary model adapter produced the output
    Primary,
    /// A registered fallback handler produced the output
    Fallback,
    /// The stage was skipped and a synthetic outcome recorded
    Skipped,
}

/// Outcome of one stage for one utterance
#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Number of attempts issued, 0 for skipped stages
    pub attempts: u32,
    pub confidence: Option<f32>,
    pub origin: StageOrigin,
    /// Last error, set when the stage ultimately failed
    pub error: Option<String>,
}

impl StageRecord {
    /// Synthetic record for a skipped stage
    pub fn skipped(stage: Stage, confidence: f32) -> Self {
        let now = Utc::now();
        Self {
            stage,
            started_at: now,
            ended_at: now,
            duration_ms: 0,
            attempts: 0,
            confidence: Some(confidence),
            origin: StageOrigin::Skipped,
            error: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate result of a pipeline run
#[derive(Clone, Serialize)]
pub struct VoiceResponse {
    /// Synthesized PCM16 audio; empty when a partial response was allowed
    pub audio: Vec<u8>,
    pub transcription: String,
    pub translation: String,
    pub source_language: Language,
    pub target_language: Language,
    /// End-to-end latency in milliseconds
    pub latency_ms: u64,
    pub stage_latencies: HashMap<Stage, u64>,
    pub stage_confidences: HashMap<Stage, f32>,
    pub stage_attempts: HashMap<Stage, u32>,
}

impl fmt::Debug for VoiceResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceResponse")
            .field("audio_len", &self.audio.len())
            .field("transcription", &self.transcription)
            .field("translation", &self.translation)
            .field("source_language", &self.source_language)
            .field("target_language", &self.target_language)
            .field("latency_ms", &self.latency_ms)
            .field("stage_latencies", &self.stage_latencies)
            .finish()
    }
}

impl VoiceResponse {
    /// Whether the response carries audio output
    pub fn has_audio(&self) -> bool {
        !self.audio.is_empty()
    }

    /// Attempts issued for a stage, if it ran
    pub fn attempt_count(&self, stage: Stage) -> Option<u32> {
        self.stage_attempts.get(&stage).copied()
    }
}
