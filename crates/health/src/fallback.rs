//! Fallback handler contract
//!
//! The registry maps each [`ServiceKind`](mandi_voice_core::ServiceKind) to
//! one handler with a single `invoke` method. Requests and values are closed
//! enums covering the pipeline stages plus a free-form query shape for
//! non-pipeline callers (price oracle, negotiation suggestions).

use async_trait::async_trait;
use std::sync::Arc;

use mandi_voice_core::{
    Detection, Error, Language, Result, SynthesizedAudio, Transcription, Translation,
};

/// Input handed to a fallback handler
#[derive(Debug, Clone)]
pub enum FallbackRequest {
    DetectLanguage {
        audio: Arc<[u8]>,
        sample_rate: u32,
    },
    Transcribe {
        audio: Arc<[u8]>,
        sample_rate: u32,
        language: Language,
    },
    Translate {
        text: String,
        source: Language,
        target: Language,
    },
    Synthesize {
        text: String,
        language: Language,
    },
    /// Non-pipeline callers: named operation with a JSON payload
    Query {
        operation: String,
        payload: serde_json::Value,
    },
}

/// Output produced by a fallback handler
#[derive(Debug, Clone)]
pub enum FallbackValue {
    Detection(Detection),
    Transcription(Transcription),
    Translation(Translation),
    Audio(SynthesizedAudio),
    Json(serde_json::Value),
}

/// Secondary handler invoked when a service's primary is unavailable or
/// fails with auto-fallback enabled
#[async_trait]
pub trait FallbackHandler: Send + Sync {
    async fn invoke(&self, request: FallbackRequest) -> Result<FallbackValue>;
}

impl FallbackValue {
    fn kind_name(&self) -> &'static str {
        match self {
            FallbackValue::Detection(_) => "detection",
            FallbackValue::Transcription(_) => "transcription",
            FallbackValue::Translation(_) => "translation",
            FallbackValue::Audio(_) => "synthesized audio",
            FallbackValue::Json(_) => "json",
        }
    }
}

fn unexpected(expected: &str, value: &FallbackValue) -> Error {
    Error::Service(format!(
        "fallback returned {} where {} was expected",
        value.kind_name(),
        expected
    ))
}

impl TryFrom<FallbackValue> for Detection {
    type Error = Error;

    fn try_from(value: FallbackValue) -> Result<Self> {
        match value {
            FallbackValue::Detection(d) => Ok(d),
            other => Err(unexpected("detection", &other)),
        }
    }
}

impl TryFrom<FallbackValue> for Transcription {
    type Error = Error;

    fn try_from(value: FallbackValue) -> Result<Self> {
        match value {
            FallbackValue::Transcription(t) => Ok(t),
            other => Err(unexpected("transcription", &other)),
        }
    }
}

impl TryFrom<FallbackValue> for Translation {
    type Error = Error;

    fn try_from(value: FallbackValue) -> Result<Self> {
        match value {
            FallbackValue::Translation(t) => Ok(t),
            other => Err(unexpected("translation", &other)),
        }
    }
}

impl TryFrom<FallbackValue> for SynthesizedAudio {
    type Error = Error;

    fn try_from(value: FallbackValue) -> Result<Self> {
        match value {
            FallbackValue::Audio(a) => Ok(a),
            other => Err(unexpected("synthesized audio", &other)),
        }
    }
}
