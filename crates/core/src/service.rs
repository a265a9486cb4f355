//! Externally dependent service kinds and their status vocabulary

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed enumeration of externally dependent capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    /// Speech-to-text (language detection shares this model)
    Stt,
    Translation,
    /// Text-to-speech
    Tts,
    /// Language model for negotiation suggestions
    Llm,
    PriceOracle,
    VoiceBiometric,
    Database,
    Cache,
}

impl ServiceKind {
    /// All recognized service kinds
    pub const ALL: [ServiceKind; 8] = [
        ServiceKind::Stt,
        ServiceKind::Translation,
        ServiceKind::Tts,
        ServiceKind::Llm,
        ServiceKind::PriceOracle,
        ServiceKind::VoiceBiometric,
        ServiceKind::Database,
        ServiceKind::Cache,
    ];

    /// Stable identifier used in logs and metrics labels
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Stt => "stt",
            ServiceKind::Translation => "translation",
            ServiceKind::Tts => "tts",
            ServiceKind::Llm => "llm",
            ServiceKind::PriceOracle => "price_oracle",
            ServiceKind::VoiceBiometric => "voice_biometric",
            ServiceKind::Database => "database",
            ServiceKind::Cache => "cache",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health status of a single service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    #[default]
    Healthy,
    Degraded,
    Unavailable,
}

impl ServiceStatus {
    /// Available means the service can still serve requests
    pub fn is_available(&self) -> bool {
        matches!(self, ServiceStatus::Healthy | ServiceStatus::Degraded)
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceStatus::Healthy => "healthy",
            ServiceStatus::Degraded => "degraded",
            ServiceStatus::Unavailable => "unavailable",
        };
        f.write_str(s)
    }
}
