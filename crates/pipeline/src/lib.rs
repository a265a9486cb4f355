//! Voice pipeline orchestrator
//!
//! Coordinates the four sequential stages that turn an utterance into a
//! translated spoken reply: detect language, transcribe, translate,
//! synthesize. Each executed stage runs under per-stage retry and the
//! health controller's fallback dispatch.

pub mod adapters;
mod error;
mod orchestrator;
mod stage;

pub use error::PipelineError;
pub use orchestrator::{PipelineConfig, ProcessOptions, StageBudgets, VoicePipeline};
pub use stage::{Stage, StageOrigin, StageRecord, VoiceResponse};
