//! Pipeline errors

use thiserror::Error;

use mandi_voice_core::Error as CoreError;

use crate::stage::Stage;

/// Errors surfaced by the pipeline entry point
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed input rejected before any stage ran
    #[error("validation error: {0}")]
    Validation(String),

    /// A stage exhausted its retries and fallbacks
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: CoreError,
    },

    /// The caller aborted the request
    #[error("pipeline cancelled")]
    Cancelled,
}

impl PipelineError {
    pub(crate) fn from_stage(stage: Stage, source: CoreError) -> Self {
        if source.is_cancelled() {
            PipelineError::Cancelled
        } else {
            PipelineError::Stage { stage, source }
        }
    }
}
