//! Configuration for the voice interaction core
//!
//! Settings are layered: built-in defaults, then `config/default.yaml`,
//! then an optional per-environment file, then `MANDI_*` environment
//! variables. Every section has sensible defaults so the core runs with no
//! configuration at all.

mod settings;

pub use settings::{
    load_settings, AutoscaleSettings, HealthSettings, PipelineSettings, RuntimeEnvironment,
    SessionSettings, Settings,
};

use thiserror::Error;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
