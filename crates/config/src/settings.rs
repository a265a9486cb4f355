//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use mandi_voice_core::{Language, ServiceKind};

use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation, warnings only
    #[default]
    Development,
    /// Staging mode - stricter validation
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Voice pipeline configuration
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Conversation manager configuration
    #[serde(default)]
    pub session: SessionSettings,

    /// Health and degradation configuration
    #[serde(default)]
    pub health: HealthSettings,

    /// Autoscaler configuration
    #[serde(default)]
    pub autoscale: AutoscaleSettings,
}

/// Voice pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Allow a response without audio when only synthesis failed
    #[serde(default)]
    pub allow_partial: bool,

    /// Per-stage retry attempts
    #[serde(default = "default_stage_attempts")]
    pub max_attempts: u32,

    /// Base retry delay in milliseconds
    #[serde(default = "default_stage_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Language detection budget in milliseconds
    #[serde(default = "default_detect_budget_ms")]
    pub detect_budget_ms: u64,

    /// Transcription budget in milliseconds
    #[serde(default = "default_transcribe_budget_ms")]
    pub transcribe_budget_ms: u64,

    /// Translation budget in milliseconds
    #[serde(default = "default_translate_budget_ms")]
    pub translate_budget_ms: u64,

    /// Synthesis budget in milliseconds
    #[serde(default = "default_synthesize_budget_ms")]
    pub synthesize_budget_ms: u64,

    /// End-to-end budget in milliseconds
    #[serde(default = "default_total_budget_ms")]
    pub total_budget_ms: u64,

    /// Source language assumed when detection is skipped without a hint
    #[serde(default = "default_fallback_source")]
    pub fallback_source: Language,
}

fn default_stage_attempts() -> u32 {
    3
}

fn default_stage_base_delay_ms() -> u64 {
    500
}

fn default_detect_budget_ms() -> u64 {
    2_000
}

fn default_transcribe_budget_ms() -> u64 {
    3_000
}

fn default_translate_budget_ms() -> u64 {
    2_000
}

fn default_synthesize_budget_ms() -> u64 {
    2_000
}

fn default_total_budget_ms() -> u64 {
    8_000
}

fn default_fallback_source() -> Language {
    Language::Hindi
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            allow_partial: false,
            max_attempts: default_stage_attempts(),
            base_delay_ms: default_stage_base_delay_ms(),
            detect_budget_ms: default_detect_budget_ms(),
            transcribe_budget_ms: default_transcribe_budget_ms(),
            translate_budget_ms: default_translate_budget_ms(),
            synthesize_budget_ms: default_synthesize_budget_ms(),
            total_budget_ms: default_total_budget_ms(),
            fallback_source: default_fallback_source(),
        }
    }
}

/// Conversation manager settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Maximum concurrent active conversations per user
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_max_concurrent() -> usize {
    5
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
        }
    }
}

/// Health and degradation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSettings {
    /// Consecutive failures before a service is marked unavailable
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    /// Seconds after which a stale failure streak is forgotten
    #[serde(default = "default_failure_window_secs")]
    pub failure_window_secs: u64,

    /// Automatically dispatch registered fallbacks on primary failure
    #[serde(default = "default_auto_fallback")]
    pub auto_fallback: bool,

    /// Services the system cannot function without
    #[serde(default = "default_critical_services")]
    pub critical: Vec<ServiceKind>,
}

fn default_max_failures() -> u32 {
    3
}

fn default_failure_window_secs() -> u64 {
    300
}

fn default_auto_fallback() -> bool {
    true
}

fn default_critical_services() -> Vec<ServiceKind> {
    vec![ServiceKind::Database]
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
            failure_window_secs: default_failure_window_secs(),
            auto_fallback: default_auto_fallback(),
            critical: default_critical_services(),
        }
    }
}

/// Autoscaler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoscaleSettings {
    #[serde(default = "default_min_instances")]
    pub min_instances: usize,

    #[serde(default = "default_max_instances")]
    pub max_instances: usize,

    /// Load at or above which the pool grows (0-1)
    #[serde(default = "default_scale_up_threshold")]
    pub scale_up_threshold: f64,

    /// Load at or below which the pool shrinks (0-1)
    #[serde(default = "default_scale_down_threshold")]
    pub scale_down_threshold: f64,

    /// Minimum seconds between executed scaling actions
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Seconds between load checks
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// Prometheus server URL for host metrics
    #[serde(default = "default_prometheus_url")]
    pub prometheus_url: String,
}

fn default_min_instances() -> usize {
    1
}

fn default_max_instances() -> usize {
    10
}

fn default_scale_up_threshold() -> f64 {
    0.80
}

fn default_scale_down_threshold() -> f64 {
    0.30
}

fn default_cooldown_secs() -> u64 {
    300
}

fn default_check_interval_secs() -> u64 {
    60
}

fn default_prometheus_url() -> String {
    std::env::var("PROMETHEUS_URL").unwrap_or_else(|_| "http://localhost:9090".to_string())
}

impl Default for AutoscaleSettings {
    fn default() -> Self {
        Self {
            min_instances: default_min_instances(),
            max_instances: default_max_instances(),
            scale_up_threshold: default_scale_up_threshold(),
            scale_down_threshold: default_scale_down_threshold(),
            cooldown_secs: default_cooldown_secs(),
            check_interval_secs: default_check_interval_secs(),
            prometheus_url: default_prometheus_url(),
        }
    }
}

impl Settings {
    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.autoscale.min_instances > self.autoscale.max_instances {
            return Err(ConfigError::Invalid(format!(
                "min_instances ({}) exceeds max_instances ({})",
                self.autoscale.min_instances, self.autoscale.max_instances
            )));
        }
        if self.autoscale.scale_down_threshold >= self.autoscale.scale_up_threshold {
            return Err(ConfigError::Invalid(
                "scale_down_threshold must be below scale_up_threshold".to_string(),
            ));
        }
        if self.session.max_concurrent == 0 {
            return Err(ConfigError::Invalid(
                "session.max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.pipeline.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load settings from files and environment.
///
/// Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder().add_source(File::with_name("config/default").required(false));

    if let Some(env) = env {
        builder = builder.add_source(File::with_name(&format!("config/{}", env)).required(false));
    }

    let config = builder
        .add_source(Environment::with_prefix("MANDI").separator("__"))
        .build()?;

    let settings: Settings = config.try_deserialize()?;
    settings.validate()?;

    tracing::debug!(environment = ?settings.environment, "settings loaded");
    Ok(settings)
}
