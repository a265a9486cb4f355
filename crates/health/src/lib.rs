//! Service health tracking and graceful degradation
//!
//! The [`HealthController`] owns a per-service state machine and the
//! fallback handler registry. Callers route external calls through
//! [`HealthController::execute_with_fallback`] so every success and failure
//! feeds the health view, and unavailable services are served by their
//! registered fallbacks instead of being hammered.

mod controller;
mod fallback;

pub use controller::{
    FeatureAvailability, HealthController, HealthPolicy, Outcome, ServiceHealthSnapshot,
    SystemHealth, SystemStatus,
};
pub use fallback::{FallbackHandler, FallbackRequest, FallbackValue};
