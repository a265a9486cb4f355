//! Health controller
//!
//! Per-service state machine: `Healthy` until failures are recorded,
//! `Degraded` below the failure ceiling, `Unavailable` at or above it. A
//! recorded success resets the streak. All mutations are serialized behind
//! one lock so readers always observe a consistent counter/status pair.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use mandi_voice_config::HealthSettings;
use mandi_voice_core::{Error, EventSink, PlatformEvent, Result, ServiceKind, ServiceStatus};

use crate::fallback::{FallbackHandler, FallbackRequest, FallbackValue};

/// Degradation policy
#[derive(Debug, Clone)]
pub struct HealthPolicy {
    /// Consecutive failures before a service is marked unavailable
    pub max_failures: u32,
    /// A failure streak older than this is forgotten before counting anew
    pub failure_window: Duration,
    /// Automatically dispatch registered fallbacks on primary failure
    pub auto_fallback: bool,
    /// Services the system cannot function without
    pub critical: Vec<ServiceKind>,
    /// Human-readable description of each declared fallback
    pub fallback_descriptions: HashMap<ServiceKind, String>,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        let fallback_descriptions = [
            (ServiceKind::Stt, "Use cached transcriptions or text input"),
            (
                ServiceKind::Translation,
                "Use cached translations or show original text",
            ),
            (ServiceKind::Tts, "Show text output instead of audio"),
            (ServiceKind::Llm, "Use template-based suggestions"),
            (
                ServiceKind::PriceOracle,
                "Use cached price data or demo data",
            ),
            (ServiceKind::VoiceBiometric, "Use PIN-based authentication"),
            (
                ServiceKind::Cache,
                "Use in-memory cache or direct database access",
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k, v.to_string()))
        .collect();

        Self {
            max_failures: 3,
            failure_window: Duration::from_secs(300),
            auto_fallback: true,
            critical: vec![ServiceKind::Database],
            fallback_descriptions,
        }
    }
}

impl From<&HealthSettings> for HealthPolicy {
    fn from(settings: &HealthSettings) -> Self {
        Self {
            max_failures: settings.max_failures,
            failure_window: Duration::from_secs(settings.failure_window_secs),
            auto_fallback: settings.auto_fallback,
            critical: settings.critical.clone(),
            ..Self::default()
        }
    }
}

/// Mutable per-service state
#[derive(Debug, Clone)]
struct KindHealth {
    status: ServiceStatus,
    failures: u32,
    last_error: Option<String>,
    last_check: DateTime<Utc>,
}

impl KindHealth {
    fn initial() -> Self {
        Self {
            status: ServiceStatus::Healthy,
            failures: 0,
            last_error: None,
            last_check: Utc::now(),
        }
    }
}

/// Read-only view of one service's health
#[derive(Debug, Clone, serde::Serialize)]
pub struct ServiceHealthSnapshot {
    pub kind: ServiceKind,
    pub status: ServiceStatus,
    pub failures: u32,
    pub last_error: Option<String>,
    pub last_check: DateTime<Utc>,
    pub fallback_available: bool,
    pub fallback_description: Option<String>,
}

/// Overall system status
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemStatus {
    Healthy,
    Degraded,
    Critical,
}

/// Aggregate health report
#[derive(Debug, Clone, serde::Serialize)]
pub struct SystemHealth {
    pub overall: SystemStatus,
    pub healthy_services: usize,
    pub degraded_services: usize,
    pub unavailable_services: usize,
    pub services: Vec<ServiceHealthSnapshot>,
    pub generated_at: DateTime<Utc>,
}

/// Feature availability derived from service health
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct FeatureAvailability {
    pub voice_input: bool,
    pub voice_output: bool,
    pub translation: bool,
    pub price_check: bool,
    pub negotiation_assistance: bool,
    pub voice_authentication: bool,
    pub data_persistence: bool,
    pub caching: bool,
}

/// Where an [`execute_with_fallback`](HealthController::execute_with_fallback)
/// result came from
#[derive(Debug)]
pub enum Outcome<T> {
    Primary(T),
    Fallback(FallbackValue),
}

/// Tracks per-service availability and dispatches fallbacks
pub struct HealthController {
    policy: HealthPolicy,
    health: RwLock<HashMap<ServiceKind, KindHealth>>,
    fallbacks: RwLock<HashMap<ServiceKind, Arc<dyn FallbackHandler>>>,
    events: EventSink,
}

impl HealthController {
    pub fn new(policy: HealthPolicy, events: EventSink) -> Self {
        let health = ServiceKind::ALL
            .iter()
            .map(|&kind| (kind, KindHealth::initial()))
            .collect();

        Self {
            policy,
            health: RwLock::new(health),
            fallbacks: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Event sink this controller reports into
    pub fn events(&self) -> &EventSink {
        &self.events
    }

    /// Register the fallback handler for a service
    pub fn register_fallback(&self, kind: ServiceKind, handler: Arc<dyn FallbackHandler>) {
        self.fallbacks.write().insert(kind, handler);
        tracing::info!(service = %kind, "registered fallback handler");
    }

    /// Record a failed call against a service
    pub fn record_failure(&self, kind: ServiceKind, error: &Error) {
        let now = Utc::now();
        let (old_status, new_status) = {
            let mut health = self.health.write();
            let entry = health.entry(kind).or_insert_with(KindHealth::initial);

            // A streak that went quiet for longer than the window starts over
            let window = chrono::Duration::from_std(self.policy.failure_window)
                .unwrap_or_else(|_| chrono::Duration::seconds(300));
            if entry.failures > 0 && now - entry.last_check > window {
                entry.failures = 0;
            }

            let old_status = entry.status;
            entry.failures += 1;
            entry.last_error = Some(error.to_string());
            entry.last_check = now;
            entry.status = if entry.failures >= self.policy.max_failures {
                ServiceStatus::Unavailable
            } else {
                ServiceStatus::Degraded
            };
            (old_status, entry.status)
        };

        metrics::counter!("service_failures_total", "service" => kind.as_str()).increment(1);

        match new_status {
            ServiceStatus::Unavailable => {
                tracing::error!(service = %kind, error = %error, "service marked unavailable");
            },
            _ => {
                tracing::warn!(service = %kind, error = %error, "service degraded");
            },
        }

        if old_status != new_status {
            self.events.emit(PlatformEvent::ServiceStatusChanged {
                kind,
                old: old_status,
                new: new_status,
            });

            if new_status == ServiceStatus::Unavailable && self.policy.critical.contains(&kind) {
                tracing::error!(service = %kind, "critical service unavailable");
                self.events.emit(PlatformEvent::CriticalEvent { service: kind });
            }
        }
    }

    /// Record a successful call against a service
    pub fn record_success(&self, kind: ServiceKind) {
        let (old_status, recovered_after) = {
            let mut health = self.health.write();
            let entry = health.entry(kind).or_insert_with(KindHealth::initial);
            let old_status = entry.status;
            let failures = entry.failures;
            entry.failures = 0;
            entry.status = ServiceStatus::Healthy;
            entry.last_error = None;
            entry.last_check = Utc::now();
            (old_status, failures)
        };

        if recovered_after > 0 {
            tracing::info!(
                service = %kind,
                failures = recovered_after,
                "service recovered after failures"
            );
        }

        if old_status != ServiceStatus::Healthy {
            self.events.emit(PlatformEvent::ServiceStatusChanged {
                kind,
                old: old_status,
                new: ServiceStatus::Healthy,
            });
        }
    }

    /// Return a service to its initial state
    pub fn reset(&self, kind: ServiceKind) {
        let old_status = {
            let mut health = self.health.write();
            let entry = health.entry(kind).or_insert_with(KindHealth::initial);
            let old = entry.status;
            *entry = KindHealth::initial();
            old
        };

        tracing::info!(service = %kind, "service health reset");
        if old_status != ServiceStatus::Healthy {
            self.events.emit(PlatformEvent::ServiceStatusChanged {
                kind,
                old: old_status,
                new: ServiceStatus::Healthy,
            });
        }
    }

    /// Current status of a service
    pub fn status(&self, kind: ServiceKind) -> ServiceStatus {
        self.health
            .read()
            .get(&kind)
            .map(|h| h.status)
            .unwrap_or_default()
    }

    /// Whether a service can still serve requests (healthy or degraded)
    pub fn is_available(&self, kind: ServiceKind) -> bool {
        self.status(kind).is_available()
    }

    /// Whether a fallback handler is registered for the service
    pub fn has_fallback(&self, kind: ServiceKind) -> bool {
        self.fallbacks.read().contains_key(&kind)
    }

    /// Execute an operation with health accounting and automatic fallback.
    ///
    /// An unavailable service skips the primary entirely. A primary success
    /// records a success; a primary failure records a failure and, when
    /// auto-fallback is on and a handler is registered, dispatches the
    /// fallback (handler errors propagate verbatim). Cancellations and
    /// validation errors propagate without touching health state.
    pub async fn execute_with_fallback<T, F, Fut>(
        &self,
        kind: ServiceKind,
        primary: F,
        request: FallbackRequest,
    ) -> Result<Outcome<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.is_available(kind) {
            tracing::warn!(service = %kind, "service unavailable, using fallback");
            let value = self.invoke_fallback(kind, request).await?;
            return Ok(Outcome::Fallback(value));
        }

        match primary().await {
            Ok(value) => {
                self.record_success(kind);
                Ok(Outcome::Primary(value))
            },
            Err(e) if e.is_cancelled() || e.is_validation() => Err(e),
            Err(e) => {
                self.record_failure(kind, &e);

                if self.policy.auto_fallback && self.has_fallback(kind) {
                    tracing::warn!(
                        service = %kind,
                        error = %e,
                        "primary operation failed, attempting fallback"
                    );
                    let value = self.invoke_fallback(kind, request).await?;
                    Ok(Outcome::Fallback(value))
                } else {
                    Err(e)
                }
            },
        }
    }

    async fn invoke_fallback(
        &self,
        kind: ServiceKind,
        request: FallbackRequest,
    ) -> Result<FallbackValue> {
        let handler = self
            .fallbacks
            .read()
            .get(&kind)
            .cloned()
            .ok_or_else(|| {
                Error::Service(format!("no fallback handler registered for {}", kind))
            })?;

        metrics::counter!("service_fallbacks_total", "service" => kind.as_str()).increment(1);
        handler.invoke(request).await
    }

    /// Aggregate system health view
    pub fn system_health(&self) -> SystemHealth {
        let health = self.health.read();

        let services: Vec<ServiceHealthSnapshot> = ServiceKind::ALL
            .iter()
            .filter_map(|&kind| {
                health.get(&kind).map(|h| ServiceHealthSnapshot {
                    kind,
                    status: h.status,
                    failures: h.failures,
                    last_error: h.last_error.clone(),
                    last_check: h.last_check,
                    fallback_available: self.policy.fallback_descriptions.contains_key(&kind),
                    fallback_description: self.policy.fallback_descriptions.get(&kind).cloned(),
                })
            })
            .collect();
        drop(health);

        let healthy = services
            .iter()
            .filter(|s| s.status == ServiceStatus::Healthy)
            .count();
        let degraded = services
            .iter()
            .filter(|s| s.status == ServiceStatus::Degraded)
            .count();
        let unavailable = services
            .iter()
            .filter(|s| s.status == ServiceStatus::Unavailable)
            .count();

        let critical_down = services.iter().any(|s| {
            s.status == ServiceStatus::Unavailable && self.policy.critical.contains(&s.kind)
        });

        let overall = if critical_down {
            SystemStatus::Critical
        } else if unavailable > 0 || degraded > 0 {
            SystemStatus::Degraded
        } else {
            SystemStatus::Healthy
        };

        SystemHealth {
            overall,
            healthy_services: healthy,
            degraded_services: degraded,
            unavailable_services: unavailable,
            services,
            generated_at: Utc::now(),
        }
    }

    /// Feature availability derived from service status
    pub fn available_features(&self) -> FeatureAvailability {
        FeatureAvailability {
            voice_input: self.is_available(ServiceKind::Stt),
            voice_output: self.is_available(ServiceKind::Tts),
            translation: self.is_available(ServiceKind::Translation),
            price_check: self.is_available(ServiceKind::PriceOracle),
            negotiation_assistance: self.is_available(ServiceKind::Llm),
            voice_authentication: self.is_available(ServiceKind::VoiceBiometric),
            data_persistence: self.is_available(ServiceKind::Database),
            caching: self.is_available(ServiceKind::Cache),
        }
    }

    /// Critical services currently unavailable
    pub fn unavailable_critical_services(&self) -> Vec<ServiceKind> {
        let health = self.health.read();
        self.policy
            .critical
            .iter()
            .copied()
            .filter(|kind| {
                health
                    .get(kind)
                    .map(|h| h.status == ServiceStatus::Unavailable)
                    .unwrap_or(false)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mandi_voice_core::{Language, Transcription};

    fn controller() -> HealthController {
        HealthController::new(HealthPolicy::default(), EventSink::default())
    }

    fn transient() -> Error {
        Error::Transient("connection refused".into())
    }

    struct CachedTranscript;

    #[async_trait]
    impl FallbackHandler for CachedTranscript {
        async fn invoke(&self, _request: FallbackRequest) -> Result<FallbackValue> {
            Ok(FallbackValue::Transcription(Transcription {
                text: "cached transcript".into(),
                confidence: 0.5,
                language: Language::Hindi,
            }))
        }
    }

    #[test]
    fn test_initial_state_is_healthy() {
        let controller = controller();
        for kind in ServiceKind::ALL {
            assert_eq!(controller.status(kind), ServiceStatus::Healthy);
            assert!(controller.is_available(kind));
        }
    }

    #[test]
    fn test_failures_degrade_then_unavailable() {
        let controller = controller();

        controller.record_failure(ServiceKind::Stt, &transient());
        assert_eq!(controller.status(ServiceKind::Stt), ServiceStatus::Degraded);

        controller.record_failure(ServiceKind::Stt, &transient());
        assert_eq!(controller.status(ServiceKind::Stt), ServiceStatus::Degraded);

        controller.record_failure(ServiceKind::Stt, &transient());
        assert_eq!(
            controller.status(ServiceKind::Stt),
            ServiceStatus::Unavailable
        );
        assert!(!controller.is_available(ServiceKind::Stt));
    }

    #[test]
    fn test_success_resets_streak() {
        let controller = controller();
        controller.record_failure(ServiceKind::Tts, &transient());
        controller.record_failure(ServiceKind::Tts, &transient());
        controller.record_success(ServiceKind::Tts);

        assert_eq!(controller.status(ServiceKind::Tts), ServiceStatus::Healthy);
        // The streak restarted, so two more failures stay degraded
        controller.record_failure(ServiceKind::Tts, &transient());
        controller.record_failure(ServiceKind::Tts, &transient());
        assert_eq!(controller.status(ServiceKind::Tts), ServiceStatus::Degraded);
    }

    #[test]
    fn test_reset_returns_to_initial() {
        let controller = controller();
        for _ in 0..5 {
            controller.record_failure(ServiceKind::Cache, &transient());
        }
        controller.reset(ServiceKind::Cache);
        assert_eq!(controller.status(ServiceKind::Cache), ServiceStatus::Healthy);
    }

    #[test]
    fn test_critical_service_escalates_system_health() {
        let controller = controller();
        for _ in 0..3 {
            controller.record_failure(ServiceKind::Database, &transient());
        }
        let health = controller.system_health();
        assert_eq!(health.overall, SystemStatus::Critical);
        assert_eq!(health.unavailable_services, 1);
        assert_eq!(
            controller.unavailable_critical_services(),
            vec![ServiceKind::Database]
        );
    }

    #[test]
    fn test_noncritical_unavailable_is_degraded_overall() {
        let controller = controller();
        for _ in 0..3 {
            controller.record_failure(ServiceKind::Cache, &transient());
        }
        assert_eq!(controller.system_health().overall, SystemStatus::Degraded);
    }

    #[test]
    fn test_feature_map_tracks_service_availability() {
        let controller = controller();
        assert!(controller.available_features().voice_input);

        for _ in 0..3 {
            controller.record_failure(ServiceKind::Stt, &transient());
        }
        let features = controller.available_features();
        assert!(!features.voice_input);
        assert!(features.voice_output);
        assert!(features.data_persistence);
    }

    #[test]
    fn test_status_change_emits_event() {
        let controller = controller();
        let mut rx = controller.events().subscribe();

        controller.record_failure(ServiceKind::Translation, &transient());
        match rx.try_recv().unwrap() {
            PlatformEvent::ServiceStatusChanged { kind, old, new } => {
                assert_eq!(kind, ServiceKind::Translation);
                assert_eq!(old, ServiceStatus::Healthy);
                assert_eq!(new, ServiceStatus::Degraded);
            },
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_execute_primary_success_records_success() {
        let controller = controller();
        controller.record_failure(ServiceKind::Stt, &transient());

        let outcome = controller
            .execute_with_fallback(
                ServiceKind::Stt,
                || async { Ok::<_, Error>(7) },
                FallbackRequest::Query {
                    operation: "noop".into(),
                    payload: serde_json::Value::Null,
                },
            )
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Primary(7)));
        assert_eq!(controller.status(ServiceKind::Stt), ServiceStatus::Healthy);
    }

    #[tokio::test]
    async fn test_execute_failure_dispatches_fallback() {
        let controller = controller();
        controller.register_fallback(ServiceKind::Stt, Arc::new(CachedTranscript));

        let outcome: Outcome<Transcription> = controller
            .execute_with_fallback(
                ServiceKind::Stt,
                || async { Err(Error::Service("model crashed".into())) },
                FallbackRequest::Transcribe {
                    audio: Arc::from(vec![0u8; 320]),
                    sample_rate: 16_000,
                    language: Language::Hindi,
                },
            )
            .await
            .unwrap();

        match outcome {
            Outcome::Fallback(FallbackValue::Transcription(t)) => {
                assert_eq!(t.text, "cached transcript");
            },
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(controller.status(ServiceKind::Stt), ServiceStatus::Degraded);
    }

    #[tokio::test]
    async fn test_execute_unavailable_skips_primary() {
        let controller = controller();
        controller.register_fallback(ServiceKind::Stt, Arc::new(CachedTranscript));
        for _ in 0..3 {
            controller.record_failure(ServiceKind::Stt, &transient());
        }

        let outcome: Outcome<Transcription> = controller
            .execute_with_fallback(
                ServiceKind::Stt,
                || async { panic!("primary must not run for an unavailable service") },
                FallbackRequest::Transcribe {
                    audio: Arc::from(vec![0u8; 320]),
                    sample_rate: 16_000,
                    language: Language::Hindi,
                },
            )
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Fallback(_)));
    }

    #[tokio::test]
    async fn test_execute_without_fallback_rethrows() {
        let controller = controller();

        let result: Result<Outcome<()>> = controller
            .execute_with_fallback(
                ServiceKind::Llm,
                || async { Err(Error::Service("prompt rejected".into())) },
                FallbackRequest::Query {
                    operation: "suggest".into(),
                    payload: serde_json::Value::Null,
                },
            )
            .await;

        assert!(matches!(result, Err(Error::Service(_))));
        assert_eq!(controller.status(ServiceKind::Llm), ServiceStatus::Degraded);
    }

    #[tokio::test]
    async fn test_validation_error_leaves_health_untouched() {
        let controller = controller();

        let result: Result<Outcome<()>> = controller
            .execute_with_fallback(
                ServiceKind::Tts,
                || async { Err(Error::Validation("text is empty".into())) },
                FallbackRequest::Query {
                    operation: "noop".into(),
                    payload: serde_json::Value::Null,
                },
            )
            .await;

        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(controller.status(ServiceKind::Tts), ServiceStatus::Healthy);
    }

    #[tokio::test]
    async fn test_cancellation_leaves_health_untouched() {
        let controller = controller();

        let result: Result<Outcome<()>> = controller
            .execute_with_fallback(
                ServiceKind::Stt,
                || async { Err(Error::Cancelled) },
                FallbackRequest::Query {
                    operation: "noop".into(),
                    payload: serde_json::Value::Null,
                },
            )
            .await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(controller.status(ServiceKind::Stt), ServiceStatus::Healthy);
    }
}
