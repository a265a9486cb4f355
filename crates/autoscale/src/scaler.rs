//! Scaling decisions and the control loop

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use mandi_voice_config::AutoscaleSettings;
use mandi_voice_core::{EventSink, PlatformEvent, Result, ScalingAction};
use mandi_voice_health::{HealthController, SystemStatus};

use crate::hooks::{instance_name, ScalingHooks};
use crate::host::HostMetrics;

/// Autoscaler configuration
#[derive(Debug, Clone)]
pub struct AutoScalerConfig {
    pub min_instances: usize,
    pub max_instances: usize,
    /// Load at or above which the pool grows (0-1)
    pub scale_up_threshold: f64,
    /// Load at or below which the pool shrinks (0-1)
    pub scale_down_threshold: f64,
    /// Minimum interval between executed scaling actions
    pub cooldown: Duration,
    /// Interval between load checks
    pub check_interval: Duration,
    pub prometheus_url: String,
}

impl Default for AutoScalerConfig {
    fn default() -> Self {
        Self {
            min_instances: 1,
            max_instances: 10,
            scale_up_threshold: 0.80,
            scale_down_threshold: 0.30,
            cooldown: Duration::from_secs(300),
            check_interval: Duration::from_secs(60),
            prometheus_url: "http://localhost:9090".to_string(),
        }
    }
}

impl AutoScalerConfig {
    /// Read configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        let defaults = Self::default();
        Self {
            min_instances: env_parse("MIN_INSTANCES", defaults.min_instances),
            max_instances: env_parse("MAX_INSTANCES", defaults.max_instances),
            scale_up_threshold: env_parse("SCALE_UP_THRESHOLD", defaults.scale_up_threshold),
            scale_down_threshold: env_parse("SCALE_DOWN_THRESHOLD", defaults.scale_down_threshold),
            cooldown: Duration::from_secs(env_parse("COOLDOWN_PERIOD", 300)),
            check_interval: Duration::from_secs(env_parse("CHECK_INTERVAL", 60)),
            prometheus_url: std::env::var("PROMETHEUS_URL")
                .unwrap_or(defaults.prometheus_url),
        }
    }
}

impl From<&AutoscaleSettings> for AutoScalerConfig {
    fn from(settings: &AutoscaleSettings) -> Self {
        Self {
            min_instances: settings.min_instances,
            max_instances: settings.max_instances,
            scale_up_threshold: settings.scale_up_threshold,
            scale_down_threshold: settings.scale_down_threshold,
            cooldown: Duration::from_secs(settings.cooldown_secs),
            check_interval: Duration::from_secs(settings.check_interval_secs),
            prometheus_url: settings.prometheus_url.clone(),
        }
    }
}

/// One decision per loop tick
#[derive(Debug, Clone)]
pub struct ScalingDecision {
    pub action: ScalingAction,
    pub current: usize,
    pub target: usize,
    pub reason: String,
    pub metrics: HostMetrics,
    pub made_at: DateTime<Utc>,
}

/// Autoscaling control loop
pub struct AutoScaler {
    config: AutoScalerConfig,
    hooks: Arc<dyn ScalingHooks>,
    health: Arc<HealthController>,
    events: EventSink,
    /// Stamped only when a scaling action executed successfully
    last_action: Mutex<Option<Instant>>,
}

impl AutoScaler {
    pub fn new(
        config: AutoScalerConfig,
        hooks: Arc<dyn ScalingHooks>,
        health: Arc<HealthController>,
        events: EventSink,
    ) -> Self {
        tracing::info!(
            min = config.min_instances,
            max = config.max_instances,
            scale_up_threshold = config.scale_up_threshold,
            scale_down_threshold = config.scale_down_threshold,
            cooldown_secs = config.cooldown.as_secs(),
            check_interval_secs = config.check_interval.as_secs(),
            "autoscaler configured"
        );
        Self {
            config,
            hooks,
            health,
            events,
            last_action: Mutex::new(None),
        }
    }

    /// Seconds of cooldown remaining, if any
    fn cooldown_remaining(&self) -> Option<Duration> {
        let last = (*self.last_action.lock())?;
        let elapsed = last.elapsed();
        (elapsed < self.config.cooldown).then(|| self.config.cooldown - elapsed)
    }

    /// Pure decision function for one observation
    fn decide(&self, metrics: HostMetrics, current: usize) -> ScalingDecision {
        let load = metrics.load();
        let made_at = Utc::now();

        if let Some(remaining) = self.cooldown_remaining() {
            return ScalingDecision {
                action: ScalingAction::NoOp,
                current,
                target: current,
                reason: format!("in cooldown ({}s remaining)", remaining.as_secs()),
                metrics,
                made_at,
            };
        }

        if load >= self.config.scale_up_threshold && current < self.config.max_instances {
            ScalingDecision {
                action: ScalingAction::Up,
                current,
                target: current + 1,
                reason: format!(
                    "load {:.0}% exceeds threshold {:.0}%",
                    load * 100.0,
                    self.config.scale_up_threshold * 100.0
                ),
                metrics,
                made_at,
            }
        } else if load <= self.config.scale_down_threshold && current > self.config.min_instances {
            ScalingDecision {
                action: ScalingAction::Down,
                current,
                target: current - 1,
                reason: format!(
                    "load {:.0}% below threshold {:.0}%",
                    load * 100.0,
                    self.config.scale_down_threshold * 100.0
                ),
                metrics,
                made_at,
            }
        } else {
            ScalingDecision {
                action: ScalingAction::NoOp,
                current,
                target: current,
                reason: format!("load {:.0}% within acceptable range", load * 100.0),
                metrics,
                made_at,
            }
        }
    }

    /// Execute a non-NoOp decision through the hooks.
    ///
    /// The last-action timestamp is stamped only after every hook
    /// succeeded, so a failed action can be retried on the next tick.
    async fn execute(&self, decision: &ScalingDecision) -> Result<()> {
        match decision.action {
            ScalingAction::NoOp => return Ok(()),
            ScalingAction::Up => {
                let id = instance_name(decision.target);
                self.hooks.start_instance(&id).await?;
            },
            ScalingAction::Down => {
                // Remove the highest-numbered instance first
                let id = instance_name(decision.current);
                self.hooks.stop_instance(&id).await?;
            },
        }
        self.hooks.reload_router().await?;

        *self.last_action.lock() = Some(Instant::now());
        metrics::gauge!("autoscaler_instances").set(decision.target as f64);

        tracing::info!(
            action = decision.action.as_str(),
            from = decision.current,
            to = decision.target,
            reason = %decision.reason,
            "scaling action executed"
        );
        self.events.emit(PlatformEvent::ScalingExecuted {
            action: decision.action,
            from: decision.current,
            to: decision.target,
            reason: decision.reason.clone(),
        });
        Ok(())
    }

    /// One control loop iteration: sample, decide, execute.
    pub async fn tick(&self) -> Result<ScalingDecision> {
        // Critical-service outages are surfaced, not acted on; scaling
        // cannot repair data loss.
        if self.health.system_health().overall == SystemStatus::Critical {
            for service in self.health.unavailable_critical_services() {
                tracing::error!(service = %service, "critical service unavailable");
                self.events.emit(PlatformEvent::CriticalEvent { service });
            }
        }

        let metrics = self.hooks.host_metrics().await?;
        let instances = self.hooks.discover_instances().await?;
        let current = instances.len();

        let decision = self.decide(metrics, current);
        tracing::info!(
            load = format!("{:.2}", decision.metrics.load()),
            instances = current,
            action = decision.action.as_str(),
            reason = %decision.reason,
            "scaling decision"
        );

        if decision.action != ScalingAction::NoOp {
            if let Err(e) = self.execute(&decision).await {
                tracing::error!(error = %e, "failed to execute scaling decision");
                return Err(e);
            }
        }
        Ok(decision)
    }

    /// Spawn the control loop. Returns a shutdown sender; send `true` to
    /// stop the loop.
    pub fn spawn(self: &Arc<Self>) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let scaler = Arc::clone(self);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(scaler.config.check_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            tracing::info!("autoscaler started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = scaler.tick().await {
                            tracing::error!(error = %e, "autoscaling tick failed");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!("autoscaler shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }

    #[cfg(test)]
    fn force_last_action(&self, at: Instant) {
        *self.last_action.lock() = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use mandi_voice_core::Error;
    use mandi_voice_health::HealthPolicy;

    use crate::hooks::Instance;

    /// Hooks backed by fixed metrics and a counter of start/stop calls
    struct MockHooks {
        cpu: f64,
        memory: f64,
        instances: AtomicUsize,
        starts: AtomicUsize,
        stops: AtomicUsize,
        reloads: AtomicUsize,
        fail_start: bool,
    }

    impl MockHooks {
        fn new(cpu: f64, memory: f64, instances: usize) -> Self {
            Self {
                cpu,
                memory,
                instances: AtomicUsize::new(instances),
                starts: AtomicUsize::new(0),
                stops: AtomicUsize::new(0),
                reloads: AtomicUsize::new(0),
                fail_start: false,
            }
        }

        fn failing_start(mut self) -> Self {
            self.fail_start = true;
            self
        }
    }

    #[async_trait]
    impl ScalingHooks for MockHooks {
        async fn host_metrics(&self) -> Result<HostMetrics> {
            Ok(HostMetrics::new(self.cpu, self.memory))
        }

        async fn discover_instances(&self) -> Result<Vec<Instance>> {
            let count = self.instances.load(Ordering::SeqCst);
            Ok((1..=count)
                .map(|i| Instance {
                    id: instance_name(i),
                    host: instance_name(i),
                    port: 8000,
                })
                .collect())
        }

        async fn start_instance(&self, _id: &str) -> Result<()> {
            if self.fail_start {
                return Err(Error::Service("compose up failed".into()));
            }
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.instances.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn stop_instance(&self, _id: &str) -> Result<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            self.instances.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }

        async fn reload_router(&self) -> Result<()> {
            self.reloads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn check_backend_health(&self, _instance: &Instance) -> bool {
            true
        }
    }

    fn scaler_with(hooks: Arc<MockHooks>, config: AutoScalerConfig) -> AutoScaler {
        let events = EventSink::default();
        let health = Arc::new(HealthController::new(HealthPolicy::default(), events.clone()));
        AutoScaler::new(config, hooks, health, events)
    }

    fn config(min: usize, max: usize) -> AutoScalerConfig {
        AutoScalerConfig {
            min_instances: min,
            max_instances: max,
            ..AutoScalerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_scale_up_at_exact_threshold() {
        // Load equal to the threshold triggers: the comparison is >=
        let hooks = Arc::new(MockHooks::new(0.8, 0.8, 2));
        let mut cfg = config(1, 5);
        cfg.scale_up_threshold = HostMetrics::new(0.8, 0.8).load();
        let scaler = scaler_with(hooks.clone(), cfg);

        let decision = scaler.tick().await.unwrap();
        assert_eq!(decision.action, ScalingAction::Up);
        assert_eq!(decision.target, 3);
        assert_eq!(hooks.starts.load(Ordering::SeqCst), 1);
        assert_eq!(hooks.reloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_scale_down_at_exact_threshold() {
        // Load equal to the threshold triggers: the comparison is <=
        let hooks = Arc::new(MockHooks::new(0.3, 0.3, 3));
        let mut cfg = config(1, 5);
        cfg.scale_down_threshold = HostMetrics::new(0.3, 0.3).load();
        let scaler = scaler_with(hooks.clone(), cfg);

        let decision = scaler.tick().await.unwrap();
        assert_eq!(decision.action, ScalingAction::Down);
        assert_eq!(decision.target, 2);
        // The highest-numbered instance goes first
        assert_eq!(hooks.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_scale_up_at_max_instances() {
        let hooks = Arc::new(MockHooks::new(0.99, 0.99, 5));
        let scaler = scaler_with(hooks.clone(), config(1, 5));

        let decision = scaler.tick().await.unwrap();
        assert_eq!(decision.action, ScalingAction::NoOp);
        assert_eq!(hooks.starts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_scale_down_at_min_instances() {
        let hooks = Arc::new(MockHooks::new(0.01, 0.01, 1));
        let scaler = scaler_with(hooks.clone(), config(1, 5));

        let decision = scaler.tick().await.unwrap();
        assert_eq!(decision.action, ScalingAction::NoOp);
        assert_eq!(hooks.stops.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_mid_range_load_is_noop() {
        let hooks = Arc::new(MockHooks::new(0.5, 0.5, 2));
        let scaler = scaler_with(hooks.clone(), config(1, 5));

        let decision = scaler.tick().await.unwrap();
        assert_eq!(decision.action, ScalingAction::NoOp);
        assert!(decision.reason.contains("acceptable range"));
    }

    #[tokio::test]
    async fn test_cooldown_forces_noop() {
        // Heavy load, but a scaling action 60s ago with a 300s cooldown
        let hooks = Arc::new(MockHooks::new(0.95, 0.95, 2));
        let scaler = scaler_with(hooks.clone(), config(1, 5));
        scaler.force_last_action(Instant::now() - Duration::from_secs(60));

        let decision = scaler.tick().await.unwrap();
        assert_eq!(decision.action, ScalingAction::NoOp);
        assert!(decision.reason.contains("cooldown"));
        assert_eq!(hooks.starts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expired_cooldown_allows_scaling() {
        let hooks = Arc::new(MockHooks::new(0.95, 0.95, 2));
        let scaler = scaler_with(hooks.clone(), config(1, 5));
        scaler.force_last_action(Instant::now() - Duration::from_secs(301));

        let decision = scaler.tick().await.unwrap();
        assert_eq!(decision.action, ScalingAction::Up);
    }

    #[tokio::test]
    async fn test_failed_hook_leaves_cooldown_unset() {
        let hooks = Arc::new(MockHooks::new(0.95, 0.95, 2).failing_start());
        let scaler = scaler_with(hooks.clone(), config(1, 5));

        assert!(scaler.tick().await.is_err());
        // No cooldown was stamped, so the next tick may retry
        assert!(scaler.cooldown_remaining().is_none());
    }

    #[tokio::test]
    async fn test_successful_action_emits_event_and_starts_cooldown() {
        let hooks = Arc::new(MockHooks::new(0.95, 0.95, 2));
        let events = EventSink::default();
        let mut event_rx = events.subscribe();
        let health = Arc::new(HealthController::new(HealthPolicy::default(), events.clone()));
        let scaler = AutoScaler::new(config(1, 5), hooks, health, events);

        scaler.tick().await.unwrap();
        assert!(scaler.cooldown_remaining().is_some());

        match event_rx.try_recv().unwrap() {
            PlatformEvent::ScalingExecuted {
                action, from, to, ..
            } => {
                assert_eq!(action, ScalingAction::Up);
                assert_eq!(from, 2);
                assert_eq!(to, 3);
            },
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_critical_service_surfaced_not_acted_on() {
        let hooks = Arc::new(MockHooks::new(0.5, 0.5, 2));
        let events = EventSink::default();
        let mut event_rx = events.subscribe();
        let health = Arc::new(HealthController::new(HealthPolicy::default(), events.clone()));
        let scaler = AutoScaler::new(config(1, 5), hooks.clone(), health.clone(), events);

        for _ in 0..3 {
            health.record_failure(
                mandi_voice_core::ServiceKind::Database,
                &Error::Transient("connection lost".into()),
            );
        }

        let decision = scaler.tick().await.unwrap();
        assert_eq!(decision.action, ScalingAction::NoOp);
        assert_eq!(hooks.starts.load(Ordering::SeqCst), 0);

        let mut saw_critical = false;
        while let Ok(event) = event_rx.try_recv() {
            if let PlatformEvent::CriticalEvent { service } = event {
                assert_eq!(service, mandi_voice_core::ServiceKind::Database);
                saw_critical = true;
            }
        }
        assert!(saw_critical, "expected a CriticalEvent");
    }
}
