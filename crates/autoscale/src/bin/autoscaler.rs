//! Autoscaler service entry point

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;

use mandi_voice_autoscale::{AutoScaler, AutoScalerConfig, ComposeHooks};
use mandi_voice_core::{EventSink, PlatformEvent};
use mandi_voice_health::{HealthController, HealthPolicy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AutoScalerConfig::from_env();
    tracing::info!("starting mandi autoscaler v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = PrometheusBuilder::new().install() {
        tracing::warn!(error = %e, "metrics exporter unavailable, continuing without it");
    }

    let compose_file = std::env::var("DOCKER_COMPOSE_PATH")
        .unwrap_or_else(|_| "/app/deployment/docker-compose.prod.yml".to_string());
    let hooks = Arc::new(ComposeHooks::new(
        compose_file,
        config.prometheus_url.clone(),
        config.max_instances,
    ));

    let events = EventSink::default();
    let health = Arc::new(HealthController::new(HealthPolicy::default(), events.clone()));

    // Mirror outbound events into the log; delivery elsewhere is external
    let mut event_rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            match event {
                PlatformEvent::ScalingExecuted {
                    action,
                    from,
                    to,
                    reason,
                } => {
                    tracing::info!(action = action.as_str(), from, to, %reason, "scaling event");
                },
                PlatformEvent::CriticalEvent { service } => {
                    tracing::error!(service = %service, "critical service event");
                },
                _ => {},
            }
        }
    });

    let scaler = Arc::new(AutoScaler::new(config, hooks, health, events));
    let shutdown = scaler.spawn();

    tokio::signal::ctrl_c().await?;
    tracing::info!("received interrupt signal");
    let _ = shutdown.send(true);

    Ok(())
}
