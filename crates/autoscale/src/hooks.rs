//! External hooks the control loop drives
//!
//! The loop itself never talks to the host directly; it goes through
//! [`ScalingHooks`]. [`ComposeHooks`] is the production implementation:
//! docker-compose for the worker pool, nginx for routing, Prometheus for
//! host metrics, and an HTTP probe for backend health.

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

use mandi_voice_core::{Error, Result};

use crate::host::HostMetrics;

/// A backend worker instance
#[derive(Debug, Clone)]
pub struct Instance {
    pub id: String,
    pub host: String,
    pub port: u16,
}

/// Operations the autoscaler needs from the deployment environment
#[async_trait]
pub trait ScalingHooks: Send + Sync {
    /// Sample current host resource utilization
    async fn host_metrics(&self) -> Result<HostMetrics>;

    /// Discover the currently running, healthy worker instances
    async fn discover_instances(&self) -> Result<Vec<Instance>>;

    /// Start the named instance
    async fn start_instance(&self, id: &str) -> Result<()>;

    /// Stop the named instance
    async fn stop_instance(&self, id: &str) -> Result<()>;

    /// Reload the router so it picks up the new pool
    async fn reload_router(&self) -> Result<()>;

    /// Probe one instance's health endpoint
    async fn check_backend_health(&self, instance: &Instance) -> bool;
}

/// Instance naming scheme: `backend`, `backend-2`, `backend-3`, ...
pub(crate) fn instance_name(index: usize) -> String {
    if index > 1 {
        format!("backend-{}", index)
    } else {
        "backend".to_string()
    }
}

/// docker-compose based hooks
pub struct ComposeHooks {
    compose_file: String,
    prometheus_url: String,
    max_instances: usize,
    backend_port: u16,
    client: reqwest::Client,
}

impl ComposeHooks {
    pub fn new(
        compose_file: impl Into<String>,
        prometheus_url: impl Into<String>,
        max_instances: usize,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            compose_file: compose_file.into(),
            prometheus_url: prometheus_url.into(),
            max_instances,
            backend_port: 8000,
            client,
        }
    }

    /// Run a docker-compose subcommand against the configured file
    async fn compose(&self, args: &[&str]) -> Result<()> {
        let output = Command::new("docker-compose")
            .arg("-f")
            .arg(&self.compose_file)
            .args(args)
            .output()
            .await
            .map_err(|e| Error::Service(format!("failed to spawn docker-compose: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Service(format!(
                "docker-compose {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(())
    }

    /// Query Prometheus for a single scalar value
    async fn prometheus_scalar(&self, query: &str) -> Result<f64> {
        let url = format!("{}/api/v1/query", self.prometheus_url);
        let response = self
            .client
            .get(&url)
            .query(&[("query", query)])
            .send()
            .await
            .map_err(|e| Error::Transient(format!("prometheus query failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Transient(format!(
                "prometheus returned {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Transient(format!("invalid prometheus response: {}", e)))?;

        body["data"]["result"]
            .get(0)
            .and_then(|r| r["value"].get(1))
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| Error::Transient(format!("no data for query '{}'", query)))
    }
}

#[async_trait]
impl ScalingHooks for ComposeHooks {
    async fn host_metrics(&self) -> Result<HostMetrics> {
        let cpu = self
            .prometheus_scalar("1 - avg(rate(node_cpu_seconds_total{mode=\"idle\"}[5m]))")
            .await?;
        let memory = self
            .prometheus_scalar(
                "1 - (node_memory_MemAvailable_bytes / node_memory_MemTotal_bytes)",
            )
            .await?;
        let disk = self
            .prometheus_scalar(
                "1 - (node_filesystem_avail_bytes{mountpoint=\"/\"} / \
                 node_filesystem_size_bytes{mountpoint=\"/\"})",
            )
            .await
            .unwrap_or(0.0);
        let open_conns = self
            .prometheus_scalar("sum(node_netstat_Tcp_CurrEstab)")
            .await
            .unwrap_or(0.0) as u64;

        let mut metrics = HostMetrics::new(cpu, memory);
        metrics.disk_fraction = disk;
        metrics.open_conns = open_conns;
        Ok(metrics)
    }

    async fn discover_instances(&self) -> Result<Vec<Instance>> {
        let mut instances = Vec::new();
        for index in 1..=self.max_instances {
            let id = instance_name(index);
            let instance = Instance {
                host: id.clone(),
                port: self.backend_port,
                id,
            };
            if self.check_backend_health(&instance).await {
                tracing::debug!(instance = %instance.id, "discovered healthy instance");
                instances.push(instance);
            }
        }
        Ok(instances)
    }

    async fn start_instance(&self, id: &str) -> Result<()> {
        tracing::info!(instance = %id, "starting instance");
        self.compose(&["up", "-d", id]).await
    }

    async fn stop_instance(&self, id: &str) -> Result<()> {
        tracing::info!(instance = %id, "stopping instance");
        self.compose(&["stop", id]).await
    }

    async fn reload_router(&self) -> Result<()> {
        self.compose(&["exec", "-T", "nginx", "nginx", "-s", "reload"])
            .await?;
        tracing::info!("router configuration reloaded");
        Ok(())
    }

    async fn check_backend_health(&self, instance: &Instance) -> bool {
        let url = format!("http://{}:{}/health", instance.host, instance.port);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(instance = %instance.id, error = %e, "health check failed");
                false
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_naming_scheme() {
        assert_eq!(instance_name(1), "backend");
        assert_eq!(instance_name(2), "backend-2");
        assert_eq!(instance_name(7), "backend-7");
    }
}
