//! Host resource metrics

use chrono::{DateTime, Utc};

/// Instantaneous host resource utilization
#[derive(Debug, Clone)]
pub struct HostMetrics {
    /// CPU utilization, 0-1
    pub cpu_fraction: f64,
    /// Memory utilization, 0-1
    pub memory_fraction: f64,
    /// Disk utilization, 0-1
    pub disk_fraction: f64,
    /// Open network connections
    pub open_conns: u64,
    pub sampled_at: DateTime<Utc>,
}

impl HostMetrics {
    pub fn new(cpu_fraction: f64, memory_fraction: f64) -> Self {
        Self {
            cpu_fraction,
            memory_fraction,
            disk_fraction: 0.0,
            open_conns: 0,
            sampled_at: Utc::now(),
        }
    }

    /// Scaling load: CPU weighted over memory, clamped to [0, 1]
    pub fn load(&self) -> f64 {
        (0.7 * self.cpu_fraction + 0.3 * self.memory_fraction).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_weights_cpu_over_memory() {
        let metrics = HostMetrics::new(1.0, 0.0);
        assert!((metrics.load() - 0.7).abs() < f64::EPSILON);

        let metrics = HostMetrics::new(0.0, 1.0);
        assert!((metrics.load() - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_is_clamped() {
        let metrics = HostMetrics::new(2.0, 2.0);
        assert_eq!(metrics.load(), 1.0);

        let metrics = HostMetrics::new(-1.0, -1.0);
        assert_eq!(metrics.load(), 0.0);
    }
}
