//! Autoscaling control loop
//!
//! Samples host load on a fixed interval and grows or shrinks the backend
//! worker pool between configured bounds. Scale-up and scale-down
//! thresholds leave a hysteresis gap, and a cooldown keeps consecutive
//! scaling actions apart. Scaling never touches in-flight sessions.

mod hooks;
mod host;
mod scaler;

pub use hooks::{ComposeHooks, Instance, ScalingHooks};
pub use host::HostMetrics;
pub use scaler::{AutoScaler, AutoScalerConfig, ScalingDecision};

pub use mandi_voice_core::ScalingAction;
