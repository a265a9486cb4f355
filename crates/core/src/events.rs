//! Platform events and the best-effort event sink
//!
//! Events fan out over a broadcast channel. Delivery is best-effort: sends
//! to a channel with no subscribers are dropped silently, and slow
//! subscribers may observe lagged receives.

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::service::{ServiceKind, ServiceStatus};

/// Default broadcast capacity, sized to avoid lagging slow receivers
const DEFAULT_EVENT_CAPACITY: usize = 1000;

/// Direction of an executed scaling action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingAction {
    Up,
    Down,
    NoOp,
}

impl ScalingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalingAction::Up => "scale_up",
            ScalingAction::Down => "scale_down",
            ScalingAction::NoOp => "no_action",
        }
    }
}

/// Emitted when a user's foreground conversation changes
#[derive(Debug, Clone)]
pub struct SwitchEvent {
    pub previous_session_id: Option<Uuid>,
    pub new_session_id: Uuid,
    /// Display name of the other party, for the voice announcement
    pub counterparty: String,
    pub commodity: Option<String>,
    pub message_count: usize,
}

/// Outbound events, delivered best-effort to an external transport
#[derive(Debug, Clone)]
pub enum PlatformEvent {
    /// A latency budget was exceeded
    LatencyAlert {
        scope: String,
        measured_ms: u64,
        threshold_ms: u64,
    },
    /// A message arrived in a conversation the recipient is not looking at
    InactiveAlert {
        owner: Uuid,
        session_id: Uuid,
        counterparty: String,
    },
    /// A user switched their foreground conversation
    SessionSwitched(SwitchEvent),
    /// A service moved between health states
    ServiceStatusChanged {
        kind: ServiceKind,
        old: ServiceStatus,
        new: ServiceStatus,
    },
    /// The autoscaler changed the worker pool size
    ScalingExecuted {
        action: ScalingAction,
        from: usize,
        to: usize,
        reason: String,
    },
    /// A critical service became unavailable
    CriticalEvent { service: ServiceKind },
}

/// Best-effort broadcast sink for platform events
#[derive(Clone)]
pub struct EventSink {
    tx: broadcast::Sender<PlatformEvent>,
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event; dropped if nobody is listening
    pub fn emit(&self, event: PlatformEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
