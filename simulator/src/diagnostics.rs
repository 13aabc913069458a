//! Per-device diagnostic events and the sinks that receive them.
//!
//! Devices never log through shared global state directly: each one is
//! handed a [`DiagnosticSink`] at construction and reports every lifecycle
//! change and tick outcome to it.

use std::sync::{Mutex, PoisonError};
use tracing::{debug, error, info, warn};

/// Why a tick failed to deliver its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Missing endpoint or otherwise misconfigured device.
    Configuration,
    /// The transport reported a delivery failure.
    Transport,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Bound { id: u32, endpoint: String },
    Started { id: u32 },
    Ready { id: u32 },
    Delivered { id: u32, timestamp: f64 },
    Failed { id: u32, kind: FailureKind, message: String },
    Stopped { id: u32 },
}

impl DeviceEvent {
    pub fn device_id(&self) -> u32 {
        match self {
            DeviceEvent::Bound { id, .. }
            | DeviceEvent::Started { id }
            | DeviceEvent::Ready { id }
            | DeviceEvent::Delivered { id, .. }
            | DeviceEvent::Failed { id, .. }
            | DeviceEvent::Stopped { id } => *id,
        }
    }
}

/// Receives events from many devices concurrently.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, event: DeviceEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, event: DeviceEvent) {
        match event {
            DeviceEvent::Bound { id, endpoint } => debug!(device_id = id, %endpoint, "device bound"),
            DeviceEvent::Started { id } => info!(device_id = id, "device started"),
            DeviceEvent::Ready { id } => debug!(device_id = id, "device ready"),
            DeviceEvent::Delivered { id, timestamp } => {
                debug!(device_id = id, timestamp, "telemetry delivered")
            }
            DeviceEvent::Failed {
                id,
                kind: FailureKind::Configuration,
                message,
            } => error!(device_id = id, "configuration error: {}", message),
            DeviceEvent::Failed {
                id,
                kind: FailureKind::Transport,
                message,
            } => warn!(device_id = id, "delivery failed: {}", message),
            DeviceEvent::Stopped { id } => info!(device_id = id, "device stopped"),
        }
    }
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<DeviceEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DeviceEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&DeviceEvent) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| predicate(event))
            .count()
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, event: DeviceEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
