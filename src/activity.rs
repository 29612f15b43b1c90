//! Activity triggers
//!
//! Records inbound/outbound message activity per module. The last activity
//! timestamp is kept in a DashMap so any thread (endpoint callbacks included)
//! can record or query without locking the module.

use dashmap::DashMap;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::trace;

/// Message flow direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ActivityDirection {
    Inbound,
    Outbound,
}

/// Emitted on every recorded activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEvent {
    pub module: String,
    pub direction: ActivityDirection,
}

/// Activity tracker shared by the modules of a host
pub struct ActivityTracker {
    /// Key: (module, direction), value: last activity
    last_seen: DashMap<(String, ActivityDirection), Instant>,

    /// How long a trigger stays active after the last message
    hold: Duration,

    /// Optional observer (status display, tests)
    events_tx: Option<crossbeam::channel::Sender<ActivityEvent>>,
}

impl ActivityTracker {
    pub fn new(hold_ms: u64, events_tx: Option<crossbeam::channel::Sender<ActivityEvent>>) -> Self {
        Self {
            last_seen: DashMap::new(),
            hold: Duration::from_millis(hold_ms),
            events_tx,
        }
    }

    /// Record activity for a module
    ///
    /// Uses try_send so a slow observer never stalls the message path.
    pub fn record(&self, module: &str, direction: ActivityDirection) {
        self.last_seen.insert((module.to_string(), direction), Instant::now());

        trace!("Activity: {} {:?}", module, direction);

        if let Some(ref tx) = self.events_tx {
            let _ = tx.try_send(ActivityEvent {
                module: module.to_string(),
                direction,
            });
        }
    }

    /// True if activity was recorded within the hold window
    pub fn is_active(&self, module: &str, direction: ActivityDirection) -> bool {
        self.last_seen
            .get(&(module.to_string(), direction))
            .map(|entry| entry.value().elapsed() < self.hold)
            .unwrap_or(false)
    }
}
