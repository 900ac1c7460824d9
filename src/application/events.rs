// Dashboard events - Live notifications fanned out to feed subscribers
use serde::Serialize;
use tokio::sync::broadcast;

use crate::domain::series::SeriesRow;
use crate::domain::session::{RunOutcome, SessionPhase};
use crate::domain::stats::RunningStats;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DashboardEvent {
    Row {
        #[serde(flatten)]
        row: SeriesRow,
    },
    Stats {
        stats: RunningStats,
    },
    Phase {
        phase: SessionPhase,
        #[serde(skip_serializing_if = "Option::is_none")]
        outcome: Option<RunOutcome>,
    },
    Setpoint {
        speed: f64,
    },
    Alert {
        message: String,
    },
    Link {
        connected: bool,
    },
}

/// Broadcast hub shared by the pipeline, the session controller and the feed.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DashboardEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: DashboardEvent) {
        // No subscribers is the normal state when no browser is attached.
        let _ = self.tx.send(event);
    }
}
