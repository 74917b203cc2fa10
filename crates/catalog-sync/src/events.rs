//! # Sync Events
//!
//! State transitions and per-item outcomes published by the sync engine.
//!
//! ```text
//!            ┌──────────────── sync_now() ────────────────┐
//!            ▼                                            │
//!   ┌──────────────┐      ┌──────────────┐      ┌─────────┴────────┐
//!   │     Idle     │ ───► │   Syncing    │ ───► │ Succeeded/Failed │
//!   └──────────────┘      └──────────────┘      └─────────┬────────┘
//!            ▲                                            │
//!            └────────────────────────────────────────────┘
//! ```
//!
//! Anything that wants to observe the engine implements
//! [`SyncEventEmitter`]; [`BroadcastEmitter`] fans events out over a tokio
//! broadcast channel.

use catalog_core::ChangeAction;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tokio::sync::broadcast;

/// Engine state as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Idle,
    Syncing,
    Succeeded,
    Failed,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Idle => write!(f, "idle"),
            SyncState::Syncing => write!(f, "syncing"),
            SyncState::Succeeded => write!(f, "succeeded"),
            SyncState::Failed => write!(f, "failed"),
        }
    }
}

/// What one completed attempt did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Changes accepted by the server and marked synced.
    pub pushed: u32,
    /// Changes that failed and stay queued.
    pub push_failures: u32,
    /// Remote products inserted locally.
    pub pulled_new: u32,
    /// Local products overwritten by a newer remote copy.
    pub pulled_updated: u32,
    /// Remote products ignored because the local copy was as new or newer.
    pub kept_local: u32,
    /// Remote products that could not be applied.
    pub pull_skipped: u32,
    /// Synced change-log entries removed by retention.
    pub pruned: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncReport {
    pub fn pulled(&self) -> u32 {
        self.pulled_new + self.pulled_updated
    }
}

/// Everything the engine publishes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SyncEvent {
    StateChanged { state: SyncState },
    ChangePushed { change_id: i64, action: ChangeAction },
    ChangeFailed { change_id: i64, action: ChangeAction, error: String },
    ProductPulled { barcode: String, inserted: bool },
    Completed { report: SyncReport },
    Failed { error: String, consecutive_failures: u32 },
    /// The local store was wiped after repeated failures.
    StoreReset,
}

// =============================================================================
// Emitters
// =============================================================================

/// Observer for engine events.
pub trait SyncEventEmitter: Send + Sync {
    fn emit(&self, event: &SyncEvent);
}

/// Drops every event.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit(&self, _event: &SyncEvent) {}
}

/// Publishes events on a broadcast channel. Slow subscribers lag rather
/// than block the engine.
#[derive(Debug, Clone)]
pub struct BroadcastEmitter {
    tx: broadcast::Sender<SyncEvent>,
}

impl BroadcastEmitter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        BroadcastEmitter { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastEmitter {
    fn default() -> Self {
        Self::new(64)
    }
}

impl SyncEventEmitter for BroadcastEmitter {
    fn emit(&self, event: &SyncEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_emitter_delivers_in_order() {
        let emitter = BroadcastEmitter::new(8);
        let mut rx = emitter.subscribe();

        emitter.emit(&SyncEvent::StateChanged {
            state: SyncState::Syncing,
        });
        emitter.emit(&SyncEvent::StoreReset);

        assert_eq!(
            rx.recv().await.unwrap(),
            SyncEvent::StateChanged {
                state: SyncState::Syncing
            }
        );
        assert_eq!(rx.recv().await.unwrap(), SyncEvent::StoreReset);
    }

    #[test]
    fn test_emit_without_subscribers() {
        BroadcastEmitter::default().emit(&SyncEvent::StoreReset);
        NoOpEmitter.emit(&SyncEvent::StoreReset);
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(SyncEvent::ChangePushed {
            change_id: 3,
            action: ChangeAction::Create,
        })
        .unwrap();
        assert_eq!(json["type"], "changePushed");
        assert_eq!(json["action"], "create");

        let report = SyncReport {
            pulled_new: 2,
            pulled_updated: 1,
            ..Default::default()
        };
        assert_eq!(report.pulled(), 3);
    }
}
