//! # Connectivity Monitor
//!
//! Online/offline flag shared by the sync driver, the catalog facade and
//! whatever front end reports network state.
//!
//! ```text
//!   front end ──set_online(bool)──┐
//!                                 ▼
//!   probe task ──check_connectivity──► watch::Sender<bool> ──► subscribers
//!                                                               (driver wakes
//!                                                                on false→true)
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::remote::RemoteClient;

/// Watch-backed online flag. Clones share the same state.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        ConnectivityMonitor { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Updates the flag. Subscribers are only notified on a real change.
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            info!(online, "Connectivity changed");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Polls `remote.check_connectivity()` every `interval` and feeds the
    /// result into the flag. Abort the returned handle to stop probing.
    pub fn spawn_probe(&self, remote: Arc<dyn RemoteClient>, interval: Duration) -> JoinHandle<()> {
        let monitor = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let online = remote.check_connectivity().await;
                debug!(online, "Connectivity probe");
                monitor.set_online(online);
            }
        })
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}
