//! # Sync Engine
//!
//! Reconciles the local store with the product API: queued local changes
//! are pushed first, then products updated since the last successful sync
//! are pulled and merged last-write-wins.
//!
//! ## Attempt Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sync_now()                                                             │
//! │                                                                         │
//! │  1. Guard    offline?   ──► Skipped(Offline)                            │
//! │              in flight? ──► Skipped(InFlight)                           │
//! │                                                                         │
//! │  2. Push     for change in unsynced (oldest first):                     │
//! │                create ─► POST   ─► link remote id ─► mark synced        │
//! │                update ─► PUT    ─► mark synced                          │
//! │                delete ─► DELETE ─► mark synced (404 counts as done)     │
//! │              a failed change is logged and stays queued                 │
//! │                                                                         │
//! │  3. Pull     GET since last_sync ─► per product:                        │
//! │                no local copy       ─► insert (from_remote)              │
//! │                remote strictly newer ─► overwrite                       │
//! │                otherwise           ─► keep local                        │
//! │                                                                         │
//! │  4. Success  last_sync = attempt start, failures = 0, prune log         │
//! │     Failure  failures += 1; at threshold the local store is RESET       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Reset Hazard
//! Reaching the failure threshold wipes every local product and every
//! queued change, synced or not. Unpushed local edits are lost. The next
//! successful attempt repopulates the store from the server.
//!
//! ## Background Driver
//! [`SyncEngine::spawn`] runs attempts on a timer, on every offline→online
//! edge, on explicit requests, and on an exponential backoff schedule after
//! a failed attempt. Requests that arrive while one is already queued are
//! coalesced.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use catalog_core::{timestamp, ChangeAction, PendingChange};
use catalog_db::LocalStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::SyncSettings;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{SyncError, SyncResult};
use crate::events::{
    BroadcastEmitter, NoOpEmitter, SyncEvent, SyncEventEmitter, SyncReport, SyncState,
};
use crate::merge::{decide, MergeDecision};
use crate::remote::RemoteClient;

// =============================================================================
// Outcome & Status
// =============================================================================

/// Why an attempt did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SkipReason {
    Offline,
    InFlight,
}

/// Result of one `sync_now()` call. Never an `Err`: failures are part of
/// the engine's normal life.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Skipped(SkipReason),
    Completed(SyncReport),
    Failed {
        error: String,
        consecutive_failures: u32,
        reset_triggered: bool,
    },
}

impl SyncOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SyncOutcome::Completed(_))
    }
}

/// Point-in-time view of the engine for status displays.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub state: SyncState,
    pub online: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub pending_count: i64,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_report: Option<SyncReport>,
}

#[derive(Debug)]
struct StatusInner {
    state: SyncState,
    last_error: Option<String>,
    last_report: Option<SyncReport>,
}

/// Clears the in-flight flag when an attempt ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// =============================================================================
// Sync Engine
// =============================================================================

pub struct SyncEngine {
    store: LocalStore,
    remote: Arc<dyn RemoteClient>,
    connectivity: ConnectivityMonitor,
    settings: SyncSettings,
    events: BroadcastEmitter,
    emitter: Arc<dyn SyncEventEmitter>,
    in_flight: AtomicBool,
    failures: AtomicU32,
    status: RwLock<StatusInner>,
}

impl SyncEngine {
    pub fn new(
        store: LocalStore,
        remote: Arc<dyn RemoteClient>,
        connectivity: ConnectivityMonitor,
        settings: SyncSettings,
    ) -> Self {
        Self::with_emitter(store, remote, connectivity, settings, Arc::new(NoOpEmitter))
    }

    /// Like [`SyncEngine::new`], with an extra observer that sees every
    /// event alongside broadcast subscribers.
    pub fn with_emitter(
        store: LocalStore,
        remote: Arc<dyn RemoteClient>,
        connectivity: ConnectivityMonitor,
        settings: SyncSettings,
        emitter: Arc<dyn SyncEventEmitter>,
    ) -> Self {
        SyncEngine {
            store,
            remote,
            connectivity,
            settings,
            events: BroadcastEmitter::default(),
            emitter,
            in_flight: AtomicBool::new(false),
            failures: AtomicU32::new(0),
            status: RwLock::new(StatusInner {
                state: SyncState::Idle,
                last_error: None,
                last_report: None,
            }),
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures.load(Ordering::Acquire)
    }

    pub async fn status(&self) -> SyncResult<SyncStatus> {
        let pending_count = self.store.pending_count().await?;
        let last_sync = self.store.last_sync().await?;
        let inner = self.status.read().await;

        let state = if self.is_syncing() {
            SyncState::Syncing
        } else {
            inner.state
        };

        Ok(SyncStatus {
            state,
            online: self.connectivity.is_online(),
            last_sync,
            pending_count,
            consecutive_failures: self.consecutive_failures(),
            last_error: inner.last_error.clone(),
            last_report: inner.last_report.clone(),
        })
    }

    fn emit(&self, event: SyncEvent) {
        self.emitter.emit(&event);
        self.events.emit(&event);
    }

    async fn set_state(&self, state: SyncState) {
        self.status.write().await.state = state;
        self.emit(SyncEvent::StateChanged { state });
    }

    // =========================================================================
    // Attempt
    // =========================================================================

    /// Runs one push-then-pull attempt.
    ///
    /// Returns immediately when offline or when another attempt is running.
    pub async fn sync_now(&self) -> SyncOutcome {
        if !self.connectivity.is_online() {
            debug!("Offline, skipping sync");
            return SyncOutcome::Skipped(SkipReason::Offline);
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Sync already in progress, skipping");
            return SyncOutcome::Skipped(SkipReason::InFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        self.set_state(SyncState::Syncing).await;
        info!("Sync started");

        let mut report = SyncReport {
            started_at: Some(timestamp::now()),
            ..Default::default()
        };

        match self.run_attempt(&mut report).await {
            Ok(()) => {
                report.finished_at = Some(timestamp::now());
                self.failures.store(0, Ordering::Release);

                info!(
                    pushed = report.pushed,
                    push_failures = report.push_failures,
                    pulled = report.pulled(),
                    kept_local = report.kept_local,
                    "Sync completed"
                );

                {
                    let mut status = self.status.write().await;
                    status.last_error = None;
                    status.last_report = Some(report.clone());
                }
                self.set_state(SyncState::Succeeded).await;
                self.emit(SyncEvent::Completed {
                    report: report.clone(),
                });
                self.set_state(SyncState::Idle).await;

                SyncOutcome::Completed(report)
            }
            Err(e) => self.record_failure(e).await,
        }
    }

    async fn run_attempt(&self, report: &mut SyncReport) -> SyncResult<()> {
        let started = report.started_at.unwrap_or_else(timestamp::now);

        self.push(report).await?;
        self.pull(report).await?;

        self.store.set_last_sync(started).await?;

        if let Some(retention) = self.settings.change_retention() {
            report.pruned = self.store.prune_synced_changes(started - retention).await?;
            if report.pruned > 0 {
                debug!(pruned = report.pruned, "Pruned synced changes");
            }
        }

        Ok(())
    }

    async fn record_failure(&self, err: SyncError) -> SyncOutcome {
        let failures = self.failures.fetch_add(1, Ordering::AcqRel) + 1;
        let message = err.to_string();

        error!(
            error = %err,
            transport = err.is_transport_failure(),
            consecutive_failures = failures,
            threshold = self.settings.failure_threshold,
            "Sync failed"
        );

        self.status.write().await.last_error = Some(message.clone());
        self.set_state(SyncState::Failed).await;
        self.emit(SyncEvent::Failed {
            error: message.clone(),
            consecutive_failures: failures,
        });

        let mut reset_triggered = false;
        if failures >= self.settings.failure_threshold {
            warn!(
                failures,
                "Failure threshold reached, resetting local store; unsynced local changes are discarded"
            );
            match self.store.reset().await {
                Ok(()) => {
                    self.failures.store(0, Ordering::Release);
                    reset_triggered = true;
                    self.emit(SyncEvent::StoreReset);
                }
                Err(e) => error!(error = %e, "Local store reset failed"),
            }
        }

        self.set_state(SyncState::Idle).await;

        SyncOutcome::Failed {
            error: message,
            consecutive_failures: failures,
            reset_triggered,
        }
    }

    // =========================================================================
    // Push
    // =========================================================================

    async fn push(&self, report: &mut SyncReport) -> SyncResult<()> {
        let changes = self.store.get_unsynced_changes().await?;
        if changes.is_empty() {
            return Ok(());
        }

        debug!(count = changes.len(), "Pushing local changes");

        // Server ids learned from creates earlier in this batch
        let mut linked: HashMap<i64, i64> = HashMap::new();
        // Local products whose create failed in this batch
        let mut unpushed: HashSet<i64> = HashSet::new();

        for change in changes {
            let result = if waits_for_create(&change, &unpushed) {
                Err(SyncError::Internal(
                    "product has not been created on the server yet".into(),
                ))
            } else {
                self.push_one(&change, &mut linked).await
            };

            match result {
                Ok(()) => {
                    self.store.mark_change_synced(change.id).await?;
                    report.pushed += 1;
                    self.emit(SyncEvent::ChangePushed {
                        change_id: change.id,
                        action: change.action,
                    });
                }
                Err(e) if e.is_storage_failure() => return Err(e),
                Err(e) => {
                    warn!(
                        change_id = change.id,
                        action = %change.action,
                        barcode = %change.payload.barcode,
                        error = %e,
                        "Failed to push change, leaving it queued"
                    );
                    if change.action == ChangeAction::Create {
                        if let Some(local_id) = change.payload.id {
                            unpushed.insert(local_id);
                        }
                    }
                    report.push_failures += 1;
                    self.emit(SyncEvent::ChangeFailed {
                        change_id: change.id,
                        action: change.action,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    async fn push_one(
        &self,
        change: &PendingChange,
        linked: &mut HashMap<i64, i64>,
    ) -> SyncResult<()> {
        let product = &change.payload;

        match change.action {
            ChangeAction::Create => {
                let created = self.remote.create_product(&product.to_payload()).await?;

                if let Some(local_id) = product.id {
                    linked.insert(local_id, created.id);
                    match self.store.set_remote_id(local_id, created.id).await {
                        Ok(()) => {}
                        // Deleted locally since; the queued delete carries the id
                        Err(catalog_db::DbError::NotFound { .. }) => {}
                        Err(e) => return Err(e.into()),
                    }
                }

                debug!(change_id = change.id, remote_id = created.id, "Created on server");
                Ok(())
            }
            ChangeAction::Update => {
                let id = self.resolve_server_id(change, linked).await?;
                self.remote.update_product(id, &product.to_payload()).await?;
                debug!(change_id = change.id, remote_id = id, "Updated on server");
                Ok(())
            }
            ChangeAction::Delete => {
                let id = self.resolve_server_id(change, linked).await?;
                match self.remote.delete_product(id).await {
                    Ok(()) => {}
                    Err(SyncError::RemoteNotFound(_)) => {
                        debug!(remote_id = id, "Already gone on server");
                    }
                    Err(e) => return Err(e),
                }
                debug!(change_id = change.id, remote_id = id, "Deleted on server");
                Ok(())
            }
        }
    }

    /// Server id for an update or delete: the id carried in the queued
    /// snapshot, then one linked earlier in this batch, then the current
    /// local row's link, then the local id itself.
    async fn resolve_server_id(
        &self,
        change: &PendingChange,
        linked: &HashMap<i64, i64>,
    ) -> SyncResult<i64> {
        let product = &change.payload;

        if let Some(remote_id) = product.remote_id {
            return Ok(remote_id);
        }

        let Some(local_id) = product.id else {
            return Err(SyncError::Internal(format!(
                "change {} has no product id",
                change.id
            )));
        };

        if let Some(remote_id) = linked.get(&local_id) {
            return Ok(*remote_id);
        }

        let current = self.store.get_by_id(local_id).await?;
        Ok(current.and_then(|p| p.remote_id).unwrap_or(local_id))
    }

    // =========================================================================
    // Pull
    // =========================================================================

    async fn pull(&self, report: &mut SyncReport) -> SyncResult<()> {
        let since = self.store.last_sync().await?;
        let since_millis = since.as_ref().map(timestamp::to_millis);

        let products = self.remote.list_products(since_millis).await?;
        debug!(count = products.len(), since = ?since, "Pulled remote products");

        for dto in products {
            let remote_id = dto.id;
            let mut remote = match dto.into_product() {
                Ok(product) => product,
                Err(e) => {
                    warn!(remote_id, error = %e, "Skipping unusable remote product");
                    report.pull_skipped += 1;
                    continue;
                }
            };

            let local = self.store.get_by_barcode(&remote.barcode).await?;

            let inserted = match decide(local.as_ref(), &remote) {
                MergeDecision::KeepLocal => {
                    report.kept_local += 1;
                    continue;
                }
                MergeDecision::Insert => true,
                MergeDecision::Overwrite { local_id } => {
                    remote.id = Some(local_id);
                    false
                }
            };

            match self.store.save_remote(&remote).await {
                Ok(_) => {
                    if inserted {
                        report.pulled_new += 1;
                    } else {
                        report.pulled_updated += 1;
                    }
                    self.emit(SyncEvent::ProductPulled {
                        barcode: remote.barcode.clone(),
                        inserted,
                    });
                }
                Err(e) if e.is_storage_failure() => return Err(e.into()),
                Err(e) => {
                    warn!(remote_id, barcode = %remote.barcode, error = %e, "Skipping remote product");
                    report.pull_skipped += 1;
                }
            }
        }

        Ok(())
    }

    // =========================================================================
    // Background Driver
    // =========================================================================

    /// Starts the trigger loop and returns a handle to it.
    ///
    /// An attempt runs right away if online.
    pub fn spawn(self: Arc<Self>) -> SyncEngineHandle {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let engine = self.clone();
        let task = tokio::spawn(async move { engine.drive(trigger_rx, shutdown_rx).await });

        SyncEngineHandle {
            engine: self,
            trigger: SyncTrigger { tx: trigger_tx },
            shutdown_tx,
            task,
        }
    }

    async fn drive(
        self: Arc<Self>,
        mut trigger_rx: mpsc::Receiver<()>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let interval = self.settings.interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let mut online_rx = self.connectivity.subscribe();

        let mut backoff = ExponentialBackoff {
            initial_interval: self.settings.retry_delay(),
            max_interval: self.settings.max_backoff(),
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };
        let mut retry_at: Option<Instant> = None;

        info!(interval_secs = interval.as_secs(), "Sync driver started");

        let mut run_now = true;
        loop {
            if run_now {
                match self.sync_now().await {
                    SyncOutcome::Completed(_) => {
                        backoff.reset();
                        retry_at = None;
                    }
                    SyncOutcome::Failed { .. } => {
                        retry_at = backoff.next_backoff().map(|delay| {
                            debug!(?delay, "Scheduling sync retry");
                            Instant::now() + delay
                        });
                    }
                    SyncOutcome::Skipped(_) => {}
                }
            }

            let deadline = retry_at;
            let retry = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            run_now = tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => true,
                Some(()) = trigger_rx.recv() => true,
                changed = online_rx.changed() => match changed {
                    Ok(()) => *online_rx.borrow_and_update(),
                    Err(_) => break,
                },
                _ = retry => {
                    retry_at = None;
                    true
                }
            };
        }

        info!("Sync driver stopped");
    }
}

/// True for an update or delete of a product whose create is still queued
/// behind a failure; it has no server id to target yet.
fn waits_for_create(change: &PendingChange, unpushed: &HashSet<i64>) -> bool {
    change.action != ChangeAction::Create
        && change.payload.remote_id.is_none()
        && change
            .payload
            .id
            .is_some_and(|local_id| unpushed.contains(&local_id))
}

// =============================================================================
// Handles
// =============================================================================

/// Cloneable "please sync soon" sender. Extra requests while one is already
/// pending are dropped.
#[derive(Debug, Clone)]
pub struct SyncTrigger {
    tx: mpsc::Sender<()>,
}

impl SyncTrigger {
    /// Returns false if the request was coalesced or the driver is gone.
    pub fn request(&self) -> bool {
        self.tx.try_send(()).is_ok()
    }
}

/// Control surface for a running driver.
pub struct SyncEngineHandle {
    engine: Arc<SyncEngine>,
    trigger: SyncTrigger,
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl SyncEngineHandle {
    pub fn request_sync(&self) -> bool {
        self.trigger.request()
    }

    pub fn trigger(&self) -> SyncTrigger {
        self.trigger.clone()
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    pub async fn status(&self) -> SyncResult<SyncStatus> {
        self.engine.status().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.engine.subscribe()
    }

    /// Stops the driver. An attempt in progress finishes first.
    pub async fn shutdown(self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ShuttingDown)?;
        self.task
            .await
            .map_err(|e| SyncError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::catalog::Catalog;
    use catalog_core::{Money, Product, ProductDraft, ProductDto, ProductPayload};
    use catalog_db::{Database, DbConfig};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    // =========================================================================
    // In-memory product API
    // =========================================================================

    #[derive(Default)]
    struct MockRemote {
        products: Mutex<Vec<ProductDto>>,
        next_id: Mutex<i64>,
        calls: Mutex<Vec<String>>,
        unreachable: AtomicBool,
        fail_creates: AtomicBool,
        fail_deletes: AtomicBool,
        gated: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    impl MockRemote {
        fn with_products(products: Vec<ProductDto>) -> Arc<Self> {
            let remote = MockRemote::default();
            *remote.products.lock().unwrap() = products;
            *remote.next_id.lock().unwrap() = 100;
            Arc::new(remote)
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) -> SyncResult<()> {
            self.calls.lock().unwrap().push(call);
            if self.unreachable.load(Ordering::SeqCst) {
                return Err(SyncError::Connection("connection refused".into()));
            }
            Ok(())
        }

        fn dto(&self, id: i64, payload: &ProductPayload) -> ProductDto {
            let now = timestamp::now();
            ProductDto {
                id,
                name: payload.name.clone(),
                price: payload.price,
                barcode: payload.barcode.clone(),
                description: payload.description.clone(),
                created_at: now,
                updated_at: now,
            }
        }
    }

    #[async_trait]
    impl RemoteClient for MockRemote {
        async fn list_products(&self, since_millis: Option<i64>) -> SyncResult<Vec<ProductDto>> {
            self.record(format!("list:{:?}", since_millis))?;

            if self.gated.load(Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }

            let products = self.products.lock().unwrap();
            Ok(products
                .iter()
                .filter(|p| since_millis.map_or(true, |s| timestamp::to_millis(&p.updated_at) > s))
                .cloned()
                .collect())
        }

        async fn get_product_by_barcode(&self, barcode: &str) -> SyncResult<Option<ProductDto>> {
            self.record(format!("barcode:{}", barcode))?;
            let products = self.products.lock().unwrap();
            Ok(products.iter().find(|p| p.barcode == barcode).cloned())
        }

        async fn create_product(&self, payload: &ProductPayload) -> SyncResult<ProductDto> {
            self.record(format!("create:{}", payload.barcode))?;
            if self.fail_creates.load(Ordering::SeqCst) {
                return Err(SyncError::RemoteStatus {
                    status: 503,
                    message: "unavailable".into(),
                });
            }
            let id = {
                let mut next = self.next_id.lock().unwrap();
                *next += 1;
                *next
            };
            let dto = self.dto(id, payload);
            self.products.lock().unwrap().push(dto.clone());
            Ok(dto)
        }

        async fn update_product(&self, id: i64, payload: &ProductPayload) -> SyncResult<ProductDto> {
            self.record(format!("update:{}", id))?;
            let dto = self.dto(id, payload);
            let mut products = self.products.lock().unwrap();
            match products.iter_mut().find(|p| p.id == id) {
                Some(existing) => {
                    *existing = dto.clone();
                    Ok(dto)
                }
                None => Err(SyncError::RemoteNotFound(format!("/api/products/{}", id))),
            }
        }

        async fn delete_product(&self, id: i64) -> SyncResult<()> {
            self.record(format!("delete:{}", id))?;
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(SyncError::Connection("connection reset".into()));
            }
            let mut products = self.products.lock().unwrap();
            let before = products.len();
            products.retain(|p| p.id != id);
            if products.len() == before {
                return Err(SyncError::RemoteNotFound(format!("/api/products/{}", id)));
            }
            Ok(())
        }

        async fn check_connectivity(&self) -> bool {
            !self.unreachable.load(Ordering::SeqCst)
        }
    }

    // =========================================================================
    // Fixtures
    // =========================================================================

    fn ts(raw: &str) -> DateTime<Utc> {
        timestamp::parse_utc(raw).unwrap()
    }

    fn remote_product(id: i64, barcode: &str, name: &str, updated: &str) -> ProductDto {
        ProductDto {
            id,
            name: name.into(),
            price: 19.99,
            barcode: barcode.into(),
            description: None,
            created_at: ts("2023-01-01T00:00:00Z"),
            updated_at: ts(updated),
        }
    }

    fn widget(barcode: &str) -> Product {
        Product::new("Widget", Money::from_cents(1999), barcode)
    }

    async fn setup(remote: Arc<MockRemote>, online: bool) -> Arc<SyncEngine> {
        let store = Database::new(DbConfig::in_memory()).await.unwrap().store();
        Arc::new(SyncEngine::new(
            store,
            remote,
            ConnectivityMonitor::new(online),
            SyncSettings::default(),
        ))
    }

    /// Stores a product as if it had arrived from the server, so nothing is
    /// queued.
    async fn seed_local(engine: &SyncEngine, barcode: &str, name: &str, updated: &str) -> i64 {
        let mut product = widget(barcode);
        product.name = name.into();
        product.updated_at = ts(updated);
        engine.store().save_remote(&product).await.unwrap()
    }

    // =========================================================================
    // Attempts
    // =========================================================================

    #[tokio::test]
    async fn test_first_pull_inserts_remote_products() {
        let remote = MockRemote::with_products(vec![remote_product(
            1,
            "B1",
            "Widget",
            "2024-01-02T00:00:00Z",
        )]);
        let engine = setup(remote.clone(), true).await;

        let outcome = engine.sync_now().await;
        let SyncOutcome::Completed(report) = outcome else {
            panic!("expected completed sync, got {:?}", outcome);
        };
        assert_eq!(report.pulled_new, 1);

        let product = engine.store().get_by_barcode("B1").await.unwrap().unwrap();
        assert_eq!(product.name, "Widget");
        assert_eq!(product.remote_id, Some(1));
        assert_eq!(product.updated_at, ts("2024-01-02T00:00:00Z"));
        assert!(product.from_remote);

        assert_eq!(engine.store().pending_count().await.unwrap(), 0);
        assert!(engine.store().last_sync().await.unwrap().is_some());
        assert_eq!(remote.calls(), vec!["list:None".to_string()]);
    }

    #[tokio::test]
    async fn test_older_remote_copy_leaves_local_unchanged() {
        let remote = MockRemote::with_products(vec![remote_product(
            1,
            "B1",
            "Stale",
            "2023-12-31T00:00:00Z",
        )]);
        let engine = setup(remote, true).await;
        let id = seed_local(&engine, "B1", "Local", "2024-01-01T00:00:00Z").await;

        let SyncOutcome::Completed(report) = engine.sync_now().await else {
            panic!("expected completed sync");
        };
        assert_eq!(report.kept_local, 1);

        let product = engine.store().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(product.name, "Local");
        assert_eq!(product.updated_at, ts("2024-01-01T00:00:00Z"));
    }

    #[tokio::test]
    async fn test_newer_remote_copy_overwrites_in_place() {
        let remote = MockRemote::with_products(vec![remote_product(
            7,
            "B1",
            "Fresh",
            "2024-01-03T00:00:00Z",
        )]);
        let engine = setup(remote, true).await;
        let id = seed_local(&engine, "B1", "Local", "2024-01-01T00:00:00Z").await;

        engine.sync_now().await;

        let product = engine.store().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(product.name, "Fresh");
        assert_eq!(product.remote_id, Some(7));
        assert_eq!(engine.store().product_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_second_pull_asks_only_for_newer_products() {
        let remote = MockRemote::with_products(Vec::new());
        let engine = setup(remote.clone(), true).await;

        engine.sync_now().await;
        let last_sync = engine.store().last_sync().await.unwrap().unwrap();
        engine.sync_now().await;

        assert_eq!(
            remote.calls()[1],
            format!("list:{:?}", Some(timestamp::to_millis(&last_sync)))
        );
    }

    #[tokio::test]
    async fn test_failed_delete_stays_queued_while_create_syncs() {
        let remote = MockRemote::with_products(Vec::new());
        remote.fail_deletes.store(true, Ordering::SeqCst);
        let engine = setup(remote.clone(), true).await;

        let b2 = engine.store().save(&widget("B2")).await.unwrap();
        let mut gone = widget("B5");
        gone.id = Some(5);
        engine
            .store()
            .append_change(ChangeAction::Delete, &gone)
            .await
            .unwrap();

        let outcome = engine.sync_now().await;
        let SyncOutcome::Completed(report) = outcome else {
            panic!("expected completed sync, got {:?}", outcome);
        };
        assert_eq!((report.pushed, report.push_failures), (1, 1));

        let unsynced = engine.store().get_unsynced_changes().await.unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].action, ChangeAction::Delete);

        let linked = engine.store().get_by_id(b2).await.unwrap().unwrap();
        assert_eq!(linked.remote_id, Some(101));
        assert_eq!(&remote.calls()[..2], ["create:B2", "delete:5"]);
    }

    #[tokio::test]
    async fn test_full_push_empties_queue_and_reuses_new_ids() {
        let remote = MockRemote::with_products(Vec::new());
        let engine = setup(remote.clone(), true).await;
        let store = engine.store();

        let id = store.save(&widget("B1")).await.unwrap();
        let mut edited = store.get_by_id(id).await.unwrap().unwrap();
        edited.name = "Widget Pro".into();
        store.save(&edited).await.unwrap();
        store.save(&widget("B2")).await.unwrap();

        assert!(engine.sync_now().await.is_completed());
        assert!(store.get_unsynced_changes().await.unwrap().is_empty());

        // The update targets the id the server assigned to the create
        assert_eq!(
            &remote.calls()[..3],
            ["create:B1", "update:101", "create:B2"]
        );
        assert_eq!(remote.products.lock().unwrap()[0].name, "Widget Pro");
    }

    #[tokio::test]
    async fn test_edits_wait_for_a_failed_create() {
        let remote = MockRemote::with_products(vec![remote_product(
            1,
            "THEIRS",
            "Someone else's",
            "2024-01-01T00:00:00Z",
        )]);
        remote.fail_creates.store(true, Ordering::SeqCst);
        let engine = setup(remote.clone(), true).await;
        let store = engine.store();

        // Local id 1 collides with the unrelated server product 1
        let id = store.save(&widget("MINE")).await.unwrap();
        assert_eq!(id, 1);
        let mut edited = store.get_by_id(id).await.unwrap().unwrap();
        edited.name = "Mine, edited".into();
        store.save(&edited).await.unwrap();
        store.delete(id).await.unwrap();

        let SyncOutcome::Completed(report) = engine.sync_now().await else {
            panic!("expected completed sync");
        };
        assert_eq!((report.pushed, report.push_failures), (0, 3));
        assert_eq!(remote.calls()[0], "create:MINE");
        assert!(!remote
            .calls()
            .iter()
            .any(|c| c.starts_with("update:") || c.starts_with("delete:")));

        let actions: Vec<_> = store
            .get_unsynced_changes()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.action)
            .collect();
        assert_eq!(
            actions,
            vec![ChangeAction::Create, ChangeAction::Update, ChangeAction::Delete]
        );
        assert_eq!(remote.products.lock().unwrap()[0].name, "Someone else's");

        // Once the server accepts the create, the edits follow it
        remote.fail_creates.store(false, Ordering::SeqCst);
        assert!(engine.sync_now().await.is_completed());
        assert!(store.get_unsynced_changes().await.unwrap().is_empty());

        let calls = remote.calls();
        let tail: Vec<_> = calls
            .iter()
            .filter(|c| !c.starts_with("list:"))
            .skip(1)
            .cloned()
            .collect();
        assert_eq!(tail, ["create:MINE", "update:101", "delete:101"]);

        let products = remote.products.lock().unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Someone else's");
    }

    #[tokio::test]
    async fn test_delete_already_gone_on_server_counts_as_synced() {
        let remote = MockRemote::with_products(Vec::new());
        let engine = setup(remote, true).await;

        let mut gone = widget("B9");
        gone.id = Some(9);
        gone.remote_id = Some(42);
        engine
            .store()
            .append_change(ChangeAction::Delete, &gone)
            .await
            .unwrap();

        assert!(engine.sync_now().await.is_completed());
        assert_eq!(engine.store().pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_offline_attempt_is_skipped() {
        let remote = MockRemote::with_products(Vec::new());
        let engine = setup(remote.clone(), false).await;

        assert_eq!(
            engine.sync_now().await,
            SyncOutcome::Skipped(SkipReason::Offline)
        );
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_attempt_is_dropped() {
        let remote = MockRemote::with_products(Vec::new());
        remote.gated.store(true, Ordering::SeqCst);
        let engine = setup(remote.clone(), true).await;

        let running = tokio::spawn({
            let engine = engine.clone();
            async move { engine.sync_now().await }
        });
        remote.entered.notified().await;

        assert!(engine.is_syncing());
        assert_eq!(
            engine.sync_now().await,
            SyncOutcome::Skipped(SkipReason::InFlight)
        );

        remote.release.notify_one();
        assert!(running.await.unwrap().is_completed());
        assert!(!engine.is_syncing());
    }

    #[tokio::test]
    async fn test_three_failures_reset_store_once() {
        let remote = MockRemote::with_products(Vec::new());
        remote.unreachable.store(true, Ordering::SeqCst);
        let engine = setup(remote, true).await;
        let mut events = engine.subscribe();

        engine.store().save(&widget("B1")).await.unwrap();

        for expected in 1..=2 {
            match engine.sync_now().await {
                SyncOutcome::Failed {
                    consecutive_failures,
                    reset_triggered,
                    ..
                } => {
                    assert_eq!(consecutive_failures, expected);
                    assert!(!reset_triggered);
                }
                other => panic!("expected failure, got {:?}", other),
            }
        }
        assert_eq!(engine.store().product_count().await.unwrap(), 1);

        let SyncOutcome::Failed {
            consecutive_failures,
            reset_triggered,
            ..
        } = engine.sync_now().await
        else {
            panic!("expected failure");
        };
        assert_eq!(consecutive_failures, 3);
        assert!(reset_triggered);
        assert_eq!(engine.consecutive_failures(), 0);

        assert_eq!(engine.store().product_count().await.unwrap(), 0);
        assert_eq!(engine.store().pending_count().await.unwrap(), 0);

        let mut resets = 0;
        while let Ok(event) = events.try_recv() {
            if event == SyncEvent::StoreReset {
                resets += 1;
            }
        }
        assert_eq!(resets, 1);
    }

    #[tokio::test]
    async fn test_success_clears_failure_count() {
        let remote = MockRemote::with_products(Vec::new());
        remote.unreachable.store(true, Ordering::SeqCst);
        let engine = setup(remote.clone(), true).await;

        engine.sync_now().await;
        engine.sync_now().await;
        assert_eq!(engine.consecutive_failures(), 2);

        let status = engine.status().await.unwrap();
        assert!(status.last_error.is_some());

        remote.unreachable.store(false, Ordering::SeqCst);
        assert!(engine.sync_now().await.is_completed());
        assert_eq!(engine.consecutive_failures(), 0);

        let status = engine.status().await.unwrap();
        assert_eq!(status.state, SyncState::Idle);
        assert!(status.last_error.is_none());
        assert!(status.last_report.is_some());
    }

    // =========================================================================
    // Driver
    // =========================================================================

    async fn next_completion(events: &mut broadcast::Receiver<SyncEvent>) -> SyncReport {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(SyncEvent::Completed { report }) = events.recv().await {
                    return report;
                }
            }
        })
        .await
        .expect("sync did not complete in time")
    }

    #[tokio::test]
    async fn test_driver_syncs_on_request() {
        let remote = MockRemote::with_products(Vec::new());
        let engine = setup(remote, true).await;
        let mut events = engine.subscribe();

        let handle = engine.clone().spawn();
        next_completion(&mut events).await;

        engine.store().save(&widget("B1")).await.unwrap();
        handle.request_sync();
        let report = next_completion(&mut events).await;
        assert_eq!(report.pushed, 1);

        assert_eq!(handle.status().await.unwrap().pending_count, 0);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_catalog_mutation_kicks_the_driver() {
        let remote = MockRemote::with_products(Vec::new());
        let engine = setup(remote.clone(), true).await;
        let mut events = engine.subscribe();

        let handle = engine.clone().spawn();
        next_completion(&mut events).await;

        let catalog = Catalog::new(
            engine.store().clone(),
            remote.clone(),
            engine.connectivity().clone(),
        )
        .with_sync_trigger(handle.trigger());

        let added = catalog
            .add_product(ProductDraft {
                name: "Widget".into(),
                price: Money::from_cents(1999),
                barcode: "B1".into(),
                description: None,
            })
            .await
            .unwrap();

        let report = next_completion(&mut events).await;
        assert_eq!(report.pushed, 1);
        assert!(remote.calls().contains(&"create:B1".to_string()));

        let linked = engine.store().get_by_id(added.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(linked.remote_id, Some(101));
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_driver_syncs_on_timer() {
        let remote = MockRemote::with_products(Vec::new());
        let store = Database::new(DbConfig::in_memory()).await.unwrap().store();
        let settings = SyncSettings {
            interval_secs: 1,
            ..SyncSettings::default()
        };
        let engine = Arc::new(SyncEngine::new(
            store,
            remote.clone(),
            ConnectivityMonitor::new(true),
            settings,
        ));
        let mut events = engine.subscribe();

        let handle = engine.clone().spawn();
        next_completion(&mut events).await;

        // Nothing requests a sync; only the tick can pick this up
        let mut fresh = remote_product(1, "B1", "Widget", "2024-01-02T00:00:00Z");
        fresh.updated_at = timestamp::now() + chrono::Duration::seconds(1);
        remote.products.lock().unwrap().push(fresh);

        let report = next_completion(&mut events).await;
        assert_eq!(report.pulled_new, 1);
        assert_eq!(
            remote.calls().iter().filter(|c| c.starts_with("list:")).count(),
            2
        );
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_pending_request_absorbs_more_requests() {
        let (tx, rx) = mpsc::channel(1);
        let trigger = SyncTrigger { tx };

        assert!(trigger.request());
        assert!(!trigger.request());
        assert!(!trigger.clone().request());

        drop(rx);
        assert!(!trigger.request());
    }

    #[tokio::test]
    async fn test_status_is_idle_before_any_attempt() {
        let engine = setup(MockRemote::with_products(Vec::new()), true).await;

        let status = engine.status().await.unwrap();
        assert_eq!(status.state, SyncState::Idle);
        assert!(status.last_report.is_none());
        assert!(status.last_error.is_none());
    }

    #[tokio::test]
    async fn test_driver_syncs_when_coming_online() {
        let remote = MockRemote::with_products(vec![remote_product(
            1,
            "B1",
            "Widget",
            "2024-01-02T00:00:00Z",
        )]);
        let engine = setup(remote, false).await;
        let mut events = engine.subscribe();

        let handle = engine.clone().spawn();
        engine.connectivity().set_online(true);

        let report = next_completion(&mut events).await;
        assert_eq!(report.pulled_new, 1);
        handle.shutdown().await.unwrap();
    }
}
