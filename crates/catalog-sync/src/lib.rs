//! # catalog-sync: Sync Engine for the Product Catalog
//!
//! Keeps the offline-first local store in step with the product API.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Layer Architecture                          │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                     Catalog (front-end facade)                    │  │
//! │  │  list / get / scan / add / update / delete                        │  │
//! │  └───────────────┬───────────────────────────────┬──────────────────┘  │
//! │                  │ writes + queued changes       │ request_sync()       │
//! │                  ▼                               ▼                      │
//! │  ┌────────────────────────┐        ┌─────────────────────────────────┐ │
//! │  │  LocalStore (catalog-db)│◄──────│  SyncEngine                     │ │
//! │  │  products               │        │  push queue → pull since last  │ │
//! │  │  pending_changes        │        │  LWW merge, reset after N fails│ │
//! │  │  sync_meta              │        │  driver: timer, online edge,   │ │
//! │  └────────────────────────┘        │  requests, backoff retry        │ │
//! │                                     └───────────────┬─────────────────┘ │
//! │                                                     │                   │
//! │  ┌────────────────────────┐        ┌────────────────▼────────────────┐ │
//! │  │  ConnectivityMonitor   │───────►│  dyn RemoteClient               │ │
//! │  │  watch<bool> + probe   │        │  └── HttpRemoteClient (reqwest) │ │
//! │  └────────────────────────┘        └─────────────────────────────────┘ │
//! │                                                                         │
//! │  EVENTS: SyncEvent over broadcast (state, per-change, completed,       │
//! │          failed, store reset)                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`catalog`] - `Catalog` facade used by front ends
//! - [`config`] - TOML + environment configuration
//! - [`connectivity`] - Online/offline flag and probe
//! - [`engine`] - `SyncEngine`, background driver and handle
//! - [`error`] - Sync error types
//! - [`events`] - Engine states, events and emitters
//! - [`http`] - reqwest implementation of [`RemoteClient`]
//! - [`merge`] - Last-write-wins decision
//! - [`remote`] - The `RemoteClient` trait
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use catalog_sync::{Catalog, CatalogConfig, ConnectivityMonitor, HttpRemoteClient, SyncEngine};
//!
//! let config = CatalogConfig::load(None)?;
//! let store = database.store();
//! let remote = Arc::new(HttpRemoteClient::new(&config.api)?);
//! let connectivity = ConnectivityMonitor::new(true);
//!
//! let engine = Arc::new(SyncEngine::new(
//!     store.clone(),
//!     remote.clone(),
//!     connectivity.clone(),
//!     config.sync.clone(),
//! ));
//! let handle = engine.spawn();
//!
//! let catalog = Catalog::new(store, remote, connectivity).with_sync_trigger(handle.trigger());
//! catalog.add_product(draft).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod config;
pub mod connectivity;
pub mod engine;
pub mod error;
pub mod events;
pub mod http;
pub mod merge;
pub mod remote;

// =============================================================================
// Re-exports
// =============================================================================

pub use catalog::Catalog;
pub use config::{ApiSettings, CatalogConfig, DatabaseSettings, SyncSettings};
pub use connectivity::ConnectivityMonitor;
pub use engine::{SkipReason, SyncEngine, SyncEngineHandle, SyncOutcome, SyncStatus, SyncTrigger};
pub use error::{SyncError, SyncResult};
pub use events::{
    BroadcastEmitter, NoOpEmitter, SyncEvent, SyncEventEmitter, SyncReport, SyncState,
};
pub use http::HttpRemoteClient;
pub use merge::MergeDecision;
pub use remote::RemoteClient;
