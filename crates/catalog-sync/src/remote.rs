//! # Remote Client Interface
//!
//! The seam between the sync engine and the product API.
//!
//! ```text
//! ┌───────────────┐   list_products(since)      ┌──────────────────────┐
//! │               │ ──────────────────────────► │                      │
//! │  SyncEngine   │   create / update / delete  │  dyn RemoteClient    │
//! │  Catalog      │ ──────────────────────────► │  ├── HttpRemoteClient│
//! │               │   get_product_by_barcode    │  └── test doubles    │
//! └───────────────┘ ──────────────────────────► └──────────────────────┘
//! ```
//!
//! Engine and facade hold an `Arc<dyn RemoteClient>`, so tests swap in an
//! in-process double without touching the network.

use async_trait::async_trait;
use catalog_core::{ProductDto, ProductPayload};

use crate::error::SyncResult;

/// Operations the catalog needs from the product API.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Products updated after `since_millis` (Unix epoch milliseconds), or
    /// every product when `None`.
    ///
    /// An empty or unreadable list body is reported as an empty list.
    async fn list_products(&self, since_millis: Option<i64>) -> SyncResult<Vec<ProductDto>>;

    /// Looks a product up by barcode. `Ok(None)` when the server has none.
    async fn get_product_by_barcode(&self, barcode: &str) -> SyncResult<Option<ProductDto>>;

    /// Creates a product; the server assigns id and timestamps.
    async fn create_product(&self, payload: &ProductPayload) -> SyncResult<ProductDto>;

    /// Replaces the product with server id `id`.
    async fn update_product(&self, id: i64, payload: &ProductPayload) -> SyncResult<ProductDto>;

    /// Deletes the product with server id `id`.
    ///
    /// Fails with `SyncError::RemoteNotFound` when the server has no such
    /// product.
    async fn delete_product(&self, id: i64) -> SyncResult<()>;

    /// Cheap reachability check used by the connectivity probe.
    async fn check_connectivity(&self) -> bool;
}
