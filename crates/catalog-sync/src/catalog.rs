//! # Catalog Facade
//!
//! What a front end talks to. Reads and writes go to the local store, so
//! everything works offline; each local mutation then nudges the sync
//! driver.
//!
//! ```text
//!   add / update / delete ──► LocalStore (product + queued change)
//!                                   │
//!                                   └──► SyncTrigger::request()  (coalesced)
//!
//!   find_by_barcode ──► LocalStore ──miss + online──► RemoteClient
//!                                                        │
//!                                   cached via save_remote ◄┘
//! ```

use catalog_core::{Product, ProductDraft, ProductUpdate};
use catalog_db::LocalStore;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::connectivity::ConnectivityMonitor;
use crate::engine::SyncTrigger;
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteClient;

#[derive(Clone)]
pub struct Catalog {
    store: LocalStore,
    remote: Arc<dyn RemoteClient>,
    connectivity: ConnectivityMonitor,
    trigger: Option<SyncTrigger>,
}

impl Catalog {
    pub fn new(
        store: LocalStore,
        remote: Arc<dyn RemoteClient>,
        connectivity: ConnectivityMonitor,
    ) -> Self {
        Catalog {
            store,
            remote,
            connectivity,
            trigger: None,
        }
    }

    /// Mutations will request a sync through `trigger`.
    pub fn with_sync_trigger(mut self, trigger: SyncTrigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn list_products(&self) -> SyncResult<Vec<Product>> {
        Ok(self.store.get_all().await?)
    }

    pub async fn search_products(&self, query: &str, limit: u32) -> SyncResult<Vec<Product>> {
        Ok(self.store.search(query, limit).await?)
    }

    pub async fn get_product(&self, id: i64) -> SyncResult<Option<Product>> {
        Ok(self.store.get_by_id(id).await?)
    }

    /// Local lookup, falling back to the server when online.
    ///
    /// A server hit is stored locally as a remote-origin product. Server
    /// errors are logged and reported as "not found".
    pub async fn find_by_barcode(&self, barcode: &str) -> SyncResult<Option<Product>> {
        let barcode = barcode.trim();
        if let Some(product) = self.store.get_by_barcode(barcode).await? {
            return Ok(Some(product));
        }

        if !self.connectivity.is_online() {
            debug!(barcode = %barcode, "Barcode not cached and offline");
            return Ok(None);
        }

        let dto = match self.remote.get_product_by_barcode(barcode).await {
            Ok(Some(dto)) => dto,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!(barcode = %barcode, error = %e, "Remote barcode lookup failed");
                return Ok(None);
            }
        };

        let product = match dto.into_product() {
            Ok(product) => product,
            Err(e) => {
                warn!(barcode = %barcode, error = %e, "Server returned an unusable product");
                return Ok(None);
            }
        };

        let id = self.store.save_remote(&product).await?;
        debug!(id, barcode = %barcode, "Cached product from server");
        Ok(self.store.get_by_id(id).await?)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    pub async fn add_product(&self, draft: ProductDraft) -> SyncResult<Product> {
        let id = self.store.save(&draft.into_product()).await?;
        self.request_sync();
        self.load(id).await
    }

    /// Applies `patch` to product `id`. An empty patch changes nothing and
    /// queues nothing.
    pub async fn update_product(&self, id: i64, patch: ProductUpdate) -> SyncResult<Product> {
        let mut product = self.load(id).await?;
        if patch.is_empty() {
            return Ok(product);
        }

        patch.apply_to(&mut product);
        self.store.save(&product).await?;
        self.request_sync();
        self.load(id).await
    }

    pub async fn delete_product(&self, id: i64) -> SyncResult<()> {
        self.store.delete(id).await?;
        self.request_sync();
        Ok(())
    }

    async fn load(&self, id: i64) -> SyncResult<Product> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or_else(|| SyncError::NotFound {
                entity: "Product".into(),
                id: id.to_string(),
            })
    }

    fn request_sync(&self) {
        if let Some(trigger) = &self.trigger {
            if !trigger.request() {
                debug!("Sync already requested");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use catalog_core::{timestamp, Money, ProductDto, ProductPayload};
    use catalog_db::{Database, DbConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Knows one barcode; counts lookups.
    #[derive(Default)]
    struct BarcodeServer {
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl RemoteClient for BarcodeServer {
        async fn list_products(&self, _since: Option<i64>) -> SyncResult<Vec<ProductDto>> {
            Ok(Vec::new())
        }

        async fn get_product_by_barcode(&self, barcode: &str) -> SyncResult<Option<ProductDto>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            match barcode {
                "323456789014" => Ok(Some(ProductDto {
                    id: 3,
                    name: "Gadget X".into(),
                    price: 49.99,
                    barcode: barcode.into(),
                    description: None,
                    created_at: timestamp::parse_utc("2024-01-01T00:00:00Z").unwrap(),
                    updated_at: timestamp::parse_utc("2024-01-02T00:00:00Z").unwrap(),
                })),
                "500" => Err(SyncError::RemoteStatus {
                    status: 500,
                    message: "boom".into(),
                }),
                _ => Ok(None),
            }
        }

        async fn create_product(&self, _payload: &ProductPayload) -> SyncResult<ProductDto> {
            Err(SyncError::Connection("unused".into()))
        }

        async fn update_product(&self, _id: i64, _p: &ProductPayload) -> SyncResult<ProductDto> {
            Err(SyncError::Connection("unused".into()))
        }

        async fn delete_product(&self, _id: i64) -> SyncResult<()> {
            Err(SyncError::Connection("unused".into()))
        }

        async fn check_connectivity(&self) -> bool {
            true
        }
    }

    async fn setup(online: bool) -> (Catalog, Arc<BarcodeServer>) {
        let store = Database::new(DbConfig::in_memory()).await.unwrap().store();
        let server = Arc::new(BarcodeServer::default());
        let catalog = Catalog::new(store, server.clone(), ConnectivityMonitor::new(online));
        (catalog, server)
    }

    fn draft(barcode: &str) -> ProductDraft {
        ProductDraft {
            name: "  Widget A ".into(),
            price: Money::from_cents(1999),
            barcode: barcode.into(),
            description: Some("   ".into()),
        }
    }

    #[tokio::test]
    async fn test_add_product_queues_create() {
        let (catalog, _) = setup(false).await;

        let product = catalog.add_product(draft("123456789012")).await.unwrap();
        assert_eq!(product.name, "Widget A");
        assert_eq!(product.description, None);
        assert!(!product.from_remote);

        let changes = catalog.store().get_unsynced_changes().await.unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].payload.id, product.id);
    }

    #[tokio::test]
    async fn test_add_duplicate_barcode_fails() {
        let (catalog, _) = setup(false).await;
        catalog.add_product(draft("B1")).await.unwrap();

        let err = catalog.add_product(draft("B1")).await.unwrap_err();
        assert!(matches!(err, SyncError::ConstraintViolation { .. }));
        assert_eq!(catalog.store().pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (catalog, _) = setup(false).await;
        let id = catalog.add_product(draft("B1")).await.unwrap().id.unwrap();

        let unchanged = catalog
            .update_product(id, ProductUpdate::default())
            .await
            .unwrap();
        assert_eq!(unchanged.name, "Widget A");
        assert_eq!(catalog.store().pending_count().await.unwrap(), 1);

        let patch = ProductUpdate {
            price: Some(Money::from_cents(2499)),
            ..Default::default()
        };
        let updated = catalog.update_product(id, patch).await.unwrap();
        assert_eq!(updated.price, Money::from_cents(2499));
        assert_eq!(catalog.store().pending_count().await.unwrap(), 2);

        catalog.delete_product(id).await.unwrap();
        assert!(catalog.get_product(id).await.unwrap().is_none());
        assert_eq!(catalog.store().pending_count().await.unwrap(), 3);

        let err = catalog.delete_product(id).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_barcode_fallback_caches_remote_product() {
        let (catalog, server) = setup(true).await;

        let found = catalog.find_by_barcode(" 323456789014 ").await.unwrap().unwrap();
        assert_eq!(found.name, "Gadget X");
        assert_eq!(found.remote_id, Some(3));
        assert!(found.from_remote);
        assert_eq!(catalog.store().pending_count().await.unwrap(), 0);

        // Second lookup is served locally
        catalog.find_by_barcode("323456789014").await.unwrap().unwrap();
        assert_eq!(server.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_barcode_fallback_errors_are_not_found() {
        let (catalog, _) = setup(true).await;
        assert!(catalog.find_by_barcode("500").await.unwrap().is_none());
        assert!(catalog.find_by_barcode("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_barcode_lookup_offline_skips_remote() {
        let (catalog, server) = setup(false).await;
        assert!(catalog.find_by_barcode("323456789014").await.unwrap().is_none());
        assert_eq!(server.lookups.load(Ordering::SeqCst), 0);
    }
}
