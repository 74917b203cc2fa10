//! # Local Store
//!
//! The façade the rest of the catalog talks to. It owns products and the
//! change queue and keeps them consistent: every locally authored write and
//! its queue entry are committed together.
//!
//! ## Write Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  save(product)            local authoring                               │
//! │  ├── barcode owned by another id?  → ConstraintViolation               │
//! │  ├── no id    → INSERT, created_at kept, updated_at = now              │
//! │  ├── with id  → UPDATE, created_at preserved, updated_at = now         │
//! │  └── from_remote == false → append create/update change                │
//! │                                                                         │
//! │  delete(id)               local authoring                               │
//! │  └── DELETE + append delete change (snapshot of the removed row)       │
//! │                                                                         │
//! │  save_remote(product)     pull / barcode fallback                       │
//! │  └── server timestamps kept verbatim, from_remote = true, NO change    │
//! │                                                                         │
//! │  reset()                  last-resort recovery                          │
//! │  └── wipes products, changes and sync metadata                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each call is its own transaction. Nothing here holds a lock across calls,
//! and nothing here talks to the network.

use catalog_core::timestamp;
use catalog_core::validation::validate_product;
use catalog_core::{ChangeAction, PendingChange, Product};
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::{changes, product};

/// Offline product store plus change queue.
#[derive(Debug, Clone)]
pub struct LocalStore {
    db: Database,
}

impl LocalStore {
    pub fn new(db: Database) -> Self {
        LocalStore { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// All products, ordered by local id.
    pub async fn get_all(&self) -> DbResult<Vec<Product>> {
        self.db.products().list_all().await
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Product>> {
        self.db.products().get_by_id(id).await
    }

    /// Local lookup only. Remote fallback is the caller's business.
    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        self.db.products().get_by_barcode(barcode.trim()).await
    }

    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        self.db.products().search(query, limit).await
    }

    pub async fn product_count(&self) -> DbResult<i64> {
        self.db.products().count().await
    }

    // =========================================================================
    // Local Authoring
    // =========================================================================

    /// Inserts or updates a product and returns its local id.
    ///
    /// `updated_at` is always stamped with the current time. On update the
    /// stored `created_at` is kept and an unset `remote_id` is inherited
    /// from the stored row.
    ///
    /// ## Errors
    /// - `ConstraintViolation` if another product already has the barcode
    /// - `NotFound` if `product.id` is set but no such row exists
    /// - `Validation` if a field rule fails
    pub async fn save(&self, product: &Product) -> DbResult<i64> {
        validate_product(product)?;

        let now = timestamp::now();
        let mut tx = self.db.pool().begin().await?;

        ensure_barcode_free(&mut tx, &product.barcode, product.id).await?;

        let mut record = product.clone();
        record.updated_at = now;

        let (id, action) = match product.id {
            None => {
                let id = product::insert(&mut tx, &record).await?;
                record.id = Some(id);
                (id, ChangeAction::Create)
            }
            Some(id) => {
                let existing = product::fetch_by_id(&mut *tx, id)
                    .await?
                    .ok_or_else(|| DbError::not_found("Product", id))?;

                record.created_at = existing.created_at;
                if record.remote_id.is_none() {
                    record.remote_id = existing.remote_id;
                }

                product::update(&mut tx, id, &record).await?;
                (id, ChangeAction::Update)
            }
        };

        if !record.from_remote {
            changes::append(&mut tx, action, &record, now).await?;
        }

        tx.commit().await?;

        info!(id, barcode = %record.barcode, action = %action, "Saved product");
        Ok(id)
    }

    /// Deletes a product and queues the deletion.
    ///
    /// ## Errors
    /// - `NotFound` if no such product exists
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let now = timestamp::now();
        let mut tx = self.db.pool().begin().await?;

        let existing = product::fetch_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;

        product::delete(&mut tx, id).await?;
        changes::append(&mut tx, ChangeAction::Delete, &existing, now).await?;

        tx.commit().await?;

        info!(id, barcode = %existing.barcode, "Deleted product");
        Ok(())
    }

    // =========================================================================
    // Remote-Origin Writes
    // =========================================================================

    /// Writes a server record without queueing anything.
    ///
    /// Timestamps are stored exactly as given and the row is flagged
    /// `from_remote`. If `product.id` is unset, an existing row with the same
    /// barcode is overwritten in place (keeping its local id); otherwise a new
    /// row is inserted.
    pub async fn save_remote(&self, product: &Product) -> DbResult<i64> {
        let mut tx = self.db.pool().begin().await?;

        let mut record = product.clone();
        record.from_remote = true;

        let target = match record.id {
            Some(id) => {
                ensure_barcode_free(&mut tx, &record.barcode, Some(id)).await?;
                Some(id)
            }
            None => product::find_barcode_owner(&mut tx, &record.barcode).await?,
        };

        let id = match target {
            Some(id) => {
                if !product::update(&mut tx, id, &record).await? {
                    return Err(DbError::not_found("Product", id));
                }
                id
            }
            None => product::insert(&mut tx, &record).await?,
        };

        tx.commit().await?;

        debug!(id, barcode = %record.barcode, remote_id = ?record.remote_id, "Stored remote product");
        Ok(id)
    }

    /// Links a local product to its server id. Does not queue a change or
    /// touch `updated_at`.
    pub async fn set_remote_id(&self, id: i64, remote_id: i64) -> DbResult<()> {
        let mut conn = self.db.pool().acquire().await?;

        if !product::set_remote_id(&mut conn, id, remote_id).await? {
            return Err(DbError::not_found("Product", id));
        }

        debug!(id, remote_id, "Linked product to server record");
        Ok(())
    }

    // =========================================================================
    // Change Queue
    // =========================================================================

    /// Writes a new pending change and returns its id.
    pub async fn append_change(&self, action: ChangeAction, payload: &Product) -> DbResult<i64> {
        let mut conn = self.db.pool().acquire().await?;
        changes::append(&mut conn, action, payload, timestamp::now()).await
    }

    /// Unsynced changes in insertion order.
    pub async fn get_unsynced_changes(&self) -> DbResult<Vec<PendingChange>> {
        self.db.changes().list_unsynced().await
    }

    pub async fn recent_changes(&self, limit: u32) -> DbResult<Vec<PendingChange>> {
        self.db.changes().list_recent(limit).await
    }

    pub async fn pending_count(&self) -> DbResult<i64> {
        self.db.changes().count_unsynced().await
    }

    /// ## Errors
    /// - `NotFound` if the change id does not exist
    pub async fn mark_change_synced(&self, change_id: i64) -> DbResult<()> {
        self.db.changes().mark_synced(change_id, timestamp::now()).await
    }

    /// Drops synced changes confirmed before `older_than`.
    pub async fn prune_synced_changes(&self, older_than: DateTime<Utc>) -> DbResult<u64> {
        self.db.changes().prune_synced_before(older_than).await
    }

    // =========================================================================
    // Sync Bookkeeping
    // =========================================================================

    pub async fn last_sync(&self) -> DbResult<Option<DateTime<Utc>>> {
        self.db.sync_state().last_sync().await
    }

    pub async fn set_last_sync(&self, at: DateTime<Utc>) -> DbResult<()> {
        self.db.sync_state().set_last_sync(at).await
    }

    // =========================================================================
    // Recovery
    // =========================================================================

    /// Destroys all local data: products, queued changes (synced or not)
    /// and the last sync time. Id sequences restart.
    ///
    /// Unsynced local edits are lost for good.
    pub async fn reset(&self) -> DbResult<()> {
        warn!("Resetting local store, all local data will be discarded");

        let mut tx = self.db.pool().begin().await?;

        for statement in [
            "DELETE FROM products",
            "DELETE FROM pending_changes",
            "DELETE FROM sync_meta",
            "DELETE FROM sqlite_sequence WHERE name IN ('products', 'pending_changes')",
        ] {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        tx.commit().await?;

        info!("Local store reset complete");
        Ok(())
    }
}

/// Fails with `ConstraintViolation` if `barcode` belongs to a product other
/// than `owner`.
async fn ensure_barcode_free(
    conn: &mut SqliteConnection,
    barcode: &str,
    owner: Option<i64>,
) -> DbResult<()> {
    match product::find_barcode_owner(conn, barcode).await? {
        Some(existing) if Some(existing) != owner => {
            debug!(barcode = %barcode, existing, "Barcode already taken");
            Err(DbError::duplicate("barcode", barcode))
        }
        _ => Ok(()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use catalog_core::Money;

    async fn setup() -> LocalStore {
        Database::new(DbConfig::in_memory()).await.unwrap().store()
    }

    fn widget(barcode: &str) -> Product {
        Product::new("Widget", Money::from_cents(1999), barcode).with_description("A widget")
    }

    fn ts(raw: &str) -> DateTime<Utc> {
        timestamp::parse_utc(raw).unwrap()
    }

    #[tokio::test]
    async fn test_save_then_get_returns_same_product() {
        let store = setup().await;
        let mut product = widget("B1");
        product.created_at = ts("2024-01-01T00:00:00Z");
        product.updated_at = ts("2024-01-01T00:00:00Z");

        let id = store.save(&product).await.unwrap();
        let stored = store.get_by_id(id).await.unwrap().unwrap();

        assert_eq!(stored.id, Some(id));
        assert_eq!(stored.name, product.name);
        assert_eq!(stored.price, product.price);
        assert_eq!(stored.barcode, product.barcode);
        assert_eq!(stored.description, product.description);
        assert_eq!(stored.created_at, product.created_at);
        assert!(stored.updated_at > product.updated_at);
        assert!(!stored.from_remote);
    }

    #[tokio::test]
    async fn test_update_keeps_created_at_and_refreshes_updated_at() {
        let store = setup().await;
        let mut product = widget("B1");
        product.created_at = ts("2023-06-01T00:00:00Z");
        let id = store.save(&product).await.unwrap();

        let mut edited = store.get_by_id(id).await.unwrap().unwrap();
        let first_update = edited.updated_at;
        edited.name = "Widget Pro".to_string();
        edited.created_at = ts("2030-01-01T00:00:00Z");
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        assert_eq!(store.save(&edited).await.unwrap(), id);

        let stored = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Widget Pro");
        assert_eq!(stored.created_at, ts("2023-06-01T00:00:00Z"));
        assert!(stored.updated_at > first_update);
    }

    #[tokio::test]
    async fn test_barcode_collision_is_constraint_violation() {
        let store = setup().await;
        store.save(&widget("B1")).await.unwrap();
        let other = store.save(&widget("B2")).await.unwrap();

        let err = store.save(&widget("B1")).await.unwrap_err();
        assert!(matches!(err, DbError::ConstraintViolation { .. }));

        let mut moved = store.get_by_id(other).await.unwrap().unwrap();
        moved.barcode = "B1".to_string();
        let err = store.save(&moved).await.unwrap_err();
        assert!(matches!(err, DbError::ConstraintViolation { .. }));

        // Re-saving a product with its own barcode is fine
        let own = store.get_by_id(other).await.unwrap().unwrap();
        assert!(store.save(&own).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_of_missing_id_is_not_found() {
        let store = setup().await;
        let mut ghost = widget("B9");
        ghost.id = Some(99);

        let err = store.save(&ghost).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        assert_eq!(store.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_each_local_write_queues_exactly_one_change() {
        let store = setup().await;

        let id = store.save(&widget("B1")).await.unwrap();
        assert_eq!(store.pending_count().await.unwrap(), 1);

        let mut edited = store.get_by_id(id).await.unwrap().unwrap();
        edited.price = Money::from_cents(2499);
        store.save(&edited).await.unwrap();
        assert_eq!(store.pending_count().await.unwrap(), 2);

        store.delete(id).await.unwrap();
        let changes = store.get_unsynced_changes().await.unwrap();
        let actions: Vec<_> = changes.iter().map(|c| c.action).collect();
        assert_eq!(
            actions,
            vec![ChangeAction::Create, ChangeAction::Update, ChangeAction::Delete]
        );
        assert!(changes.windows(2).all(|w| w[0].id < w[1].id));
        assert_eq!(changes[1].payload.price.cents(), 2499);
        assert_eq!(changes[2].payload.id, Some(id));
    }

    #[tokio::test]
    async fn test_remote_origin_writes_queue_nothing() {
        let store = setup().await;

        let mut remote = widget("B1");
        remote.remote_id = Some(10);
        remote.from_remote = true;
        remote.updated_at = ts("2024-01-02T00:00:00Z");

        let id = store.save_remote(&remote).await.unwrap();
        assert_eq!(store.pending_count().await.unwrap(), 0);

        let stored = store.get_by_id(id).await.unwrap().unwrap();
        assert!(stored.from_remote);
        assert_eq!(stored.remote_id, Some(10));
        assert_eq!(stored.updated_at, ts("2024-01-02T00:00:00Z"));

        // A flagged save stamps the time but still does not queue
        store.save(&stored).await.unwrap();
        assert_eq!(store.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_save_remote_overwrites_by_barcode_keeping_local_id() {
        let store = setup().await;
        let local_id = store.save(&widget("B1")).await.unwrap();

        let mut remote = Product::new("Widget (server)", Money::from_cents(999), "B1");
        remote.remote_id = Some(77);
        let id = store.save_remote(&remote).await.unwrap();

        assert_eq!(id, local_id);
        assert_eq!(store.product_count().await.unwrap(), 1);
        let stored = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Widget (server)");
        assert!(stored.from_remote);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = setup().await;
        let err = store.delete(5).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        assert_eq!(store.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ids_are_not_reused_after_delete() {
        let store = setup().await;
        let first = store.save(&widget("B1")).await.unwrap();
        store.delete(first).await.unwrap();

        let second = store.save(&widget("B1")).await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_lookup_by_barcode() {
        let store = setup().await;
        let id = store.save(&widget("123456789012")).await.unwrap();

        let hit = store.get_by_barcode("123456789012").await.unwrap().unwrap();
        assert_eq!(hit.id, Some(id));
        assert!(store.get_by_barcode("000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_change_synced() {
        let store = setup().await;
        store.save(&widget("B1")).await.unwrap();
        let change = store.get_unsynced_changes().await.unwrap().remove(0);

        store.mark_change_synced(change.id).await.unwrap();
        assert!(store.get_unsynced_changes().await.unwrap().is_empty());

        let recent = store.recent_changes(10).await.unwrap();
        assert!(recent[0].synced);
        assert!(recent[0].synced_at.is_some());

        let err = store.mark_change_synced(12345).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_append_change_directly() {
        let store = setup().await;
        let id = store
            .append_change(ChangeAction::Delete, &widget("B5"))
            .await
            .unwrap();

        let changes = store.get_unsynced_changes().await.unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].id, id);
        assert_eq!(changes[0].payload.barcode, "B5");
    }

    #[tokio::test]
    async fn test_set_remote_id_does_not_queue_or_restamp() {
        let store = setup().await;
        let id = store.save(&widget("B1")).await.unwrap();
        let before = store.get_by_id(id).await.unwrap().unwrap();

        store.set_remote_id(id, 500).await.unwrap();

        let after = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(after.remote_id, Some(500));
        assert_eq!(after.updated_at, before.updated_at);
        assert_eq!(store.pending_count().await.unwrap(), 1);
        assert!(store.set_remote_id(999, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_prune_only_touches_old_synced_changes() {
        let store = setup().await;
        store.save(&widget("B1")).await.unwrap();
        store.save(&widget("B2")).await.unwrap();
        let first = store.get_unsynced_changes().await.unwrap()[0].id;
        store.mark_change_synced(first).await.unwrap();

        let future = timestamp::now() + chrono::Duration::hours(1);
        assert_eq!(store.prune_synced_changes(future).await.unwrap(), 1);
        assert_eq!(store.recent_changes(10).await.unwrap().len(), 1);
        assert_eq!(store.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_last_sync_round_trip() {
        let store = setup().await;
        assert!(store.last_sync().await.unwrap().is_none());

        let at = ts("2024-03-04T05:06:07.089Z");
        store.set_last_sync(at).await.unwrap();
        assert_eq!(store.last_sync().await.unwrap(), Some(at));

        store.set_last_sync(ts("2024-03-05T00:00:00Z")).await.unwrap();
        assert_eq!(store.last_sync().await.unwrap(), Some(ts("2024-03-05T00:00:00Z")));
    }

    #[tokio::test]
    async fn test_reset_wipes_everything() {
        let store = setup().await;
        store.save(&widget("B1")).await.unwrap();
        store.save(&widget("B2")).await.unwrap();
        store.set_last_sync(timestamp::now()).await.unwrap();

        store.reset().await.unwrap();

        assert!(store.get_all().await.unwrap().is_empty());
        assert!(store.get_unsynced_changes().await.unwrap().is_empty());
        assert!(store.last_sync().await.unwrap().is_none());

        // The store is usable again straight away
        assert_eq!(store.save(&widget("B1")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_validation_runs_before_writing() {
        let store = setup().await;
        let bad = Product::new("", Money::from_cents(100), "B1");

        let err = store.save(&bad).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
        assert_eq!(store.product_count().await.unwrap(), 0);
    }
}
