//! # catalog-db: Local Store for the Product Catalog
//!
//! This crate keeps the catalog usable offline. It stores products and the
//! queue of local changes waiting to be pushed, in SQLite through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Product Catalog Data Flow                        │
//! │                                                                         │
//! │  Catalog facade / SyncEngine (catalog-sync)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     catalog-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  LocalStore   │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │  (store.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ ProductRepo   │    │              │  │   │
//! │  │   │ save / delete │───►│ PendingChange │    │ 001_initial  │  │   │
//! │  │   │ save_remote   │    │ SyncState     │    │ _schema.sql  │  │   │
//! │  │   │ reset         │    │               │    │              │  │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────────────┘  │   │
//! │  │           │                                                     │   │
//! │  │   ┌───────▼───────┐                                             │   │
//! │  │   │   Database    │  SqlitePool, WAL, migrations               │   │
//! │  │   │   (pool.rs)   │                                             │   │
//! │  │   └───────────────┘                                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (platform data dir) or :memory: in tests                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Table-level repositories
//! - [`store`] - The `LocalStore` facade
//!
//! ## Usage
//!
//! ```rust,ignore
//! use catalog_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("catalog.db")).await?;
//! let store = db.store();
//!
//! let id = store.save(&product).await?;        // queues a "create"
//! let pending = store.get_unsynced_changes().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use store::LocalStore;

// Repository re-exports for convenience
pub use repository::changes::PendingChangeRepository;
pub use repository::product::ProductRepository;
pub use repository::sync_state::SyncStateRepository;
