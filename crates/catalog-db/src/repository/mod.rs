//! # Repository Module
//!
//! Database repository implementations for the local store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  LocalStore (store.rs)                                                 │
//! │       │                                                                 │
//! │       │  store.save(&product)                                          │
//! │       ▼                                                                 │
//! │  ProductRepository           PendingChangeRepository                   │
//! │  ├── list_all / search       ├── list_unsynced                         │
//! │  ├── get_by_id               ├── mark_synced                           │
//! │  └── get_by_barcode          └── prune_synced_before                   │
//! │       │                            │                                    │
//! │       │  SQL Query                 │                                    │
//! │       ▼                            ▼                                    │
//! │  SQLite Database (products, pending_changes, sync_meta)                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Product lookups
//! - [`PendingChangeRepository`](changes::PendingChangeRepository) - Change queue
//! - [`SyncStateRepository`](sync_state::SyncStateRepository) - Last sync time

pub mod changes;
pub mod product;
pub mod sync_state;
