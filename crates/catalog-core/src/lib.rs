//! # catalog-core: Pure Domain Types for the Product Catalog
//!
//! This crate holds the domain model of the offline-first product catalog
//! client. It has zero I/O dependencies: the SQLite store (`catalog-db`) and
//! the sync engine (`catalog-sync`) both build on it.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Product Catalog Architecture                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Front end (CLI / mobile UI)                      │   │
//! │  │     scan ──► show ──► edit ──► save ──► sync                    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               catalog-sync (Catalog, SyncEngine)                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               catalog-db (LocalStore, SQLite)                   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ catalog-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │ timestamp │  │ validation│  │   │
//! │  │   │  Product  │  │   Money   │  │  UTC ISO  │  │   rules   │  │   │
//! │  │   │  Change   │  │  (cents)  │  │  8601     │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Product, PendingChange, DTOs exchanged with the API
//! - [`money`] - Integer-cent prices
//! - [`timestamp`] - Fixed-width UTC ISO-8601 handling for last-write-wins
//! - [`validation`] - Field rules applied before anything is written
//! - [`error`] - Validation error type
//!
//! ## Example Usage
//!
//! ```rust
//! use catalog_core::money::Money;
//! use catalog_core::timestamp;
//!
//! let price = Money::from_decimal(19.99).unwrap();
//! assert_eq!(price.cents(), 1999);
//!
//! let t = timestamp::parse_utc("2024-01-02T00:00:00Z").unwrap();
//! assert_eq!(timestamp::format_utc(&t), "2024-01-02T00:00:00.000Z");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod timestamp;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::ValidationError;
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum length of a product name.
///
/// Matches the column width on the backend API.
pub const MAX_NAME_LEN: usize = 100;

/// Maximum length of a barcode (EAN-13, UPC-A, CODE-128, ...).
pub const MAX_BARCODE_LEN: usize = 50;

/// Maximum length of a product description.
pub const MAX_DESCRIPTION_LEN: usize = 500;
