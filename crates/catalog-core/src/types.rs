//! # Domain Types
//!
//! Core domain types used throughout the product catalog.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │  PendingChange  │   │  ChangeAction   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (local)     │   │  id (local)     │   │  Create         │       │
//! │  │  remote_id      │   │  action         │   │  Update         │       │
//! │  │  barcode (uniq) │   │  payload ───────┼──►│  Delete         │       │
//! │  │  price (cents)  │   │  synced         │   └─────────────────┘       │
//! │  │  from_remote    │   │  synced_at      │                              │
//! │  └─────────────────┘   └─────────────────┘                              │
//! │                                                                         │
//! │  Wire types (JSON, camelCase):                                          │
//! │  ┌─────────────────┐   ┌─────────────────┐                              │
//! │  │   ProductDto    │   │ ProductPayload  │                              │
//! │  │  server → us    │   │  us → server    │                              │
//! │  └─────────────────┘   └─────────────────┘                              │
//! │                                                                         │
//! │  Front-end input:  ProductDraft (new)   ProductUpdate (patch)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity
//! A product has a local `id` assigned by the store and an optional
//! `remote_id` assigned by the server. Records are matched across the two
//! sides by `barcode`, which is unique on both.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::timestamp;

// =============================================================================
// Product
// =============================================================================

/// A catalog product as held by the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    /// Local identifier. `None` until the store assigns one.
    pub id: Option<i64>,

    /// Identifier assigned by the server, once known.
    pub remote_id: Option<i64>,

    pub name: String,

    pub price: Money,

    /// Unique within the local store.
    pub barcode: String,

    pub description: Option<String>,

    #[serde(with = "timestamp::serde_utc")]
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "timestamp::serde_utc")]
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,

    /// True when the record was last written from a server pull.
    #[serde(default)]
    pub from_remote: bool,
}

impl Product {
    /// Creates an unsaved, locally authored product stamped with the current time.
    pub fn new(name: impl Into<String>, price: Money, barcode: impl Into<String>) -> Self {
        let now = timestamp::now();
        Self {
            id: None,
            remote_id: None,
            name: name.into(),
            price,
            barcode: barcode.into(),
            description: None,
            created_at: now,
            updated_at: now,
            from_remote: false,
        }
    }

    /// Builder-style description setter.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Request body for create/update calls.
    pub fn to_payload(&self) -> ProductPayload {
        ProductPayload {
            name: self.name.clone(),
            price: self.price.to_decimal(),
            barcode: self.barcode.clone(),
            description: self.description.clone(),
        }
    }
}

// =============================================================================
// Change Queue
// =============================================================================

/// Kind of local mutation recorded in the change queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
}

impl ChangeAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Create => "create",
            ChangeAction::Update => "update",
            ChangeAction::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(ChangeAction::Create),
            "update" => Ok(ChangeAction::Update),
            "delete" => Ok(ChangeAction::Delete),
            other => Err(ValidationError::invalid_format(
                "action",
                format!("unknown change action '{}'", other),
            )),
        }
    }
}

/// A locally authored mutation waiting to be pushed.
///
/// ## Lifecycle
/// ```text
/// save/delete ──► appended (synced = false)
///                     │
///                     ▼  push succeeded
///               synced = true, synced_at = now
///                     │
///                     ▼  optional retention window
///                  pruned
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PendingChange {
    pub id: i64,
    pub action: ChangeAction,
    /// Snapshot of the product at the time of the change.
    pub payload: Product,
    #[serde(with = "timestamp::serde_utc")]
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub synced: bool,
    #[serde(with = "timestamp::serde_utc::option")]
    #[ts(as = "Option<String>")]
    pub synced_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Wire Types
// =============================================================================

/// A product as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductDto {
    /// Server-assigned identifier.
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub barcode: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(with = "timestamp::serde_utc")]
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp::serde_utc")]
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl ProductDto {
    /// Converts the server record into a remote-origin local product.
    ///
    /// The local `id` is left empty; the store decides whether this record
    /// replaces an existing row (matched by barcode) or becomes a new one.
    pub fn into_product(self) -> Result<Product, ValidationError> {
        if self.barcode.trim().is_empty() {
            return Err(ValidationError::required("barcode"));
        }

        let price = Money::from_decimal(self.price)?;
        if price.is_negative() {
            return Err(ValidationError::Negative {
                field: "price".to_string(),
            });
        }

        Ok(Product {
            id: None,
            remote_id: Some(self.id),
            name: self.name,
            price,
            barcode: self.barcode,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
            from_remote: true,
        })
    }
}

/// Body of create and update requests.
///
/// The server assigns `id`, `createdAt` and `updatedAt` itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductPayload {
    pub name: String,
    pub price: f64,
    pub barcode: String,
    pub description: Option<String>,
}

// =============================================================================
// Front-End Input
// =============================================================================

/// Input for a new locally authored product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductDraft {
    pub name: String,
    pub price: Money,
    pub barcode: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl ProductDraft {
    pub fn into_product(self) -> Product {
        let mut product = Product::new(self.name.trim(), self.price, self.barcode.trim());
        product.description = normalize_description(self.description);
        product
    }
}

/// Partial edit of an existing product. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub price: Option<Money>,
    pub barcode: Option<String>,
    /// `Some("")` clears the description.
    pub description: Option<String>,
}

impl ProductUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.price.is_none()
            && self.barcode.is_none()
            && self.description.is_none()
    }

    /// Applies the edit. The product becomes locally authored again.
    pub fn apply_to(&self, product: &mut Product) {
        if let Some(name) = &self.name {
            product.name = name.trim().to_string();
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(barcode) = &self.barcode {
            product.barcode = barcode.trim().to_string();
        }
        if self.description.is_some() {
            product.description = normalize_description(self.description.clone());
        }
        product.from_remote = false;
    }
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_action_strings() {
        assert_eq!(ChangeAction::Update.to_string(), "update");
        assert_eq!("delete".parse::<ChangeAction>().unwrap(), ChangeAction::Delete);
        assert!("upsert".parse::<ChangeAction>().is_err());
        assert_eq!(
            serde_json::to_string(&ChangeAction::Create).unwrap(),
            "\"create\""
        );
    }

    #[test]
    fn test_dto_parses_api_json() {
        let json = r#"{
            "id": 7,
            "name": "Widget",
            "price": 19.99,
            "barcode": "B1",
            "description": null,
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-02T00:00:00.000Z"
        }"#;

        let dto: ProductDto = serde_json::from_str(json).unwrap();
        let product = dto.into_product().unwrap();

        assert_eq!(product.id, None);
        assert_eq!(product.remote_id, Some(7));
        assert_eq!(product.price.cents(), 1999);
        assert!(product.from_remote);
        assert_eq!(
            timestamp::format_utc(&product.updated_at),
            "2024-01-02T00:00:00.000Z"
        );
    }

    #[test]
    fn test_dto_rejects_negative_price() {
        let dto = ProductDto {
            id: 1,
            name: "Broken".to_string(),
            price: -1.0,
            barcode: "X".to_string(),
            description: None,
            created_at: timestamp::now(),
            updated_at: timestamp::now(),
        };
        assert!(dto.into_product().is_err());
    }

    #[test]
    fn test_product_payload_uses_decimal_price() {
        let product = Product::new("Gadget X", Money::from_cents(4999), "323456789014")
            .with_description("Advanced gadget");
        let json = serde_json::to_value(product.to_payload()).unwrap();

        assert_eq!(json["price"], serde_json::json!(49.99));
        assert_eq!(json["barcode"], "323456789014");
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_product_snapshot_survives_json() {
        let mut product = Product::new("Widget A", Money::from_cents(1999), "123456789012");
        product.id = Some(3);
        let json = serde_json::to_string(&product).unwrap();
        assert!(json.contains("\"fromRemote\":false"));

        let back: Product = serde_json::from_str(&json).unwrap();
        assert_eq!(back, product);
    }

    #[test]
    fn test_update_apply() {
        let mut product = Product::new("Old", Money::from_cents(100), "B1").with_description("d");
        product.from_remote = true;

        let patch = ProductUpdate {
            name: Some("  New  ".to_string()),
            description: Some(String::new()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
        patch.apply_to(&mut product);

        assert_eq!(product.name, "New");
        assert_eq!(product.description, None);
        assert_eq!(product.price.cents(), 100);
        assert!(!product.from_remote);
    }
}
