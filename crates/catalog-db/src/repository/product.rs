//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Lookup by local id, by barcode, by name fragment
//! - Row-level insert / update / delete used inside `LocalStore` transactions
//!
//! ## Read vs Write Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Reads (pool)                     Writes (transaction connection)       │
//! │  ───────────                      ─────────────────────────────────     │
//! │  ProductRepository::get_by_id     insert(&mut *tx, ..)                  │
//! │  ProductRepository::list_all      update(&mut *tx, ..)                  │
//! │  ProductRepository::search        delete(&mut *tx, ..)                  │
//! │          │                                │                             │
//! │          └──────────┬─────────────────────┘                             │
//! │                     ▼                                                   │
//! │           fetch_* helpers (any SqliteExecutor)                          │
//! │                                                                         │
//! │  Writes never run on their own: LocalStore pairs each one with the     │
//! │  matching pending_changes row in the same transaction.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use catalog_core::timestamp::{format_utc, parse_utc};
use catalog_core::{Money, Product};
use sqlx::sqlite::SqliteExecutor;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

/// Expands to a `SELECT` of every product column followed by `$tail`.
macro_rules! select_products {
    ($tail:literal) => {
        concat!(
            "SELECT id, remote_id, name, price_cents, barcode, description, ",
            "created_at, updated_at, from_remote FROM products ",
            $tail
        )
    };
}

// =============================================================================
// Row Mapping
// =============================================================================

/// Raw `products` row. Timestamps are stored as fixed-width UTC text.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProductRow {
    id: i64,
    remote_id: Option<i64>,
    name: String,
    price_cents: i64,
    barcode: String,
    description: Option<String>,
    created_at: String,
    updated_at: String,
    from_remote: bool,
}

impl TryFrom<ProductRow> for Product {
    type Error = DbError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: Some(row.id),
            remote_id: row.remote_id,
            name: row.name,
            price: Money::from_cents(row.price_cents),
            barcode: row.barcode,
            description: row.description,
            created_at: parse_utc(&row.created_at).map_err(|e| DbError::corrupt("products", e))?,
            updated_at: parse_utc(&row.updated_at).map_err(|e| DbError::corrupt("products", e))?,
            from_remote: row.from_remote,
        })
    }
}

fn into_products(rows: Vec<ProductRow>) -> DbResult<Vec<Product>> {
    rows.into_iter().map(Product::try_from).collect()
}

// =============================================================================
// Repository
// =============================================================================

/// Read-side repository for products.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let all = repo.list_all().await?;
/// let hit = repo.get_by_barcode("123456789012").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Returns every product, ordered by local id.
    pub async fn list_all(&self) -> DbResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(select_products!("ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;

        debug!(count = rows.len(), "Listed products");
        into_products(rows)
    }

    /// Case-insensitive substring match on name or barcode.
    ///
    /// An empty query returns the first `limit` products.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let pattern = format!("%{}%", query.trim());

        let rows: Vec<ProductRow> = sqlx::query_as(select_products!(
            "WHERE name LIKE ?1 OR barcode LIKE ?1 ORDER BY name LIMIT ?2"
        ))
        .bind(&pattern)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        debug!(query = %query, count = rows.len(), "Product search");
        into_products(rows)
    }

    /// Gets a product by local id.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Product>> {
        fetch_by_id(&self.pool, id).await
    }

    /// Gets a product by barcode (exact match).
    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        fetch_by_barcode(&self.pool, barcode).await
    }

    /// Counts stored products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Executor-Level Helpers
// =============================================================================

pub(crate) async fn fetch_by_id<'e, E>(executor: E, id: i64) -> DbResult<Option<Product>>
where
    E: SqliteExecutor<'e>,
{
    let row: Option<ProductRow> = sqlx::query_as(select_products!("WHERE id = ?1"))
        .bind(id)
        .fetch_optional(executor)
        .await?;

    row.map(Product::try_from).transpose()
}

pub(crate) async fn fetch_by_barcode<'e, E>(executor: E, barcode: &str) -> DbResult<Option<Product>>
where
    E: SqliteExecutor<'e>,
{
    let row: Option<ProductRow> = sqlx::query_as(select_products!("WHERE barcode = ?1"))
        .bind(barcode)
        .fetch_optional(executor)
        .await?;

    row.map(Product::try_from).transpose()
}

/// Local id of the product currently holding `barcode`, if any.
pub(crate) async fn find_barcode_owner(
    conn: &mut SqliteConnection,
    barcode: &str,
) -> DbResult<Option<i64>> {
    let owner: Option<i64> = sqlx::query_scalar("SELECT id FROM products WHERE barcode = ?1")
        .bind(barcode)
        .fetch_optional(conn)
        .await?;
    Ok(owner)
}

/// Inserts a row and returns the new local id. `product.id` is ignored.
pub(crate) async fn insert(conn: &mut SqliteConnection, product: &Product) -> DbResult<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO products (
            remote_id, name, price_cents, barcode, description,
            created_at, updated_at, from_remote
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(product.remote_id)
    .bind(&product.name)
    .bind(product.price.cents())
    .bind(&product.barcode)
    .bind(&product.description)
    .bind(format_utc(&product.created_at))
    .bind(format_utc(&product.updated_at))
    .bind(product.from_remote)
    .execute(conn)
    .await?;

    let id = result.last_insert_rowid();
    debug!(id, barcode = %product.barcode, "Inserted product");
    Ok(id)
}

/// Overwrites every column of row `id`. Returns false if the row is missing.
pub(crate) async fn update(
    conn: &mut SqliteConnection,
    id: i64,
    product: &Product,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE products SET
            remote_id = ?2,
            name = ?3,
            price_cents = ?4,
            barcode = ?5,
            description = ?6,
            created_at = ?7,
            updated_at = ?8,
            from_remote = ?9
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(product.remote_id)
    .bind(&product.name)
    .bind(product.price.cents())
    .bind(&product.barcode)
    .bind(&product.description)
    .bind(format_utc(&product.created_at))
    .bind(format_utc(&product.updated_at))
    .bind(product.from_remote)
    .execute(conn)
    .await?;

    debug!(id, barcode = %product.barcode, "Updated product");
    Ok(result.rows_affected() > 0)
}

/// Deletes row `id`. Returns false if the row is missing.
pub(crate) async fn delete(conn: &mut SqliteConnection, id: i64) -> DbResult<bool> {
    let result = sqlx::query("DELETE FROM products WHERE id = ?1")
        .bind(id)
        .execute(conn)
        .await?;

    debug!(id, "Deleted product");
    Ok(result.rows_affected() > 0)
}

/// Records the server id without touching `updated_at`.
pub(crate) async fn set_remote_id(
    conn: &mut SqliteConnection,
    id: i64,
    remote_id: i64,
) -> DbResult<bool> {
    let result = sqlx::query("UPDATE products SET remote_id = ?2 WHERE id = ?1")
        .bind(id)
        .bind(remote_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
