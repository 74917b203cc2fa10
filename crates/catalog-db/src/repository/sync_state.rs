//! # Sync State Repository
//!
//! Small key/value table holding sync bookkeeping that must survive a
//! restart. Today that is only the last successful sync time; the failure
//! counter deliberately lives in memory.

use catalog_core::timestamp::{format_utc, parse_utc};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};

const LAST_SYNC_KEY: &str = "last_sync";

/// Repository for the `sync_meta` table.
#[derive(Debug, Clone)]
pub struct SyncStateRepository {
    pool: SqlitePool,
}

impl SyncStateRepository {
    /// Creates a new SyncStateRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SyncStateRepository { pool }
    }

    /// Time of the last successful sync, or `None` before the first one.
    pub async fn last_sync(&self) -> DbResult<Option<DateTime<Utc>>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM sync_meta WHERE key = ?1")
            .bind(LAST_SYNC_KEY)
            .fetch_optional(&self.pool)
            .await?;

        value
            .as_deref()
            .map(parse_utc)
            .transpose()
            .map_err(|e| DbError::corrupt("sync_meta", e))
    }

    /// Records a successful sync.
    pub async fn set_last_sync(&self, at: DateTime<Utc>) -> DbResult<()> {
        let value = format_utc(&at);

        sqlx::query(
            r#"
            INSERT INTO sync_meta (key, value, updated_at) VALUES (?1, ?2, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(LAST_SYNC_KEY)
        .bind(&value)
        .execute(&self.pool)
        .await?;

        debug!(last_sync = %value, "Stored last sync time");
        Ok(())
    }
}
