//! # Pending Change Repository
//!
//! The change queue: one row per locally authored mutation, consumed in
//! insertion order by the sync engine.
//!
//! ## Queue Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Change Queue Implementation                          │
//! │                                                                         │
//! │  LOCAL OPERATION (save / delete)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │                                                                 │   │
//! │  │  1. INSERT / UPDATE / DELETE products ...                      │   │
//! │  │                                                                 │   │
//! │  │  2. INSERT INTO pending_changes (action, payload, created_at)  │   │
//! │  │     VALUES ('update', <product JSON>, now)                     │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ← Both succeed or both fail                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            SYNC ENGINE (push phase)                             │   │
//! │  │                                                                 │   │
//! │  │  1. SELECT * FROM pending_changes WHERE synced = 0 ORDER BY id │   │
//! │  │  2. For each entry:                                            │   │
//! │  │     a. Send to the API                                         │   │
//! │  │     b. On success: synced = 1, synced_at = now                 │   │
//! │  │     c. On failure: leave as is, try the next one               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  Remote-origin writes never reach step 2, so pulled records are not    │
//! │  echoed back to the server.                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use catalog_core::timestamp::{format_utc, parse_utc};
use catalog_core::{ChangeAction, PendingChange, Product};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

macro_rules! select_changes {
    ($tail:literal) => {
        concat!(
            "SELECT id, action, payload, created_at, synced, synced_at FROM pending_changes ",
            $tail
        )
    };
}

#[derive(Debug, sqlx::FromRow)]
struct PendingChangeRow {
    id: i64,
    action: ChangeAction,
    payload: String,
    created_at: String,
    synced: bool,
    synced_at: Option<String>,
}

impl TryFrom<PendingChangeRow> for PendingChange {
    type Error = DbError;

    fn try_from(row: PendingChangeRow) -> Result<Self, Self::Error> {
        Ok(PendingChange {
            id: row.id,
            action: row.action,
            payload: serde_json::from_str(&row.payload).map_err(corrupt)?,
            created_at: parse_utc(&row.created_at).map_err(corrupt)?,
            synced: row.synced,
            synced_at: row
                .synced_at
                .as_deref()
                .map(parse_utc)
                .transpose()
                .map_err(corrupt)?,
        })
    }
}

fn corrupt(err: impl std::fmt::Display) -> DbError {
    DbError::corrupt("pending_changes", err)
}

/// Repository for the change queue.
#[derive(Debug, Clone)]
pub struct PendingChangeRepository {
    pool: SqlitePool,
}

impl PendingChangeRepository {
    /// Creates a new PendingChangeRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PendingChangeRepository { pool }
    }

    /// All unsynced changes in insertion order.
    pub async fn list_unsynced(&self) -> DbResult<Vec<PendingChange>> {
        let rows: Vec<PendingChangeRow> =
            sqlx::query_as(select_changes!("WHERE synced = 0 ORDER BY id"))
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(PendingChange::try_from).collect()
    }

    /// Most recent changes first, synced or not.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<PendingChange>> {
        let rows: Vec<PendingChangeRow> =
            sqlx::query_as(select_changes!("ORDER BY id DESC LIMIT ?1"))
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(PendingChange::try_from).collect()
    }

    /// Counts unsynced changes (for status displays).
    pub async fn count_unsynced(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pending_changes WHERE synced = 0")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Marks a change as confirmed by the server.
    ///
    /// Fails with `NotFound` if the id does not exist. Marking an already
    /// synced change again keeps its original `synced_at`.
    pub async fn mark_synced(&self, id: i64, at: DateTime<Utc>) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE pending_changes
            SET synced = 1, synced_at = COALESCE(synced_at, ?2)
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(format_utc(&at))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("PendingChange", id));
        }

        debug!(change_id = id, "Marked change as synced");
        Ok(())
    }

    /// Deletes synced changes confirmed before `cutoff`. Unsynced rows are
    /// never touched.
    pub async fn prune_synced_before(&self, cutoff: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            "DELETE FROM pending_changes WHERE synced = 1 AND synced_at < ?1",
        )
        .bind(format_utc(&cutoff))
        .execute(&self.pool)
        .await?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            debug!(deleted, "Pruned synced changes");
        }
        Ok(deleted)
    }
}

/// Appends a change inside the caller's transaction and returns its id.
pub(crate) async fn append(
    conn: &mut SqliteConnection,
    action: ChangeAction,
    payload: &Product,
    at: DateTime<Utc>,
) -> DbResult<i64> {
    let json = serde_json::to_string(payload).map_err(|e| DbError::Internal(e.to_string()))?;

    let result = sqlx::query(
        "INSERT INTO pending_changes (action, payload, created_at, synced) VALUES (?1, ?2, ?3, 0)",
    )
    .bind(action)
    .bind(json)
    .bind(format_utc(&at))
    .execute(conn)
    .await?;

    let id = result.last_insert_rowid();
    debug!(change_id = id, action = %action, barcode = %payload.barcode, "Queued change");
    Ok(id)
}
