//! Outbox repository for like toggles that still have to reach the server

use crate::error::Result;
use crate::models::{ActionId, MediaKind, PendingLikeAction};
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};
use tracing::{debug, instrument};

/// Durable FIFO queue of pending like actions
#[async_trait]
pub trait PendingActionRepository: Send + Sync {
    /// Append an action to the outbox
    async fn enqueue(&self, action: &PendingLikeAction) -> Result<()>;

    /// All queued actions, oldest first
    ///
    /// Ordered by `created_at`, ties broken by insertion order.
    async fn list_pending(&self) -> Result<Vec<PendingLikeAction>>;

    /// Remove a delivered or discarded action
    ///
    /// # Returns
    /// - `Ok(true)` if the action was removed
    /// - `Ok(false)` if it was not queued
    async fn remove(&self, id: &ActionId) -> Result<bool>;

    /// Record a failed delivery attempt
    ///
    /// # Returns
    /// The new retry count, or `None` if the action is no longer queued
    async fn record_failure(&self, id: &ActionId) -> Result<Option<u32>>;

    /// Whether any action for this entity is still queued
    async fn has_pending_for(&self, kind: MediaKind, id: &str) -> Result<bool>;

    /// Number of queued actions
    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of PendingActionRepository
pub struct SqlitePendingActionRepository {
    pool: SqlitePool,
}

impl SqlitePendingActionRepository {
    /// Create a new SQLite outbox repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PendingActionRepository for SqlitePendingActionRepository {
    #[instrument(skip(self, action), fields(action_id = %action.id))]
    async fn enqueue(&self, action: &PendingLikeAction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pending_like_actions (
                id, target_id, target_kind, desired_liked, created_at, retry_count
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(action.id.as_str())
        .bind(&action.target_id)
        .bind(&action.target_kind)
        .bind(action.desired_liked)
        .bind(action.created_at)
        .bind(i64::from(action.retry_count))
        .execute(&self.pool)
        .await?;

        debug!("Like action queued");
        Ok(())
    }

    async fn list_pending(&self) -> Result<Vec<PendingLikeAction>> {
        let actions = query_as::<_, PendingLikeAction>(
            r#"
            SELECT id, target_id, target_kind, desired_liked, created_at, retry_count
            FROM pending_like_actions
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(actions)
    }

    async fn remove(&self, id: &ActionId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM pending_like_actions WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_failure(&self, id: &ActionId) -> Result<Option<u32>> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE pending_like_actions SET retry_count = retry_count + 1 WHERE id = ?",
        )
        .bind(id.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let retry_count: (i64,) =
            sqlx::query_as("SELECT retry_count FROM pending_like_actions WHERE id = ?")
                .bind(id.as_str())
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;

        Ok(Some(u32::try_from(retry_count.0).unwrap_or(u32::MAX)))
    }

    async fn has_pending_for(&self, kind: MediaKind, id: &str) -> Result<bool> {
        let pending: (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM pending_like_actions WHERE target_kind = ? AND target_id = ?)",
        )
        .bind(kind.as_str())
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(pending.0)
    }

    async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pending_like_actions")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
