//! Media repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{MediaEntity, MediaKind, MediaRecord, MediaRow};
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};
use tracing::{debug, instrument};

/// Repository for locally cached posts and reels
#[async_trait]
pub trait MediaRepository: Send + Sync {
    /// Upsert a freshly fetched page of entities in a single transaction
    ///
    /// The position of each record in `records` is stored as its feed
    /// position. Like state is overwritten with the server's view unless the
    /// outbox still holds an undelivered action for that entity, in which
    /// case the local optimistic state is kept.
    ///
    /// # Returns
    /// Number of records written
    async fn upsert_many(&self, kind: MediaKind, records: &[MediaRecord], now: i64)
        -> Result<usize>;

    /// All entities of a kind, in feed order
    async fn list(&self, kind: MediaKind) -> Result<Vec<MediaEntity>>;

    /// Find an entity by kind and identifier
    async fn find(&self, kind: MediaKind, id: &str) -> Result<Option<MediaEntity>>;

    /// Atomically set the liked flag and adjust the counter by one
    ///
    /// Only applies when the stored flag differs from `liked`, so the flag
    /// flip and the counter change always happen together or not at all.
    /// The counter never drops below zero.
    ///
    /// # Returns
    /// - `Ok(Some(entity))` with the post-update state when applied
    /// - `Ok(None)` if the entity does not exist or is already in that state
    async fn apply_like(
        &self,
        kind: MediaKind,
        id: &str,
        liked: bool,
        now: i64,
    ) -> Result<Option<MediaEntity>>;

    /// Undo an `apply_like`: set the flag back to `liked` and add
    /// `count_delta` to the counter
    ///
    /// `count_delta` is the inverse of the change the toggle made, which is
    /// zero when an unlike hit the zero floor. Same conditional rule as
    /// `apply_like`: nothing happens unless the stored flag differs from
    /// `liked`.
    ///
    /// # Returns
    /// - `Ok(Some(entity))` with the restored state when applied
    /// - `Ok(None)` if the entity does not exist or is already in that state
    async fn revert_like(
        &self,
        kind: MediaKind,
        id: &str,
        liked: bool,
        count_delta: i64,
        now: i64,
    ) -> Result<Option<MediaEntity>>;

    /// Count entities of a kind
    async fn count(&self, kind: MediaKind) -> Result<i64>;
}

/// SQLite implementation of MediaRepository
pub struct SqliteMediaRepository {
    pool: SqlitePool,
}

impl SqliteMediaRepository {
    /// Create a new SQLite media repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Flip the flag to `liked` and move the counter by `delta` (floored at
    /// zero) in one statement, only if the stored flag differs
    async fn set_like_state(
        &self,
        kind: MediaKind,
        id: &str,
        liked: bool,
        delta: i64,
        now: i64,
    ) -> Result<Option<MediaEntity>> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE media_items SET
                liked_by_user = ?,
                like_count = MAX(like_count + ?, 0),
                updated_at = ?
            WHERE kind = ? AND id = ? AND liked_by_user <> ?
            "#,
        )
        .bind(liked)
        .bind(delta)
        .bind(now)
        .bind(kind.as_str())
        .bind(id)
        .bind(liked)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            debug!("Like state unchanged");
            return Ok(None);
        }

        let row = query_as::<_, MediaRow>(&format!("{} WHERE kind = ? AND id = ?", SELECT_MEDIA))
            .bind(kind.as_str())
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        MediaEntity::try_from(row).map(Some)
    }
}

const SELECT_MEDIA: &str = "SELECT id, kind, author_name, author_avatar_url, media_url, \
     like_count, liked_by_user, feed_position, updated_at FROM media_items";

#[async_trait]
impl MediaRepository for SqliteMediaRepository {
    #[instrument(skip(self, records), fields(kind = %kind, count = records.len()))]
    async fn upsert_many(
        &self,
        kind: MediaKind,
        records: &[MediaRecord],
        now: i64,
    ) -> Result<usize> {
        for record in records {
            record.validate().map_err(|msg| LibraryError::InvalidInput {
                field: "media".to_string(),
                message: msg,
            })?;
        }

        let mut tx = self.pool.begin().await?;

        for (position, record) in records.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO media_items (
                    kind, id, author_name, author_avatar_url, media_url,
                    like_count, liked_by_user, feed_position, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (kind, id) DO UPDATE SET
                    author_name = excluded.author_name,
                    author_avatar_url = excluded.author_avatar_url,
                    media_url = excluded.media_url,
                    like_count = CASE
                        WHEN EXISTS (
                            SELECT 1 FROM pending_like_actions p
                            WHERE p.target_kind = excluded.kind AND p.target_id = excluded.id
                        ) THEN media_items.like_count
                        ELSE excluded.like_count
                    END,
                    liked_by_user = CASE
                        WHEN EXISTS (
                            SELECT 1 FROM pending_like_actions p
                            WHERE p.target_kind = excluded.kind AND p.target_id = excluded.id
                        ) THEN media_items.liked_by_user
                        ELSE excluded.liked_by_user
                    END,
                    feed_position = excluded.feed_position,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(kind.as_str())
            .bind(&record.id)
            .bind(&record.author_name)
            .bind(&record.author_avatar_url)
            .bind(&record.media_url)
            .bind(i64::try_from(record.like_count).unwrap_or(i64::MAX))
            .bind(record.liked_by_user)
            .bind(position as i64)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!("Upserted media page");
        Ok(records.len())
    }

    async fn list(&self, kind: MediaKind) -> Result<Vec<MediaEntity>> {
        let rows = query_as::<_, MediaRow>(&format!(
            "{} WHERE kind = ? ORDER BY feed_position ASC, updated_at DESC",
            SELECT_MEDIA
        ))
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MediaEntity::try_from).collect()
    }

    async fn find(&self, kind: MediaKind, id: &str) -> Result<Option<MediaEntity>> {
        let row = query_as::<_, MediaRow>(&format!("{} WHERE kind = ? AND id = ?", SELECT_MEDIA))
            .bind(kind.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(MediaEntity::try_from).transpose()
    }

    #[instrument(skip(self), fields(kind = %kind))]
    async fn apply_like(
        &self,
        kind: MediaKind,
        id: &str,
        liked: bool,
        now: i64,
    ) -> Result<Option<MediaEntity>> {
        let delta = if liked { 1 } else { -1 };
        let entity = self.set_like_state(kind, id, liked, delta, now).await?;

        if let Some(entity) = &entity {
            debug!(
                liked = entity.liked_by_user,
                like_count = entity.like_count,
                "Like state applied"
            );
        }
        Ok(entity)
    }

    #[instrument(skip(self), fields(kind = %kind))]
    async fn revert_like(
        &self,
        kind: MediaKind,
        id: &str,
        liked: bool,
        count_delta: i64,
        now: i64,
    ) -> Result<Option<MediaEntity>> {
        let entity = self
            .set_like_state(kind, id, liked, count_delta, now)
            .await?;

        if let Some(entity) = &entity {
            debug!(
                liked = entity.liked_by_user,
                like_count = entity.like_count,
                "Like state reverted"
            );
        }
        Ok(entity)
    }

    async fn count(&self, kind: MediaKind) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM media_items WHERE kind = ?")
            .bind(kind.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    fn record(id: &str, like_count: u64, liked: bool) -> MediaRecord {
        MediaRecord {
            id: id.to_string(),
            author_name: format!("author-{}", id),
            author_avatar_url: format!("https://img.example.com/{}/avatar.png", id),
            media_url: format!("https://img.example.com/{}/post.jpg", id),
            like_count,
            liked_by_user: liked,
        }
    }

    async fn seeded_repo() -> SqliteMediaRepository {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteMediaRepository::new(pool);
        repo.upsert_many(
            MediaKind::Post,
            &[record("p1", 10, false), record("p2", 3, true)],
            1_000,
        )
        .await
        .unwrap();
        repo
    }

    #[tokio::test]
    async fn test_upsert_and_list_in_feed_order() {
        let repo = seeded_repo().await;

        let posts = repo.list(MediaKind::Post).await.unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].id, "p1");
        assert_eq!(posts[1].id, "p2");
        assert_eq!(posts[0].updated_at, 1_000);
        assert!(repo.list(MediaKind::Reel).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_overwrites_server_state() {
        let repo = seeded_repo().await;

        repo.upsert_many(MediaKind::Post, &[record("p2", 7, false), record("p1", 12, true)], 2_000)
            .await
            .unwrap();

        let posts = repo.list(MediaKind::Post).await.unwrap();
        assert_eq!(posts[0].id, "p2");
        assert_eq!(posts[0].like_count, 7);
        assert!(!posts[0].liked_by_user);
        assert_eq!(posts[1].like_count, 12);
        assert_eq!(repo.count(MediaKind::Post).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_upsert_keeps_state_with_pending_action() {
        let repo = seeded_repo().await;
        repo.apply_like(MediaKind::Post, "p1", true, 1_500).await.unwrap();
        sqlx::query(
            "INSERT INTO pending_like_actions (id, target_id, target_kind, desired_liked, created_at)
             VALUES ('a1', 'p1', 'post', 1, 1500)",
        )
        .execute(&repo.pool)
        .await
        .unwrap();

        repo.upsert_many(MediaKind::Post, &[record("p1", 10, false)], 2_000)
            .await
            .unwrap();

        let p1 = repo.find(MediaKind::Post, "p1").await.unwrap().unwrap();
        assert!(p1.liked_by_user);
        assert_eq!(p1.like_count, 11);
    }

    #[tokio::test]
    async fn test_upsert_rejects_empty_id() {
        let repo = seeded_repo().await;
        let result = repo.upsert_many(MediaKind::Post, &[record("", 1, false)], 1).await;

        assert!(matches!(result, Err(LibraryError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_apply_like_pairs_flag_and_counter() {
        let repo = seeded_repo().await;

        let liked = repo
            .apply_like(MediaKind::Post, "p1", true, 2_000)
            .await
            .unwrap()
            .unwrap();
        assert!(liked.liked_by_user);
        assert_eq!(liked.like_count, 11);
        assert_eq!(liked.updated_at, 2_000);

        let unliked = repo
            .apply_like(MediaKind::Post, "p1", false, 3_000)
            .await
            .unwrap()
            .unwrap();
        assert!(!unliked.liked_by_user);
        assert_eq!(unliked.like_count, 10);
    }

    #[tokio::test]
    async fn test_apply_like_is_noop_when_already_in_state() {
        let repo = seeded_repo().await;

        assert!(repo
            .apply_like(MediaKind::Post, "p2", true, 2_000)
            .await
            .unwrap()
            .is_none());

        let p2 = repo.find(MediaKind::Post, "p2").await.unwrap().unwrap();
        assert_eq!(p2.like_count, 3);
        assert_eq!(p2.updated_at, 1_000);
    }

    #[tokio::test]
    async fn test_apply_like_on_missing_entity() {
        let repo = seeded_repo().await;

        assert!(repo
            .apply_like(MediaKind::Reel, "p1", true, 2_000)
            .await
            .unwrap()
            .is_none());
        assert!(repo.find(MediaKind::Reel, "p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unlike_never_goes_negative() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteMediaRepository::new(pool);
        repo.upsert_many(MediaKind::Reel, &[record("r1", 0, true)], 1)
            .await
            .unwrap();

        let reel = repo
            .apply_like(MediaKind::Reel, "r1", false, 2)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(reel.like_count, 0);
        assert!(!reel.liked_by_user);
    }

    #[tokio::test]
    async fn test_revert_after_floored_unlike_restores_snapshot() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteMediaRepository::new(pool);
        repo.upsert_many(MediaKind::Post, &[record("z", 0, true)], 1)
            .await
            .unwrap();

        let applied = repo
            .apply_like(MediaKind::Post, "z", false, 2)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(applied.like_count, 0);

        let restored = repo
            .revert_like(MediaKind::Post, "z", true, 0, 3)
            .await
            .unwrap()
            .unwrap();
        assert!(restored.liked_by_user);
        assert_eq!(restored.like_count, 0);
    }

    #[tokio::test]
    async fn test_revert_like_is_conditional_on_flag() {
        let repo = seeded_repo().await;

        assert!(repo
            .revert_like(MediaKind::Post, "p1", false, -1, 2_000)
            .await
            .unwrap()
            .is_none());

        let p1 = repo.find(MediaKind::Post, "p1").await.unwrap().unwrap();
        assert_eq!(p1.like_count, 10);
        assert!(!p1.liked_by_user);
    }
}
