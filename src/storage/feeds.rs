use chrono::{DateTime, Utc};

use super::schema::Database;
use super::types::{
    to_millis, DatabaseError, Feed, FeedFollow, FeedFollowRow, FeedOwnerRow, FeedRow,
    FeedWithOwner,
};

const FEED_COLUMNS: &str = "id, name, url, user_id, last_fetched_at, created_at, updated_at";

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Insert a feed owned by `user_id` and follow it on the owner's behalf.
    ///
    /// Both rows are written in one transaction: either the feed exists and
    /// its owner follows it, or neither row exists. A duplicate URL fails with
    /// [`DatabaseError::Conflict`].
    pub async fn insert_feed(
        &self,
        name: &str,
        url: &str,
        user_id: i64,
    ) -> Result<(Feed, FeedFollow), DatabaseError> {
        let now = to_millis(Utc::now());
        let mut tx = self.pool.begin().await?;

        let feed = sqlx::query_as::<_, FeedRow>(&format!(
            "INSERT INTO feeds (name, url, user_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?) RETURNING {}",
            FEED_COLUMNS
        ))
        .bind(name)
        .bind(url)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DatabaseError::from_sqlx(e, format!("feed '{}'", url)))?
        .into_feed();

        let follow = sqlx::query_as::<_, FeedFollowRow>(
            r#"
            INSERT INTO feed_follows (user_id, feed_id, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, user_id, feed_id, created_at, updated_at
        "#,
        )
        .bind(user_id)
        .bind(feed.id)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DatabaseError::from_sqlx(e, "follow"))?
        .into_follow();

        tx.commit().await?;

        tracing::debug!(feed_id = feed.id, url = %feed.url, user_id, "Feed created");
        Ok((feed, follow))
    }

    pub async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>, DatabaseError> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {} FROM feeds WHERE url = ?",
            FEED_COLUMNS
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FeedRow::into_feed))
    }

    pub async fn get_feed_by_id(&self, id: i64) -> Result<Option<Feed>, DatabaseError> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {} FROM feeds WHERE id = ?",
            FEED_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FeedRow::into_feed))
    }

    /// Every feed with its owner's name, in creation order
    pub async fn list_feeds_with_owner(&self) -> Result<Vec<FeedWithOwner>, DatabaseError> {
        let rows = sqlx::query_as::<_, FeedOwnerRow>(
            r#"
            SELECT f.id, f.name, f.url, f.user_id, f.last_fetched_at,
                   f.created_at, f.updated_at, u.name AS owner_name
            FROM feeds f
            JOIN users u ON u.id = f.user_id
            ORDER BY f.id
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| FeedWithOwner {
                feed: row.feed.into_feed(),
                owner_name: row.owner_name,
            })
            .collect())
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// The single feed most overdue for a fetch.
    ///
    /// Never-fetched feeds come first, then the oldest `last_fetched_at`;
    /// ties go to the lowest ID. `None` when there are no feeds.
    pub async fn select_most_stale_feed(&self) -> Result<Option<Feed>, DatabaseError> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {} FROM feeds ORDER BY last_fetched_at ASC NULLS FIRST, id ASC LIMIT 1",
            FEED_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FeedRow::into_feed))
    }

    /// Stamp a feed as fetched at `at`, before the fetch is attempted.
    pub async fn mark_feed_fetched(
        &self,
        feed_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let at = to_millis(at);
        let result =
            sqlx::query("UPDATE feeds SET last_fetched_at = ?, updated_at = ? WHERE id = ?")
                .bind(at)
                .bind(at)
                .bind(feed_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("feed {}", feed_id)));
        }
        Ok(())
    }
}
