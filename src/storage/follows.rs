use chrono::Utc;
use serde::Serialize;

use super::schema::Database;
use super::types::{to_millis, DatabaseError, FeedFollow, FeedFollowRow, FollowedFeed, FollowedFeedRow};

/// A freshly created follow together with the names it links
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedFollowDetails {
    #[serde(flatten)]
    pub follow: FeedFollow,
    pub user_name: String,
    pub feed_name: String,
}

impl Database {
    // ========================================================================
    // Follow Operations
    // ========================================================================

    /// Follow `feed_id` as `user_id`.
    ///
    /// A second follow of the same pair fails with [`DatabaseError::Conflict`]
    /// and leaves the existing row untouched.
    pub async fn insert_feed_follow(
        &self,
        user_id: i64,
        feed_id: i64,
    ) -> Result<FeedFollowDetails, DatabaseError> {
        let now = to_millis(Utc::now());
        let mut tx = self.pool.begin().await?;

        let follow = sqlx::query_as::<_, FeedFollowRow>(
            r#"
            INSERT INTO feed_follows (user_id, feed_id, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, user_id, feed_id, created_at, updated_at
        "#,
        )
        .bind(user_id)
        .bind(feed_id)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DatabaseError::from_sqlx(e, "follow"))?
        .into_follow();

        let (user_name, feed_name): (String, String) = sqlx::query_as(
            r#"
            SELECT u.name, f.name
            FROM users u, feeds f
            WHERE u.id = ? AND f.id = ?
        "#,
        )
        .bind(user_id)
        .bind(feed_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(FeedFollowDetails {
            follow,
            user_name,
            feed_name,
        })
    }

    /// Remove a follow. Returns `false` when the pair was not followed.
    pub async fn delete_feed_follow(
        &self,
        user_id: i64,
        feed_id: i64,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM feed_follows WHERE user_id = ? AND feed_id = ?")
            .bind(user_id)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Feeds followed by `user_id`, in the order they were followed
    pub async fn list_follows_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<FollowedFeed>, DatabaseError> {
        let rows = sqlx::query_as::<_, FollowedFeedRow>(
            r#"
            SELECT ff.id AS follow_id, f.id AS feed_id, f.name AS feed_name,
                   f.url AS feed_url, ff.created_at AS followed_at
            FROM feed_follows ff
            JOIN feeds f ON f.id = ff.feed_id
            WHERE ff.user_id = ?
            ORDER BY ff.id
        "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FollowedFeed::from).collect())
    }
}
