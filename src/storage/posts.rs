use chrono::Utc;

use super::schema::Database;
use super::types::{to_millis, DatabaseError, NewPost, PostRow, PostWithFeed};

/// Upper bound on posts returned by a single listing
const MAX_POSTS: i64 = 500;

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert a post unless one with the same URL already exists.
    ///
    /// Returns `true` when a row was created. An existing URL is not an error;
    /// the stored post is left as it was.
    pub async fn insert_post_if_absent(&self, post: &NewPost) -> Result<bool, DatabaseError> {
        let now = to_millis(Utc::now());
        let result = sqlx::query(
            r#"
            INSERT INTO posts (feed_id, title, url, description, published_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO NOTHING
        "#,
        )
        .bind(post.feed_id)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(to_millis(post.published_at))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count_posts(&self) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_posts_for_feed(&self, feed_id: i64) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Most recent posts from the feeds `user_id` follows, newest first.
    ///
    /// `limit` is capped at [`MAX_POSTS`].
    pub async fn list_posts_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<PostWithFeed>, DatabaseError> {
        let limit = limit.clamp(0, MAX_POSTS);
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT p.id, p.feed_id, p.title, p.url, p.description, p.published_at,
                   p.created_at, p.updated_at, f.name AS feed_name
            FROM posts p
            JOIN feed_follows ff ON ff.feed_id = p.feed_id
            JOIN feeds f ON f.id = p.feed_id
            WHERE ff.user_id = ?
            ORDER BY p.published_at DESC, p.id DESC
            LIMIT ?
        "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PostRow::into_post_with_feed).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone};

    async fn setup() -> (Database, i64, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.insert_user("reader").await.unwrap();
        let (feed, _) = db
            .insert_feed("Blog", "https://example.com/rss", user.id)
            .await
            .unwrap();
        (db, user.id, feed.id)
    }

    fn post(feed_id: i64, slug: &str, published_at: DateTime<Utc>) -> NewPost {
        NewPost {
            feed_id,
            title: format!("Post {}", slug),
            url: format!("https://example.com/{}", slug),
            description: Some("summary".into()),
            published_at,
        }
    }

    #[tokio::test]
    async fn test_insert_post_if_absent_dedupes_on_url() {
        let (db, _, feed) = setup().await;
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        assert!(db.insert_post_if_absent(&post(feed, "a", at)).await.unwrap());
        assert!(!db.insert_post_if_absent(&post(feed, "a", at)).await.unwrap());
        assert_eq!(db.count_posts().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_existing_post_is_not_overwritten() {
        let (db, user, feed) = setup().await;
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        db.insert_post_if_absent(&post(feed, "a", at)).await.unwrap();

        let mut changed = post(feed, "a", at);
        changed.title = "Rewritten".into();
        assert!(!db.insert_post_if_absent(&changed).await.unwrap());

        let posts = db.list_posts_for_user(user, 10).await.unwrap();
        assert_eq!(posts[0].post.title, "Post a");
    }

    #[tokio::test]
    async fn test_description_is_optional() {
        let (db, user, feed) = setup().await;
        let mut p = post(feed, "bare", Utc::now());
        p.description = None;
        db.insert_post_if_absent(&p).await.unwrap();

        let posts = db.list_posts_for_user(user, 10).await.unwrap();
        assert_eq!(posts[0].post.description, None);
    }

    #[tokio::test]
    async fn test_published_at_round_trips_to_the_millisecond() {
        let (db, user, feed) = setup().await;
        let at = DateTime::from_timestamp_millis(1_714_557_600_123).unwrap();
        db.insert_post_if_absent(&post(feed, "ms", at)).await.unwrap();

        let posts = db.list_posts_for_user(user, 1).await.unwrap();
        assert_eq!(posts[0].post.published_at, at);
    }

    #[tokio::test]
    async fn test_list_posts_for_user_only_followed_newest_first() {
        let (db, user, blog) = setup().await;
        let other = db.insert_user("other").await.unwrap();
        let (unfollowed, _) = db
            .insert_feed("Other", "https://other.example.com/rss", other.id)
            .await
            .unwrap();

        let t = |h| Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap();
        db.insert_post_if_absent(&post(blog, "old", t(1))).await.unwrap();
        db.insert_post_if_absent(&post(blog, "new", t(5))).await.unwrap();
        db.insert_post_if_absent(&post(unfollowed.id, "hidden", t(9)))
            .await
            .unwrap();

        let posts = db.list_posts_for_user(user, 10).await.unwrap();
        let urls: Vec<&str> = posts.iter().map(|p| p.post.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://example.com/new", "https://example.com/old"]
        );
        assert!(posts.iter().all(|p| p.feed_name == "Blog"));

        let limited = db.list_posts_for_user(user, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(db.count_posts_for_feed(blog).await.unwrap(), 2);
    }
}
