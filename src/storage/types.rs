use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-facing messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A uniqueness constraint rejected the write (duplicate user name,
    /// feed URL or follow pair)
    #[error("{0} already exists")]
    Conflict(String),

    /// The referenced row does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Classify a sqlx error, turning unique-constraint violations into
    /// [`DatabaseError::Conflict`] labelled with `what`.
    ///
    /// Relies on the driver's error kind rather than message text.
    pub(crate) fn from_sqlx(err: sqlx::Error, what: impl Into<String>) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DatabaseError::Conflict(what.into())
            }
            _ => DatabaseError::Other(err),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, DatabaseError::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound(_))
    }
}

// ============================================================================
// Timestamp Helpers
// ============================================================================

/// Timestamps are persisted as UTC milliseconds since the epoch.
pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserRow {
    pub id: i64,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl UserRow {
    pub(crate) fn into_user(self) -> User {
        User {
            id: self.id,
            name: self.name,
            created_at: from_millis(self.created_at),
            updated_at: from_millis(self.updated_at),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedRow {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub user_id: i64,
    pub last_fetched_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl FeedRow {
    pub(crate) fn into_feed(self) -> Feed {
        Feed {
            id: self.id,
            name: self.name,
            url: self.url,
            user_id: self.user_id,
            last_fetched_at: self.last_fetched_at.map(from_millis),
            created_at: from_millis(self.created_at),
            updated_at: from_millis(self.updated_at),
        }
    }
}

/// Feed joined with its owner's name (list_feeds_with_owner)
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedOwnerRow {
    #[sqlx(flatten)]
    pub feed: FeedRow,
    pub owner_name: String,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedFollowRow {
    pub id: i64,
    pub user_id: i64,
    pub feed_id: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl FeedFollowRow {
    pub(crate) fn into_follow(self) -> FeedFollow {
        FeedFollow {
            id: self.id,
            user_id: self.user_id,
            feed_id: self.feed_id,
            created_at: from_millis(self.created_at),
            updated_at: from_millis(self.updated_at),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FollowedFeedRow {
    pub follow_id: i64,
    pub feed_id: i64,
    pub feed_name: String,
    pub feed_url: String,
    pub followed_at: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PostRow {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub feed_name: String,
}

impl PostRow {
    pub(crate) fn into_post_with_feed(self) -> PostWithFeed {
        PostWithFeed {
            feed_name: self.feed_name,
            post: Post {
                id: self.id,
                feed_id: self.feed_id,
                title: self.title,
                url: self.url,
                description: self.description,
                published_at: from_millis(self.published_at),
                created_at: from_millis(self.created_at),
                updated_at: from_millis(self.updated_at),
            },
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A registered feed source.
///
/// `last_fetched_at` is `None` until the first ingestion cycle touches the
/// feed; it is the only input to staleness ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feed {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub user_id: i64,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedWithOwner {
    #[serde(flatten)]
    pub feed: Feed,
    pub owner_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedFollow {
    pub id: i64,
    pub user_id: i64,
    pub feed_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A follow as seen from the user's side, in follow order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowedFeed {
    pub follow_id: i64,
    pub feed_id: i64,
    pub feed_name: String,
    pub feed_url: String,
    pub followed_at: DateTime<Utc>,
}

impl From<FollowedFeedRow> for FollowedFeed {
    fn from(row: FollowedFeedRow) -> Self {
        Self {
            follow_id: row.follow_id,
            feed_id: row.feed_id,
            feed_name: row.feed_name,
            feed_url: row.feed_url,
            followed_at: from_millis(row.followed_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostWithFeed {
    pub feed_name: String,
    #[serde(flatten)]
    pub post: Post,
}

/// A post ready to be written by the ingestion cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub feed_id: i64,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: DateTime<Utc>,
}
