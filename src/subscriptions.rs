//! Follow relationships between users and feeds.
//!
//! Invoked synchronously by user-facing commands; shares the store with the
//! ingestion loop but never coordinates with it.
use serde::Serialize;
use thiserror::Error;

use crate::storage::{
    Database, DatabaseError, Feed, FeedFollow, FeedFollowDetails, FeedWithOwner, FollowedFeed,
    PostWithFeed, User,
};
use crate::util::{validate_feed_url, HostPolicy, UrlValidationError};

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error(transparent)]
    InvalidUrl(#[from] UrlValidationError),

    #[error("a feed with URL {0} already exists")]
    FeedExists(String),

    #[error("no feed with URL {0}")]
    FeedNotFound(String),

    #[error("{user} already follows {url}")]
    AlreadyFollowing { user: String, url: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl SubscriptionError {
    /// Duplicate feed URL or follow pair
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            SubscriptionError::FeedExists(_) | SubscriptionError::AlreadyFollowing { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SubscriptionError::FeedNotFound(_))
    }
}

/// Result of [`SubscriptionManager::create_feed`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedFeed {
    pub feed: Feed,
    /// The owner's automatic follow
    pub follow: FeedFollow,
}

#[derive(Clone)]
pub struct SubscriptionManager {
    db: Database,
    hosts: HostPolicy,
}

impl SubscriptionManager {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            hosts: HostPolicy::default(),
        }
    }

    pub fn with_host_policy(mut self, hosts: HostPolicy) -> Self {
        self.hosts = hosts;
        self
    }

    /// Register a feed and follow it on the owner's behalf.
    ///
    /// The URL must be absolute http(s); loopback and private hosts are
    /// refused only under [`HostPolicy::PublicOnly`]. It is stored as given
    /// (trimmed). Feed and follow are written together; a duplicate URL
    /// leaves neither.
    pub async fn create_feed(
        &self,
        name: &str,
        url: &str,
        owner: &User,
    ) -> Result<CreatedFeed, SubscriptionError> {
        validate_feed_url(url, self.hosts)?;
        let url = url.trim();

        match self.db.insert_feed(name.trim(), url, owner.id).await {
            Ok((feed, follow)) => {
                tracing::info!(feed = %feed.name, url = %feed.url, owner = %owner.name, "Feed added");
                Ok(CreatedFeed { feed, follow })
            }
            Err(e) if e.is_conflict() => Err(SubscriptionError::FeedExists(url.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Follow the feed registered under `url`.
    pub async fn follow_feed(
        &self,
        user: &User,
        url: &str,
    ) -> Result<FeedFollowDetails, SubscriptionError> {
        let feed = self.feed_by_url(url).await?;

        match self.db.insert_feed_follow(user.id, feed.id).await {
            Ok(details) => Ok(details),
            Err(e) if e.is_conflict() => Err(SubscriptionError::AlreadyFollowing {
                user: user.name.clone(),
                url: feed.url,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Stop following the feed at `url`.
    ///
    /// Returns `false` if the user was not following it, which is not an
    /// error. An unknown URL is.
    pub async fn unfollow_feed(&self, user: &User, url: &str) -> Result<bool, SubscriptionError> {
        let feed = self.feed_by_url(url).await?;
        let removed = self.db.delete_feed_follow(user.id, feed.id).await?;
        if !removed {
            tracing::debug!(user = %user.name, url = %feed.url, "Unfollow of a feed that was not followed");
        }
        Ok(removed)
    }

    /// Every feed with its owner's name, oldest first
    pub async fn list_feeds(&self) -> Result<Vec<FeedWithOwner>, SubscriptionError> {
        Ok(self.db.list_feeds_with_owner().await?)
    }

    /// Feeds `user_id` follows, in follow order
    pub async fn list_follows_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<FollowedFeed>, SubscriptionError> {
        Ok(self.db.list_follows_for_user(user_id).await?)
    }

    /// Latest posts across the feeds `user` follows
    pub async fn recent_posts(
        &self,
        user: &User,
        limit: i64,
    ) -> Result<Vec<PostWithFeed>, SubscriptionError> {
        Ok(self.db.list_posts_for_user(user.id, limit).await?)
    }

    async fn feed_by_url(&self, url: &str) -> Result<Feed, SubscriptionError> {
        let url = url.trim();
        self.db
            .get_feed_by_url(url)
            .await?
            .ok_or_else(|| SubscriptionError::FeedNotFound(url.to_string()))
    }
}
