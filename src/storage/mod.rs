//! SQLite-backed feed store.
//!
//! [`Database`] owns every persisted row: users, feeds, follows and posts.
//! Operations are grouped by table in the submodules, all as methods on the
//! same handle. Uniqueness is enforced by the schema; duplicate users, feed
//! URLs and follows surface as [`DatabaseError::Conflict`], while duplicate
//! post URLs are absorbed by [`Database::insert_post_if_absent`].

mod feeds;
mod follows;
mod posts;
mod schema;
mod types;
mod users;

pub use follows::FeedFollowDetails;
pub use schema::Database;
pub use types::{
    DatabaseError, Feed, FeedFollow, FeedWithOwner, FollowedFeed, NewPost, Post, PostWithFeed,
    User,
};
