//! Integration tests for users, feeds and follows.
//!
//! Each test creates its own in-memory SQLite database for isolation and
//! goes through `SubscriptionManager` the way the CLI does.

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;

use gator::storage::{Database, NewPost, User};
use gator::subscriptions::{SubscriptionError, SubscriptionManager};

async fn setup() -> (Database, SubscriptionManager) {
    let db = Database::open(":memory:").await.unwrap();
    let subs = SubscriptionManager::new(db.clone());
    (db, subs)
}

async fn user(db: &Database, name: &str) -> User {
    db.insert_user(name).await.unwrap()
}

fn followed_names(follows: &[gator::storage::FollowedFeed]) -> Vec<&str> {
    follows.iter().map(|f| f.feed_name.as_str()).collect()
}

// ============================================================================
// Feeds
// ============================================================================

#[tokio::test]
async fn test_create_feed_follows_it_for_owner() {
    let (db, subs) = setup().await;
    let kahya = user(&db, "kahya").await;

    let created = subs
        .create_feed("Boot.dev", "https://blog.boot.dev/index.xml", &kahya)
        .await
        .unwrap();
    assert_eq!(created.feed.user_id, kahya.id);
    assert_eq!(created.feed.last_fetched_at, None);

    let follows = subs.list_follows_for_user(kahya.id).await.unwrap();
    assert_eq!(followed_names(&follows), vec!["Boot.dev"]);
    assert_eq!(follows[0].feed_id, created.feed.id);
}

#[tokio::test]
async fn test_feed_list_names_owners() {
    let (db, subs) = setup().await;
    let kahya = user(&db, "kahya").await;
    let holgith = user(&db, "holgith").await;

    subs.create_feed("Boot.dev", "https://blog.boot.dev/index.xml", &kahya)
        .await
        .unwrap();
    subs.create_feed("Wagslane", "https://wagslane.dev/index.xml", &holgith)
        .await
        .unwrap();

    let feeds = subs.list_feeds().await.unwrap();
    let listing: Vec<_> = feeds
        .iter()
        .map(|f| (f.feed.name.as_str(), f.owner_name.as_str()))
        .collect();
    assert_eq!(listing, vec![("Boot.dev", "kahya"), ("Wagslane", "holgith")]);
}

#[tokio::test]
async fn test_duplicate_feed_url_rejected_for_other_user() {
    let (db, subs) = setup().await;
    let kahya = user(&db, "kahya").await;
    let holgith = user(&db, "holgith").await;

    subs.create_feed("Boot.dev", "https://blog.boot.dev/index.xml", &kahya)
        .await
        .unwrap();
    let err = subs
        .create_feed("Boot again", "https://blog.boot.dev/index.xml", &holgith)
        .await
        .unwrap_err();
    assert!(matches!(err, SubscriptionError::FeedExists(_)));

    // The failed create left no follow behind
    assert!(subs
        .list_follows_for_user(holgith.id)
        .await
        .unwrap()
        .is_empty());
}

// ============================================================================
// Follows
// ============================================================================

#[tokio::test]
async fn test_follow_once_then_conflict() {
    let (db, subs) = setup().await;
    let kahya = user(&db, "kahya").await;
    let holgith = user(&db, "holgith").await;
    subs.create_feed("Boot.dev", "https://blog.boot.dev/index.xml", &kahya)
        .await
        .unwrap();

    let details = subs
        .follow_feed(&holgith, "https://blog.boot.dev/index.xml")
        .await
        .unwrap();
    assert_eq!(details.user_name, "holgith");
    assert_eq!(details.feed_name, "Boot.dev");

    let err = subs
        .follow_feed(&holgith, "https://blog.boot.dev/index.xml")
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let follows = subs.list_follows_for_user(holgith.id).await.unwrap();
    assert_eq!(followed_names(&follows), vec!["Boot.dev"]);
}

#[tokio::test]
async fn test_unfollow_without_follow_is_noop() {
    let (db, subs) = setup().await;
    let kahya = user(&db, "kahya").await;
    let holgith = user(&db, "holgith").await;
    subs.create_feed("Boot.dev", "https://blog.boot.dev/index.xml", &kahya)
        .await
        .unwrap();

    let removed = subs
        .unfollow_feed(&holgith, "https://blog.boot.dev/index.xml")
        .await
        .unwrap();
    assert!(!removed);

    // The owner's follow is untouched
    let follows = subs.list_follows_for_user(kahya.id).await.unwrap();
    assert_eq!(follows.len(), 1);
}

#[tokio::test]
async fn test_unfollow_then_refollow() {
    let (db, subs) = setup().await;
    let kahya = user(&db, "kahya").await;
    subs.create_feed("Boot.dev", "https://blog.boot.dev/index.xml", &kahya)
        .await
        .unwrap();

    assert!(subs
        .unfollow_feed(&kahya, "https://blog.boot.dev/index.xml")
        .await
        .unwrap());
    assert!(subs.list_follows_for_user(kahya.id).await.unwrap().is_empty());

    subs.follow_feed(&kahya, "https://blog.boot.dev/index.xml")
        .await
        .unwrap();
    assert_eq!(subs.list_follows_for_user(kahya.id).await.unwrap().len(), 1);
}

// ============================================================================
// Staleness and Browsing
// ============================================================================

#[tokio::test]
async fn test_never_fetched_feed_is_most_stale() {
    let (db, subs) = setup().await;
    let kahya = user(&db, "kahya").await;
    let a = subs
        .create_feed("A", "https://a.example.com/rss", &kahya)
        .await
        .unwrap()
        .feed;
    let b = subs
        .create_feed("B", "https://b.example.com/rss", &kahya)
        .await
        .unwrap()
        .feed;

    let ten = Utc.with_ymd_and_hms(2024, 10, 21, 10, 0, 0).unwrap();
    db.mark_feed_fetched(b.id, ten).await.unwrap();

    // At 10:05, A (never fetched) comes before B (fetched at 10:00)
    let next = db.select_most_stale_feed().await.unwrap().unwrap();
    assert_eq!(next.id, a.id);
}

#[tokio::test]
async fn test_browse_shows_only_followed_feeds_newest_first() {
    let (db, subs) = setup().await;
    let kahya = user(&db, "kahya").await;
    let holgith = user(&db, "holgith").await;
    let mine = subs
        .create_feed("Mine", "https://mine.example.com/rss", &kahya)
        .await
        .unwrap()
        .feed;
    let theirs = subs
        .create_feed("Theirs", "https://theirs.example.com/rss", &holgith)
        .await
        .unwrap()
        .feed;

    for (feed_id, slug, day) in [(mine.id, "old", 1), (mine.id, "new", 3), (theirs.id, "other", 2)] {
        db.insert_post_if_absent(&NewPost {
            feed_id,
            title: slug.to_string(),
            url: format!("https://posts.example.com/{}", slug),
            description: None,
            published_at: Utc.with_ymd_and_hms(2024, 10, day, 12, 0, 0).unwrap(),
        })
        .await
        .unwrap();
    }

    let posts = subs.recent_posts(&kahya, 10).await.unwrap();
    let titles: Vec<_> = posts.iter().map(|p| p.post.title.as_str()).collect();
    assert_eq!(titles, vec!["new", "old"]);

    let limited = subs.recent_posts(&kahya, 1).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].post.title, "new");
}

#[tokio::test]
async fn test_reset_removes_everything() {
    let (db, subs) = setup().await;
    let kahya = user(&db, "kahya").await;
    subs.create_feed("Boot.dev", "https://blog.boot.dev/index.xml", &kahya)
        .await
        .unwrap();

    assert_eq!(db.delete_all_users().await.unwrap(), 1);
    assert!(subs.list_feeds().await.unwrap().is_empty());
    assert!(db.list_users().await.unwrap().is_empty());
}
