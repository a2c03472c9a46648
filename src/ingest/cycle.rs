use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::dates::parse_pub_date;
use super::shutdown::Shutdown;
use super::IngestError;
use crate::feed::{FeedFetcher, RssFeed};
use crate::storage::{Database, Feed, NewPost};

/// What to do with an item whose `<pubDate>` cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidDatePolicy {
    /// Log the item, leave it out, and carry on with the rest of the feed
    #[default]
    Skip,
    /// End the cycle at the first bad date; earlier items stay stored
    Abort,
}

/// Counts from one ingested feed document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub feed_id: i64,
    pub feed_name: String,
    /// Items present in the document
    pub items: usize,
    pub new_posts: usize,
    /// Items whose URL was already stored
    pub duplicates: usize,
    /// Items left out for a missing link or unparsable date
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No feeds registered
    Idle,
    Ingested(CycleReport),
}

/// One select, mark, fetch, persist pass over the most stale feed.
#[derive(Clone)]
pub struct Ingestor {
    db: Database,
    fetcher: FeedFetcher,
    invalid_dates: InvalidDatePolicy,
}

impl Ingestor {
    pub fn new(db: Database, fetcher: FeedFetcher) -> Self {
        Self {
            db,
            fetcher,
            invalid_dates: InvalidDatePolicy::default(),
        }
    }

    pub fn with_invalid_date_policy(mut self, policy: InvalidDatePolicy) -> Self {
        self.invalid_dates = policy;
        self
    }

    /// Run a single cycle as of `now`.
    ///
    /// The feed is stamped with `now` before the request goes out and the
    /// stamp stands whatever happens next, so a failing feed rotates to the
    /// back of the queue. If `shutdown` fires while the request is in flight
    /// the request is dropped and [`IngestError::Cancelled`] is returned.
    pub async fn run_cycle(
        &self,
        now: DateTime<Utc>,
        shutdown: &mut Shutdown,
    ) -> Result<CycleOutcome, IngestError> {
        let Some(feed) = self.db.select_most_stale_feed().await? else {
            tracing::debug!("No feeds registered, nothing to fetch");
            return Ok(CycleOutcome::Idle);
        };

        self.db.mark_feed_fetched(feed.id, now).await?;
        tracing::info!(feed = %feed.name, url = %feed.url, "Fetching feed");

        let document = tokio::select! {
            biased;
            _ = shutdown.triggered() => {
                return Err(IngestError::Cancelled { feed: feed.name.clone() });
            }
            result = self.fetcher.fetch(&feed.url) => {
                result.map_err(|source| IngestError::Fetch {
                    feed: feed.name.clone(),
                    source,
                })?
            }
        };

        let report = self.persist(&feed, &document).await?;
        Ok(CycleOutcome::Ingested(report))
    }

    /// Store every item of `document` as a post of `feed`, in document order.
    ///
    /// Items whose URL is already stored count as duplicates and are not an
    /// error. Only store failures and, under [`InvalidDatePolicy::Abort`],
    /// a bad publication date end the pass early.
    pub async fn persist(
        &self,
        feed: &Feed,
        document: &RssFeed,
    ) -> Result<CycleReport, IngestError> {
        let mut report = CycleReport {
            feed_id: feed.id,
            feed_name: feed.name.clone(),
            items: document.items.len(),
            ..CycleReport::default()
        };

        for item in &document.items {
            if item.link.is_empty() {
                tracing::warn!(feed = %feed.name, title = %item.title, "Skipping item without a link");
                report.skipped += 1;
                continue;
            }

            let published_at = match parse_pub_date(&item.pub_date) {
                Ok(at) => at,
                Err(source) => match self.invalid_dates {
                    InvalidDatePolicy::Skip => {
                        tracing::warn!(
                            feed = %feed.name,
                            link = %item.link,
                            pub_date = %item.pub_date,
                            error = %source,
                            "Skipping item with unparsable publication date"
                        );
                        report.skipped += 1;
                        continue;
                    }
                    InvalidDatePolicy::Abort => {
                        return Err(IngestError::InvalidPublishedDate {
                            feed: feed.name.clone(),
                            link: item.link.clone(),
                            value: item.pub_date.clone(),
                            source,
                        });
                    }
                },
            };

            let post = NewPost {
                feed_id: feed.id,
                title: item.title.clone(),
                url: item.link.clone(),
                description: (!item.description.is_empty()).then(|| item.description.clone()),
                published_at,
            };

            if self.db.insert_post_if_absent(&post).await? {
                report.new_posts += 1;
            } else {
                tracing::debug!(url = %post.url, "Post already stored");
                report.duplicates += 1;
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::RssItem;
    use crate::ingest::shutdown_channel;

    fn test_fetcher() -> FeedFetcher {
        FeedFetcher::new(std::time::Duration::from_secs(1), 1024).unwrap()
    }

    async fn setup() -> (Ingestor, Feed) {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.insert_user("lane").await.unwrap();
        let (feed, _) = db
            .insert_feed("Blog", "https://example.com/rss", user.id)
            .await
            .unwrap();
        (Ingestor::new(db, test_fetcher()), feed)
    }

    fn item(slug: &str, pub_date: &str) -> RssItem {
        RssItem {
            title: format!("Title {}", slug),
            link: format!("https://example.com/{}", slug),
            description: String::new(),
            pub_date: pub_date.to_string(),
        }
    }

    const DATE: &str = "Mon, 21 Oct 2024 07:28:00 +0000";

    #[tokio::test]
    async fn test_persist_counts_new_and_duplicate() {
        let (ingestor, feed) = setup().await;
        let doc = RssFeed {
            items: vec![item("a", DATE), item("b", DATE)],
            ..RssFeed::default()
        };

        let first = ingestor.persist(&feed, &doc).await.unwrap();
        assert_eq!((first.new_posts, first.duplicates), (2, 0));

        let second = ingestor.persist(&feed, &doc).await.unwrap();
        assert_eq!((second.new_posts, second.duplicates), (0, 2));
        assert_eq!(ingestor.db.count_posts().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_persist_skips_bad_dates_by_default() {
        let (ingestor, feed) = setup().await;
        let doc = RssFeed {
            items: vec![item("a", DATE), item("bad", "last tuesday"), item("c", DATE)],
            ..RssFeed::default()
        };

        let report = ingestor.persist(&feed, &doc).await.unwrap();
        assert_eq!(report.items, 3);
        assert_eq!(report.new_posts, 2);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_persist_abort_policy_stops_at_bad_date() {
        let (ingestor, feed) = setup().await;
        let ingestor = ingestor.with_invalid_date_policy(InvalidDatePolicy::Abort);
        let doc = RssFeed {
            items: vec![item("a", DATE), item("bad", ""), item("c", DATE)],
            ..RssFeed::default()
        };

        let err = ingestor.persist(&feed, &doc).await.unwrap_err();
        assert!(matches!(
            err,
            IngestError::InvalidPublishedDate { ref link, .. } if link == "https://example.com/bad"
        ));
        // Items before the bad one are kept
        assert_eq!(ingestor.db.count_posts().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_persist_skips_items_without_link() {
        let (ingestor, feed) = setup().await;
        let mut linkless = item("x", DATE);
        linkless.link.clear();
        let doc = RssFeed {
            items: vec![linkless],
            ..RssFeed::default()
        };

        let report = ingestor.persist(&feed, &doc).await.unwrap();
        assert_eq!((report.new_posts, report.skipped), (0, 1));
    }

    #[tokio::test]
    async fn test_run_cycle_idle_without_feeds() {
        let db = Database::open(":memory:").await.unwrap();
        let ingestor = Ingestor::new(db, test_fetcher());
        let (_trigger, mut shutdown) = shutdown_channel();

        let outcome = ingestor.run_cycle(Utc::now(), &mut shutdown).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Idle);
    }

    #[tokio::test]
    async fn test_run_cycle_already_shut_down_still_marks() {
        let (ingestor, feed) = setup().await;
        let (trigger, mut shutdown) = shutdown_channel();
        trigger.trigger();

        let now = Utc::now();
        let err = ingestor.run_cycle(now, &mut shutdown).await.unwrap_err();
        assert!(matches!(err, IngestError::Cancelled { .. }));

        let stored = ingestor.db.get_feed_by_id(feed.id).await.unwrap().unwrap();
        assert_eq!(
            stored.last_fetched_at.map(|t| t.timestamp_millis()),
            Some(now.timestamp_millis())
        );
    }

    #[test]
    fn test_policy_from_toml_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: InvalidDatePolicy,
        }
        let w: Wrapper = toml::from_str("policy = \"abort\"").unwrap();
        assert_eq!(w.policy, InvalidDatePolicy::Abort);
        let w: Wrapper = toml::from_str("policy = \"skip\"").unwrap();
        assert_eq!(w.policy, InvalidDatePolicy::Skip);
    }
}
