//! Feed retrieval and RSS parsing.
//!
//! - [`parser`] turns an RSS 2.0 body into an [`RssFeed`] with entities decoded
//! - [`fetcher`] performs the HTTP GET with size and time limits
//!
//! ```ignore
//! let fetcher = FeedFetcher::new(Duration::from_secs(30), DEFAULT_MAX_FEED_SIZE)?;
//! let feed = fetcher.fetch("https://blog.boot.dev/index.xml").await?;
//! for item in &feed.items {
//!     println!("{} ({})", item.title, item.pub_date);
//! }
//! ```

mod fetcher;
mod parser;

pub use fetcher::{FeedFetcher, FetchError, DEFAULT_MAX_FEED_SIZE, DEFAULT_TIMEOUT, USER_AGENT};
pub use parser::{parse_feed, ParseError, RssFeed, RssItem};
