use serde::Serialize;
use thiserror::Error;

use crate::util::decode_entities;

/// The feed body could not be turned into an RSS document.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("feed is empty")]
    Empty,

    #[error("not an RSS document")]
    NotRss,

    #[error("RSS document ended before a complete <channel>")]
    Incomplete,

    #[error("malformed RSS: {0}")]
    Malformed(#[source] rss::Error),
}

impl From<rss::Error> for ParseError {
    fn from(err: rss::Error) -> Self {
        match err {
            rss::Error::InvalidStartTag => ParseError::NotRss,
            rss::Error::Eof => ParseError::Incomplete,
            other => ParseError::Malformed(other),
        }
    }
}

/// A parsed RSS channel.
///
/// Title and description have had HTML character references decoded;
/// every field is trimmed. Missing elements are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RssFeed {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Items in document order
    pub items: Vec<RssItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RssItem {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Raw `<pubDate>` text, parsed later by the ingestion cycle
    pub pub_date: String,
}

impl From<&rss::Item> for RssItem {
    fn from(item: &rss::Item) -> Self {
        Self {
            title: clean_text(item.title().unwrap_or_default()),
            link: item.link().unwrap_or_default().trim().to_string(),
            description: clean_text(item.description().unwrap_or_default()),
            pub_date: item.pub_date().unwrap_or_default().trim().to_string(),
        }
    }
}

fn clean_text(raw: &str) -> String {
    decode_entities(raw.trim()).trim().to_string()
}

/// Parse an RSS 2.0 document.
///
/// XML escapes are resolved by the reader; HTML references left in titles
/// and descriptions (including double-encoded ones such as `&amp;eacute;`)
/// are decoded afterwards. Namespaced elements (`<atom:link>`,
/// `<media:title>`) never overwrite the plain RSS fields.
///
/// The whole document must be well-formed; there is no partial result.
pub fn parse_feed(bytes: &[u8]) -> Result<RssFeed, ParseError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ParseError::Empty);
    }

    // DOCTYPE entity declarations are never expanded by the underlying
    // reader, so external-entity payloads do not resolve.
    let channel = rss::Channel::read_from(bytes)?;

    Ok(RssFeed {
        title: clean_text(channel.title()),
        link: channel.link().trim().to_string(),
        description: clean_text(channel.description()),
        items: channel.items().iter().map(RssItem::from).collect(),
    })
}
