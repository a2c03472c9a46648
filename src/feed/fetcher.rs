use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use super::parser::{parse_feed, ParseError, RssFeed};

/// Fixed client identifier sent with every feed request.
pub const USER_AGENT: &str = "gator";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors from retrieving and parsing one feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, ...)
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Non-2xx response
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// No complete response within the configured timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// Body exceeded the configured size limit
    #[error("response larger than {0} bytes")]
    ResponseTooLarge(usize),
    /// Fewer bytes arrived than Content-Length announced
    #[error("incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// The body arrived but is not a well-formed RSS document
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

impl FetchError {
    /// True when the body was retrieved but failed to parse.
    pub fn is_parse(&self) -> bool {
        matches!(self, FetchError::Parse(_))
    }
}

/// Retrieves feed documents over HTTP.
///
/// Holds one pooled [`reqwest::Client`]. Cancelling a fetch is a matter of
/// dropping the future returned by [`FeedFetcher::fetch`]; the in-flight
/// request is aborted with it.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_size: usize,
}

impl FeedFetcher {
    pub fn new(timeout: Duration, max_size: usize) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()?;
        Ok(Self {
            client,
            timeout,
            max_size,
        })
    }

    /// Fetch `url` and parse the body as RSS.
    ///
    /// No partial document is ever returned: a transport, status, size or
    /// parse failure all yield an error.
    pub async fn fetch(&self, url: &str) -> Result<RssFeed, FetchError> {
        let bytes = tokio::time::timeout(self.timeout, self.fetch_bytes(url))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;

        let feed = parse_feed(&bytes)?;
        tracing::debug!(
            url = %url,
            bytes = bytes.len(),
            items = feed.items.len(),
            "Fetched feed"
        );
        Ok(feed)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        read_limited_bytes(response, self.max_size).await
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: refuse before reading when Content-Length already says too much
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
