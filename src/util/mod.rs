//! Small parsing helpers shared by the CLI and the ingestion pipeline.
//!
//! - **URL validation**: feed URLs must be absolute http(s) with a host
//! - **Entity decoding**: HTML character references in feed text
//! - **Durations**: `"1h30m"`-style interval strings for `agg`

mod duration;
mod text;
mod url_validator;

pub use duration::{parse_duration, DurationError};
pub use text::decode_entities;
pub use url_validator::{validate_feed_url, HostPolicy, UrlValidationError};
