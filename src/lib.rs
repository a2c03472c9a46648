//! A multi-user RSS aggregator.
//!
//! Users register feeds and follow them; a background loop fetches the most
//! stale feed once per interval and stores new posts, deduplicated by URL.

pub mod commands;
pub mod config;
pub mod feed;
pub mod ingest;
pub mod storage;
pub mod subscriptions;
pub mod util;
