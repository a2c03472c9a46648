//! Background ingestion: the recurring loop that keeps posts up to date.
//!
//! Each cycle picks the single feed fetched longest ago (never-fetched feeds
//! first), stamps it, downloads and parses it, and stores any posts whose URL
//! is new. Only one request is ever in flight. Failures end the cycle they
//! occur in and are logged; the loop itself only stops on shutdown.
//!
//! ```ignore
//! let ingestor = Ingestor::new(db, fetcher);
//! let handle = Scheduler::new(ingestor, parse_duration("1m")?)?.spawn();
//! tokio::signal::ctrl_c().await?;
//! let summary = handle.stop().await;
//! ```

mod cycle;
mod dates;
mod scheduler;
mod shutdown;

use thiserror::Error;

use crate::feed::FetchError;
use crate::storage::DatabaseError;

pub use cycle::{CycleOutcome, CycleReport, Ingestor, InvalidDatePolicy};
pub use dates::{parse_pub_date, PUB_DATE_FORMAT};
pub use scheduler::{RunSummary, Scheduler, SchedulerHandle, ZeroIntervalError};
pub use shutdown::{shutdown_channel, Shutdown, ShutdownTrigger};

/// Why a cycle ended early.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The feed could not be retrieved or its body is not RSS
    #[error("fetching feed '{feed}' failed: {source}")]
    Fetch {
        feed: String,
        #[source]
        source: FetchError,
    },

    /// An item's publication date is unparsable
    #[error("feed '{feed}': item {link} has unparsable pubDate {value:?}: {source}")]
    InvalidPublishedDate {
        feed: String,
        link: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Shutdown arrived while the fetch was in flight
    #[error("fetch of feed '{feed}' cancelled")]
    Cancelled { feed: String },
}
