use chrono::Utc;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::cycle::{CycleOutcome, Ingestor};
use super::shutdown::{shutdown_channel, Shutdown, ShutdownTrigger};
use super::IngestError;

#[derive(Debug, Error)]
#[error("ingestion interval must be greater than zero")]
pub struct ZeroIntervalError;

/// Totals over the lifetime of one scheduler run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub cycles: u64,
    pub idle_cycles: u64,
    pub failed_cycles: u64,
    pub new_posts: u64,
}

/// Runs ingestion cycles on a fixed period until shut down.
///
/// The first cycle starts immediately. Cycles never overlap: a cycle that
/// outlasts the period pushes the next tick back instead of queueing a burst.
pub struct Scheduler {
    ingestor: Ingestor,
    period: Duration,
}

impl Scheduler {
    pub fn new(ingestor: Ingestor, period: Duration) -> Result<Self, ZeroIntervalError> {
        if period.is_zero() {
            return Err(ZeroIntervalError);
        }
        Ok(Self { ingestor, period })
    }

    /// Drive cycles until `shutdown` fires.
    ///
    /// Fetch, parse and per-item failures end only the cycle they happen in;
    /// they are logged and the loop waits for the next tick.
    pub async fn run(self, mut shutdown: Shutdown) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(period = ?self.period, "Collecting feeds");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.triggered() => break,
                _ = ticker.tick() => {}
            }

            summary.cycles += 1;
            match self.ingestor.run_cycle(Utc::now(), &mut shutdown).await {
                Ok(CycleOutcome::Idle) => {
                    summary.idle_cycles += 1;
                }
                Ok(CycleOutcome::Ingested(report)) => {
                    summary.new_posts += report.new_posts as u64;
                    tracing::info!(
                        feed = %report.feed_name,
                        items = report.items,
                        new_posts = report.new_posts,
                        skipped = report.skipped,
                        "Feed ingested"
                    );
                }
                Err(IngestError::Cancelled { feed }) => {
                    summary.failed_cycles += 1;
                    tracing::info!(feed = %feed, "Fetch abandoned for shutdown");
                    break;
                }
                Err(e) => {
                    summary.failed_cycles += 1;
                    tracing::warn!(error = %e, "Ingestion cycle failed");
                }
            }
        }

        tracing::info!(
            cycles = summary.cycles,
            new_posts = summary.new_posts,
            "Stopped collecting feeds"
        );
        summary
    }

    /// Run on a background task, returning a handle to stop it.
    pub fn spawn(self) -> SchedulerHandle {
        let (trigger, shutdown) = shutdown_channel();
        let join = tokio::spawn(self.run(shutdown));
        SchedulerHandle { trigger, join }
    }
}

pub struct SchedulerHandle {
    trigger: ShutdownTrigger,
    join: JoinHandle<RunSummary>,
}

impl SchedulerHandle {
    /// Request shutdown and wait for the loop to exit.
    pub async fn stop(self) -> RunSummary {
        self.trigger.trigger();
        match self.join.await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(error = %e, "Scheduler task failed");
                RunSummary::default()
            }
        }
    }
}
