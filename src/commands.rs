//! Command-line operations and the context they run in.
//!
//! Commands that act as a user go through [`UserCommand`]; the current user is
//! resolved once by [`run`] before any of them executes.
use anyhow::{bail, Context, Result};
use clap::Subcommand;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

use crate::config::Config;
use crate::feed::FeedFetcher;
use crate::ingest::{Ingestor, RunSummary, Scheduler};
use crate::storage::{Database, User};
use crate::subscriptions::SubscriptionManager;
use crate::util::parse_duration;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a user and log in as them
    Register { name: String },

    /// Switch the current user
    Login { name: String },

    /// Delete every user along with their feeds, follows and posts
    Reset,

    /// List users, marking the current one
    Users,

    /// Collect posts continuously, one feed per interval
    Agg {
        /// Time between requests, e.g. 30s, 1m, 1h30m
        time_between_reqs: String,
    },

    /// List every feed and who added it
    Feeds,

    #[command(flatten)]
    AsUser(UserCommand),
}

/// Commands that need a logged-in user.
#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// Register a feed and follow it
    ///
    /// Fails if the URL is already registered or is not an absolute http(s)
    /// URL. Private and loopback hosts are refused when the config sets
    /// `fetch.allow_private_hosts = false`.
    Addfeed { name: String, url: String },

    /// Follow an existing feed
    Follow { url: String },

    /// List the feeds you follow
    Following,

    /// Stop following a feed
    Unfollow { url: String },

    /// Show the newest posts from the feeds you follow
    Browse {
        #[arg(default_value_t = 2, value_parser = clap::value_parser!(i64).range(1..))]
        limit: i64,
    },
}

/// Everything a command may touch.
pub struct State {
    pub db: Database,
    pub config: Config,
    /// Where `config` is saved when the current user changes
    pub config_path: PathBuf,
    /// Print list output as JSON
    pub json: bool,
}

impl State {
    pub fn new(db: Database, config: Config, config_path: PathBuf) -> Self {
        Self {
            db,
            config,
            config_path,
            json: false,
        }
    }

    /// Look up the logged-in user.
    pub async fn current_user(&self) -> Result<User> {
        let Some(name) = self.config.current_user_name.as_deref() else {
            bail!("not logged in: run `gator login <name>` or `gator register <name>` first");
        };
        self.db
            .get_user_by_name(name)
            .await?
            .with_context(|| format!("current user '{}' does not exist", name))
    }

    fn subscriptions(&self) -> SubscriptionManager {
        SubscriptionManager::new(self.db.clone()).with_host_policy(self.config.fetch.host_policy())
    }

    fn set_current_user(&mut self, name: Option<String>) -> Result<()> {
        self.config.current_user_name = name;
        self.config
            .save(&self.config_path)
            .with_context(|| format!("Failed to save {}", self.config_path.display()))
    }
}

/// Execute `command`, writing its output to `out`.
pub async fn run<W: Write>(state: &mut State, command: Command, out: &mut W) -> Result<()> {
    match command {
        Command::Register { name } => register(state, &name, out).await,
        Command::Login { name } => login(state, &name, out).await,
        Command::Reset => reset(state, out).await,
        Command::Users => users(state, out).await,
        Command::Agg { time_between_reqs } => agg(state, &time_between_reqs, out).await,
        Command::Feeds => feeds(state, out).await,
        Command::AsUser(command) => {
            let user = state.current_user().await?;
            run_as(state, &user, command, out).await
        }
    }
}

async fn run_as<W: Write>(
    state: &State,
    user: &User,
    command: UserCommand,
    out: &mut W,
) -> Result<()> {
    let subs = state.subscriptions();
    match command {
        UserCommand::Addfeed { name, url } => {
            let created = subs.create_feed(&name, &url, user).await?;
            if state.json {
                return print_json(out, &created);
            }
            writeln!(out, "Added feed '{}' ({})", created.feed.name, created.feed.url)?;
            writeln!(out, "{} now follows it", user.name)?;
        }
        UserCommand::Follow { url } => {
            let follow = subs.follow_feed(user, &url).await?;
            if state.json {
                return print_json(out, &follow);
            }
            writeln!(out, "{} now follows '{}'", follow.user_name, follow.feed_name)?;
        }
        UserCommand::Following => {
            let follows = subs.list_follows_for_user(user.id).await?;
            if state.json {
                return print_json(out, &follows);
            }
            if follows.is_empty() {
                writeln!(out, "{} is not following any feeds", user.name)?;
            }
            for follow in &follows {
                writeln!(out, "* {}", follow.feed_name)?;
            }
        }
        UserCommand::Unfollow { url } => {
            if subs.unfollow_feed(user, &url).await? {
                writeln!(out, "{} unfollowed {}", user.name, url.trim())?;
            } else {
                writeln!(out, "{} was not following {}", user.name, url.trim())?;
            }
        }
        UserCommand::Browse { limit } => {
            let posts = subs.recent_posts(user, limit).await?;
            if state.json {
                return print_json(out, &posts);
            }
            if posts.is_empty() {
                writeln!(out, "No posts yet")?;
            }
            for entry in &posts {
                let post = &entry.post;
                writeln!(
                    out,
                    "{} | {}",
                    post.published_at.format("%Y-%m-%d %H:%M"),
                    entry.feed_name
                )?;
                writeln!(out, "--- {} ---", post.title)?;
                if let Some(description) = &post.description {
                    writeln!(out, "    {}", description)?;
                }
                writeln!(out, "Link: {}", post.url)?;
                writeln!(out, "=====================================")?;
            }
        }
    }
    Ok(())
}

// ============================================================================
// User Management
// ============================================================================

async fn register<W: Write>(state: &mut State, name: &str, out: &mut W) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        bail!("user name must not be empty");
    }
    let user = state.db.insert_user(name).await?;
    state.set_current_user(Some(user.name.clone()))?;

    tracing::info!(user = %user.name, id = user.id, "Registered user");
    writeln!(out, "User '{}' created and logged in", user.name)?;
    Ok(())
}

async fn login<W: Write>(state: &mut State, name: &str, out: &mut W) -> Result<()> {
    let name = name.trim();
    let Some(user) = state.db.get_user_by_name(name).await? else {
        bail!("user '{}' not found", name);
    };
    state.set_current_user(Some(user.name.clone()))?;

    writeln!(out, "Logged in as '{}'", user.name)?;
    Ok(())
}

async fn reset<W: Write>(state: &mut State, out: &mut W) -> Result<()> {
    let deleted = state.db.delete_all_users().await?;
    if state.config.current_user_name.is_some() {
        state.set_current_user(None)?;
    }

    tracing::info!(deleted, "Reset database");
    writeln!(out, "Deleted {} user(s)", deleted)?;
    Ok(())
}

#[derive(Serialize)]
struct UserListing<'a> {
    #[serde(flatten)]
    user: &'a User,
    current: bool,
}

async fn users<W: Write>(state: &State, out: &mut W) -> Result<()> {
    let users = state.db.list_users().await?;
    let current = state.config.current_user_name.as_deref();

    if state.json {
        let listing: Vec<_> = users
            .iter()
            .map(|user| UserListing {
                user,
                current: current == Some(user.name.as_str()),
            })
            .collect();
        return print_json(out, &listing);
    }

    for user in &users {
        if current == Some(user.name.as_str()) {
            writeln!(out, "* {} (current)", user.name)?;
        } else {
            writeln!(out, "* {}", user.name)?;
        }
    }
    Ok(())
}

// ============================================================================
// Feeds
// ============================================================================

async fn feeds<W: Write>(state: &State, out: &mut W) -> Result<()> {
    let feeds = state.subscriptions().list_feeds().await?;
    if state.json {
        return print_json(out, &feeds);
    }
    if feeds.is_empty() {
        writeln!(out, "No feeds registered")?;
    }
    for entry in &feeds {
        writeln!(out, "* {}", entry.feed.name)?;
        writeln!(out, "  URL:      {}", entry.feed.url)?;
        writeln!(out, "  Added by: {}", entry.owner_name)?;
        match entry.feed.last_fetched_at {
            Some(at) => writeln!(out, "  Fetched:  {}", at.format("%Y-%m-%d %H:%M:%S UTC"))?,
            None => writeln!(out, "  Fetched:  never")?,
        }
    }
    Ok(())
}

async fn agg<W: Write>(state: &State, interval: &str, out: &mut W) -> Result<()> {
    let period = parse_duration(interval)
        .with_context(|| format!("invalid time between requests '{}'", interval))?;

    let fetch = &state.config.fetch;
    let fetcher = FeedFetcher::new(fetch.timeout(), fetch.max_feed_bytes)
        .context("Failed to build HTTP client")?;
    let ingestor = Ingestor::new(state.db.clone(), fetcher)
        .with_invalid_date_policy(state.config.ingest.invalid_date);
    let scheduler = Scheduler::new(ingestor, period)?;

    writeln!(out, "Collecting feeds every {}", interval.trim())?;
    out.flush()?;

    let handle = scheduler.spawn();
    let signal = wait_for_shutdown_signal().await;
    let summary = handle.stop().await;
    signal?;

    print_summary(out, &summary)?;
    Ok(())
}

fn print_summary<W: Write>(out: &mut W, summary: &RunSummary) -> Result<()> {
    writeln!(
        out,
        "Stopped after {} cycle(s): {} new post(s), {} failed",
        summary.cycles, summary.new_posts, summary.failed_cycles
    )?;
    Ok(())
}

/// Wait for SIGINT or SIGTERM (Ctrl+C elsewhere).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).context("Failed to watch SIGTERM")?;
        let mut sigint = signal(SignalKind::interrupt()).context("Failed to watch SIGINT")?;
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down"),
            _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to watch Ctrl+C")?;
        tracing::info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

fn print_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
