//! Error taxonomy for the news pipeline.
//!
//! - [`FetchError`]: one feed failed; recorded in the run result and skipped.
//! - [`ConfigError`]: startup configuration is unusable; the bot must not start.
//! - [`DeliveryError`]: a sink rejected one message; logged, never rolled back.

use std::time::Duration;
use thiserror::Error;

/// Why a single feed could not be turned into articles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("invalid feed url: {0}")]
    InvalidUrl(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("http status {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Request(String),

    #[error("malformed feed: {0}")]
    Parse(String),
}

/// Feed-scoped failure carrying the feed URL and the cause.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("feed {feed}: {cause}")]
pub struct FetchError {
    pub feed: String,
    #[source]
    pub cause: FetchFailure,
}

impl FetchError {
    pub fn new(feed: impl Into<String>, cause: FetchFailure) -> Self {
        Self {
            feed: feed.into(),
            cause,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.cause, FetchFailure::Timeout(_))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no keywords configured (KEYWORDS is empty)")]
    EmptyKeywords,

    #[error("no feeds configured (RSS_FEEDS is empty)")]
    EmptyFeeds,

    #[error("invalid feed url {url:?}: {reason}")]
    InvalidFeedUrl { url: String, reason: String },

    #[error("invalid schedule time {0:?}, expected HH:MM (24-hour)")]
    InvalidScheduleTime(String),

    #[error("invalid value for {key}: {value:?} ({expected})")]
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("reading config file {path}: {reason}")]
    File { path: String, reason: String },
}

/// A sink-reported failure for one message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{sink} delivery failed: {reason}")]
pub struct DeliveryError {
    pub sink: &'static str,
    pub reason: String,
}

impl DeliveryError {
    pub fn new(sink: &'static str, reason: impl Into<String>) -> Self {
        Self {
            sink,
            reason: reason.into(),
        }
    }
}
