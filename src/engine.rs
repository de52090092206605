//! # Aggregation Engine
//! One pass of fetch → match → dedup → cap-per-keyword over every configured feed.
//!
//! Feeds are fetched concurrently and all awaited before matching. Per-feed
//! failures land in [`RunResult::errors`] and never abort the run. Selected
//! identities are recorded in the [`DedupCache`] only after all filtering, so a
//! run never suppresses its own picks.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};

use crate::dedup::DedupCache;
use crate::error::{ConfigError, FetchError};
use crate::ingest::types::{Article, FeedFetcher, FeedSource};
use crate::relevance::{match_index, KeywordSet};

/// Ordering inside one keyword group before the cap is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderPolicy {
    /// Feed order, then entry order within the feed.
    #[default]
    Arrival,
    /// Published-at descending; undated entries last, ties keep arrival order.
    Newest,
}

impl FromStr for OrderPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arrival" | "feed" => Ok(Self::Arrival),
            "newest" | "recent" => Ok(Self::Newest),
            _ => Err(ConfigError::InvalidValue {
                key: "NEWS_ORDER",
                value: s.to_string(),
                expected: "one of arrival, newest",
            }),
        }
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub fetched: usize,
    pub unmatched: usize,
    pub duplicates: usize,
    pub capped: usize,
}

/// Output of [`AggregationEngine::run_once`].
#[derive(Debug, Default)]
pub struct RunResult {
    /// Keyword order, then group order.
    pub articles: Vec<Article>,
    pub errors: Vec<FetchError>,
    pub stats: RunStats,
}

impl RunResult {
    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}

pub struct AggregationEngine {
    fetcher: Arc<dyn FeedFetcher>,
    cache: Arc<DedupCache>,
    feeds: Vec<FeedSource>,
    keywords: KeywordSet,
    max_per_keyword: usize,
    fetch_timeout: Duration,
    order: OrderPolicy,
}

impl AggregationEngine {
    pub fn new(
        fetcher: Arc<dyn FeedFetcher>,
        cache: Arc<DedupCache>,
        feeds: Vec<FeedSource>,
        keywords: KeywordSet,
        max_per_keyword: usize,
    ) -> Self {
        Self {
            fetcher,
            cache,
            feeds,
            keywords,
            max_per_keyword,
            fetch_timeout: Duration::from_secs(15),
            order: OrderPolicy::Arrival,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_order(mut self, order: OrderPolicy) -> Self {
        self.order = order;
        self
    }

    pub fn cache(&self) -> &Arc<DedupCache> {
        &self.cache
    }

    pub fn feeds(&self) -> &[FeedSource] {
        &self.feeds
    }

    pub fn keywords(&self) -> &KeywordSet {
        &self.keywords
    }

    /// Run one aggregation pass as of `now`.
    pub async fn run_once(&self, now: DateTime<Utc>) -> RunResult {
        let evicted = self.cache.evict_expired(now);
        if evicted > 0 {
            tracing::debug!(evicted, "dedup entries expired");
        }

        // 1) Fetch everything concurrently, keep feed order
        let outcomes = join_all(
            self.feeds
                .iter()
                .map(|feed| self.fetcher.fetch(feed, self.fetch_timeout)),
        )
        .await;

        let mut stats = RunStats::default();
        let mut errors = Vec::new();
        let mut fetched = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(articles) => fetched.extend(articles),
                Err(e) => {
                    tracing::warn!(
                        feed = %e.feed,
                        fetcher = self.fetcher.name(),
                        error = %e.cause,
                        "feed fetch failed"
                    );
                    counter!("news_feed_errors_total").increment(1);
                    errors.push(e);
                }
            }
        }
        stats.fetched = fetched.len();

        // 2) Match, 3) dedup against cache and earlier entries of this run
        let mut groups: Vec<Vec<Article>> = vec![Vec::new(); self.keywords.len()];
        let mut seen = HashSet::new();
        for article in fetched {
            let Some(idx) = match_index(&article, &self.keywords) else {
                stats.unmatched += 1;
                continue;
            };
            if self.cache.is_duplicate(&article.id, now) || !seen.insert(article.id.clone()) {
                stats.duplicates += 1;
                continue;
            }
            groups[idx].push(article);
        }

        // 4) Order and cap each keyword group
        let mut articles = Vec::new();
        for (group, keyword) in groups.into_iter().zip(self.keywords.iter()) {
            let mut group = group;
            if self.order == OrderPolicy::Newest {
                // stable; None sorts before Some, so reverse puts undated last
                group.sort_by(|a, b| b.published_at.cmp(&a.published_at));
            }
            if group.len() > self.max_per_keyword {
                stats.capped += group.len() - self.max_per_keyword;
                group.truncate(self.max_per_keyword);
            }
            articles.extend(group.into_iter().map(|a| a.tagged(keyword)));
        }

        // 5) Record strictly after filtering
        self.cache
            .record_all(articles.iter().map(|a| a.id.clone()), now);

        counter!("news_articles_selected_total").increment(articles.len() as u64);
        counter!("news_duplicates_total").increment(stats.duplicates as u64);
        counter!("news_unmatched_total").increment(stats.unmatched as u64);
        gauge!("news_cache_entries").set(self.cache.len() as f64);
        gauge!("news_last_run_ts").set(now.timestamp() as f64);

        tracing::info!(
            feeds = self.feeds.len(),
            fetched = stats.fetched,
            kept = articles.len(),
            duplicates = stats.duplicates,
            capped = stats.capped,
            errors = errors.len(),
            "aggregation run finished"
        );

        RunResult {
            articles,
            errors,
            stats,
        }
    }
}
