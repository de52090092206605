// tests/engine_run.rs
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use keyword_news_bot::dedup::DedupCache;
use keyword_news_bot::engine::AggregationEngine;
use keyword_news_bot::error::{FetchError, FetchFailure};
use keyword_news_bot::ingest::types::{Article, ArticleId, FeedFetcher, FeedSource};
use keyword_news_bot::relevance::KeywordSet;

/// Per-feed canned outcome with an optional delay before answering.
struct MockProvider {
    feeds: HashMap<String, (Duration, Result<Vec<Article>, FetchFailure>)>,
}

impl MockProvider {
    fn new() -> Self {
        Self {
            feeds: HashMap::new(),
        }
    }

    fn ok(mut self, feed: &FeedSource, items: Vec<Article>) -> Self {
        self.feeds
            .insert(feed.url().to_string(), (Duration::ZERO, Ok(items)));
        self
    }

    fn delayed(mut self, feed: &FeedSource, delay: Duration, items: Vec<Article>) -> Self {
        self.feeds.insert(feed.url().to_string(), (delay, Ok(items)));
        self
    }

    fn failing(mut self, feed: &FeedSource, cause: FetchFailure) -> Self {
        self.feeds
            .insert(feed.url().to_string(), (Duration::ZERO, Err(cause)));
        self
    }
}

#[async_trait]
impl FeedFetcher for MockProvider {
    async fn fetch(&self, feed: &FeedSource, _timeout: Duration) -> Result<Vec<Article>, FetchError> {
        let (delay, outcome) = self
            .feeds
            .get(feed.url())
            .cloned()
            .unwrap_or((Duration::ZERO, Ok(Vec::new())));
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        outcome.map_err(|c| FetchError::new(feed.url(), c))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

fn feed(n: u8) -> FeedSource {
    FeedSource::parse(&format!("https://f{n}.example/rss")).unwrap()
}

fn article(id: &str, title: &str, from: &FeedSource) -> Article {
    Article {
        id: ArticleId::from(id),
        title: title.to_string(),
        link: format!("https://news.example/{id}"),
        summary: None,
        published_at: None,
        source_feed: from.url().to_string(),
        matched_keyword: None,
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 10, 8, 0, 0).unwrap()
}

#[tokio::test]
async fn timeout_and_duplicate_across_feeds() {
    let (f1, f2, f3) = (feed(1), feed(2), feed(3));
    let provider = MockProvider::new()
        .ok(
            &f1,
            vec![
                article("a1", "Bitcoin breaks out", &f1),
                article("a2", "Bitcoin miners rally", &f1),
            ],
        )
        .failing(&f2, FetchFailure::Timeout(Duration::from_secs(15)))
        .ok(&f3, vec![article("a1", "Bitcoin breaks out (syndicated)", &f3)]);

    let cache = Arc::new(DedupCache::with_hours(24));
    let engine = AggregationEngine::new(
        Arc::new(provider),
        cache.clone(),
        vec![f1, f2.clone(), f3],
        KeywordSet::new(["bitcoin", "gold"]).unwrap(),
        1,
    );

    let result = engine.run_once(now()).await;

    assert_eq!(result.articles.len(), 1);
    assert_eq!(result.articles[0].id.as_str(), "a1");
    assert_eq!(result.articles[0].matched_keyword.as_deref(), Some("bitcoin"));
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].feed, f2.url());
    assert!(result.errors[0].is_timeout());
    assert_eq!(result.stats.duplicates, 1, "F3 copy of a1 is dropped");
    assert_eq!(result.stats.capped, 1, "a2 is over the cap");

    // only the delivered article is remembered
    assert!(cache.is_duplicate(&ArticleId::from("a1"), now()));
    assert!(!cache.is_duplicate(&ArticleId::from("a2"), now()));
}

#[tokio::test]
async fn feed_order_survives_out_of_order_completion() {
    let (f1, f2) = (feed(1), feed(2));
    let provider = MockProvider::new()
        .delayed(
            &f1,
            Duration::from_millis(80),
            vec![article("slow", "gold from slow feed", &f1)],
        )
        .ok(&f2, vec![article("fast", "gold from fast feed", &f2)]);

    let engine = AggregationEngine::new(
        Arc::new(provider),
        Arc::new(DedupCache::with_hours(24)),
        vec![f1, f2],
        KeywordSet::new(["gold"]).unwrap(),
        5,
    );
    let ids: Vec<_> = engine
        .run_once(now())
        .await
        .articles
        .into_iter()
        .map(|a| a.id.as_str().to_string())
        .collect();
    assert_eq!(ids, vec!["slow", "fast"]);
}

#[tokio::test]
async fn all_feeds_failing_is_not_fatal() {
    let feeds = vec![feed(1), feed(2), feed(3)];
    let provider = feeds.iter().fold(MockProvider::new(), |p, f| {
        p.failing(f, FetchFailure::Status(503))
    });
    let engine = AggregationEngine::new(
        Arc::new(provider),
        Arc::new(DedupCache::with_hours(24)),
        feeds.clone(),
        KeywordSet::new(["bitcoin"]).unwrap(),
        3,
    );

    let result = engine.run_once(now()).await;
    assert!(result.articles.is_empty());
    assert_eq!(result.errors.len(), feeds.len());
}

#[tokio::test]
async fn earliest_keyword_claims_article_with_both() {
    let f = feed(1);
    let provider = MockProvider::new().ok(&f, vec![article("x", "Gold and Bitcoin both rise", &f)]);
    let engine = AggregationEngine::new(
        Arc::new(provider),
        Arc::new(DedupCache::with_hours(24)),
        vec![f],
        KeywordSet::new(["gold", "bitcoin"]).unwrap(),
        3,
    );
    let result = engine.run_once(now()).await;
    assert_eq!(result.articles.len(), 1);
    assert_eq!(result.articles[0].matched_keyword.as_deref(), Some("gold"));
}

#[tokio::test]
async fn retention_boundary_across_runs() {
    let f = feed(1);
    let provider = MockProvider::new().ok(&f, vec![article("x", "gold", &f)]);
    let engine = AggregationEngine::new(
        Arc::new(provider),
        Arc::new(DedupCache::with_hours(24)),
        vec![f],
        KeywordSet::new(["gold"]).unwrap(),
        3,
    );

    assert_eq!(engine.run_once(now()).await.articles.len(), 1);
    let just_before = now() + chrono::Duration::hours(24) - chrono::Duration::seconds(1);
    assert!(engine.run_once(just_before).await.is_empty());
    // the suppressed run did not refresh the entry
    let at_boundary = now() + chrono::Duration::hours(24);
    assert_eq!(engine.run_once(at_boundary).await.articles.len(), 1);
}
