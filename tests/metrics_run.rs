// tests/metrics_run.rs
#![cfg(feature = "strict-metrics")]
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use keyword_news_bot::api::{router, ApiState};
use keyword_news_bot::dedup::DedupCache;
use keyword_news_bot::engine::AggregationEngine;
use keyword_news_bot::error::{FetchError, FetchFailure};
use keyword_news_bot::ingest::providers::rss::parse_feed;
use keyword_news_bot::ingest::types::{Article, FeedFetcher, FeedSource, IdentityPolicy};
use keyword_news_bot::metrics::Metrics;
use keyword_news_bot::relevance::KeywordSet;
use keyword_news_bot::status::StatusHandle;
use tower::ServiceExt;

struct FixtureProvider;

#[async_trait]
impl FeedFetcher for FixtureProvider {
    async fn fetch(&self, feed: &FeedSource, _t: Duration) -> Result<Vec<Article>, FetchError> {
        if feed.url().contains("down") {
            return Err(FetchError::new(feed.url(), FetchFailure::Status(503)));
        }
        let xml = std::fs::read_to_string("tests/fixtures/coindesk_rss.xml").expect("fixture");
        parse_feed(feed, &xml, IdentityPolicy::Link).map_err(|c| FetchError::new(feed.url(), c))
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

#[tokio::test]
async fn metrics_exposed_after_run() {
    let metrics = Metrics::init(24).expect("recorder");

    let cache = Arc::new(DedupCache::with_hours(24));
    let engine = AggregationEngine::new(
        Arc::new(FixtureProvider),
        cache.clone(),
        vec![
            FeedSource::parse("https://coindesk.example/rss").unwrap(),
            FeedSource::parse("https://down.example/rss").unwrap(),
        ],
        KeywordSet::new(["bitcoin", "gold"]).unwrap(),
        3,
    );
    let result = engine.run_once(Utc::now()).await;
    assert_eq!(result.articles.len(), 2);

    let app = router(ApiState::new(StatusHandle::new(cache)).with_metrics(metrics));
    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in [
        "news_feed_errors_total",
        "news_articles_selected_total",
        "news_unmatched_total",
        "news_cache_entries",
        "news_cache_retention_hours",
    ] {
        assert!(text.contains(needle), "metrics exposition missing '{needle}'\n{text}");
    }
}
