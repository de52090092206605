// tests/fetch_http.rs
//
// HttpFeedFetcher against a throwaway local axum server.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{http::StatusCode, routing::get, Router};
use keyword_news_bot::error::FetchFailure;
use keyword_news_bot::ingest::providers::rss::HttpFeedFetcher;
use keyword_news_bot::ingest::types::{FeedFetcher, FeedSource, IdentityPolicy};

const COINDESK_XML: &str = include_str!("fixtures/coindesk_rss.xml");

async fn spawn_feed_server() -> SocketAddr {
    let app = Router::new()
        .route("/rss", get(|| async { COINDESK_XML }))
        .route(
            "/boom",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "nope") }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                COINDESK_XML
            }),
        )
        .route("/html", get(|| async { "<html><body>not a feed</body></html>" }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });
    addr
}

fn feed(addr: SocketAddr, path: &str) -> FeedSource {
    FeedSource::parse(&format!("http://{addr}{path}")).expect("valid url")
}

#[tokio::test]
async fn fetches_and_parses_feed() {
    let addr = spawn_feed_server().await;
    let fetcher = HttpFeedFetcher::new(IdentityPolicy::Link);
    let items = fetcher
        .fetch(&feed(addr, "/rss"), Duration::from_secs(5))
        .await
        .expect("fetch ok");
    assert_eq!(items.len(), 3);
}

#[tokio::test]
async fn http_error_status_is_reported_with_feed() {
    let addr = spawn_feed_server().await;
    let fetcher = HttpFeedFetcher::new(IdentityPolicy::Link);
    let f = feed(addr, "/boom");
    let err = fetcher
        .fetch(&f, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert_eq!(err.feed, f.url());
    assert_eq!(err.cause, FetchFailure::Status(500));
}

#[tokio::test]
async fn slow_feed_times_out() {
    let addr = spawn_feed_server().await;
    let fetcher = HttpFeedFetcher::new(IdentityPolicy::Link);
    let started = std::time::Instant::now();
    let err = fetcher
        .fetch(&feed(addr, "/slow"), Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn non_feed_body_is_a_parse_error() {
    let addr = spawn_feed_server().await;
    let fetcher = HttpFeedFetcher::new(IdentityPolicy::Link);
    let err = fetcher
        .fetch(&feed(addr, "/html"), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err.cause, FetchFailure::Parse(_)), "got {err:?}");
}

#[tokio::test]
async fn refused_connection_is_a_request_error() {
    // bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let fetcher = HttpFeedFetcher::new(IdentityPolicy::Link);
    let err = fetcher
        .fetch(&feed(addr, "/rss"), Duration::from_secs(2))
        .await
        .unwrap_err();
    assert!(matches!(err.cause, FetchFailure::Request(_)), "got {err:?}");
}
