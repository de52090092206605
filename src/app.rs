// src/app.rs
//! Wiring shared by the daemon and the one-shot binary.

use std::sync::Arc;

use crate::config::NewsConfig;
use crate::dedup::DedupCache;
use crate::engine::AggregationEngine;
use crate::ingest::providers::rss::HttpFeedFetcher;
use crate::ingest::types::FeedFetcher;
use crate::notify::{DeliverySink, DiscordSink, LogSink, NotifierMux, TelegramSink};
use crate::scheduler::{Clock, Scheduler};
use crate::status::StatusHandle;

pub struct App {
    pub config: NewsConfig,
    pub cache: Arc<DedupCache>,
    pub engine: Arc<AggregationEngine>,
    pub status: StatusHandle,
}

impl App {
    /// Production wiring: HTTP fetcher, snapshot loaded when configured.
    pub async fn from_config(config: NewsConfig) -> Self {
        let fetcher = Arc::new(HttpFeedFetcher::new(config.identity));
        Self::with_fetcher(config, fetcher).await
    }

    pub async fn with_fetcher(config: NewsConfig, fetcher: Arc<dyn FeedFetcher>) -> Self {
        let retention = config.cache_retention();
        let cache = Arc::new(match &config.cache_path {
            Some(path) => DedupCache::load(path, retention).await,
            None => DedupCache::new(retention),
        });

        let engine = Arc::new(
            AggregationEngine::new(
                fetcher,
                cache.clone(),
                config.feeds.clone(),
                config.keywords.clone(),
                config.max_per_keyword,
            )
            .with_timeout(config.fetch_timeout)
            .with_order(config.order),
        );

        let status = StatusHandle::new(cache.clone());
        Self {
            config,
            cache,
            engine,
            status,
        }
    }

    /// Every configured chat sink; the log sink when there are none.
    pub fn sinks(&self) -> NotifierMux {
        let mut mux = NotifierMux::default();
        if let Some(tg) = &self.config.telegram {
            mux.push(Arc::new(TelegramSink::new(&tg.token, &tg.chat_id)));
        }
        if let Some(url) = &self.config.discord_webhook {
            mux.push(Arc::new(DiscordSink::new(url.clone())));
        }
        if mux.is_empty() {
            tracing::warn!("no TELEGRAM_* or DISCORD_WEBHOOK_URL set, delivering to the log");
            mux.push(Arc::new(LogSink));
        }
        mux
    }

    pub fn scheduler(&self, sink: Arc<dyn DeliverySink>, clock: Arc<dyn Clock>) -> Scheduler {
        Scheduler::new(
            self.engine.clone(),
            sink,
            self.config.schedule,
            clock,
            self.status.clone(),
        )
        .with_snapshot_path(self.config.cache_path.clone())
    }
}
