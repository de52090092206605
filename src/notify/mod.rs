// src/notify/mod.rs
//! Delivery sinks: where a finished run's articles go.
//!
//! The core only sees [`DeliverySink`]. Adapters live in submodules and
//! [`NotifierMux`] fans one delivery out to several of them.

pub mod discord;
pub mod log;
pub mod telegram;

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;

use crate::engine::RunResult;
use crate::error::DeliveryError;
use crate::ingest::types::Article;
use crate::relevance::KeywordSet;

pub use discord::DiscordSink;
pub use log::LogSink;
pub use telegram::TelegramSink;

pub type DeliveryResult = Result<(), DeliveryError>;

/// Summary longer than this is cut and suffixed with "...".
pub const SUMMARY_PREVIEW_CHARS: usize = 200;
pub const NO_SUMMARY: &str = "Click to read more...";
pub const NO_NEWS: &str = "No news found for your keywords today.";

#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Send one selected article.
    async fn deliver(&self, article: &Article) -> DeliveryResult;

    /// Send the article at 1-based `position` of a run. Sinks that number
    /// their messages override this.
    async fn deliver_numbered(&self, position: usize, article: &Article) -> DeliveryResult {
        let _ = position;
        self.deliver(article).await
    }

    /// Send a plain text notice (run header, startup, errors).
    async fn announce(&self, text: &str) -> DeliveryResult;

    fn name(&self) -> &'static str;
}

/// Fans out to every sink. A message counts as sent if at least one sink took it.
#[derive(Default, Clone)]
pub struct NotifierMux {
    sinks: Vec<Arc<dyn DeliverySink>>,
}

impl NotifierMux {
    pub fn new(sinks: Vec<Arc<dyn DeliverySink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn DeliverySink>) {
        self.sinks.push(sink);
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    fn combine(&self, results: Vec<DeliveryResult>) -> DeliveryResult {
        if self.sinks.is_empty() {
            return Err(DeliveryError::new("mux", "no sinks configured"));
        }
        let mut reasons = Vec::new();
        for r in results {
            match r {
                Ok(()) => return Ok(()),
                Err(e) => reasons.push(e.to_string()),
            }
        }
        Err(DeliveryError::new("mux", reasons.join("; ")))
    }
}

#[async_trait]
impl DeliverySink for NotifierMux {
    async fn deliver(&self, article: &Article) -> DeliveryResult {
        let mut results = Vec::with_capacity(self.sinks.len());
        for s in &self.sinks {
            let r = s.deliver(article).await;
            if let Err(e) = &r {
                tracing::warn!(sink = s.name(), error = %e, "sink rejected article");
            }
            results.push(r);
        }
        self.combine(results)
    }

    async fn deliver_numbered(&self, position: usize, article: &Article) -> DeliveryResult {
        let mut results = Vec::with_capacity(self.sinks.len());
        for s in &self.sinks {
            let r = s.deliver_numbered(position, article).await;
            if let Err(e) = &r {
                tracing::warn!(sink = s.name(), error = %e, "sink rejected article");
            }
            results.push(r);
        }
        self.combine(results)
    }

    async fn announce(&self, text: &str) -> DeliveryResult {
        let mut results = Vec::with_capacity(self.sinks.len());
        for s in &self.sinks {
            let r = s.announce(text).await;
            if let Err(e) = &r {
                tracing::warn!(sink = s.name(), error = %e, "sink rejected notice");
            }
            results.push(r);
        }
        self.combine(results)
    }

    fn name(&self) -> &'static str {
        "mux"
    }
}

/// Outcome of pushing one run through a sink.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failures: Vec<DeliveryError>,
}

impl DeliveryReport {
    fn note(&mut self, sink: &'static str, r: DeliveryResult, counts: bool) {
        match r {
            Ok(()) => {
                if counts {
                    self.delivered += 1;
                    counter!("news_deliveries_total", "sink" => sink).increment(1);
                }
            }
            Err(e) => {
                counter!("news_delivery_failures_total", "sink" => sink).increment(1);
                self.failures.push(e);
            }
        }
    }
}

/// Header (or "no news"), then each article in order, numbered from 1. No retries; failures are collected.
pub async fn deliver_run(
    sink: &dyn DeliverySink,
    result: &RunResult,
    keywords: &KeywordSet,
) -> DeliveryReport {
    let mut report = DeliveryReport::default();

    if result.articles.is_empty() {
        let r = sink.announce(NO_NEWS).await;
        report.note(sink.name(), r, false);
        return report;
    }

    let r = sink.announce(&run_header(result.articles.len(), keywords)).await;
    report.note(sink.name(), r, false);

    for (i, article) in result.articles.iter().enumerate() {
        let r = sink.deliver_numbered(i + 1, article).await;
        if let Err(e) = &r {
            tracing::warn!(sink = sink.name(), link = %article.link, error = %e, "delivery failed");
        }
        report.note(sink.name(), r, true);
    }

    tracing::info!(
        sink = sink.name(),
        delivered = report.delivered,
        failures = report.failures.len(),
        "run delivered"
    );
    report
}

pub fn run_header(count: usize, keywords: &KeywordSet) -> String {
    format!(
        "📰 Daily News Update - {count} articles found\nKeywords: {}",
        keywords.iter().collect::<Vec<_>>().join(", ")
    )
}

pub fn startup_notice(schedule: &str, keywords: &KeywordSet, feed_count: usize) -> String {
    format!(
        "🚀 News bot started!\nScheduled for {schedule} daily\nKeywords: {}\nRSS Feeds: {feed_count} sources",
        keywords.iter().collect::<Vec<_>>().join(", ")
    )
}

/// Notice sent when every feed of a run failed.
pub fn all_feeds_failed_notice(result: &RunResult) -> String {
    let mut out = format!("❌ News Bot Error\n\nAll {} feeds failed:", result.errors.len());
    for e in &result.errors {
        out.push_str(&format!("\n- {e}"));
    }
    out
}

/// Summary preview: first 200 chars plus "...", or a placeholder when there is none.
pub fn summary_preview(article: &Article) -> String {
    match article.summary.as_deref() {
        None | Some("") => NO_SUMMARY.to_string(),
        Some(s) if s.chars().count() > SUMMARY_PREVIEW_CHARS => {
            let cut: String = s.chars().take(SUMMARY_PREVIEW_CHARS).collect();
            format!("{cut}...")
        }
        Some(s) => s.to_string(),
    }
}
