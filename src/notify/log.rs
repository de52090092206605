// src/notify/log.rs
use async_trait::async_trait;

use super::{DeliveryResult, DeliverySink};
use crate::ingest::types::Article;

/// Writes deliveries to the tracing log. Fallback when no chat sink is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl DeliverySink for LogSink {
    async fn deliver(&self, article: &Article) -> DeliveryResult {
        tracing::info!(
            keyword = article.matched_keyword.as_deref().unwrap_or_default(),
            source = %article.source_domain(),
            link = %article.link,
            title = %article.title,
            "news item"
        );
        Ok(())
    }

    async fn announce(&self, text: &str) -> DeliveryResult {
        tracing::info!(notice = %text, "news notice");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
