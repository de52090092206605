// src/notify/discord.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{summary_preview, DeliveryResult, DeliverySink};
use crate::error::DeliveryError;
use crate::ingest::types::Article;

/// Discord webhook adapter: one embed per article, plain content for notices.
#[derive(Clone)]
pub struct DiscordSink {
    webhook: String,
    client: Client,
    timeout: Duration,
}

impl DiscordSink {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    async fn post(&self, payload: &DiscordWebhookPayload) -> DeliveryResult {
        let rsp = self
            .client
            .post(&self.webhook)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| DeliveryError::new("discord", e.without_url().to_string()))?;

        if let Err(e) = rsp.error_for_status_ref() {
            return Err(DeliveryError::new("discord", e.without_url().to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DeliverySink for DiscordSink {
    async fn deliver(&self, article: &Article) -> DeliveryResult {
        self.post(&DiscordWebhookPayload::article(article)).await
    }

    async fn announce(&self, text: &str) -> DeliveryResult {
        self.post(&DiscordWebhookPayload::text(text)).await
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

#[derive(Debug, Serialize)]
struct DiscordEmbed {
    title: String,
    url: String,
    description: String,
    footer: DiscordFooter,
}

#[derive(Debug, Serialize)]
struct DiscordFooter {
    text: String,
}

#[derive(Debug, Serialize)]
struct DiscordWebhookPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

impl DiscordWebhookPayload {
    fn article(a: &Article) -> Self {
        Self {
            content: None,
            embeds: vec![DiscordEmbed {
                // Discord caps embed titles at 256 chars
                title: a.title.chars().take(256).collect(),
                url: a.link.clone(),
                description: summary_preview(a),
                footer: DiscordFooter {
                    text: format!(
                        "{} · {}",
                        a.matched_keyword.as_deref().unwrap_or("-"),
                        a.source_domain()
                    ),
                },
            }],
        }
    }

    fn text(s: &str) -> Self {
        Self {
            content: Some(s.to_string()),
            embeds: Vec::new(),
        }
    }
}
