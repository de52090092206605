// src/notify/telegram.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{summary_preview, DeliveryResult, DeliverySink};
use crate::error::DeliveryError;
use crate::ingest::types::Article;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Telegram Bot API `sendMessage` adapter.
#[derive(Clone)]
pub struct TelegramSink {
    token: String,
    chat_id: String,
    api_base: String,
    client: Client,
    timeout: Duration,
}

impl TelegramSink {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            chat_id: chat_id.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Point at another Bot API host (tests, self-hosted API servers).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }

    async fn send(&self, msg: &SendMessage<'_>) -> DeliveryResult {
        let fail = |reason: String| DeliveryError::new("telegram", reason);
        let rsp = self
            .client
            .post(self.endpoint())
            .timeout(self.timeout)
            .json(msg)
            .send()
            .await
            // the error text embeds the URL, which carries the token
            .map_err(|e| fail(e.without_url().to_string()))?;

        let status = rsp.status();
        if !status.is_success() {
            let body = rsp.text().await.unwrap_or_default();
            return Err(fail(format!("http {}: {}", status.as_u16(), body.trim())));
        }
        Ok(())
    }
}

/// HTML body for one article: bold title (numbered when `position` is given),
/// summary preview, keyword, source.
pub fn render_article_html(article: &Article, position: Option<usize>) -> String {
    let esc = |s: &str| html_escape::encode_text(s).to_string();
    let title = match position {
        Some(n) => format!("{n}. {}", esc(&article.title)),
        None => esc(&article.title),
    };
    format!(
        "<b>{}</b>\n\n{}\n\n🏷️ Keyword: <i>{}</i>\n📰 Source: <i>{}</i>",
        title,
        esc(&summary_preview(article)),
        esc(article.matched_keyword.as_deref().unwrap_or_default()),
        esc(&article.source_domain()),
    )
}

#[derive(Debug, Serialize)]
pub struct SendMessage<'a> {
    pub chat_id: &'a str,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<&'static str>,
    pub disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboard<'a>>,
}

#[derive(Debug, Serialize)]
pub struct InlineKeyboard<'a> {
    pub inline_keyboard: Vec<Vec<InlineButton<'a>>>,
}

#[derive(Debug, Serialize)]
pub struct InlineButton<'a> {
    pub text: &'static str,
    pub url: &'a str,
}

impl<'a> SendMessage<'a> {
    pub fn article(chat_id: &'a str, article: &'a Article, position: Option<usize>) -> Self {
        Self {
            chat_id,
            text: render_article_html(article, position),
            parse_mode: Some("HTML"),
            disable_web_page_preview: true,
            reply_markup: Some(InlineKeyboard {
                inline_keyboard: vec![vec![InlineButton {
                    text: "📖 Read More",
                    url: &article.link,
                }]],
            }),
        }
    }

    pub fn plain(chat_id: &'a str, text: &str) -> Self {
        Self {
            chat_id,
            text: text.to_string(),
            parse_mode: None,
            disable_web_page_preview: true,
            reply_markup: None,
        }
    }
}

#[async_trait]
impl DeliverySink for TelegramSink {
    async fn deliver(&self, article: &Article) -> DeliveryResult {
        self.send(&SendMessage::article(&self.chat_id, article, None)).await
    }

    async fn deliver_numbered(&self, position: usize, article: &Article) -> DeliveryResult {
        self.send(&SendMessage::article(&self.chat_id, article, Some(position)))
            .await
    }

    async fn announce(&self, text: &str) -> DeliveryResult {
        self.send(&SendMessage::plain(&self.chat_id, text)).await
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
