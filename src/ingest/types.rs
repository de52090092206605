// src/ingest/types.rs
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, FetchError};

/// Stable key of an article across runs (hex SHA-256 prefix).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(String);

impl ArticleId {
    /// Derive the identity according to `policy`.
    ///
    /// `Guid` falls back to the link when the feed does not provide one.
    pub fn derive(policy: IdentityPolicy, link: &str, guid: Option<&str>, title: &str) -> Self {
        let key = match policy {
            IdentityPolicy::Link => normalize_link(link),
            IdentityPolicy::Guid => match guid.map(str::trim).filter(|g| !g.is_empty()) {
                Some(g) => format!("guid:{g}"),
                None => normalize_link(link),
            },
            IdentityPolicy::Title => format!("title:{}", normalize_title(title)),
        };
        Self(digest_hex(&key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArticleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

fn digest_hex(key: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(32);
    for b in digest.iter().take(16) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Scheme/host lowercased and fragment dropped; unparsable links are only trimmed.
pub fn normalize_link(link: &str) -> String {
    let trimmed = link.trim();
    match Url::parse(trimmed) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => trimmed.to_string(),
    }
}

fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Which article field identifies it for deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityPolicy {
    #[default]
    Link,
    Guid,
    Title,
}

impl FromStr for IdentityPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "link" | "url" => Ok(Self::Link),
            "guid" | "id" => Ok(Self::Guid),
            "title" => Ok(Self::Title),
            _ => Err(ConfigError::InvalidValue {
                key: "NEWS_IDENTITY",
                value: s.to_string(),
                expected: "one of link, guid, title",
            }),
        }
    }
}

/// A configured feed URL. Validated on construction, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FeedSource {
    url: String,
}

impl FeedSource {
    /// Trim, default the scheme to `https://`, and require an http(s) URL with a host.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("https://{trimmed}")
        };

        let invalid = |reason: String| ConfigError::InvalidFeedUrl {
            url: raw.to_string(),
            reason,
        };
        let url = Url::parse(&candidate).map_err(|e| invalid(e.to_string()))?;
        if url.host_str().map_or(true, str::is_empty) {
            return Err(invalid("missing host".into()));
        }

        Ok(Self {
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn domain(&self) -> String {
        domain_of(&self.url)
    }
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Host without a leading `www.`, or "unknown".
pub fn domain_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// One feed entry. `matched_keyword` stays `None` until the matcher tags it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Article {
    pub id: ArticleId,
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub source_feed: String,
    pub matched_keyword: Option<String>,
}

impl Article {
    /// Copy of this article tagged with `keyword`.
    pub fn tagged(self, keyword: &str) -> Self {
        Self {
            matched_keyword: Some(keyword.to_string()),
            ..self
        }
    }

    /// Domain of the article link (falls back to the feed's domain).
    pub fn source_domain(&self) -> String {
        match domain_of(&self.link).as_str() {
            "unknown" => domain_of(&self.source_feed),
            d => d.to_string(),
        }
    }
}

#[async_trait::async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch and parse one feed. No retries; the whole call is bounded by `timeout`.
    async fn fetch(&self, feed: &FeedSource, timeout: Duration) -> Result<Vec<Article>, FetchError>;

    fn name(&self) -> &'static str;
}
