// src/config/news.rs
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dedup::retention_from_hours;
use crate::engine::OrderPolicy;
use crate::error::ConfigError;
use crate::ingest::types::{FeedSource, IdentityPolicy};
use crate::relevance::KeywordSet;
use crate::scheduler::DailySchedule;

pub const ENV_CONFIG_PATH: &str = "NEWS_CONFIG_PATH";

pub const DEFAULT_SCHEDULE_TIME: &str = "08:00";
pub const DEFAULT_MAX_PER_KEYWORD: usize = 3;
pub const DEFAULT_CACHE_HOURS: u64 = 24;
pub const DEFAULT_FEED_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
}

/// Fully validated runtime configuration.
#[derive(Debug, Clone)]
pub struct NewsConfig {
    pub keywords: KeywordSet,
    pub feeds: Vec<FeedSource>,
    pub schedule: DailySchedule,
    pub max_per_keyword: usize,
    pub cache_hours: u64,
    pub fetch_timeout: Duration,
    pub identity: IdentityPolicy,
    pub order: OrderPolicy,
    pub cache_path: Option<PathBuf>,
    pub status_bind: Option<SocketAddr>,
    pub telegram: Option<TelegramConfig>,
    pub discord_webhook: Option<String>,
}

impl NewsConfig {
    /// Dedup retention window. Validated at load, so always in range.
    pub fn cache_retention(&self) -> chrono::Duration {
        retention_from_hours(self.cache_hours).unwrap_or(chrono::Duration::max_value())
    }

    /// Environment first, then the optional TOML file named by `NEWS_CONFIG_PATH`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let file = match non_empty(std::env::var(ENV_CONFIG_PATH).ok()) {
            Some(p) => load_file_layer(Path::new(&p))?,
            None => HashMap::new(),
        };
        Self::from_vars(|key| non_empty(std::env::var(key).ok()).or_else(|| file.get(key).cloned()))
    }

    /// Build from any `KEY -> value` lookup. Blank values count as unset.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_empty(lookup(key));

        let keywords = KeywordSet::parse_csv(&get("KEYWORDS").unwrap_or_default())?;
        let feeds = parse_feeds(&get("RSS_FEEDS").unwrap_or_default())?;
        let schedule = DailySchedule::parse(
            get("SCHEDULE_TIME").as_deref().unwrap_or(DEFAULT_SCHEDULE_TIME),
        )?;

        let max_per_keyword = positive(get("MAX_NEWS_PER_KEYWORD"), "MAX_NEWS_PER_KEYWORD")?
            .map_or(DEFAULT_MAX_PER_KEYWORD, |v| v as usize);
        let cache_hours =
            positive(get("NEWS_CACHE_HOURS"), "NEWS_CACHE_HOURS")?.unwrap_or(DEFAULT_CACHE_HOURS);
        if retention_from_hours(cache_hours).is_none() {
            return Err(ConfigError::InvalidValue {
                key: "NEWS_CACHE_HOURS",
                value: cache_hours.to_string(),
                expected: "hours within the representable range",
            });
        }
        let fetch_timeout = Duration::from_secs(
            positive(get("FEED_TIMEOUT_SECS"), "FEED_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_FEED_TIMEOUT_SECS),
        );

        let identity = match get("NEWS_IDENTITY") {
            Some(v) => v.parse()?,
            None => IdentityPolicy::default(),
        };
        let order = match get("NEWS_ORDER") {
            Some(v) => v.parse()?,
            None => OrderPolicy::default(),
        };

        let status_bind = match get("STATUS_BIND") {
            Some(v) => Some(v.parse::<SocketAddr>().map_err(|_| ConfigError::InvalidValue {
                key: "STATUS_BIND",
                value: v.clone(),
                expected: "host:port socket address",
            })?),
            None => None,
        };

        let telegram = match (get("TELEGRAM_BOT_TOKEN"), get("TELEGRAM_CHAT_ID")) {
            (Some(token), Some(chat_id)) => Some(TelegramConfig { token, chat_id }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::InvalidValue {
                    key: "TELEGRAM_CHAT_ID",
                    value: String::new(),
                    expected: "set together with TELEGRAM_BOT_TOKEN",
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::InvalidValue {
                    key: "TELEGRAM_BOT_TOKEN",
                    value: String::new(),
                    expected: "set together with TELEGRAM_CHAT_ID",
                })
            }
        };

        Ok(Self {
            keywords,
            feeds,
            schedule,
            max_per_keyword,
            cache_hours,
            fetch_timeout,
            identity,
            order,
            cache_path: get("NEWS_CACHE_PATH").map(PathBuf::from),
            status_bind,
            telegram,
            discord_webhook: get("DISCORD_WEBHOOK_URL"),
        })
    }

    pub fn has_chat_sink(&self) -> bool {
        self.telegram.is_some() || self.discord_webhook.is_some()
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn positive(raw: Option<String>, key: &'static str) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.parse::<u64>() {
        Ok(v) if v > 0 => Ok(Some(v)),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw,
            expected: "positive integer",
        }),
    }
}

/// Comma-separated feed URLs; blanks dropped, repeats collapsed.
pub fn parse_feeds(raw: &str) -> Result<Vec<FeedSource>, ConfigError> {
    let mut feeds: Vec<FeedSource> = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let feed = FeedSource::parse(part)?;
        if !feeds.contains(&feed) {
            feeds.push(feed);
        }
    }
    if feeds.is_empty() {
        return Err(ConfigError::EmptyFeeds);
    }
    Ok(feeds)
}

/// Read a TOML file of lowercase keys into `ENV_NAME -> value`.
///
/// Arrays are joined with commas so they read like the env form.
pub fn load_file_layer(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let file_err = |reason: String| ConfigError::File {
        path: path.display().to_string(),
        reason,
    };
    let content = std::fs::read_to_string(path).map_err(|e| file_err(e.to_string()))?;
    parse_file_layer(&content).map_err(file_err)
}

fn parse_file_layer(content: &str) -> Result<HashMap<String, String>, String> {
    let table: toml::Table = toml::from_str(content).map_err(|e| e.to_string())?;
    let mut out = HashMap::new();
    for (key, value) in table {
        let flat = match value {
            toml::Value::String(s) => s,
            toml::Value::Integer(i) => i.to_string(),
            toml::Value::Boolean(b) => b.to_string(),
            toml::Value::Array(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for it in items {
                    match it {
                        toml::Value::String(s) => parts.push(s),
                        other => return Err(format!("{key}: expected strings, got {other}")),
                    }
                }
                parts.join(",")
            }
            other => return Err(format!("{key}: unsupported value {other}")),
        };
        out.insert(key.to_ascii_uppercase(), flat);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply() {
        let cfg = NewsConfig::from_vars(vars(&[
            ("KEYWORDS", "bitcoin, gold"),
            ("RSS_FEEDS", "coindesk.com/rss, https://example.com/feed"),
        ]))
        .unwrap();
        assert_eq!(cfg.schedule.to_string(), "08:00");
        assert_eq!(cfg.max_per_keyword, 3);
        assert_eq!(cfg.cache_hours, 24);
        assert_eq!(cfg.fetch_timeout, Duration::from_secs(15));
        assert_eq!(cfg.feeds[0].url(), "https://coindesk.com/rss");
        assert!(cfg.telegram.is_none());
        assert!(!cfg.has_chat_sink());
    }

    #[test]
    fn missing_lists_and_bad_numbers_fail() {
        assert!(matches!(
            NewsConfig::from_vars(vars(&[("RSS_FEEDS", "a.com")])),
            Err(ConfigError::EmptyKeywords)
        ));
        assert!(matches!(
            NewsConfig::from_vars(vars(&[("KEYWORDS", "x"), ("RSS_FEEDS", " , ")])),
            Err(ConfigError::EmptyFeeds)
        ));
        assert!(matches!(
            NewsConfig::from_vars(vars(&[
                ("KEYWORDS", "x"),
                ("RSS_FEEDS", "a.com"),
                ("MAX_NEWS_PER_KEYWORD", "0"),
            ])),
            Err(ConfigError::InvalidValue { key: "MAX_NEWS_PER_KEYWORD", .. })
        ));
    }

    #[test]
    fn cache_hours_beyond_duration_range_fail() {
        let err = NewsConfig::from_vars(vars(&[
            ("KEYWORDS", "x"),
            ("RSS_FEEDS", "a.com"),
            ("NEWS_CACHE_HOURS", "9999999999999"),
        ]));
        assert!(matches!(err, Err(ConfigError::InvalidValue { key: "NEWS_CACHE_HOURS", .. })));

        let cfg = NewsConfig::from_vars(vars(&[
            ("KEYWORDS", "x"),
            ("RSS_FEEDS", "a.com"),
            ("NEWS_CACHE_HOURS", "48"),
        ]))
        .unwrap();
        assert_eq!(cfg.cache_retention(), chrono::Duration::hours(48));
    }

    #[test]
    fn telegram_needs_both_values() {
        let err = NewsConfig::from_vars(vars(&[
            ("KEYWORDS", "x"),
            ("RSS_FEEDS", "a.com"),
            ("TELEGRAM_BOT_TOKEN", "t"),
        ]));
        assert!(matches!(err, Err(ConfigError::InvalidValue { key: "TELEGRAM_CHAT_ID", .. })));
    }

    #[test]
    fn file_layer_flattens_arrays() {
        let layer = parse_file_layer(
            r#"
keywords = ["bitcoin", "gold"]
schedule_time = "09:15"
max_news_per_keyword = 2
"#,
        )
        .unwrap();
        assert_eq!(layer["KEYWORDS"], "bitcoin,gold");
        assert_eq!(layer["SCHEDULE_TIME"], "09:15");
        assert_eq!(layer["MAX_NEWS_PER_KEYWORD"], "2");
        assert!(parse_file_layer("keywords = [1, 2]").is_err());
    }
}
