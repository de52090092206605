// src/ingest/providers/rss.rs
//! Syndication feed provider: one HTTP GET, then RSS 2.0 / RSS 1.0 / Atom parsing.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use serde::Deserialize;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::error::{FetchError, FetchFailure};
use crate::ingest::normalize_optional;
use crate::ingest::normalize_text;
use crate::ingest::types::{Article, ArticleId, FeedFetcher, FeedSource, IdentityPolicy};

const USER_AGENT: &str = concat!("keyword-news-bot/", env!("CARGO_PKG_VERSION"));

// --- RSS 2.0 ---

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

// --- RSS 1.0 (RDF): items are siblings of <channel> ---

#[derive(Debug, Deserialize)]
struct Rdf {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

// Namespace prefixes are dropped by the deserializer, so `<atom:link>` lands in
// `link` and `<media:title>` in `title`. Every field is a list; the first
// non-empty value wins.
#[derive(Debug, Deserialize)]
struct RssItem {
    #[serde(default)]
    title: Vec<TextNode>,
    #[serde(default)]
    link: Vec<TextNode>,
    #[serde(default)]
    guid: Vec<TextNode>,
    #[serde(default)]
    description: Vec<TextNode>,
    #[serde(rename = "pubDate", default)]
    pub_date: Vec<TextNode>,
    /// `<dc:date>`
    #[serde(default)]
    date: Vec<TextNode>,
}

// --- Atom 1.0 ---

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    #[serde(default)]
    title: Vec<TextNode>,
    #[serde(default)]
    id: Vec<TextNode>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    #[serde(default)]
    summary: Vec<TextNode>,
    #[serde(default)]
    content: Vec<TextNode>,
    #[serde(default)]
    published: Vec<TextNode>,
    #[serde(default)]
    updated: Vec<TextNode>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// Element whose attributes we ignore (`<guid isPermaLink=..>`, `<title type=..>`).
#[derive(Debug, Default, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    value: String,
}

fn first_text(nodes: Vec<TextNode>) -> Option<String> {
    nodes.into_iter().map(|n| n.value).find(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Rss,
    Rdf,
    Atom,
}

/// Parse a feed document into articles (no keyword tag yet).
///
/// Entries without a link or a title are skipped; every other missing field is optional.
pub fn parse_feed(
    feed: &FeedSource,
    xml: &str,
    policy: IdentityPolicy,
) -> Result<Vec<Article>, FetchFailure> {
    let xml = scrub_html_entities_for_xml(xml.trim_start_matches('\u{feff}'));
    let parse_err = |e: quick_xml::de::DeError| FetchFailure::Parse(e.to_string());

    let entries: Vec<RawEntry> = match detect_dialect(&xml)? {
        Dialect::Rss => {
            let rss: Rss = from_str(&xml).map_err(parse_err)?;
            rss.channel.items.into_iter().map(RawEntry::from).collect()
        }
        Dialect::Rdf => {
            let rdf: Rdf = from_str(&xml).map_err(parse_err)?;
            rdf.items.into_iter().map(RawEntry::from).collect()
        }
        Dialect::Atom => {
            let atom: AtomFeed = from_str(&xml).map_err(parse_err)?;
            atom.entries.into_iter().map(RawEntry::from).collect()
        }
    };

    Ok(entries
        .into_iter()
        .filter_map(|e| e.into_article(feed, policy))
        .collect())
}

fn detect_dialect(xml: &str) -> Result<Dialect, FetchFailure> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return match e.local_name().as_ref() {
                    b"rss" => Ok(Dialect::Rss),
                    b"RDF" => Ok(Dialect::Rdf),
                    b"feed" => Ok(Dialect::Atom),
                    other => Err(FetchFailure::Parse(format!(
                        "unsupported root element <{}>",
                        String::from_utf8_lossy(other)
                    ))),
                };
            }
            Ok(Event::Eof) => return Err(FetchFailure::Parse("empty document".into())),
            Err(e) => return Err(FetchFailure::Parse(e.to_string())),
            Ok(_) => {}
        }
    }
}

/// Dialect-neutral view of one entry.
struct RawEntry {
    title: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    summary: Option<String>,
    date: Option<String>,
}

impl From<RssItem> for RawEntry {
    fn from(it: RssItem) -> Self {
        Self {
            title: first_text(it.title),
            link: first_text(it.link),
            guid: first_text(it.guid),
            summary: first_text(it.description),
            date: first_text(it.pub_date).or_else(|| first_text(it.date)),
        }
    }
}

impl From<AtomEntry> for RawEntry {
    fn from(e: AtomEntry) -> Self {
        let link = e
            .links
            .iter()
            .find(|l| l.rel.as_deref().map_or(true, |r| r == "alternate"))
            .or_else(|| e.links.first())
            .and_then(|l| l.href.clone());
        Self {
            title: first_text(e.title),
            link,
            guid: first_text(e.id),
            summary: first_text(e.summary).or_else(|| first_text(e.content)),
            date: first_text(e.published).or_else(|| first_text(e.updated)),
        }
    }
}

impl RawEntry {
    fn into_article(self, feed: &FeedSource, policy: IdentityPolicy) -> Option<Article> {
        let link = self
            .link
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())?;
        let title = normalize_text(self.title.as_deref().unwrap_or_default());
        if title.is_empty() {
            return None;
        }
        let id = ArticleId::derive(policy, &link, self.guid.as_deref(), &title);

        Some(Article {
            id,
            title,
            link,
            summary: normalize_optional(self.summary.as_deref()),
            published_at: self.date.as_deref().and_then(parse_feed_date),
            source_feed: feed.url().to_string(),
            matched_keyword: None,
        })
    }
}

/// RFC 2822 (RSS) or RFC 3339 (Atom, dc:date). Unparsable dates are treated as absent.
pub fn parse_feed_date(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    let unix = OffsetDateTime::parse(ts, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(ts, &Rfc3339))
        .map(|dt| dt.unix_timestamp())
        .ok()
        // obsolete zone names ("EST", "PDT") only parse through chrono
        .or_else(|| DateTime::parse_from_rfc2822(ts).ok().map(|dt| dt.timestamp()))?;
    Utc.timestamp_opt(unix, 0).single()
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", "&#160;")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

/// Network-backed fetcher used in production.
pub struct HttpFeedFetcher {
    client: Client,
    policy: IdentityPolicy,
}

impl HttpFeedFetcher {
    pub fn new(policy: IdentityPolicy) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, policy }
    }
}

fn classify(e: &reqwest::Error, timeout: Duration) -> FetchFailure {
    if e.is_timeout() {
        FetchFailure::Timeout(timeout)
    } else if e.is_builder() {
        FetchFailure::InvalidUrl(e.to_string())
    } else {
        FetchFailure::Request(e.to_string())
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, feed: &FeedSource, timeout: Duration) -> Result<Vec<Article>, FetchError> {
        let t0 = Instant::now();
        let fail = |cause| FetchError::new(feed.url(), cause);

        let resp = self
            .client
            .get(feed.url())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| fail(classify(&e, timeout)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(fail(FetchFailure::Status(status.as_u16())));
        }

        let body = resp.text().await.map_err(|e| fail(classify(&e, timeout)))?;
        let articles = parse_feed(feed, &body, self.policy).map_err(fail)?;

        histogram!("news_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("news_articles_fetched_total").increment(articles.len() as u64);
        tracing::debug!(feed = %feed, articles = articles.len(), "feed fetched");
        Ok(articles)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed() -> FeedSource {
        FeedSource::parse("https://feeds.example.test/rss").unwrap()
    }

    #[test]
    fn rss_items_with_optional_fields_missing() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>T</title>
  <item><title>Bitcoin tops &nbsp;record</title><link>https://e.test/1</link>
        <pubDate>Tue, 10 Jun 2025 08:00:00 +0000</pubDate></item>
  <item><title>Gold, bare</title><link>https://e.test/2</link></item>
  <item><title>no link, skipped</title></item>
  <item><link>https://e.test/untitled</link><description>skipped</description></item>
  <item><title> &nbsp; </title><link>https://e.test/blank</link></item>
</channel></rss>"#;
        let out = parse_feed(&feed(), xml, IdentityPolicy::Link).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].title, "Bitcoin tops record");
        assert!(out[0].published_at.is_some());
        assert_eq!(out[1].title, "Gold, bare");
        assert_eq!(out[1].summary, None);
        assert_eq!(out[1].published_at, None);
        assert!(out.iter().all(|a| a.matched_keyword.is_none()));
    }

    #[test]
    fn atom_prefers_alternate_link() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <title type="html">Gold &amp; silver</title>
    <id>urn:x:1</id>
    <link rel="self" href="https://e.test/self"/>
    <link rel="alternate" href="https://e.test/post"/>
    <updated>2025-06-10T08:00:00Z</updated>
    <summary>Metals &lt;b&gt;rally&lt;/b&gt;</summary>
  </entry>
</feed>"#;
        let out = parse_feed(&feed(), xml, IdentityPolicy::Guid).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].link, "https://e.test/post");
        assert_eq!(out[0].title, "Gold & silver");
        assert_eq!(out[0].summary.as_deref(), Some("Metals rally"));
    }

    #[test]
    fn namespaced_siblings_do_not_collide() {
        let xml = r#"<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom"
     xmlns:media="http://search.yahoo.com/mrss/" xmlns:dc="http://purl.org/dc/elements/1.1/">
<channel><title>T</title>
  <atom:link href="https://e.test/rss" rel="self" type="application/rss+xml"/>
  <item>
    <title>Silver jumps</title>
    <atom:link href="https://e.test/amp/1" rel="amphtml"/>
    <link>https://e.test/1</link>
    <media:title>Thumbnail caption</media:title>
    <dc:date>2025-06-10T04:00:00Z</dc:date>
  </item>
</channel></rss>"#;
        let out = parse_feed(&feed(), xml, IdentityPolicy::Link).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "Silver jumps");
        assert_eq!(out[0].link, "https://e.test/1");
        assert_eq!(out[0].published_at, parse_feed_date("2025-06-10T04:00:00Z"));
    }

    #[test]
    fn unknown_root_and_garbage_are_parse_errors() {
        assert!(matches!(
            parse_feed(&feed(), "<html><body/></html>", IdentityPolicy::Link),
            Err(FetchFailure::Parse(_))
        ));
        assert!(matches!(
            parse_feed(&feed(), "not xml at all", IdentityPolicy::Link),
            Err(FetchFailure::Parse(_))
        ));
    }

    #[test]
    fn feed_dates_accept_both_formats() {
        assert!(parse_feed_date("Tue, 10 Jun 2025 08:00:00 GMT").is_some());
        assert!(parse_feed_date("2025-06-10T08:00:00+02:00").is_some());
        assert_eq!(parse_feed_date("yesterday"), None);
    }
}
