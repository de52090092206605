//! # Dedup Cache
//! Remembers which articles were already selected, for a retention window.
//!
//! An identity recorded at `t` is a duplicate for every `now < t + retention`.
//! Expired entries are dropped lazily on lookup and eagerly by
//! [`DedupCache::evict_expired`], which the engine runs at the start of every
//! aggregation run so the map stays bounded.
//!
//! Optional persistence is a JSON object `{ identity: rfc3339 }`. A missing or
//! unreadable snapshot yields an empty cache.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use tokio::fs;

use crate::ingest::types::ArticleId;

/// Thread-safe identity → first-selection timestamp map.
#[derive(Debug)]
pub struct DedupCache {
    inner: Mutex<HashMap<ArticleId, DateTime<Utc>>>,
    retention: Duration,
}

/// `hours` as a retention window, or `None` when it does not fit a `chrono::Duration`.
pub fn retention_from_hours(hours: u64) -> Option<Duration> {
    i64::try_from(hours).ok().and_then(Duration::try_hours)
}

impl DedupCache {
    /// Retention below one second is clamped to one second.
    pub fn new(retention: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            retention: retention.max(Duration::seconds(1)),
        }
    }

    /// Hours past chrono's range mean "never forget".
    pub fn with_hours(hours: u64) -> Self {
        Self::new(retention_from_hours(hours).unwrap_or(Duration::max_value()))
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// True iff `id` was recorded less than one retention window before `now`.
    pub fn is_duplicate(&self, id: &ArticleId, now: DateTime<Utc>) -> bool {
        let mut map = self.inner.lock().expect("dedup cache mutex poisoned");
        match map.get(id) {
            Some(&ts) if now - ts < self.retention => true,
            Some(_) => {
                map.remove(id);
                false
            }
            None => false,
        }
    }

    /// Insert or refresh `id` at `now`. Never creates a second entry.
    pub fn record(&self, id: ArticleId, now: DateTime<Utc>) {
        let mut map = self.inner.lock().expect("dedup cache mutex poisoned");
        map.insert(id, now);
    }

    pub fn record_all<I>(&self, ids: I, now: DateTime<Utc>)
    where
        I: IntoIterator<Item = ArticleId>,
    {
        let mut map = self.inner.lock().expect("dedup cache mutex poisoned");
        for id in ids {
            map.insert(id, now);
        }
    }

    /// Remove entries whose age is at least the retention window. Returns how many went.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let mut map = self.inner.lock().expect("dedup cache mutex poisoned");
        let before = map.len();
        map.retain(|_, ts| now - *ts < self.retention);
        before - map.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("dedup cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load a snapshot; a missing or corrupt file gives an empty cache.
    pub async fn load(path: &Path, retention: Duration) -> Self {
        let cache = Self::new(retention);
        match fs::read_to_string(path).await {
            Ok(s) => match serde_json::from_str::<HashMap<ArticleId, DateTime<Utc>>>(&s) {
                Ok(entries) => {
                    let n = entries.len();
                    *cache.inner.lock().expect("dedup cache mutex poisoned") = entries;
                    tracing::info!(path = %path.display(), entries = n, "dedup snapshot loaded");
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), "dedup snapshot unreadable, starting empty: {e:#}");
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no dedup snapshot yet");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "reading dedup snapshot: {e:#}");
            }
        }
        cache
    }

    /// Write the current entries as pretty JSON, creating parent dirs.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let body = {
            let map = self.inner.lock().expect("dedup cache mutex poisoned");
            serde_json::to_vec_pretty(&*map).context("serialize dedup snapshot")?
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("create {}", dir.display()))?;
        }
        fs::write(path, body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}
