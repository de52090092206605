// src/relevance.rs
//! Keyword relevance gate: ordered keyword set and first-match tagging.

use serde::Serialize;

use crate::error::ConfigError;
use crate::ingest::types::Article;

/// Ordered, lowercase keywords. Earlier keywords win ties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct KeywordSet {
    keywords: Vec<String>,
}

impl KeywordSet {
    /// Trims, lowercases, drops blanks and later repeats. Empty input is a config error.
    pub fn new<I, S>(items: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keywords: Vec<String> = Vec::new();
        for it in items {
            let k = it.as_ref().trim().to_lowercase();
            if !k.is_empty() && !keywords.contains(&k) {
                keywords.push(k);
            }
        }
        if keywords.is_empty() {
            return Err(ConfigError::EmptyKeywords);
        }
        Ok(Self { keywords })
    }

    /// Parse a comma-separated list such as `KEYWORDS=bitcoin,gold`.
    pub fn parse_csv(raw: &str) -> Result<Self, ConfigError> {
        Self::new(raw.split(','))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn position(&self, keyword: &str) -> Option<usize> {
        self.keywords.iter().position(|k| k == keyword)
    }
}

/// First configured keyword found in the article's title or summary (case-insensitive).
pub fn match_keyword<'k>(article: &Article, keywords: &'k KeywordSet) -> Option<&'k str> {
    match_index(article, keywords).map(|i| keywords.keywords[i].as_str())
}

/// Index variant of [`match_keyword`], used for grouping by keyword order.
pub fn match_index(article: &Article, keywords: &KeywordSet) -> Option<usize> {
    let haystack = format!(
        "{} {}",
        article.title,
        article.summary.as_deref().unwrap_or_default()
    )
    .to_lowercase();
    keywords.keywords.iter().position(|k| haystack.contains(k.as_str()))
}
