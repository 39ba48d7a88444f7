// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an item was ingested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Rss,
    Web,
    Github,
    X,
}

/// A normalized ingested unit (article, release note, post).
///
/// `id` is a deterministic function of `url`, so re-ingesting the same URL
/// upserts instead of duplicating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    pub url: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub published_at: DateTime<Utc>,
    /// Opaque original payload, kept for diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl Item {
    pub fn new(
        source: Source,
        url: impl Into<String>,
        title: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        let url = url.into();
        Self {
            id: item_id(&url),
            source,
            vendor: None,
            product: None,
            url,
            title: title.into(),
            summary: None,
            text: None,
            published_at,
            raw: None,
        }
    }

    /// Best available body text: full text, else summary, else empty.
    pub fn body(&self) -> &str {
        self.text
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(self.summary.as_deref())
            .unwrap_or("")
    }

    /// Title plus body, used by the recognizer and classifier.
    pub fn searchable_text(&self) -> String {
        let body = self.body();
        if body.is_empty() {
            self.title.clone()
        } else {
            format!("{}. {}", self.title, body)
        }
    }
}

/// Stable item id derived from the URL (first 6 bytes of SHA-256, hex).
pub fn item_id(url: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Ingestion collaborator: RSS feeds, GitHub releases, etc.
/// Implementations live outside this crate; tests use fixtures.
#[async_trait::async_trait]
pub trait ItemSource: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<Item>>;
    fn name(&self) -> &'static str;
}

/// Result of full-text article extraction for a URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleText {
    pub title: String,
    pub text: String,
    pub success: bool,
}

impl ArticleText {
    /// Title-only fallback used when extraction fails or times out.
    pub fn title_only(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: String::new(),
            success: false,
        }
    }
}

/// Article full-text extraction collaborator. Failure degrades to
/// `ArticleText::title_only`, never to an aborted run.
#[async_trait::async_trait]
pub trait ArticleExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> ArticleText;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_id_is_deterministic_per_url() {
        let a = item_id("https://openai.com/blog/gpt-4o");
        let b = item_id("https://openai.com/blog/gpt-4o");
        let c = item_id("https://openai.com/blog/other");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 12);
    }

    #[test]
    fn body_prefers_text_over_summary() {
        let mut it = Item::new(Source::Rss, "https://x.test/a", "T", Utc::now());
        it.summary = Some("short".into());
        assert_eq!(it.body(), "short");
        it.text = Some("full body".into());
        assert_eq!(it.body(), "full body");
    }
}
