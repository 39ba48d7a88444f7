//! Best-effort media previews: the Open Graph image of the canonical URL,
//! attached to the first thread segment only. Any failure (network, parse,
//! non-allowlisted URL) simply means no media; composition never fails on
//! this path.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::safety::is_official;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaPreview {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[async_trait::async_trait]
pub trait MediaFetcher: Send + Sync {
    /// `None` on any failure; never an error.
    async fn fetch_preview(&self, url: &str) -> Option<MediaPreview>;
}

static RE_OG_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)<meta[^>]+(?:property|name)\s*=\s*["']og:image["'][^>]*content\s*=\s*["']([^"']+)["']"#,
    )
    .expect("og:image regex")
});

static RE_OG_IMAGE_REV: Lazy<Regex> = Lazy::new(|| {
    // content attribute before the property attribute
    Regex::new(
        r#"(?is)<meta[^>]+content\s*=\s*["']([^"']+)["'][^>]*(?:property|name)\s*=\s*["']og:image["']"#,
    )
    .expect("og:image reversed regex")
});

/// Pull the og:image URL out of an HTML page, either attribute order.
pub fn parse_og_image(html: &str) -> Option<String> {
    RE_OG_IMAGE
        .captures(html)
        .or_else(|| RE_OG_IMAGE_REV.captures(html))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|u| u.starts_with("http"))
}

/// Fetches the page at an allowlisted URL and extracts its og:image.
pub struct OgImageFetcher {
    http: reqwest::Client,
}

impl OgImageFetcher {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .user_agent("ai-release-radar/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(8))
            .build()
            .expect("reqwest client");
        Self { http }
    }
}

impl Default for OgImageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MediaFetcher for OgImageFetcher {
    async fn fetch_preview(&self, url: &str) -> Option<MediaPreview> {
        // Only fetch pages we already trust as official sources.
        if !is_official(url) {
            return None;
        }
        let resp = self.http.get(url).send().await.ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let html = resp.text().await.ok()?;
        let image = parse_og_image(&html)?;
        Some(MediaPreview {
            url: image,
            alt: None,
            width: None,
            height: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_og_image_either_attribute_order() {
        let a = r#"<html><head><meta property="og:image" content="https://cdn.test/a.png"></head></html>"#;
        assert_eq!(
            parse_og_image(a).as_deref(),
            Some("https://cdn.test/a.png")
        );

        let b = r#"<meta content="https://cdn.test/b.png" property="og:image">"#;
        assert_eq!(
            parse_og_image(b).as_deref(),
            Some("https://cdn.test/b.png")
        );
    }

    #[test]
    fn missing_or_relative_image_is_none() {
        assert!(parse_og_image("<html><head></head></html>").is_none());
        let rel = r#"<meta property="og:image" content="/img/a.png">"#;
        assert!(parse_og_image(rel).is_none());
    }
}
