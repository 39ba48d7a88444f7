// src/ingest/mod.rs
pub mod types;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use std::collections::HashSet;

use crate::ingest::types::{ArticleExtractor, Item, ItemSource};
use crate::recognize;

/// One-time metrics registration (so series show up on an exporter).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("radar_items_total", "Total items fetched from sources.");
        describe_counter!(
            "radar_items_kept_total",
            "Items kept after normalization + URL dedup."
        );
        describe_counter!(
            "radar_items_dropped_total",
            "Items dropped as empty or duplicate-URL."
        );
        describe_counter!("radar_source_errors_total", "Source fetch/parse errors.");
        describe_gauge!(
            "radar_ingest_last_run_ts",
            "Unix ts when the ingest step last ran."
        );
    });
}

static RE_TAGS: once_cell::sync::Lazy<regex::Regex> =
    once_cell::sync::Lazy::new(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
static RE_WS: once_cell::sync::Lazy<regex::Regex> =
    once_cell::sync::Lazy::new(|| regex::Regex::new(r"\s+").expect("ws regex"));

/// Normalize text: decode HTML entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();
    out = RE_TAGS.replace_all(&out, "").to_string();

    // Curly quotes to ASCII
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    out = RE_WS.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    // Length cap: 8000 chars (LLM prompts slice further downstream)
    if out.chars().count() > 8000 {
        out = out.chars().take(8000).collect();
    }

    out
}

/// Annotate an item with vendor/product when not already set by the source.
/// Explicit fields from the source always take precedence over detection.
pub fn annotate(mut item: Item) -> Item {
    item.title = normalize_text(&item.title);
    if let Some(t) = item.text.take() {
        let t = normalize_text(&t);
        item.text = (!t.is_empty()).then_some(t);
    }
    if let Some(s) = item.summary.take() {
        let s = normalize_text(&s);
        item.summary = (!s.is_empty()).then_some(s);
    }

    if item.vendor.is_none() || item.product.is_none() {
        let hit = recognize::recognize(&item.searchable_text());
        if item.vendor.is_none() {
            item.vendor = hit.vendor;
        }
        if item.product.is_none() {
            item.product = hit.product;
        }
    }
    item
}

/// Normalize, annotate and drop empty-title / duplicate-URL items.
pub fn normalize_and_dedup(raw: Vec<Item>) -> (Vec<Item>, usize) {
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut kept = Vec::with_capacity(raw.len());
    let mut dropped = 0usize;

    for item in raw {
        let item = annotate(item);
        if item.title.is_empty() || !seen_urls.insert(item.url.clone()) {
            dropped += 1;
            continue;
        }
        kept.push(item);
    }
    (kept, dropped)
}

/// Fill in missing body text via the article extractor. Items that already
/// carry a body are left alone; a failed extraction degrades to the
/// title-only item, never to an aborted batch.
pub async fn fill_missing_text(items: &mut [Item], extractor: &dyn ArticleExtractor) {
    for item in items.iter_mut() {
        if !item.body().is_empty() {
            continue;
        }
        let article = extractor.extract(&item.url).await;
        if article.success {
            let text = normalize_text(&article.text);
            item.text = (!text.is_empty()).then_some(text);
        }
    }
}

/// Fetch from all sources once, normalize, annotate and dedup by URL.
/// Returns (kept, dropped_count, error_count).
pub async fn run_once(sources: &[Box<dyn ItemSource>]) -> (Vec<Item>, usize, usize) {
    ensure_metrics_described();

    let mut raw = Vec::new();
    let mut errors = 0usize;
    for s in sources {
        match s.fetch_latest().await {
            Ok(mut v) => raw.append(&mut v),
            Err(e) => {
                tracing::warn!(error = ?e, source = s.name(), "source error");
                counter!("radar_source_errors_total").increment(1);
                errors += 1;
            }
        }
    }
    counter!("radar_items_total").increment(raw.len() as u64);

    let (kept, dropped) = normalize_and_dedup(raw);

    counter!("radar_items_kept_total").increment(kept.len() as u64);
    counter!("radar_items_dropped_total").increment(dropped as u64);
    gauge!("radar_ingest_last_run_ts").set(chrono::Utc::now().timestamp().max(0) as f64);

    (kept, dropped, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::{ArticleText, Source};
    use chrono::Utc;

    #[test]
    fn normalize_text_strips_tags_and_entities() {
        let s = "  <p>GPT-4&nbsp;Turbo</p>   launched ";
        assert_eq!(normalize_text(s), "GPT-4 Turbo launched");
    }

    #[test]
    fn annotate_detects_vendor_and_product() {
        let it = Item::new(
            Source::Rss,
            "https://example.com/a",
            "OpenAI ships GPT-4 Turbo",
            Utc::now(),
        );
        let it = annotate(it);
        assert_eq!(it.vendor.as_deref(), Some("openai"));
        assert_eq!(it.product.as_deref(), Some("gpt-4"));
    }

    #[test]
    fn annotate_keeps_explicit_fields() {
        let mut it = Item::new(
            Source::Github,
            "https://example.com/b",
            "OpenAI ships GPT-4 Turbo",
            Utc::now(),
        );
        it.vendor = Some("anthropic".into());
        let it = annotate(it);
        assert_eq!(it.vendor.as_deref(), Some("anthropic"));
    }

    struct StubExtractor;

    #[async_trait::async_trait]
    impl ArticleExtractor for StubExtractor {
        async fn extract(&self, url: &str) -> ArticleText {
            if url.ends_with("/full") {
                ArticleText {
                    title: "t".into(),
                    text: "<p>Extracted body text</p>".into(),
                    success: true,
                }
            } else {
                ArticleText::title_only("t")
            }
        }
    }

    #[tokio::test]
    async fn extractor_fills_missing_text_or_leaves_title_only() {
        let now = Utc::now();
        let mut with_body = Item::new(Source::Web, "https://example.com/has-body", "Has body", now);
        with_body.text = Some("already here".into());
        let mut items = vec![
            Item::new(Source::Web, "https://example.com/full", "Full", now),
            Item::new(Source::Web, "https://example.com/paywalled", "Paywalled", now),
            with_body,
        ];

        fill_missing_text(&mut items, &StubExtractor).await;

        assert_eq!(items[0].body(), "Extracted body text");
        assert!(items[1].body().is_empty());
        assert_eq!(items[2].body(), "already here");
    }

    #[test]
    fn dedup_drops_repeated_urls() {
        let now = Utc::now();
        let a = Item::new(Source::Rss, "https://example.com/x", "Title one", now);
        let b = Item::new(Source::Web, "https://example.com/x", "Title two", now);
        let (kept, dropped) = normalize_and_dedup(vec![a, b]);
        assert_eq!(kept.len(), 1);
        assert_eq!(dropped, 1);
    }
}
