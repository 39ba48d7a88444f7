//! # Persistence boundary
//!
//! The core never manages schema or transactions; it consumes this trait.
//! `MemoryStore` backs tests and local runs; a SQLite-backed implementation
//! lives with the host application.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::enrich::facts::ExtractedFacts;
use crate::ingest::types::Item;

/// A detected real-world release, appended once per posted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub vendor: String,
    pub product: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub description: String,
}

/// A posted message, appended per transported segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TweetRecord {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub vendor: String,
    pub product: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub posted_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Insert-or-update keyed by URL (item ids are URL-derived).
    async fn upsert_item(&self, item: Item) -> Result<()>;
    async fn items_since(&self, since: DateTime<Utc>) -> Result<Vec<Item>>;
    /// Titles of events already recorded, for duplicate suppression.
    async fn event_titles(&self) -> Result<Vec<String>>;
    async fn insert_event(&self, event: EventRecord) -> Result<()>;
    async fn insert_tweet(&self, tweet: TweetRecord) -> Result<()>;
    /// Tweets posted in the UTC day containing `now`.
    async fn daily_tweet_count(&self, now: DateTime<Utc>) -> Result<u32>;
    /// Tweets for a (vendor, product) posted at/after `since`.
    async fn recent_tweets_for(
        &self,
        vendor: &str,
        product: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TweetRecord>>;
    /// Last known facts for the pair, feeding the delta computer.
    async fn last_facts_for(&self, vendor: &str, product: &str)
        -> Result<Option<ExtractedFacts>>;
    async fn save_facts(&self, facts: ExtractedFacts) -> Result<()>;
}

#[derive(Default)]
struct MemoryInner {
    items: HashMap<String, Item>, // keyed by url
    events: Vec<EventRecord>,
    tweets: Vec<TweetRecord>,
    facts: HashMap<(String, String), ExtractedFacts>,
}

/// In-memory store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn upsert_item(&self, item: Item) -> Result<()> {
        let mut g = self.inner.lock().expect("store mutex");
        g.items.insert(item.url.clone(), item);
        Ok(())
    }

    async fn items_since(&self, since: DateTime<Utc>) -> Result<Vec<Item>> {
        let g = self.inner.lock().expect("store mutex");
        let mut v: Vec<Item> = g
            .items
            .values()
            .filter(|i| i.published_at >= since)
            .cloned()
            .collect();
        v.sort_by_key(|i| i.published_at);
        Ok(v)
    }

    async fn event_titles(&self) -> Result<Vec<String>> {
        let g = self.inner.lock().expect("store mutex");
        Ok(g.events.iter().map(|e| e.description.clone()).collect())
    }

    async fn insert_event(&self, event: EventRecord) -> Result<()> {
        self.inner.lock().expect("store mutex").events.push(event);
        Ok(())
    }

    async fn insert_tweet(&self, tweet: TweetRecord) -> Result<()> {
        self.inner.lock().expect("store mutex").tweets.push(tweet);
        Ok(())
    }

    async fn daily_tweet_count(&self, now: DateTime<Utc>) -> Result<u32> {
        let g = self.inner.lock().expect("store mutex");
        let day_start = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|d| d.and_utc())
            .unwrap_or(now - Duration::hours(24));
        Ok(g.tweets
            .iter()
            .filter(|t| t.posted_at >= day_start && t.posted_at <= now)
            .count() as u32)
    }

    async fn recent_tweets_for(
        &self,
        vendor: &str,
        product: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TweetRecord>> {
        let g = self.inner.lock().expect("store mutex");
        Ok(g.tweets
            .iter()
            .filter(|t| t.vendor == vendor && t.product == product && t.posted_at >= since)
            .cloned()
            .collect())
    }

    async fn last_facts_for(
        &self,
        vendor: &str,
        product: &str,
    ) -> Result<Option<ExtractedFacts>> {
        let g = self.inner.lock().expect("store mutex");
        Ok(g.facts.get(&(vendor.to_string(), product.to_string())).cloned())
    }

    async fn save_facts(&self, facts: ExtractedFacts) -> Result<()> {
        let mut g = self.inner.lock().expect("store mutex");
        g.facts
            .insert((facts.vendor.clone(), facts.product.clone()), facts);
        Ok(())
    }
}
