//! # Clustering Engine
//!
//! Groups annotated items into candidate release events:
//! exact (vendor, product) grouping → forward-scan time partition →
//! seed-based title-similarity partition → singleton drop → weighted
//! confidence score. Single-pass in-memory computation, no I/O.
//!
//! The similarity sub-step compares against the sub-cluster *seed only*,
//! while the final confidence uses mean all-pairs similarity. The asymmetry
//! is intentional and load-bearing: making the seeding step transitive
//! changes which items land together.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::classify;
use crate::config::ClusterConfig;
use crate::ingest::types::Item;

/// A hypothesis that several items describe the same real-world event.
/// Ephemeral: recomputed per run, never persisted directly.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateCluster {
    pub vendor: String,
    pub product: String,
    pub item_ids: Vec<String>,
    pub items: Vec<Item>,
    /// In [0.0, 1.0].
    pub confidence: f64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Mean all-pairs title similarity across members.
    pub title_similarity: f64,
}

impl CandidateCluster {
    pub fn member_urls(&self) -> Vec<String> {
        self.items.iter().map(|i| i.url.clone()).collect()
    }
}

pub struct ClusterEngine {
    cfg: ClusterConfig,
}

/// Bigram Dice similarity over lowercased titles, in [0.0, 1.0].
pub fn title_similarity(a: &str, b: &str) -> f64 {
    strsim::sorensen_dice(&a.to_lowercase(), &b.to_lowercase())
}

impl ClusterEngine {
    pub fn new(cfg: ClusterConfig) -> Self {
        Self { cfg }
    }

    /// Produce scored candidate clusters from annotated items, sorted by
    /// confidence descending. `now` is injected so recency scoring is
    /// testable.
    pub fn cluster(&self, items: &[Item], now: DateTime<Utc>) -> Vec<CandidateCluster> {
        // 1) Only items with a resolvable (vendor, product) pair participate.
        let mut groups: BTreeMap<(String, String), Vec<&Item>> = BTreeMap::new();
        for it in items {
            if let (Some(v), Some(p)) = (it.vendor.as_deref(), it.product.as_deref()) {
                groups
                    .entry((v.to_string(), p.to_string()))
                    .or_default()
                    .push(it);
            }
        }

        let mut out = Vec::new();
        for ((vendor, product), mut members) in groups {
            // 2) Chronological forward scan.
            members.sort_by_key(|it| it.published_at);

            for time_cluster in self.split_by_time(&members) {
                for sim_cluster in self.split_by_seed_similarity(&time_cluster) {
                    // 5) Corroboration required: singletons carry no signal.
                    if sim_cluster.len() < 2 {
                        continue;
                    }
                    out.push(self.score(&vendor, &product, &sim_cluster, now));
                }
            }
        }

        // 7) Best hypotheses first.
        out.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        out
    }

    /// 3) Start a new sub-cluster whenever the gap to the previous member
    /// exceeds the window. Not density-based: one forward pass.
    fn split_by_time<'a>(&self, sorted: &[&'a Item]) -> Vec<Vec<&'a Item>> {
        let window = Duration::hours(self.cfg.window_hours);
        let mut clusters: Vec<Vec<&Item>> = Vec::new();
        for it in sorted {
            match clusters.last_mut() {
                Some(current) => {
                    let prev = current.last().expect("non-empty cluster");
                    if it.published_at - prev.published_at > window {
                        clusters.push(vec![it]);
                    } else {
                        current.push(it);
                    }
                }
                None => clusters.push(vec![it]),
            }
        }
        clusters
    }

    /// 4) Greedy seeding: the next unprocessed item seeds a sub-cluster and
    /// absorbs remaining items similar enough *to the seed*. An item similar
    /// to a non-seed member but not the seed stays out.
    fn split_by_seed_similarity<'a>(&self, members: &[&'a Item]) -> Vec<Vec<&'a Item>> {
        let mut remaining: Vec<&Item> = members.to_vec();
        let mut clusters = Vec::new();

        while !remaining.is_empty() {
            let seed = remaining.remove(0);
            let mut group = vec![seed];
            remaining.retain(|cand: &&Item| {
                if title_similarity(&seed.title, &cand.title) > self.cfg.similarity_threshold {
                    group.push(*cand);
                    false
                } else {
                    true
                }
            });
            clusters.push(group);
        }
        clusters
    }

    /// 6) Weighted confidence, capped at 1.0:
    /// member count (0.2 each, up to 1.0) + release-like fraction (≤0.3)
    /// + recent fraction (≤0.2) + mean all-pairs similarity (≤0.3).
    fn score(
        &self,
        vendor: &str,
        product: &str,
        members: &[&Item],
        now: DateTime<Utc>,
    ) -> CandidateCluster {
        let n = members.len();

        let count_part = (0.2 * n as f64).min(1.0);

        let release_hits = members
            .iter()
            .filter(|it| classify::is_release_like(&it.searchable_text()))
            .count();
        let release_part = 0.3 * release_hits as f64 / n as f64;

        let recent_cutoff = now - Duration::hours(self.cfg.recency_hours);
        let recent_hits = members
            .iter()
            .filter(|it| it.published_at >= recent_cutoff)
            .count();
        let recency_part = 0.2 * recent_hits as f64 / n as f64;

        let sim = mean_pairwise_similarity(members);
        let sim_part = 0.3 * sim;

        let confidence = (count_part + release_part + recency_part + sim_part).min(1.0);

        CandidateCluster {
            vendor: vendor.to_string(),
            product: product.to_string(),
            item_ids: members.iter().map(|i| i.id.clone()).collect(),
            items: members.iter().map(|i| (*i).clone()).collect(),
            confidence,
            window_start: members
                .iter()
                .map(|i| i.published_at)
                .min()
                .unwrap_or(now),
            window_end: members
                .iter()
                .map(|i| i.published_at)
                .max()
                .unwrap_or(now),
            title_similarity: sim,
        }
    }
}

/// Mean similarity over all member pairs (all-pairs, unlike the seeding step).
fn mean_pairwise_similarity(members: &[&Item]) -> f64 {
    let n = members.len();
    if n < 2 {
        return 0.0;
    }
    let mut sum = 0.0;
    let mut pairs = 0usize;
    for i in 0..n {
        for j in (i + 1)..n {
            sum += title_similarity(&members[i].title, &members[j].title);
            pairs += 1;
        }
    }
    sum / pairs as f64
}
