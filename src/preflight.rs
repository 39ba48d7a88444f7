//! # Preflight gate
//!
//! Final checks immediately before transport, independent of the safety
//! gate (defense in depth): recent-duplicate suppression, daily cap, and an
//! official-citation re-check. Passing is a precondition, not a guarantee;
//! transport failures are the posting layer's problem.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::compose::ThreadComposition;
use crate::config::PreflightConfig;
use crate::enrich::facts::ExtractedFacts;
use crate::safety::is_official;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PreflightFailure {
    DraftOnly,
    DuplicateRecent { existing: String },
    DailyCapReached { count: u32, cap: u32 },
    NoOfficialCitation,
}

impl std::fmt::Display for PreflightFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreflightFailure::DraftOnly => write!(f, "composition is draft-only (no citations)"),
            PreflightFailure::DuplicateRecent { existing } => {
                write!(f, "duplicate of recent post: {existing}")
            }
            PreflightFailure::DailyCapReached { count, cap } => {
                write!(f, "daily tweet count {count} reached cap {cap}")
            }
            PreflightFailure::NoOfficialCitation => {
                write!(f, "no citation resolves to an official domain")
            }
        }
    }
}

/// All failing reasons are surfaced, not just the first one.
#[derive(Debug, Clone, Serialize)]
pub struct PreflightOutcome {
    pub failures: Vec<PreflightFailure>,
}

impl PreflightOutcome {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct PreflightGate {
    cfg: PreflightConfig,
}

impl PreflightGate {
    pub fn new(cfg: PreflightConfig) -> Self {
        Self { cfg }
    }

    pub async fn check(
        &self,
        store: &dyn Store,
        facts: &ExtractedFacts,
        composition: &ThreadComposition,
        now: DateTime<Utc>,
    ) -> anyhow::Result<PreflightOutcome> {
        let mut failures = Vec::new();

        // Draft-only threads are structurally unpublishable.
        if composition.draft_only {
            failures.push(PreflightFailure::DraftOnly);
        }

        // (a) duplicate (vendor, product[, version]) within the window
        let since = now - Duration::hours(self.cfg.dup_window_hours);
        let recent = store
            .recent_tweets_for(&facts.vendor, &facts.product, since)
            .await?;
        let dup = match facts.version.as_deref().filter(|v| !v.trim().is_empty()) {
            // Version-qualified: only a prior post mentioning the same
            // version counts as a duplicate.
            Some(version) => recent.iter().find(|t| {
                t.version.as_deref() == Some(version) || t.content.contains(version)
            }),
            None => recent.first(),
        };
        if let Some(t) = dup {
            failures.push(PreflightFailure::DuplicateRecent {
                existing: t.content.chars().take(80).collect(),
            });
        }

        // (b) daily cap
        let count = store.daily_tweet_count(now).await?;
        if count >= self.cfg.max_daily_posts {
            failures.push(PreflightFailure::DailyCapReached {
                count,
                cap: self.cfg.max_daily_posts,
            });
        }

        // (c) at least one official citation. Stricter re-check of what
        // draft_only encodes; facts may have mutated between gates.
        if !facts.citations.iter().any(|c| is_official(c)) {
            failures.push(PreflightFailure::NoOfficialCitation);
        }

        if !failures.is_empty() {
            for f in &failures {
                tracing::info!(
                    vendor = %facts.vendor,
                    product = %facts.product,
                    failure = %f,
                    "preflight rejection"
                );
            }
            metrics::counter!("radar_preflight_rejections_total")
                .increment(failures.len() as u64);
        }

        Ok(PreflightOutcome { failures })
    }
}
