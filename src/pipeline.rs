//! # Pipeline
//!
//! One `run_once` wires the whole flow: ingest → annotate/upsert → cluster
//! → extract facts → compute deltas → safety gate → compose → preflight →
//! transport. Partial-failure semantics throughout: a failing cluster is
//! logged and counted, the run continues.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::cluster::{CandidateCluster, ClusterEngine};
use crate::compose::media::MediaFetcher;
use crate::compose::style::CompositionSession;
use crate::compose::{ThreadComposer, ThreadComposition};
use crate::config::RadarConfig;
use crate::enrich::deltas::{ComputedDeltas, DeltaComputer};
use crate::enrich::facts::FactExtractor;
use crate::enrich::llm::SharedLlm;
use crate::ingest::{
    self,
    types::{ArticleExtractor, ItemSource},
};
use crate::preflight::PreflightGate;
use crate::safety::{SafetyGate, SafetyInput};
use crate::store::{EventRecord, Store, TweetRecord};
use crate::transport::Poster;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("radar_clusters_total", "Candidate clusters found per run.");
        describe_counter!("radar_events_total", "Events recorded after posting.");
        describe_counter!("radar_threads_posted_total", "Threads that reached transport.");
        describe_counter!("radar_cluster_errors_total", "Clusters failed mid-enrichment.");
        describe_gauge!(
            "radar_pipeline_last_run_ts",
            "Unix ts when the pipeline last completed a run."
        );
    });
}

/// End-of-run accounting, logged and returned to the caller.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct RunSummary {
    pub items_processed: usize,
    pub clusters_found: usize,
    pub events_created: usize,
    pub threads_posted: usize,
    pub errors: usize,
    /// Skip-reason tag → count, for observability.
    pub skips: BTreeMap<String, usize>,
}

impl RunSummary {
    fn note_skip(&mut self, tag: &str) {
        *self.skips.entry(tag.to_string()).or_default() += 1;
    }
}

pub struct Pipeline {
    cfg: RadarConfig,
    store: Arc<dyn Store>,
    llm: SharedLlm,
    poster: Arc<dyn Poster>,
    media: Option<Arc<dyn MediaFetcher>>,
    article: Option<Arc<dyn ArticleExtractor>>,
}

impl Pipeline {
    pub fn new(
        cfg: RadarConfig,
        store: Arc<dyn Store>,
        llm: SharedLlm,
        poster: Arc<dyn Poster>,
    ) -> Self {
        Self {
            cfg,
            store,
            llm,
            poster,
            media: None,
            article: None,
        }
    }

    pub fn with_media_fetcher(mut self, media: Arc<dyn MediaFetcher>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_article_extractor(mut self, article: Arc<dyn ArticleExtractor>) -> Self {
        self.article = Some(article);
        self
    }

    /// One full pipeline pass over all sources.
    pub async fn run_once(&self, sources: &[Box<dyn ItemSource>]) -> RunSummary {
        let mut rng = StdRng::from_os_rng();
        self.run_once_with_rng(sources, &mut rng).await
    }

    /// Same as `run_once` with an injected RNG, so tests can pin style
    /// branches.
    pub async fn run_once_with_rng<R: Rng + ?Sized>(
        &self,
        sources: &[Box<dyn ItemSource>],
        rng: &mut R,
    ) -> RunSummary {
        ensure_metrics_described();
        let now = Utc::now();
        let mut summary = RunSummary::default();

        // 1) Ingest, annotate and upsert.
        let (mut items, _dropped, source_errors) = ingest::run_once(sources).await;
        summary.errors += source_errors;
        summary.items_processed = items.len();
        if let Some(extractor) = &self.article {
            ingest::fill_missing_text(&mut items, extractor.as_ref()).await;
        }
        for item in items {
            if let Err(e) = self.store.upsert_item(item).await {
                tracing::warn!(error = ?e, "item upsert failed");
                summary.errors += 1;
            }
        }

        // 2) Cluster over the recent window.
        let lookback = now - Duration::hours(self.cfg.cluster.lookback_hours);
        let recent = match self.store.items_since(lookback).await {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = ?e, "loading recent items failed");
                summary.errors += 1;
                return self.finish(summary, now);
            }
        };
        let engine = ClusterEngine::new(self.cfg.cluster.clone());
        let clusters = engine.cluster(&recent, now);
        summary.clusters_found = clusters.len();
        counter!("radar_clusters_total").increment(clusters.len() as u64);

        // 3) Per-cluster enrichment and publication. Fresh session per run
        // so opener choice never bleeds across batches.
        let mut session = CompositionSession::new();
        for cluster in &clusters {
            match self
                .process_cluster(cluster, &mut summary, &mut session, rng, now)
                .await
            {
                Ok(()) => {}
                Err(e) => {
                    tracing::warn!(
                        vendor = %cluster.vendor,
                        product = %cluster.product,
                        error = ?e,
                        "cluster failed, continuing"
                    );
                    counter!("radar_cluster_errors_total").increment(1);
                    summary.errors += 1;
                }
            }
        }

        self.finish(summary, now)
    }

    fn finish(&self, summary: RunSummary, now: chrono::DateTime<Utc>) -> RunSummary {
        gauge!("radar_pipeline_last_run_ts").set(now.timestamp().max(0) as f64);
        tracing::info!(
            items = summary.items_processed,
            clusters = summary.clusters_found,
            events = summary.events_created,
            posted = summary.threads_posted,
            errors = summary.errors,
            skips = ?summary.skips,
            "run complete"
        );
        summary
    }

    async fn process_cluster<R: Rng + ?Sized>(
        &self,
        cluster: &CandidateCluster,
        summary: &mut RunSummary,
        session: &mut CompositionSession,
        rng: &mut R,
        now: chrono::DateTime<Utc>,
    ) -> Result<()> {
        // Facts: a failed extraction fails only this cluster.
        let extractor = FactExtractor::new(self.llm.clone());
        let facts = extractor.extract(cluster).await?;

        // Deltas: LLM failure degrades to the "new announcement" fallback.
        let prior = self
            .store
            .last_facts_for(&facts.vendor, &facts.product)
            .await?;
        let computer = DeltaComputer::new(self.llm.clone());
        let deltas = match computer.compute(&facts, prior.as_ref()).await {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(error = ?e, "delta comparison failed, using fallback");
                ComputedDeltas::new_announcement(&facts)
            }
        };

        // Safety gate.
        let lead = lead_item_text(cluster);
        let canonical_url = cluster.items.first().map(|i| i.url.clone());
        let existing_titles = self.store.event_titles().await?;
        let daily = self.store.daily_tweet_count(now).await?;
        let gate = SafetyGate::new(self.cfg.safety.clone());
        let title = cluster
            .items
            .first()
            .map(|i| i.title.clone())
            .unwrap_or_default();
        if let Some(skip) = gate.evaluate(&SafetyInput {
            url: canonical_url.as_deref(),
            title: &title,
            text: &lead,
            facts: &facts,
            daily_post_count: daily,
            existing_titles: &existing_titles,
        }) {
            summary.note_skip(skip.reason.as_tag());
            return Ok(());
        }

        // Compose (media preview is best-effort and first-segment-only).
        let media = match (&self.media, canonical_url.as_deref()) {
            (Some(f), Some(url)) => f.fetch_preview(url).await,
            _ => None,
        };
        let composer = ThreadComposer::new(self.cfg.compose.clone());
        let composition = composer.compose(
            &facts,
            &deltas,
            canonical_url.as_deref(),
            Some(lead.as_str()),
            media,
            session,
            rng,
        );

        // Draft-only compositions stop here, by construction.
        let preflight = PreflightGate::new(self.cfg.preflight.clone());
        let outcome = preflight.check(self.store.as_ref(), &facts, &composition, now).await?;
        if !outcome.passed() {
            summary.note_skip("PREFLIGHT");
            return Ok(());
        }

        // Transport + persistence.
        let thread_id = self.post_thread(&composition).await?;
        for tweet in &composition.tweets {
            self.store
                .insert_tweet(TweetRecord {
                    content: tweet.content.clone(),
                    thread_id: Some(thread_id.clone()),
                    vendor: facts.vendor.clone(),
                    product: facts.product.clone(),
                    version: facts.version.clone(),
                    posted_at: now,
                })
                .await?;
        }
        self.store
            .insert_event(EventRecord {
                vendor: facts.vendor.clone(),
                product: facts.product.clone(),
                kind: "release".into(),
                version: facts.version.clone(),
                window_start: cluster.window_start,
                window_end: cluster.window_end,
                description: title,
            })
            .await?;
        self.store.save_facts(facts).await?;

        summary.events_created += 1;
        summary.threads_posted += 1;
        counter!("radar_events_total").increment(1);
        counter!("radar_threads_posted_total").increment(1);
        Ok(())
    }

    /// Post segment 1, then the rest as replies. Returns the thread id.
    async fn post_thread(&self, composition: &ThreadComposition) -> Result<String> {
        let mut segments = composition.tweets.iter();
        let first = segments
            .next()
            .ok_or_else(|| anyhow::anyhow!("composition has no segments"))?;
        let thread_id = self
            .poster
            .post(&first.content, first.media.as_ref())
            .await
            .map_err(|e| anyhow::anyhow!("posting thread head: {e}"))?;

        let mut last_id = thread_id.clone();
        for seg in segments {
            last_id = self
                .poster
                .post_reply(&seg.content, &last_id)
                .await
                .map_err(|e| anyhow::anyhow!("posting reply {}: {e}", seg.order))?;
        }
        Ok(thread_id)
    }
}

/// Concatenated member bodies; feeds the safety text checks and the
/// plagiarism limiter.
fn lead_item_text(cluster: &CandidateCluster) -> String {
    let mut out = String::new();
    for item in &cluster.items {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&item.searchable_text());
    }
    out
}

/// Run the pipeline forever on a fixed interval.
pub async fn run_scheduler(pipeline: Arc<Pipeline>, sources: Vec<Box<dyn ItemSource>>) {
    let secs = pipeline.cfg.schedule.interval_secs.max(60);
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(secs));
    loop {
        ticker.tick().await;
        let summary = pipeline.run_once(&sources).await;
        tracing::debug!(?summary, "scheduled run finished");
    }
}
