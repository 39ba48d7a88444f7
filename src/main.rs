//! AI Release Radar — binary entrypoint.
//! Runs the detect → enrich → compose → gate pipeline on a timer against
//! whatever sources the host wires in. With no real sources or credentials
//! configured it is a dry run: the LLM falls back to disabled and the
//! poster only logs.

use std::sync::Arc;

use ai_release_radar::compose::media::OgImageFetcher;
use ai_release_radar::enrich::llm::build_llm_from_env;
use ai_release_radar::ingest::types::ItemSource;
use ai_release_radar::pipeline::{run_scheduler, Pipeline};
use ai_release_radar::store::MemoryStore;
use ai_release_radar::transport::{LogPoster, RetryingPoster};
use ai_release_radar::RadarConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op elsewhere.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = RadarConfig::from_env();
    tracing::info!(?cfg, "radar starting");

    let store = Arc::new(MemoryStore::new());
    let llm = build_llm_from_env();
    let poster = Arc::new(RetryingPoster::new(LogPoster));

    let pipeline = Arc::new(
        Pipeline::new(cfg, store, llm, poster)
            .with_media_fetcher(Arc::new(OgImageFetcher::new())),
    );

    // Source wiring is host-specific; the library only consumes the trait.
    let sources: Vec<Box<dyn ItemSource>> = Vec::new();
    if sources.is_empty() {
        tracing::warn!("no item sources configured; runs will be empty");
    }

    run_scheduler(pipeline, sources).await;
    Ok(())
}
