// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod classify;
pub mod cluster;
pub mod compose;
pub mod config;
pub mod enrich;
pub mod ingest;
pub mod pipeline;
pub mod preflight;
pub mod recognize;
pub mod safety;
pub mod store;
pub mod transport;

// ---- Re-exports for stable public API ----
pub use crate::cluster::{CandidateCluster, ClusterEngine};
pub use crate::compose::style::CompositionSession;
pub use crate::compose::{ThreadComposer, ThreadComposition};
pub use crate::config::RadarConfig;
pub use crate::enrich::{ComputedDeltas, DeltaComputer, ExtractedFacts, FactExtractor};
pub use crate::ingest::types::{Item, ItemSource, Source};
pub use crate::pipeline::{Pipeline, RunSummary};
pub use crate::preflight::{PreflightGate, PreflightOutcome};
pub use crate::safety::{SafetyGate, Skip, SkipReason};
pub use crate::store::{MemoryStore, Store};
pub use crate::transport::{LogPoster, Poster, RetryingPoster};
