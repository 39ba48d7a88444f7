// src/enrich/mod.rs
// LLM-backed enrichment: fact extraction and delta computation.
pub mod deltas;
pub mod facts;
pub mod llm;

pub use deltas::{ComputedDeltas, DeltaComputer};
pub use facts::{ExtractedFacts, FactExtractor};
pub use llm::{build_llm_from_env, LlmClient, SharedLlm};
