//! Fact extraction: one structured LLM request per cluster, followed by a
//! strict parse-then-validate step. The model is never trusted blindly;
//! in particular, citations it returns are post-filtered against the
//! cluster's own URLs.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::cluster::CandidateCluster;
use crate::enrich::llm::SharedLlm;

/// Verifiable claims for one (vendor, product) event.
/// Invariant: `citations` ⊆ the cluster's member URLs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFacts {
    pub vendor: String,
    pub product: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub changes: Vec<String>,
    #[serde(default)]
    pub prices: Vec<String>,
    #[serde(default)]
    pub limits: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub citations: Vec<String>,
}

const SYSTEM_PROMPT: &str = "You extract verifiable facts about AI product releases. \
Respond with a single JSON object and nothing else, using keys: vendor, product, \
version, title, summary, features, changes, prices, limits, date, citations. \
Omit any key you cannot verify from the provided text. Arrays hold short plain \
strings. citations may only contain URLs from the provided cluster URL list. \
Never invent facts.";

/// How many member texts feed one extraction request.
const MAX_SOURCE_TEXTS: usize = 2;
/// Per-source slice fed into the prompt.
const MAX_CHARS_PER_SOURCE: usize = 4000;

pub struct FactExtractor {
    llm: SharedLlm,
}

impl FactExtractor {
    pub fn new(llm: SharedLlm) -> Self {
        Self { llm }
    }

    /// Extract facts for one cluster. Fails when no member has any text or
    /// when the model output does not validate.
    pub async fn extract(&self, cluster: &CandidateCluster) -> Result<ExtractedFacts> {
        let user = build_user_prompt(cluster)?;
        let raw = self
            .llm
            .prompt(SYSTEM_PROMPT, &user)
            .await
            .context("fact extraction llm call")?;
        parse_facts(&raw, &cluster.member_urls())
    }
}

/// Select the 2 longest member texts and concatenate with per-source labels.
fn build_user_prompt(cluster: &CandidateCluster) -> Result<String> {
    let mut with_text: Vec<_> = cluster
        .items
        .iter()
        .filter(|it| !it.body().is_empty())
        .collect();
    if with_text.is_empty() {
        bail!(
            "no member of cluster {}/{} has non-empty text",
            cluster.vendor,
            cluster.product
        );
    }
    with_text.sort_by_key(|it| std::cmp::Reverse(it.body().chars().count()));
    with_text.truncate(MAX_SOURCE_TEXTS);

    let mut prompt = format!(
        "Vendor: {}\nProduct: {}\n\nCluster URLs:\n",
        cluster.vendor, cluster.product
    );
    for url in cluster.member_urls() {
        prompt.push_str("- ");
        prompt.push_str(&url);
        prompt.push('\n');
    }
    prompt.push_str("\nSources:\n");
    for it in with_text {
        let body: String = it.body().chars().take(MAX_CHARS_PER_SOURCE).collect();
        prompt.push_str(&format!("[{}] {}\n{}\n\n", it.url, it.title, body));
    }
    Ok(prompt)
}

/// Strict parse-then-validate of a model response.
///
/// Vendor and product are mandatory; arrays default to empty; citations are
/// post-filtered to `allowed_urls` regardless of what the model claims.
pub fn parse_facts(raw: &str, allowed_urls: &[String]) -> Result<ExtractedFacts> {
    let json = strip_code_fences(raw);
    let mut facts: ExtractedFacts =
        serde_json::from_str(json.trim()).context("fact record is not valid JSON")?;

    if facts.vendor.trim().is_empty() {
        bail!("fact record is missing vendor");
    }
    if facts.product.trim().is_empty() {
        bail!("fact record is missing product");
    }

    let allowed: HashSet<&str> = allowed_urls.iter().map(String::as_str).collect();
    let before = facts.citations.len();
    facts.citations.retain(|c| allowed.contains(c.as_str()));
    let dropped = before - facts.citations.len();
    if dropped > 0 {
        tracing::warn!(
            vendor = %facts.vendor,
            product = %facts.product,
            dropped,
            "dropped hallucinated citations"
        );
    }
    Ok(facts)
}

/// Models often wrap JSON in ``` fences; tolerate that one quirk.
fn strip_code_fences(raw: &str) -> &str {
    let t = raw.trim();
    let t = t
        .strip_prefix("```json")
        .or_else(|| t.strip_prefix("```"))
        .unwrap_or(t);
    t.strip_suffix("```").unwrap_or(t)
}
