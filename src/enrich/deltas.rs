//! Delta computation: what changed relative to the last known facts for the
//! same (vendor, product). With no prior state the answer is a templated
//! "new announcement". With prior state we ask the model for a comparison
//! and scan its free-text reply for category hints; the scan is knowingly
//! lossy, the `summary` field stays authoritative either way.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::enrich::facts::ExtractedFacts;
use crate::enrich::llm::SharedLlm;

/// Material differences vs. prior facts. Ephemeral, like the facts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComputedDeltas {
    /// Always present; the raw comparison text or the fallback template.
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub changes: Vec<String>,
}

impl ComputedDeltas {
    /// Fallback used when there is no prior state for the pair.
    pub fn new_announcement(facts: &ExtractedFacts) -> Self {
        Self {
            summary: format!("New announcement: {} {}", facts.vendor, facts.product),
            ..Self::default()
        }
    }
}

const SYSTEM_PROMPT: &str = "You compare two fact records about the same AI product \
and describe what materially changed. Answer in short plain-text lines, one \
difference per line. Mention context window, price, features and changes \
explicitly when they differ. If nothing material changed, say so in one line.";

pub struct DeltaComputer {
    llm: SharedLlm,
}

impl DeltaComputer {
    pub fn new(llm: SharedLlm) -> Self {
        Self { llm }
    }

    pub async fn compute(
        &self,
        current: &ExtractedFacts,
        prior: Option<&ExtractedFacts>,
    ) -> Result<ComputedDeltas> {
        let Some(prior) = prior else {
            return Ok(ComputedDeltas::new_announcement(current));
        };

        let user = format!(
            "PRIOR FACTS:\n{}\n\nCURRENT FACTS:\n{}\n",
            serde_json::to_string_pretty(prior).unwrap_or_default(),
            serde_json::to_string_pretty(current).unwrap_or_default(),
        );
        let raw = self
            .llm
            .prompt(SYSTEM_PROMPT, &user)
            .await
            .context("delta comparison llm call")?;
        Ok(categorize_lines(&raw))
    }
}

/// Best-effort line categorization of the free-text comparison.
/// Singular categories (context window, price) are last-match-wins;
/// features/changes accumulate. The full text becomes the summary.
pub fn categorize_lines(response: &str) -> ComputedDeltas {
    let mut deltas = ComputedDeltas {
        summary: response.trim().to_string(),
        ..ComputedDeltas::default()
    };

    for line in response.lines() {
        let line = line.trim().trim_start_matches(['-', '*', '•']).trim();
        if line.is_empty() {
            continue;
        }
        let lower = line.to_lowercase();

        if lower.contains("context window") || lower.contains("context length") {
            deltas.context_window = Some(line.to_string());
        } else if lower.contains("price") || lower.contains("pricing") || lower.contains("cost") {
            deltas.price = Some(line.to_string());
        } else if lower.contains("feature") || lower.contains("capability") {
            deltas.features.push(line.to_string());
        } else if lower.contains("change") || lower.contains("update") || lower.contains("now ") {
            deltas.changes.push(line.to_string());
        }
    }
    deltas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::llm::MockLlm;
    use std::sync::Arc;

    fn facts() -> ExtractedFacts {
        ExtractedFacts {
            vendor: "openai".into(),
            product: "gpt-4".into(),
            ..ExtractedFacts::default()
        }
    }

    #[tokio::test]
    async fn no_prior_yields_new_announcement_without_llm() {
        // DisabledLlm would error if called; MockLlm with no script does too.
        let dc = DeltaComputer::new(Arc::new(MockLlm::new(Vec::<String>::new())));
        let d = dc.compute(&facts(), None).await.unwrap();
        assert_eq!(d.summary, "New announcement: openai gpt-4");
        assert!(d.context_window.is_none());
        assert!(d.features.is_empty());
    }

    #[test]
    fn categorize_singular_last_match_wins() {
        let d = categorize_lines(
            "- Context window grew from 32k to 128k\n\
             - Price dropped to $5 per 1M tokens\n\
             - Context window note: 128k is the new default\n",
        );
        assert_eq!(
            d.context_window.as_deref(),
            Some("Context window note: 128k is the new default")
        );
        assert_eq!(d.price.as_deref(), Some("Price dropped to $5 per 1M tokens"));
    }

    #[test]
    fn categorize_accumulates_features_and_changes() {
        let d = categorize_lines(
            "New feature: vision input\nAnother feature: JSON mode\nChanged default temperature",
        );
        assert_eq!(d.features.len(), 2);
        assert_eq!(d.changes.len(), 1);
    }

    #[test]
    fn summary_is_always_the_full_text() {
        let text = "Nothing material changed.";
        let d = categorize_lines(text);
        assert_eq!(d.summary, text);
        assert!(d.price.is_none());
    }

    #[tokio::test]
    async fn with_prior_uses_llm_response() {
        let dc = DeltaComputer::new(Arc::new(MockLlm::fixed(
            "Price dropped to $3 per 1M tokens",
        )));
        let d = dc.compute(&facts(), Some(&facts())).await.unwrap();
        assert!(d.price.is_some());
        assert_eq!(d.summary, "Price dropped to $3 per 1M tokens");
    }
}
