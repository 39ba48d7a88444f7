//! # Vendor/Product Recognizer
//!
//! Maps freeform text to a canonical `(vendor, product)` pair via ordered
//! alias tables. Matching is case-insensitive substring containment and
//! deliberately first-match-wins in table order, not longest-match: when a
//! text mentions two vendors, declaration order decides. Pure and idempotent.

use once_cell::sync::Lazy;

/// Ordered priority table: canonical name → surface forms.
/// Earlier entries win ties.
type AliasTable = Vec<(&'static str, Vec<&'static str>)>;

static VENDOR_ALIASES: Lazy<AliasTable> = Lazy::new(|| {
    vec![
        ("openai", vec!["openai", "open ai"]),
        ("anthropic", vec!["anthropic"]),
        ("google", vec!["google deepmind", "deepmind", "google"]),
        ("meta", vec!["meta ai", "meta"]),
        ("mistral", vec!["mistral ai", "mistral"]),
        ("xai", vec!["xai", "x.ai"]),
        ("microsoft", vec!["microsoft"]),
        ("amazon", vec!["amazon", "aws"]),
        ("nvidia", vec!["nvidia"]),
        ("deepseek", vec!["deepseek"]),
        ("cohere", vec!["cohere"]),
        ("stability", vec!["stability ai", "stabilityai"]),
        ("huggingface", vec!["hugging face", "huggingface"]),
    ]
});

static PRODUCT_ALIASES: Lazy<AliasTable> = Lazy::new(|| {
    vec![
        ("gpt-4", vec!["gpt-4", "gpt4", "gpt 4"]),
        ("gpt-5", vec!["gpt-5", "gpt5", "gpt 5"]),
        ("o1", vec!["o1-preview", "o1-mini", " o1"]),
        ("chatgpt", vec!["chatgpt", "chat gpt"]),
        ("sora", vec!["sora"]),
        ("dall-e", vec!["dall-e", "dalle", "dall e"]),
        ("whisper", vec!["whisper"]),
        ("claude", vec!["claude"]),
        ("gemini", vec!["gemini"]),
        ("gemma", vec!["gemma"]),
        ("llama", vec!["llama"]),
        ("mixtral", vec!["mixtral"]),
        ("mistral-large", vec!["mistral large"]),
        ("grok", vec!["grok"]),
        ("copilot", vec!["copilot"]),
        ("phi", vec!["phi-3", "phi-4", " phi "]),
        ("titan", vec!["amazon titan", "titan model"]),
        ("stable-diffusion", vec!["stable diffusion", "sdxl"]),
        ("command", vec!["command r", "command-r"]),
        ("deepseek-v3", vec!["deepseek-v3", "deepseek v3"]),
        ("deepseek-r1", vec!["deepseek-r1", "deepseek r1"]),
    ]
});

/// A resolved canonical pair; either side may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recognition {
    pub vendor: Option<String>,
    pub product: Option<String>,
}

fn first_match(text_lower: &str, table: &AliasTable) -> Option<String> {
    for (canonical, aliases) in table.iter() {
        if aliases.iter().any(|a| text_lower.contains(a)) {
            return Some((*canonical).to_string());
        }
    }
    None
}

/// Recognize the first matching vendor and product in `text`.
pub fn recognize(text: &str) -> Recognition {
    let lower = text.to_lowercase();
    Recognition {
        vendor: first_match(&lower, &VENDOR_ALIASES),
        product: first_match(&lower, &PRODUCT_ALIASES),
    }
}

/// Canonical vendors, exposed for allowlist construction elsewhere.
pub fn known_vendors() -> Vec<&'static str> {
    VENDOR_ALIASES.iter().map(|(v, _)| *v).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_vendor_and_product_case_insensitive() {
        let r = recognize("OpenAI Introduces GPT-4 Turbo with Enhanced Capabilities");
        assert_eq!(r.vendor.as_deref(), Some("openai"));
        assert_eq!(r.product.as_deref(), Some("gpt-4"));
    }

    #[test]
    fn no_match_leaves_both_unset() {
        let r = recognize("Local bakery wins award for sourdough");
        assert_eq!(r, Recognition::default());
    }

    #[test]
    fn first_match_wins_table_order_not_longest() {
        // Mentions both Google and Meta; Google is declared earlier.
        let r = recognize("Meta responds to Google Gemini launch");
        assert_eq!(r.vendor.as_deref(), Some("google"));
        assert_eq!(r.product.as_deref(), Some("gemini"));
    }

    #[test]
    fn idempotent_on_same_input() {
        let a = recognize("Anthropic releases Claude 3.5");
        let b = recognize("Anthropic releases Claude 3.5");
        assert_eq!(a, b);
    }
}
