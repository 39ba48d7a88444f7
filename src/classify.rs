//! # Release Classifier
//!
//! Pattern-based predicate answering "does this text describe a
//! release/update/announcement?". A single category hit is sufficient.
//! The patterns are broad on purpose (high recall, low precision);
//! clustering and confidence scoring downstream compensate.

use once_cell::sync::Lazy;
use regex::Regex;

struct Category {
    name: &'static str,
    re: Regex,
}

static CATEGORIES: Lazy<Vec<Category>> = Lazy::new(|| {
    let mk = |name: &'static str, pat: &str| Category {
        name,
        re: Regex::new(pat).expect("release classifier regex"),
    };
    vec![
        mk(
            "release_verb",
            r"(?i)\b(launch(?:es|ed|ing)?|releas(?:es|ed|ing)|introduc(?:es|ed|ing)|announc(?:es|ed|ing)|unveil(?:s|ed|ing)?|debut(?:s|ed)?|ship(?:s|ped|ping)?|roll(?:s|ed|ing)?\s+out)\b",
        ),
        mk(
            "version_number",
            r"(?i)\bv?\d+\.\d+(\.\d+)?\b|\b(version|release)\s+\d+\b",
        ),
        mk(
            "availability",
            r"(?i)\b(now\s+available|generally\s+available|general\s+availability|available\s+(now|today|to)|public\s+(beta|preview)|early\s+access|available)\b",
        ),
        mk(
            "time_proximate",
            r"(?i)\b(today|this\s+week|starting\s+(today|now)|just\s+(launched|released|announced|shipped))\b",
        ),
    ]
});

/// True iff any category matches. Pure predicate, no partial scores.
pub fn is_release_like(text: &str) -> bool {
    CATEGORIES.iter().any(|c| c.re.is_match(text))
}

/// Names of the categories that matched, for skip-log details and debugging.
pub fn matched_categories(text: &str) -> Vec<&'static str> {
    CATEGORIES
        .iter()
        .filter(|c| c.re.is_match(text))
        .map(|c| c.name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn introduces_counts_as_release() {
        assert!(is_release_like(
            "OpenAI Introduces GPT-4 Turbo with Enhanced Capabilities"
        ));
    }

    #[test]
    fn bare_version_number_counts() {
        assert!(is_release_like("Llama 3.1 is here"));
        assert!(is_release_like("announcing version 2 of the API"));
    }

    #[test]
    fn available_alone_qualifies_high_recall() {
        assert!(is_release_like("The model is available in the EU"));
    }

    #[test]
    fn unrelated_text_does_not_match() {
        assert!(!is_release_like("An interview about the history of chess"));
        assert!(!is_release_like("Why transformers work: a survey"));
    }

    #[test]
    fn matched_categories_names_hits() {
        let cats = matched_categories("Claude 3.5 launched today");
        assert!(cats.contains(&"release_verb"));
        assert!(cats.contains(&"version_number"));
        assert!(cats.contains(&"time_proximate"));
    }
}
