//! Persona/quality filter: a deterministic post-processing chain applied to
//! every composed segment before it is considered final.
//!
//! Order is load-bearing: clickbait strip → claim softening → emoji cap →
//! plagiarism limit → hard truncation. Each step's output is the next
//! step's input; truncating before emoji-capping could cut an emoji
//! mid-sequence.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::ComposeConfig;

/// Sensational vocabulary that never survives to output.
const CLICKBAIT_TERMS: &[&str] = &[
    "shocking",
    "unbelievable",
    "mind-blowing",
    "jaw-dropping",
    "insane",
    "game-changer",
    "game-changing",
    "you won't believe",
    "will blow your mind",
    "must-see",
];

/// Absolute-claim vocabulary softened to "may".
const CLAIM_TERMS: &[&str] = &[
    "definitely",
    "100%",
    "always",
    "guaranteed to",
    "guaranteed",
    "proven to",
    "certainly",
    "without a doubt",
    "undeniably",
];

static RE_CLICKBAIT: Lazy<Regex> = Lazy::new(|| {
    let alts = CLICKBAIT_TERMS
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alts})\b")).expect("clickbait regex")
});

static RE_CLAIMS: Lazy<Regex> = Lazy::new(|| {
    let alts = CLAIM_TERMS
        .iter()
        .map(|t| {
            let esc = regex::escape(t);
            // \b does not sit after '%', so only word-final terms get one.
            if t.ends_with(|c: char| c.is_alphanumeric()) {
                format!(r"{esc}\b")
            } else {
                esc
            }
        })
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alts})")).expect("claims regex")
});

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("ws regex"));
static RE_NL: Lazy<Regex> = Lazy::new(|| Regex::new(r" ?\n ?").expect("nl regex"));

/// Collapse runs of spaces/tabs but keep line structure (bullet segments
/// are newline-separated).
fn collapse_ws(s: &str) -> String {
    let out = RE_WS.replace_all(s, " ");
    RE_NL.replace_all(&out, "\n").trim().to_string()
}

/// Strip clickbait vocabulary (word-boundary, case-insensitive).
pub fn strip_clickbait(s: &str) -> String {
    collapse_ws(&RE_CLICKBAIT.replace_all(s, ""))
}

/// Replace absolute/claim vocabulary with "may".
pub fn soften_claims(s: &str) -> String {
    collapse_ws(&RE_CLAIMS.replace_all(s, "may"))
}

/// Rough emoji test over the common pictographic blocks.
pub fn is_emoji(c: char) -> bool {
    matches!(u32::from(c),
        0x1F300..=0x1FAFF  // pictographs, transport, supplemental
        | 0x2600..=0x27BF  // misc symbols, dingbats
        | 0x2B00..=0x2BFF  // arrows incl. ⭐
        | 0x1F1E6..=0x1F1FF // regional indicators
    )
}

/// Keep at most 1 emoji: the first in character order; strip the rest
/// (and any orphaned variation selectors).
pub fn cap_emoji(s: &str) -> String {
    let mut kept_one = false;
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if is_emoji(c) {
            if kept_one {
                continue;
            }
            kept_one = true;
            out.push(c);
        } else if c == '\u{FE0F}' {
            // keep the selector only right after a kept emoji
            if out.chars().last().map(is_emoji).unwrap_or(false) {
                out.push(c);
            }
        } else {
            out.push(c);
        }
    }
    collapse_ws(&out)
}

/// Cap consecutive words copied verbatim (in order, contiguously) from
/// `source`. Past `max_run` words a break marker is inserted and the run
/// restarts.
pub fn limit_copy_run(text: &str, source: &str, max_run: usize) -> String {
    if max_run == 0 {
        return text.to_string();
    }
    let src_words: Vec<String> = source
        .split_whitespace()
        .map(|w| normalize_word(w))
        .collect();

    // Line structure is preserved; a line break already interrupts a run.
    text.lines()
        .map(|line| limit_copy_run_line(line, &src_words, max_run))
        .collect::<Vec<_>>()
        .join("\n")
}

fn limit_copy_run_line(text: &str, src_words: &[String], max_run: usize) -> String {
    let mut out: Vec<String> = Vec::new();
    // Indices in src_words where the current copied run currently ends.
    let mut run_ends: Vec<usize> = Vec::new();
    let mut run_len = 0usize;

    for word in text.split_whitespace() {
        let norm = normalize_word(word);

        let continued: Vec<usize> = run_ends
            .iter()
            .filter_map(|&e| {
                let next = e + 1;
                (next < src_words.len() && src_words[next] == norm).then_some(next)
            })
            .collect();

        if !continued.is_empty() {
            run_len += 1;
            run_ends = continued;
        } else {
            run_ends = src_words
                .iter()
                .enumerate()
                .filter_map(|(i, w)| (*w == norm).then_some(i))
                .collect();
            run_len = usize::from(!run_ends.is_empty());
        }

        if run_len > max_run {
            out.push("…".to_string());
            run_len = usize::from(!run_ends.is_empty());
            // restart matching from scratch for this word
            run_ends = src_words
                .iter()
                .enumerate()
                .filter_map(|(i, w)| (*w == norm).then_some(i))
                .collect();
        }
        out.push(word.to_string());
    }
    out.join(" ")
}

fn normalize_word(w: &str) -> String {
    w.trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// Final safety net: cut to `budget` chars preferring a sentence boundary,
/// else a word boundary, else a raw cut, always appending an ellipsis.
pub fn hard_truncate(s: &str, budget: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= budget {
        return s.to_string();
    }
    if budget == 0 {
        return String::new();
    }

    let window: String = chars[..budget.saturating_sub(1)].iter().collect();

    // Sentence boundary, but only if it keeps a reasonable amount of text.
    let min_keep = budget / 3;
    if let Some(idx) = window.rfind(['.', '!', '?']) {
        if window[..=idx].chars().count() >= min_keep {
            return format!("{}…", window[..=idx].trim_end());
        }
    }
    if let Some(idx) = window.rfind(' ') {
        if window[..idx].chars().count() >= min_keep {
            return format!("{}…", window[..idx].trim_end());
        }
    }
    format!("{}…", window.trim_end())
}

/// The full chain in its documented order. `source` enables the plagiarism
/// limiter; pass `None` for text with no source material behind it.
pub fn apply_quality_chain(text: &str, source: Option<&str>, cfg: &ComposeConfig) -> String {
    let out = strip_clickbait(text);
    let out = soften_claims(&out);
    let out = cap_emoji(&out);
    let out = match source {
        Some(src) => limit_copy_run(&out, src, cfg.max_copy_run),
        None => out,
    };
    hard_truncate(&out, cfg.max_output_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clickbait_terms_never_survive() {
        let out = strip_clickbait("This SHOCKING release is a game-changer for devs");
        let lower = out.to_lowercase();
        for term in CLICKBAIT_TERMS {
            assert!(!lower.contains(term), "{term} survived: {out}");
        }
        assert_eq!(out, "This release is a for devs");
    }

    #[test]
    fn claims_soften_to_may() {
        assert_eq!(
            soften_claims("It will definitely help and is proven to work 100%"),
            "It will may help and is may work may"
        );
    }

    #[test]
    fn emoji_capped_at_first() {
        let out = cap_emoji("Launch 🚀 is here 📈 finally ⚡");
        assert_eq!(out, "Launch 🚀 is here finally");
        assert_eq!(out.chars().filter(|c| is_emoji(*c)).count(), 1);
    }

    #[test]
    fn no_emoji_passes_through() {
        assert_eq!(cap_emoji("plain text"), "plain text");
    }

    #[test]
    fn copy_run_capped_at_threshold() {
        let source = "one two three four five six seven eight nine ten eleven twelve";
        let text = source; // verbatim copy, 12 words
        let out = limit_copy_run(text, source, 8);
        assert!(out.contains('…'), "break marker missing: {out}");

        // The marker interrupts copied runs: output between markers never
        // exceeds the cap.
        let mut run = 0usize;
        let mut max_between_markers = 0usize;
        for w in out.split_whitespace() {
            if w == "…" {
                run = 0;
            } else {
                run += 1;
                max_between_markers = max_between_markers.max(run);
            }
        }
        assert!(max_between_markers <= 8, "run {max_between_markers} in {out}");
    }

    #[test]
    fn original_text_is_untouched_by_copy_limiter() {
        let out = limit_copy_run(
            "a completely different sentence with fresh words",
            "the source talks about something else entirely here",
            8,
        );
        assert!(!out.contains('…'));
    }

    #[test]
    fn hard_truncate_prefers_sentence_boundary() {
        let s = "First sentence ends here. Second sentence is much longer and keeps going with more words than fit.";
        let out = hard_truncate(s, 40);
        assert_eq!(out, "First sentence ends here.…");
        assert!(out.chars().count() <= 40);
    }

    #[test]
    fn hard_truncate_falls_back_to_word_boundary() {
        let s = "wordswithoutboundary and then some more words that keep going on and on forever";
        let out = hard_truncate(s, 30);
        assert!(out.ends_with('…'));
        assert!(out.chars().count() <= 30);
    }

    #[test]
    fn short_text_not_truncated() {
        assert_eq!(hard_truncate("short", 280), "short");
    }

    #[test]
    fn full_chain_respects_output_budget() {
        let cfg = ComposeConfig::default();
        let long = "shocking ".repeat(100);
        let out = apply_quality_chain(&long, None, &cfg);
        assert!(out.chars().count() <= cfg.max_output_len);
        assert!(!out.to_lowercase().contains("shocking"));
    }
}
