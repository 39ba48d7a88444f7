//! # Thread Composer
//!
//! Turns facts + deltas into 1–5 length-bounded segments: an opener segment
//! with one prioritized highlight, up to two bullet segments, and a closing
//! segment pointing at the best link. Every segment passes through the
//! quality filter chain and respects the per-segment budget.
//!
//! A composition with no citations is flagged `draft_only` and must never
//! reach the transport, however good it looks otherwise.

pub mod filter;
pub mod media;
pub mod style;

use rand::Rng;
use serde::Serialize;

use crate::config::ComposeConfig;
use crate::enrich::deltas::ComputedDeltas;
use crate::enrich::facts::ExtractedFacts;
use crate::safety::is_official;
use media::MediaPreview;
use style::{CompositionSession, Voice};

/// One publishable segment of a thread.
#[derive(Debug, Clone, Serialize)]
pub struct TweetSegment {
    pub content: String,
    pub order: usize,
    /// Character count of `content`; always ≤ the configured segment budget.
    pub length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaPreview>,
}

/// The publishable artifact.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadComposition {
    pub tweets: Vec<TweetSegment>,
    pub total_length: usize,
    /// True iff the facts carried no citations; draft-only threads never post.
    pub draft_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,
    pub summary: String,
}

pub struct ThreadComposer {
    cfg: ComposeConfig,
}

impl ThreadComposer {
    pub fn new(cfg: ComposeConfig) -> Self {
        Self { cfg }
    }

    /// Compose a thread. `source_text` (the cluster's raw material) feeds
    /// the plagiarism limiter; `session` carries the last-opener state for
    /// this batch; `rng` drives the style choices.
    pub fn compose<R: Rng + ?Sized>(
        &self,
        facts: &ExtractedFacts,
        deltas: &ComputedDeltas,
        canonical_url: Option<&str>,
        source_text: Option<&str>,
        media: Option<MediaPreview>,
        session: &mut CompositionSession,
        rng: &mut R,
    ) -> ThreadComposition {
        let limit = self.cfg.max_segment_len;
        let voice = style::pick_voice(rng);

        let mut contents: Vec<String> = Vec::new();
        contents.push(self.opening_segment(facts, deltas, voice, session, rng));
        contents.extend(self.bullet_segments(facts, deltas));
        if let Some(closing) = self.closing_segment(facts, canonical_url, voice, rng) {
            contents.push(closing);
        }
        contents.truncate(5);

        let mut tweets: Vec<TweetSegment> = Vec::new();
        for (order, raw) in contents.into_iter().enumerate() {
            let mut content = filter::apply_quality_chain(&raw, source_text, &self.cfg);
            if content.chars().count() > limit {
                content = filter::hard_truncate(&content, limit);
            }
            let media = if order == 0 { media.clone() } else { None };
            tweets.push(TweetSegment {
                length: content.chars().count(),
                content,
                order,
                media,
            });
        }

        let total_length = tweets.iter().map(|t| t.length).sum();
        let summary = facts
            .summary
            .clone()
            .or_else(|| facts.title.clone())
            .unwrap_or_else(|| format!("{} {} update", facts.vendor, facts.product));

        ThreadComposition {
            draft_only: facts.citations.is_empty(),
            canonical_url: canonical_url.map(str::to_string),
            total_length,
            tweets,
            summary,
        }
    }

    /// T1: opener + product + one highlight (+ date), styled. Falls back to
    /// a bare announcement when the styled line blows the budget.
    fn opening_segment<R: Rng + ?Sized>(
        &self,
        facts: &ExtractedFacts,
        deltas: &ComputedDeltas,
        voice: Voice,
        session: &mut CompositionSession,
        rng: &mut R,
    ) -> String {
        let limit = self.cfg.max_segment_len;
        let highlight = pick_highlight(facts, deltas);
        let opener = style::pick_opener(session, voice, rng);

        let mut line = format!("{opener} {}: {highlight}", display_name(facts));
        if let Some(date) = facts.date.as_deref().and_then(style::format_date) {
            line.push_str(&format!(" ({date})"));
        }
        line = style::apply_benchmark_disclaimer(&line);
        line = style::maybe_emoji(&line, self.cfg.emoji_chance, limit, rng);

        if line.chars().count() > limit {
            let bare = format!("{}: {highlight}", display_name(facts));
            filter::hard_truncate(&bare, limit)
        } else {
            line
        }
    }

    /// Middle segments: up to `max_bullets` bullets, delta-sourced first,
    /// chunked `bullets_per_segment` per segment. Oversized segments are
    /// dropped whole rather than truncated mid-bullet.
    fn bullet_segments(&self, facts: &ExtractedFacts, deltas: &ComputedDeltas) -> Vec<String> {
        let mut bullets: Vec<String> = Vec::new();
        let mut push = |s: &str| {
            let b = render_bullet(s);
            if !b.is_empty() && !bullets.contains(&b) {
                bullets.push(b);
            }
        };

        // Delta-sourced bullets outrank raw-fact bullets.
        if let Some(cw) = deltas.context_window.as_deref() {
            push(cw);
        }
        if let Some(p) = deltas.price.as_deref() {
            push(p);
        }
        for f in &deltas.features {
            push(f);
        }
        for c in &deltas.changes {
            push(c);
        }
        for f in &facts.features {
            push(f);
        }
        for c in &facts.changes {
            push(c);
        }
        for p in &facts.prices {
            push(p);
        }
        for l in &facts.limits {
            push(l);
        }
        bullets.truncate(self.cfg.max_bullets);

        bullets
            .chunks(self.cfg.bullets_per_segment.max(1))
            .map(|chunk| chunk.join("\n"))
            .filter(|seg| seg.chars().count() <= self.cfg.max_segment_len)
            .collect()
    }

    /// Final segment: Details pointer + optional closer + best link, only if
    /// it fits. The prose part is budgeted at segment length minus the link
    /// reserve, so a closer can never crowd the link out.
    fn closing_segment<R: Rng + ?Sized>(
        &self,
        facts: &ExtractedFacts,
        canonical_url: Option<&str>,
        voice: Voice,
        rng: &mut R,
    ) -> Option<String> {
        let link = best_link(canonical_url, &facts.citations)?;
        let prose_budget = self
            .cfg
            .max_segment_len
            .saturating_sub(self.cfg.url_reserve);
        let prose = style::maybe_closer("Details:", voice, self.cfg.closer_chance, prose_budget, rng);
        let line = format!("{prose} {link}");
        (line.chars().count() <= self.cfg.max_segment_len).then_some(line)
    }
}

fn display_name(facts: &ExtractedFacts) -> String {
    match facts.version.as_deref() {
        Some(v) if !v.trim().is_empty() => format!("{} {v}", facts.product),
        _ => facts.product.clone(),
    }
}

/// Highlight priority: delta context window → first feature → delta price →
/// first price → first delta change → first change → version → generic.
fn pick_highlight(facts: &ExtractedFacts, deltas: &ComputedDeltas) -> String {
    deltas
        .context_window
        .clone()
        .or_else(|| facts.features.first().cloned())
        .or_else(|| deltas.price.clone())
        .or_else(|| facts.prices.first().cloned())
        .or_else(|| deltas.changes.first().cloned())
        .or_else(|| facts.changes.first().cloned())
        .or_else(|| {
            facts
                .version
                .as_deref()
                .map(|v| format!("version {v} is out"))
        })
        .unwrap_or_else(|| "new capabilities".to_string())
}

/// Normalize any existing bullet/dash prefix and add our marker.
fn render_bullet(s: &str) -> String {
    let trimmed = s
        .trim()
        .trim_start_matches(['-', '*', '•', '–'])
        .trim_start();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("• {trimmed}")
    }
}

/// Fixed preference order: vendor domain > GitHub > blog > other media.
fn best_link(canonical_url: Option<&str>, citations: &[String]) -> Option<String> {
    let mut candidates: Vec<&str> = Vec::new();
    if let Some(u) = canonical_url {
        candidates.push(u);
    }
    candidates.extend(citations.iter().map(String::as_str));
    if candidates.is_empty() {
        return None;
    }

    let rank = |u: &str| -> u8 {
        let host = reqwest::Url::parse(u)
            .ok()
            .and_then(|p| p.host_str().map(|h| h.to_ascii_lowercase()))
            .unwrap_or_default();
        if host.contains("github.com") {
            1
        } else if is_official(u) {
            0
        } else if host.contains("blog") || u.contains("/blog") {
            2
        } else {
            3
        }
    };

    candidates
        .into_iter()
        .min_by_key(|u| rank(u))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn facts() -> ExtractedFacts {
        ExtractedFacts {
            vendor: "openai".into(),
            product: "gpt-4".into(),
            version: Some("turbo".into()),
            features: vec!["128k context window".into(), "vision input".into()],
            changes: vec!["- lower latency".into()],
            prices: vec!["$10/1M input tokens".into()],
            date: Some("2024-06-01".into()),
            citations: vec!["https://openai.com/blog/gpt-4-turbo".into()],
            ..ExtractedFacts::default()
        }
    }

    fn compose_once(f: &ExtractedFacts, seed: u64) -> ThreadComposition {
        let composer = ThreadComposer::new(ComposeConfig::default());
        let mut session = CompositionSession::new();
        let mut rng = StdRng::seed_from_u64(seed);
        composer.compose(
            f,
            &ComputedDeltas::new_announcement(f),
            Some("https://openai.com/blog/gpt-4-turbo"),
            None,
            None,
            &mut session,
            &mut rng,
        )
    }

    #[test]
    fn segments_respect_length_budget() {
        for seed in 0..20 {
            let t = compose_once(&facts(), seed);
            assert!(!t.tweets.is_empty() && t.tweets.len() <= 5);
            for tw in &t.tweets {
                assert!(tw.length <= 270, "segment {} over budget: {}", tw.order, tw.length);
                assert_eq!(tw.length, tw.content.chars().count());
            }
        }
    }

    #[test]
    fn draft_only_iff_citations_empty() {
        let mut f = facts();
        assert!(!compose_once(&f, 1).draft_only);
        f.citations.clear();
        assert!(compose_once(&f, 1).draft_only);
    }

    #[test]
    fn same_seed_is_reproducible() {
        let a = compose_once(&facts(), 42);
        let b = compose_once(&facts(), 42);
        let la: Vec<usize> = a.tweets.iter().map(|t| t.length).collect();
        let lb: Vec<usize> = b.tweets.iter().map(|t| t.length).collect();
        assert_eq!(la, lb);
    }

    #[test]
    fn bullet_prefixes_are_normalized() {
        let t = compose_once(&facts(), 3);
        let bullets: Vec<&str> = t
            .tweets
            .iter()
            .flat_map(|tw| tw.content.lines())
            .filter(|l| l.starts_with('•'))
            .collect();
        assert!(!bullets.is_empty());
        assert!(bullets.iter().all(|b| b.starts_with("• ")));
        assert!(!bullets.iter().any(|b| b.contains("• -")));
    }

    #[test]
    fn highlight_priority_prefers_delta_context_window() {
        let f = facts();
        let mut d = ComputedDeltas::new_announcement(&f);
        d.context_window = Some("context window doubled to 256k".into());
        assert_eq!(pick_highlight(&f, &d), "context window doubled to 256k");

        let d2 = ComputedDeltas::new_announcement(&f);
        assert_eq!(pick_highlight(&f, &d2), "128k context window");
    }

    #[test]
    fn highlight_falls_back_to_version_then_generic() {
        let mut f = ExtractedFacts {
            vendor: "openai".into(),
            product: "gpt-4".into(),
            version: Some("4.1".into()),
            ..ExtractedFacts::default()
        };
        let d = ComputedDeltas::default();
        assert_eq!(pick_highlight(&f, &d), "version 4.1 is out");
        f.version = None;
        assert_eq!(pick_highlight(&f, &d), "new capabilities");
    }

    #[test]
    fn best_link_prefers_vendor_domain_over_github_and_blog() {
        let citations = vec![
            "https://medium.com/some/post".to_string(),
            "https://github.com/openai/gpt/releases/tag/v1".to_string(),
            "https://openai.com/blog/x".to_string(),
        ];
        assert_eq!(
            best_link(None, &citations).as_deref(),
            Some("https://openai.com/blog/x")
        );
        let gh_only = vec![
            "https://randomsite.com/a".to_string(),
            "https://github.com/openai/gpt/releases".to_string(),
        ];
        assert_eq!(
            best_link(None, &gh_only).as_deref(),
            Some("https://github.com/openai/gpt/releases")
        );
    }

    #[test]
    fn closing_link_is_never_crowded_out_by_the_closer() {
        // Tight segment budget with a large reserve: the closer must stay
        // out and the link must end the segment intact.
        let cfg = ComposeConfig {
            max_segment_len: 60,
            url_reserve: 40,
            closer_chance: 1.0,
            ..ComposeConfig::default()
        };
        let composer = ThreadComposer::new(cfg);
        let f = facts();
        for seed in 0..16 {
            let mut session = CompositionSession::new();
            let mut rng = StdRng::seed_from_u64(seed);
            let t = composer.compose(
                &f,
                &ComputedDeltas::new_announcement(&f),
                Some("https://openai.com/blog/gpt-4-turbo"),
                None,
                None,
                &mut session,
                &mut rng,
            );
            let closing = t
                .tweets
                .iter()
                .find(|tw| tw.content.contains("Details:"))
                .expect("closing segment present");
            assert!(
                closing.content.ends_with("https://openai.com/blog/gpt-4-turbo"),
                "seed {seed}: {}",
                closing.content
            );
        }
    }

    #[test]
    fn media_attaches_to_first_segment_only() {
        let composer = ThreadComposer::new(ComposeConfig::default());
        let mut session = CompositionSession::new();
        let mut rng = StdRng::seed_from_u64(9);
        let f = facts();
        let t = composer.compose(
            &f,
            &ComputedDeltas::new_announcement(&f),
            None,
            None,
            Some(MediaPreview {
                url: "https://cdn.test/a.png".into(),
                alt: None,
                width: None,
                height: None,
            }),
            &mut session,
            &mut rng,
        );
        assert!(t.tweets[0].media.is_some());
        assert!(t.tweets.iter().skip(1).all(|tw| tw.media.is_none()));
    }
}
