//! Voice layer: opener/closer pools, per-batch session state, and the
//! probabilistic style touches (closer, single emoji, disclaimer).
//!
//! The previously-used opener lives in an explicit `CompositionSession`
//! passed by the caller, never in process-wide state; independent sessions
//! can compose concurrently. All randomness comes through the caller's
//! `Rng`, so tests can force branches with a seeded generator.

use rand::Rng;

/// Writing voice; each voice has its own opener/closer pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Voice {
    Analyst,
    Enthusiast,
}

const ANALYST_OPENERS: &[&str] = &[
    "Worth noting:",
    "New from",
    "Quietly shipped:",
    "On the radar:",
    "Fresh release:",
];

const ENTHUSIAST_OPENERS: &[&str] = &[
    "Big one:",
    "Just landed:",
    "Heads up:",
    "Hot off the press:",
    "Here we go:",
];

const ANALYST_CLOSERS: &[&str] = &[
    "More as it develops.",
    "Full notes linked below.",
    "Judge the benchmarks yourself.",
];

const ENTHUSIAST_CLOSERS: &[&str] = &[
    "Worth a look.",
    "Thread ends here, docs don't.",
    "Go kick the tires.",
];

const EMOJI_POOL: &[&str] = &["🚀", "🧠", "📈", "🔍", "⚡"];

/// Per-batch mutable state. Reset at the start of each pipeline run so the
/// opener choice never bleeds across runs. Single-writer within one batch.
#[derive(Debug, Default)]
pub struct CompositionSession {
    last_opener: Option<String>,
}

impl CompositionSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the previous opener; call at the start of each batch.
    pub fn reset(&mut self) {
        self.last_opener = None;
    }
}

pub fn pick_voice<R: Rng + ?Sized>(rng: &mut R) -> Voice {
    if rng.random_bool(0.5) {
        Voice::Analyst
    } else {
        Voice::Enthusiast
    }
}

fn opener_pool(voice: Voice) -> &'static [&'static str] {
    match voice {
        Voice::Analyst => ANALYST_OPENERS,
        Voice::Enthusiast => ENTHUSIAST_OPENERS,
    }
}

fn closer_pool(voice: Voice) -> &'static [&'static str] {
    match voice {
        Voice::Analyst => ANALYST_CLOSERS,
        Voice::Enthusiast => ENTHUSIAST_CLOSERS,
    }
}

/// Pick an opener from the voice pool, avoiding the immediately-previous one.
pub fn pick_opener<R: Rng + ?Sized>(
    session: &mut CompositionSession,
    voice: Voice,
    rng: &mut R,
) -> String {
    let pool = opener_pool(voice);
    let mut pick = pool[rng.random_range(0..pool.len())];
    if let Some(last) = session.last_opener.as_deref() {
        if pick == last && pool.len() > 1 {
            let idx = pool.iter().position(|o| *o == pick).unwrap_or(0);
            pick = pool[(idx + 1) % pool.len()];
        }
    }
    session.last_opener = Some(pick.to_string());
    pick.to_string()
}

/// Probabilistically append a closer, only if the result still fits.
pub fn maybe_closer<R: Rng + ?Sized>(
    text: &str,
    voice: Voice,
    chance: f64,
    budget: usize,
    rng: &mut R,
) -> String {
    if !rng.random_bool(chance.clamp(0.0, 1.0)) {
        return text.to_string();
    }
    let pool = closer_pool(voice);
    let closer = pool[rng.random_range(0..pool.len())];
    let candidate = format!("{text} {closer}");
    if candidate.chars().count() <= budget {
        candidate
    } else {
        text.to_string()
    }
}

/// Probabilistically append one emoji, only if the result still fits.
pub fn maybe_emoji<R: Rng + ?Sized>(
    text: &str,
    chance: f64,
    budget: usize,
    rng: &mut R,
) -> String {
    if !rng.random_bool(chance.clamp(0.0, 1.0)) {
        return text.to_string();
    }
    let emoji = EMOJI_POOL[rng.random_range(0..EMOJI_POOL.len())];
    let candidate = format!("{text} {emoji}");
    if candidate.chars().count() <= budget {
        candidate
    } else {
        text.to_string()
    }
}

/// Vendor benchmark claims get a provenance disclaimer.
pub fn apply_benchmark_disclaimer(text: &str) -> String {
    let lower = text.to_lowercase();
    let mentions_benchmark = lower.contains("benchmark")
        || lower.contains("state of the art")
        || lower.contains("state-of-the-art")
        || lower.contains("sota")
        || lower.contains("outperforms");
    if mentions_benchmark && !lower.contains("vendor-reported") {
        format!("{text} (vendor-reported)")
    } else {
        text.to_string()
    }
}

/// Render an ISO date ("2024-06-01") as a short suffix ("Jun 1").
pub fn format_date(date: &str) -> Option<String> {
    let d = chrono::NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
    Some(d.format("%b %-d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn opener_never_repeats_previous() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut session = CompositionSession::new();
        let mut prev = pick_opener(&mut session, Voice::Analyst, &mut rng);
        for _ in 0..50 {
            let next = pick_opener(&mut session, Voice::Analyst, &mut rng);
            assert_ne!(next, prev);
            prev = next;
        }
    }

    #[test]
    fn session_reset_clears_memory() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut session = CompositionSession::new();
        let _ = pick_opener(&mut session, Voice::Analyst, &mut rng);
        session.reset();
        assert!(session.last_opener.is_none());
    }

    #[test]
    fn closer_respects_budget() {
        let mut rng = StdRng::seed_from_u64(2);
        // chance 1.0 forces the branch; budget too small → unchanged
        let out = maybe_closer("0123456789", Voice::Analyst, 1.0, 12, &mut rng);
        assert_eq!(out, "0123456789");
        let out = maybe_closer("short", Voice::Analyst, 1.0, 200, &mut rng);
        assert!(out.len() > "short".len());
    }

    #[test]
    fn emoji_chance_zero_is_a_noop() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(maybe_emoji("text", 0.0, 280, &mut rng), "text");
    }

    #[test]
    fn benchmark_claims_get_disclaimer_once() {
        let once = apply_benchmark_disclaimer("Tops every benchmark");
        assert!(once.ends_with("(vendor-reported)"));
        let twice = apply_benchmark_disclaimer(&once);
        assert_eq!(once, twice);
        assert_eq!(apply_benchmark_disclaimer("plain text"), "plain text");
    }

    #[test]
    fn date_formats_short() {
        assert_eq!(format_date("2024-06-01").as_deref(), Some("Jun 1"));
        assert_eq!(format_date("not a date"), None);
    }
}
