//! # Safety Gate
//!
//! A short-circuiting sequence of checks run before composition. Checks are
//! ordered; the first failure wins and is returned as a typed `Skip`
//! outcome (these are not errors). Every skip is logged with its reason and
//! details for observability.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::config::SafetyConfig;
use crate::enrich::facts::ExtractedFacts;

/// Tagged reason for vetoing a candidate. Order of variants mirrors check
/// order in `SafetyGate::evaluate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    NoOfficialSource,
    EmptyFacts,
    OverDailyCap,
    DupEvent,
    RumorOnly,
    SpamDetected,
    OffensiveContent,
    ContentTooShort,
    InvalidUrl,
}

impl SkipReason {
    pub fn as_tag(&self) -> &'static str {
        match self {
            SkipReason::NoOfficialSource => "NO_OFFICIAL_SOURCE",
            SkipReason::EmptyFacts => "EMPTY_FACTS",
            SkipReason::OverDailyCap => "OVER_DAILY_CAP",
            SkipReason::DupEvent => "DUP_EVENT",
            SkipReason::RumorOnly => "RUMOR_ONLY",
            SkipReason::SpamDetected => "SPAM_DETECTED",
            SkipReason::OffensiveContent => "OFFENSIVE_CONTENT",
            SkipReason::ContentTooShort => "CONTENT_TOO_SHORT",
            SkipReason::InvalidUrl => "INVALID_URL",
        }
    }
}

/// A veto with human-readable details.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skip {
    pub reason: SkipReason,
    pub details: String,
}

/// Everything the gate looks at for one candidate. Daily counters are
/// caller-supplied; the gate tracks nothing itself.
pub struct SafetyInput<'a> {
    pub url: Option<&'a str>,
    pub title: &'a str,
    pub text: &'a str,
    pub facts: &'a ExtractedFacts,
    pub daily_post_count: u32,
    pub existing_titles: &'a [String],
}

// --- official-source allowlists ---

/// Domains whose pages count as an official source.
static OFFICIAL_DOMAINS: &[&str] = &[
    "openai.com",
    "anthropic.com",
    "blog.google",
    "deepmind.google",
    "ai.meta.com",
    "mistral.ai",
    "x.ai",
    "microsoft.com",
    "aws.amazon.com",
    "nvidia.com",
    "deepseek.com",
    "cohere.com",
    "stability.ai",
    "huggingface.co",
];

/// GitHub orgs whose release pages count as official.
static OFFICIAL_GITHUB_ORGS: &[&str] = &[
    "openai",
    "anthropics",
    "google",
    "google-deepmind",
    "meta-llama",
    "mistralai",
    "xai-org",
    "microsoft",
    "aws",
    "nvidia",
    "deepseek-ai",
    "cohere-ai",
    "stability-ai",
    "huggingface",
];

static RE_GH_RELEASES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/(?P<org>[^/]+)/[^/]+/releases(/tag/[^/]+)?/?$").expect("github releases regex")
});

/// Host is the allowlisted domain or one of its subdomains.
fn host_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{domain}"))
}

/// True for allowlisted vendor domains and official GitHub release URLs
/// (org must be allowlisted AND the path must be a /releases page).
pub fn is_official(url: &str) -> bool {
    let Ok(parsed) = reqwest::Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();

    if OFFICIAL_DOMAINS.iter().any(|d| host_matches(&host, d)) {
        return true;
    }

    if host_matches(&host, "github.com") {
        if let Some(caps) = RE_GH_RELEASES.captures(parsed.path()) {
            let org = caps.name("org").map(|m| m.as_str().to_ascii_lowercase());
            return org
                .map(|o| OFFICIAL_GITHUB_ORGS.contains(&o.as_str()))
                .unwrap_or(false);
        }
    }
    false
}

/// Fewer than 2 of {features, changes, prices, limits, version, date} are
/// non-empty. Each category counts at most once regardless of length.
pub fn has_empty_facts(f: &ExtractedFacts) -> bool {
    let mut filled = 0usize;
    filled += usize::from(!f.features.is_empty());
    filled += usize::from(!f.changes.is_empty());
    filled += usize::from(!f.prices.is_empty());
    filled += usize::from(!f.limits.is_empty());
    filled += usize::from(f.version.as_deref().is_some_and(|v| !v.trim().is_empty()));
    filled += usize::from(f.date.as_deref().is_some_and(|d| !d.trim().is_empty()));
    filled < 2
}

// --- vocabulary patterns ---

static RE_RUMOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(rumor|rumour|reportedly|allegedly|unconfirmed|leak(?:ed|s)?|speculat\w*|sources?\s+(say|said|claim)|might\s+(launch|release|announce)|is\s+said\s+to)\b",
    )
    .expect("rumor regex")
});

static RE_SPAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(buy\s+now|limited\s+time|click\s+here|act\s+now|subscribe\s+now|giveaway|promo\s+code|affiliate|discount\s+code|\d+%\s+off|best\s+deal)\b",
    )
    .expect("spam regex")
});

static RE_OFFENSIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(kill\s+yourself|slur|nazi|terrorist\s+manual|genocide\s+how\s?to)\b")
        .expect("offensive regex")
});

fn normalize_title(t: &str) -> String {
    t.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Exact (case/whitespace-normalized) or ≥0.98 Levenshtein-similar title.
fn is_duplicate_title(title: &str, existing: &[String]) -> Option<String> {
    let norm = normalize_title(title);
    for e in existing {
        let e_norm = normalize_title(e);
        if e_norm == norm || strsim::normalized_levenshtein(&e_norm, &norm) >= 0.98 {
            return Some(e.clone());
        }
    }
    None
}

pub struct SafetyGate {
    cfg: SafetyConfig,
}

impl SafetyGate {
    pub fn new(cfg: SafetyConfig) -> Self {
        Self { cfg }
    }

    /// Run the checks in order; first failure wins. `None` means proceed.
    pub fn evaluate(&self, input: &SafetyInput) -> Option<Skip> {
        let skip = self.first_failure(input);
        if let Some(ref s) = skip {
            tracing::info!(
                reason = s.reason.as_tag(),
                details = %s.details,
                vendor = %input.facts.vendor,
                product = %input.facts.product,
                title = %input.title,
                "safety gate skip"
            );
            metrics::counter!("radar_safety_skips_total", "reason" => s.reason.as_tag())
                .increment(1);
        }
        skip
    }

    fn first_failure(&self, input: &SafetyInput) -> Option<Skip> {
        // 1) NO_OFFICIAL_SOURCE
        if let Some(url) = input.url {
            if !is_official(url) {
                return Some(Skip {
                    reason: SkipReason::NoOfficialSource,
                    details: format!("url not on official allowlist: {url}"),
                });
            }
        }

        // 2) EMPTY_FACTS
        if has_empty_facts(input.facts) {
            return Some(Skip {
                reason: SkipReason::EmptyFacts,
                details: "fewer than 2 fact categories are filled".into(),
            });
        }

        // 3) OVER_DAILY_CAP
        if input.daily_post_count >= self.cfg.max_daily_posts {
            return Some(Skip {
                reason: SkipReason::OverDailyCap,
                details: format!(
                    "daily posts {} >= cap {}",
                    input.daily_post_count, self.cfg.max_daily_posts
                ),
            });
        }

        // 4) DUP_EVENT
        if let Some(dup) = is_duplicate_title(input.title, input.existing_titles) {
            return Some(Skip {
                reason: SkipReason::DupEvent,
                details: format!("title duplicates existing: {dup}"),
            });
        }

        // 5) RUMOR_ONLY
        if let Some(m) = RE_RUMOR.find(input.text) {
            return Some(Skip {
                reason: SkipReason::RumorOnly,
                details: format!("rumor language: {:?}", m.as_str()),
            });
        }

        // 6) SPAM_DETECTED
        if let Some(m) = RE_SPAM.find(input.text) {
            return Some(Skip {
                reason: SkipReason::SpamDetected,
                details: format!("spam language: {:?}", m.as_str()),
            });
        }

        // 7) OFFENSIVE_CONTENT
        if RE_OFFENSIVE.is_match(input.text) {
            return Some(Skip {
                reason: SkipReason::OffensiveContent,
                details: "offensive vocabulary match".into(),
            });
        }

        // 8) CONTENT_TOO_SHORT
        let len = input.text.chars().count();
        if len < self.cfg.min_content_len {
            return Some(Skip {
                reason: SkipReason::ContentTooShort,
                details: format!("text length {len} < {}", self.cfg.min_content_len),
            });
        }

        // 9) INVALID_URL
        if let Some(url) = input.url {
            if reqwest::Url::parse(url).is_err() {
                return Some(Skip {
                    reason: SkipReason::InvalidUrl,
                    details: format!("unparseable url: {url}"),
                });
            }
        }

        None
    }
}
