//! # Configuration
//!
//! Explicit typed config with defaults resolved at construction time.
//! Loaded from TOML (path via `RADAR_CONFIG_PATH`, default
//! `config/radar.toml`); missing file or parse error falls back to defaults
//! with a warning, so the pipeline always has a complete config to run with.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::Path};

pub const DEFAULT_CONFIG_PATH: &str = "config/radar.toml";
pub const ENV_CONFIG_PATH: &str = "RADAR_CONFIG_PATH";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RadarConfig {
    pub cluster: ClusterConfig,
    pub safety: SafetyConfig,
    pub compose: ComposeConfig,
    pub preflight: PreflightConfig,
    pub schedule: ScheduleConfig,
}

/// Clustering engine knobs: time-window and title-similarity grouping.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Max gap between consecutive members of one time-cluster.
    pub window_hours: i64,
    /// Seed-similarity threshold for absorbing an item into a sub-cluster.
    pub similarity_threshold: f64,
    /// "Recent" horizon used by the confidence score.
    pub recency_hours: i64,
    /// How far back the pipeline pulls items for clustering.
    pub lookback_hours: i64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            window_hours: 36,
            similarity_threshold: 0.4,
            recency_hours: 24,
            lookback_hours: 48,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Minimum body length before a candidate is worth posting about.
    pub min_content_len: usize,
    pub max_daily_posts: u32,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            min_content_len: 100,
            max_daily_posts: 8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ComposeConfig {
    /// Per-segment character budget.
    pub max_segment_len: usize,
    /// Absolute output budget for the hard-truncation safety net.
    pub max_output_len: usize,
    /// Characters of the closing segment reserved for the link; prose
    /// (label + closer) is budgeted at `max_segment_len - url_reserve`.
    pub url_reserve: usize,
    /// Bullet budget across all middle segments.
    pub max_bullets: usize,
    pub bullets_per_segment: usize,
    /// Max consecutive words copied verbatim from source material.
    pub max_copy_run: usize,
    /// Probability of appending a closer / inserting a single emoji.
    pub closer_chance: f64,
    pub emoji_chance: f64,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            max_segment_len: 270,
            max_output_len: 280,
            url_reserve: 30,
            max_bullets: 4,
            bullets_per_segment: 2,
            max_copy_run: 8,
            closer_chance: 0.5,
            emoji_chance: 0.3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreflightConfig {
    /// Window for the duplicate (vendor, product[, version]) check.
    pub dup_window_hours: i64,
    pub max_daily_posts: u32,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            dup_window_hours: 48,
            max_daily_posts: 8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30 * 60,
        }
    }
}

impl RadarConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing radar config TOML")
    }

    /// Load from a TOML file; any failure falls back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(path.as_ref()) {
            Ok(s) => match Self::from_toml_str(&s) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(error = ?e, path = %path.as_ref().display(), "bad config, using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Resolve path from env, then load-or-default.
    pub fn from_env() -> Self {
        let path = std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::load_or_default(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_knobs() {
        let cfg = RadarConfig::default();
        assert_eq!(cfg.cluster.window_hours, 36);
        assert!((cfg.cluster.similarity_threshold - 0.4).abs() < 1e-9);
        assert_eq!(cfg.compose.max_segment_len, 270);
        assert_eq!(cfg.compose.max_copy_run, 8);
        assert_eq!(cfg.preflight.dup_window_hours, 48);
        assert_eq!(cfg.safety.min_content_len, 100);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let cfg = RadarConfig::from_toml_str(
            r#"
            [cluster]
            window_hours = 12

            [compose]
            max_segment_len = 240
            "#,
        )
        .unwrap();
        assert_eq!(cfg.cluster.window_hours, 12);
        assert!((cfg.cluster.similarity_threshold - 0.4).abs() < 1e-9);
        assert_eq!(cfg.compose.max_segment_len, 240);
        assert_eq!(cfg.compose.max_output_len, 280);
    }

    #[test]
    fn bad_toml_falls_back_to_defaults() {
        let cfg = RadarConfig::load_or_default("definitely/not/here.toml");
        assert_eq!(cfg.compose.max_segment_len, 270);
    }
}
