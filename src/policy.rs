//! Stress level policy
//!
//! Maps a difficulty tier to a bug-count range and the tone descriptors used
//! when prompting the generator. This is the single source of "how many bugs"
//! for every downstream component.

use serde::{Deserialize, Serialize};

/// Difficulty tier for a stress round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StressLevel {
    Low,
    Medium,
    High,
}

impl Default for StressLevel {
    fn default() -> Self {
        StressLevel::Medium
    }
}

/// Per-level configuration: bug count bounds plus prompt tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelConfig {
    pub bug_count_min: usize,
    pub bug_count_max: usize,
    /// One-word subtlety label used in prompts and round summaries.
    pub subtlety: &'static str,
    /// Narrative guidance passed verbatim to the generator.
    pub narrative_guidance: &'static str,
}

impl StressLevel {
    /// Parse a level from untrusted input. Unknown or malformed values are
    /// coerced to `Medium` rather than rejected.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "low" | "easy" => StressLevel::Low,
            "high" | "hard" => StressLevel::High,
            _ => StressLevel::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StressLevel::Low => "low",
            StressLevel::Medium => "medium",
            StressLevel::High => "high",
        }
    }

    /// Closed configuration table. Invariant: `bug_count_min <= bug_count_max`
    /// and both are at least 1.
    pub fn config(&self) -> LevelConfig {
        match self {
            StressLevel::Low => LevelConfig {
                bug_count_min: 1,
                bug_count_max: 2,
                subtlety: "obvious",
                narrative_guidance: "The bugs should be straightforward to spot once the \
                     reported behavior is reproduced. Favor visible breakage over quiet \
                     corruption: wrong text, missing items, crashes on load.",
            },
            StressLevel::Medium => LevelConfig {
                bug_count_min: 2,
                bug_count_max: 3,
                subtlety: "moderately subtle",
                narrative_guidance: "The bugs should take some tracing to find. The code \
                     should still look reasonable at a glance; the defect only shows up \
                     when following a value through the logic.",
            },
            StressLevel::High => LevelConfig {
                bug_count_min: 3,
                bug_count_max: 5,
                subtlety: "subtle",
                narrative_guidance: "The bugs should be genuinely hard to localize. Hide \
                     each one behind plausible-looking code, and let the observable \
                     symptom appear far from the defect itself.",
            },
        }
    }

    /// Draw a bug count uniformly from the level's inclusive range.
    pub fn sample_bug_count(&self, rng: &mut fastrand::Rng) -> usize {
        let cfg = self.config();
        rng.usize(cfg.bug_count_min..=cfg.bug_count_max)
    }

    /// Resolve the target bug count for a round. An explicit override wins
    /// (when at least 1); otherwise the count is sampled from the range.
    pub fn resolve_bug_count(
        &self,
        override_count: Option<usize>,
        rng: &mut fastrand::Rng,
    ) -> usize {
        match override_count {
            Some(n) if n >= 1 => n,
            _ => self.sample_bug_count(rng),
        }
    }
}
