//! Judgment cache and confidence-weighted skip windows.
//!
//! Each conversation [`Scope`] has at most one cached judgment. A cached
//! judgment lets the worker skip the (expensive) decision call until either
//! its skip window elapses or a new message lands in the scope.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::conversation::Scope;

/// Outcome of a decision call for one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    /// Whether the agent should speak.
    pub should_respond: bool,
    /// Short explanation from the model.
    pub reason: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

impl Judgment {
    /// Judgment with `confidence` clamped into `[0, 1]`.
    pub fn new(should_respond: bool, reason: impl Into<String>, confidence: f64) -> Self {
        Self {
            should_respond,
            reason: reason.into(),
            confidence: clamp_confidence(confidence),
        }
    }
}

/// Clamp into `[0, 1]`; NaN reads as zero confidence.
pub fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// A memoized judgment for one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgmentCache {
    /// Channel of the judged scope.
    pub channel_id: String,
    /// Thread root of the judged scope, `None` for top level.
    pub thread_ts: Option<String>,
    /// Decision that was made.
    pub should_respond: bool,
    /// Confidence of the decision, in `[0, 1]`.
    pub confidence: f64,
    /// Model's explanation.
    pub reason: String,
    /// Newest message in the scope when the judgment was made.
    pub latest_message_ts: String,
    /// End of the skip window.
    pub next_check_at: DateTime<Utc>,
    /// When the row was first written.
    pub created_at: DateTime<Utc>,
    /// When the row was last rewritten.
    pub updated_at: DateTime<Utc>,
}

impl JudgmentCache {
    /// Cache row for a fresh judgment made at `now`.
    pub fn record(
        scope: &Scope,
        judgment: &Judgment,
        latest_message_ts: impl Into<String>,
        next_check_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            channel_id: scope.channel_id.clone(),
            thread_ts: scope.thread_ts.clone(),
            should_respond: judgment.should_respond,
            confidence: judgment.confidence,
            reason: judgment.reason.clone(),
            latest_message_ts: latest_message_ts.into(),
            next_check_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Scope the row is keyed by.
    pub fn scope(&self) -> Scope {
        Scope::new(self.channel_id.clone(), self.thread_ts.clone())
    }

    /// Whether the cached judgment still stands.
    ///
    /// True only while `now` is before `next_check_at` and no newer message
    /// has arrived in the scope. Any new message invalidates immediately.
    pub fn is_valid(&self, now: DateTime<Utc>, current_latest_message_ts: &str) -> bool {
        now < self.next_check_at && current_latest_message_ts == self.latest_message_ts
    }

    /// Whether the expiry sweep may delete this row.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.next_check_at < now
    }
}

/// One confidence tier of the skip policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkipThreshold {
    /// Lowest confidence this tier accepts.
    pub min_confidence: f64,
    /// Skip window granted by this tier.
    pub skip_seconds: u64,
}

impl SkipThreshold {
    /// Tier granting `skip_seconds` from `min_confidence` up.
    pub const fn new(min_confidence: f64, skip_seconds: u64) -> Self {
        Self {
            min_confidence,
            skip_seconds,
        }
    }
}

/// Maps decision confidence to how long a judgment is trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgmentSkipConfig {
    /// Tiers, conventionally listed highest confidence first.
    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<SkipThreshold>,
    /// Window used when no tier matches.
    #[serde(default = "default_skip_seconds")]
    pub default_skip_seconds: u64,
}

fn default_thresholds() -> Vec<SkipThreshold> {
    vec![
        SkipThreshold::new(0.9, 43_200),
        SkipThreshold::new(0.8, 10_800),
        SkipThreshold::new(0.7, 3_600),
        SkipThreshold::new(0.5, 1_800),
    ]
}

const fn default_skip_seconds() -> u64 {
    600
}

impl Default for JudgmentSkipConfig {
    fn default() -> Self {
        Self {
            thresholds: default_thresholds(),
            default_skip_seconds: default_skip_seconds(),
        }
    }
}

impl JudgmentSkipConfig {
    /// Policy with explicit tiers and fallback window.
    pub fn new(thresholds: Vec<SkipThreshold>, default_skip_seconds: u64) -> Self {
        Self {
            thresholds,
            default_skip_seconds,
        }
    }

    /// Skip window for a judgment of the given confidence.
    ///
    /// The highest tier whose `min_confidence` the confidence reaches wins,
    /// regardless of list order; ties go to the earlier entry. Falls back to
    /// `default_skip_seconds`.
    pub fn skip_seconds_for(&self, confidence: f64) -> u64 {
        let confidence = clamp_confidence(confidence);
        let mut best: Option<&SkipThreshold> = None;
        for threshold in &self.thresholds {
            if threshold.min_confidence > confidence {
                continue;
            }
            if best.map_or(true, |b| threshold.min_confidence > b.min_confidence) {
                best = Some(threshold);
            }
        }
        best.map_or(self.default_skip_seconds, |t| t.skip_seconds)
    }

    /// `now + skip_seconds_for(confidence)`, saturating at the end of year 9999.
    pub fn next_check_at(&self, now: DateTime<Utc>, confidence: f64) -> DateTime<Utc> {
        let latest = latest_check_at();
        let secs = i64::try_from(self.skip_seconds_for(confidence)).unwrap_or(i64::MAX);
        Duration::try_seconds(secs)
            .and_then(|delta| now.checked_add_signed(delta))
            .map_or(latest, |at| at.min(latest))
    }
}

/// Last instant with a four-digit year. Stored timestamps must keep sorting
/// as text, which RFC3339 only guarantees for years 0000-9999.
fn latest_check_at() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(9999, 12, 31)
        .and_then(|date| date.and_hms_opt(23, 59, 59))
        .map_or(DateTime::<Utc>::MAX_UTC, |naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_huge_skip_window_is_capped() {
        let config = JudgmentSkipConfig::new(vec![], u64::MAX);
        let at = config.next_check_at(Utc::now(), 0.5);
        assert_eq!(at, latest_check_at());
        assert!(at.to_rfc3339().starts_with("9999-12-31"));
    }

    fn cache_at(t: DateTime<Utc>) -> JudgmentCache {
        let judgment = Judgment::new(false, "quiet channel", 0.8);
        JudgmentCache::record(
            &Scope::top_level("C1"),
            &judgment,
            "100",
            t + Duration::seconds(600),
            t,
        )
    }

    #[test]
    fn test_valid_before_deadline_same_message() {
        let t = Utc::now();
        assert!(cache_at(t).is_valid(t + Duration::seconds(100), "100"));
    }

    #[test]
    fn test_invalid_after_deadline() {
        let t = Utc::now();
        assert!(!cache_at(t).is_valid(t + Duration::seconds(700), "100"));
    }

    #[test]
    fn test_new_message_invalidates_regardless_of_time() {
        let t = Utc::now();
        assert!(!cache_at(t).is_valid(t + Duration::seconds(100), "101"));
    }

    #[test]
    fn test_invalid_exactly_at_deadline() {
        let t = Utc::now();
        assert!(!cache_at(t).is_valid(t + Duration::seconds(600), "100"));
    }

    #[test]
    fn test_threshold_selection() {
        let config = JudgmentSkipConfig::new(
            vec![SkipThreshold::new(0.9, 43_200), SkipThreshold::new(0.7, 3_600)],
            600,
        );
        assert_eq!(config.skip_seconds_for(0.95), 43_200);
        assert_eq!(config.skip_seconds_for(0.8), 3_600);
        assert_eq!(config.skip_seconds_for(0.5), 600);
    }

    #[test]
    fn test_threshold_selection_unsorted_input() {
        let config = JudgmentSkipConfig::new(
            vec![SkipThreshold::new(0.7, 3_600), SkipThreshold::new(0.9, 43_200)],
            600,
        );
        assert_eq!(config.skip_seconds_for(0.95), 43_200);
        assert_eq!(config.skip_seconds_for(0.75), 3_600);
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let config = JudgmentSkipConfig::new(vec![SkipThreshold::new(0.7, 3_600)], 600);
        assert_eq!(config.skip_seconds_for(0.7), 3_600);
    }

    #[test]
    fn test_nan_confidence_uses_default() {
        let config = JudgmentSkipConfig::new(vec![SkipThreshold::new(0.1, 3_600)], 600);
        assert_eq!(config.skip_seconds_for(f64::NAN), 600);
    }

    #[test]
    fn test_next_check_at_adds_window() {
        let config = JudgmentSkipConfig::default();
        let now = Utc::now();
        assert_eq!(config.next_check_at(now, 0.95), now + Duration::seconds(43_200));
        assert_eq!(config.next_check_at(now, 0.1), now + Duration::seconds(600));
    }

    #[test]
    fn test_judgment_clamps_confidence() {
        assert_eq!(Judgment::new(true, "", 1.7).confidence, 1.0);
        assert_eq!(Judgment::new(true, "", -0.2).confidence, 0.0);
    }

    #[test]
    fn test_is_expired() {
        let t = Utc::now();
        let cache = cache_at(t);
        assert!(!cache.is_expired(t));
        assert!(cache.is_expired(t + Duration::seconds(601)));
    }
}
