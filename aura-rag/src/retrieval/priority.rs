//! Recency, authority and quality weighting of retrieved sources.

use super::ScoredChunk;
use crate::config::PriorityConfig;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Age at which recency reaches zero.
const RECENCY_HORIZON_DAYS: f64 = 365.0;

/// Authority used for categories missing from the table.
pub const DEFAULT_AUTHORITY: f64 = 0.5;

/// Authority of a document category. Matching ignores case and surrounding space.
pub fn authority_score(category: Option<&str>) -> f64 {
    let Some(category) = category else {
        return DEFAULT_AUTHORITY;
    };
    match category.trim().to_ascii_lowercase().as_str() {
        "research" => 0.9,
        "patent" | "publication" => 0.8,
        "project" => 0.7,
        "proposal" => 0.6,
        "test" => 0.5,
        _ => DEFAULT_AUTHORITY,
    }
}

/// Parse a stored creation timestamp.
///
/// Accepts RFC 3339 (with `Z` or an offset), naive date-times with a `T` or
/// space separator (taken as UTC), and bare dates.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Scores and orders chunks by a weighted recency/authority/quality composite.
#[derive(Debug, Clone, Default)]
pub struct SourcePrioritizer {
    weights: PriorityConfig,
}

impl SourcePrioritizer {
    pub fn new(weights: PriorityConfig) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &PriorityConfig {
        &self.weights
    }

    /// Attach `priority_score` to every chunk and sort descending by it.
    pub fn prioritize(&self, chunks: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
        self.prioritize_at(chunks, Utc::now())
    }

    /// [`prioritize`](Self::prioritize) against a fixed clock.
    pub fn prioritize_at(&self, mut chunks: Vec<ScoredChunk>, now: DateTime<Utc>) -> Vec<ScoredChunk> {
        for chunk in &mut chunks {
            chunk.priority_score = Some(self.priority(chunk, now));
        }
        chunks.sort_by(|a, b| sort_key(b.priority_score).total_cmp(&sort_key(a.priority_score)));
        chunks
    }

    fn priority(&self, chunk: &ScoredChunk, now: DateTime<Utc>) -> f64 {
        let w = &self.weights;
        w.recency_weight * recency_score(chunk.record.created_at.as_deref(), now)
            + w.authority_weight * authority_score(chunk.record.category.as_deref())
            + w.quality_weight * chunk.quality()
    }
}

fn sort_key(score: Option<f64>) -> f64 {
    score.filter(|s| !s.is_nan()).unwrap_or(f64::NEG_INFINITY)
}

/// Linear decay from 1.0 (created now or later) to 0.0 at one year.
///
/// Missing and unparseable timestamps both count as stale.
pub fn recency_score(created_at: Option<&str>, now: DateTime<Utc>) -> f64 {
    let Some(created) = created_at.and_then(parse_timestamp) else {
        return 0.0;
    };
    let days_old = (now - created).num_days().max(0) as f64;
    (1.0 - days_old / RECENCY_HORIZON_DAYS).max(0.0)
}
