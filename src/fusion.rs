// src/fusion.rs
//! Fusion & confidence model: merges per-family observations into one
//! consensus price with a 0-100 confidence level.
//!
//! Base confidence follows the source kind (structured API > scrape >
//! simulated); every additional folded observation adds up to 10 points,
//! capped at 100. Simulated prices are filler, not peers: they are averaged
//! in only while real observations are scarce.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::observation::{Observation, SourceKind};

/// Tunable fusion behavior. Inferred-from-source rules live here rather than
/// as constants so callers can tighten or relax them.
#[derive(Debug, Clone, Copy)]
pub struct FusionPolicy {
    /// Simulated prices participate in the average only while fewer real
    /// (non-simulated) observations than this exist.
    pub simulated_fill_threshold: usize,
}

impl Default for FusionPolicy {
    fn default() -> Self {
        Self {
            simulated_fill_threshold: 2,
        }
    }
}

/// The fused answer for one query. This is what the consensus cache persists
/// and what the deal scorer consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub average_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    /// 0-100.
    pub confidence_level: u8,
    /// source_type label -> price that entered the average.
    #[serde(default)]
    pub sources: BTreeMap<String, f64>,
    /// Winning primary source, e.g. "reverb_api", or "no_data".
    pub source_type: String,
    /// Number of observations folded into the average.
    pub count: u32,
    pub captured_at: DateTime<Utc>,
}

impl ConsensusResult {
    /// Terminal result when every family came up empty. Downstream scoring
    /// always has a value to compare against; zero confidence flags it.
    pub fn no_data() -> Self {
        Self {
            average_price: 0.0,
            median_price: None,
            min_price: None,
            max_price: None,
            confidence_level: 0,
            sources: BTreeMap::new(),
            source_type: "no_data".to_string(),
            count: 0,
            captured_at: Utc::now(),
        }
    }
}

fn base_confidence(obs: &Observation) -> u8 {
    match obs.kind {
        SourceKind::StructuredApi => 90,
        SourceKind::Scraped => {
            // 70 scaled upward with listing count, capped at 85.
            let listings = obs.stats.as_ref().map(|s| s.count).unwrap_or(0) as u64;
            (70 + listings.min(15)) as u8
        }
        SourceKind::Simulated => obs.heuristic_confidence.unwrap_or(40).clamp(40, 70),
    }
}

/// Kind preference for the reported primary: first structured API across
/// families, else first scrape, else simulated.
fn primary<'a>(observations: &'a [Observation]) -> Option<&'a Observation> {
    for kind in [
        SourceKind::StructuredApi,
        SourceKind::Scraped,
        SourceKind::Simulated,
    ] {
        if let Some(obs) = observations.iter().find(|o| o.kind == kind) {
            return Some(obs);
        }
    }
    None
}

/// Fuse zero or more per-family observations. Never returns "nothing" — an
/// empty input yields the zero-confidence `no_data` result.
pub fn fuse(observations: &[Observation], policy: FusionPolicy) -> ConsensusResult {
    let Some(primary_obs) = primary(observations) else {
        return ConsensusResult::no_data();
    };

    let real_count = observations
        .iter()
        .filter(|o| o.kind != SourceKind::Simulated)
        .count();
    let include_simulated = real_count < policy.simulated_fill_threshold;

    let folded: Vec<&Observation> = observations
        .iter()
        .filter(|o| o.kind != SourceKind::Simulated || include_simulated)
        .collect();

    let mut sources = BTreeMap::new();
    for obs in &folded {
        sources.insert(obs.source_type(), obs.price);
    }
    let average_price = folded.iter().map(|o| o.price).sum::<f64>() / folded.len() as f64;

    let extra = (folded.len().saturating_sub(1) as u64) * 10;
    let confidence_level = (base_confidence(primary_obs) as u64 + extra).min(100) as u8;

    let stats = primary_obs.stats.as_ref();
    ConsensusResult {
        average_price,
        median_price: stats.map(|s| s.median),
        min_price: stats.map(|s| s.min),
        max_price: stats.map(|s| s.max),
        confidence_level,
        sources,
        source_type: primary_obs.source_type(),
        count: folded.len() as u32,
        captured_at: Utc::now(),
    }
}
