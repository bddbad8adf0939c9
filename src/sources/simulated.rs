// src/sources/simulated.rs
//! Last-resort heuristic price source.
//!
//! Derives a plausible price from brand and instrument-type keywords against
//! fixed base ranges, with bounded jitter for market variance. Always
//! produces an observation; availability is the whole point. Fusion weighs
//! it down (and usually excludes it) via its `Simulated` kind.

use anyhow::Result;
use chrono::Utc;
use once_cell::sync::OnceCell;
use rand::Rng;
use regex::Regex;

use crate::observation::{Observation, SourceFamily, SourceKind};
use crate::sources::SourceAdapter;

const PREMIUM_BRANDS: [&str; 5] = ["gibson", "fender", "prs", "martin", "taylor"];

fn brand_of(query: &str) -> Option<&'static str> {
    static RE_BRAND: OnceCell<Regex> = OnceCell::new();
    let re = RE_BRAND.get_or_init(|| {
        Regex::new(
            r"(?i)\b(gibson|fender|martin|taylor|prs|gretsch|ibanez|epiphone|roland|boss)\b",
        )
        .expect("static regex")
    });
    re.captures(query).map(|c| {
        // Canonical lowercase form for comparisons.
        match c[1].to_ascii_lowercase().as_str() {
            "gibson" => "gibson",
            "fender" => "fender",
            "martin" => "martin",
            "taylor" => "taylor",
            "prs" => "prs",
            "gretsch" => "gretsch",
            "ibanez" => "ibanez",
            "epiphone" => "epiphone",
            "roland" => "roland",
            _ => "boss",
        }
    })
}

fn contains_any(q: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| q.contains(n))
}

/// Base price range for a query, before jitter: (low, high, matched_type).
fn base_range(query: &str, brand: Option<&str>) -> (f64, f64, bool) {
    let q = query.to_lowercase();
    let premium = brand.map(|b| PREMIUM_BRANDS.contains(&b)).unwrap_or(false);

    if contains_any(&q, &["guitar", "strat", "les paul", "telecaster", "sg"]) {
        if premium {
            (800.0, 3000.0, true)
        } else {
            (300.0, 1200.0, true)
        }
    } else if q.contains("bass") {
        if matches!(brand, Some("fender") | Some("gibson")) {
            (700.0, 2500.0, true)
        } else {
            (400.0, 1000.0, true)
        }
    } else if contains_any(&q, &["amp", "amplifier"]) {
        (300.0, 1500.0, true)
    } else if contains_any(&q, &["pedal", "effect", "delay", "reverb", "overdrive"]) {
        (80.0, 300.0, true)
    } else {
        (200.0, 800.0, false)
    }
}

pub struct SimulatedAdapter {
    family: SourceFamily,
}

impl SimulatedAdapter {
    pub fn new(family: SourceFamily) -> Self {
        Self { family }
    }

    fn family_bias(&self) -> (f64, f64) {
        match self.family {
            // Auction-style sold prices skew below marketplace asks.
            SourceFamily::Ebay => (0.85, 0.95),
            SourceFamily::Reverb => (1.0, 1.0),
        }
    }

    pub fn estimate(&self, query: &str) -> Observation {
        let brand = brand_of(query);
        let (low, high, type_matched) = base_range(query, brand);

        let mut rng = rand::rng();
        let base = rng.random_range(low..high);
        let jitter = rng.random_range(0.9..1.1);
        let (bias_low, bias_high) = self.family_bias();
        let bias = if bias_low < bias_high {
            rng.random_range(bias_low..bias_high)
        } else {
            bias_low
        };
        let price = (base * jitter * bias).round();

        // 40 floor; +15 when the brand is recognized, +15 when the gear type is.
        let confidence = 40 + if brand.is_some() { 15 } else { 0 } + if type_matched { 15 } else { 0 };

        Observation {
            family: self.family,
            kind: SourceKind::Simulated,
            price,
            stats: None,
            heuristic_confidence: Some(confidence),
            captured_at: Utc::now(),
        }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for SimulatedAdapter {
    async fn fetch(&self, query: &str) -> Result<Option<Observation>> {
        let obs = self.estimate(query);
        tracing::debug!(
            %query,
            family = self.family.as_str(),
            price = obs.price,
            "simulated price estimate"
        );
        Ok(Some(obs))
    }

    fn family(&self) -> SourceFamily {
        self.family
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Simulated
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}
