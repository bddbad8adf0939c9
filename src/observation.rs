// src/observation.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// External provenance of price data (a marketplace).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFamily {
    Reverb,
    Ebay,
}

impl SourceFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFamily::Reverb => "reverb",
            SourceFamily::Ebay => "ebay",
        }
    }
}

/// How a price was obtained within a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    StructuredApi,
    Scraped,
    Simulated,
}

impl SourceKind {
    /// Suffix used in the `source_type` labels persisted to the cache
    /// (e.g. "reverb_api", "ebay_scraped", "reverb_simulation").
    pub fn label_suffix(&self) -> &'static str {
        match self {
            SourceKind::StructuredApi => "api",
            SourceKind::Scraped => "scraped",
            SourceKind::Simulated => "simulation",
        }
    }
}

/// Fixed condition vocabulary for listings. Free-form marketplace condition
/// text is folded into one of these via keyword matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Condition {
    New,
    OpenBox,
    LikeNew,
    VeryGood,
    Good,
    Fair,
    PoorForParts,
    Refurbished,
    Used,
    Unknown,
}

impl Condition {
    /// Normalize marketplace condition text. Unknown phrasing defaults to `Used`,
    /// matching how sold-listing pages describe the bulk of their inventory.
    pub fn from_text(text: &str) -> Self {
        let t = text.trim().to_ascii_lowercase();
        if t.is_empty() {
            return Condition::Unknown;
        }
        if t.contains("open box") || t.contains("open-box") {
            Condition::OpenBox
        } else if t.contains("like new") || t.contains("mint") {
            Condition::LikeNew
        } else if t.contains("brand new") || t == "new" || t.starts_with("new ") {
            Condition::New
        } else if t.contains("very good") {
            Condition::VeryGood
        } else if t.contains("refurbish") {
            Condition::Refurbished
        } else if t.contains("for parts") || t.contains("not working") || t.contains("poor") {
            Condition::PoorForParts
        } else if t.contains("good") {
            Condition::Good
        } else if t.contains("fair") {
            Condition::Fair
        } else {
            Condition::Used
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::New => "New",
            Condition::OpenBox => "Open Box",
            Condition::LikeNew => "Like New",
            Condition::VeryGood => "Very Good",
            Condition::Good => "Good",
            Condition::Fair => "Fair",
            Condition::PoorForParts => "Poor/For Parts",
            Condition::Refurbished => "Refurbished",
            Condition::Used => "Used",
            Condition::Unknown => "Unknown",
        }
    }
}

/// One listing extracted from a search result (API row or scraped cell).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub title: String,
    pub price: f64,
    pub condition: Condition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Price distribution over a set of listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceStats {
    pub average: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub count: u32,
    /// Condition label -> number of listings.
    #[serde(default)]
    pub condition_counts: BTreeMap<String, u32>,
}

impl PriceStats {
    /// Compute stats over listings with positive prices. `None` when nothing usable.
    pub fn from_listings(listings: &[Listing]) -> Option<Self> {
        let mut prices: Vec<f64> = listings
            .iter()
            .map(|l| l.price)
            .filter(|p| p.is_finite() && *p > 0.0)
            .collect();
        if prices.is_empty() {
            return None;
        }
        prices.sort_by(|a, b| a.partial_cmp(b).expect("finite prices"));

        let mut condition_counts = BTreeMap::new();
        for l in listings {
            *condition_counts
                .entry(l.condition.as_str().to_string())
                .or_insert(0) += 1;
        }

        let count = prices.len() as u32;
        let sum: f64 = prices.iter().sum();
        Some(PriceStats {
            average: sum / prices.len() as f64,
            median: median_of_sorted(&prices),
            min: prices[0],
            max: prices[prices.len() - 1],
            count,
            condition_counts,
        })
    }
}

/// Median of an ascending-sorted, non-empty slice: middle element for odd
/// length, mean of the two middle elements for even length.
pub fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    debug_assert!(n > 0);
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// One source's answer for a query. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub family: SourceFamily,
    pub kind: SourceKind,
    /// Primary price for this source (the stats average when stats exist).
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<PriceStats>,
    /// Base confidence hint set by heuristic adapters; real sources leave it unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heuristic_confidence: Option<u8>,
    pub captured_at: DateTime<Utc>,
}

impl Observation {
    pub fn from_stats(family: SourceFamily, kind: SourceKind, stats: PriceStats) -> Self {
        Self {
            family,
            kind,
            price: stats.average,
            stats: Some(stats),
            heuristic_confidence: None,
            captured_at: Utc::now(),
        }
    }

    /// Label persisted as `source_type`, e.g. "reverb_api" or "ebay_scraped".
    pub fn source_type(&self) -> String {
        format!("{}_{}", self.family.as_str(), self.kind.label_suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(price: f64, cond: Condition) -> Listing {
        Listing {
            title: "x".into(),
            price,
            condition: cond,
            url: None,
        }
    }

    #[test]
    fn median_odd_takes_middle() {
        assert_eq!(median_of_sorted(&[700.0, 750.0, 800.0, 820.0, 900.0]), 800.0);
    }

    #[test]
    fn median_even_averages_middle_pair() {
        assert_eq!(median_of_sorted(&[100.0, 200.0, 300.0, 400.0]), 250.0);
        assert_eq!(median_of_sorted(&[100.0, 200.0]), 150.0);
    }

    #[test]
    fn stats_skip_non_positive_prices() {
        let stats = PriceStats::from_listings(&[
            listing(0.0, Condition::Used),
            listing(-5.0, Condition::Used),
            listing(100.0, Condition::Good),
        ])
        .unwrap();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.average, 100.0);
        assert_eq!(stats.min, 100.0);
        assert_eq!(stats.max, 100.0);
    }

    #[test]
    fn stats_none_on_zero_usable() {
        assert!(PriceStats::from_listings(&[listing(0.0, Condition::Used)]).is_none());
        assert!(PriceStats::from_listings(&[]).is_none());
    }

    #[test]
    fn condition_keyword_matching() {
        assert_eq!(Condition::from_text("Brand New"), Condition::New);
        assert_eq!(Condition::from_text("Open box"), Condition::OpenBox);
        assert_eq!(Condition::from_text("Like New"), Condition::LikeNew);
        assert_eq!(Condition::from_text("Very Good - tested"), Condition::VeryGood);
        assert_eq!(Condition::from_text("Seller refurbished"), Condition::Refurbished);
        assert_eq!(Condition::from_text("For parts or not working"), Condition::PoorForParts);
        assert_eq!(Condition::from_text("Pre-Owned"), Condition::Used);
        assert_eq!(Condition::from_text("gently played"), Condition::Used);
        assert_eq!(Condition::from_text(""), Condition::Unknown);
    }

    #[test]
    fn source_type_labels() {
        let obs = Observation::from_stats(
            SourceFamily::Ebay,
            SourceKind::Scraped,
            PriceStats::from_listings(&[listing(10.0, Condition::Used)]).unwrap(),
        );
        assert_eq!(obs.source_type(), "ebay_scraped");
    }
}
