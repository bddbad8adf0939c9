// src/scorer.rs
//! Deal scoring: classify a reference price (e.g. a starting bid) against a
//! consensus price.
//!
//! Two formulas coexist in the wild — a ratio against the consensus with
//! fixed thresholds, and a savings-percentage bucketed into named tiers —
//! so both ship as independently selectable strategies.

use serde::{Deserialize, Serialize};

use crate::fusion::ConsensusResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStrategy {
    /// `reference / consensus`, lower is better; 0.85 / 1.15 default cutoffs.
    Ratio,
    /// `(consensus - reference) / consensus * 100`, bucketed at 60/50/30/15/0.
    SavingsPercent,
}

/// Enumerated rating. The first three belong to the ratio strategy; the tier
/// names to the savings-percentage strategy. `Overpriced` is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealCategory {
    GoodDeal,
    FairPrice,
    Overpriced,
    ExceptionalDeal,
    GreatDeal,
    FairDeal,
    SlightDeal,
    NotADeal,
}

impl DealCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DealCategory::GoodDeal => "good_deal",
            DealCategory::FairPrice => "fair_price",
            DealCategory::Overpriced => "overpriced",
            DealCategory::ExceptionalDeal => "exceptional_deal",
            DealCategory::GreatDeal => "great_deal",
            DealCategory::FairDeal => "fair_deal",
            DealCategory::SlightDeal => "slight_deal",
            DealCategory::NotADeal => "not_a_deal",
        }
    }
}

/// Outcome of scoring one reference price against one consensus result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealAssessment {
    pub strategy: DealStrategy,
    pub reference_price: f64,
    pub consensus_price: f64,
    /// Ratio for [`DealStrategy::Ratio`]; percent savings for
    /// [`DealStrategy::SavingsPercent`].
    pub deal_score: f64,
    pub category: DealCategory,
    /// Carried from the consensus result.
    pub confidence_level: u8,
}

#[derive(Debug, Clone, Copy)]
pub struct DealScorer {
    pub deal_threshold: f64,
    pub overpriced_threshold: f64,
    pub auction_discount: f64,
}

impl Default for DealScorer {
    fn default() -> Self {
        Self {
            deal_threshold: 0.85,
            overpriced_threshold: 1.15,
            auction_discount: 0.85,
        }
    }
}

impl From<&crate::config::EngineConfig> for DealScorer {
    fn from(cfg: &crate::config::EngineConfig) -> Self {
        Self {
            deal_threshold: cfg.deal_threshold,
            overpriced_threshold: cfg.overpriced_threshold,
            auction_discount: cfg.auction_discount,
        }
    }
}

impl DealScorer {
    pub fn assess(
        &self,
        strategy: DealStrategy,
        reference_price: f64,
        consensus: &ConsensusResult,
    ) -> DealAssessment {
        let consensus_price = consensus.average_price;
        let (deal_score, category) = match strategy {
            DealStrategy::Ratio => self.ratio(reference_price, consensus_price),
            DealStrategy::SavingsPercent => savings_percent(reference_price, consensus_price),
        };
        DealAssessment {
            strategy,
            reference_price,
            consensus_price,
            deal_score,
            category,
            confidence_level: consensus.confidence_level,
        }
    }

    fn ratio(&self, reference: f64, consensus: f64) -> (f64, DealCategory) {
        if consensus <= 0.0 {
            // No consensus to compare against: worst possible.
            return (f64::INFINITY, DealCategory::Overpriced);
        }
        let score = reference / consensus;
        let category = if score <= self.deal_threshold {
            DealCategory::GoodDeal
        } else if score >= self.overpriced_threshold {
            DealCategory::Overpriced
        } else {
            DealCategory::FairPrice
        };
        (score, category)
    }

    /// Price a bidder should aim for: consensus blended with a secondary
    /// reference (list/retail), consensus weighted more as confidence rises,
    /// then discounted for expected auction dynamics.
    pub fn optimal_price(&self, consensus_price: f64, retail_price: f64, confidence: u8) -> f64 {
        let market_weight = if confidence >= 80 {
            0.7
        } else if confidence >= 50 {
            0.6
        } else {
            0.4
        };
        let blended = consensus_price * market_weight + retail_price * (1.0 - market_weight);
        blended * self.auction_discount
    }
}

fn savings_percent(reference: f64, consensus: f64) -> (f64, DealCategory) {
    if consensus <= 0.0 {
        return (f64::NEG_INFINITY, DealCategory::Overpriced);
    }
    let pct = (consensus - reference) / consensus * 100.0;
    let category = if pct >= 60.0 {
        DealCategory::ExceptionalDeal
    } else if pct >= 50.0 {
        DealCategory::GreatDeal
    } else if pct >= 30.0 {
        DealCategory::GoodDeal
    } else if pct >= 15.0 {
        DealCategory::FairDeal
    } else if pct > 0.0 {
        DealCategory::SlightDeal
    } else if pct == 0.0 {
        DealCategory::NotADeal
    } else {
        DealCategory::Overpriced
    };
    (pct, category)
}
