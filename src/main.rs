//! Auction Analyzer — Binary Entrypoint
//! Loads an auction catalog, fetches consensus market prices for every lot
//! through the engine's worker pool, and logs deal verdicts plus a summary.
//!
//! See `README.md` for quickstart and environment variables.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gearmarket::auction::{load_catalog, AuctionItem};
use gearmarket::scorer::{DealCategory, DealStrategy};
use gearmarket::{ConsensusResult, EngineConfig, MarketPriceEngine};

const DEFAULT_AUCTION_FILE: &str = "auction_items.txt";

fn enable_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gearmarket=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    enable_tracing();

    let path = std::env::var("AUCTION_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_AUCTION_FILE));
    let mut items = load_catalog(&path)?;
    if let Ok(max) = std::env::var("MAX_ITEMS") {
        let max: usize = max.parse().context("MAX_ITEMS must be a number")?;
        items.truncate(max);
    }
    if items.is_empty() {
        anyhow::bail!("no auction items found in {}", path.display());
    }
    tracing::info!(count = items.len(), file = %path.display(), "analyzing auction lots");

    let cfg = EngineConfig::from_env();
    let engine = Arc::new(MarketPriceEngine::new(&cfg)?);

    let descriptions: Vec<String> = items.iter().map(|i| i.description.clone()).collect();
    let priced = engine.market_prices(descriptions).await;
    let by_description: HashMap<String, ConsensusResult> = priced.into_iter().collect();

    let mut by_category: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut scored: Vec<(f64, &AuctionItem)> = Vec::new();
    for item in &items {
        let Some(consensus) = by_description.get(&item.description) else {
            continue;
        };
        report_lot(&engine, item, consensus);
        let verdict = engine
            .scorer()
            .assess(DealStrategy::Ratio, item.starting_bid, consensus);
        *by_category.entry(verdict.category.as_str()).or_insert(0) += 1;
        if verdict.category == DealCategory::GoodDeal {
            scored.push((verdict.deal_score, item));
        }
    }

    scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    for (rank, (score, item)) in scored.iter().take(5).enumerate() {
        tracing::info!(
            rank = rank + 1,
            lot = item.lot,
            item = %item.description,
            bid_to_market = (score * 100.0).round() / 100.0,
            "top deal"
        );
    }
    tracing::info!(
        lots = items.len(),
        good_deals = scored.len(),
        verdicts = ?by_category,
        "auction analysis complete"
    );
    Ok(())
}

fn report_lot(engine: &MarketPriceEngine, item: &AuctionItem, consensus: &ConsensusResult) {
    let ratio = engine
        .scorer()
        .assess(DealStrategy::Ratio, item.starting_bid, consensus);
    let savings = engine
        .scorer()
        .assess(DealStrategy::SavingsPercent, item.starting_bid, consensus);
    let optimal = engine.scorer().optimal_price(
        consensus.average_price,
        item.retail_price,
        consensus.confidence_level,
    );
    tracing::info!(
        lot = item.lot,
        item = %item.description,
        category = item.category.as_str(),
        starting_bid = item.starting_bid,
        retail = item.retail_price,
        market_avg = consensus.average_price,
        confidence = consensus.confidence_level,
        source = %consensus.source_type,
        verdict = ratio.category.as_str(),
        savings_verdict = savings.category.as_str(),
        optimal_bid = (optimal * 100.0).round() / 100.0,
        "lot assessed"
    );
}
