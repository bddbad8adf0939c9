use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tempfile::TempDir;

use gearmarket::config::EngineConfig;
use gearmarket::engine::MarketPriceEngine;
use gearmarket::observation::{Observation, PriceStats, SourceFamily, SourceKind};
use gearmarket::orchestrator::FamilyChain;
use gearmarket::scorer::{DealCategory, DealStrategy};
use gearmarket::sources::SourceAdapter;

enum Behavior {
    Price(f64),
    Empty,
    Fail,
}

struct ScriptedAdapter {
    family: SourceFamily,
    kind: SourceKind,
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
}

impl ScriptedAdapter {
    fn new(family: SourceFamily, kind: SourceKind, behavior: Behavior) -> (Arc<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let adapter = Arc::new(Self {
            family,
            kind,
            behavior,
            calls: Arc::clone(&calls),
        });
        (adapter, calls)
    }
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    async fn fetch(&self, _query: &str) -> Result<Option<Observation>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Price(p) => {
                let stats = PriceStats {
                    average: p,
                    median: p,
                    min: p * 0.8,
                    max: p * 1.2,
                    count: 8,
                    condition_counts: Default::default(),
                };
                Ok(Some(Observation::from_stats(self.family, self.kind, stats)))
            }
            Behavior::Empty => Ok(None),
            Behavior::Fail => bail!("connection reset"),
        }
    }

    fn family(&self) -> SourceFamily {
        self.family
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn build_engine(dir: &TempDir, chains: Vec<FamilyChain>) -> MarketPriceEngine {
    let cfg = EngineConfig {
        cache_dir: dir.path().to_path_buf(),
        ..EngineConfig::default()
    };
    MarketPriceEngine::with_chains(&cfg, chains).expect("engine should build")
}

#[tokio::test]
async fn failed_primary_falls_through_to_scrape() {
    let dir = TempDir::new().unwrap();
    let (api, api_calls) =
        ScriptedAdapter::new(SourceFamily::Reverb, SourceKind::StructuredApi, Behavior::Fail);
    let (scrape, scrape_calls) = ScriptedAdapter::new(
        SourceFamily::Ebay,
        SourceKind::Scraped,
        Behavior::Price(850.0),
    );
    let engine = build_engine(
        &dir,
        vec![
            FamilyChain {
                family: SourceFamily::Reverb,
                adapters: vec![api],
            },
            FamilyChain {
                family: SourceFamily::Ebay,
                adapters: vec![scrape],
            },
        ],
    );

    let result = engine.market_price("Gretsch hollowbody").await;
    assert_eq!(api_calls.load(Ordering::SeqCst), 1);
    assert_eq!(scrape_calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.source_type, "ebay_scraped");
    assert_eq!(result.average_price, 850.0);
    assert!(result.confidence_level >= 70);
}

#[tokio::test]
async fn lower_priority_adapter_skipped_when_primary_answers() {
    let dir = TempDir::new().unwrap();
    let (api, _) = ScriptedAdapter::new(
        SourceFamily::Reverb,
        SourceKind::StructuredApi,
        Behavior::Price(1200.0),
    );
    let (fallback, fallback_calls) =
        ScriptedAdapter::new(SourceFamily::Reverb, SourceKind::Simulated, Behavior::Price(9999.0));
    let engine = build_engine(
        &dir,
        vec![FamilyChain {
            family: SourceFamily::Reverb,
            adapters: vec![api, fallback],
        }],
    );

    let result = engine.market_price("Martin D-28").await;
    assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    assert_eq!(result.source_type, "reverb_api");
    assert_eq!(result.average_price, 1200.0);
}

#[tokio::test]
async fn all_sources_empty_yields_no_data() {
    let dir = TempDir::new().unwrap();
    let (api, _) =
        ScriptedAdapter::new(SourceFamily::Reverb, SourceKind::StructuredApi, Behavior::Empty);
    let (scrape, _) = ScriptedAdapter::new(SourceFamily::Ebay, SourceKind::Scraped, Behavior::Fail);
    let engine = build_engine(
        &dir,
        vec![
            FamilyChain {
                family: SourceFamily::Reverb,
                adapters: vec![api],
            },
            FamilyChain {
                family: SourceFamily::Ebay,
                adapters: vec![scrape],
            },
        ],
    );

    let result = engine.market_price("unknown widget").await;
    assert_eq!(result.source_type, "no_data");
    assert_eq!(result.confidence_level, 0);
    assert_eq!(result.average_price, 0.0);
    assert_eq!(result.count, 0);
}

#[tokio::test]
async fn two_real_families_blend_and_boost_confidence() {
    let dir = TempDir::new().unwrap();
    let (api, _) = ScriptedAdapter::new(
        SourceFamily::Reverb,
        SourceKind::StructuredApi,
        Behavior::Price(1000.0),
    );
    let (scrape, _) = ScriptedAdapter::new(
        SourceFamily::Ebay,
        SourceKind::Scraped,
        Behavior::Price(900.0),
    );
    let engine = build_engine(
        &dir,
        vec![
            FamilyChain {
                family: SourceFamily::Reverb,
                adapters: vec![api],
            },
            FamilyChain {
                family: SourceFamily::Ebay,
                adapters: vec![scrape],
            },
        ],
    );

    let result = engine.market_price("PRS Custom 24").await;
    assert_eq!(result.average_price, 950.0);
    // API primary (90) plus one extra folded source.
    assert_eq!(result.confidence_level, 100);
    assert_eq!(result.source_type, "reverb_api");
    assert_eq!(result.sources.len(), 2);
}

#[tokio::test]
async fn assess_deal_flows_through_engine() {
    let dir = TempDir::new().unwrap();
    let (api, _) = ScriptedAdapter::new(
        SourceFamily::Reverb,
        SourceKind::StructuredApi,
        Behavior::Price(1000.0),
    );
    let engine = build_engine(
        &dir,
        vec![FamilyChain {
            family: SourceFamily::Reverb,
            adapters: vec![api],
        }],
    );

    let good = engine
        .assess_deal("Fender Jazzmaster", DealStrategy::Ratio, 700.0)
        .await;
    assert_eq!(good.category, DealCategory::GoodDeal);
    assert!((good.deal_score - 0.7).abs() < 1e-9);

    let over = engine
        .assess_deal("Fender Jazzmaster", DealStrategy::Ratio, 1300.0)
        .await;
    assert_eq!(over.category, DealCategory::Overpriced);

    let tiered = engine
        .assess_deal("Fender Jazzmaster", DealStrategy::SavingsPercent, 450.0)
        .await;
    assert_eq!(tiered.category, DealCategory::GreatDeal);
    assert!((tiered.deal_score - 55.0).abs() < 1e-9);
}

#[tokio::test]
async fn optimal_bid_blends_consensus_with_retail() {
    let dir = TempDir::new().unwrap();
    let (api, _) = ScriptedAdapter::new(
        SourceFamily::Reverb,
        SourceKind::StructuredApi,
        Behavior::Price(1000.0),
    );
    let engine = build_engine(
        &dir,
        vec![FamilyChain {
            family: SourceFamily::Reverb,
            adapters: vec![api],
        }],
    );

    // Single API observation: confidence 90, so consensus carries 0.7 weight.
    // (0.7 * 1000 + 0.3 * 1200) * 0.85 = 901.
    let bid = engine.optimal_bid("Taylor 814ce", 1200.0).await;
    assert!((bid - 901.0).abs() < 1e-9);
}

#[tokio::test]
async fn batch_pricing_returns_every_item() {
    let dir = TempDir::new().unwrap();
    let (api, api_calls) = ScriptedAdapter::new(
        SourceFamily::Reverb,
        SourceKind::StructuredApi,
        Behavior::Price(500.0),
    );
    let engine = Arc::new(build_engine(
        &dir,
        vec![FamilyChain {
            family: SourceFamily::Reverb,
            adapters: vec![api],
        }],
    ));

    let items: Vec<String> = (0..12).map(|i| format!("lot number {i}")).collect();
    let results = engine.market_prices(items.clone()).await;

    assert_eq!(results.len(), 12);
    assert_eq!(api_calls.load(Ordering::SeqCst), 12);
    for (_, consensus) in &results {
        assert_eq!(consensus.average_price, 500.0);
    }
}
