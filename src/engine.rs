// src/engine.rs
//! # Market Price Engine
//! Ties the pieces together: normalize the query, consult the consensus
//! cache, run the family fallback chains through the shared request gate,
//! fuse the observations, persist, and (separately) score deals against the
//! result.
//!
//! No failure below this layer escapes to the caller as an error: a fetch
//! either produces a usable consensus or the zero-confidence `no_data`
//! result. Only construction can fail (cache dir, HTTP client).

use anyhow::Result;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::cache::CacheStore;
use crate::config::EngineConfig;
use crate::fusion::{fuse, ConsensusResult, FusionPolicy};
use crate::gate::{GateConfig, RequestGate};
use crate::observation::SourceFamily;
use crate::orchestrator::{FamilyChain, Orchestrator};
use crate::query::normalize_query;
use crate::scorer::{DealAssessment, DealScorer, DealStrategy};
use crate::sources::{
    ebay_scrape::EbayScrapeAdapter, reverb_api::ReverbApiAdapter, simulated::SimulatedAdapter,
    SourceAdapter,
};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "consensus_cache_hits_total",
            "Consensus results served from cache."
        );
        describe_counter!(
            "consensus_cache_misses_total",
            "Consensus cache misses (full fetch)."
        );
        describe_counter!("price_fetches_total", "Full market-price fetches performed.");
    });
}

pub struct MarketPriceEngine {
    orchestrator: Orchestrator,
    cache: Arc<CacheStore>,
    policy: FusionPolicy,
    scorer: DealScorer,
    worker_pool_size: usize,
}

impl MarketPriceEngine {
    /// Build with the default family chains: Reverb (API → simulated) and
    /// eBay (scrape → simulated), all network adapters sharing one gate.
    pub fn new(cfg: &EngineConfig) -> Result<Self> {
        let gate = Arc::new(RequestGate::new(GateConfig::from(cfg))?);

        let reverb: Vec<Arc<dyn SourceAdapter>> = vec![
            Arc::new(ReverbApiAdapter::new(
                Arc::clone(&gate),
                cfg.reverb_api_token.clone(),
                cfg.reverb_use_sandbox,
            )),
            Arc::new(SimulatedAdapter::new(SourceFamily::Reverb)),
        ];
        let ebay: Vec<Arc<dyn SourceAdapter>> = vec![
            Arc::new(EbayScrapeAdapter::new(
                Arc::clone(&gate),
                cfg.scrape_max_pages,
                cfg.scrape_target_results,
            )),
            Arc::new(SimulatedAdapter::new(SourceFamily::Ebay)),
        ];
        let chains = vec![
            FamilyChain {
                family: SourceFamily::Reverb,
                adapters: reverb,
            },
            FamilyChain {
                family: SourceFamily::Ebay,
                adapters: ebay,
            },
        ];
        Self::with_chains(cfg, chains)
    }

    /// Build with caller-supplied chains. This is the seam tests and
    /// embedders use to swap in their own adapters.
    pub fn with_chains(cfg: &EngineConfig, chains: Vec<FamilyChain>) -> Result<Self> {
        ensure_metrics_described();
        let cache = Arc::new(CacheStore::open(
            &cfg.cache_dir,
            cfg.consensus_ttl_days,
            cfg.scrape_ttl_hours,
        )?);
        Ok(Self {
            orchestrator: Orchestrator::new(chains).with_cache(Arc::clone(&cache)),
            cache,
            policy: FusionPolicy {
                simulated_fill_threshold: cfg.simulated_fill_threshold,
            },
            scorer: DealScorer::from(cfg),
            worker_pool_size: cfg.worker_pool_size.max(1),
        })
    }

    /// Consensus price for an item description, from cache when fresh.
    pub async fn market_price(&self, description: &str) -> ConsensusResult {
        let key = normalize_query(description);
        if let Some(hit) = self.cache.consensus.get(&key) {
            counter!("consensus_cache_hits_total").increment(1);
            tracing::debug!(query = %key, "consensus served from cache");
            return hit;
        }
        counter!("consensus_cache_misses_total").increment(1);
        self.fetch_and_store(&key).await
    }

    /// Bypass the consensus cache read (the entry is still overwritten).
    pub async fn refresh_market_price(&self, description: &str) -> ConsensusResult {
        let key = normalize_query(description);
        self.fetch_and_store(&key).await
    }

    async fn fetch_and_store(&self, key: &str) -> ConsensusResult {
        counter!("price_fetches_total").increment(1);
        let observations = self.orchestrator.collect(key).await;
        let result = fuse(&observations, self.policy);
        tracing::info!(
            query = %key,
            average = result.average_price,
            confidence = result.confidence_level,
            source = %result.source_type,
            "consensus price"
        );
        if let Err(e) = self.cache.consensus.put(key, result.clone()) {
            tracing::warn!(query = %key, error = ?e, "failed to persist consensus entry");
        }
        result
    }

    /// Score a reference price (e.g. a starting bid) against the consensus
    /// for this item.
    pub async fn assess_deal(
        &self,
        description: &str,
        strategy: DealStrategy,
        reference_price: f64,
    ) -> DealAssessment {
        let consensus = self.market_price(description).await;
        self.scorer.assess(strategy, reference_price, &consensus)
    }

    /// The price a bidder should aim for, given a secondary reference
    /// (list/retail price).
    pub async fn optimal_bid(&self, description: &str, retail_price: f64) -> f64 {
        let consensus = self.market_price(description).await;
        self.scorer.optimal_price(
            consensus.average_price,
            retail_price,
            consensus.confidence_level,
        )
    }

    pub fn scorer(&self) -> &DealScorer {
        &self.scorer
    }

    /// Fetch consensus prices for many items through a bounded worker pool.
    /// Results come back in completion order; item fetch order carries no
    /// guarantee, but each item's family fallback stays deterministic.
    pub async fn market_prices(
        self: &Arc<Self>,
        descriptions: Vec<String>,
    ) -> Vec<(String, ConsensusResult)> {
        let semaphore = Arc::new(Semaphore::new(self.worker_pool_size));
        let mut tasks = JoinSet::new();
        for description in descriptions {
            let engine = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("worker semaphore closed");
                let result = engine.market_price(&description).await;
                (description, result)
            });
        }

        let mut out = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(pair) => out.push(pair),
                Err(e) => tracing::warn!(error = ?e, "price worker panicked"),
            }
        }
        out
    }
}
