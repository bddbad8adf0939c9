// src/orchestrator.rs
//! Fallback orchestration across source families.
//!
//! Each family owns a fixed-priority adapter chain (structured API → scrape →
//! simulated). The first usable observation wins for that family; adapter
//! errors are logged and degrade to the next link. A family where every
//! adapter comes up empty contributes nothing — that is a data-quality
//! signal, not an error.

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use std::sync::Arc;

use crate::cache::CacheStore;
use crate::observation::{Observation, SourceFamily, SourceKind};
use crate::sources::SourceAdapter;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("adapter_fetches_total", "Adapter fetch attempts.");
        describe_counter!("adapter_errors_total", "Adapter fetch errors (degraded to fallback).");
        describe_counter!("scrape_cache_hits_total", "Scrape observations served from cache.");
        describe_counter!(
            "family_no_data_total",
            "Families whose whole chain produced nothing."
        );
    });
}

/// One family's adapters, highest priority first.
pub struct FamilyChain {
    pub family: SourceFamily,
    pub adapters: Vec<Arc<dyn SourceAdapter>>,
}

pub struct Orchestrator {
    chains: Vec<FamilyChain>,
    cache: Option<Arc<CacheStore>>,
}

impl Orchestrator {
    pub fn new(chains: Vec<FamilyChain>) -> Self {
        ensure_metrics_described();
        Self {
            chains,
            cache: None,
        }
    }

    /// Attach the cache store so raw scrape observations are reused within
    /// their (shorter) TTL even when the consensus entry has expired.
    pub fn with_cache(mut self, cache: Arc<CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Run every family chain for a normalized query; at most one observation
    /// per family. Family order is deterministic and never reordered.
    pub async fn collect(&self, query: &str) -> Vec<Observation> {
        let mut out = Vec::with_capacity(self.chains.len());
        for chain in &self.chains {
            match self.run_chain(chain, query).await {
                Some(obs) => out.push(obs),
                None => {
                    counter!("family_no_data_total").increment(1);
                    tracing::info!(
                        %query,
                        family = chain.family.as_str(),
                        "no usable observation from any adapter"
                    );
                }
            }
        }
        out
    }

    async fn run_chain(&self, chain: &FamilyChain, query: &str) -> Option<Observation> {
        for adapter in &chain.adapters {
            if adapter.kind() == SourceKind::Scraped {
                if let Some(cached) = self.cached_scrape(chain.family, query) {
                    counter!("scrape_cache_hits_total").increment(1);
                    tracing::debug!(
                        %query,
                        family = chain.family.as_str(),
                        "scrape observation served from cache"
                    );
                    return Some(cached);
                }
            }

            counter!("adapter_fetches_total").increment(1);
            match adapter.fetch(query).await {
                Ok(Some(obs)) => {
                    if obs.kind == SourceKind::Scraped {
                        self.store_scrape(chain.family, query, &obs);
                    }
                    return Some(obs);
                }
                Ok(None) => {
                    tracing::debug!(
                        %query,
                        adapter = adapter.name(),
                        "adapter had no result, falling through"
                    );
                }
                Err(e) => {
                    counter!("adapter_errors_total").increment(1);
                    tracing::warn!(
                        %query,
                        adapter = adapter.name(),
                        error = ?e,
                        "adapter error, falling through"
                    );
                }
            }
        }
        None
    }

    fn cached_scrape(&self, family: SourceFamily, query: &str) -> Option<Observation> {
        self.cache
            .as_ref()?
            .scrape
            .get(&CacheStore::scrape_key(family, query))
    }

    fn store_scrape(&self, family: SourceFamily, query: &str, obs: &Observation) {
        let Some(cache) = &self.cache else { return };
        if let Err(e) = cache
            .scrape
            .put(&CacheStore::scrape_key(family, query), obs.clone())
        {
            tracing::warn!(error = ?e, "failed to persist scrape cache entry");
        }
    }
}
