// src/sources/mod.rs
pub mod ebay_scrape;
pub mod reverb_api;
pub mod simulated;

use anyhow::Result;

use crate::observation::{Observation, SourceFamily, SourceKind};

/// Contract shared by every price source. `Ok(None)` means "nothing usable
/// here, try the next adapter"; `Err` is an unexpected failure the
/// orchestrator degrades to the same thing.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch(&self, query: &str) -> Result<Option<Observation>>;
    fn family(&self) -> SourceFamily;
    fn kind(&self) -> SourceKind;
    fn name(&self) -> &'static str;
}
