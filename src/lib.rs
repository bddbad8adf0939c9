// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod auction;
pub mod cache;
pub mod config;
pub mod engine;
pub mod fusion;
pub mod gate;
pub mod observation;
pub mod orchestrator;
pub mod query;
pub mod scorer;
pub mod sources;

// ---- Re-exports for stable public API ----
pub use crate::config::EngineConfig;
pub use crate::engine::MarketPriceEngine;
pub use crate::fusion::ConsensusResult;
pub use crate::scorer::{DealAssessment, DealCategory, DealStrategy};
