// src/config.rs
//! Engine configuration.
//!
//! Everything is environment-driven with working defaults, so the engine runs
//! with no setup at all (it degrades to simulated sources) and picks up
//! credentials/tuning from `.env` when present.

use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Reverb API bearer token; the structured adapter short-circuits to no
    /// result when unset.
    pub reverb_api_token: Option<String>,
    /// Hit the Reverb sandbox host instead of production.
    pub reverb_use_sandbox: bool,

    /// Directory holding the persisted cache maps.
    pub cache_dir: PathBuf,
    /// Consensus results stay fresh for this many days.
    pub consensus_ttl_days: i64,
    /// Raw scrape observations stay fresh for this many hours.
    pub scrape_ttl_hours: i64,

    /// Minimum spacing between outbound requests, in seconds.
    pub min_request_interval_secs: f64,
    /// Requests allowed before the gate takes a session rest. 0 disables.
    pub max_requests_per_session: u32,
    /// Length of the session rest, in seconds.
    pub session_rest_secs: f64,
    /// Per-request HTTP timeout, in seconds.
    pub request_timeout_secs: u64,
    /// Retry attempts after the first try of a request.
    pub max_retries: u32,
    /// Backoff unit for rate-limit responses, in seconds.
    pub base_backoff_secs: f64,

    /// Pagination bounds for the scrape adapter.
    pub scrape_max_pages: u32,
    pub scrape_target_results: usize,

    /// Deal classifier thresholds (ratio strategy).
    pub deal_threshold: f64,
    pub overpriced_threshold: f64,
    /// Expected auction discount applied to the optimal-bid blend.
    pub auction_discount: f64,

    /// Simulated prices are averaged in only while fewer real observations
    /// than this exist.
    pub simulated_fill_threshold: usize,

    /// Concurrent price-fetch workers for batch runs.
    pub worker_pool_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reverb_api_token: None,
            reverb_use_sandbox: false,
            cache_dir: PathBuf::from("cache"),
            consensus_ttl_days: 7,
            scrape_ttl_hours: 24,
            min_request_interval_secs: 2.0,
            max_requests_per_session: 20,
            session_rest_secs: 60.0,
            request_timeout_secs: 15,
            max_retries: 3,
            base_backoff_secs: 5.0,
            scrape_max_pages: 2,
            scrape_target_results: 25,
            deal_threshold: 0.85,
            overpriced_threshold: 1.15,
            auction_discount: 0.85,
            simulated_fill_threshold: 2,
            worker_pool_size: 5,
        }
    }
}

fn env_parsed<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(v) => v.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(var = name, value = %v, "unparseable env value, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl EngineConfig {
    /// Build from the process environment. Call `dotenvy::dotenv()` first if a
    /// `.env` file should participate.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            reverb_api_token: env_nonempty("REVERB_API_TOKEN"),
            reverb_use_sandbox: env_flag("REVERB_USE_SANDBOX"),
            cache_dir: std::env::var("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.cache_dir),
            consensus_ttl_days: env_parsed("CACHE_EXPIRY_DAYS", d.consensus_ttl_days),
            scrape_ttl_hours: env_parsed("SCRAPE_CACHE_EXPIRY_HOURS", d.scrape_ttl_hours),
            min_request_interval_secs: env_parsed(
                "MIN_REQUEST_INTERVAL_SECS",
                d.min_request_interval_secs,
            ),
            max_requests_per_session: env_parsed(
                "MAX_REQUESTS_PER_SESSION",
                d.max_requests_per_session,
            ),
            session_rest_secs: env_parsed("SESSION_REST_SECS", d.session_rest_secs),
            request_timeout_secs: env_parsed("REQUEST_TIMEOUT_SECS", d.request_timeout_secs),
            max_retries: env_parsed("MAX_RETRIES", d.max_retries),
            base_backoff_secs: env_parsed("BASE_BACKOFF_SECS", d.base_backoff_secs),
            scrape_max_pages: env_parsed("SCRAPE_MAX_PAGES", d.scrape_max_pages),
            scrape_target_results: env_parsed("SCRAPE_TARGET_RESULTS", d.scrape_target_results),
            deal_threshold: env_parsed("DEAL_THRESHOLD", d.deal_threshold),
            overpriced_threshold: env_parsed("OVERPRICED_THRESHOLD", d.overpriced_threshold),
            auction_discount: env_parsed("AUCTION_DISCOUNT", d.auction_discount),
            simulated_fill_threshold: env_parsed(
                "SIMULATED_FILL_THRESHOLD",
                d.simulated_fill_threshold,
            ),
            worker_pool_size: env_parsed("WORKER_POOL_SIZE", d.worker_pool_size),
        }
    }
}
