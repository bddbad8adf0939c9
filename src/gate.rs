// src/gate.rs
//! Request Gate: the single serialization point for outbound HTTP.
//!
//! All network-backed adapters funnel through one gate instance, which owns
//! the pacing clock and the session counter. Failures come back as `Err` and
//! are degraded by the orchestrator; nothing here panics or aborts a run.

use anyhow::{bail, Context, Result};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use rand::Rng;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Browser identities rotated per request.
const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
];

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("gate_requests_total", "Outbound HTTP requests issued.");
        describe_counter!("gate_retries_total", "Request retries after a failed attempt.");
        describe_counter!(
            "gate_rate_limited_total",
            "Responses that indicated rate limiting."
        );
        describe_counter!("gate_session_rests_total", "Session rest pauses taken.");
    });
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub min_request_interval: Duration,
    /// 0 disables the session budget.
    pub max_requests_per_session: u32,
    pub session_rest: Duration,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_request_interval: Duration::from_secs(2),
            max_requests_per_session: 20,
            session_rest: Duration::from_secs(60),
            request_timeout: Duration::from_secs(15),
            max_retries: 3,
            base_backoff: Duration::from_secs(5),
        }
    }
}

impl From<&crate::config::EngineConfig> for GateConfig {
    fn from(cfg: &crate::config::EngineConfig) -> Self {
        Self {
            min_request_interval: Duration::from_secs_f64(
                cfg.min_request_interval_secs.max(0.0),
            ),
            max_requests_per_session: cfg.max_requests_per_session,
            session_rest: Duration::from_secs_f64(cfg.session_rest_secs.max(0.0)),
            request_timeout: Duration::from_secs(cfg.request_timeout_secs),
            max_retries: cfg.max_retries,
            base_backoff: Duration::from_secs_f64(cfg.base_backoff_secs.max(0.0)),
        }
    }
}

/// Status and body of a completed request.
#[derive(Debug, Clone)]
pub struct GateResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug)]
struct GateState {
    last_request_at: Option<Instant>,
    session_requests: u32,
}

pub struct RequestGate {
    client: reqwest::Client,
    cfg: GateConfig,
    state: Mutex<GateState>,
}

impl RequestGate {
    pub fn new(cfg: GateConfig) -> Result<Self> {
        ensure_metrics_described();
        let client = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .build()
            .context("building http client")?;
        Ok(Self {
            client,
            cfg,
            state: Mutex::new(GateState {
                last_request_at: None,
                session_requests: 0,
            }),
        })
    }

    /// Wait out the pacing interval and the session budget, then claim one
    /// request slot. Slots are granted strictly one at a time, so concurrent
    /// workers cannot bypass the interval.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;

        if self.cfg.max_requests_per_session > 0
            && state.session_requests >= self.cfg.max_requests_per_session
        {
            tracing::debug!(
                rest_secs = self.cfg.session_rest.as_secs_f64(),
                "session budget reached, resting"
            );
            counter!("gate_session_rests_total").increment(1);
            tokio::time::sleep(self.cfg.session_rest).await;
            state.session_requests = 0;
        }

        if let Some(last) = state.last_request_at {
            let elapsed = last.elapsed();
            if elapsed < self.cfg.min_request_interval {
                tokio::time::sleep(self.cfg.min_request_interval - elapsed).await;
            }
        }

        state.last_request_at = Some(Instant::now());
        state.session_requests += 1;
    }

    /// Issue a GET with pacing, identity rotation and bounded retry/backoff.
    /// `headers` are added on top of the rotated User-Agent.
    pub async fn execute(&self, url: &str, headers: &[(&str, &str)]) -> Result<GateResponse> {
        for attempt in 0..=self.cfg.max_retries {
            self.acquire().await;
            counter!("gate_requests_total").increment(1);

            let ua = USER_AGENTS[rand::rng().random_range(0..USER_AGENTS.len())];
            let mut req = self
                .client
                .get(url)
                .header("User-Agent", ua)
                .header("Accept-Language", "en-US,en;q=0.9");
            for (k, v) in headers {
                req = req.header(*k, *v);
            }

            match req.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        // A connection dropped mid-body is as transient as a
                        // failed send; retry rather than propagate.
                        match resp.text().await {
                            Ok(body) => {
                                return Ok(GateResponse {
                                    status: status.as_u16(),
                                    body,
                                })
                            }
                            Err(e) => {
                                let wait = Duration::from_secs(1) * (attempt + 1);
                                tracing::warn!(
                                    %url,
                                    error = ?e,
                                    "failed reading response body, retrying"
                                );
                                tokio::time::sleep(wait).await;
                                counter!("gate_retries_total").increment(1);
                                continue;
                            }
                        }
                    }
                    if is_rate_limited(status.as_u16()) {
                        counter!("gate_rate_limited_total").increment(1);
                        let wait = self.cfg.base_backoff * (attempt + 1);
                        tracing::warn!(
                            %url,
                            status = status.as_u16(),
                            wait_secs = wait.as_secs_f64(),
                            "rate limited, backing off"
                        );
                        tokio::time::sleep(wait).await;
                    } else {
                        let wait = Duration::from_secs(1) * (attempt + 1);
                        tracing::warn!(
                            %url,
                            status = status.as_u16(),
                            "non-success status, retrying"
                        );
                        tokio::time::sleep(wait).await;
                    }
                }
                Err(e) => {
                    let wait = Duration::from_secs(1) * (attempt + 1);
                    tracing::warn!(%url, error = ?e, "request error, retrying");
                    tokio::time::sleep(wait).await;
                }
            }
            counter!("gate_retries_total").increment(1);
        }
        bail!("retries exhausted for {url}");
    }
}

fn is_rate_limited(status: u16) -> bool {
    status == 429 || status == 503
}
