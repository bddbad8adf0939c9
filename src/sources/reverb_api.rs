// src/sources/reverb_api.rs
//! Structured-API adapter for Reverb's listings search.
//!
//! Short-circuits to no result when no bearer token is configured; the
//! fallback chain moves on without a network call.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::sync::Arc;

use crate::gate::RequestGate;
use crate::observation::{Condition, Listing, Observation, PriceStats, SourceFamily, SourceKind};
use crate::sources::SourceAdapter;

const PRODUCTION_HOST: &str = "https://api.reverb.com";
const SANDBOX_HOST: &str = "https://sandbox.reverb.com";
const PER_PAGE: u32 = 50;

// Only the fields we consume; the API ships many more.
#[derive(Debug, Deserialize)]
struct ListingsResponse {
    #[serde(default)]
    listings: Vec<ApiListing>,
}

#[derive(Debug, Deserialize)]
struct ApiListing {
    title: Option<String>,
    condition: Option<ApiCondition>,
    price: Option<ApiPrice>,
}

#[derive(Debug, Deserialize)]
struct ApiCondition {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiPrice {
    /// Decimal amount as a string, e.g. "1499.00".
    amount: Option<String>,
}

pub struct ReverbApiAdapter {
    gate: Arc<RequestGate>,
    token: Option<String>,
    host: &'static str,
}

impl ReverbApiAdapter {
    pub fn new(gate: Arc<RequestGate>, token: Option<String>, sandbox: bool) -> Self {
        Self {
            gate,
            token,
            host: if sandbox { SANDBOX_HOST } else { PRODUCTION_HOST },
        }
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}/api/listings/all?query={}&per_page={}",
            self.host,
            urlencode(query),
            PER_PAGE
        )
    }
}

/// Parse a listings response body into usable listings, skipping rows with
/// missing or malformed prices.
pub(crate) fn parse_listings(body: &str) -> Result<Vec<Listing>> {
    let resp: ListingsResponse =
        serde_json::from_str(body).context("parsing reverb listings json")?;
    let mut out = Vec::with_capacity(resp.listings.len());
    for l in resp.listings {
        let Some(price) = l
            .price
            .and_then(|p| p.amount)
            .and_then(|a| a.trim().replace(',', "").parse::<f64>().ok())
        else {
            continue;
        };
        if price <= 0.0 {
            continue;
        }
        let condition = l
            .condition
            .and_then(|c| c.display_name)
            .map(|t| Condition::from_text(&t))
            .unwrap_or(Condition::Unknown);
        out.push(Listing {
            title: l.title.unwrap_or_default(),
            price,
            condition,
            url: None,
        });
    }
    Ok(out)
}

#[async_trait::async_trait]
impl SourceAdapter for ReverbApiAdapter {
    async fn fetch(&self, query: &str) -> Result<Option<Observation>> {
        let Some(token) = &self.token else {
            tracing::debug!("reverb token not configured, skipping api adapter");
            return Ok(None);
        };

        let auth = format!("Bearer {token}");
        let headers = [
            ("Authorization", auth.as_str()),
            ("Accept", "application/hal+json"),
            ("Accept-Version", "3.0"),
        ];
        let resp = match self.gate.execute(&self.search_url(query), &headers).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(%query, error = ?e, "reverb api request failed");
                return Ok(None);
            }
        };

        let listings = parse_listings(&resp.body)?;
        let Some(stats) = PriceStats::from_listings(&listings) else {
            tracing::debug!(%query, "reverb api returned zero usable listings");
            return Ok(None);
        };
        tracing::info!(
            %query,
            count = stats.count,
            average = stats.average,
            "reverb api listings"
        );
        Ok(Some(Observation::from_stats(
            SourceFamily::Reverb,
            SourceKind::StructuredApi,
            stats,
        )))
    }

    fn family(&self) -> SourceFamily {
        SourceFamily::Reverb
    }

    fn kind(&self) -> SourceKind {
        SourceKind::StructuredApi
    }

    fn name(&self) -> &'static str {
        "reverb_api"
    }
}

/// Minimal query-string escaping for the characters that appear in gear
/// descriptions. Reserved for search terms, not general URLs.
pub(crate) fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "listings": [
            {"title": "Gibson Les Paul Standard", "condition": {"display_name": "Excellent"}, "price": {"amount": "2100.00", "currency": "USD"}},
            {"title": "Gibson Les Paul Studio", "condition": {"display_name": "Very Good"}, "price": {"amount": "1,450.00"}},
            {"title": "No price listing", "condition": {"display_name": "Good"}},
            {"title": "Garbage price", "price": {"amount": "n/a"}}
        ]
    }"#;

    #[test]
    fn fixture_parses_and_skips_malformed_rows() {
        let listings = parse_listings(FIXTURE).unwrap();
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].price, 2100.0);
        assert_eq!(listings[1].price, 1450.0);
        assert_eq!(listings[1].condition, Condition::VeryGood);
    }

    #[test]
    fn empty_listings_field_is_tolerated() {
        assert!(parse_listings("{}").unwrap().is_empty());
    }

    #[test]
    fn query_encoding() {
        assert_eq!(urlencode("gibson sg '61"), "gibson+sg+%2761");
    }

    #[tokio::test]
    async fn missing_token_short_circuits_without_io() {
        let gate = Arc::new(
            crate::gate::RequestGate::new(crate::gate::GateConfig::default()).unwrap(),
        );
        let adapter = ReverbApiAdapter::new(gate, None, false);
        let out = adapter.fetch("fender stratocaster").await.unwrap();
        assert!(out.is_none());
    }
}
