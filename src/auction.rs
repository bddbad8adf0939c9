// src/auction.rs
//! Auction catalog parser.
//!
//! Lines look like `12 Fender Stratocaster Retail $1,200 Starting Bid $500`.
//! Blank lines, `#` comments and `INTERMISSION` markers are skipped; anything
//! else that does not match the format is logged and dropped rather than
//! aborting the whole file.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use regex::Regex;
use std::path::Path;

use crate::query::{categorize, InstrumentCategory};

static LOT_LINE: OnceCell<Regex> = OnceCell::new();

fn lot_line_re() -> &'static Regex {
    LOT_LINE.get_or_init(|| {
        Regex::new(r"^(\d+)\s+(.*?)\s+Retail\s+\$([0-9][0-9,]*)\s+Starting\s+Bid\s+\$([0-9][0-9,]*)\s*$")
            .expect("lot line regex")
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuctionItem {
    pub lot: u32,
    pub description: String,
    pub retail_price: f64,
    pub starting_bid: f64,
    pub category: InstrumentCategory,
}

impl AuctionItem {
    pub fn bid_to_retail_ratio(&self) -> f64 {
        if self.retail_price > 0.0 {
            self.starting_bid / self.retail_price
        } else {
            f64::INFINITY
        }
    }
}

fn parse_amount(raw: &str) -> f64 {
    raw.replace(',', "").parse().unwrap_or(0.0)
}

/// Parse one catalog line. `None` means the line is skippable or malformed.
pub fn parse_line(line: &str) -> Option<AuctionItem> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line == "INTERMISSION" {
        return None;
    }
    let Some(caps) = lot_line_re().captures(line) else {
        tracing::warn!(line, "unparseable auction line");
        return None;
    };
    let description = caps[2].trim().to_string();
    Some(AuctionItem {
        lot: caps[1].parse().ok()?,
        category: categorize(&description),
        description,
        retail_price: parse_amount(&caps[3]),
        starting_bid: parse_amount(&caps[4]),
    })
}

pub fn parse_catalog(text: &str) -> Vec<AuctionItem> {
    text.lines().filter_map(parse_line).collect()
}

pub fn load_catalog(path: &Path) -> Result<Vec<AuctionItem>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading auction catalog {}", path.display()))?;
    let items = parse_catalog(&text);
    tracing::info!(count = items.len(), file = %path.display(), "loaded auction catalog");
    Ok(items)
}
