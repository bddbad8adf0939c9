// src/sources/ebay_scrape.rs
//! Scrape adapter over eBay's sold/completed listings search.
//!
//! Pages through results until the target count is reached, the page limit is
//! hit, or a page comes back materially short (end of results). Individual
//! malformed cells are skipped, never fatal.

use anyhow::Result;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::sync::Arc;

use crate::gate::RequestGate;
use crate::observation::{Condition, Listing, Observation, PriceStats, SourceFamily, SourceKind};
use crate::sources::{reverb_api::urlencode, SourceAdapter};

const RESULTS_PER_PAGE: u32 = 60;

fn re(cell: &'static OnceCell<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

pub struct EbayScrapeAdapter {
    gate: Arc<RequestGate>,
    max_pages: u32,
    target_results: usize,
}

impl EbayScrapeAdapter {
    pub fn new(gate: Arc<RequestGate>, max_pages: u32, target_results: usize) -> Self {
        Self {
            gate,
            max_pages: max_pages.max(1),
            target_results: target_results.max(1),
        }
    }

    fn search_url(&self, query: &str, page: u32) -> String {
        format!(
            "https://www.ebay.com/sch/i.html?_nkw={}&LH_Sold=1&LH_Complete=1&_ipg={}&_pgn={}",
            urlencode(query),
            RESULTS_PER_PAGE,
            page
        )
    }
}

/// Extract listings from one search-results page. Cells without a parseable
/// price are dropped; the "Shop on eBay" placeholder row is filtered by its
/// missing price.
pub(crate) fn parse_page(html: &str) -> Vec<Listing> {
    static RE_ITEM: OnceCell<Regex> = OnceCell::new();
    static RE_TITLE: OnceCell<Regex> = OnceCell::new();
    static RE_PRICE: OnceCell<Regex> = OnceCell::new();
    static RE_COND: OnceCell<Regex> = OnceCell::new();
    static RE_LINK: OnceCell<Regex> = OnceCell::new();

    let item_re = re(&RE_ITEM, r#"(?s)<li[^>]+class="[^"]*s-item[^"]*".*?</li>"#);
    let title_re = re(
        &RE_TITLE,
        r#"(?s)class="s-item__title"[^>]*>(?:\s*<span[^>]*>)?([^<]+)"#,
    );
    let price_re = re(
        &RE_PRICE,
        r#"class="s-item__price"[^>]*>[^$<]*\$([0-9][0-9,]*(?:\.[0-9]{2})?)"#,
    );
    let cond_re = re(
        &RE_COND,
        r#"class="SECONDARY_INFO"[^>]*>([^<]+)<"#,
    );
    let link_re = re(&RE_LINK, r#"class="s-item__link"[^>]*href="([^"]+)""#);

    let mut out = Vec::new();
    for item in item_re.find_iter(html) {
        let cell = item.as_str();
        let Some(price) = price_re
            .captures(cell)
            .and_then(|c| c[1].replace(',', "").parse::<f64>().ok())
            .filter(|p| *p > 0.0)
        else {
            continue;
        };
        let title = title_re
            .captures(cell)
            .map(|c| c[1].trim().to_string())
            .unwrap_or_default();
        let condition = cond_re
            .captures(cell)
            .map(|c| Condition::from_text(c[1].trim()))
            .unwrap_or(Condition::Used);
        let url = link_re.captures(cell).map(|c| c[1].to_string());
        out.push(Listing {
            title,
            price,
            condition,
            url,
        });
    }
    out
}

#[async_trait::async_trait]
impl SourceAdapter for EbayScrapeAdapter {
    async fn fetch(&self, query: &str) -> Result<Option<Observation>> {
        let mut listings: Vec<Listing> = Vec::new();

        for page in 1..=self.max_pages {
            let url = self.search_url(query, page);
            let resp = match self.gate.execute(&url, &[]).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(%query, page, error = ?e, "ebay scrape request failed");
                    break;
                }
            };

            let page_listings = parse_page(&resp.body);
            let page_count = page_listings.len();
            tracing::debug!(%query, page, count = page_count, "scraped ebay page");
            listings.extend(page_listings);

            if listings.len() >= self.target_results {
                break;
            }
            // A page well short of its size means we ran out of results.
            if page_count < (RESULTS_PER_PAGE / 2) as usize {
                break;
            }
        }

        listings.truncate(self.target_results);
        let Some(stats) = PriceStats::from_listings(&listings) else {
            return Ok(None);
        };
        tracing::info!(
            %query,
            count = stats.count,
            average = stats.average,
            median = stats.median,
            "ebay sold listings scraped"
        );
        Ok(Some(Observation::from_stats(
            SourceFamily::Ebay,
            SourceKind::Scraped,
            stats,
        )))
    }

    fn family(&self) -> SourceFamily {
        SourceFamily::Ebay
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Scraped
    }

    fn name(&self) -> &'static str {
        "ebay_scrape"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(title: &str, price: &str, condition: &str) -> String {
        format!(
            r#"<li data-view="mi:1686" class="s-item s-item__pl-on-bottom">
                 <a class="s-item__link" href="https://www.ebay.com/itm/123">
                   <div class="s-item__title"><span role="heading">{title}</span></div>
                 </a>
                 <span class="SECONDARY_INFO">{condition}</span>
                 <span class="s-item__price">{price}</span>
               </li>"#
        )
    }

    #[test]
    fn parses_price_title_condition_and_url() {
        let html = cell("Fender Stratocaster MIM", "$712.50", "Pre-Owned");
        let listings = parse_page(&html);
        assert_eq!(listings.len(), 1);
        let l = &listings[0];
        assert_eq!(l.price, 712.5);
        assert_eq!(l.title, "Fender Stratocaster MIM");
        assert_eq!(l.condition, Condition::Used);
        assert_eq!(l.url.as_deref(), Some("https://www.ebay.com/itm/123"));
    }

    #[test]
    fn thousands_separators_and_ranges() {
        let html = [
            cell("LP Standard", "$2,499.99", "Brand New"),
            cell("Range priced", "$700.00 to $900.00", "Good - Refurbished"),
        ]
        .join("\n");
        let listings = parse_page(&html);
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].price, 2499.99);
        assert_eq!(listings[0].condition, Condition::New);
        // First price of a range wins.
        assert_eq!(listings[1].price, 700.0);
    }

    #[test]
    fn malformed_price_cells_are_skipped() {
        let html = [
            cell("No price here", "see description", "Used"),
            cell("Valid", "$55.00", "Open Box"),
        ]
        .join("\n");
        let listings = parse_page(&html);
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].condition, Condition::OpenBox);
    }

    #[test]
    fn empty_page_parses_to_nothing() {
        assert!(parse_page("<html><body>No results found</body></html>").is_empty());
    }
}
