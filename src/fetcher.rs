use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use scraper::{Html, Selector};

use crate::config::{ACCEPT_LANGUAGE, USER_AGENTS};
use crate::error::{AppError, Result};
use crate::types::PageInfo;

const FALLBACK_TITLE: &str = "タイトル不明";

/// Fetches and parses a product page for a target url. Trait seam so the
/// scanner can run against canned pages in tests.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<PageInfo>;
}

pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<PageInfo> {
        let user_agent = {
            let mut rng = rand::rng();
            USER_AGENTS[rng.random_range(0..USER_AGENTS.len())]
        };

        let body = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .header(reqwest::header::ACCEPT_LANGUAGE, ACCEPT_LANGUAGE)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_product_page(&body)
    }
}

/// Pull title, prices and point value out of the product page markup.
pub fn parse_product_page(html: &str) -> Result<PageInfo> {
    let document = Html::parse_document(html);

    let title = select_first_text(&document, "#productTitle")?
        .unwrap_or_else(|| FALLBACK_TITLE.to_string());

    // Kindle-specific price block first, generic price element as fallback.
    let price_text = match select_first_text(&document, ".kindle-price .a-color-price")? {
        Some(t) => Some(t),
        None => select_first_text(&document, ".a-color-price")?,
    };
    let current_price = price_text.as_deref().and_then(parse_yen);

    // Struck-through list price when the page shows one; otherwise the page
    // offers no reference price and the current price stands in for it.
    let list_price = select_first_text(&document, ".a-text-price .a-offscreen")?
        .as_deref()
        .and_then(parse_yen)
        .or(current_price);

    let point_value = select_first_text(&document, ".slot-buyingPoints")?
        .as_deref()
        .and_then(first_integer)
        .unwrap_or(0.0);

    Ok(PageInfo {
        title,
        current_price,
        list_price,
        point_value,
    })
}

fn select_first_text(document: &Html, selector: &str) -> Result<Option<String>> {
    let sel = Selector::parse(selector)
        .map_err(|e| AppError::PageParse(format!("bad selector {selector:?}: {e}")))?;
    Ok(document.select(&sel).next().map(|n| {
        n.text().collect::<String>().trim().to_string()
    }))
}

/// Extract a yen amount like "￥ 1,234" or "¥980" — the first digit run,
/// comma grouping allowed.
fn parse_yen(text: &str) -> Option<f64> {
    let mut digits = String::new();
    let mut in_number = false;
    for c in text.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            in_number = true;
        } else if in_number && c == ',' {
            continue;
        } else if in_number {
            break;
        }
    }
    digits.parse::<f64>().ok()
}

/// First bare integer in the text, e.g. the "11" in "11ポイント(1%)".
fn first_integer(text: &str) -> Option<f64> {
    parse_yen(text)
}
