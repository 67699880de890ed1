//! Market price feed
//!
//! Fetches a ranked list of assets with their current price and 24 hour change
//! from a CoinGecko-compatible `/coins/markets` endpoint.

use crate::config::PriceFeedConfig;
use crate::error::{ConsoleError, ConsoleResult};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// One row of the market table
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssetQuote {
    #[serde(rename = "market_cap_rank")]
    pub rank: Option<u32>,
    pub symbol: String,
    pub name: String,
    #[serde(rename = "current_price")]
    pub price: Option<f64>,
    #[serde(rename = "price_change_percentage_24h")]
    pub change_24h_pct: Option<f64>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Ranked assets. Fails with `FeedUnreachable` or `FeedMalformed`.
    async fn top_assets(&self) -> ConsoleResult<Vec<AssetQuote>>;
}

#[derive(Clone)]
pub struct CoinGeckoFeed {
    base_url: String,
    vs_currency: String,
    limit: usize,
    http: Client,
}

impl CoinGeckoFeed {
    pub fn new(config: &PriceFeedConfig) -> ConsoleResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("operator-console/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConsoleError::Config(format!("Cannot build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            vs_currency: config.vs_currency.clone(),
            limit: config.limit,
            http,
        })
    }
}

#[async_trait]
impl PriceFeed for CoinGeckoFeed {
    async fn top_assets(&self) -> ConsoleResult<Vec<AssetQuote>> {
        let url = format!("{}/coins/markets", self.base_url);
        let per_page = self.limit.to_string();
        let resp = self
            .http
            .get(url)
            .query(&[
                ("vs_currency", self.vs_currency.as_str()),
                ("order", "market_cap_desc"),
                ("per_page", per_page.as_str()),
                ("page", "1"),
                ("price_change_percentage", "24h"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ConsoleError::FeedUnreachable(e.to_string()))?;

        let body = resp
            .bytes()
            .await
            .map_err(|e| ConsoleError::FeedUnreachable(e.to_string()))?;

        let assets = parse_markets(&body, self.limit)?;
        debug!("Price feed returned {} assets", assets.len());
        Ok(assets)
    }
}

/// Decode a markets response, rank it and keep the first `limit` rows
pub fn parse_markets(body: &[u8], limit: usize) -> ConsoleResult<Vec<AssetQuote>> {
    let mut assets: Vec<AssetQuote> =
        serde_json::from_slice(body).map_err(|e| ConsoleError::FeedMalformed(e.to_string()))?;

    if assets.is_empty() {
        return Err(ConsoleError::FeedMalformed("market list is empty".to_string()));
    }

    // Unranked assets sort last
    assets.sort_by_key(|a| a.rank.unwrap_or(u32::MAX));
    assets.truncate(limit);
    Ok(assets)
}
