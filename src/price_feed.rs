//! ETH/USD spot price with a short-lived cache.
//!
//! Consulted once per snapshot build, concurrently with the transfer pull.
//! A feed outage degrades to `None` (USD columns go empty); it never fails
//! the pipeline.

use log::{debug, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct PriceFeedConfig {
    pub base_url: String,
    pub cache_ttl: Duration,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            cache_ttl: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SpotPrice {
    usd: f64,
}

pub struct PriceFeed {
    client: reqwest::Client,
    config: PriceFeedConfig,
    cached: Mutex<Option<(Instant, f64)>>,
}

impl PriceFeed {
    pub fn new(config: PriceFeedConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self { client, config, cached: Mutex::new(None) }
    }

    /// Current ETH/USD rate, at most one upstream call per `cache_ttl`.
    /// Returns the last known rate on failure, `None` if never fetched.
    pub async fn eth_usd(&self) -> Option<f64> {
        let mut cached = self.cached.lock().await;
        if let Some((at, rate)) = *cached {
            if at.elapsed() < self.config.cache_ttl {
                return Some(rate);
            }
        }

        match self.fetch_spot().await {
            Ok(rate) => {
                debug!("eth/usd spot refreshed: {}", rate);
                *cached = Some((Instant::now(), rate));
                Some(rate)
            }
            Err(e) => {
                warn!("eth/usd spot fetch failed: {}", e);
                cached.map(|(_, rate)| rate)
            }
        }
    }

    async fn fetch_spot(&self) -> anyhow::Result<f64> {
        let url = format!(
            "{}/simple/price?ids=ethereum&vs_currencies=usd",
            self.config.base_url.trim_end_matches('/')
        );
        let body: HashMap<String, SpotPrice> = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        body.get("ethereum")
            .map(|p| p.usd)
            .ok_or_else(|| anyhow::anyhow!("spot response missing ethereum entry"))
    }
}
