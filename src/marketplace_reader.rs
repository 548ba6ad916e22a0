//! Marketplace reader: cursor-paginated sale events and active listings.
//!
//! The provider exposes event queries filtered by event type, time window,
//! and collection slug. A 404 (the provider's empty-result sentinel) is
//! success with an empty collection, never an error.

use crate::error::ProviderError;
use crate::metrics;
use crate::resilient_fetch::ResilientFetch;
use crate::types::conversions::raw_quantity_to_amount;
use crate::types::{SaleEvent, SalePayment};
use log::{debug, warn};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct MarketplaceConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Events per page requested from the provider.
    pub page_size: usize,
    /// Hard ceiling on pages per query; full time-window pulls can be
    /// unbounded and must not block indefinitely.
    pub max_pages: usize,
    pub marketplace_id: String,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.opensea.io/api/v2".to_string(),
            api_key: None,
            page_size: 50,
            max_pages: 20,
            marketplace_id: "opensea".to_string(),
        }
    }
}

/// A single active listing, reduced to the price the liquidity score needs.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Listing {
    pub price_eth: f64,
}

#[derive(Debug, Deserialize)]
struct EventsPage {
    #[serde(default)]
    asset_events: Vec<RawAssetEvent>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAssetEvent {
    transaction: Option<String>,
    #[serde(default)]
    payment: Option<RawPayment>,
    seller: Option<String>,
    buyer: Option<String>,
    #[serde(default)]
    nft: Option<RawNft>,
    event_timestamp: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawPayment {
    symbol: String,
    quantity: String,
    decimals: u8,
}

#[derive(Debug, Deserialize)]
struct RawNft {
    identifier: Option<String>,
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListingsPage {
    #[serde(default)]
    listings: Vec<RawListing>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawListing {
    price: Option<RawListingPrice>,
}

#[derive(Debug, Deserialize)]
struct RawListingPrice {
    current: RawCurrentPrice,
}

#[derive(Debug, Deserialize)]
struct RawCurrentPrice {
    value: String,
    decimals: u8,
}

pub struct MarketplaceReader {
    client: reqwest::Client,
    fetch: Arc<ResilientFetch>,
    config: MarketplaceConfig,
}

impl MarketplaceReader {
    pub fn new(fetch: Arc<ResilientFetch>, config: MarketplaceConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client, fetch, config }
    }

    /// Fetches sale events for `collection` inside `[after, before]`
    /// (unix seconds), paging through the provider's cursor until it is
    /// exhausted, the page ceiling is hit, or `target_count` events have
    /// been collected.
    pub async fn get_sale_events(
        &self,
        collection: &str,
        after: u64,
        before: u64,
        target_count: usize,
    ) -> Result<Vec<SaleEvent>, ProviderError> {
        let mut events: Vec<SaleEvent> = Vec::new();
        let mut cursor: Option<String> = None;

        for page in 0..self.config.max_pages {
            let mut url = self
                .events_url(collection)
                .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
            url.query_pairs_mut()
                .append_pair("event_type", "sale")
                .append_pair("after", &after.to_string())
                .append_pair("before", &before.to_string())
                .append_pair("limit", &self.config.page_size.to_string());
            if let Some(ref c) = cursor {
                url.query_pairs_mut().append_pair("next", c);
            }

            let body: EventsPage = match self.get_json(url).await {
                Ok(body) => body,
                Err(ProviderError::NoDataFound) => break,
                Err(e) => return Err(e),
            };
            metrics::increment_marketplace_pages(1);

            for raw in body.asset_events {
                if let Some(event) = self.to_sale_event(raw) {
                    events.push(event);
                }
            }

            cursor = body.next.filter(|c| !c.is_empty());
            if cursor.is_none() {
                break;
            }
            if target_count > 0 && events.len() >= target_count {
                debug!(
                    "sale event pull satisfied target ({} >= {}) after {} pages",
                    events.len(),
                    target_count,
                    page + 1
                );
                break;
            }
        }

        Ok(events)
    }

    /// Active listings for the collection, reduced to prices. Used by the
    /// liquidity score; bounded by the same page ceiling as events.
    pub async fn get_active_listings(
        &self,
        collection: &str,
    ) -> Result<Vec<Listing>, ProviderError> {
        let mut listings = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..self.config.max_pages {
            let mut url = self
                .listings_url(collection)
                .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
            url.query_pairs_mut()
                .append_pair("limit", &self.config.page_size.to_string());
            if let Some(ref c) = cursor {
                url.query_pairs_mut().append_pair("next", c);
            }

            let body: ListingsPage = match self.get_json(url).await {
                Ok(body) => body,
                Err(ProviderError::NoDataFound) => break,
                Err(e) => return Err(e),
            };
            metrics::increment_marketplace_pages(1);

            for raw in body.listings {
                let Some(price) = raw.price else { continue };
                match raw_quantity_to_amount(&price.current.value, price.current.decimals) {
                    Ok(price_eth) if price_eth > 0.0 => listings.push(Listing { price_eth }),
                    Ok(_) => {}
                    Err(e) => warn!("skipping listing with undecodable price: {}", e),
                }
            }

            cursor = body.next.filter(|c| !c.is_empty());
            if cursor.is_none() {
                break;
            }
        }

        Ok(listings)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, ProviderError> {
        self.fetch
            .run("marketplace", || {
                let url = url.clone();
                async move {
                    let mut request = self.client.get(url);
                    if let Some(ref key) = self.config.api_key {
                        request = request.header("x-api-key", key);
                    }
                    let response = request
                        .send()
                        .await
                        .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
                    if let Some(err) = ProviderError::from_status(response.status()) {
                        return Err(err);
                    }
                    response
                        .json::<T>()
                        .await
                        .map_err(|e| ProviderError::Unavailable(format!("bad body: {}", e)))
                }
            })
            .await
    }

    fn events_url(&self, collection: &str) -> Result<Url, url::ParseError> {
        Url::parse(&format!(
            "{}/events/collection/{}",
            self.config.base_url.trim_end_matches('/'),
            collection
        ))
    }

    fn listings_url(&self, collection: &str) -> Result<Url, url::ParseError> {
        Url::parse(&format!(
            "{}/listings/collection/{}/all",
            self.config.base_url.trim_end_matches('/'),
            collection
        ))
    }

    fn to_sale_event(&self, raw: RawAssetEvent) -> Option<SaleEvent> {
        let tx_hash = raw.transaction?.to_lowercase();
        let timestamp = raw.event_timestamp?;
        let (token_id, image_url) = match raw.nft {
            Some(nft) => (nft.identifier, nft.image_url),
            None => (None, None),
        };
        Some(SaleEvent {
            tx_hash,
            token_id,
            seller: raw.seller.map(|s| s.to_lowercase()),
            buyer: raw.buyer.map(|b| b.to_lowercase()),
            payment: raw.payment.map(|p| SalePayment {
                symbol: p.symbol,
                quantity: p.quantity,
                decimals: p.decimals,
            }),
            timestamp,
            marketplace: self.config.marketplace_id.clone(),
            image_url,
        })
    }
}
