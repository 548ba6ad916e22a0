//! Price enrichment: joins on-chain transfers against marketplace sale
//! events by transaction hash to recover trade prices.
//!
//! Matches are persisted into the cache keyed by tx hash — a finalized
//! trade's price never changes, so these entries are effectively permanent.
//! Transfers with no match stay visible as raw facts but are excluded from
//! every price/volume aggregate.

use crate::cache::{Cache, PERMANENT_TTL};
use crate::cached_fetch::{get_quiet, set_quiet};
use crate::marketplace_reader::MarketplaceReader;
use crate::types::conversions::raw_quantity_to_amount;
use crate::types::{CurrencyKind, EnrichedSale, SaleEvent, Transfer};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Per-transaction price persisted in the cache after a successful match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSalePrice {
    pub price_eth: f64,
    pub price_usd: Option<f64>,
    pub currency: CurrencyKind,
    pub currency_symbol: String,
}

/// Result of one enrichment pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentOutcome {
    pub sales: Vec<EnrichedSale>,
    /// Trade transfers with no marketplace match; retained as raw facts.
    pub unmatched: Vec<Transfer>,
    /// matched / previously-uncached, in [0, 1]. 1.0 when nothing was
    /// uncached.
    pub coverage: f64,
    /// Data-quality flag, not a failure: enrichment degrades gracefully.
    pub low_coverage: bool,
}

#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    /// Coverage below this ratio raises the `low_coverage` flag.
    pub low_coverage_threshold: f64,
    /// Event pull target as a multiple of the uncached transfer count.
    pub event_target_multiplier: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self { low_coverage_threshold: 0.5, event_target_multiplier: 2 }
    }
}

pub struct PriceEnricher {
    marketplace: Arc<MarketplaceReader>,
    cache: Arc<dyn Cache>,
    config: EnrichmentConfig,
}

fn sale_cache_key(tx_key: &str) -> String {
    format!("sale:{}", tx_key)
}

impl PriceEnricher {
    pub fn new(
        marketplace: Arc<MarketplaceReader>,
        cache: Arc<dyn Cache>,
        config: EnrichmentConfig,
    ) -> Self {
        Self { marketplace, cache, config }
    }

    /// Enriches `transfers` with marketplace prices.
    ///
    /// Mints and burns are excluded up front. Transfers whose tx hash is
    /// already priced in the cache skip the provider entirely; the rest
    /// trigger one windowed event pull bounded by the page ceiling and a
    /// `2x uncached` collection target.
    pub async fn enrich(
        &self,
        transfers: &[Transfer],
        collection: &str,
        eth_usd: Option<f64>,
    ) -> anyhow::Result<EnrichmentOutcome> {
        let trades: Vec<&Transfer> = transfers
            .iter()
            .filter(|t| !t.is_mint() && !t.is_burn())
            .collect();

        let mut sales = Vec::new();
        let mut uncached: Vec<&Transfer> = Vec::new();

        for transfer in &trades {
            let key = sale_cache_key(&transfer.tx_key());
            match get_quiet(&self.cache, &key, false).await {
                Some(raw) => match serde_json::from_value::<CachedSalePrice>(raw) {
                    Ok(cached) => sales.push(EnrichedSale::from_parts(
                        transfer,
                        cached.price_eth,
                        cached.price_usd,
                        cached.currency,
                        cached.currency_symbol,
                    )),
                    Err(e) => {
                        warn!("cached price for {} undecodable, refetching: {}", key, e);
                        uncached.push(transfer);
                    }
                },
                None => uncached.push(transfer),
            }
        }

        if uncached.is_empty() {
            debug!("enrichment: all {} trades served from cache", trades.len());
            return Ok(EnrichmentOutcome {
                sales,
                unmatched: Vec::new(),
                coverage: 1.0,
                low_coverage: false,
            });
        }

        let after = uncached.iter().map(|t| t.timestamp).min().unwrap_or(0);
        let before = uncached.iter().map(|t| t.timestamp).max().unwrap_or(0);
        let target = uncached.len() * self.config.event_target_multiplier;
        let events = self
            .marketplace
            .get_sale_events(collection, after, before, target)
            .await?;

        let uncached_owned: Vec<Transfer> = uncached.into_iter().cloned().collect();
        let (matched, unmatched) = match_transfers(&uncached_owned, &events, eth_usd);

        let coverage = if uncached_owned.is_empty() {
            1.0
        } else {
            matched.len() as f64 / uncached_owned.len() as f64
        };
        let low_coverage = coverage < self.config.low_coverage_threshold;
        if low_coverage {
            warn!(
                "enrichment coverage {:.0}% ({}/{} transfers matched)",
                coverage * 100.0,
                matched.len(),
                uncached_owned.len()
            );
        } else {
            info!(
                "enrichment coverage {:.0}% ({}/{} transfers matched)",
                coverage * 100.0,
                matched.len(),
                uncached_owned.len()
            );
        }

        for sale in &matched {
            let cached = CachedSalePrice {
                price_eth: sale.price_eth,
                price_usd: sale.price_usd,
                currency: sale.currency,
                currency_symbol: sale.currency_symbol.clone(),
            };
            if let Ok(raw) = serde_json::to_value(&cached) {
                set_quiet(&self.cache, &sale_cache_key(&sale.tx_hash), raw, PERMANENT_TTL).await;
            }
        }

        sales.extend(matched);
        Ok(EnrichmentOutcome { sales, unmatched, coverage, low_coverage })
    }
}

/// Pure join core: matches transfers to marketplace events by lowercased
/// transaction hash. Duplicate events for one hash resolve last-write-wins.
/// Only events carrying payment info produce an [`EnrichedSale`].
pub fn match_transfers(
    transfers: &[Transfer],
    events: &[SaleEvent],
    eth_usd: Option<f64>,
) -> (Vec<EnrichedSale>, Vec<Transfer>) {
    let mut by_tx: HashMap<String, &SaleEvent> = HashMap::new();
    for event in events {
        by_tx.insert(event.tx_hash.to_lowercase(), event);
    }

    let mut matched = Vec::new();
    let mut unmatched = Vec::new();
    for transfer in transfers {
        let event = by_tx.get(&transfer.tx_key());
        let Some(payment) = event.and_then(|e| e.payment.as_ref()) else {
            unmatched.push(transfer.clone());
            continue;
        };
        let price_eth = match raw_quantity_to_amount(&payment.quantity, payment.decimals) {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    "payment for {} undecodable ({}), keeping transfer unpriced",
                    transfer.tx_key(),
                    e
                );
                unmatched.push(transfer.clone());
                continue;
            }
        };
        let currency = CurrencyKind::classify(&payment.symbol);
        // USD conversion only holds for ETH-denominated payments.
        let price_usd = match currency {
            CurrencyKind::Other => None,
            _ => eth_usd.map(|rate| price_eth * rate),
        };
        matched.push(EnrichedSale::from_parts(
            transfer,
            price_eth,
            price_usd,
            currency,
            payment.symbol.clone(),
        ));
    }
    (matched, unmatched)
}
