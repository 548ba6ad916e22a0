//! Cache-fronted service layer over the sync pipeline.
//!
//! One market snapshot (transfers + enrichment + ledger replay) feeds every
//! endpoint; the snapshot itself is cache-fronted so concurrent handlers
//! share a single sync. Each endpoint additionally caches its own derived
//! payload under its own key and TTL, served with stale-while-revalidate and
//! a handler deadline that falls back to the last cached value.

use crate::analytics::{
    analyze_traders, daily_rollup, detect_flips, floor_estimate, link_burn_cycles,
    liquidity_score, momentum, rsi, Flip, ListingSnapshot, SaleProceeds, TraderAnalysis,
};
use crate::cache::{Cache, MemoryCache};
use crate::cached_fetch::with_deadline;
use crate::chain_reader::ChainReader;
use crate::database::{self, PgCache};
use crate::marketplace_reader::MarketplaceReader;
use crate::metrics;
use crate::price_enrichment::PriceEnricher;
use crate::price_feed::PriceFeed;
use crate::rate_limiter::ProviderRateLimiter;
use crate::resilient_fetch::ResilientFetch;
use crate::settings::{CacheBackend, Settings};
use crate::types::conversions::string_to_address;
use crate::types::{BurnCycle, DailyStat, EnrichedSale, Served, TokenLifecycle, Transfer};
use crate::ledger_replay;
use crate::utils::now_secs;
use anyhow::Context;
use ethers::prelude::{Http, Provider};
use ethers::types::Address;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

const SECS_PER_DAY: u64 = 86_400;

/// Full reconciled view of the collection over the sync window. The one
/// expensive artifact; everything the endpoints serve derives from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub transfers: Vec<Transfer>,
    pub sales: Vec<EnrichedSale>,
    pub unmatched_count: usize,
    pub coverage: f64,
    pub low_coverage: bool,
    pub holder_count: usize,
    pub distinct_tokens: usize,
    pub lifecycles: HashMap<String, TokenLifecycle>,
    pub burns: Vec<crate::types::BurnEvent>,
    pub listings: Option<ListingSnapshot>,
    pub eth_usd: Option<f64>,
    pub from_block: u64,
    pub to_block: u64,
    pub synced_at: u64,
}

/// Headline collection aggregates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    pub holder_count: usize,
    pub distinct_tokens: usize,
    pub total_sales: usize,
    pub total_volume_eth: f64,
    pub floor_price_eth: Option<f64>,
    pub last_sale: Option<EnrichedSale>,
    pub coverage: f64,
    pub low_coverage: bool,
    pub synced_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketIndicators {
    pub rsi: f64,
    pub momentum: f64,
    pub liquidity_score: f64,
    pub floor_price_eth: Option<f64>,
    pub sales_per_day: f64,
}

#[derive(Clone)]
pub struct MarketDataService {
    settings: Arc<Settings>,
    cache: Arc<dyn Cache>,
    chain: Arc<ChainReader>,
    marketplace: Arc<MarketplaceReader>,
    enricher: Arc<PriceEnricher>,
    price_feed: Arc<PriceFeed>,
    contract: Address,
    strategy: Option<Address>,
    burn_token: Option<Address>,
}

impl MarketDataService {
    pub fn new(
        settings: Arc<Settings>,
        cache: Arc<dyn Cache>,
        chain: Arc<ChainReader>,
        marketplace: Arc<MarketplaceReader>,
        enricher: Arc<PriceEnricher>,
        price_feed: Arc<PriceFeed>,
    ) -> anyhow::Result<Self> {
        let contract = string_to_address(&settings.collection.contract)
            .context("collection.contract is not a valid address")?;
        let strategy = settings
            .collection
            .strategy_address
            .as_deref()
            .map(string_to_address)
            .transpose()
            .context("collection.strategy_address is not a valid address")?;
        let burn_token = settings
            .collection
            .burn_token
            .as_deref()
            .map(string_to_address)
            .transpose()
            .context("collection.burn_token is not a valid address")?;
        Ok(Self {
            settings,
            cache,
            chain,
            marketplace,
            enricher,
            price_feed,
            contract,
            strategy,
            burn_token,
        })
    }

    /// Builds the whole service stack from configuration: logging, metric
    /// descriptions, provider, the shared limiter and retry policy, both
    /// readers, the enricher, the price feed, and the configured cache
    /// backend. The Postgres backend connects via `DATABASE_URL`.
    pub async fn from_settings(settings: Arc<Settings>) -> anyhow::Result<Self> {
        crate::utils::init_logging(&settings.log.level);
        metrics::describe_metrics();

        let cache: Arc<dyn Cache> = match settings.cache.backend {
            CacheBackend::Memory => Arc::new(MemoryCache::new()),
            CacheBackend::Postgres => Arc::new(PgCache::new(database::connect().await?)),
        };

        let provider = Provider::<Http>::try_from(settings.rpc.url.as_str())
            .context("rpc.url is not a valid endpoint")?;
        let limiter = Arc::new(ProviderRateLimiter::new(settings.rpc.limiter_budget()));
        let fetch = Arc::new(ResilientFetch::new(limiter, settings.rpc.retry_policy()));

        let chain = Arc::new(ChainReader::new(
            Arc::new(provider),
            Arc::clone(&fetch),
            settings.collection.chain_reader_config(),
        ));
        let marketplace = Arc::new(MarketplaceReader::new(
            Arc::clone(&fetch),
            settings.marketplace.reader_config(),
        ));
        let enricher = Arc::new(PriceEnricher::new(
            Arc::clone(&marketplace),
            Arc::clone(&cache),
            settings.analytics.enrichment_config(),
        ));
        let price_feed = Arc::new(PriceFeed::new(settings.price_feed.feed_config()));

        Self::new(settings, cache, chain, marketplace, enricher, price_feed)
    }

    /// Runs the full sync pipeline: transfer pull and spot price in
    /// parallel, then enrichment, ledger replay, burn pull, and the listing
    /// book. Listings are best-effort; their failure never fails a build.
    pub async fn build_snapshot(&self) -> anyhow::Result<MarketSnapshot> {
        let started = Instant::now();
        let head = self.chain.latest_block().await?;
        let from_block = head.saturating_sub(self.settings.collection.initial_sync_blocks);
        let chunk = self.settings.collection.get_logs_chunk_size;

        let (transfers, eth_usd) = futures::join!(
            self.chain
                .get_logs_batched(self.contract, from_block, head, chunk),
            self.price_feed.eth_usd(),
        );
        let transfers = transfers?;

        let outcome = self
            .enricher
            .enrich(&transfers, &self.settings.marketplace.collection_slug, eth_usd)
            .await?;
        metrics::set_enrichment_coverage(outcome.coverage);

        let prices_by_tx: HashMap<String, f64> = outcome
            .sales
            .iter()
            .map(|s| (s.tx_hash.clone(), s.price_eth))
            .collect();
        let replayed = ledger_replay::replay(&transfers, self.strategy, &prices_by_tx);

        let burns = match self.burn_token {
            Some(token) => {
                self.chain
                    .get_burn_events(token, from_block, head, chunk)
                    .await?
            }
            None => Vec::new(),
        };

        let listings = match self
            .marketplace
            .get_active_listings(&self.settings.marketplace.collection_slug)
            .await
        {
            Ok(book) if !book.is_empty() => {
                let min = book.iter().map(|l| l.price_eth).fold(f64::MAX, f64::min);
                let max = book.iter().map(|l| l.price_eth).fold(0.0, f64::max);
                Some(ListingSnapshot {
                    count: book.len(),
                    min_price_eth: min,
                    max_price_eth: max,
                })
            }
            Ok(_) => None,
            Err(e) => {
                warn!("listing pull failed, snapshot proceeds without it: {}", e);
                None
            }
        };

        let mut sales = outcome.sales;
        sales.sort_by_key(|s| s.timestamp);

        metrics::set_snapshot_sizes(transfers.len(), sales.len());
        metrics::record_snapshot_build(started.elapsed());
        info!(
            "snapshot built: {} transfers, {} sales, {} holders, blocks {}..={} in {:?}",
            transfers.len(),
            sales.len(),
            replayed.holder_count(),
            from_block,
            head,
            started.elapsed()
        );

        Ok(MarketSnapshot {
            unmatched_count: outcome.unmatched.len(),
            coverage: outcome.coverage,
            low_coverage: outcome.low_coverage,
            holder_count: replayed.holder_count(),
            distinct_tokens: replayed.distinct_tokens(),
            lifecycles: replayed.lifecycles(),
            transfers,
            sales,
            burns,
            listings,
            eth_usd,
            from_block,
            to_block: head,
            synced_at: now_secs(),
        })
    }

    /// The cache-fronted snapshot every endpoint derives from.
    pub async fn snapshot(&self) -> anyhow::Result<Served<MarketSnapshot>> {
        let svc = self.clone();
        with_deadline(
            Arc::clone(&self.cache),
            "market:snapshot",
            self.handler_budget(),
            Duration::from_secs(self.settings.cache.snapshot_ttl_seconds),
            move || async move { svc.build_snapshot().await },
        )
        .await
    }

    pub async fn collection_stats(&self) -> anyhow::Result<Served<CollectionStats>> {
        let svc = self.clone();
        self.endpoint(
            "market:stats".to_string(),
            self.settings.cache.stats_ttl_seconds,
            move || async move {
                let snapshot = svc.snapshot().await?.value;
                let floor = floor_estimate(&snapshot.sales, now_secs());
                Ok(CollectionStats {
                    holder_count: snapshot.holder_count,
                    distinct_tokens: snapshot.distinct_tokens,
                    total_sales: snapshot.sales.len(),
                    total_volume_eth: snapshot.sales.iter().map(|s| s.price_eth).sum(),
                    floor_price_eth: floor,
                    last_sale: snapshot.sales.last().cloned(),
                    coverage: snapshot.coverage,
                    low_coverage: snapshot.low_coverage,
                    synced_at: snapshot.synced_at,
                })
            },
        )
        .await
    }

    /// Enriched sales, newest first, paginated.
    pub async fn recent_sales(
        &self,
        offset: usize,
        limit: usize,
    ) -> anyhow::Result<Served<Vec<EnrichedSale>>> {
        let svc = self.clone();
        self.endpoint(
            format!("market:sales:{}:{}", offset, limit),
            self.settings.cache.sales_ttl_seconds,
            move || async move {
                let snapshot = svc.snapshot().await?.value;
                Ok(snapshot
                    .sales
                    .iter()
                    .rev()
                    .skip(offset)
                    .take(limit)
                    .cloned()
                    .collect())
            },
        )
        .await
    }

    pub async fn daily_stats(&self, days: u64) -> anyhow::Result<Served<Vec<DailyStat>>> {
        let svc = self.clone();
        self.endpoint(
            format!("market:daily:{}", days),
            self.settings.cache.daily_ttl_seconds,
            move || async move {
                let snapshot = svc.snapshot().await?.value;
                let now = now_secs();
                let floor = floor_estimate(&snapshot.sales, now);
                let recent = window_sales(&snapshot.sales, now, days);
                Ok(daily_rollup(&recent, floor))
            },
        )
        .await
    }

    pub async fn trader_analysis(&self, days: u64) -> anyhow::Result<Served<TraderAnalysis>> {
        let svc = self.clone();
        self.endpoint(
            format!("market:traders:{}", days),
            self.settings.cache.traders_ttl_seconds,
            move || async move {
                let snapshot = svc.snapshot().await?.value;
                let recent = window_sales(&snapshot.sales, now_secs(), days);
                Ok(analyze_traders(&recent))
            },
        )
        .await
    }

    pub async fn market_indicators(&self) -> anyhow::Result<Served<MarketIndicators>> {
        let svc = self.clone();
        self.endpoint(
            "market:indicators".to_string(),
            self.settings.cache.indicators_ttl_seconds,
            move || async move {
                let snapshot = svc.snapshot().await?.value;
                let now = now_secs();
                let floor = floor_estimate(&snapshot.sales, now);
                let daily = daily_rollup(&snapshot.sales, floor);
                let averages: Vec<f64> = daily.iter().map(|d| d.avg_price_eth).collect();
                let recent_sales = window_sales(&snapshot.sales, now, 7).len();
                let sales_per_day = recent_sales as f64 / 7.0;
                Ok(MarketIndicators {
                    rsi: rsi(&averages),
                    momentum: momentum(&averages),
                    liquidity_score: liquidity_score(snapshot.listings.as_ref(), sales_per_day),
                    floor_price_eth: floor,
                    sales_per_day,
                })
            },
        )
        .await
    }

    pub async fn burn_cycles(&self) -> anyhow::Result<Served<Vec<BurnCycle>>> {
        let svc = self.clone();
        self.endpoint(
            "market:burns".to_string(),
            self.settings.cache.burns_ttl_seconds,
            move || async move {
                let snapshot = svc.snapshot().await?.value;
                let proceeds = strategy_proceeds(&snapshot.lifecycles);
                Ok(link_burn_cycles(&proceeds, &snapshot.burns))
            },
        )
        .await
    }

    pub async fn flips(&self) -> anyhow::Result<Served<Vec<Flip>>> {
        let svc = self.clone();
        self.endpoint(
            "market:flips".to_string(),
            self.settings.cache.sales_ttl_seconds,
            move || async move {
                let snapshot = svc.snapshot().await?.value;
                Ok(detect_flips(&snapshot.sales))
            },
        )
        .await
    }

    fn handler_budget(&self) -> Duration {
        Duration::from_secs(self.settings.handlers.timeout_seconds)
    }

    async fn endpoint<T, F, Fut>(
        &self,
        key: String,
        ttl_seconds: u64,
        fetch: F,
    ) -> anyhow::Result<Served<T>>
    where
        T: Serialize + serde::de::DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        with_deadline(
            Arc::clone(&self.cache),
            &key,
            self.handler_budget(),
            Duration::from_secs(ttl_seconds),
            fetch,
        )
        .await
    }
}

/// Sales within the trailing `days` window, order preserved.
fn window_sales(sales: &[EnrichedSale], now: u64, days: u64) -> Vec<EnrichedSale> {
    let cutoff = now.saturating_sub(days * SECS_PER_DAY);
    sales
        .iter()
        .filter(|s| s.timestamp >= cutoff)
        .cloned()
        .collect()
}

/// Priced strategy sale legs, the candidate funding side of burn cycles.
fn strategy_proceeds(lifecycles: &HashMap<String, TokenLifecycle>) -> Vec<SaleProceeds> {
    lifecycles
        .values()
        .filter_map(|lc| lc.sale.as_ref())
        .filter_map(|leg| {
            leg.price_eth.map(|price| SaleProceeds {
                tx_hash: leg.tx_hash.clone(),
                timestamp: leg.timestamp,
                proceeds_eth: price,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CurrencyKind, TokenStatus, TradeLeg};

    fn sale(price: f64, timestamp: u64) -> EnrichedSale {
        EnrichedSale {
            tx_hash: format!("0x{:064x}", timestamp),
            token_id: "1".to_string(),
            block_number: 1,
            timestamp,
            seller: "0xa".to_string(),
            buyer: "0xb".to_string(),
            price_eth: price,
            price_usd: None,
            currency: CurrencyKind::Native,
            currency_symbol: "ETH".to_string(),
        }
    }

    #[test]
    fn window_filters_by_cutoff() {
        let now = 1_700_000_000;
        let sales = vec![
            sale(1.0, now - 8 * SECS_PER_DAY),
            sale(2.0, now - 2 * SECS_PER_DAY),
        ];
        let recent = window_sales(&sales, now, 7);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].price_eth, 2.0);
    }

    #[test]
    fn proceeds_require_a_priced_sale_leg() {
        let mut lifecycles = HashMap::new();
        lifecycles.insert(
            "1".to_string(),
            TokenLifecycle {
                status: TokenStatus::Sold,
                purchase: None,
                sale: Some(TradeLeg {
                    timestamp: 100,
                    tx_hash: "0xsold".to_string(),
                    price_eth: Some(3.0),
                    counterparty: None,
                }),
            },
        );
        lifecycles.insert(
            "2".to_string(),
            TokenLifecycle {
                status: TokenStatus::Sold,
                purchase: None,
                sale: Some(TradeLeg {
                    timestamp: 200,
                    tx_hash: "0xunpriced".to_string(),
                    price_eth: None,
                    counterparty: None,
                }),
            },
        );
        let proceeds = strategy_proceeds(&lifecycles);
        assert_eq!(proceeds.len(), 1);
        assert_eq!(proceeds[0].proceeds_eth, 3.0);
    }
}
