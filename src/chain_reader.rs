//! Chain reader: block-range batched log fetching and contract reads.
//!
//! Sub-ranges are fetched sequentially (never in parallel) so the shared
//! provider quota is respected, with a fixed inter-batch delay. A sub-range
//! whose result count hits the provider's per-call cap exactly is assumed
//! truncated and is recursively halved and re-fetched.

use crate::error::ProviderError;
use crate::resilient_fetch::ResilientFetch;
use crate::types::conversions::{
    topic_to_address, topic_to_u256, tx_hash_to_string, u256_to_amount,
};
use crate::types::{BurnEvent, Transfer};
use dashmap::DashMap;
use ethers::prelude::{Http, Middleware, Provider};
use ethers::types::{Address, BlockNumber, Filter, Log, H256, U256, U64};
use ethers::utils::keccak256;
use futures::future::BoxFuture;
use futures::FutureExt;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

/// `Transfer(address,address,uint256)` event signature, shared by ERC-721
/// and ERC-20 logs (ERC-721 indexes the token id as a third topic).
pub static TRANSFER_TOPIC: Lazy<H256> =
    Lazy::new(|| H256::from(keccak256(b"Transfer(address,address,uint256)")));

#[derive(Debug, Clone)]
pub struct ChainReaderConfig {
    /// Largest block span per `eth_getLogs` call.
    pub batch_size: u64,
    /// Fixed pause between consecutive sub-range calls.
    pub batch_delay: Duration,
    /// Provider per-call result cap; hitting it exactly signals truncation.
    pub result_cap: usize,
    /// Minimum interval between refreshes of the cached chain head.
    pub head_refresh: Duration,
}

impl Default for ChainReaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 10_000,
            batch_delay: Duration::from_millis(250),
            result_cap: 10_000,
            head_refresh: Duration::from_secs(2),
        }
    }
}

pub struct ChainReader {
    provider: Arc<Provider<Http>>,
    fetch: Arc<ResilientFetch>,
    config: ChainReaderConfig,
    /// Block timestamps are immutable: cached unconditionally, never evicted.
    timestamp_cache: DashMap<u64, u64>,
    head_block: AtomicU64,
    head_updated: Mutex<Option<Instant>>,
}

impl ChainReader {
    pub fn new(
        provider: Arc<Provider<Http>>,
        fetch: Arc<ResilientFetch>,
        config: ChainReaderConfig,
    ) -> Self {
        Self {
            provider,
            fetch,
            config,
            timestamp_cache: DashMap::new(),
            head_block: AtomicU64::new(0),
            head_updated: Mutex::new(None),
        }
    }

    /// Current chain head, refreshed at most once per `head_refresh`. On
    /// provider failure the last known head is returned when available.
    pub async fn latest_block(&self) -> Result<u64, ProviderError> {
        let mut updated = self.head_updated.lock().await;
        if let Some(at) = *updated {
            if at.elapsed() < self.config.head_refresh {
                let cached = self.head_block.load(Ordering::Relaxed);
                if cached > 0 {
                    return Ok(cached);
                }
            }
        }

        let result = self
            .fetch
            .run("eth_blockNumber", || async {
                self.provider
                    .get_block_number()
                    .await
                    .map(|n: U64| n.as_u64())
                    .map_err(ProviderError::from_ethers)
            })
            .await;

        match result {
            Ok(head) => {
                self.head_block.store(head, Ordering::Relaxed);
                *updated = Some(Instant::now());
                Ok(head)
            }
            Err(e) => {
                let cached = self.head_block.load(Ordering::Relaxed);
                if cached > 0 {
                    warn!("latest_block failed, using cached head {}: {}", cached, e);
                    Ok(cached)
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Fetches all Transfer logs for `contract` over `[from_block,
    /// to_block]`, batched into sub-ranges of at most `batch_size` blocks
    /// and resolved to [`Transfer`] records with block timestamps attached.
    pub async fn get_logs_batched(
        &self,
        contract: Address,
        from_block: u64,
        to_block: u64,
        batch_size: u64,
    ) -> Result<Vec<Transfer>, ProviderError> {
        let chunks = crate::utils::block_chunks(from_block, to_block, batch_size);
        debug!(
            chunks = chunks.len(),
            from_block, to_block, "fetching transfer logs"
        );

        let mut logs: Vec<Log> = Vec::new();
        for (i, (start, end)) in chunks.iter().enumerate() {
            let batch = self.fetch_range(contract, *start, *end, None).await?;
            logs.extend(batch);
            if i + 1 < chunks.len() {
                sleep(self.config.batch_delay).await;
            }
        }

        let mut transfers = Vec::with_capacity(logs.len());
        for log in logs {
            match self.resolve_transfer(log).await {
                Ok(Some(t)) => transfers.push(t),
                Ok(None) => {}
                Err(e) => return Err(e),
            }
        }
        debug!(count = transfers.len(), "transfer logs resolved");
        Ok(transfers)
    }

    /// Fetches fungible burn logs (`Transfer` with the zero address as
    /// receiver) for the buy-and-burn token, amounts decoded from the log
    /// `data` field at 18 decimals.
    pub async fn get_burn_events(
        &self,
        token: Address,
        from_block: u64,
        to_block: u64,
        batch_size: u64,
    ) -> Result<Vec<BurnEvent>, ProviderError> {
        let chunks = crate::utils::block_chunks(from_block, to_block, batch_size);
        let burn_topic = Some(H256::zero());

        let mut burns = Vec::new();
        for (i, (start, end)) in chunks.iter().enumerate() {
            let logs = self.fetch_range(token, *start, *end, burn_topic).await?;
            for log in logs {
                let (Some(tx_hash), Some(block)) = (log.transaction_hash, log.block_number) else {
                    continue;
                };
                let amount = U256::from_big_endian(log.data.as_ref());
                let amount = match u256_to_amount(amount, 18) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!("skipping burn log with undecodable amount: {}", e);
                        continue;
                    }
                };
                let block = block.as_u64();
                burns.push(BurnEvent {
                    tx_hash: tx_hash_to_string(tx_hash),
                    block_number: block,
                    timestamp: self.get_block_timestamp(block).await?,
                    amount,
                });
            }
            if i + 1 < chunks.len() {
                sleep(self.config.batch_delay).await;
            }
        }
        Ok(burns)
    }

    /// Block timestamp with an unconditional, never-expiring cache.
    pub async fn get_block_timestamp(&self, block_number: u64) -> Result<u64, ProviderError> {
        if let Some(ts) = self.timestamp_cache.get(&block_number) {
            return Ok(*ts);
        }
        let ts = self
            .fetch
            .run("eth_getBlockByNumber", || async {
                let block = self
                    .provider
                    .get_block(BlockNumber::Number(block_number.into()))
                    .await
                    .map_err(ProviderError::from_ethers)?;
                block
                    .map(|b| b.timestamp.as_u64())
                    .ok_or(ProviderError::NoDataFound)
            })
            .await?;
        self.timestamp_cache.insert(block_number, ts);
        Ok(ts)
    }

    /// One `eth_getLogs` call for `[from, to]`. If the result count hits
    /// the provider cap exactly, the range is halved and both halves are
    /// re-fetched — the cap is a truncation signal, not a page size.
    fn fetch_range<'a>(
        &'a self,
        contract: Address,
        from: u64,
        to: u64,
        to_topic: Option<H256>,
    ) -> BoxFuture<'a, Result<Vec<Log>, ProviderError>> {
        async move {
            let mut filter = Filter::new()
                .address(contract)
                .topic0(*TRANSFER_TOPIC)
                .from_block(from)
                .to_block(to);
            if let Some(receiver) = to_topic {
                filter = filter.topic2(receiver);
            }

            let logs = self
                .fetch
                .run("eth_getLogs", || {
                    let filter = filter.clone();
                    async move {
                        self.provider
                            .get_logs(&filter)
                            .await
                            .map_err(ProviderError::from_ethers)
                    }
                })
                .await?;

            if logs.len() >= self.config.result_cap && from < to {
                let mid = from + (to - from) / 2;
                warn!(
                    from,
                    to,
                    count = logs.len(),
                    "result cap hit, halving range"
                );
                let mut left = self.fetch_range(contract, from, mid, to_topic).await?;
                let right = self.fetch_range(contract, mid + 1, to, to_topic).await?;
                left.extend(right);
                return Ok(left);
            }
            Ok(logs)
        }
        .boxed()
    }

    /// Decodes an ERC-721 Transfer log, attaching the (cached) block
    /// timestamp. Logs missing indexed topics or receipt fields are skipped.
    async fn resolve_transfer(&self, log: Log) -> Result<Option<Transfer>, ProviderError> {
        if log.topics.len() < 4 {
            // ERC-20 style Transfer without an indexed token id.
            return Ok(None);
        }
        let (Some(tx_hash), Some(block)) = (log.transaction_hash, log.block_number) else {
            warn!("skipping pending log without receipt fields");
            return Ok(None);
        };
        let block = block.as_u64();
        Ok(Some(Transfer {
            tx_hash,
            block_number: block,
            timestamp: self.get_block_timestamp(block).await?,
            from: topic_to_address(log.topics[1]),
            to: topic_to_address(log.topics[2]),
            token_id: topic_to_u256(log.topics[3]),
            log_index: log.log_index.map(|i| i.as_u64()),
        }))
    }
}
