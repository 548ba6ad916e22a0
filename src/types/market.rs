//! Core market-data records.
//!
//! `Transfer` is the on-chain source of truth for ownership, `SaleEvent` is
//! the marketplace's view of the same transaction, and `EnrichedSale` is the
//! reconciled join of the two. Everything that crosses the cache boundary is
//! serde-serializable.

use chrono::NaiveDate;
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

use super::conversions::{address_to_string, tx_hash_to_string};

/// A single ERC-721 transfer log. Immutable once observed on-chain; never
/// mutated or deleted after ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub tx_hash: H256,
    pub block_number: u64,
    /// Block timestamp in unix seconds.
    pub timestamp: u64,
    pub from: Address,
    pub to: Address,
    pub token_id: U256,
    pub log_index: Option<u64>,
}

impl Transfer {
    pub fn is_mint(&self) -> bool {
        self.from.is_zero()
    }

    pub fn is_burn(&self) -> bool {
        self.to.is_zero()
    }

    /// Lowercased tx hash, the join key against marketplace events.
    pub fn tx_key(&self) -> String {
        tx_hash_to_string(self.tx_hash)
    }
}

/// Payment details attached to a marketplace sale event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalePayment {
    pub symbol: String,
    /// Raw integer quantity as reported by the marketplace (e.g. wei).
    pub quantity: String,
    pub decimals: u8,
}

/// A marketplace sale event. May or may not have a matching on-chain
/// transfer in our window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleEvent {
    /// Lowercased transaction hash.
    pub tx_hash: String,
    pub token_id: Option<String>,
    pub seller: Option<String>,
    pub buyer: Option<String>,
    pub payment: Option<SalePayment>,
    pub timestamp: u64,
    pub marketplace: String,
    pub image_url: Option<String>,
}

/// Currency classification for a sale, by payment symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurrencyKind {
    Native,
    Wrapped,
    Other,
}

impl CurrencyKind {
    pub fn classify(symbol: &str) -> Self {
        match symbol.to_uppercase().as_str() {
            "ETH" => CurrencyKind::Native,
            "WETH" => CurrencyKind::Wrapped,
            _ => CurrencyKind::Other,
        }
    }
}

/// A transfer joined with the marketplace event that priced it.
///
/// Invariant: an `EnrichedSale` exists only when a price match was found;
/// unmatched transfers are retained separately without a price and are
/// excluded from all volume/price aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedSale {
    pub tx_hash: String,
    pub token_id: String,
    pub block_number: u64,
    pub timestamp: u64,
    pub seller: String,
    pub buyer: String,
    pub price_eth: f64,
    pub price_usd: Option<f64>,
    pub currency: CurrencyKind,
    pub currency_symbol: String,
}

impl EnrichedSale {
    pub fn from_parts(
        transfer: &Transfer,
        price_eth: f64,
        price_usd: Option<f64>,
        currency: CurrencyKind,
        currency_symbol: String,
    ) -> Self {
        Self {
            tx_hash: transfer.tx_key(),
            token_id: transfer.token_id.to_string(),
            block_number: transfer.block_number,
            timestamp: transfer.timestamp,
            seller: address_to_string(transfer.from),
            buyer: address_to_string(transfer.to),
            price_eth,
            price_usd,
            currency,
            currency_symbol,
        }
    }
}

/// One leg (purchase or sale) of a token's lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLeg {
    pub timestamp: u64,
    pub tx_hash: String,
    pub price_eth: Option<f64>,
    pub counterparty: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
    Held,
    Sold,
}

/// Per-token lifecycle derived from transfer replay. Rebuilt in full on
/// every sync, never patched incrementally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenLifecycle {
    pub status: TokenStatus,
    pub purchase: Option<TradeLeg>,
    pub sale: Option<TradeLeg>,
}

/// A fungible-token burn parsed from a Transfer-to-zero log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnEvent {
    pub tx_hash: String,
    pub block_number: u64,
    pub timestamp: u64,
    pub amount: f64,
}

/// A sale linked (or not) to a subsequent token burn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnCycle {
    /// `None` for standalone cycles: a burn with no sale inside the
    /// matching window.
    pub sale_tx: Option<String>,
    pub proceeds_eth: f64,
    pub tokens_burned: f64,
    pub burn_tx: String,
    pub burn_timestamp: u64,
    pub efficiency: f64,
}

/// One row per UTC calendar date aggregating that day's enriched sales.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStat {
    pub date: NaiveDate,
    pub volume_eth: f64,
    pub sale_count: usize,
    pub min_price_eth: f64,
    pub max_price_eth: f64,
    pub avg_price_eth: f64,
    /// Sales at or above 110% / 125% / 150% of the floor estimate.
    pub sales_above_10pct: usize,
    pub sales_above_25pct: usize,
    pub sales_above_50pct: usize,
    pub native_count: usize,
    pub native_volume_eth: f64,
    pub wrapped_count: usize,
    pub wrapped_volume_eth: f64,
    pub other_count: usize,
    pub other_volume_eth: f64,
}

/// Freshness tag attached to every served payload so consumers can
/// distinguish fresh results from stale or fallback data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Freshness {
    /// Computed (or cached) within the entry's TTL.
    Fresh,
    /// Served from an expired cache entry while a background refresh runs.
    Stale,
    /// Served from the last cached value after a failure or deadline.
    Fallback,
}

/// A cached value plus its freshness tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Served<T> {
    pub value: T,
    pub freshness: Freshness,
}

impl<T> Served<T> {
    pub fn fresh(value: T) -> Self {
        Self { value, freshness: Freshness::Fresh }
    }

    pub fn stale(value: T) -> Self {
        Self { value, freshness: Freshness::Stale }
    }

    pub fn fallback(value: T) -> Self {
        Self { value, freshness: Freshness::Fallback }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_classification() {
        assert_eq!(CurrencyKind::classify("ETH"), CurrencyKind::Native);
        assert_eq!(CurrencyKind::classify("eth"), CurrencyKind::Native);
        assert_eq!(CurrencyKind::classify("WETH"), CurrencyKind::Wrapped);
        assert_eq!(CurrencyKind::classify("USDC"), CurrencyKind::Other);
    }
}
