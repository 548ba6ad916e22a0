//! NFT collection market-data SDK: reconciles on-chain transfer history
//! with marketplace sale events into a cached, query-ready view.
//!
//! ## Features
//! - Batched, rate-limited `eth_getLogs` sync with automatic range halving
//!   when the provider truncates results
//! - Transfer/sale-event reconciliation by transaction hash, with permanent
//!   per-transaction price caching
//! - Event-sourced holder and token-lifecycle replay
//! - Derived analytics: floor estimate, daily rollups, RSI/momentum/
//!   liquidity indicators, flips, trader activity, burn-cycle linkage
//! - Stale-while-revalidate caching (memory or Postgres) with handler
//!   deadlines and freshness-tagged responses

pub mod analytics;
pub mod cache;
pub mod cached_fetch;
pub mod chain_reader;
pub mod database;
pub mod error;
pub mod ledger_replay;
pub mod market_service;
pub mod marketplace_reader;
pub mod metrics;
pub mod price_enrichment;
pub mod price_feed;
pub mod rate_limiter;
pub mod resilient_fetch;
pub mod settings;
pub mod types;
pub mod utils;

pub use cache::{Cache, CacheLookup, MemoryCache};
pub use chain_reader::{ChainReader, ChainReaderConfig};
pub use error::ProviderError;
pub use market_service::{CollectionStats, MarketDataService, MarketIndicators, MarketSnapshot};
pub use marketplace_reader::{MarketplaceConfig, MarketplaceReader};
pub use price_enrichment::{EnrichmentConfig, PriceEnricher};
pub use price_feed::{PriceFeed, PriceFeedConfig};
pub use rate_limiter::{ProviderRateLimiter, RateLimit};
pub use resilient_fetch::{ResilientFetch, RetryPolicy};
pub use settings::Settings;
pub use types::{EnrichedSale, Freshness, SaleEvent, Served, Transfer};
