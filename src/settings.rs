use crate::chain_reader::ChainReaderConfig;
use crate::marketplace_reader::MarketplaceConfig;
use crate::price_enrichment::EnrichmentConfig;
use crate::price_feed::PriceFeedConfig;
use crate::resilient_fetch::RetryPolicy;
use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Rpc {
    #[serde(default = "default_rpc_url")]
    pub url: String,
    #[serde(default = "default_calls_per_second")]
    pub calls_per_second: f64,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}
fn default_calls_per_second() -> f64 {
    5.0
}
fn default_request_timeout_seconds() -> u64 {
    5
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    200
}
fn default_backoff_max_ms() -> u64 {
    5000
}

impl Default for Rpc {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            calls_per_second: default_calls_per_second(),
            request_timeout_seconds: default_request_timeout_seconds(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

impl Rpc {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            request_timeout: Duration::from_secs(self.request_timeout_seconds),
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            backoff_cap: Duration::from_millis(self.backoff_max_ms),
        }
    }

    /// Calls-per-second budget as the limiter's whole-number quota, at
    /// least one.
    pub fn limiter_budget(&self) -> u32 {
        self.calls_per_second.max(1.0).round() as u32
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Collection {
    #[serde(default)]
    pub contract: String,
    /// Address whose buys/sells are tracked as strategy trade legs.
    #[serde(default)]
    pub strategy_address: Option<String>,
    /// ERC-20 whose burns are linked to sale proceeds.
    #[serde(default)]
    pub burn_token: Option<String>,
    #[serde(default = "default_initial_sync_blocks")]
    pub initial_sync_blocks: u64,
    #[serde(default = "default_get_logs_chunk_size")]
    pub get_logs_chunk_size: u64,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    #[serde(default = "default_provider_result_cap")]
    pub provider_result_cap: usize,
}

fn default_initial_sync_blocks() -> u64 {
    500_000
}
fn default_get_logs_chunk_size() -> u64 {
    10_000
}
fn default_batch_delay_ms() -> u64 {
    250
}
fn default_provider_result_cap() -> usize {
    10_000
}

impl Default for Collection {
    fn default() -> Self {
        Self {
            contract: String::new(),
            strategy_address: None,
            burn_token: None,
            initial_sync_blocks: default_initial_sync_blocks(),
            get_logs_chunk_size: default_get_logs_chunk_size(),
            batch_delay_ms: default_batch_delay_ms(),
            provider_result_cap: default_provider_result_cap(),
        }
    }
}

impl Collection {
    pub fn chain_reader_config(&self) -> ChainReaderConfig {
        ChainReaderConfig {
            batch_size: self.get_logs_chunk_size,
            batch_delay: Duration::from_millis(self.batch_delay_ms),
            result_cap: self.provider_result_cap,
            head_refresh: ChainReaderConfig::default().head_refresh,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Marketplace {
    #[serde(default = "default_marketplace_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub collection_slug: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_marketplace_id")]
    pub marketplace_id: String,
}

fn default_marketplace_base_url() -> String {
    "https://api.opensea.io/api/v2".to_string()
}
fn default_page_size() -> usize {
    50
}
fn default_max_pages() -> usize {
    20
}
fn default_marketplace_id() -> String {
    "opensea".to_string()
}

impl Default for Marketplace {
    fn default() -> Self {
        Self {
            base_url: default_marketplace_base_url(),
            api_key: None,
            collection_slug: String::new(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            marketplace_id: default_marketplace_id(),
        }
    }
}

impl Marketplace {
    pub fn reader_config(&self) -> MarketplaceConfig {
        MarketplaceConfig {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            page_size: self.page_size,
            max_pages: self.max_pages,
            marketplace_id: self.marketplace_id.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PriceFeedSettings {
    #[serde(default = "default_price_feed_base_url")]
    pub base_url: String,
    #[serde(default = "default_price_feed_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
}

fn default_price_feed_base_url() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}
fn default_price_feed_cache_ttl_seconds() -> u64 {
    300
}

impl Default for PriceFeedSettings {
    fn default() -> Self {
        Self {
            base_url: default_price_feed_base_url(),
            cache_ttl_seconds: default_price_feed_cache_ttl_seconds(),
        }
    }
}

impl PriceFeedSettings {
    pub fn feed_config(&self) -> PriceFeedConfig {
        PriceFeedConfig {
            base_url: self.base_url.clone(),
            cache_ttl: Duration::from_secs(self.cache_ttl_seconds),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    #[serde(default)]
    pub backend: CacheBackend,
    #[serde(default = "default_snapshot_ttl_seconds")]
    pub snapshot_ttl_seconds: u64,
    #[serde(default = "default_stats_ttl_seconds")]
    pub stats_ttl_seconds: u64,
    #[serde(default = "default_sales_ttl_seconds")]
    pub sales_ttl_seconds: u64,
    #[serde(default = "default_daily_ttl_seconds")]
    pub daily_ttl_seconds: u64,
    #[serde(default = "default_indicators_ttl_seconds")]
    pub indicators_ttl_seconds: u64,
    #[serde(default = "default_traders_ttl_seconds")]
    pub traders_ttl_seconds: u64,
    #[serde(default = "default_burns_ttl_seconds")]
    pub burns_ttl_seconds: u64,
}

fn default_snapshot_ttl_seconds() -> u64 {
    300
}
fn default_stats_ttl_seconds() -> u64 {
    120
}
fn default_sales_ttl_seconds() -> u64 {
    120
}
fn default_daily_ttl_seconds() -> u64 {
    600
}
fn default_indicators_ttl_seconds() -> u64 {
    600
}
fn default_traders_ttl_seconds() -> u64 {
    600
}
fn default_burns_ttl_seconds() -> u64 {
    600
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            snapshot_ttl_seconds: default_snapshot_ttl_seconds(),
            stats_ttl_seconds: default_stats_ttl_seconds(),
            sales_ttl_seconds: default_sales_ttl_seconds(),
            daily_ttl_seconds: default_daily_ttl_seconds(),
            indicators_ttl_seconds: default_indicators_ttl_seconds(),
            traders_ttl_seconds: default_traders_ttl_seconds(),
            burns_ttl_seconds: default_burns_ttl_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Handlers {
    /// Budget per request before falling back to stale data.
    #[serde(default = "default_handler_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_handler_timeout_seconds() -> u64 {
    12
}

impl Default for Handlers {
    fn default() -> Self {
        Self {
            timeout_seconds: default_handler_timeout_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Analytics {
    #[serde(default = "default_enrichment_low_coverage_threshold")]
    pub low_coverage_threshold: f64,
    #[serde(default = "default_event_target_multiplier")]
    pub event_target_multiplier: usize,
}

fn default_enrichment_low_coverage_threshold() -> f64 {
    0.5
}
fn default_event_target_multiplier() -> usize {
    2
}

impl Default for Analytics {
    fn default() -> Self {
        Self {
            low_coverage_threshold: default_enrichment_low_coverage_threshold(),
            event_target_multiplier: default_event_target_multiplier(),
        }
    }
}

impl Analytics {
    pub fn enrichment_config(&self) -> EnrichmentConfig {
        EnrichmentConfig {
            low_coverage_threshold: self.low_coverage_threshold,
            event_target_multiplier: self.event_target_multiplier,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub rpc: Rpc,
    #[serde(default)]
    pub collection: Collection,
    #[serde(default)]
    pub marketplace: Marketplace,
    #[serde(default)]
    pub price_feed: PriceFeedSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub handlers: Handlers,
    #[serde(default)]
    pub analytics: Analytics,
    #[serde(default)]
    pub log: LogSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let s = Config::builder()
            .add_source(File::with_name("Config.toml").required(false))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        // Environment variable overrides for deployment-specific values
        if let Ok(url) = env::var("SDK_RPC_URL") {
            if !url.trim().is_empty() {
                settings.rpc.url = url;
            }
        }
        if let Ok(contract) = env::var("SDK_COLLECTION_CONTRACT") {
            if !contract.trim().is_empty() {
                settings.collection.contract = contract;
            }
        }
        if let Ok(key) = env::var("SDK_MARKETPLACE_API_KEY") {
            if !key.trim().is_empty() {
                settings.marketplace.api_key = Some(key);
            }
        }

        Ok(settings)
    }
}
