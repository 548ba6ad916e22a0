//! Analytics engine: derived aggregates over enriched sales and replayed
//! ledger state.
//!
//! Every function here is pure over its inputs; the cache-fronted service
//! layer decides when to recompute.

/// Burn-cycle linkage (each sale claims the earliest burn after it)
pub mod burn_cycles;
/// Daily UTC rollups with premium tiers and currency breakdown
pub mod daily;
/// Flip detection (adjacent per-token resale pairing)
pub mod flips;
/// Floor price estimation
pub mod floor;
/// RSI, momentum, and liquidity indicators
pub mod indicators;
/// Per-day trader activity and repeat-buyer rates
pub mod traders;

pub use burn_cycles::{link_burn_cycles, SaleProceeds};
pub use daily::daily_rollup;
pub use flips::{detect_flips, Flip};
pub use floor::floor_estimate;
pub use indicators::{liquidity_score, momentum, rsi, ListingSnapshot};
pub use traders::{analyze_traders, DailyTraderStat, TraderAnalysis};
