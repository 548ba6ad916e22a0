/// Numeric and address conversion helpers
pub mod conversions;
/// Core market-data records (transfers, sales, lifecycles, rollups)
pub mod market;

pub use market::*;
