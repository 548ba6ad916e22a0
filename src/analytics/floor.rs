//! Floor price estimation from recent enriched sales.

use crate::types::EnrichedSale;

/// Window of recent sales the estimate prefers.
pub const FLOOR_WINDOW_SECS: u64 = 7 * 86_400;

/// Floor estimate: the 10th-percentile price (by sorted index, rounding
/// down) of the last seven days of sales. With no sales in the window it
/// falls back to the global minimum; with no sales at all it is `None`.
///
/// The percentile rather than the minimum keeps a single outlier dump from
/// dragging the whole premium-tier ladder down.
pub fn floor_estimate(sales: &[EnrichedSale], now: u64) -> Option<f64> {
    let mut recent: Vec<f64> = sales
        .iter()
        .filter(|s| now.saturating_sub(s.timestamp) <= FLOOR_WINDOW_SECS)
        .map(|s| s.price_eth)
        .collect();

    if recent.is_empty() {
        return sales
            .iter()
            .map(|s| s.price_eth)
            .fold(None, |min, p| match min {
                None => Some(p),
                Some(m) if p < m => Some(p),
                keep => keep,
            });
    }

    recent.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let idx = recent.len() * 10 / 100;
    Some(recent[idx])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CurrencyKind;

    fn sale(price: f64, timestamp: u64) -> EnrichedSale {
        EnrichedSale {
            tx_hash: format!("0x{:064x}", timestamp),
            token_id: "1".to_string(),
            block_number: 1,
            timestamp,
            seller: "0xseller".to_string(),
            buyer: "0xbuyer".to_string(),
            price_eth: price,
            price_usd: None,
            currency: CurrencyKind::Native,
            currency_symbol: "ETH".to_string(),
        }
    }

    #[test]
    fn percentile_of_recent_window() {
        let now = 1_700_000_000;
        // 20 recent sales priced 1..=20: index 20*10/100 = 2 -> price 3.0.
        let sales: Vec<EnrichedSale> =
            (1..=20).map(|i| sale(i as f64, now - i as u64)).collect();
        assert_eq!(floor_estimate(&sales, now), Some(3.0));
    }

    #[test]
    fn small_window_degenerates_to_minimum() {
        let now = 1_700_000_000;
        let sales = vec![sale(5.0, now - 10), sale(2.0, now - 20)];
        assert_eq!(floor_estimate(&sales, now), Some(2.0));
    }

    #[test]
    fn falls_back_to_global_minimum_outside_window() {
        let now = 1_700_000_000;
        let old = now - FLOOR_WINDOW_SECS - 1000;
        let sales = vec![sale(4.0, old), sale(9.0, old - 100)];
        assert_eq!(floor_estimate(&sales, now), Some(4.0));
    }

    #[test]
    fn empty_history_has_no_floor() {
        assert_eq!(floor_estimate(&[], 1_700_000_000), None);
    }
}
