//! Flip detection: adjacent resales of the same token.
//!
//! Chaining is simple FIFO per token, not per-buyer matching: a token sold
//! three times yields two flip records. This is a deliberate approximation
//! kept in one named function so a real assignment algorithm could replace
//! it without touching callers.

use crate::types::EnrichedSale;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flip {
    pub token_id: String,
    pub buy_tx: String,
    pub sell_tx: String,
    pub buy_price_eth: f64,
    pub sell_price_eth: f64,
    pub profit_eth: f64,
    pub profit_pct: f64,
    pub holding_days: f64,
}

/// Detects flips across all enriched sales. Per token, sales are sorted
/// ascending by time and every adjacent pair becomes one flip.
pub fn detect_flips(sales: &[EnrichedSale]) -> Vec<Flip> {
    let mut by_token: BTreeMap<&str, Vec<&EnrichedSale>> = BTreeMap::new();
    for sale in sales {
        by_token.entry(sale.token_id.as_str()).or_default().push(sale);
    }

    let mut flips = Vec::new();
    for (token_id, mut token_sales) in by_token {
        token_sales.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.tx_hash.cmp(&b.tx_hash))
        });
        for pair in token_sales.windows(2) {
            let (buy, sell) = (pair[0], pair[1]);
            let profit_eth = sell.price_eth - buy.price_eth;
            let profit_pct = if buy.price_eth > 0.0 {
                profit_eth / buy.price_eth * 100.0
            } else {
                0.0
            };
            flips.push(Flip {
                token_id: token_id.to_string(),
                buy_tx: buy.tx_hash.clone(),
                sell_tx: sell.tx_hash.clone(),
                buy_price_eth: buy.price_eth,
                sell_price_eth: sell.price_eth,
                profit_eth,
                profit_pct,
                holding_days: (sell.timestamp - buy.timestamp) as f64 / 86_400.0,
            });
        }
    }
    flips
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CurrencyKind;

    const DAY: u64 = 86_400;
    const T0: u64 = 1_700_000_000;

    fn sale(token: &str, price: f64, timestamp: u64) -> EnrichedSale {
        EnrichedSale {
            tx_hash: format!("0x{:032x}{:032x}", timestamp, (price * 1000.0) as u64),
            token_id: token.to_string(),
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
    fn three_sales_yield_two_flips() {
        // 10 -> 15 after 2 days, 15 -> 12 after 7 more.
        let sales = vec![
            sale("7", 10.0, T0),
            sale("7", 15.0, T0 + 2 * DAY),
            sale("7", 12.0, T0 + 9 * DAY),
        ];
        let flips = detect_flips(&sales);
        assert_eq!(flips.len(), 2);

        assert_eq!(flips[0].buy_price_eth, 10.0);
        assert_eq!(flips[0].sell_price_eth, 15.0);
        assert_eq!(flips[0].profit_eth, 5.0);
        assert!((flips[0].profit_pct - 50.0).abs() < 1e-9);
        assert!((flips[0].holding_days - 2.0).abs() < 1e-9);

        assert_eq!(flips[1].profit_eth, -3.0);
        assert!((flips[1].profit_pct + 20.0).abs() < 1e-9);
        assert!((flips[1].holding_days - 7.0).abs() < 1e-9);
    }

    #[test]
    fn single_sale_is_not_a_flip() {
        assert!(detect_flips(&[sale("1", 10.0, T0)]).is_empty());
    }

    #[test]
    fn tokens_chain_independently() {
        let sales = vec![
            sale("1", 1.0, T0),
            sale("2", 2.0, T0 + DAY),
            sale("1", 3.0, T0 + 2 * DAY),
            sale("2", 4.0, T0 + 3 * DAY),
        ];
        let flips = detect_flips(&sales);
        assert_eq!(flips.len(), 2);
        assert!(flips.iter().all(|f| f.profit_eth == 2.0));
    }
}
