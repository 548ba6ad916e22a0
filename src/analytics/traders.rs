//! Per-day trader activity: unique buyers/sellers, first-seen buyers, and
//! the repeat-buyer rate across the whole series.

use crate::types::EnrichedSale;
use crate::utils::utc_date;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTraderStat {
    pub date: NaiveDate,
    pub unique_buyers: usize,
    pub unique_sellers: usize,
    pub new_buyers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderAnalysis {
    pub daily: Vec<DailyTraderStat>,
    pub total_buyers: usize,
    pub total_sellers: usize,
    /// Fraction of distinct buyers with more than one purchase.
    pub repeat_buyer_rate: f64,
}

/// Walks sales grouped by UTC date in ascending order, so "new buyer" means
/// an address never seen on an earlier date in the input.
pub fn analyze_traders(sales: &[EnrichedSale]) -> TraderAnalysis {
    let mut days: BTreeMap<NaiveDate, Vec<&EnrichedSale>> = BTreeMap::new();
    for sale in sales {
        days.entry(utc_date(sale.timestamp)).or_default().push(sale);
    }

    let mut seen_buyers: HashSet<&str> = HashSet::new();
    let mut all_sellers: HashSet<&str> = HashSet::new();
    let mut buyer_purchases: BTreeMap<&str, usize> = BTreeMap::new();

    let mut daily = Vec::with_capacity(days.len());
    for (date, day_sales) in &days {
        let mut buyers: HashSet<&str> = HashSet::new();
        let mut sellers: HashSet<&str> = HashSet::new();
        for sale in day_sales {
            buyers.insert(sale.buyer.as_str());
            sellers.insert(sale.seller.as_str());
            *buyer_purchases.entry(sale.buyer.as_str()).or_insert(0) += 1;
        }

        let new_buyers = buyers.iter().filter(|b| !seen_buyers.contains(**b)).count();
        seen_buyers.extend(buyers.iter());
        all_sellers.extend(sellers.iter());

        daily.push(DailyTraderStat {
            date: *date,
            unique_buyers: buyers.len(),
            unique_sellers: sellers.len(),
            new_buyers,
        });
    }

    let total_buyers = seen_buyers.len();
    let repeat_buyers = buyer_purchases.values().filter(|count| **count > 1).count();
    let repeat_buyer_rate = if total_buyers > 0 {
        repeat_buyers as f64 / total_buyers as f64
    } else {
        0.0
    };

    TraderAnalysis {
        daily,
        total_buyers,
        total_sellers: all_sellers.len(),
        repeat_buyer_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CurrencyKind;

    const DAY: u64 = 86_400;
    const T0: u64 = 1_609_459_200; // 2021-01-01T00:00:00Z

    fn sale(buyer: &str, seller: &str, timestamp: u64) -> EnrichedSale {
        EnrichedSale {
            tx_hash: format!("0x{:064x}", timestamp),
            token_id: "1".to_string(),
            block_number: 1,
            timestamp,
            seller: seller.to_string(),
            buyer: buyer.to_string(),
            price_eth: 1.0,
            price_usd: None,
            currency: CurrencyKind::Native,
            currency_symbol: "ETH".to_string(),
        }
    }

    #[test]
    fn counts_unique_and_new_buyers_per_day() {
        let sales = vec![
            sale("0xa", "0xs1", T0),
            sale("0xa", "0xs2", T0 + 1),
            sale("0xb", "0xs1", T0 + 2),
            sale("0xa", "0xs3", T0 + DAY),
            sale("0xc", "0xs1", T0 + DAY + 1),
        ];
        let analysis = analyze_traders(&sales);
        assert_eq!(analysis.daily.len(), 2);
        assert_eq!(analysis.daily[0].unique_buyers, 2);
        assert_eq!(analysis.daily[0].new_buyers, 2);
        assert_eq!(analysis.daily[1].unique_buyers, 2);
        assert_eq!(analysis.daily[1].new_buyers, 1); // only 0xc is new
        assert_eq!(analysis.total_buyers, 3);
        assert_eq!(analysis.total_sellers, 3);
    }

    #[test]
    fn repeat_rate_counts_multi_purchase_buyers() {
        let sales = vec![
            sale("0xa", "0xs", T0),
            sale("0xb", "0xs", T0),
            sale("0xa", "0xs", T0 + DAY),
        ];
        let analysis = analyze_traders(&sales);
        // 0xa bought twice, 0xb once.
        assert!((analysis.repeat_buyer_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn same_day_rebuy_counts_as_repeat() {
        let sales = vec![sale("0xa", "0xs", T0), sale("0xa", "0xs", T0 + 10)];
        let analysis = analyze_traders(&sales);
        assert_eq!(analysis.total_buyers, 1);
        assert_eq!(analysis.repeat_buyer_rate, 1.0);
    }

    #[test]
    fn empty_input() {
        let analysis = analyze_traders(&[]);
        assert!(analysis.daily.is_empty());
        assert_eq!(analysis.total_buyers, 0);
        assert_eq!(analysis.repeat_buyer_rate, 0.0);
    }
}
