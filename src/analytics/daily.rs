//! Daily UTC rollups of enriched sales.

use crate::types::{CurrencyKind, DailyStat, EnrichedSale};
use crate::utils::utc_date;
use chrono::NaiveDate;
use std::collections::BTreeMap;

// Tolerance for the premium-tier ratio comparison: a sale at exactly
// 110% of floor must count toward the 10% tier.
const TIER_EPS: f64 = 1e-9;

/// Groups enriched sales by UTC calendar date and aggregates volume,
/// price spread, premium tiers relative to `floor`, and the currency-kind
/// breakdown. Output is sorted by date ascending.
pub fn daily_rollup(sales: &[EnrichedSale], floor: Option<f64>) -> Vec<DailyStat> {
    let mut days: BTreeMap<NaiveDate, Vec<&EnrichedSale>> = BTreeMap::new();
    for sale in sales {
        days.entry(utc_date(sale.timestamp)).or_default().push(sale);
    }

    days.into_iter()
        .map(|(date, day_sales)| rollup_day(date, &day_sales, floor))
        .collect()
}

fn rollup_day(date: NaiveDate, sales: &[&EnrichedSale], floor: Option<f64>) -> DailyStat {
    let mut stat = DailyStat {
        date,
        volume_eth: 0.0,
        sale_count: sales.len(),
        min_price_eth: f64::MAX,
        max_price_eth: 0.0,
        avg_price_eth: 0.0,
        sales_above_10pct: 0,
        sales_above_25pct: 0,
        sales_above_50pct: 0,
        native_count: 0,
        native_volume_eth: 0.0,
        wrapped_count: 0,
        wrapped_volume_eth: 0.0,
        other_count: 0,
        other_volume_eth: 0.0,
    };

    for sale in sales {
        let price = sale.price_eth;
        stat.volume_eth += price;
        stat.min_price_eth = stat.min_price_eth.min(price);
        stat.max_price_eth = stat.max_price_eth.max(price);

        if let Some(floor) = floor.filter(|f| *f > 0.0) {
            let ratio = price / floor;
            if ratio + TIER_EPS >= 1.10 {
                stat.sales_above_10pct += 1;
            }
            if ratio + TIER_EPS >= 1.25 {
                stat.sales_above_25pct += 1;
            }
            if ratio + TIER_EPS >= 1.50 {
                stat.sales_above_50pct += 1;
            }
        }

        match sale.currency {
            CurrencyKind::Native => {
                stat.native_count += 1;
                stat.native_volume_eth += price;
            }
            CurrencyKind::Wrapped => {
                stat.wrapped_count += 1;
                stat.wrapped_volume_eth += price;
            }
            CurrencyKind::Other => {
                stat.other_count += 1;
                stat.other_volume_eth += price;
            }
        }
    }

    if stat.sale_count > 0 {
        stat.avg_price_eth = stat.volume_eth / stat.sale_count as f64;
    } else {
        stat.min_price_eth = 0.0;
    }
    stat
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CurrencyKind;

    fn sale(price: f64, timestamp: u64, currency: CurrencyKind) -> EnrichedSale {
        EnrichedSale {
            tx_hash: format!("0x{:064x}", timestamp),
            token_id: "1".to_string(),
            block_number: 1,
            timestamp,
            seller: "0xa".to_string(),
            buyer: "0xb".to_string(),
            price_eth: price,
            price_usd: None,
            currency,
            currency_symbol: "ETH".to_string(),
        }
    }

    const DAY: u64 = 86_400;
    const T0: u64 = 1_609_459_200; // 2021-01-01T00:00:00Z

    #[test]
    fn groups_by_utc_date() {
        let sales = vec![
            sale(1.0, T0, CurrencyKind::Native),
            sale(2.0, T0 + DAY - 1, CurrencyKind::Native),
            sale(3.0, T0 + DAY, CurrencyKind::Wrapped),
        ];
        let stats = daily_rollup(&sales, None);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].sale_count, 2);
        assert_eq!(stats[0].volume_eth, 3.0);
        assert_eq!(stats[0].avg_price_eth, 1.5);
        assert_eq!(stats[1].sale_count, 1);
        assert_eq!(stats[1].wrapped_count, 1);
    }

    #[test]
    fn premium_tier_boundaries_are_inclusive() {
        let floor = 10.0;
        let sales = vec![
            sale(11.0, T0, CurrencyKind::Native),  // exactly 110%
            sale(12.5, T0, CurrencyKind::Native),  // exactly 125%
            sale(15.0, T0, CurrencyKind::Native),  // exactly 150%
            sale(10.5, T0, CurrencyKind::Native),  // below every tier
        ];
        let stats = daily_rollup(&sales, Some(floor));
        assert_eq!(stats[0].sales_above_10pct, 3);
        assert_eq!(stats[0].sales_above_25pct, 2);
        assert_eq!(stats[0].sales_above_50pct, 1);
    }

    #[test]
    fn currency_breakdown() {
        let sales = vec![
            sale(1.0, T0, CurrencyKind::Native),
            sale(2.0, T0, CurrencyKind::Wrapped),
            sale(4.0, T0, CurrencyKind::Other),
        ];
        let stats = daily_rollup(&sales, None);
        assert_eq!(stats[0].native_volume_eth, 1.0);
        assert_eq!(stats[0].wrapped_volume_eth, 2.0);
        assert_eq!(stats[0].other_volume_eth, 4.0);
        assert_eq!(stats[0].min_price_eth, 1.0);
        assert_eq!(stats[0].max_price_eth, 4.0);
    }
}
