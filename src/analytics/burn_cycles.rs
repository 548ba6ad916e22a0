//! Burn-cycle linkage: pairing strategy sale proceeds with later burns.
//!
//! Matching is greedy: sales are walked in chronological order and each one
//! claims the earliest unclaimed burn that follows it within the match
//! window. Greedy is not globally optimal but the window is wide enough
//! that ties are rare in practice.

use crate::types::{BurnCycle, BurnEvent};
use serde::{Deserialize, Serialize};

/// Maximum sale-to-burn delay for a link.
pub const BURN_MATCH_WINDOW_SECS: u64 = 7 * 86_400;

/// A sale whose proceeds are a candidate for funding a burn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleProceeds {
    pub tx_hash: String,
    pub timestamp: u64,
    pub proceeds_eth: f64,
}

/// Links sales to burns: each sale, earliest first, claims the earliest
/// unclaimed burn that follows it within the window. Burns no sale claims
/// become standalone cycles with zero proceeds. Each sale funds at most one
/// burn; the result carries one cycle per burn, in chronological order.
pub fn link_burn_cycles(sales: &[SaleProceeds], burns: &[BurnEvent]) -> Vec<BurnCycle> {
    let mut ordered_sales: Vec<&SaleProceeds> = sales.iter().collect();
    ordered_sales.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.tx_hash.cmp(&b.tx_hash))
    });

    let mut ordered_burns: Vec<&BurnEvent> = burns.iter().collect();
    ordered_burns.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.tx_hash.cmp(&b.tx_hash))
    });

    let mut funded_by: Vec<Option<&SaleProceeds>> = vec![None; ordered_burns.len()];
    for &sale in &ordered_sales {
        let claim = (0..ordered_burns.len()).find(|&idx| {
            funded_by[idx].is_none() && {
                let burn = ordered_burns[idx];
                burn.timestamp > sale.timestamp
                    && burn.timestamp - sale.timestamp <= BURN_MATCH_WINDOW_SECS
            }
        });
        if let Some(idx) = claim {
            funded_by[idx] = Some(sale);
        }
    }

    ordered_burns
        .iter()
        .zip(funded_by)
        .map(|(burn, sale)| match sale {
            Some(sale) => {
                let delay = burn.timestamp - sale.timestamp;
                BurnCycle {
                    sale_tx: Some(sale.tx_hash.clone()),
                    proceeds_eth: sale.proceeds_eth,
                    tokens_burned: burn.amount,
                    burn_tx: burn.tx_hash.clone(),
                    burn_timestamp: burn.timestamp,
                    efficiency: 100.0 * (1.0 - delay as f64 / BURN_MATCH_WINDOW_SECS as f64),
                }
            }
            None => BurnCycle {
                sale_tx: None,
                proceeds_eth: 0.0,
                tokens_burned: burn.amount,
                burn_tx: burn.tx_hash.clone(),
                burn_timestamp: burn.timestamp,
                efficiency: 100.0,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: u64 = 86_400;
    const T0: u64 = 1_700_000_000;

    fn burn(tx: &str, timestamp: u64, amount: f64) -> BurnEvent {
        BurnEvent {
            tx_hash: tx.to_string(),
            block_number: 1,
            timestamp,
            amount,
        }
    }

    fn proceeds(tx: &str, timestamp: u64, eth: f64) -> SaleProceeds {
        SaleProceeds {
            tx_hash: tx.to_string(),
            timestamp,
            proceeds_eth: eth,
        }
    }

    #[test]
    fn burn_within_window_links_to_sale() {
        let sales = vec![proceeds("0xsale", T0, 2.5)];
        let burns = vec![burn("0xburn", T0 + 3 * DAY, 100.0)];
        let cycles = link_burn_cycles(&sales, &burns);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].sale_tx.as_deref(), Some("0xsale"));
        assert_eq!(cycles[0].proceeds_eth, 2.5);
        assert_eq!(cycles[0].tokens_burned, 100.0);
        // 3 of 7 days elapsed.
        let expected = 100.0 * (1.0 - 3.0 / 7.0);
        assert!((cycles[0].efficiency - expected).abs() < 1e-9);
    }

    #[test]
    fn burn_outside_window_is_standalone() {
        let sales = vec![proceeds("0xsale", T0, 2.5)];
        let burns = vec![burn("0xburn", T0 + 8 * DAY, 50.0)];
        let cycles = link_burn_cycles(&sales, &burns);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].sale_tx, None);
        assert_eq!(cycles[0].proceeds_eth, 0.0);
        assert_eq!(cycles[0].efficiency, 100.0);
    }

    #[test]
    fn each_sale_funds_one_burn() {
        let sales = vec![proceeds("0xsale", T0, 1.0)];
        let burns = vec![
            burn("0xburn1", T0 + DAY, 10.0),
            burn("0xburn2", T0 + 2 * DAY, 20.0),
        ];
        let cycles = link_burn_cycles(&sales, &burns);
        assert_eq!(cycles[0].sale_tx.as_deref(), Some("0xsale"));
        assert_eq!(cycles[1].sale_tx, None);
    }

    #[test]
    fn earliest_sale_claims_the_burn() {
        let sales = vec![
            proceeds("0xearly", T0, 1.0),
            proceeds("0xlate", T0 + 2 * DAY, 2.0),
        ];
        let burns = vec![burn("0xburn", T0 + 3 * DAY, 10.0)];
        let cycles = link_burn_cycles(&sales, &burns);
        assert_eq!(cycles[0].sale_tx.as_deref(), Some("0xearly"));
        assert_eq!(cycles[0].proceeds_eth, 1.0);
    }

    #[test]
    fn sales_and_burns_pair_in_order() {
        let sales = vec![
            proceeds("0xsale1", T0, 1.0),
            proceeds("0xsale2", T0 + DAY, 2.0),
        ];
        let burns = vec![
            burn("0xburn1", T0 + 2 * DAY, 10.0),
            burn("0xburn2", T0 + 3 * DAY, 20.0),
        ];
        let cycles = link_burn_cycles(&sales, &burns);
        assert_eq!(cycles[0].sale_tx.as_deref(), Some("0xsale1"));
        assert_eq!(cycles[1].sale_tx.as_deref(), Some("0xsale2"));
    }

    #[test]
    fn sale_at_burn_instant_does_not_link() {
        let sales = vec![proceeds("0xsale", T0, 1.0)];
        let burns = vec![burn("0xburn", T0, 10.0)];
        let cycles = link_burn_cycles(&sales, &burns);
        assert_eq!(cycles[0].sale_tx, None);
    }
}
