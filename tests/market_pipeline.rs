//! End-to-end reconciliation over synthetic data: transfer/event matching,
//! ledger replay, and the analytics derived from the result.

use ethers::types::{Address, H256, U256};
use nft_market_sdk::analytics::{
    analyze_traders, daily_rollup, detect_flips, floor_estimate, link_burn_cycles, SaleProceeds,
};
use nft_market_sdk::ledger_replay::replay;
use nft_market_sdk::price_enrichment::match_transfers;
use nft_market_sdk::types::{
    BurnEvent, CurrencyKind, SaleEvent, SalePayment, TokenStatus, Transfer,
};
use std::collections::HashMap;

const DAY: u64 = 86_400;
const T0: u64 = 1_700_000_000;

fn addr(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

fn transfer(tx: u64, block: u64, ts: u64, from: Address, to: Address, token: u64) -> Transfer {
    Transfer {
        tx_hash: H256::from_low_u64_be(tx),
        block_number: block,
        timestamp: ts,
        from,
        to,
        token_id: U256::from(token),
        log_index: Some(0),
    }
}

fn sale_event(tx: u64, ts: u64, wei: &str) -> SaleEvent {
    SaleEvent {
        tx_hash: format!("{:?}", H256::from_low_u64_be(tx)).to_lowercase(),
        token_id: None,
        seller: None,
        buyer: None,
        payment: Some(SalePayment {
            symbol: "ETH".to_string(),
            quantity: wei.to_string(),
            decimals: 18,
        }),
        timestamp: ts,
        marketplace: "opensea".to_string(),
        image_url: None,
    }
}

#[test]
fn transfers_match_events_by_tx_hash() {
    let zero = Address::zero();
    let alice = addr(1);
    let bob = addr(2);
    let transfers = vec![
        transfer(1, 100, T0, zero, alice, 7), // mint, excluded by callers
        transfer(2, 110, T0 + DAY, alice, bob, 7),
        transfer(3, 120, T0 + 2 * DAY, bob, alice, 7),
    ];
    let trades: Vec<Transfer> = transfers
        .iter()
        .filter(|t| !t.is_mint() && !t.is_burn())
        .cloned()
        .collect();

    // One priced event, one event without payment info.
    let mut no_payment = sale_event(3, T0 + 2 * DAY, "0");
    no_payment.payment = None;
    let events = vec![sale_event(2, T0 + DAY, "1500000000000000000"), no_payment];

    let (matched, unmatched) = match_transfers(&trades, &events, Some(2000.0));
    assert_eq!(matched.len(), 1);
    assert_eq!(unmatched.len(), 1);
    assert!((matched[0].price_eth - 1.5).abs() < 1e-9);
    assert_eq!(matched[0].price_usd, Some(3000.0));
    assert_eq!(matched[0].currency, CurrencyKind::Native);
}

#[test]
fn non_eth_payments_carry_no_usd_price() {
    let trades = vec![transfer(5, 100, T0, addr(1), addr(2), 1)];
    let mut event = sale_event(5, T0, "250000000000000000000");
    if let Some(payment) = event.payment.as_mut() {
        payment.symbol = "USDC".to_string();
        payment.decimals = 6;
    }
    let (matched, _) = match_transfers(&trades, &[event], Some(2000.0));
    assert_eq!(matched[0].currency, CurrencyKind::Other);
    assert_eq!(matched[0].price_usd, None);
}

#[test]
fn replay_reconstructs_holders_and_lifecycles() {
    let zero = Address::zero();
    let strategy = addr(9);
    let alice = addr(1);
    let transfers = vec![
        // Deliberately out of order: replay sorts by (block, log_index).
        transfer(3, 120, T0 + 2 * DAY, strategy, alice, 7),
        transfer(1, 100, T0, zero, alice, 7),
        transfer(2, 110, T0 + DAY, alice, strategy, 7),
        transfer(4, 130, T0 + 3 * DAY, zero, alice, 8),
        transfer(5, 140, T0 + 4 * DAY, alice, zero, 8), // burn
    ];

    let mut prices = HashMap::new();
    prices.insert(
        format!("{:?}", H256::from_low_u64_be(3)).to_lowercase(),
        2.5,
    );

    let state = replay(&transfers, Some(strategy), &prices);
    assert_eq!(state.holder_count(), 1); // alice holds token 7; token 8 burned
    assert_eq!(state.distinct_tokens(), 2);
    assert_eq!(state.holder_of(&U256::from(7)), Some(alice));
    assert_eq!(state.holder_of(&U256::from(8)), None);

    let lifecycle = state.lifecycle(&U256::from(7)).unwrap();
    assert_eq!(lifecycle.status, TokenStatus::Sold);
    assert_eq!(lifecycle.sale.as_ref().unwrap().price_eth, Some(2.5));
    assert!(lifecycle.purchase.is_some());
}

#[test]
fn replay_is_idempotent() {
    let zero = Address::zero();
    let transfers = vec![
        transfer(1, 100, T0, zero, addr(1), 1),
        transfer(2, 110, T0, addr(1), addr(2), 1),
    ];
    let first = replay(&transfers, None, &HashMap::new());
    let second = replay(&transfers, None, &HashMap::new());
    assert_eq!(first.holders(), second.holders());
    assert_eq!(first.lifecycles(), second.lifecycles());
}

#[test]
fn replaying_a_prefix_never_invents_holders() {
    let zero = Address::zero();
    let transfers = vec![
        transfer(1, 100, T0, zero, addr(1), 1),
        transfer(2, 110, T0, zero, addr(2), 2),
        transfer(3, 120, T0 + DAY, zero, addr(3), 3),
        transfer(4, 130, T0 + 2 * DAY, addr(2), addr(1), 2),
    ];
    let full = replay(&transfers, None, &HashMap::new());
    let prefix = replay(&transfers[..2], None, &HashMap::new());

    // A prefix only knows about tokens it has seen.
    assert_eq!(prefix.distinct_tokens(), 2);
    assert_eq!(prefix.holder_of(&U256::from(3)), None);
    assert!(prefix.holder_count() <= prefix.distinct_tokens());
    assert!(full.holder_count() <= full.distinct_tokens());
    // Every token held in the prefix is also tracked in the full replay.
    for token in prefix.holders().keys() {
        assert!(full.holder_of(token).is_some());
    }
}

#[test]
fn analytics_compose_over_matched_sales() {
    let trades: Vec<Transfer> = (0..10)
        .map(|i| {
            transfer(
                100 + i,
                1000 + i,
                T0 + i * DAY / 2,
                addr(1 + i % 3),
                addr(4 + i % 2),
                i % 4,
            )
        })
        .collect();
    let events: Vec<SaleEvent> = (0..10)
        .map(|i| {
            sale_event(
                100 + i,
                T0 + i * DAY / 2,
                &format!("{}000000000000000000", i + 1),
            )
        })
        .collect();
    let (sales, unmatched) = match_transfers(&trades, &events, None);
    assert_eq!(sales.len(), 10);
    assert!(unmatched.is_empty());

    let now = T0 + 5 * DAY;
    let floor = floor_estimate(&sales, now);
    assert!(floor.is_some());

    let daily = daily_rollup(&sales, floor);
    assert!(!daily.is_empty());
    assert_eq!(daily.iter().map(|d| d.sale_count).sum::<usize>(), 10);
    let total: f64 = daily.iter().map(|d| d.volume_eth).sum();
    assert!((total - 55.0).abs() < 1e-6); // 1 + 2 + ... + 10 ETH

    // Tokens repeat every 4 sales, so flips exist.
    let flips = detect_flips(&sales);
    assert!(!flips.is_empty());

    let traders = analyze_traders(&sales);
    assert_eq!(traders.daily.len(), daily.len());
    assert!(traders.total_buyers >= 2);
}

#[test]
fn burn_cycles_link_to_replayed_sale_proceeds() {
    let proceeds = vec![SaleProceeds {
        tx_hash: "0xsale".to_string(),
        timestamp: T0,
        proceeds_eth: 2.0,
    }];
    let burns = vec![
        BurnEvent {
            tx_hash: "0xburn1".to_string(),
            block_number: 1,
            timestamp: T0 + 2 * DAY,
            amount: 1000.0,
        },
        BurnEvent {
            tx_hash: "0xburn2".to_string(),
            block_number: 2,
            timestamp: T0 + 20 * DAY,
            amount: 500.0,
        },
    ];
    let cycles = link_burn_cycles(&proceeds, &burns);
    assert_eq!(cycles.len(), 2);
    assert_eq!(cycles[0].sale_tx.as_deref(), Some("0xsale"));
    assert_eq!(cycles[0].proceeds_eth, 2.0);
    assert_eq!(cycles[1].sale_tx, None);
}
