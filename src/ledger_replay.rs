//! Ledger replay: event-sourced reconstruction of current holders and
//! per-token lifecycles from the full transfer history.
//!
//! The replay is a pure fold over a deterministic chronological sort. It is
//! re-run in full on every sync; reassigning ownership requires total order,
//! so there is no incremental patching.

use crate::types::conversions::address_to_string;
use crate::types::{TokenLifecycle, TokenStatus, TradeLeg, Transfer};
use ethers::types::{Address, U256};
use std::collections::{HashMap, HashSet};

/// Final state after replaying a transfer history.
#[derive(Debug, Default, Clone)]
pub struct ReplayState {
    holdings: HashMap<Address, HashSet<U256>>,
    holder_of: HashMap<U256, Address>,
    history: HashMap<U256, TokenLifecycle>,
}

impl ReplayState {
    /// Number of distinct addresses holding at least one token.
    pub fn holder_count(&self) -> usize {
        self.holdings.values().filter(|set| !set.is_empty()).count()
    }

    pub fn holder_of(&self, token_id: &U256) -> Option<Address> {
        self.holder_of.get(token_id).copied()
    }

    pub fn holders(&self) -> &HashMap<U256, Address> {
        &self.holder_of
    }

    /// Distinct tokens ever observed in the replayed history.
    pub fn distinct_tokens(&self) -> usize {
        self.history.len()
    }

    pub fn lifecycle(&self, token_id: &U256) -> Option<&TokenLifecycle> {
        self.history.get(token_id)
    }

    /// Lifecycles keyed by token id string, the serializable view.
    pub fn lifecycles(&self) -> HashMap<String, TokenLifecycle> {
        self.history
            .iter()
            .map(|(id, lc)| (id.to_string(), lc.clone()))
            .collect()
    }
}

/// Replays `transfers` into holder and lifecycle state.
///
/// Transfers are sorted by block number ascending, ties broken by log index
/// when available and otherwise left in input order (the sort is stable).
/// A transfer whose receiver is `strategy` marks that token's purchase; one
/// whose sender is `strategy` marks its sale. `prices_by_tx` (lowercased tx
/// hash -> ETH price) annotates lifecycle legs when enrichment found a
/// match.
pub fn replay(
    transfers: &[Transfer],
    strategy: Option<Address>,
    prices_by_tx: &HashMap<String, f64>,
) -> ReplayState {
    let mut ordered: Vec<&Transfer> = transfers.iter().collect();
    ordered.sort_by_key(|t| (t.block_number, t.log_index.unwrap_or(u64::MAX)));

    ordered.into_iter().fold(ReplayState::default(), |state, t| {
        apply_transfer(state, t, strategy, prices_by_tx)
    })
}

/// Applies one transfer to the state. Mint transfers have a zero sender,
/// burns a zero receiver; neither side of the zero address ever holds.
fn apply_transfer(
    mut state: ReplayState,
    transfer: &Transfer,
    strategy: Option<Address>,
    prices_by_tx: &HashMap<String, f64>,
) -> ReplayState {
    let token = transfer.token_id;

    if !transfer.from.is_zero() {
        if let Some(held) = state.holdings.get_mut(&transfer.from) {
            held.remove(&token);
            if held.is_empty() {
                state.holdings.remove(&transfer.from);
            }
        }
    }

    if transfer.to.is_zero() {
        state.holder_of.remove(&token);
    } else {
        state
            .holdings
            .entry(transfer.to)
            .or_default()
            .insert(token);
        state.holder_of.insert(token, transfer.to);
    }

    // Every observed token gets a lifecycle entry, strategy-held or not,
    // so distinct_tokens() reflects the full collection.
    let entry = state.history.entry(token).or_insert(TokenLifecycle {
        status: TokenStatus::Held,
        purchase: None,
        sale: None,
    });

    if let Some(strategy) = strategy {
        let price = prices_by_tx.get(&transfer.tx_key()).copied();
        if transfer.to == strategy {
            entry.status = TokenStatus::Held;
            entry.purchase = Some(TradeLeg {
                timestamp: transfer.timestamp,
                tx_hash: transfer.tx_key(),
                price_eth: price,
                counterparty: Some(address_to_string(transfer.from)),
            });
            // A re-acquisition voids the previous sale leg.
            entry.sale = None;
        } else if transfer.from == strategy {
            entry.status = TokenStatus::Sold;
            entry.sale = Some(TradeLeg {
                timestamp: transfer.timestamp,
                tx_hash: transfer.tx_key(),
                price_eth: price,
                counterparty: Some(address_to_string(transfer.to)),
            });
        }
    }

    state
}
