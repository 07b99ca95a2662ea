//! Trade ledger: append-only execution log and derived cash balances.
//!
//! `record` is total — the matching engine only calls it for matches it has
//! already deemed valid, so the ledger never validates. Balances accumulate
//! in 128 bits so extreme price/quantity products cannot silently wrap; the
//! wire boundary saturates to the codec's signed 64-bit int with a warning.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};
use uuid::Uuid;

use crate::orderbook::ContractKey;
use crate::utils::current_time_millis;

/// An executed trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Opaque 128-bit identifier assigned at record time.
    pub trade_id: Uuid,
    /// Username of the buying side.
    pub buyer: String,
    /// Username of the selling side.
    pub seller: String,
    /// Execution price (the maker's price at match time).
    pub price: i64,
    /// Executed quantity, always positive.
    pub quantity: i64,
    /// The delivery contract this trade belongs to.
    pub contract: ContractKey,
    /// Record timestamp, milliseconds since epoch; non-decreasing in
    /// insertion order.
    pub timestamp: i64,
    /// Whether this trade came out of the matching engine (`true`) or the
    /// legacy listing board (`false`).
    pub is_v2: bool,
}

/// Fields for a trade about to be recorded.
#[derive(Debug, Clone)]
pub struct TradeDraft {
    /// Username of the buying side.
    pub buyer: String,
    /// Username of the selling side.
    pub seller: String,
    /// Execution price.
    pub price: i64,
    /// Executed quantity.
    pub quantity: i64,
    /// The delivery contract.
    pub contract: ContractKey,
    /// Timestamp override; stamped with the current clock when absent.
    pub timestamp: Option<i64>,
    /// Matching-engine trade flag.
    pub is_v2: bool,
}

/// Snapshot of the full ledger state for the batch executor.
///
/// Balances are captured directly rather than recomputed on restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    trades: Vec<Trade>,
    balances: HashMap<String, i128>,
    last_timestamp: i64,
}

/// Append-only trade log with derived realized balances.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeLedger {
    trades: Vec<Trade>,
    balances: HashMap<String, i128>,
    last_timestamp: i64,
}

impl TradeLedger {
    /// An empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a trade: assign a fresh id, stamp the timestamp if absent,
    /// apply balance deltas to buyer and seller, append to the log.
    ///
    /// Timestamps are clamped so the log stays non-decreasing even if the
    /// wall clock steps backwards.
    pub fn record(&mut self, draft: TradeDraft) -> Trade {
        let stamped = draft.timestamp.unwrap_or_else(current_time_millis);
        let timestamp = stamped.max(self.last_timestamp);
        self.last_timestamp = timestamp;

        let trade = Trade {
            trade_id: Uuid::new_v4(),
            buyer: draft.buyer,
            seller: draft.seller,
            price: draft.price,
            quantity: draft.quantity,
            contract: draft.contract,
            timestamp,
            is_v2: draft.is_v2,
        };

        let notional = trade.price as i128 * trade.quantity as i128;
        *self.balances.entry(trade.seller.clone()).or_insert(0) += notional;
        *self.balances.entry(trade.buyer.clone()).or_insert(0) -= notional;

        trace!(
            trade_id = %trade.trade_id,
            buyer = %trade.buyer,
            seller = %trade.seller,
            price = trade.price,
            quantity = trade.quantity,
            "recorded trade"
        );
        self.trades.push(trade.clone());
        trade
    }

    /// All trades, newest first.
    pub fn all(&self) -> Vec<Trade> {
        self.trades.iter().rev().cloned().collect()
    }

    /// Realized cash balance for a user; zero when the user never traded.
    pub fn balance(&self, username: &str) -> i128 {
        self.balances.get(username).copied().unwrap_or(0)
    }

    /// Realized balance narrowed to the wire's signed 64-bit int,
    /// saturating at the bounds with a logged warning.
    pub fn balance_wire(&self, username: &str) -> i64 {
        clamp_to_wire(self.balance(username), username)
    }

    /// Number of recorded trades.
    pub fn len(&self) -> usize {
        self.trades.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// Capture the full ledger state.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            trades: self.trades.clone(),
            balances: self.balances.clone(),
            last_timestamp: self.last_timestamp,
        }
    }

    /// Replace the log and the balances map wholesale from a snapshot.
    pub fn restore(&mut self, snapshot: LedgerSnapshot) {
        self.trades = snapshot.trades;
        self.balances = snapshot.balances;
        self.last_timestamp = snapshot.last_timestamp;
    }
}

/// Saturate a 128-bit balance into the wire's 64-bit int.
pub fn clamp_to_wire(value: i128, context: &str) -> i64 {
    match i64::try_from(value) {
        Ok(v) => v,
        Err(_) => {
            let clamped = if value > 0 { i64::MAX } else { i64::MIN };
            warn!(context, value = %value, clamped, "balance saturated to wire width");
            clamped
        }
    }
}
