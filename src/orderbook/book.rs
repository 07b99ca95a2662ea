//! Multi-contract order storage, priority ordering, queries and snapshots.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::{ContractKey, Order, OrderStatus, Side};

/// The continuous limit order book across every delivery contract.
///
/// Orders are held in a flat map keyed by id; price-time orderings are
/// produced on demand. A modify can move an order across price levels while
/// preserving its priority timestamp, which rules out baking the priority
/// into a queue position.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    orders: HashMap<Uuid, Order>,
    next_seq: u64,
}

/// Deep-copy snapshot of the book for the batch executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSnapshot {
    orders: Vec<Order>,
    next_seq: u64,
}

impl OrderBook {
    /// An empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an order by id.
    pub fn get(&self, order_id: &Uuid) -> Option<&Order> {
        self.orders.get(order_id)
    }

    pub(crate) fn get_mut(&mut self, order_id: &Uuid) -> Option<&mut Order> {
        self.orders.get_mut(order_id)
    }

    pub(crate) fn insert(&mut self, order: Order) {
        self.orders.insert(order.order_id, order);
    }

    /// Allocate the next arrival sequence number.
    pub(crate) fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Sum of signed exposures over the owner's active matching-engine
    /// orders, in 128 bits.
    pub fn open_exposure(&self, owner: &str) -> i128 {
        self.orders
            .values()
            .filter(|o| o.is_v2 && o.status == OrderStatus::Active && o.owner == owner)
            .map(Order::signed_exposure)
            .sum()
    }

    /// Potential balance: realized cash plus open exposure.
    pub fn potential_balance(&self, owner: &str, realized: i128) -> i128 {
        realized + self.open_exposure(owner)
    }

    /// Resting orders an incoming `(taker_side, price)` would cross within
    /// `contract`, sorted in consumption order (price priority, then time,
    /// then arrival). `exclude` drops one order id from the candidate set,
    /// used by modify so an order never matches itself.
    pub(crate) fn crossing_resting_ids(
        &self,
        contract: ContractKey,
        taker_side: Side,
        price: i64,
        exclude: Option<Uuid>,
    ) -> Vec<Uuid> {
        let mut candidates: Vec<&Order> = self
            .orders
            .values()
            .filter(|o| {
                o.is_v2
                    && o.status == OrderStatus::Active
                    && o.contract == contract
                    && o.side == taker_side.opposite()
                    && o.crossed_by(taker_side, price)
                    && Some(o.order_id) != exclude
            })
            .collect();
        sort_best_first(&mut candidates, taker_side.opposite());
        candidates.into_iter().map(|o| o.order_id).collect()
    }

    /// Visible book for one contract: `(bids, asks)` sorted best first.
    ///
    /// Returns an empty book when the contract is outside its trading
    /// window at `now`.
    pub fn levels(&self, contract: ContractKey, now: i64) -> (Vec<Order>, Vec<Order>) {
        if !contract.is_tradable_at(now) {
            return (Vec::new(), Vec::new());
        }
        let mut bids: Vec<&Order> = self.active_in(contract, Side::Buy).collect();
        let mut asks: Vec<&Order> = self.active_in(contract, Side::Sell).collect();
        sort_best_first(&mut bids, Side::Buy);
        sort_best_first(&mut asks, Side::Sell);
        (
            bids.into_iter().cloned().collect(),
            asks.into_iter().cloned().collect(),
        )
    }

    /// The owner's active orders across all contracts, newest first.
    pub fn my_active(&self, owner: &str) -> Vec<Order> {
        let mut mine: Vec<&Order> = self
            .orders
            .values()
            .filter(|o| o.is_v2 && o.status == OrderStatus::Active && o.owner == owner)
            .collect();
        mine.sort_by(|a, b| {
            b.priority_timestamp
                .cmp(&a.priority_timestamp)
                .then(b.seq.cmp(&a.seq))
        });
        mine.into_iter().cloned().collect()
    }

    /// Capture the entire order set.
    pub fn snapshot(&self) -> BookSnapshot {
        let mut orders: Vec<Order> = self.orders.values().cloned().collect();
        orders.sort_by_key(|o| o.seq);
        BookSnapshot {
            orders,
            next_seq: self.next_seq,
        }
    }

    /// Rebuild the entire order set from a snapshot, preserving all fields.
    pub fn restore(&mut self, snapshot: BookSnapshot) {
        self.orders = snapshot
            .orders
            .into_iter()
            .map(|o| (o.order_id, o))
            .collect();
        self.next_seq = snapshot.next_seq;
    }

    /// Number of orders tracked, terminal included.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Whether the book tracks no orders at all.
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    fn active_in(&self, contract: ContractKey, side: Side) -> impl Iterator<Item = &Order> {
        self.orders.values().filter(move |o| {
            o.is_v2
                && o.status == OrderStatus::Active
                && o.contract == contract
                && o.side == side
                && o.remaining_quantity > 0
        })
    }
}

/// Price-time priority sort for one side of the book: best price first
/// (highest for bids, lowest for asks), earliest priority timestamp next,
/// earliest arrival last.
fn sort_best_first(orders: &mut [&Order], side: Side) {
    orders.sort_by(|a, b| {
        let price = match side {
            Side::Buy => b.price.cmp(&a.price),
            Side::Sell => a.price.cmp(&b.price),
        };
        price
            .then(a.priority_timestamp.cmp(&b.priority_timestamp))
            .then(a.seq.cmp(&b.seq))
    });
}
