//! Order model: sides, statuses, delivery contracts and the order record.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::ExchangeError;
use crate::utils::{DAY_MS, midnight_utc};

/// Fixed width of every delivery contract: one hour in milliseconds.
pub const DELIVERY_WINDOW_MS: i64 = 3_600_000;

/// How many days before delivery day a contract opens for trading.
const TRADING_OPEN_LEAD_DAYS: i64 = 15;

/// How long before delivery start a contract closes for trading.
const TRADING_CLOSE_LEAD_MS: i64 = 60_000;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Bid for delivery.
    Buy,
    /// Offer of delivery.
    Sell,
}

impl Side {
    /// Wire spelling of the side.
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    /// Parse the wire spelling.
    ///
    /// # Errors
    /// `InvalidInput` on anything but the exact `BUY` / `SELL` strings.
    pub fn parse(s: &str) -> Result<Self, ExchangeError> {
        match s {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(ExchangeError::invalid(format!("unknown side {other:?}"))),
        }
    }

    /// The opposite side.
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order lifecycle status. `Filled` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Resting in the book with positive remaining quantity.
    Active,
    /// Fully consumed by matching.
    Filled,
    /// Withdrawn by its owner.
    Cancelled,
}

impl OrderStatus {
    /// Wire spelling of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Active => "ACTIVE",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Whether this status ends the order's lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A one-hour delivery contract, keyed by its start and end instants.
///
/// Both endpoints are multiples of one hour and exactly one hour apart.
/// Matching never crosses contract keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContractKey {
    /// Delivery window start, ms since epoch.
    pub delivery_start: i64,
    /// Delivery window end, ms since epoch; always start + one hour.
    pub delivery_end: i64,
}

impl ContractKey {
    /// Validate and build a contract key.
    ///
    /// # Errors
    /// `InvalidInput` unless both endpoints are hour multiples exactly one
    /// hour apart.
    pub fn new(delivery_start: i64, delivery_end: i64) -> Result<Self, ExchangeError> {
        if delivery_start % DELIVERY_WINDOW_MS != 0 || delivery_end % DELIVERY_WINDOW_MS != 0 {
            return Err(ExchangeError::invalid(
                "delivery window endpoints must be hour multiples",
            ));
        }
        if delivery_end - delivery_start != DELIVERY_WINDOW_MS {
            return Err(ExchangeError::invalid(
                "delivery window must span exactly one hour",
            ));
        }
        Ok(ContractKey {
            delivery_start,
            delivery_end,
        })
    }

    /// Instant the contract opens for trading: fifteen days before the UTC
    /// midnight of its delivery day.
    pub fn trading_open(&self) -> i64 {
        midnight_utc(self.delivery_start) - TRADING_OPEN_LEAD_DAYS * DAY_MS
    }

    /// Instant the contract closes for trading: one minute before delivery.
    pub fn trading_close(&self) -> i64 {
        self.delivery_start - TRADING_CLOSE_LEAD_MS
    }

    /// Whether the contract accepts new orders at `now`.
    pub fn is_tradable_at(&self, now: i64) -> bool {
        now >= self.trading_open() && now <= self.trading_close()
    }
}

impl fmt::Display for ContractKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..{}]", self.delivery_start, self.delivery_end)
    }
}

/// A matching-engine order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Opaque 128-bit identifier, stable across modifications.
    pub order_id: Uuid,
    /// Owning username.
    pub owner: String,
    /// Buy or sell.
    pub side: Side,
    /// Limit price; may be negative.
    pub price: i64,
    /// Unfilled quantity; positive while `Active`, zero once terminal.
    pub remaining_quantity: i64,
    /// Initial quantity, bumped upward by quantity-increasing modifies so
    /// it never drops below `remaining_quantity`.
    pub original_quantity: i64,
    /// The delivery contract; immutable for the order's lifetime.
    pub contract: ContractKey,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Time-priority value within a price level.
    pub priority_timestamp: i64,
    /// Matching-engine flag; the legacy listing board never sets this.
    pub is_v2: bool,
    /// Arrival sequence used to break exact-timestamp priority ties;
    /// bumped whenever the priority timestamp resets.
    pub(crate) seq: u64,
}

impl Order {
    /// Exposure contribution while resting: `+price·remaining` for sells,
    /// `−price·remaining` for buys, widened to 128 bits.
    pub fn signed_exposure(&self) -> i128 {
        signed_exposure(self.side, self.price, self.remaining_quantity)
    }

    /// Whether an incoming order at `price` on `taker_side` crosses this
    /// resting order.
    pub fn crossed_by(&self, taker_side: Side, price: i64) -> bool {
        match taker_side {
            Side::Buy => price >= self.price,
            Side::Sell => price <= self.price,
        }
    }
}

/// Signed exposure of a hypothetical resting order.
pub fn signed_exposure(side: Side, price: i64, quantity: i64) -> i128 {
    let notional = price as i128 * quantity as i128;
    match side {
        Side::Sell => notional,
        Side::Buy => -notional,
    }
}
