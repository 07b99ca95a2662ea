//! Legacy v1 listing board: sell-only offers with a manual take.
//!
//! Kept deliberately apart from the matching engine. Listings never rest in
//! the book, never count toward exposure, and their trades carry
//! `is_v2 = false` so they stay off the live stream. They do settle through
//! the shared ledger and therefore move realized balances.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::ExchangeError;
use crate::ledger::{Trade, TradeDraft, TradeLedger};
use crate::orderbook::ContractKey;

/// A sell-only listing on the legacy board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    /// Listing identifier.
    pub order_id: Uuid,
    /// Selling username.
    pub owner: String,
    /// Asking price for the whole listing.
    pub price: i64,
    /// Offered quantity.
    pub quantity: i64,
    /// Delivery contract the energy belongs to.
    pub contract: ContractKey,
    /// Creation timestamp.
    pub timestamp: i64,
}

/// The legacy board: a flat list of open sell offers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegacyBoard {
    listings: Vec<Listing>,
}

impl LegacyBoard {
    /// An empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Post a new sell listing.
    ///
    /// # Errors
    /// `InvalidInput` on non-positive quantity.
    pub fn create(
        &mut self,
        owner: &str,
        price: i64,
        quantity: i64,
        contract: ContractKey,
        now: i64,
    ) -> Result<Uuid, ExchangeError> {
        if quantity < 1 {
            return Err(ExchangeError::invalid("quantity must be at least 1"));
        }
        let order_id = Uuid::new_v4();
        self.listings.push(Listing {
            order_id,
            owner: owner.to_string(),
            price,
            quantity,
            contract,
            timestamp: now,
        });
        debug!(%order_id, owner, price, quantity, "legacy listing posted");
        Ok(order_id)
    }

    /// Open listings, newest first.
    pub fn all(&self) -> Vec<Listing> {
        self.listings.iter().rev().cloned().collect()
    }

    /// Take a listing whole: removes it and records a legacy trade.
    ///
    /// # Errors
    /// `NotFound` on an unknown listing; `Conflict` when a seller tries to
    /// take their own listing.
    pub fn take(
        &mut self,
        taker: &str,
        order_id: Uuid,
        now: i64,
        ledger: &mut TradeLedger,
    ) -> Result<Trade, ExchangeError> {
        let position = self
            .listings
            .iter()
            .position(|l| l.order_id == order_id)
            .ok_or_else(|| ExchangeError::NotFound(format!("listing {order_id}")))?;
        if self.listings[position].owner == taker {
            return Err(ExchangeError::Conflict(
                "cannot take your own listing".to_string(),
            ));
        }
        let listing = self.listings.remove(position);
        let trade = ledger.record(TradeDraft {
            buyer: taker.to_string(),
            seller: listing.owner,
            price: listing.price,
            quantity: listing.quantity,
            contract: listing.contract,
            timestamp: Some(now),
            is_v2: false,
        });
        debug!(%order_id, trade_id = %trade.trade_id, "legacy listing taken");
        Ok(trade)
    }

    /// Number of open listings.
    pub fn len(&self) -> usize {
        self.listings.len()
    }

    /// Whether the board is empty.
    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }
}
