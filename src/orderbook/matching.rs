//! Matching-engine entry points: submit, modify, cancel.
//!
//! Every admission runs the same pipeline: structural validation, the
//! contract's trading window, the collateral exposure check, a self-match
//! probe that mirrors the real consumption order, and finally execution at
//! maker prices with any residual resting in the book. A submission either
//! fails whole or commits every trade its cascade produced.

use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::ExchangeError;
use crate::identity::{Collateral, CollateralSource};
use crate::ledger::{TradeDraft, TradeLedger};
use crate::stream::TradeSink;

use super::book::OrderBook;
use super::order::{ContractKey, Order, OrderStatus, Side, signed_exposure};

/// Parameters of a new matching-engine order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// Owning username (already resolved from the bearer token).
    pub owner: String,
    /// Buy or sell.
    pub side: Side,
    /// Limit price; may be negative.
    pub price: i64,
    /// Quantity, at least 1.
    pub quantity: i64,
    /// Target delivery contract.
    pub contract: ContractKey,
}

/// Observable result of a submit or modify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// The order's id (fresh on submit, stable on modify).
    pub order_id: Uuid,
    /// Reported status: `FILLED` when any quantity matched, `ACTIVE` when
    /// nothing did and the order rests.
    pub status: OrderStatus,
    /// Quantity matched by this call.
    pub filled_quantity: i64,
}

impl OrderBook {
    /// Submit a new order: validate, check the trading window and the
    /// owner's collateral, probe for self-matches, then execute against
    /// crossing liquidity and rest any residual.
    ///
    /// # Errors
    /// `InvalidInput`, `TooEarly`, `TooLate`, `InsufficientCollateral` or
    /// `SelfMatch`, all before any state changes.
    pub fn submit(
        &mut self,
        request: NewOrder,
        now: i64,
        limits: &dyn CollateralSource,
        ledger: &mut TradeLedger,
        sink: &mut dyn TradeSink,
    ) -> Result<Submission, ExchangeError> {
        if request.quantity < 1 {
            return Err(ExchangeError::invalid("quantity must be at least 1"));
        }
        check_trading_window(request.contract, now)?;

        // Admit as if the order were already resting with its full quantity.
        let added = signed_exposure(request.side, request.price, request.quantity);
        self.check_collateral(&request.owner, added, limits, ledger)?;

        self.check_self_match(
            &request.owner,
            request.side,
            request.price,
            request.quantity,
            request.contract,
            None,
        )?;

        let order_id = Uuid::new_v4();
        trace!(
            %order_id,
            owner = %request.owner,
            side = %request.side,
            price = request.price,
            quantity = request.quantity,
            contract = %request.contract,
            "admitting order"
        );

        let (filled, remaining) = self.execute(
            &request.owner,
            request.side,
            request.price,
            request.contract,
            request.quantity,
            None,
            now,
            ledger,
            sink,
        );

        if remaining > 0 {
            let seq = self.bump_seq();
            self.insert(Order {
                order_id,
                owner: request.owner,
                side: request.side,
                price: request.price,
                remaining_quantity: remaining,
                original_quantity: request.quantity,
                contract: request.contract,
                status: OrderStatus::Active,
                priority_timestamp: now,
                is_v2: true,
                seq,
            });
        }

        Ok(Submission {
            order_id,
            status: reported_status(filled),
            filled_quantity: filled,
        })
    }

    /// Modify a resting order's price and quantity in place, then re-run
    /// execution against the post-modification book.
    ///
    /// The priority timestamp resets when the price changes or the quantity
    /// grows beyond the old remaining; shrinking quantity at the same price
    /// keeps the original priority.
    ///
    /// # Errors
    /// `NotFound` (absent, terminal or non-engine order), `Forbidden`
    /// (owner mismatch), `InvalidInput`, `InsufficientCollateral` or
    /// `SelfMatch`, all before any state changes.
    #[allow(clippy::too_many_arguments)]
    pub fn modify(
        &mut self,
        owner: &str,
        order_id: Uuid,
        new_price: i64,
        new_quantity: i64,
        now: i64,
        limits: &dyn CollateralSource,
        ledger: &mut TradeLedger,
        sink: &mut dyn TradeSink,
    ) -> Result<Submission, ExchangeError> {
        let order = match self.get(&order_id) {
            Some(o) if o.is_v2 && !o.status.is_terminal() => o,
            _ => return Err(ExchangeError::NotFound(format!("order {order_id}"))),
        };
        if order.owner != owner {
            return Err(ExchangeError::Forbidden);
        }
        if new_quantity < 1 {
            return Err(ExchangeError::invalid("quantity must be at least 1"));
        }

        let (side, contract) = (order.side, order.contract);
        let old_price = order.price;
        let old_remaining = order.remaining_quantity;

        // Hypothetical potential with this order's exposure replaced.
        let added = signed_exposure(side, new_price, new_quantity)
            - signed_exposure(side, old_price, old_remaining);
        self.check_collateral(owner, added, limits, ledger)?;

        // The order itself never counts as a self-match counterparty.
        self.check_self_match(owner, side, new_price, new_quantity, contract, Some(order_id))?;

        let reset_priority = new_price != old_price || new_quantity > old_remaining;
        let seq = if reset_priority { Some(self.bump_seq()) } else { None };
        let order = self
            .get_mut(&order_id)
            .ok_or_else(|| ExchangeError::NotFound(format!("order {order_id}")))?;
        order.price = new_price;
        order.remaining_quantity = new_quantity;
        order.original_quantity = order.original_quantity.max(new_quantity);
        if let Some(seq) = seq {
            order.priority_timestamp = now;
            order.seq = seq;
        }
        debug!(
            %order_id,
            price = new_price,
            quantity = new_quantity,
            reset_priority,
            "order modified"
        );

        // Re-run execution exactly as on admission, taker = modified order.
        let (filled, remaining) = self.execute(
            owner,
            side,
            new_price,
            contract,
            new_quantity,
            Some(order_id),
            now,
            ledger,
            sink,
        );
        let order = self
            .get_mut(&order_id)
            .ok_or_else(|| ExchangeError::NotFound(format!("order {order_id}")))?;
        order.remaining_quantity = remaining;
        if remaining == 0 {
            order.status = OrderStatus::Filled;
        }

        Ok(Submission {
            order_id,
            status: reported_status(filled),
            filled_quantity: filled,
        })
    }

    /// Cancel a resting order.
    ///
    /// # Errors
    /// `NotFound` (absent, terminal or non-engine order) or `Forbidden`
    /// (owner mismatch).
    pub fn cancel(&mut self, owner: &str, order_id: Uuid) -> Result<(), ExchangeError> {
        let order = match self.get(&order_id) {
            Some(o) if o.is_v2 && !o.status.is_terminal() => o,
            _ => return Err(ExchangeError::NotFound(format!("order {order_id}"))),
        };
        if order.owner != owner {
            return Err(ExchangeError::Forbidden);
        }
        let order = self
            .get_mut(&order_id)
            .ok_or_else(|| ExchangeError::NotFound(format!("order {order_id}")))?;
        order.status = OrderStatus::Cancelled;
        order.remaining_quantity = 0;
        debug!(%order_id, "order cancelled");
        Ok(())
    }

    /// Exposure admission: `potential + added ≥ −C`, skipped entirely for
    /// unlimited collateral.
    fn check_collateral(
        &self,
        owner: &str,
        added_exposure: i128,
        limits: &dyn CollateralSource,
        ledger: &TradeLedger,
    ) -> Result<(), ExchangeError> {
        let limit = match limits.collateral_limit(owner) {
            Collateral::Unlimited => return Ok(()),
            Collateral::Limit(c) => c as i128,
        };
        let potential = self.potential_balance(owner, ledger.balance(owner)) + added_exposure;
        if potential < -limit {
            return Err(ExchangeError::InsufficientCollateral);
        }
        Ok(())
    }

    /// Self-match probe mirroring the real consumption order: walk crossing
    /// resting orders best-first, deducting from a simulated remaining, and
    /// fail if an own order would be consumed before the quantity runs out.
    fn check_self_match(
        &self,
        owner: &str,
        side: Side,
        price: i64,
        quantity: i64,
        contract: ContractKey,
        exclude: Option<Uuid>,
    ) -> Result<(), ExchangeError> {
        let mut simulated = quantity;
        for id in self.crossing_resting_ids(contract, side, price, exclude) {
            if simulated == 0 {
                break;
            }
            let resting = match self.get(&id) {
                Some(o) => o,
                None => continue,
            };
            if resting.owner == owner {
                return Err(ExchangeError::SelfMatch);
            }
            simulated -= simulated.min(resting.remaining_quantity);
        }
        Ok(())
    }

    /// Consume crossing liquidity at maker prices until the incoming
    /// quantity is exhausted or crossing ends. Returns `(filled,
    /// remaining)`; the caller decides what happens to the residual.
    #[allow(clippy::too_many_arguments)]
    fn execute(
        &mut self,
        taker_owner: &str,
        taker_side: Side,
        taker_price: i64,
        contract: ContractKey,
        quantity: i64,
        exclude: Option<Uuid>,
        now: i64,
        ledger: &mut TradeLedger,
        sink: &mut dyn TradeSink,
    ) -> (i64, i64) {
        let mut remaining = quantity;
        let mut filled = 0i64;

        for id in self.crossing_resting_ids(contract, taker_side, taker_price, exclude) {
            if remaining == 0 {
                break;
            }
            let resting = match self.get_mut(&id) {
                Some(o) => o,
                None => continue,
            };
            let traded = remaining.min(resting.remaining_quantity);
            let trade_price = resting.price;
            let maker_owner = resting.owner.clone();

            resting.remaining_quantity -= traded;
            if resting.remaining_quantity == 0 {
                resting.status = OrderStatus::Filled;
            }

            let (buyer, seller) = match taker_side {
                Side::Buy => (taker_owner.to_string(), maker_owner),
                Side::Sell => (maker_owner, taker_owner.to_string()),
            };
            let trade = sink.record(
                ledger,
                TradeDraft {
                    buyer,
                    seller,
                    price: trade_price,
                    quantity: traded,
                    contract,
                    timestamp: Some(now),
                    is_v2: true,
                },
            );
            trace!(
                trade_id = %trade.trade_id,
                maker = %id,
                price = trade_price,
                quantity = traded,
                "match"
            );

            remaining -= traded;
            filled += traded;
        }

        (filled, remaining)
    }
}

/// Trading-window gate shared by submit and the batch creates.
fn check_trading_window(contract: ContractKey, now: i64) -> Result<(), ExchangeError> {
    if now < contract.trading_open() {
        return Err(ExchangeError::TooEarly);
    }
    if now > contract.trading_close() {
        return Err(ExchangeError::TooLate);
    }
    Ok(())
}

/// Post-submission status rule: `FILLED` whenever any quantity matched
/// (even with a residual resting), `ACTIVE` when nothing matched.
fn reported_status(filled: i64) -> OrderStatus {
    if filled > 0 {
        OrderStatus::Filled
    } else {
        OrderStatus::Active
    }
}
