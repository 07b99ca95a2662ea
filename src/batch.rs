//! Transactional batch operations over the order book and trade ledger.
//!
//! A batch is a list of contract-scoped operation groups. The executor
//! snapshots the book and the ledger once, walks contracts and operations in
//! submission order through the ordinary entry points, and on the first
//! failure restores both snapshots so an observer sees either the pre-batch
//! state or the fully applied one. Trades produced inside the batch are
//! buffered and only reach the stream when the batch commits.

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ExchangeError;
use crate::identity::IdentityService;
use crate::ledger::TradeLedger;
use crate::orderbook::{ContractKey, NewOrder, OrderBook, OrderStatus, Side};
use crate::stream::{BufferedSink, TradeBroadcaster, TradeSink};
use crate::utils::DAY_MS;

/// Furthest-out delivery start a batch contract may name.
const BOOKING_HORIZON_DAYS: i64 = 30;

/// One contract-scoped group of operations.
#[derive(Debug, Clone)]
pub struct BatchContract {
    /// Delivery window start, validated inside the executor.
    pub delivery_start: i64,
    /// Delivery window end.
    pub delivery_end: i64,
    /// Operations applied in submission order.
    pub operations: Vec<BatchOp>,
}

/// A single batched operation. The participant token is resolved
/// per-operation, so one batch can act for several users.
#[derive(Debug, Clone)]
pub enum BatchOp {
    /// Submit a new order.
    Create {
        /// Bearer token of the acting participant.
        token: String,
        /// Buy or sell.
        side: Side,
        /// Limit price.
        price: i64,
        /// Quantity.
        quantity: i64,
    },
    /// Modify an existing order.
    Modify {
        /// Bearer token of the acting participant.
        token: String,
        /// Target order.
        order_id: Uuid,
        /// New price.
        price: i64,
        /// New quantity.
        quantity: i64,
    },
    /// Cancel an existing order.
    Cancel {
        /// Bearer token of the acting participant.
        token: String,
        /// Target order.
        order_id: Uuid,
    },
}

/// Per-operation outcome, aligned with the input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// A create, with the fresh id and the post-submission status.
    Created {
        /// Id of the created order.
        order_id: Uuid,
        /// Post-submission status.
        status: OrderStatus,
    },
    /// A modify of the given order.
    Modified {
        /// Id of the modified order.
        order_id: Uuid,
    },
    /// A cancel.
    Cancelled,
}

/// Execute a batch atomically.
///
/// On success the buffered trades are flushed to the broadcaster in
/// production order and the per-operation outcomes are returned. On the
/// first failure both snapshots are restored, the buffer is dropped unsent,
/// and the failure becomes the batch's overall result.
pub fn execute_batch(
    contracts: &[BatchContract],
    now: i64,
    identity: &IdentityService,
    book: &mut OrderBook,
    ledger: &mut TradeLedger,
    broadcaster: &mut TradeBroadcaster,
) -> Result<Vec<BatchOutcome>, ExchangeError> {
    let book_snapshot = book.snapshot();
    let ledger_snapshot = ledger.snapshot();
    let mut sink = BufferedSink::new();
    let mut outcomes = Vec::new();

    let result = apply_all(contracts, now, identity, book, ledger, &mut sink, &mut outcomes);

    match result {
        Ok(()) => {
            let trades = sink.into_trades();
            info!(
                operations = outcomes.len(),
                trades = trades.len(),
                "batch committed"
            );
            for trade in &trades {
                broadcaster.broadcast(trade);
            }
            Ok(outcomes)
        }
        Err(err) => {
            debug!(%err, applied = outcomes.len(), "batch failed, rolling back");
            book.restore(book_snapshot);
            ledger.restore(ledger_snapshot);
            Err(err)
        }
    }
}

fn apply_all(
    contracts: &[BatchContract],
    now: i64,
    identity: &IdentityService,
    book: &mut OrderBook,
    ledger: &mut TradeLedger,
    sink: &mut BufferedSink,
    outcomes: &mut Vec<BatchOutcome>,
) -> Result<(), ExchangeError> {
    for group in contracts {
        let contract = validate_contract(group, now)?;
        for op in &group.operations {
            outcomes.push(apply_op(op, contract, now, identity, book, ledger, sink)?);
        }
    }
    Ok(())
}

/// Per-contract validation, run before any of the contract's operations.
fn validate_contract(group: &BatchContract, now: i64) -> Result<ContractKey, ExchangeError> {
    let contract = ContractKey::new(group.delivery_start, group.delivery_end)?;
    if contract.delivery_end <= now {
        return Err(ExchangeError::TooLate);
    }
    if contract.delivery_start > now + BOOKING_HORIZON_DAYS * DAY_MS {
        return Err(ExchangeError::TooEarly);
    }
    Ok(contract)
}

fn apply_op(
    op: &BatchOp,
    contract: ContractKey,
    now: i64,
    identity: &IdentityService,
    book: &mut OrderBook,
    ledger: &mut TradeLedger,
    sink: &mut BufferedSink,
) -> Result<BatchOutcome, ExchangeError> {
    match op {
        BatchOp::Create {
            token,
            side,
            price,
            quantity,
        } => {
            let owner = identity
                .resolve_token(token)
                .ok_or(ExchangeError::Unauthorized)?
                .to_string();
            let submission = book.submit(
                NewOrder {
                    owner,
                    side: *side,
                    price: *price,
                    quantity: *quantity,
                    contract,
                },
                now,
                identity,
                ledger,
                sink,
            )?;
            Ok(BatchOutcome::Created {
                order_id: submission.order_id,
                status: submission.status,
            })
        }
        BatchOp::Modify {
            token,
            order_id,
            price,
            quantity,
        } => {
            let owner = identity
                .resolve_token(token)
                .ok_or(ExchangeError::Unauthorized)?
                .to_string();
            book.modify(&owner, *order_id, *price, *quantity, now, identity, ledger, sink)?;
            Ok(BatchOutcome::Modified {
                order_id: *order_id,
            })
        }
        BatchOp::Cancel { token, order_id } => {
            let owner = identity
                .resolve_token(token)
                .ok_or(ExchangeError::Unauthorized)?
                .to_string();
            book.cancel(&owner, *order_id)?;
            Ok(BatchOutcome::Cancelled)
        }
    }
}
