//! # Enerex — a simulated energy exchange
//!
//! A server for a simulated energy exchange: participants submit buy and
//! sell offers for electricity delivered during fixed one-hour contract
//! windows, and the engine matches crossing offers into trades with
//! continuous price-time priority.
//!
//! ## Core pieces
//!
//! - **Matching engine** ([`orderbook`]): a continuous limit order book per
//!   delivery contract. Incoming orders consume crossing liquidity at the
//!   resting (maker) price and rest with any residual. Admission is gated
//!   by a trading window, a per-user collateral limit on open exposure, and
//!   a self-match probe that mirrors the real consumption order.
//! - **Batch executor** ([`batch`]): contract-scoped operation groups
//!   applied atomically — the order book and trade ledger are snapshotted
//!   up front and restored wholesale on the first failure.
//! - **Wire codec** ([`codec`]): the self-describing length-prefixed binary
//!   format used on every request and response body, in two interoperable
//!   versions.
//! - **Trade stream** ([`stream`]): fan-out of executed trades to WebSocket
//!   consumers, with buffering inside batches so only committed trades are
//!   ever published.
//!
//! ## Concurrency model
//!
//! All mutable state is owned by a single engine task ([`engine`]); HTTP
//! handlers communicate with it over a channel. One request is dispatched
//! fully — validation, matching cascade and response building — before the
//! next begins, so matching is atomic from every observer's viewpoint.
//!
//! ## Example
//!
//! ```
//! use enerex::prelude::*;
//!
//! let mut book = OrderBook::new();
//! let mut ledger = TradeLedger::new();
//! let mut sink = BufferedSink::new();
//! let limits = IdentityService::new();
//!
//! let contract = ContractKey::new(3_600_000_000_000, 3_600_003_600_000)?;
//! let now = contract.trading_open() + 1;
//!
//! book.submit(
//!     NewOrder {
//!         owner: "alice".into(),
//!         side: Side::Sell,
//!         price: 150,
//!         quantity: 1000,
//!         contract,
//!     },
//!     now,
//!     &limits,
//!     &mut ledger,
//!     &mut sink,
//! )?;
//! let result = book.submit(
//!     NewOrder {
//!         owner: "bob".into(),
//!         side: Side::Buy,
//!         price: 155,
//!         quantity: 1000,
//!         contract,
//!     },
//!     now + 1,
//!     &limits,
//!     &mut ledger,
//!     &mut sink,
//! )?;
//! assert_eq!(result.filled_quantity, 1000);
//! // Maker price rule: the trade printed at the resting 150.
//! assert_eq!(sink.into_trades()[0].price, 150);
//! # Ok::<(), enerex::ExchangeError>(())
//! ```

pub mod batch;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod legacy;
pub mod orderbook;
pub mod persist;
pub mod server;
pub mod stream;

pub mod prelude;
mod utils;

pub use batch::{BatchContract, BatchOp, BatchOutcome};
pub use error::ExchangeError;
pub use identity::{Collateral, CollateralSource, IdentityService};
pub use ledger::{Trade, TradeDraft, TradeLedger};
pub use orderbook::{ContractKey, NewOrder, Order, OrderBook, OrderStatus, Side, Submission};
pub use stream::{BufferedSink, LiveSink, TradeBroadcaster, TradeSink};
pub use utils::current_time_millis;
