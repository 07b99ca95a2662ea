//! Prelude module that re-exports the commonly used exchange types.
//!
//! ```rust
//! use enerex::prelude::*;
//! ```

// Matching engine
pub use crate::orderbook::{
    ContractKey, DELIVERY_WINDOW_MS, NewOrder, Order, OrderBook, OrderStatus, Side, Submission,
};

// Ledger and trade sinks
pub use crate::ledger::{Trade, TradeDraft, TradeLedger};
pub use crate::stream::{BufferedSink, LiveSink, TradeBroadcaster, TradeSink};

// Identity and collateral
pub use crate::identity::{Collateral, CollateralSource, IdentityService};

// Batch operations
pub use crate::batch::{BatchContract, BatchOp, BatchOutcome};

// Wire codec
pub use crate::codec::{CodecError, Field, Message, Value, WireVersion};

// Errors
pub use crate::error::ExchangeError;

// Utilities
pub use crate::utils::current_time_millis;
