//! Multi-contract continuous limit order book and matching engine.

mod book;
mod matching;
mod order;

mod tests;

pub use book::{BookSnapshot, OrderBook};
pub use matching::{NewOrder, Submission};
pub use order::{
    ContractKey, DELIVERY_WINDOW_MS, Order, OrderStatus, Side, signed_exposure,
};
