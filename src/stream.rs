//! Trade sinks and the live trade stream broadcaster.
//!
//! The matching engine records trades through a [`TradeSink`] so the batch
//! executor can swap the live record-and-broadcast path for a buffering one:
//! trades produced inside a batch stay invisible until the batch commits,
//! and are dropped unsent on rollback.

use bytes::Bytes;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, error};
use uuid::Uuid;

use crate::codec::{CodecError, Message, WireVersion};
use crate::ledger::{Trade, TradeDraft, TradeLedger};

/// Recording seam between the matching engine and the ledger.
///
/// Implementations decide what happens after the ledger append: the live
/// sink pushes the trade to every stream consumer immediately, the buffered
/// sink holds it until the surrounding batch commits.
pub trait TradeSink {
    /// Record a trade through the ledger and route it per this sink's
    /// policy.
    fn record(&mut self, ledger: &mut TradeLedger, draft: TradeDraft) -> Trade;
}

struct Consumer {
    id: Uuid,
    tx: UnboundedSender<Bytes>,
}

/// Fan-out of matching-engine trades to attached stream consumers.
///
/// Consumers are WebSocket pump tasks holding the receiving half of an
/// unbounded channel; one that can no longer be written to is dropped on
/// the next broadcast.
#[derive(Default)]
pub struct TradeBroadcaster {
    consumers: Vec<Consumer>,
}

impl TradeBroadcaster {
    /// A broadcaster with no consumers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new stream consumer; returns its handle id and the frame
    /// receiver to pump into the socket.
    pub fn subscribe(&mut self) -> (Uuid, UnboundedReceiver<Bytes>) {
        let (tx, rx) = unbounded_channel();
        let id = Uuid::new_v4();
        self.consumers.push(Consumer { id, tx });
        debug!(consumer = %id, total = self.consumers.len(), "stream consumer attached");
        (id, rx)
    }

    /// Detach a consumer on its close event.
    pub fn unsubscribe(&mut self, id: Uuid) {
        self.consumers.retain(|c| c.id != id);
        debug!(consumer = %id, total = self.consumers.len(), "stream consumer detached");
    }

    /// Number of currently attached consumers.
    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// Push one matching-engine trade to every attached consumer.
    ///
    /// Legacy trades never reach the stream. Send failures drop the
    /// affected consumer and are never surfaced to the originating request.
    pub fn broadcast(&mut self, trade: &Trade) {
        if !trade.is_v2 {
            return;
        }
        let frame = match encode_stream_frame(trade) {
            Ok(frame) => frame,
            Err(err) => {
                error!(trade_id = %trade.trade_id, %err, "failed to encode stream frame");
                return;
            }
        };
        self.consumers.retain(|c| {
            if c.tx.send(frame.clone()).is_err() {
                error!(consumer = %c.id, "dropping unwritable stream consumer");
                false
            } else {
                true
            }
        });
    }
}

/// Encode one trade as a standalone stream message. Each WebSocket frame
/// carries exactly one such message, with no extra delimiter.
pub fn encode_stream_frame(trade: &Trade) -> Result<Bytes, CodecError> {
    Message::new()
        .with_str("trade_id", trade.trade_id.simple().to_string())
        .with_str("buyer", trade.buyer.clone())
        .with_str("seller", trade.seller.clone())
        .with_int("price", trade.price)
        .with_int("quantity", trade.quantity)
        .with_int("delivery_start", trade.contract.delivery_start)
        .with_int("delivery_end", trade.contract.delivery_end)
        .with_int("timestamp", trade.timestamp)
        .encode(WireVersion::V2)
}

/// Ordinary matching path: record, then broadcast immediately.
pub struct LiveSink<'a> {
    broadcaster: &'a mut TradeBroadcaster,
}

impl<'a> LiveSink<'a> {
    /// A live sink pushing into `broadcaster`.
    pub fn new(broadcaster: &'a mut TradeBroadcaster) -> Self {
        LiveSink { broadcaster }
    }
}

impl TradeSink for LiveSink<'_> {
    fn record(&mut self, ledger: &mut TradeLedger, draft: TradeDraft) -> Trade {
        let trade = ledger.record(draft);
        self.broadcaster.broadcast(&trade);
        trade
    }
}

/// Batch path: record, but hold broadcasts until commit.
#[derive(Default)]
pub struct BufferedSink {
    trades: Vec<Trade>,
}

impl BufferedSink {
    /// An empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// The buffered trades in production order, consumed on batch commit.
    pub fn into_trades(self) -> Vec<Trade> {
        self.trades
    }

    /// Number of trades held.
    pub fn len(&self) -> usize {
        self.trades.len()
    }

    /// Whether the buffer holds no trades.
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}

impl TradeSink for BufferedSink {
    fn record(&mut self, ledger: &mut TradeLedger, draft: TradeDraft) -> Trade {
        let trade = ledger.record(draft);
        self.trades.push(trade.clone());
        trade
    }
}
