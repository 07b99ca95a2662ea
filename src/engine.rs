//! The exchange engine: composition root and single-threaded dispatcher.
//!
//! All mutable state — identity, ledger, order book, legacy board and the
//! stream broadcaster — is owned by one [`Exchange`] value, driven by one
//! task. HTTP handlers talk to it over an unbounded channel of
//! [`EngineRequest`] values, each carrying a oneshot responder. A request is
//! dispatched fully (validation, matching cascade, response building)
//! before the next one starts, so no observer ever sees a half-applied
//! operation.

use bytes::Bytes;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::batch::{BatchContract, BatchOutcome, execute_batch};
use crate::config::Config;
use crate::error::ExchangeError;
use crate::identity::{CollateralSource, IdentityService};
use crate::ledger::{Trade, TradeLedger, clamp_to_wire};
use crate::legacy::{LegacyBoard, Listing};
use crate::orderbook::{ContractKey, NewOrder, Order, OrderBook, Side, Submission};
use crate::persist::{PersistedState, StateStore};
use crate::stream::{LiveSink, TradeBroadcaster};
use crate::utils::current_time_millis;

/// Snapshot of one user's cash position for the balance endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceView {
    /// Realized cash balance.
    pub balance: i64,
    /// Realized balance plus open exposure.
    pub potential_balance: i64,
    /// Collateral limit; `-1` means unlimited.
    pub collateral: i64,
}

/// The exchange state, owned exclusively by the engine task.
pub struct Exchange {
    identity: IdentityService,
    ledger: TradeLedger,
    book: OrderBook,
    legacy: LegacyBoard,
    broadcaster: TradeBroadcaster,
    store: Option<StateStore>,
    admin_token: String,
}

impl Exchange {
    /// Build the exchange from configuration, restoring persisted state
    /// when a snapshot exists.
    pub fn from_config(config: &Config) -> Self {
        let store = config
            .persistent_dir
            .as_deref()
            .map(StateStore::new);

        let mut exchange = Exchange {
            identity: IdentityService::new(),
            ledger: TradeLedger::new(),
            book: OrderBook::new(),
            legacy: LegacyBoard::new(),
            broadcaster: TradeBroadcaster::new(),
            store,
            admin_token: config.admin_token.clone(),
        };
        if let Some(state) = exchange.store.as_ref().and_then(StateStore::load) {
            exchange.identity = state.identity;
            exchange.ledger.restore(state.ledger);
            exchange.book.restore(state.book);
            exchange.legacy = state.legacy;
        }
        exchange
    }

    fn save_state(&self) {
        if let Some(store) = &self.store {
            store.save(&PersistedState::new(
                self.identity.clone(),
                self.ledger.snapshot(),
                self.book.snapshot(),
                self.legacy.clone(),
            ));
        }
    }

    fn resolve(&self, token: &str) -> Result<String, ExchangeError> {
        self.identity
            .resolve_token(token)
            .map(str::to_string)
            .ok_or(ExchangeError::Unauthorized)
    }

    // -- identity ----------------------------------------------------------

    fn register(&mut self, username: &str, password: &str) -> Result<(), ExchangeError> {
        let result = self.identity.register(username, password);
        if result.is_ok() {
            self.save_state();
        }
        result
    }

    fn login(&mut self, username: &str, password: &str) -> Result<String, ExchangeError> {
        let result = self.identity.login(username, password);
        if result.is_ok() {
            self.save_state();
        }
        result
    }

    fn change_password(
        &mut self,
        username: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), ExchangeError> {
        let result = self
            .identity
            .change_password(username, old_password, new_password);
        if result.is_ok() {
            self.save_state();
        }
        result
    }

    fn set_collateral(
        &mut self,
        admin_token: &str,
        username: &str,
        limit: i64,
    ) -> Result<(), ExchangeError> {
        if admin_token != self.admin_token {
            return Err(ExchangeError::Unauthorized);
        }
        let result = self.identity.set_collateral(username, limit);
        if result.is_ok() {
            self.save_state();
        }
        result
    }

    fn balance(&self, token: &str) -> Result<BalanceView, ExchangeError> {
        let username = self.resolve(token)?;
        let realized = self.ledger.balance(&username);
        let potential = self.book.potential_balance(&username, realized);
        Ok(BalanceView {
            balance: self.ledger.balance_wire(&username),
            potential_balance: clamp_to_wire(potential, &username),
            collateral: self.identity.collateral_limit(&username).wire_value(),
        })
    }

    // -- matching engine ---------------------------------------------------

    fn submit_order(
        &mut self,
        token: &str,
        side: Side,
        price: i64,
        quantity: i64,
        contract: ContractKey,
    ) -> Result<Submission, ExchangeError> {
        let owner = self.resolve(token)?;
        let now = current_time_millis();
        let mut sink = LiveSink::new(&mut self.broadcaster);
        let result = self.book.submit(
            NewOrder {
                owner,
                side,
                price,
                quantity,
                contract,
            },
            now,
            &self.identity,
            &mut self.ledger,
            &mut sink,
        );
        if result.is_ok() {
            self.save_state();
        }
        result
    }

    fn modify_order(
        &mut self,
        token: &str,
        order_id: Uuid,
        price: i64,
        quantity: i64,
    ) -> Result<Submission, ExchangeError> {
        let owner = self.resolve(token)?;
        let now = current_time_millis();
        let mut sink = LiveSink::new(&mut self.broadcaster);
        let result = self.book.modify(
            &owner,
            order_id,
            price,
            quantity,
            now,
            &self.identity,
            &mut self.ledger,
            &mut sink,
        );
        if result.is_ok() {
            self.save_state();
        }
        result
    }

    fn cancel_order(&mut self, token: &str, order_id: Uuid) -> Result<(), ExchangeError> {
        let owner = self.resolve(token)?;
        let result = self.book.cancel(&owner, order_id);
        if result.is_ok() {
            self.save_state();
        }
        result
    }

    fn levels(&self, contract: ContractKey) -> (Vec<Order>, Vec<Order>) {
        self.book.levels(contract, current_time_millis())
    }

    fn my_orders(&self, token: &str) -> Result<Vec<Order>, ExchangeError> {
        let owner = self.resolve(token)?;
        Ok(self.book.my_active(&owner))
    }

    fn trades(&self, window: Option<ContractKey>) -> Vec<Trade> {
        self.ledger
            .all()
            .into_iter()
            .filter(|t| t.is_v2 && window.is_none_or(|w| t.contract == w))
            .collect()
    }

    fn my_trades(
        &self,
        token: &str,
        window: Option<ContractKey>,
    ) -> Result<Vec<Trade>, ExchangeError> {
        let username = self.resolve(token)?;
        Ok(self
            .trades(window)
            .into_iter()
            .filter(|t| t.buyer == username || t.seller == username)
            .collect())
    }

    fn bulk(&mut self, contracts: &[BatchContract]) -> Result<Vec<BatchOutcome>, ExchangeError> {
        let now = current_time_millis();
        let result = execute_batch(
            contracts,
            now,
            &self.identity,
            &mut self.book,
            &mut self.ledger,
            &mut self.broadcaster,
        );
        if result.is_ok() {
            self.save_state();
        }
        result
    }

    // -- legacy board ------------------------------------------------------

    fn legacy_create(
        &mut self,
        token: &str,
        price: i64,
        quantity: i64,
        contract: ContractKey,
    ) -> Result<Uuid, ExchangeError> {
        let owner = self.resolve(token)?;
        let result = self
            .legacy
            .create(&owner, price, quantity, contract, current_time_millis());
        if result.is_ok() {
            self.save_state();
        }
        result
    }

    fn legacy_take(&mut self, token: &str, order_id: Uuid) -> Result<Trade, ExchangeError> {
        let taker = self.resolve(token)?;
        let result = self
            .legacy
            .take(&taker, order_id, current_time_millis(), &mut self.ledger);
        if result.is_ok() {
            self.save_state();
        }
        result
    }
}

/// One request to the engine task. Each variant carries its own responder;
/// a dropped responder (client gone) never cancels the dispatch — the
/// operation commits and the response is discarded.
pub enum EngineRequest {
    /// Register a user.
    Register {
        username: String,
        password: String,
        respond_to: oneshot::Sender<Result<(), ExchangeError>>,
    },
    /// Log in and mint a token.
    Login {
        username: String,
        password: String,
        respond_to: oneshot::Sender<Result<String, ExchangeError>>,
    },
    /// Change a password, invalidating the user's tokens.
    ChangePassword {
        username: String,
        old_password: String,
        new_password: String,
        respond_to: oneshot::Sender<Result<(), ExchangeError>>,
    },
    /// Admin: set a user's collateral limit.
    SetCollateral {
        admin_token: String,
        username: String,
        limit: i64,
        respond_to: oneshot::Sender<Result<(), ExchangeError>>,
    },
    /// Balance, potential balance and collateral for the caller.
    Balance {
        token: String,
        respond_to: oneshot::Sender<Result<BalanceView, ExchangeError>>,
    },
    /// Visible book for one contract.
    Levels {
        contract: ContractKey,
        respond_to: oneshot::Sender<(Vec<Order>, Vec<Order>)>,
    },
    /// Submit a new order.
    SubmitOrder {
        token: String,
        side: Side,
        price: i64,
        quantity: i64,
        contract: ContractKey,
        respond_to: oneshot::Sender<Result<Submission, ExchangeError>>,
    },
    /// Modify an order.
    ModifyOrder {
        token: String,
        order_id: Uuid,
        price: i64,
        quantity: i64,
        respond_to: oneshot::Sender<Result<Submission, ExchangeError>>,
    },
    /// Cancel an order.
    CancelOrder {
        token: String,
        order_id: Uuid,
        respond_to: oneshot::Sender<Result<(), ExchangeError>>,
    },
    /// The caller's active orders, newest first.
    MyOrders {
        token: String,
        respond_to: oneshot::Sender<Result<Vec<Order>, ExchangeError>>,
    },
    /// Matching-engine trades, optionally filtered to one contract.
    Trades {
        window: Option<ContractKey>,
        respond_to: oneshot::Sender<Vec<Trade>>,
    },
    /// The caller's matching-engine trades.
    MyTrades {
        token: String,
        window: Option<ContractKey>,
        respond_to: oneshot::Sender<Result<Vec<Trade>, ExchangeError>>,
    },
    /// Atomic batch of contract-scoped operations.
    Bulk {
        contracts: Vec<BatchContract>,
        respond_to: oneshot::Sender<Result<Vec<BatchOutcome>, ExchangeError>>,
    },
    /// Post a legacy sell listing.
    LegacyCreate {
        token: String,
        price: i64,
        quantity: i64,
        contract: ContractKey,
        respond_to: oneshot::Sender<Result<Uuid, ExchangeError>>,
    },
    /// Open legacy listings.
    LegacyList {
        respond_to: oneshot::Sender<Vec<Listing>>,
    },
    /// Take a legacy listing whole.
    LegacyTake {
        token: String,
        order_id: Uuid,
        respond_to: oneshot::Sender<Result<Trade, ExchangeError>>,
    },
    /// Attach a trade-stream consumer.
    Subscribe {
        respond_to: oneshot::Sender<(Uuid, UnboundedReceiver<Bytes>)>,
    },
    /// Detach a trade-stream consumer.
    Unsubscribe {
        consumer: Uuid,
    },
}

impl EngineRequest {
    fn name(&self) -> &'static str {
        match self {
            EngineRequest::Register { .. } => "register",
            EngineRequest::Login { .. } => "login",
            EngineRequest::ChangePassword { .. } => "change_password",
            EngineRequest::SetCollateral { .. } => "set_collateral",
            EngineRequest::Balance { .. } => "balance",
            EngineRequest::Levels { .. } => "levels",
            EngineRequest::SubmitOrder { .. } => "submit_order",
            EngineRequest::ModifyOrder { .. } => "modify_order",
            EngineRequest::CancelOrder { .. } => "cancel_order",
            EngineRequest::MyOrders { .. } => "my_orders",
            EngineRequest::Trades { .. } => "trades",
            EngineRequest::MyTrades { .. } => "my_trades",
            EngineRequest::Bulk { .. } => "bulk",
            EngineRequest::LegacyCreate { .. } => "legacy_create",
            EngineRequest::LegacyList { .. } => "legacy_list",
            EngineRequest::LegacyTake { .. } => "legacy_take",
            EngineRequest::Subscribe { .. } => "subscribe",
            EngineRequest::Unsubscribe { .. } => "unsubscribe",
        }
    }
}

/// Handle for sending requests to a running engine task.
pub type EngineHandle = UnboundedSender<EngineRequest>;

/// Spawn the engine task over the given exchange state.
pub fn spawn(mut exchange: Exchange) -> (EngineHandle, JoinHandle<()>) {
    let (tx, mut rx) = unbounded_channel::<EngineRequest>();
    let handle = tokio::spawn(async move {
        info!("engine task started");
        while let Some(request) = rx.recv().await {
            debug!(request = request.name(), "dispatch");
            dispatch(&mut exchange, request);
        }
        info!("engine task stopped");
    });
    (tx, handle)
}

/// Apply one request to the exchange. Responders may be gone (client hung
/// up); the result is simply discarded in that case.
fn dispatch(exchange: &mut Exchange, request: EngineRequest) {
    match request {
        EngineRequest::Register {
            username,
            password,
            respond_to,
        } => {
            let _ = respond_to.send(exchange.register(&username, &password));
        }
        EngineRequest::Login {
            username,
            password,
            respond_to,
        } => {
            let _ = respond_to.send(exchange.login(&username, &password));
        }
        EngineRequest::ChangePassword {
            username,
            old_password,
            new_password,
            respond_to,
        } => {
            let _ = respond_to.send(exchange.change_password(
                &username,
                &old_password,
                &new_password,
            ));
        }
        EngineRequest::SetCollateral {
            admin_token,
            username,
            limit,
            respond_to,
        } => {
            let _ = respond_to.send(exchange.set_collateral(&admin_token, &username, limit));
        }
        EngineRequest::Balance { token, respond_to } => {
            let _ = respond_to.send(exchange.balance(&token));
        }
        EngineRequest::Levels {
            contract,
            respond_to,
        } => {
            let _ = respond_to.send(exchange.levels(contract));
        }
        EngineRequest::SubmitOrder {
            token,
            side,
            price,
            quantity,
            contract,
            respond_to,
        } => {
            let _ = respond_to.send(exchange.submit_order(&token, side, price, quantity, contract));
        }
        EngineRequest::ModifyOrder {
            token,
            order_id,
            price,
            quantity,
            respond_to,
        } => {
            let _ = respond_to.send(exchange.modify_order(&token, order_id, price, quantity));
        }
        EngineRequest::CancelOrder {
            token,
            order_id,
            respond_to,
        } => {
            let _ = respond_to.send(exchange.cancel_order(&token, order_id));
        }
        EngineRequest::MyOrders { token, respond_to } => {
            let _ = respond_to.send(exchange.my_orders(&token));
        }
        EngineRequest::Trades { window, respond_to } => {
            let _ = respond_to.send(exchange.trades(window));
        }
        EngineRequest::MyTrades {
            token,
            window,
            respond_to,
        } => {
            let _ = respond_to.send(exchange.my_trades(&token, window));
        }
        EngineRequest::Bulk {
            contracts,
            respond_to,
        } => {
            let _ = respond_to.send(exchange.bulk(&contracts));
        }
        EngineRequest::LegacyCreate {
            token,
            price,
            quantity,
            contract,
            respond_to,
        } => {
            let _ = respond_to.send(exchange.legacy_create(&token, price, quantity, contract));
        }
        EngineRequest::LegacyList { respond_to } => {
            let _ = respond_to.send(exchange.legacy.all());
        }
        EngineRequest::LegacyTake {
            token,
            order_id,
            respond_to,
        } => {
            let _ = respond_to.send(exchange.legacy_take(&token, order_id));
        }
        EngineRequest::Subscribe { respond_to } => {
            let _ = respond_to.send(exchange.broadcaster.subscribe());
        }
        EngineRequest::Unsubscribe { consumer } => {
            exchange.broadcaster.unsubscribe(consumer);
        }
    }
}
