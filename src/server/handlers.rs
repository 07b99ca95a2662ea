//! Endpoint handlers: decode, dispatch to the engine, encode.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use tokio::sync::oneshot;
use tracing::error;
use uuid::Uuid;

use crate::batch::{BatchContract, BatchOp, BatchOutcome};
use crate::codec::{self, CodecError, Field, Message, Value, WireVersion};
use crate::engine::EngineRequest;
use crate::error::ExchangeError;
use crate::ledger::Trade;
use crate::legacy::Listing;
use crate::orderbook::{ContractKey, Order, Side};

use super::AppState;

/// Boundary-level error: a core error kind, a protocol decode failure, or
/// an engine-channel breakdown.
pub(crate) enum ApiError {
    Exchange(ExchangeError),
    Decode(CodecError),
    Internal,
}

impl From<ExchangeError> for ApiError {
    fn from(err: ExchangeError) -> Self {
        ApiError::Exchange(err)
    }
}

impl From<CodecError> for ApiError {
    fn from(err: CodecError) -> Self {
        ApiError::Decode(err)
    }
}

/// Status code for each error kind; part of the wire contract.
fn error_status(err: &ExchangeError) -> StatusCode {
    match err {
        ExchangeError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ExchangeError::Unauthorized => StatusCode::UNAUTHORIZED,
        ExchangeError::InsufficientCollateral => StatusCode::PAYMENT_REQUIRED,
        ExchangeError::Forbidden => StatusCode::FORBIDDEN,
        ExchangeError::NotFound(_) => StatusCode::NOT_FOUND,
        ExchangeError::SelfMatch => StatusCode::PRECONDITION_FAILED,
        // 425 Too Early has no named constant in http.
        ExchangeError::TooEarly => {
            StatusCode::from_u16(425).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
        ExchangeError::TooLate => StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS,
        ExchangeError::Conflict(_) => StatusCode::CONFLICT,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Exchange(err) => {
                let body = Message::new()
                    .with_str("error", err.kind())
                    .with_str("message", err.to_string());
                framed(error_status(&err), &body)
            }
            ApiError::Decode(err) => {
                let body = Message::new()
                    .with_str("error", "invalid_input")
                    .with_str("message", err.to_string());
                framed(StatusCode::BAD_REQUEST, &body)
            }
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

/// Encode a framed v2 response with the wire content type.
fn framed(status: StatusCode, message: &Message) -> Response {
    match message.encode(WireVersion::V2) {
        Ok(bytes) => {
            (status, [(header::CONTENT_TYPE, codec::CONTENT_TYPE)], bytes).into_response()
        }
        Err(err) => {
            error!(%err, "response encoding failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Send a request to the engine and await its oneshot response.
async fn call<T>(
    state: &AppState,
    make: impl FnOnce(oneshot::Sender<T>) -> EngineRequest,
) -> Result<T, ApiError> {
    let (tx, rx) = oneshot::channel();
    state.engine.send(make(tx)).map_err(|_| ApiError::Internal)?;
    rx.await.map_err(|_| ApiError::Internal)
}

fn decode_body(body: &Bytes) -> Result<Message, ApiError> {
    let (_, message) = Message::decode(body)?;
    Ok(message)
}

fn bearer(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
        .ok_or(ApiError::Exchange(ExchangeError::Unauthorized))
}

fn require_str<'a>(message: &'a Message, name: &str) -> Result<&'a str, ApiError> {
    message
        .get_str(name)
        .ok_or_else(|| ExchangeError::invalid(format!("missing string field {name}")).into())
}

fn require_int(message: &Message, name: &str) -> Result<i64, ApiError> {
    message
        .get_int(name)
        .ok_or_else(|| ExchangeError::invalid(format!("missing integer field {name}")).into())
}

fn contract_from(message: &Message) -> Result<ContractKey, ApiError> {
    let delivery_start = require_int(message, "delivery_start")?;
    let delivery_end = require_int(message, "delivery_end")?;
    Ok(ContractKey::new(delivery_start, delivery_end)?)
}

/// Parse the optional `delivery_start`/`delivery_end` query window.
fn window_from_query(params: &HashMap<String, String>) -> Result<Option<ContractKey>, ApiError> {
    let start = params.get("delivery_start");
    let end = params.get("delivery_end");
    match (start, end) {
        (None, None) => Ok(None),
        (Some(start), Some(end)) => {
            let start: i64 = start
                .parse()
                .map_err(|_| ExchangeError::invalid("delivery_start must be an integer"))?;
            let end: i64 = end
                .parse()
                .map_err(|_| ExchangeError::invalid("delivery_end must be an integer"))?;
            Ok(Some(ContractKey::new(start, end)?))
        }
        _ => Err(ExchangeError::invalid("both delivery window endpoints are required").into()),
    }
}

fn order_id_from(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| ApiError::Exchange(ExchangeError::NotFound(format!("order {raw}"))))
}

fn book_order_value(order: &Order) -> Value {
    Value::Object(vec![
        Field::new("order_id", order.order_id.simple().to_string()),
        Field::new("side", order.side.as_str()),
        Field::new("price", order.price),
        Field::new("quantity", order.remaining_quantity),
        Field::new("delivery_start", order.contract.delivery_start),
        Field::new("delivery_end", order.contract.delivery_end),
        Field::new("timestamp", order.priority_timestamp),
    ])
}

fn own_order_value(order: &Order) -> Value {
    Value::Object(vec![
        Field::new("order_id", order.order_id.simple().to_string()),
        Field::new("side", order.side.as_str()),
        Field::new("price", order.price),
        Field::new("quantity", order.remaining_quantity),
        Field::new("original_quantity", order.original_quantity),
        Field::new("delivery_start", order.contract.delivery_start),
        Field::new("delivery_end", order.contract.delivery_end),
        Field::new("status", order.status.as_str()),
        Field::new("timestamp", order.priority_timestamp),
    ])
}

fn trade_value(trade: &Trade) -> Value {
    Value::Object(vec![
        Field::new("trade_id", trade.trade_id.simple().to_string()),
        Field::new("buyer", trade.buyer.clone()),
        Field::new("seller", trade.seller.clone()),
        Field::new("price", trade.price),
        Field::new("quantity", trade.quantity),
        Field::new("delivery_start", trade.contract.delivery_start),
        Field::new("delivery_end", trade.contract.delivery_end),
        Field::new("timestamp", trade.timestamp),
    ])
}

fn listing_value(listing: &Listing) -> Value {
    Value::Object(vec![
        Field::new("order_id", listing.order_id.simple().to_string()),
        Field::new("owner", listing.owner.clone()),
        Field::new("price", listing.price),
        Field::new("quantity", listing.quantity),
        Field::new("delivery_start", listing.contract.delivery_start),
        Field::new("delivery_end", listing.contract.delivery_end),
        Field::new("timestamp", listing.timestamp),
    ])
}

fn submission_response(submission: crate::orderbook::Submission) -> Response {
    framed(
        StatusCode::OK,
        &Message::new()
            .with_str("order_id", submission.order_id.simple().to_string())
            .with_str("status", submission.status.as_str())
            .with_int("filled_quantity", submission.filled_quantity),
    )
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub(crate) async fn health() -> &'static str {
    "OK"
}

pub(crate) async fn register(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let message = decode_body(&body)?;
    let username = require_str(&message, "username")?.to_string();
    let password = require_str(&message, "password")?.to_string();
    call(&state, |respond_to| EngineRequest::Register {
        username,
        password,
        respond_to,
    })
    .await??;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn login(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let message = decode_body(&body)?;
    let username = require_str(&message, "username")?.to_string();
    let password = require_str(&message, "password")?.to_string();
    let token = call(&state, |respond_to| EngineRequest::Login {
        username,
        password,
        respond_to,
    })
    .await??;
    Ok(framed(
        StatusCode::OK,
        &Message::new().with_str("token", token),
    ))
}

pub(crate) async fn change_password(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let message = decode_body(&body)?;
    let username = require_str(&message, "username")?.to_string();
    let old_password = require_str(&message, "old_password")?.to_string();
    let new_password = require_str(&message, "new_password")?.to_string();
    call(&state, |respond_to| EngineRequest::ChangePassword {
        username,
        old_password,
        new_password,
        respond_to,
    })
    .await??;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn set_collateral(
    State(state): State<AppState>,
    Path(username): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let admin_token = bearer(&headers)?;
    let message = decode_body(&body)?;
    let limit = require_int(&message, "collateral")?;
    call(&state, |respond_to| EngineRequest::SetCollateral {
        admin_token,
        username,
        limit,
        respond_to,
    })
    .await??;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn balance(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let token = bearer(&headers)?;
    let view = call(&state, |respond_to| EngineRequest::Balance {
        token,
        respond_to,
    })
    .await??;
    Ok(framed(
        StatusCode::OK,
        &Message::new()
            .with_int("balance", view.balance)
            .with_int("potential_balance", view.potential_balance)
            .with_int("collateral", view.collateral),
    ))
}

pub(crate) async fn book_levels(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let contract = window_from_query(&params)?
        .ok_or_else(|| ExchangeError::invalid("delivery window required"))?;
    let (bids, asks) = call(&state, |respond_to| EngineRequest::Levels {
        contract,
        respond_to,
    })
    .await?;
    Ok(framed(
        StatusCode::OK,
        &Message::new()
            .with_list("bids", bids.iter().map(book_order_value).collect())
            .with_list("asks", asks.iter().map(book_order_value).collect()),
    ))
}

pub(crate) async fn submit_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let token = bearer(&headers)?;
    let message = decode_body(&body)?;
    let side = Side::parse(require_str(&message, "side")?)?;
    let price = require_int(&message, "price")?;
    let quantity = require_int(&message, "quantity")?;
    let contract = contract_from(&message)?;
    let submission = call(&state, |respond_to| EngineRequest::SubmitOrder {
        token,
        side,
        price,
        quantity,
        contract,
        respond_to,
    })
    .await??;
    Ok(submission_response(submission))
}

pub(crate) async fn modify_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let token = bearer(&headers)?;
    let order_id = order_id_from(&order_id)?;
    let message = decode_body(&body)?;
    let price = require_int(&message, "price")?;
    let quantity = require_int(&message, "quantity")?;
    let submission = call(&state, |respond_to| EngineRequest::ModifyOrder {
        token,
        order_id,
        price,
        quantity,
        respond_to,
    })
    .await??;
    Ok(submission_response(submission))
}

pub(crate) async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let token = bearer(&headers)?;
    let order_id = order_id_from(&order_id)?;
    call(&state, |respond_to| EngineRequest::CancelOrder {
        token,
        order_id,
        respond_to,
    })
    .await??;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn my_orders(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let token = bearer(&headers)?;
    let orders = call(&state, |respond_to| EngineRequest::MyOrders {
        token,
        respond_to,
    })
    .await??;
    Ok(framed(
        StatusCode::OK,
        &Message::new().with_list("orders", orders.iter().map(own_order_value).collect()),
    ))
}

pub(crate) async fn trades(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let window = window_from_query(&params)?;
    let trades = call(&state, |respond_to| EngineRequest::Trades {
        window,
        respond_to,
    })
    .await?;
    Ok(framed(
        StatusCode::OK,
        &Message::new().with_list("trades", trades.iter().map(trade_value).collect()),
    ))
}

pub(crate) async fn my_trades(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let token = bearer(&headers)?;
    let window = window_from_query(&params)?;
    let trades = call(&state, |respond_to| EngineRequest::MyTrades {
        token,
        window,
        respond_to,
    })
    .await??;
    Ok(framed(
        StatusCode::OK,
        &Message::new().with_list("trades", trades.iter().map(trade_value).collect()),
    ))
}

pub(crate) async fn bulk_operations(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let message = decode_body(&body)?;
    let contracts = parse_batch(&message)?;
    let outcomes = call(&state, |respond_to| EngineRequest::Bulk {
        contracts,
        respond_to,
    })
    .await??;
    let results = outcomes.iter().map(outcome_value).collect();
    Ok(framed(
        StatusCode::OK,
        &Message::new().with_list("results", results),
    ))
}

pub(crate) async fn legacy_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let token = bearer(&headers)?;
    let message = decode_body(&body)?;
    let price = require_int(&message, "price")?;
    let quantity = require_int(&message, "quantity")?;
    let contract = contract_from(&message)?;
    let order_id = call(&state, |respond_to| EngineRequest::LegacyCreate {
        token,
        price,
        quantity,
        contract,
        respond_to,
    })
    .await??;
    Ok(framed(
        StatusCode::OK,
        &Message::new().with_str("order_id", order_id.simple().to_string()),
    ))
}

pub(crate) async fn legacy_list(State(state): State<AppState>) -> Result<Response, ApiError> {
    let listings = call(&state, |respond_to| EngineRequest::LegacyList { respond_to }).await?;
    Ok(framed(
        StatusCode::OK,
        &Message::new().with_list("orders", listings.iter().map(listing_value).collect()),
    ))
}

pub(crate) async fn legacy_take(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let token = bearer(&headers)?;
    let order_id = order_id_from(&order_id)?;
    let trade = call(&state, |respond_to| EngineRequest::LegacyTake {
        token,
        order_id,
        respond_to,
    })
    .await??;
    Ok(framed(
        StatusCode::OK,
        &Message::new().with_str("trade_id", trade.trade_id.simple().to_string()),
    ))
}

// ---------------------------------------------------------------------------
// Batch parsing
// ---------------------------------------------------------------------------

fn parse_batch(message: &Message) -> Result<Vec<BatchContract>, ApiError> {
    let groups = message
        .get_list("contracts")
        .ok_or_else(|| ExchangeError::invalid("missing contracts list"))?;
    groups.iter().map(parse_batch_contract).collect()
}

fn parse_batch_contract(value: &Value) -> Result<BatchContract, ApiError> {
    let fields = value
        .as_object()
        .ok_or_else(|| ExchangeError::invalid("contract entries must be objects"))?;
    let group = Message::from_fields(fields.to_vec());
    let operations = group
        .get_list("operations")
        .ok_or_else(|| ExchangeError::invalid("missing operations list"))?;
    Ok(BatchContract {
        delivery_start: require_int(&group, "delivery_start")?,
        delivery_end: require_int(&group, "delivery_end")?,
        operations: operations
            .iter()
            .map(parse_batch_op)
            .collect::<Result<_, _>>()?,
    })
}

fn parse_batch_op(value: &Value) -> Result<BatchOp, ApiError> {
    let fields = value
        .as_object()
        .ok_or_else(|| ExchangeError::invalid("operations must be objects"))?;
    let op = Message::from_fields(fields.to_vec());
    let token = require_str(&op, "token")?.to_string();
    match require_str(&op, "type")? {
        "create" => Ok(BatchOp::Create {
            token,
            side: Side::parse(require_str(&op, "side")?)?,
            price: require_int(&op, "price")?,
            quantity: require_int(&op, "quantity")?,
        }),
        "modify" => Ok(BatchOp::Modify {
            token,
            order_id: order_id_from(require_str(&op, "order_id")?)?,
            price: require_int(&op, "price")?,
            quantity: require_int(&op, "quantity")?,
        }),
        "cancel" => Ok(BatchOp::Cancel {
            token,
            order_id: order_id_from(require_str(&op, "order_id")?)?,
        }),
        other => Err(ExchangeError::invalid(format!("unknown operation type {other:?}")).into()),
    }
}

fn outcome_value(outcome: &BatchOutcome) -> Value {
    match outcome {
        BatchOutcome::Created { order_id, status } => Value::Object(vec![
            Field::new("type", "create"),
            Field::new("order_id", order_id.simple().to_string()),
            Field::new("status", status.as_str()),
        ]),
        BatchOutcome::Modified { order_id } => Value::Object(vec![
            Field::new("type", "modify"),
            Field::new("order_id", order_id.simple().to_string()),
        ]),
        BatchOutcome::Cancelled => Value::Object(vec![Field::new("type", "cancel")]),
    }
}
