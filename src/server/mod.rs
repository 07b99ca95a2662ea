//! HTTP/WebSocket boundary.
//!
//! Handlers decode framed request bodies, forward typed requests to the
//! engine task, and encode framed responses. Error kinds map one-to-one
//! onto wire status codes; protocol-level decode failures become 400 here.

mod handlers;
mod ws;

use axum::Router;
use axum::routing::{get, post, put};
use tokio::net::TcpListener;
use tracing::info;

use crate::engine::EngineHandle;

/// Shared state handed to every handler: the channel into the engine task.
#[derive(Clone)]
pub struct AppState {
    pub(crate) engine: EngineHandle,
}

/// Assemble the full route table.
pub fn router(engine: EngineHandle) -> Router {
    let state = AppState { engine };
    Router::new()
        .route("/health", get(handlers::health))
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/user/password", put(handlers::change_password))
        .route("/collateral/{username}", put(handlers::set_collateral))
        .route("/balance", get(handlers::balance))
        .route(
            "/v2/orders",
            get(handlers::book_levels).post(handlers::submit_order),
        )
        .route(
            "/v2/orders/{order_id}",
            put(handlers::modify_order).delete(handlers::cancel_order),
        )
        .route("/v2/my-orders", get(handlers::my_orders))
        .route("/v2/trades", get(handlers::trades))
        .route("/v2/my-trades", get(handlers::my_trades))
        .route("/v2/bulk-operations", post(handlers::bulk_operations))
        .route("/v2/stream/trades", get(ws::stream_trades))
        .route(
            "/orders",
            get(handlers::legacy_list).post(handlers::legacy_create),
        )
        .route("/orders/{order_id}/take", post(handlers::legacy_take))
        .with_state(state)
}

/// Bind and serve until shutdown is signalled.
pub async fn serve(
    listener: TcpListener,
    engine: EngineHandle,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = router(engine);
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
