//! Live trade stream: unidirectional WebSocket push of matching-engine
//! trades, one framed message per binary frame.

use axum::extract::State;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::oneshot;
use tracing::debug;

use crate::engine::EngineRequest;

use super::AppState;

pub(crate) async fn stream_trades(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| pump(socket, state))
}

/// Forward broadcast frames into the socket until either side goes away.
async fn pump(mut socket: WebSocket, state: AppState) {
    let (tx, rx) = oneshot::channel();
    if state
        .engine
        .send(EngineRequest::Subscribe { respond_to: tx })
        .is_err()
    {
        return;
    }
    let Ok((consumer, mut frames)) = rx.await else {
        return;
    };
    debug!(%consumer, "trade stream opened");

    loop {
        tokio::select! {
            frame = frames.recv() => {
                match frame {
                    Some(frame) => {
                        if socket.send(WsMessage::Binary(frame)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    // The stream is unidirectional; inbound frames are
                    // ignored, a close or error detaches the consumer.
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    debug!(%consumer, "trade stream closed");
    let _ = state.engine.send(EngineRequest::Unsubscribe { consumer });
}
