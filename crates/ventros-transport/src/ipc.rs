//! IPC WebSocket: JSON-RPC 2.0 requests from the display surface, and
//! service notifications pushed back to it.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use serde_json::json;
use tracing::{debug, error, info, warn};
use ventros_protocol::{IpcError, IpcErrorCode, Notifications, RequestId, RpcNotification, RpcRequest, RpcResponse};

use crate::server::{AppState, RequestHandler, RouteResolver};

pub(crate) async fn ipc_upgrade_handler<R: RouteResolver, H: RequestHandler>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState<R, H>>>,
) -> impl IntoResponse {
    if let Some(max) = state.config.max_connections {
        let current = state.client_count.load(Ordering::Relaxed);
        if current >= max {
            warn!("IPC connection rejected: max connections reached ({max})");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    }

    ws.on_upgrade(move |socket| handle_ipc_connection(socket, state))
        .into_response()
}

async fn handle_ipc_connection<R: RouteResolver, H: RequestHandler>(
    socket: WebSocket,
    state: Arc<AppState<R, H>>,
) {
    state.client_count.fetch_add(1, Ordering::Relaxed);

    let client_id = uuid::Uuid::new_v4().to_string();
    info!("IPC client connected: {client_id}");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut notification_rx = state.notification_tx.subscribe();

    send_welcome(&mut ws_tx, &client_id).await;

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response = handle_message(&text, state.handler.as_ref()).await;
                        if let Err(e) = ws_tx.send(Message::Text(response.into())).await {
                            error!("Failed to send response to {client_id}: {e}");
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("IPC client closed: {client_id}");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error for {client_id}: {e}");
                        break;
                    }
                    _ => {}
                }
            }

            notification = notification_rx.recv() => {
                match notification {
                    Ok(msg) => {
                        if let Err(e) = ws_tx.send(Message::Text(msg.into())).await {
                            error!("Failed to notify {client_id}: {e}");
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("IPC client {client_id} missed {skipped} notification(s)");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    state.client_count.fetch_sub(1, Ordering::Relaxed);
    info!(
        "IPC client disconnected: {client_id} (total: {})",
        state.client_count.load(Ordering::Relaxed)
    );
}

async fn send_welcome(ws_tx: &mut SplitSink<WebSocket, Message>, client_id: &str) {
    let welcome = RpcNotification::new(
        Notifications::SERVER_CONNECTED,
        Some(json!({
            "clientId": client_id,
            "serverVersion": env!("CARGO_PKG_VERSION"),
        })),
    );
    if let Ok(text) = serde_json::to_string(&welcome) {
        let _ = ws_tx.send(Message::Text(text.into())).await;
    }
}

/// Parse one JSON-RPC request, dispatch it, and serialize the response.
pub async fn handle_message<H: RequestHandler>(text: &str, handler: &H) -> String {
    let parsed: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => {
            return to_text(&RpcResponse::error(None, IpcError::parse_error("Failed to parse JSON")));
        }
    };

    // Echo the id back even when the envelope itself is unusable.
    let id: Option<RequestId> = parsed.get("id").cloned().and_then(|v| serde_json::from_value(v).ok());

    let request = match serde_json::from_value::<RpcRequest>(parsed) {
        Ok(request) if request.is_valid() => request,
        _ => {
            return to_text(&RpcResponse::error(id, IpcError::invalid_request("Invalid JSON-RPC 2.0 request")));
        }
    };

    match handler.handle_request(&request.method, request.params).await {
        Ok(result) => to_text(&RpcResponse::success(request.id, result)),
        Err(err) => to_text(&RpcResponse::error(Some(request.id), err)),
    }
}

fn to_text(response: &RpcResponse) -> String {
    serde_json::to_string(response).unwrap_or_else(|e| {
        format!(
            r#"{{"jsonrpc":"2.0","id":null,"error":{{"code":{},"message":"{e}"}}}}"#,
            IpcErrorCode::InternalError.code()
        )
    })
}
