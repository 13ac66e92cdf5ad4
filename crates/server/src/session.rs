//! Streamed MCP transport: one WebSocket per session carrying JSON-RPC text frames.
//!
//! The first frame is the catalog notification. Tool calls run concurrently
//! in a per-session [`JoinSet`] and each response carries its request id.
//! When the socket goes away the set is dropped, aborting whatever is still
//! in flight for this session only.

use crate::config::AppState;
use crate::middleware::auth::identity_hint;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::Response,
};
use futures::{Sink, SinkExt, StreamExt};
use puzzlecats_mcp::protocol::{JsonRpcError, JsonRpcResponse};
use puzzlecats_mcp::tools::ToolContext;
use puzzlecats_mcp::{McpSession, Routed};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::Instrument;

/// Upgrade an authenticated request into an MCP session
pub async fn mcp_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let ctx = ToolContext::new(identity_hint(&headers))
        .with_session_id(uuid::Uuid::new_v4().to_string());

    ws.on_upgrade(move |socket| {
        let span = tracing::info_span!(
            "session",
            session_id = ctx.session_id.as_deref().unwrap_or_default(),
            identity = %ctx.identity
        );
        run_session(socket, state, ctx).instrument(span)
    })
}

async fn run_session(socket: WebSocket, state: Arc<AppState>, ctx: ToolContext) {
    let session = state.mcp.open_session(ctx);
    tracing::info!(tools = session.catalog().len(), "MCP session opened");

    let (mut sink, mut stream) = socket.split();

    if let Err(e) = send_json(&mut sink, &session.catalog_notification()).await {
        tracing::debug!(error = %e, "Failed to send catalog");
        return;
    }

    let mut calls: JoinSet<JsonRpcResponse> = JoinSet::new();

    loop {
        tokio::select! {
            frame = stream.next() => {
                let outbound = match frame {
                    Some(Ok(Message::Text(text))) => handle_frame(&session, text.as_str(), &mut calls),
                    Some(Ok(Message::Binary(_))) => {
                        Some(JsonRpcResponse::error(serde_json::Value::Null, JsonRpcError::parse_error()))
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if sink.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                        None
                    }
                    Some(Ok(Message::Pong(_))) => None,
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!("Client closed the connection");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "WebSocket read failed");
                        break;
                    }
                };

                if let Some(response) = outbound {
                    if let Err(e) = send_json(&mut sink, &response).await {
                        tracing::debug!(error = %e, "WebSocket write failed");
                        break;
                    }
                }
            }

            Some(joined) = calls.join_next(), if !calls.is_empty() => {
                let response = match joined {
                    Ok(response) => response,
                    Err(e) => {
                        tracing::warn!(error = %e, "Tool call task ended without a result");
                        continue;
                    }
                };
                if let Err(e) = send_json(&mut sink, &response).await {
                    tracing::debug!(error = %e, "WebSocket write failed");
                    break;
                }
            }
        }
    }

    let abandoned = calls.len();
    calls.abort_all();
    tracing::info!(abandoned, "MCP session closed");
}

/// Handle one text frame. Tool calls are spawned; everything else is answered inline.
fn handle_frame(
    session: &McpSession,
    text: &str,
    calls: &mut JoinSet<JsonRpcResponse>,
) -> Option<JsonRpcResponse> {
    let request = match McpSession::parse_frame(text) {
        Ok(request) => request,
        Err(response) => {
            tracing::debug!("Malformed JSON-RPC frame");
            return Some(response);
        }
    };

    match session.route(request) {
        Routed::Respond(response) => Some(response),
        Routed::Call { id, params } => {
            let session = session.clone();
            calls.spawn(async move { session.call(id, params).await }.in_current_span());
            None
        }
        Routed::Ignore => None,
    }
}

async fn send_json<S, T>(sink: &mut S, message: &T) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
    T: Serialize,
{
    let text = serde_json::to_string(message).map_err(axum::Error::new)?;
    sink.send(Message::Text(text.into())).await
}
