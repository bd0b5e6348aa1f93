//! Operation streaming endpoint
//!
//! One WebSocket connection drives one operation session. The first client
//! frame names the operation and targets; the server answers with output
//! and status frames and exactly one terminal frame. Closing the socket
//! mid-operation cancels the session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{header, HeaderMap},
    response::IntoResponse,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::errors::ConsoleError;
use crate::models::operation::{OperationPayload, Phase, ServerMessage};
use crate::ops::session::SessionEvent;
use crate::server::state::ServerState;

/// How long the server waits for the hello frame
const HELLO_TIMEOUT: Duration = Duration::from_secs(30);

/// WebSocket upgrade handler for `/ops/stream`
pub async fn stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    // Browsers cannot set headers on WebSocket requests, so the token may
    // also ride in the query string.
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
        .or_else(|| params.get("token").cloned());

    ws.on_upgrade(move |socket| handle_stream(socket, state, token))
}

async fn handle_stream(mut socket: WebSocket, state: Arc<ServerState>, token: Option<String>) {
    let identity = match token {
        Some(token) => match state.authorizer.authorize(&token).await {
            Ok(identity) => identity,
            Err(e) => {
                reject(&mut socket, &e).await;
                return;
            }
        },
        None => {
            reject(
                &mut socket,
                &ConsoleError::Unauthorized("Missing session token".to_string()),
            )
            .await;
            return;
        }
    };

    let payload = match read_hello(&mut socket).await {
        Ok(payload) => payload,
        Err(e) => {
            reject(&mut socket, &e).await;
            return;
        }
    };

    let accepted = match state.gateway.admit(&identity, payload).await {
        Ok(accepted) => accepted,
        Err(e) => {
            reject(&mut socket, &e).await;
            return;
        }
    };

    debug!(
        "Streaming session {} to {}",
        accepted.request().id,
        identity.subject
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = match state.gateway.launch(accepted, tx).await {
        Ok(handle) => handle,
        Err(e) => {
            reject(&mut socket, &e).await;
            return;
        }
    };

    // Track the latest classified phase so stall warnings carry it
    let mut phase = Phase::Starting;
    let mut progress: u8 = 0;

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };

                let (frame, terminal) = match event {
                    SessionEvent::Output { line } => {
                        (ServerMessage::Output { message: line }, false)
                    }
                    SessionEvent::Progress(event) => {
                        phase = event.phase;
                        progress = event.progress;
                        (
                            ServerMessage::Status {
                                message: event.message,
                                phase: event.phase,
                                progress: event.progress,
                            },
                            false,
                        )
                    }
                    SessionEvent::Stalled { idle } => (
                        ServerMessage::Status {
                            message: format!(
                                "No output for {}s; the operation may be network-bound",
                                idle.as_secs()
                            ),
                            phase,
                            progress,
                        },
                        false,
                    ),
                    SessionEvent::Finished(result) => {
                        let frame = if result.success {
                            ServerMessage::Complete {
                                message: result.message,
                                success: true,
                            }
                        } else {
                            ServerMessage::Error {
                                message: result.message,
                                success: false,
                            }
                        };
                        (frame, true)
                    }
                };

                if send_frame(&mut socket, &frame).await.is_err() {
                    // Dropping rx signals the session to cancel
                    break;
                }
                if terminal {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    None | Some(Err(_)) => break,
                    Some(Ok(Message::Close(_))) => break,
                    // Nothing else is expected after the hello
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    drop(rx);
    let _ = socket.send(Message::Close(None)).await;

    // The session finishes (audit + lock release) regardless of the socket
    if let Err(e) = handle.await {
        warn!("Operation session task failed: {}", e);
    }
}

async fn read_hello(socket: &mut WebSocket) -> Result<OperationPayload, ConsoleError> {
    let frame = tokio::time::timeout(HELLO_TIMEOUT, socket.recv())
        .await
        .map_err(|_| ConsoleError::InvalidRequest("Timed out waiting for request".to_string()))?;

    match frame {
        Some(Ok(Message::Text(text))) => serde_json::from_str(text.as_str())
            .map_err(|e| ConsoleError::InvalidRequest(format!("Malformed request: {}", e))),
        _ => Err(ConsoleError::InvalidRequest(
            "Expected a JSON request frame".to_string(),
        )),
    }
}

async fn reject(socket: &mut WebSocket, error: &ConsoleError) {
    let frame = ServerMessage::Error {
        message: error.to_string(),
        success: false,
    };
    let _ = send_frame(socket, &frame).await;
    let _ = socket.send(Message::Close(None)).await;
}

async fn send_frame(socket: &mut WebSocket, frame: &ServerMessage) -> Result<(), axum::Error> {
    let json = serde_json::to_string(frame).unwrap_or_else(|_| "{}".to_string());
    socket.send(Message::Text(json.into())).await
}
