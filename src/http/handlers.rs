use super::state::AppState;
use crate::session::{ClientFrame, RelaySession, ServerMessage};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct CloseResponse {
    pub session_id: String,
    pub status: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /ws/transcribe
/// Upgrade to a WebSocket and run a real-time transcription relay session
pub async fn ws_transcribe(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Bridge one WebSocket to a relay session.
///
/// The socket is split into reader/writer tasks talking to the session over
/// in-memory channels; the session itself never sees the wire format.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let session_id = format!("session-{}", uuid::Uuid::new_v4());
    info!("WebSocket connection accepted: {}", session_id);

    let (inbound_tx, inbound_rx) = mpsc::channel::<ClientFrame>(32);
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerMessage>(64);
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer: session messages out as JSON text frames. Closes the socket
    // once the session drops its sender.
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to serialize server message: {}", e);
                    continue;
                }
            };
            if ws_tx.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    // Reader: client frames in. Dropping the sender tells the session the
    // transport disconnected.
    let reader = tokio::spawn(async move {
        while let Some(Ok(message)) = ws_rx.next().await {
            let frame = match message {
                Message::Binary(bytes) => ClientFrame::Audio(bytes),
                Message::Text(text) => ClientFrame::Text(text),
                Message::Close(_) => break,
                _ => continue,
            };
            if inbound_tx.send(frame).await.is_err() {
                break;
            }
        }
    });

    let session = RelaySession::new(
        session_id.clone(),
        state.relay.clone(),
        state.stt,
        state.analysis,
        state.registry,
    );
    session.run(inbound_rx, outbound_tx, state.stt_options).await;

    // Session done: writer drains remaining messages and closes the socket.
    let _ = writer.await;
    reader.abort();
    debug!("WebSocket connection finished: {}", session_id);
}

/// GET /sessions
/// List all active relay sessions
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.registry.list().await;
    (StatusCode::OK, Json(sessions)).into_response()
}

/// GET /sessions/:session_id
/// Diagnostic snapshot of one session
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.registry.get(&session_id).await {
        Some(info) => (StatusCode::OK, Json(info)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Session {} not found", session_id),
            }),
        )
            .into_response(),
    }
}

/// POST /sessions/:session_id/close
/// Request forced cleanup of a session
pub async fn close_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    if state.registry.request_close(&session_id).await {
        (
            StatusCode::ACCEPTED,
            Json(CloseResponse {
                session_id,
                status: "closing".to_string(),
            }),
        )
            .into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Session {} not found", session_id),
            }),
        )
            .into_response()
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
