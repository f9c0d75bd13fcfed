//! WebSocket connection handling

use std::sync::Arc;

use axum::Extension;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use scorm_core::{AttemptId, Batch, IngestConnection, Principal};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::protocol::ServerMessage;
use crate::AppState;

type Sender = SplitSink<WebSocket, Message>;

/// WebSocket upgrade handler for `/websocket/attempt/:attempt_id/scorm_api`
pub async fn scorm_api_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(attempt_id): Path<i64>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, principal, AttemptId(attempt_id)))
}

/// Handle a WebSocket connection
async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    principal: Principal,
    attempt: AttemptId,
) {
    let (mut sender, mut receiver) = socket.split();
    let mut completions = state.completions.subscribe();
    let connection = state.ingest.connect(principal, attempt);
    state.connection_opened();

    info!(%attempt, connection = %connection.id(), "SCORM client connected");

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let Some(msg) = msg else { break };
                match msg {
                    Ok(Message::Text(text)) => {
                        if handle_text_message(&text, &connection, &mut sender).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("WebSocket client sent close frame");
                        break;
                    }
                    Ok(Message::Ping(data)) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {
                        // Ignore binary and pong messages
                    }
                    Err(e) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                }
            }
            completed = completions.recv() => {
                match completed {
                    Ok(id) if id == attempt => {
                        if send(&mut sender, &ServerMessage::completed()).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Completion notices lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    state.connection_closed();
    info!(%attempt, connection = %connection.id(), "SCORM client disconnected");
}

/// Apply one client frame and acknowledge every batch it settled
async fn handle_text_message(
    text: &str,
    connection: &IngestConnection,
    sender: &mut Sender,
) -> Result<(), axum::Error> {
    let batch: Batch = match serde_json::from_str(text) {
        Ok(batch) => batch,
        Err(e) => {
            debug!("Unparsable frame: {}", e);
            return send(
                sender,
                &ServerMessage::Error {
                    error: format!("invalid batch: {e}"),
                    batch: None,
                },
            )
            .await;
        }
    };

    let report = connection.submit(batch).await;
    for outcome in report.outcomes {
        send(sender, &ServerMessage::from(outcome)).await?;
    }
    Ok(())
}

async fn send(sender: &mut Sender, message: &ServerMessage) -> Result<(), axum::Error> {
    match serde_json::to_string(message) {
        Ok(json) => sender.send(Message::Text(json.into())).await,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            Ok(())
        }
    }
}
