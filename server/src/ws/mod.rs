//! WebSocket transport for live metrics.
//!
//! ## Connection lifecycle
//!
//! 1. Client connects to `GET /api/ws` (or `GET /ws`).
//! 2. All messages are JSON objects with a `"type"` field.
//! 3. On disconnect every subscription the connection held is released; the
//!    polling task for a workspace stops once its last subscriber is gone.
//!
//! ## Message types (client → server)
//!
//! | Type          | Fields                                  | Response type(s)      |
//! |---------------|-----------------------------------------|-----------------------|
//! | `ping`        | —                                       | `pong`                |
//! | `subscribe`   | `workspaceId` (alias `workspaceName`)   | `metrics` every tick  |
//! | `unsubscribe` | `workspaceId?`; absent releases all     | (none)                |
//!
//! ## Message types (server → client)
//!
//! | Type      | Key fields                                                  |
//! |-----------|-------------------------------------------------------------|
//! | `pong`    | —                                                           |
//! | `metrics` | `workspaceId`, `workspaceName` (same id), `data` (`{status, metrics}`) |
//!
//! Malformed messages and invalid workspace ids are logged and ignored; they
//! never close the socket.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::subscriptions::ConnectionSubscriptions;
use crate::workspace::WorkspaceId;
use crate::AppState;

/// Depth of the per-connection outbound queue.
const OUTBOUND_QUEUE: usize = 256;

/// A control message from the client.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Ping,
    Subscribe {
        #[serde(rename = "workspaceId", alias = "workspaceName")]
        workspace_id: String,
    },
    Unsubscribe {
        #[serde(default, rename = "workspaceId", alias = "workspaceName")]
        workspace_id: Option<String>,
    },
}

/// `GET /api/ws` — WebSocket upgrade handler.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Main WebSocket event loop.
///
/// Splits the socket into a sink and a stream. Outgoing messages go through an
/// mpsc channel so the per-workspace forwarders can send without holding the
/// socket.
async fn handle_ws(socket: WebSocket, state: AppState) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Value>(OUTBOUND_QUEUE);

    let mut conn = ConnectionSubscriptions::new(state.subscriptions.clone(), tx.clone());
    info!(connection = %conn.id(), "WebSocket client connected");

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(t) => t,
                Err(e) => {
                    error!("WS send: failed to serialize message: {e}");
                    continue;
                }
            };
            if ws_sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = ws_stream.next().await {
        match msg {
            Ok(Message::Text(text)) => handle_text(&text, &mut conn, &tx).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(connection = %conn.id(), "WebSocket receive error: {e}");
                break;
            }
        }
    }

    let id = conn.id();
    let held = conn.workspaces().len();
    conn.close().await;
    send_task.abort();
    info!(connection = %id, subscriptions = held, "WebSocket client disconnected");
}

/// Apply one text frame to the connection's subscription set.
async fn handle_text(text: &str, conn: &mut ConnectionSubscriptions, tx: &mpsc::Sender<Value>) {
    let msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(m) => m,
        Err(e) => {
            warn!(connection = %conn.id(), "ignoring malformed message: {e}");
            return;
        }
    };

    match msg {
        ClientMessage::Ping => {
            let _ = tx.send(json!({ "type": "pong" })).await;
        }
        ClientMessage::Subscribe { workspace_id } => {
            let Ok(id) = WorkspaceId::parse(&workspace_id) else {
                warn!(connection = %conn.id(), workspace = %workspace_id, "subscribe rejected: invalid workspace id");
                return;
            };
            if conn.subscribe(&id).await {
                info!(connection = %conn.id(), workspace = %id, "subscribed to metrics");
            } else {
                debug!(connection = %conn.id(), workspace = %id, "already subscribed");
            }
        }
        ClientMessage::Unsubscribe {
            workspace_id: Some(workspace_id),
        } => {
            let Ok(id) = WorkspaceId::parse(&workspace_id) else {
                warn!(connection = %conn.id(), workspace = %workspace_id, "unsubscribe rejected: invalid workspace id");
                return;
            };
            if conn.unsubscribe(&id).await {
                info!(connection = %conn.id(), workspace = %id, "unsubscribed from metrics");
            }
        }
        ClientMessage::Unsubscribe { workspace_id: None } => {
            let n = conn.unsubscribe_all().await;
            info!(connection = %conn.id(), released = n, "unsubscribed from all metrics");
        }
    }
}
