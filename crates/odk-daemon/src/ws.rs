//! WebSocket endpoint.
//!
//! Clients never send a protocol of their own: inbound frames are read only
//! to notice disconnection. Outbound frames are the JSON order events pushed
//! through the registry.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::state::AppState;

pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(st): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, st, peer))
}

/// Own one connection for its whole lifetime: registered and waiting on
/// inbound frames until the first receive failure or close, then
/// unregistered.
async fn handle_socket(socket: WebSocket, st: Arc<AppState>, peer: SocketAddr) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let conn_id = Uuid::new_v4();
    st.registry.register(conn_id, peer, tx);
    info!(%conn_id, %peer, "ws client connected");

    // Forward queued broadcast frames to the socket.
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_tx.send(msg).await.is_err() {
                break;
            }
        }
    });

    // Liveness probe only: any payload is read and discarded.
    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    st.registry.unregister(conn_id);
    send_task.abort();
    info!(%conn_id, %peer, "ws client disconnected");
}
