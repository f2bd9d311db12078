//! Spectator HTTP surface
//!
//! Two WebSocket upgrade routes (binary frames at `/stream`, structured
//! events at `/ws`) plus optional static assets at `/`. Each accepted socket
//! gets a writer task fed from its hub queue and a reader that only waits
//! for the close.

use crate::hub::StreamHub;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;

/// Build the spectator router around a shared hub. CORS is applied by the
/// composition root over the merged surface.
pub fn router(hub: Arc<StreamHub>, static_dir: Option<PathBuf>) -> Router {
    let mut router = Router::new()
        .route("/stream", get(frame_ws))
        .route("/ws", get(event_ws))
        .with_state(hub);

    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
}

async fn frame_ws(State(hub): State<Arc<StreamHub>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, hub, Channel::Frame))
}

async fn event_ws(State(hub): State<Arc<StreamHub>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, hub, Channel::Event))
}

#[derive(Clone, Copy)]
enum Channel {
    Frame,
    Event,
}

async fn handle_socket(socket: WebSocket, hub: Arc<StreamHub>, channel: Channel) {
    let (mut sender, mut receiver) = socket.split();
    let (id, mut rx) = match channel {
        Channel::Frame => hub.register_frame(),
        Channel::Event => hub.register_event(),
    };

    // Writer drains the hub queue; it ends when the hub drops the
    // connection or the client goes away.
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    // Spectators don't speak; just wait for the close (or an error).
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    match channel {
        Channel::Frame => hub.unregister_frame(id),
        Channel::Event => hub.unregister_event(id),
    }
    writer.abort();
}
