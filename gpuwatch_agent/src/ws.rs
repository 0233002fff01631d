//! WebSocket upgrade and per-connection handler. Pushes every published snapshot.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::Ordering;
use tracing::debug;

use crate::state::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    // Bump client count on connect and wake the sampler.
    state.client_count.fetch_add(1, Ordering::Relaxed);
    state.wake_sampler.notify_one();

    // Ensure we decrement on disconnect (drop).
    struct ClientGuard(AppState);
    impl Drop for ClientGuard {
        fn drop(&mut self) {
            self.0.client_count.fetch_sub(1, Ordering::Relaxed);
        }
    }
    let _guard = ClientGuard(state.clone());

    // Only snapshots produced after this point are pushed
    let mut rx = state.snapshots.subscribe();
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let js = rx.borrow_and_update().clone();
                if let Some(js) = js {
                    if sink.send(Message::Text(js.to_string())).await.is_err() {
                        break;
                    }
                }
            }
            msg = stream.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // the stream is push-only; anything the client sends is ignored
                Some(Ok(_)) => {}
            }
        }
    }
    debug!("client disconnected");
}
