//! Subscriber WebSocket connections.
//!
//! Each connection owns one subscription. Its queue is drained into the
//! socket by this task alone, so a slow viewer only ever delays itself.

use std::net::SocketAddr;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};

use crate::api::routes::ApiState;
use crate::broadcast::{Subscription, SubscriptionManager};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    State(state): State<ApiState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, remote, state.subscriptions))
}

async fn handle_socket(socket: WebSocket, remote: SocketAddr, subs: SubscriptionManager) {
    let Subscription { id, mut frames } = match subs.subscribe() {
        Ok(s) => s,
        Err(e) => {
            error!(remote = %remote, "could not register subscriber: {e}");
            return;
        }
    };
    info!(subscriber_id = id, remote = %remote, "dashboard connected");

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            frame = frames.recv() => {
                let Some(frame) = frame else {
                    // Dropped from the broadcast set elsewhere.
                    break;
                };
                if let Err(e) = sink.send(Message::Text(frame.to_string())).await {
                    debug!(subscriber_id = id, "send failed: {e}");
                    break;
                }
            }

            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(subscriber_id = id, "websocket error: {e}");
                        break;
                    }
                    // Viewers have nothing to say; pings are answered by the socket.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    subs.unsubscribe(id);
    info!(subscriber_id = id, remote = %remote, "dashboard disconnected");
}
