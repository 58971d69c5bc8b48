use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use warp::ws::{Message, WebSocket};

use crate::signaling::{ClientMessage, ConnectionHandler, ServerMessage, SignalServer};

pub async fn handle_signal_websocket(websocket: WebSocket, server: Arc<SignalServer>) {
    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let handler = ConnectionHandler::new(server, tx);
    tracing::info!(
        connection_id = %handler.connection_id(),
        "Signaling connection established"
    );

    // Drain the outbound channel into the socket
    let sender_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize outbound message");
                    continue;
                }
            };
            if let Err(e) = ws_sender.send(Message::text(text)).await {
                tracing::debug!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(message) => handle_frame(&handler, message).await,
            Err(e) => {
                tracing::debug!(
                    connection_id = %handler.connection_id(),
                    error = %e,
                    "WebSocket error"
                );
                break;
            }
        }
    }

    // Transport is gone either way; reap exactly once per connection
    handler.cleanup().await;
    sender_task.abort();
    tracing::info!(
        connection_id = %handler.connection_id(),
        "Signaling connection closed"
    );
}

async fn handle_frame(handler: &ConnectionHandler, message: Message) {
    if let Ok(text) = message.to_str() {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(client_message) => handler.handle_message(client_message).await,
            Err(e) => {
                // Malformed frames are dropped, never fatal to the connection
                tracing::warn!(
                    connection_id = %handler.connection_id(),
                    error = %e,
                    raw_message = %text,
                    "Failed to parse signaling message"
                );
            }
        }
    }
}
