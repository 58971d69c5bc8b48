use std::sync::Arc;

use crate::error::SignalError;

use super::message::{ClientMessage, ServerMessage};
use super::room::{ConnectionId, Outbound};
use super::server::SignalServer;

/// Per-connection dispatcher. Owns the connection's identity and its
/// outbound channel; the websocket glue feeds it parsed messages and calls
/// [`cleanup`](ConnectionHandler::cleanup) once when the transport ends.
pub struct ConnectionHandler {
    server: Arc<SignalServer>,
    connection_id: ConnectionId,
    sender: Outbound,
}

impl ConnectionHandler {
    pub fn new(server: Arc<SignalServer>, sender: Outbound) -> Self {
        Self {
            server,
            connection_id: ConnectionId::generate(),
            sender,
        }
    }

    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    pub async fn handle_message(&self, message: ClientMessage) {
        match message {
            ClientMessage::CheckPassword { room_id, password } => {
                match self.server.check_password(&room_id, &password).await {
                    Ok(reply) => self.send(reply),
                    Err(err) => self.report(err),
                }
            }
            ClientMessage::JoinRoom { room_id, role } => {
                if let Err(err) = self
                    .server
                    .join(&room_id, &self.connection_id, role, self.sender.clone())
                    .await
                {
                    self.report(err);
                }
            }
            ClientMessage::Offer { room_id, offer } => {
                self.server
                    .relay(&room_id, &self.connection_id, ServerMessage::Offer { offer })
                    .await;
            }
            ClientMessage::Answer { room_id, answer } => {
                self.server
                    .relay(
                        &room_id,
                        &self.connection_id,
                        ServerMessage::Answer { answer },
                    )
                    .await;
            }
            ClientMessage::IceCandidate { room_id, candidate } => {
                self.server
                    .relay(
                        &room_id,
                        &self.connection_id,
                        ServerMessage::IceCandidate { candidate },
                    )
                    .await;
            }
        }
    }

    /// Runs the disconnect reaper. Safe to call more than once.
    pub async fn cleanup(&self) {
        self.server.disconnect(&self.connection_id).await;
    }

    /// Errors go back to the requesting connection only, with store detail
    /// kept out of the wire message.
    fn report(&self, err: SignalError) {
        if let SignalError::Store(source) = &err {
            tracing::error!(
                connection_id = %self.connection_id,
                error = %source,
                "Job store lookup failed"
            );
        }
        self.send(ServerMessage::Error {
            message: err.to_string(),
        });
    }

    fn send(&self, message: ServerMessage) {
        // A closed channel means the connection is already going away; the
        // reaper handles the rest.
        let _ = self.sender.send(message);
    }
}
