use std::sync::Arc;

use crate::error::{Result, SignalError};
use crate::jobs::JobStore;

use super::message::{Role, ServerMessage};
use super::room::{Admission, ConnectionId, Outbound, Participant, RoomRegistry};

/// How a relayed payload fared. Delivery is best-effort and unacknowledged;
/// the variants exist so the no-peer case is an observable branch rather
/// than an implicit no-op.
#[derive(Debug, PartialEq, Eq)]
pub enum RelayOutcome {
    Delivered,
    /// Room exists but holds nobody besides the sender
    NoPeer,
    /// No such room
    NoRoom,
}

/// Pairing and signaling coordinator. Owns the room registry; reaches the
/// external job store only through the injected [`JobStore`].
pub struct SignalServer {
    registry: Arc<RoomRegistry>,
    jobs: Arc<dyn JobStore>,
}

impl SignalServer {
    pub fn new(jobs: Arc<dyn JobStore>) -> Arc<Self> {
        Arc::new(Self {
            registry: RoomRegistry::new(),
            jobs,
        })
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Password gate. Advisory only: admission never consults it and it
    /// never touches the registry.
    pub async fn check_password(&self, room_id: &str, password: &str) -> Result<ServerMessage> {
        let job = self
            .jobs
            .find_by_room_code(room_id)
            .await
            .map_err(SignalError::store)?
            .ok_or(SignalError::JobNotFound)?;

        if job.password != password {
            return Err(SignalError::IncorrectPassword);
        }

        tracing::debug!(room_id = %room_id, "Password accepted");
        Ok(ServerMessage::PasswordIsCorrect {
            room_id: room_id.to_string(),
        })
    }

    /// Seats a connection in a room, notifying the waiting peer when the
    /// pair completes.
    pub async fn join(
        &self,
        room_id: &str,
        connection_id: &ConnectionId,
        role: Role,
        sender: Outbound,
    ) -> Result<()> {
        let participant = Participant {
            connection_id: connection_id.clone(),
            role,
            sender,
        };

        match self.registry.join(room_id, participant).await? {
            Admission::Joined { notify } => {
                tracing::info!(
                    connection_id = %connection_id,
                    room_id = %room_id,
                    role = %role,
                    "Participant joined room"
                );
                if let Some(peer) = notify {
                    if peer.send(ServerMessage::UserJoined).is_err() {
                        tracing::debug!(
                            room_id = %room_id,
                            "Peer hung up before user-joined delivery"
                        );
                    }
                }
            }
            Admission::AlreadySeated => {
                tracing::debug!(
                    connection_id = %connection_id,
                    room_id = %room_id,
                    "Duplicate join ignored"
                );
            }
        }

        Ok(())
    }

    /// Forwards a negotiation payload to every participant of `room_id`
    /// other than the sender. No buffering, no retry: without a peer the
    /// payload is dropped.
    pub async fn relay(
        &self,
        room_id: &str,
        from: &ConnectionId,
        message: ServerMessage,
    ) -> RelayOutcome {
        let participants = self.registry.get(room_id).await;
        if participants.is_empty() {
            tracing::debug!(
                room_id = %room_id,
                connection_id = %from,
                "Dropping payload for unknown room"
            );
            return RelayOutcome::NoRoom;
        }

        let mut delivered = false;
        for participant in participants {
            if &participant.connection_id == from {
                continue;
            }
            if participant.sender.send(message.clone()).is_ok() {
                delivered = true;
            }
        }

        if delivered {
            RelayOutcome::Delivered
        } else {
            tracing::debug!(
                room_id = %room_id,
                connection_id = %from,
                "No peer present, payload dropped"
            );
            RelayOutcome::NoPeer
        }
    }

    /// Disconnect reaper. Removes the connection from its room (if any) and
    /// deletes the room once empty. Idempotent per connection id and never
    /// caller-visible.
    pub async fn disconnect(&self, connection_id: &ConnectionId) {
        match self.registry.remove(connection_id).await {
            Some(departure) => {
                if departure.remaining.is_empty() {
                    tracing::info!(
                        connection_id = %connection_id,
                        room_id = %departure.room_id,
                        "Last participant left, room deleted"
                    );
                } else {
                    tracing::info!(
                        connection_id = %connection_id,
                        room_id = %departure.room_id,
                        role = %departure.role,
                        "Participant left room"
                    );
                }
            }
            None => {
                tracing::debug!(
                    connection_id = %connection_id,
                    "Disconnect for connection not seated in any room"
                );
            }
        }
    }
}
