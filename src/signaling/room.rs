use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::{mpsc, Mutex, RwLock};

use super::message::{Role, ServerMessage};
use crate::error::SignalError;

/// Opaque, unique, stable identifier for one live connection. Assigned by
/// the server when the websocket is accepted, never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        ConnectionId(format!("{:016x}", rng.gen::<u64>()))
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        ConnectionId(value.to_string())
    }
}

/// Outbound channel to one connection's websocket sender task.
pub type Outbound = mpsc::UnboundedSender<ServerMessage>;

/// One seated connection. Owned by its room; removal on disconnect is the
/// only destructor.
#[derive(Debug, Clone)]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub role: Role,
    pub sender: Outbound,
}

/// A pairing context: at most one interviewer and one candidate, seated in
/// that order. Named slots rather than a positional list, so a mis-ordered
/// pair is unrepresentable.
#[derive(Debug, Default)]
pub struct Room {
    interviewer: Option<Participant>,
    candidate: Option<Participant>,
    /// Tombstone set when the room empties. A handle that turns out to be
    /// closed must be discarded and the registry entry re-created.
    closed: bool,
}

/// Outcome of a successful admission.
#[derive(Debug)]
pub enum Admission {
    /// Seated. `notify` is the already-present peer owed a `user-joined`.
    Joined { notify: Option<Outbound> },
    /// The connection was already seated in this room; nothing changed.
    AlreadySeated,
}

impl Room {
    fn contains(&self, id: &ConnectionId) -> bool {
        self.slot_of(id).is_some()
    }

    fn slot_of(&self, id: &ConnectionId) -> Option<&Participant> {
        [self.interviewer.as_ref(), self.candidate.as_ref()]
            .into_iter()
            .flatten()
            .find(|p| &p.connection_id == id)
    }

    fn is_empty(&self) -> bool {
        self.interviewer.is_none() && self.candidate.is_none()
    }

    /// Occupants in seating order, interviewer first.
    fn participants(&self) -> Vec<Participant> {
        [self.interviewer.as_ref(), self.candidate.as_ref()]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }

    /// Admission state machine: `Empty -> HasInterviewer -> Full`.
    ///
    /// A room holding only a candidate (its interviewer disconnected) admits
    /// a returning interviewer and rejects further candidates.
    fn admit(&mut self, participant: Participant) -> Result<Admission, SignalError> {
        if self.contains(&participant.connection_id) {
            return Ok(Admission::AlreadySeated);
        }

        match (&self.interviewer, &self.candidate) {
            (None, None) => match participant.role {
                Role::Interviewer => {
                    self.interviewer = Some(participant);
                    Ok(Admission::Joined { notify: None })
                }
                Role::Candidate => Err(SignalError::MustWaitForInterviewer),
            },
            (Some(interviewer), None) => match participant.role {
                Role::Candidate => {
                    let notify = interviewer.sender.clone();
                    self.candidate = Some(participant);
                    Ok(Admission::Joined {
                        notify: Some(notify),
                    })
                }
                Role::Interviewer => Err(SignalError::RoleNotAllowed),
            },
            (None, Some(candidate)) => match participant.role {
                Role::Interviewer => {
                    let notify = candidate.sender.clone();
                    self.interviewer = Some(participant);
                    Ok(Admission::Joined {
                        notify: Some(notify),
                    })
                }
                Role::Candidate => Err(SignalError::RoomFull),
            },
            (Some(_), Some(_)) => Err(SignalError::RoomFull),
        }
    }

    fn remove(&mut self, id: &ConnectionId) -> bool {
        if self
            .interviewer
            .as_ref()
            .is_some_and(|p| &p.connection_id == id)
        {
            self.interviewer = None;
            return true;
        }
        if self
            .candidate
            .as_ref()
            .is_some_and(|p| &p.connection_id == id)
        {
            self.candidate = None;
            return true;
        }
        false
    }
}

/// What the reaper found when a connection left.
#[derive(Debug)]
pub struct Departure {
    pub room_id: String,
    pub role: Role,
    /// Peers still seated after the removal. Empty means the room entry was
    /// deleted.
    pub remaining: Vec<Participant>,
}

struct RegistryInner {
    rooms: HashMap<String, Arc<Mutex<Room>>>,
    /// Reverse index: connection id -> room id. Makes the disconnect reaper
    /// O(1) and enforces one room per connection.
    members: HashMap<ConnectionId, String>,
}

/// In-memory source of truth for room membership.
///
/// The outer lock guards only entry bookkeeping and is never held across an
/// await of a room mutex by a task that already holds one; all occupancy
/// transitions run under the per-room mutex, so independent rooms never
/// contend.
pub struct RoomRegistry {
    inner: RwLock<RegistryInner>,
}

impl RoomRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(RegistryInner {
                rooms: HashMap::new(),
                members: HashMap::new(),
            }),
        })
    }

    /// Runs the admission state machine for `room_id`, creating the room on
    /// the first successful admission. Rejections leave no trace: a room is
    /// never observable with zero occupants.
    pub async fn join(
        &self,
        room_id: &str,
        participant: Participant,
    ) -> Result<Admission, SignalError> {
        loop {
            let handle = {
                let mut inner = self.inner.write().await;
                match inner.members.get(&participant.connection_id) {
                    Some(existing) if existing == room_id => {
                        return Ok(Admission::AlreadySeated);
                    }
                    Some(_) => return Err(SignalError::AlreadyInRoom),
                    None => {}
                }
                inner
                    .rooms
                    .entry(room_id.to_string())
                    .or_default()
                    .clone()
            };

            let mut room = handle.lock().await;
            if room.closed {
                // Raced with the reaper deleting this entry; retry on a
                // fresh one.
                drop(room);
                self.evict_if_current(room_id, &handle).await;
                continue;
            }

            let connection_id = participant.connection_id.clone();
            let result = room.admit(participant);

            match &result {
                Ok(Admission::Joined { .. }) => {
                    drop(room);
                    let mut inner = self.inner.write().await;
                    inner.members.insert(connection_id, room_id.to_string());
                }
                Ok(Admission::AlreadySeated) => {}
                Err(_) => {
                    // A rejected first arrival must not leave an empty room
                    // behind.
                    if room.is_empty() {
                        room.closed = true;
                        drop(room);
                        self.evict_if_current(room_id, &handle).await;
                    }
                }
            }

            return result;
        }
    }

    /// Removes a connection from whatever room it occupies, deleting the
    /// room when it empties. `None` when the connection is not seated, which
    /// makes repeated disconnect notifications no-ops.
    pub async fn remove(&self, connection_id: &ConnectionId) -> Option<Departure> {
        let (room_id, handle) = {
            let mut inner = self.inner.write().await;
            let room_id = inner.members.remove(connection_id)?;
            let handle = inner.rooms.get(&room_id)?.clone();
            (room_id, handle)
        };

        let mut room = handle.lock().await;
        let role = room.slot_of(connection_id).map(|p| p.role);
        room.remove(connection_id);
        let remaining = room.participants();

        if room.is_empty() {
            room.closed = true;
            drop(room);
            self.evict_if_current(&room_id, &handle).await;
        } else {
            drop(room);
        }

        Some(Departure {
            room_id,
            role: role.unwrap_or(Role::Interviewer),
            remaining,
        })
    }

    /// Occupants of `room_id`, interviewer first. Closed or absent rooms
    /// report empty.
    pub async fn get(&self, room_id: &str) -> Vec<Participant> {
        let handle = {
            let inner = self.inner.read().await;
            match inner.rooms.get(room_id) {
                Some(handle) => handle.clone(),
                None => return Vec::new(),
            }
        };

        let room = handle.lock().await;
        if room.closed {
            Vec::new()
        } else {
            room.participants()
        }
    }

    /// The room a connection currently occupies, if any.
    pub async fn room_of(&self, connection_id: &ConnectionId) -> Option<String> {
        let inner = self.inner.read().await;
        inner.members.get(connection_id).cloned()
    }

    pub async fn room_exists(&self, room_id: &str) -> bool {
        !self.get(room_id).await.is_empty()
    }

    /// Drops the map entry, but only if it still points at `handle`; a
    /// concurrent join may already have replaced it.
    async fn evict_if_current(&self, room_id: &str, handle: &Arc<Mutex<Room>>) {
        let mut inner = self.inner.write().await;
        if let Some(current) = inner.rooms.get(room_id) {
            if Arc::ptr_eq(current, handle) {
                inner.rooms.remove(room_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn participant(id: &str, role: Role) -> (Participant, UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Participant {
                connection_id: ConnectionId::from(id),
                role,
                sender: tx,
            },
            rx,
        )
    }

    #[tokio::test]
    async fn test_interviewer_opens_room() {
        let registry = RoomRegistry::new();
        let (interviewer, _rx) = participant("a", Role::Interviewer);

        let admission = registry.join("R1", interviewer).await.unwrap();
        assert!(matches!(admission, Admission::Joined { notify: None }));

        let participants = registry.get("R1").await;
        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0].role, Role::Interviewer);
    }

    #[tokio::test]
    async fn test_candidate_cannot_open_room() {
        let registry = RoomRegistry::new();
        let (candidate, _rx) = participant("b", Role::Candidate);

        let err = registry.join("R1", candidate).await.unwrap_err();
        assert!(matches!(err, SignalError::MustWaitForInterviewer));

        // The rejected arrival must not leave an empty room behind
        assert!(!registry.room_exists("R1").await);
    }

    #[tokio::test]
    async fn test_pairing_notifies_interviewer_only() {
        let registry = RoomRegistry::new();
        let (interviewer, mut interviewer_rx) = participant("a", Role::Interviewer);
        let (candidate, mut candidate_rx) = participant("b", Role::Candidate);

        registry.join("R1", interviewer).await.unwrap();
        let admission = registry.join("R1", candidate).await.unwrap();

        let Admission::Joined { notify: Some(peer) } = admission else {
            panic!("expected a peer to notify");
        };
        peer.send(ServerMessage::UserJoined).unwrap();

        assert!(matches!(
            interviewer_rx.try_recv(),
            Ok(ServerMessage::UserJoined)
        ));
        assert!(candidate_rx.try_recv().is_err());

        let participants = registry.get("R1").await;
        assert_eq!(participants.len(), 2);
        assert_eq!(participants[0].role, Role::Interviewer);
        assert_eq!(participants[1].role, Role::Candidate);
    }

    #[tokio::test]
    async fn test_second_interviewer_rejected() {
        let registry = RoomRegistry::new();
        let (first, _rx1) = participant("a", Role::Interviewer);
        let (second, _rx2) = participant("b", Role::Interviewer);

        registry.join("R1", first).await.unwrap();
        let err = registry.join("R1", second).await.unwrap_err();
        assert!(matches!(err, SignalError::RoleNotAllowed));
        assert_eq!(registry.get("R1").await.len(), 1);
    }

    #[tokio::test]
    async fn test_full_room_rejects_any_role() {
        let registry = RoomRegistry::new();
        let (interviewer, _rx1) = participant("a", Role::Interviewer);
        let (candidate, _rx2) = participant("b", Role::Candidate);
        registry.join("R1", interviewer).await.unwrap();
        registry.join("R1", candidate).await.unwrap();

        for role in [Role::Interviewer, Role::Candidate] {
            let (third, _rx) = participant("c", role);
            let err = registry.join("R1", third).await.unwrap_err();
            assert!(matches!(err, SignalError::RoomFull));
        }
        assert_eq!(registry.get("R1").await.len(), 2);
    }

    #[tokio::test]
    async fn test_rejoin_is_idempotent() {
        let registry = RoomRegistry::new();
        let (interviewer, mut rx) = participant("a", Role::Interviewer);
        let (again, _rx2) = participant("a", Role::Interviewer);

        registry.join("R1", interviewer).await.unwrap();
        let admission = registry.join("R1", again).await.unwrap();
        assert!(matches!(admission, Admission::AlreadySeated));
        assert_eq!(registry.get("R1").await.len(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_second_room_while_seated_rejected() {
        let registry = RoomRegistry::new();
        let (interviewer, _rx) = participant("a", Role::Interviewer);
        let (elsewhere, _rx2) = participant("a", Role::Interviewer);

        registry.join("R1", interviewer).await.unwrap();
        let err = registry.join("R2", elsewhere).await.unwrap_err();
        assert!(matches!(err, SignalError::AlreadyInRoom));
        assert!(!registry.room_exists("R2").await);
    }

    #[tokio::test]
    async fn test_remove_keeps_peer_seated() {
        let registry = RoomRegistry::new();
        let (interviewer, _rx1) = participant("a", Role::Interviewer);
        let (candidate, _rx2) = participant("b", Role::Candidate);
        registry.join("R1", interviewer).await.unwrap();
        registry.join("R1", candidate).await.unwrap();

        let departure = registry.remove(&ConnectionId::from("a")).await.unwrap();
        assert_eq!(departure.room_id, "R1");
        assert_eq!(departure.role, Role::Interviewer);
        assert_eq!(departure.remaining.len(), 1);
        assert_eq!(departure.remaining[0].role, Role::Candidate);

        // The lone candidate keeps the room alive
        let participants = registry.get("R1").await;
        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0].role, Role::Candidate);
    }

    #[tokio::test]
    async fn test_last_departure_deletes_room() {
        let registry = RoomRegistry::new();
        let (interviewer, _rx) = participant("a", Role::Interviewer);
        registry.join("R1", interviewer).await.unwrap();

        let departure = registry.remove(&ConnectionId::from("a")).await.unwrap();
        assert!(departure.remaining.is_empty());
        assert!(!registry.room_exists("R1").await);
        assert!(registry.room_of(&ConnectionId::from("a")).await.is_none());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = RoomRegistry::new();
        let (interviewer, _rx) = participant("a", Role::Interviewer);
        registry.join("R1", interviewer).await.unwrap();

        assert!(registry.remove(&ConnectionId::from("a")).await.is_some());
        assert!(registry.remove(&ConnectionId::from("a")).await.is_none());
    }

    #[tokio::test]
    async fn test_remove_unknown_connection_is_noop() {
        let registry = RoomRegistry::new();
        assert!(registry.remove(&ConnectionId::from("ghost")).await.is_none());
    }

    #[tokio::test]
    async fn test_interviewer_can_rejoin_after_leaving() {
        let registry = RoomRegistry::new();
        let (interviewer, _rx1) = participant("a", Role::Interviewer);
        let (candidate, _rx2) = participant("b", Role::Candidate);
        registry.join("R1", interviewer).await.unwrap();
        registry.join("R1", candidate).await.unwrap();
        registry.remove(&ConnectionId::from("a")).await.unwrap();

        // The candidate holds the room; a returning interviewer is seated
        // and the waiting candidate is the one to notify.
        let (returning, _rx3) = participant("c", Role::Interviewer);
        let admission = registry.join("R1", returning).await.unwrap();
        assert!(matches!(admission, Admission::Joined { notify: Some(_) }));

        // A second candidate still cannot take the occupied seat
        let (extra, _rx4) = participant("d", Role::Candidate);
        let err = registry.join("R1", extra).await.unwrap_err();
        assert!(matches!(err, SignalError::RoomFull));
    }

    #[tokio::test]
    async fn test_room_can_be_recreated_after_deletion() {
        let registry = RoomRegistry::new();
        let (first, _rx1) = participant("a", Role::Interviewer);
        registry.join("R1", first).await.unwrap();
        registry.remove(&ConnectionId::from("a")).await.unwrap();

        let (second, _rx2) = participant("b", Role::Interviewer);
        let admission = registry.join("R1", second).await.unwrap();
        assert!(matches!(admission, Admission::Joined { notify: None }));
        assert_eq!(registry.get("R1").await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_admissions_never_over_admit() {
        let registry = RoomRegistry::new();
        let (interviewer, _rx) = participant("a", Role::Interviewer);
        registry.join("R1", interviewer).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let registry = registry.clone();
            let (candidate, _rx) = participant(&format!("c{}", i), Role::Candidate);
            handles.push(tokio::spawn(async move {
                registry.join("R1", candidate).await.is_ok()
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 1);
        assert_eq!(registry.get("R1").await.len(), 2);
    }

    #[tokio::test]
    async fn test_independent_rooms() {
        let registry = RoomRegistry::new();
        let (a, _rx1) = participant("a", Role::Interviewer);
        let (b, _rx2) = participant("b", Role::Interviewer);
        registry.join("R1", a).await.unwrap();
        registry.join("R2", b).await.unwrap();

        registry.remove(&ConnectionId::from("a")).await.unwrap();
        assert!(!registry.room_exists("R1").await);
        assert!(registry.room_exists("R2").await);
    }
}
