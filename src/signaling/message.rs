use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role a connection requests at admission. Fixed for the lifetime of its
/// room membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Interviewer,
    Candidate,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Interviewer => write!(f, "interviewer"),
            Role::Candidate => write!(f, "candidate"),
        }
    }
}

/// Messages received from clients over the websocket.
///
/// Negotiation payloads (`offer`, `answer`, `candidate`) are opaque JSON;
/// the server relays them without interpretation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    CheckPassword { room_id: String, password: String },

    JoinRoom { room_id: String, role: Role },

    Offer { room_id: String, offer: Value },

    Answer { room_id: String, answer: Value },

    IceCandidate { room_id: String, candidate: Value },
}

/// Messages delivered to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    PasswordIsCorrect { room_id: String },

    Error { message: String },

    /// Sent to the waiting interviewer when the candidate is seated
    UserJoined,

    Offer { offer: Value },

    Answer { answer: Value },

    IceCandidate { candidate: Value },
}
