use thiserror::Error;

/// Errors produced by the signaling core.
///
/// The `Display` strings double as the exact `error { message }` payloads
/// delivered to clients, so changing one is a wire protocol change.
#[derive(Debug, Error)]
pub enum SignalError {
    /// No job record carries the requested room code
    #[error("Job not found")]
    JobNotFound,

    /// Supplied password does not match the job record
    #[error("Password is incorrect")]
    IncorrectPassword,

    /// A candidate tried to open an empty room
    #[error("Please wait for the interviewer to join")]
    MustWaitForInterviewer,

    /// Wrong role for the room's current occupancy
    #[error("Only candidate can join at this time")]
    RoleNotAllowed,

    /// Both seats are taken
    #[error("Room is full")]
    RoomFull,

    /// The connection is already seated in a different room
    #[error("Already in a room")]
    AlreadyInRoom,

    /// External job store failure. Rendered generically on the wire; the
    /// source carries the detail for logs only.
    #[error("Server error")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Convenience type alias for Results using SignalError
pub type Result<T> = std::result::Result<T, SignalError>;

impl SignalError {
    /// Wraps an external store failure
    pub fn store(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        SignalError::Store(err.into())
    }
}
