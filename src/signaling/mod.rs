pub mod handler;
pub mod message;
mod room;
mod server;

pub use handler::ConnectionHandler;
pub use message::{ClientMessage, Role, ServerMessage};
pub use room::{ConnectionId, Outbound, Participant, RoomRegistry};
pub use server::{RelayOutcome, SignalServer};
