//! WebSocket module for the SCORM runtime channel

mod connection;
mod protocol;

pub use connection::scorm_api_ws;
pub use protocol::ServerMessage;
