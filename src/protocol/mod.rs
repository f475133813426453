//! Wire types of the realtime speech-to-speech WebSocket API.

pub mod client_events;
pub mod models;
pub mod server_events;
