use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorType {
    InvalidRequestError,
    RateLimitError,
    AuthenticationError,
    ServerError,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Error payload of a realtime `error` event. A payload without `type` is
/// treated as `Unknown`, which ends the call.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServerError {
    #[serde(rename = "type", default)]
    pub error_type: ApiErrorType,
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
    pub param: Option<String>,
    pub event_id: Option<String>,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse or serialize JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Header error: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Realtime API error: {0:?}")]
    Api(ServerError),

    #[error("XAI_API_KEY is not configured")]
    MissingApiKey,

    #[error("No caller joined room {room} within {waited:?}")]
    NoCallerJoined { room: String, waited: Duration },

    #[error("Call job was cancelled")]
    Cancelled,

    #[error("Room transport error: {0}")]
    Room(String),

    #[error("Access token error: {0}")]
    AccessToken(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid client event: {0}")]
    InvalidClientEvent(String),

    #[error("Conversation task failed: {0}")]
    TaskFailed(String),
}

impl From<livekit::RoomError> for Error {
    fn from(err: livekit::RoomError) -> Self {
        Self::Room(err.to_string())
    }
}

impl From<livekit_api::access_token::AccessTokenError> for Error {
    fn from(err: livekit_api::access_token::AccessTokenError) -> Self {
        Self::AccessToken(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
