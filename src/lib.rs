#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! Phone agent for LuxApts.
//!
//! Each inbound SIP call lands in a LiveKit room. The worker joins the room,
//! waits for the caller and bridges the call audio to the xAI realtime
//! speech-to-speech API, which answers as "Aria" using [`SYSTEM_PROMPT`].

pub mod agent;
pub mod client;
pub mod config;
pub mod context;
pub mod database;
pub mod entrypoint;
pub mod error;
pub mod logging;
pub mod model;
pub mod prompt;
pub mod protocol;
pub mod room;
pub mod transport;
pub mod worker;

pub use agent::{AgentLauncher, ConversationHandle, MultimodalAgent, RealtimeLauncher};
pub use client::{RealtimeClient, RealtimeReceiver, RealtimeSender};
pub use config::Settings;
pub use context::AppContext;
pub use database::DatabaseClient;
pub use entrypoint::entrypoint;
pub use error::{Error, Result};
pub use model::{RealtimeModel, RealtimeModelBuilder};
pub use prompt::SYSTEM_PROMPT;
pub use protocol::client_events::ClientEvent;
pub use protocol::models::{
    AudioConfig, AudioFormat, InputAudioConfig, OutputAudioConfig, Response, ResponseStatus,
    Session, SessionUpdate, TurnDetection, Voice,
};
pub use protocol::server_events::ServerEvent;
pub use room::{
    AutoSubscribe, CallSession, MediaPorts, Participant, ParticipantKind, Playout, SessionFactory,
};
pub use worker::{JobContext, Worker, WorkerOptions};
