//! The call transport as seen by a call task.
//!
//! A [`CallSession`] owns one call's media connection. The call task drives
//! it in a fixed order: [`CallSession::connect`], then
//! [`CallSession::wait_for_participant`], then [`CallSession::open_media`] for
//! the participant it got back. Audio crosses the seam as PCM16 mono at
//! [`PCM_SAMPLE_RATE`](crate::protocol::models::PCM_SAMPLE_RATE).

pub mod livekit;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::Result;

/// Samples per channel in one 10 ms frame at 24 kHz.
pub const FRAME_SAMPLES: usize = 240;

/// Which remote tracks the session subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoSubscribe {
    #[default]
    SubscribeAll,
    SubscribeNone,
    AudioOnly,
    VideoOnly,
}

impl AutoSubscribe {
    #[must_use]
    pub const fn wants_audio(self) -> bool {
        matches!(self, Self::SubscribeAll | Self::AudioOnly)
    }

    #[must_use]
    pub const fn wants_video(self) -> bool {
        matches!(self, Self::SubscribeAll | Self::VideoOnly)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParticipantKind {
    #[default]
    Standard,
    Sip,
    Ingress,
    Egress,
    Agent,
}

/// A remote party in the call session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub identity: String,
    pub name: String,
    pub kind: ParticipantKind,
}

impl Participant {
    #[must_use]
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            name: String::new(),
            kind: ParticipantKind::Standard,
        }
    }
}

/// One chunk of PCM16 mono audio.
pub type AudioFrame = Vec<i16>;

/// Instructions for the agent's outbound audio track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Playout {
    Frame(AudioFrame),
    /// Drop audio that is queued but not yet played (caller barge-in).
    Clear,
}

/// Audio channels between a call session and the conversation agent.
///
/// `inbound` yields the caller's audio and closes when the caller's track
/// ends. `outbound` accepts audio to play to the caller.
#[derive(Debug)]
pub struct MediaPorts {
    pub inbound: mpsc::Receiver<AudioFrame>,
    pub outbound: mpsc::Sender<Playout>,
}

/// Capability a call task needs from the call transport.
#[async_trait]
pub trait CallSession: Send {
    /// Name of the room this session belongs to.
    fn room_name(&self) -> &str;

    /// Establish the media connection.
    async fn connect(&mut self, subscribe: AutoSubscribe) -> Result<()>;

    /// Resolve once a remote participant is present. A participant that is
    /// already in the room resolves immediately.
    async fn wait_for_participant(&mut self) -> Result<Participant>;

    /// Subscribe to the participant's audio and publish the agent's audio track.
    async fn open_media(&mut self, participant: &Participant) -> Result<MediaPorts>;

    /// Leave the room. Idempotent.
    async fn close(&mut self) -> Result<()>;
}

/// Creates a session for each call job.
pub trait SessionFactory: Send + Sync {
    /// # Errors
    /// Returns an error if the session's credentials cannot be produced.
    fn create(&self, room_name: &str) -> Result<Box<dyn CallSession>>;
}
