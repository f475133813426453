//! [`CallSession`] backed by a LiveKit room.
//!
//! SIP calls reach LiveKit through its SIP bridge; by the time a call job is
//! dispatched the caller is (or soon will be) a participant of the room.

use std::borrow::Cow;

use async_trait::async_trait;
use futures::StreamExt;
use livekit::options::TrackPublishOptions;
use livekit::prelude::*;
use livekit::track::{TrackKind, TrackSource};
use livekit::webrtc::audio_frame::AudioFrame as RtcAudioFrame;
use livekit::webrtc::audio_source::native::NativeAudioSource;
use livekit::webrtc::audio_source::{AudioSourceOptions, RtcAudioSource};
use livekit::webrtc::audio_stream::native::NativeAudioStream;
use livekit_api::access_token::{AccessToken, VideoGrants};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{
    AudioFrame, AutoSubscribe, CallSession, MediaPorts, Participant, ParticipantKind, Playout,
    SessionFactory,
};
use crate::protocol::models::PCM_SAMPLE_RATE;
use crate::{Error, Result};

const AGENT_TRACK_NAME: &str = "agent-voice";
/// Buffer inside the native source before `capture_frame` applies back-pressure.
const SOURCE_QUEUE_MS: u32 = 100;
const INBOUND_CAPACITY: usize = 200;
/// Model audio arrives faster than real time; hold up to a minute of it.
const OUTBOUND_CAPACITY: usize = 6_000;

pub struct LiveKitSession {
    url: String,
    token: String,
    room_name: String,
    subscribe: AutoSubscribe,
    room: Option<Room>,
    events: Option<mpsc::UnboundedReceiver<RoomEvent>>,
    tasks: Vec<JoinHandle<()>>,
}

impl LiveKitSession {
    #[must_use]
    pub fn new(url: impl Into<String>, token: impl Into<String>, room_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            room_name: room_name.into(),
            subscribe: AutoSubscribe::default(),
            room: None,
            events: None,
            tasks: Vec::new(),
        }
    }

    fn room(&self) -> Result<&Room> {
        self.room
            .as_ref()
            .ok_or_else(|| Error::Room("session is not connected".to_string()))
    }

    async fn next_room_event(&mut self) -> Result<RoomEvent> {
        let events = self
            .events
            .as_mut()
            .ok_or_else(|| Error::Room("session is not connected".to_string()))?;
        match events.recv().await {
            Some(RoomEvent::Disconnected { reason }) => {
                Err(Error::Room(format!("disconnected from room: {reason:?}")))
            }
            Some(event) => Ok(event),
            None => Err(Error::Room("room event stream ended".to_string())),
        }
    }

    fn find_audio_track(&self, identity: &str) -> Result<Option<RemoteAudioTrack>> {
        let room = self.room()?;
        let track = room
            .remote_participants()
            .values()
            .filter(|p| p.identity().as_str() == identity)
            .flat_map(|p| p.track_publications().into_values())
            .find_map(|publication| match publication.track() {
                Some(RemoteTrack::Audio(track)) => Some(track),
                _ => None,
            });
        Ok(track)
    }

    async fn wait_for_audio_track(&mut self, identity: &str) -> Result<RemoteAudioTrack> {
        if let Some(track) = self.find_audio_track(identity)? {
            return Ok(track);
        }
        loop {
            match self.next_room_event().await? {
                RoomEvent::TrackSubscribed {
                    track: RemoteTrack::Audio(track),
                    participant,
                    ..
                } if participant.identity().as_str() == identity => return Ok(track),
                RoomEvent::TrackPublished { publication, .. } => {
                    apply_subscription(self.subscribe, &publication);
                }
                RoomEvent::ParticipantDisconnected(participant)
                    if participant.identity().as_str() == identity =>
                {
                    return Err(Error::Room(format!(
                        "participant {identity} left before publishing audio"
                    )));
                }
                _ => {}
            }
        }
    }

    async fn publish_agent_track(&self) -> Result<NativeAudioSource> {
        let source = NativeAudioSource::new(
            AudioSourceOptions::default(),
            PCM_SAMPLE_RATE,
            1,
            SOURCE_QUEUE_MS,
        );
        let track = LocalAudioTrack::create_audio_track(
            AGENT_TRACK_NAME,
            RtcAudioSource::Native(source.clone()),
        );
        let options = TrackPublishOptions {
            source: TrackSource::Microphone,
            ..Default::default()
        };
        self.room()?
            .local_participant()
            .publish_track(LocalTrack::Audio(track), options)
            .await?;
        Ok(source)
    }
}

#[async_trait]
impl CallSession for LiveKitSession {
    fn room_name(&self) -> &str {
        &self.room_name
    }

    async fn connect(&mut self, subscribe: AutoSubscribe) -> Result<()> {
        let mut options = RoomOptions::default();
        options.auto_subscribe = subscribe == AutoSubscribe::SubscribeAll;

        let (room, events) = Room::connect(&self.url, &self.token, options).await?;
        tracing::info!(room = %room.name(), ?subscribe, "Connected to LiveKit room");

        for participant in room.remote_participants().values() {
            for publication in participant.track_publications().values() {
                apply_subscription(subscribe, publication);
            }
        }

        self.subscribe = subscribe;
        self.room = Some(room);
        self.events = Some(events);
        Ok(())
    }

    async fn wait_for_participant(&mut self) -> Result<Participant> {
        if let Some(participant) = self
            .room()?
            .remote_participants()
            .values()
            .map(to_participant)
            .find(is_caller)
        {
            return Ok(participant);
        }

        loop {
            match self.next_room_event().await? {
                RoomEvent::ParticipantConnected(remote) => {
                    let participant = to_participant(&remote);
                    if is_caller(&participant) {
                        return Ok(participant);
                    }
                }
                RoomEvent::TrackPublished { publication, .. } => {
                    apply_subscription(self.subscribe, &publication);
                }
                _ => {}
            }
        }
    }

    async fn open_media(&mut self, participant: &Participant) -> Result<MediaPorts> {
        let track = self.wait_for_audio_track(&participant.identity).await?;
        let source = self.publish_agent_track().await?;
        let events = self
            .events
            .take()
            .ok_or_else(|| Error::Room("session is not connected".to_string()))?;
        let hangup = CancellationToken::new();

        let (inbound_tx, inbound) = mpsc::channel::<AudioFrame>(INBOUND_CAPACITY);
        let (outbound, outbound_rx) = mpsc::channel::<Playout>(OUTBOUND_CAPACITY);

        let rate = i32::try_from(PCM_SAMPLE_RATE).unwrap_or(i32::MAX);
        let stream = NativeAudioStream::new(track.rtc_track(), rate, 1);
        self.tasks.push(tokio::spawn(watch_room(
            events,
            participant.identity.clone(),
            hangup.clone(),
        )));
        self.tasks.push(tokio::spawn(pump_caller_audio(stream, inbound_tx, hangup)));
        self.tasks.push(tokio::spawn(pump_agent_audio(source, outbound_rx)));

        tracing::debug!(participant = %participant.identity, "Media opened");
        Ok(MediaPorts { inbound, outbound })
    }

    async fn close(&mut self) -> Result<()> {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.events = None;
        if let Some(room) = self.room.take() {
            room.close().await?;
            tracing::info!(room = %self.room_name, "Left LiveKit room");
        }
        Ok(())
    }
}

/// Cancels `hangup` once the caller leaves or the room connection drops.
/// Drains every other event so the queue stays empty for the rest of the call.
async fn watch_room(
    mut events: mpsc::UnboundedReceiver<RoomEvent>,
    identity: String,
    hangup: CancellationToken,
) {
    while let Some(event) = events.recv().await {
        match event {
            RoomEvent::ParticipantDisconnected(participant)
                if participant.identity().as_str() == identity =>
            {
                tracing::info!(participant = %identity, "Caller left the room");
                hangup.cancel();
            }
            RoomEvent::Disconnected { reason } => {
                tracing::info!(?reason, "Disconnected from room");
                hangup.cancel();
            }
            _ => {}
        }
    }
    hangup.cancel();
}

/// Caller audio ends, closing `tx`, when the track ends or on `hangup`.
async fn pump_caller_audio(
    mut stream: NativeAudioStream,
    tx: mpsc::Sender<AudioFrame>,
    hangup: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            () = hangup.cancelled() => break,
            frame = stream.next() => frame,
        };
        let Some(frame) = frame else { break };
        if tx.send(frame.data.into_owned()).await.is_err() {
            break;
        }
    }
    tracing::debug!("Caller audio stream ended");
}

async fn pump_agent_audio(source: NativeAudioSource, mut rx: mpsc::Receiver<Playout>) {
    while let Some(command) = rx.recv().await {
        match command {
            Playout::Frame(samples) => {
                let frame = RtcAudioFrame {
                    samples_per_channel: u32::try_from(samples.len()).unwrap_or(u32::MAX),
                    data: Cow::Owned(samples),
                    sample_rate: PCM_SAMPLE_RATE,
                    num_channels: 1,
                };
                if let Err(err) = source.capture_frame(&frame).await {
                    tracing::warn!(error = %err, "Failed to push agent audio");
                }
            }
            Playout::Clear => {
                let mut dropped = 0usize;
                while let Ok(Playout::Frame(_)) = rx.try_recv() {
                    dropped += 1;
                }
                tracing::debug!(dropped, "Cleared queued agent audio");
            }
        }
    }
}

fn apply_subscription(subscribe: AutoSubscribe, publication: &RemoteTrackPublication) {
    let wanted = match publication.kind() {
        TrackKind::Audio => subscribe.wants_audio(),
        TrackKind::Video => subscribe.wants_video(),
    };
    if wanted && subscribe != AutoSubscribe::SubscribeAll {
        publication.set_subscribed(true);
    }
}

fn to_participant(remote: &RemoteParticipant) -> Participant {
    use livekit::participant::ParticipantKind as LkKind;

    let kind = match remote.kind() {
        LkKind::Sip => ParticipantKind::Sip,
        LkKind::Ingress => ParticipantKind::Ingress,
        LkKind::Egress => ParticipantKind::Egress,
        LkKind::Agent => ParticipantKind::Agent,
        _ => ParticipantKind::Standard,
    };
    Participant {
        identity: remote.identity().as_str().to_string(),
        name: remote.name(),
        kind,
    }
}

fn is_caller(participant: &Participant) -> bool {
    matches!(participant.kind, ParticipantKind::Standard | ParticipantKind::Sip)
}

/// Mints a room-scoped access token per job and builds a [`LiveKitSession`].
pub struct LiveKitSessionFactory {
    url: String,
    api_key: String,
    api_secret: String,
    identity: String,
}

impl LiveKitSessionFactory {
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        identity: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            identity: identity.into(),
        }
    }

    /// JWT that lets the agent join `room_name`, publish and subscribe.
    ///
    /// # Errors
    /// Returns an error if the token cannot be signed.
    pub fn token(&self, room_name: &str) -> Result<String> {
        let grants = VideoGrants {
            room_join: true,
            room: room_name.to_string(),
            can_publish: true,
            can_subscribe: true,
            ..Default::default()
        };
        let token = AccessToken::with_api_key(&self.api_key, &self.api_secret)
            .with_identity(&self.identity)
            .with_name("Aria")
            .with_grants(grants)
            .to_jwt()?;
        Ok(token)
    }
}

impl SessionFactory for LiveKitSessionFactory {
    fn create(&self, room_name: &str) -> Result<Box<dyn CallSession>> {
        let token = self.token(room_name)?;
        Ok(Box::new(LiveKitSession::new(&self.url, token, room_name)))
    }
}
