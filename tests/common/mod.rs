#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use luxapts_voice_agent::room::AudioFrame;
use luxapts_voice_agent::{
    AgentLauncher, AppContext, AutoSubscribe, CallSession, ConversationHandle, Error, MediaPorts,
    Participant, Playout, RealtimeModel, Result, SessionFactory, Settings, Voice,
};
use tokio::sync::mpsc;

/// What a fake session records about how it was driven.
#[derive(Debug, Default)]
pub struct SessionLog {
    pub calls: Vec<&'static str>,
    pub subscribe: Option<AutoSubscribe>,
    /// Feeds the caller's audio; dropping it is the caller hanging up.
    pub caller_audio: Option<mpsc::Sender<AudioFrame>>,
}

impl SessionLog {
    pub fn hang_up(&mut self) {
        self.caller_audio = None;
    }
}

/// In-memory call session. `caller: None` never produces a participant.
pub struct FakeSession {
    room: String,
    caller: Option<Participant>,
    pub log: Arc<Mutex<SessionLog>>,
    outbound: Option<mpsc::Receiver<Playout>>,
}

impl FakeSession {
    pub fn new(room: &str, caller: Option<Participant>) -> Self {
        Self {
            room: room.to_string(),
            caller,
            log: Arc::default(),
            outbound: None,
        }
    }

    fn record(&self, call: &'static str) {
        self.log.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl CallSession for FakeSession {
    fn room_name(&self) -> &str {
        &self.room
    }

    async fn connect(&mut self, subscribe: AutoSubscribe) -> Result<()> {
        self.record("connect");
        self.log.lock().unwrap().subscribe = Some(subscribe);
        Ok(())
    }

    async fn wait_for_participant(&mut self) -> Result<Participant> {
        self.record("wait_for_participant");
        match self.caller.clone() {
            Some(participant) => Ok(participant),
            None => std::future::pending().await,
        }
    }

    async fn open_media(&mut self, participant: &Participant) -> Result<MediaPorts> {
        self.record("open_media");
        if Some(participant) != self.caller.as_ref() {
            return Err(Error::Room(format!("unknown participant {}", participant.identity)));
        }
        let (inbound_tx, inbound) = mpsc::channel(8);
        let (outbound, outbound_rx) = mpsc::channel(8);
        self.log.lock().unwrap().caller_audio = Some(inbound_tx);
        self.outbound = Some(outbound_rx);
        Ok(MediaPorts { inbound, outbound })
    }

    async fn close(&mut self) -> Result<()> {
        self.record("close");
        self.log.lock().unwrap().hang_up();
        self.outbound = None;
        Ok(())
    }
}

/// Builds fake sessions and remembers their logs by room.
#[derive(Default)]
pub struct FakeFactory {
    pub caller: Option<Participant>,
    pub sessions: Mutex<HashMap<String, Arc<Mutex<SessionLog>>>>,
}

impl FakeFactory {
    pub fn with_caller(identity: &str) -> Self {
        Self {
            caller: Some(Participant::new(identity)),
            ..Self::default()
        }
    }

    pub fn log(&self, room: &str) -> Arc<Mutex<SessionLog>> {
        Arc::clone(&self.sessions.lock().unwrap()[room])
    }

    pub fn created(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

impl SessionFactory for FakeFactory {
    fn create(&self, room_name: &str) -> Result<Box<dyn CallSession>> {
        let session = FakeSession::new(room_name, self.caller.clone());
        self.sessions
            .lock()
            .unwrap()
            .insert(room_name.to_string(), Arc::clone(&session.log));
        Ok(Box::new(session))
    }
}

/// How a recorded conversation behaves once launched.
#[derive(Debug, Clone, Copy, Default)]
pub enum Conversation {
    /// Ends successfully right away.
    #[default]
    Finish,
    /// Runs until aborted.
    Pending,
    /// Tries to connect to the model, as the real agent does first.
    ConnectModel,
    /// Consumes caller audio and ends when the caller hangs up.
    UntilHangUp,
}

#[derive(Debug, Clone)]
pub struct Launch {
    pub participant: String,
    pub voice: Voice,
    pub api_key: Option<String>,
    pub instructions: String,
}

#[derive(Default)]
pub struct RecordingLauncher {
    pub behaviour: Conversation,
    pub launches: Mutex<Vec<Launch>>,
}

impl RecordingLauncher {
    pub fn new(behaviour: Conversation) -> Self {
        Self {
            behaviour,
            launches: Mutex::default(),
        }
    }

    pub fn launches(&self) -> Vec<Launch> {
        self.launches.lock().unwrap().clone()
    }
}

impl AgentLauncher for RecordingLauncher {
    fn launch(
        &self,
        model: RealtimeModel,
        media: MediaPorts,
        participant: &Participant,
    ) -> ConversationHandle {
        self.launches.lock().unwrap().push(Launch {
            participant: participant.identity.clone(),
            voice: model.voice(),
            api_key: model.api_key().map(str::to_string),
            instructions: model.instructions().to_string(),
        });
        match self.behaviour {
            Conversation::Finish => ConversationHandle::spawn(async move {
                drop(media);
                Ok(())
            }),
            Conversation::Pending => ConversationHandle::spawn(async move {
                let _media = media;
                std::future::pending().await
            }),
            Conversation::ConnectModel => ConversationHandle::spawn(async move {
                let _media = media;
                model.connect().await.map(|_| ())
            }),
            Conversation::UntilHangUp => ConversationHandle::spawn(async move {
                let MediaPorts { mut inbound, .. } = media;
                while inbound.recv().await.is_some() {}
                Ok(())
            }),
        }
    }
}

/// Application context built from the given environment.
pub fn app(vars: &[(&str, &str)]) -> Arc<AppContext> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    let settings = Settings::from_lookup(|name| vars.get(name).cloned()).unwrap();
    Arc::new(AppContext::init(settings).unwrap())
}
