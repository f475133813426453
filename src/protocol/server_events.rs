use serde::{Deserialize, Deserializer};
use super::models::{ArbitraryJson, Response, Session};
use crate::error::ServerError;

/// Events received from the realtime endpoint.
///
/// Events the agent does not act on deserialize to `Unknown` with their raw
/// payload, so a newer server never breaks the call.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    Error {
        event_id: String,
        error: ServerError,
    },
    SessionCreated {
        event_id: String,
        session: Session,
    },
    SessionUpdated {
        event_id: String,
        session: Session,
    },
    InputAudioBufferCommitted {
        event_id: String,
        item_id: String,
    },
    InputAudioBufferSpeechStarted {
        event_id: String,
        audio_start_ms: u32,
        item_id: String,
    },
    InputAudioBufferSpeechStopped {
        event_id: String,
        audio_end_ms: u32,
        item_id: String,
    },
    InputAudioTranscriptionCompleted {
        event_id: String,
        item_id: String,
        transcript: String,
    },
    ResponseCreated {
        event_id: String,
        response: Response,
    },
    ResponseDone {
        event_id: String,
        response: Response,
    },
    ResponseOutputAudioDelta {
        event_id: String,
        response_id: String,
        item_id: String,
        delta: String,
    },
    ResponseOutputAudioDone {
        event_id: String,
        response_id: String,
        item_id: String,
    },
    ResponseOutputAudioTranscriptDelta {
        event_id: String,
        response_id: String,
        item_id: String,
        delta: String,
    },
    ResponseOutputAudioTranscriptDone {
        event_id: String,
        response_id: String,
        item_id: String,
        transcript: String,
    },
    Unknown(ArbitraryJson),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum ServerEventRepr {
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        event_id: String,
        error: ServerError,
    },
    #[serde(rename = "session.created")]
    SessionCreated {
        #[serde(default)]
        event_id: String,
        session: Session,
    },
    #[serde(rename = "session.updated")]
    SessionUpdated {
        #[serde(default)]
        event_id: String,
        session: Session,
    },
    #[serde(rename = "input_audio_buffer.committed")]
    InputAudioBufferCommitted {
        #[serde(default)]
        event_id: String,
        item_id: String,
    },
    #[serde(rename = "input_audio_buffer.speech_started")]
    InputAudioBufferSpeechStarted {
        #[serde(default)]
        event_id: String,
        #[serde(default)]
        audio_start_ms: u32,
        item_id: String,
    },
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    InputAudioBufferSpeechStopped {
        #[serde(default)]
        event_id: String,
        #[serde(default)]
        audio_end_ms: u32,
        item_id: String,
    },
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputAudioTranscriptionCompleted {
        #[serde(default)]
        event_id: String,
        item_id: String,
        transcript: String,
    },
    #[serde(rename = "response.created")]
    ResponseCreated {
        #[serde(default)]
        event_id: String,
        response: Response,
    },
    #[serde(rename = "response.done")]
    ResponseDone {
        #[serde(default)]
        event_id: String,
        response: Response,
    },
    #[serde(rename = "response.output_audio.delta")]
    ResponseOutputAudioDelta {
        #[serde(default)]
        event_id: String,
        response_id: String,
        item_id: String,
        delta: String,
    },
    #[serde(rename = "response.output_audio.done")]
    ResponseOutputAudioDone {
        #[serde(default)]
        event_id: String,
        response_id: String,
        item_id: String,
    },
    #[serde(rename = "response.output_audio_transcript.delta")]
    ResponseOutputAudioTranscriptDelta {
        #[serde(default)]
        event_id: String,
        response_id: String,
        item_id: String,
        delta: String,
    },
    #[serde(rename = "response.output_audio_transcript.done")]
    ResponseOutputAudioTranscriptDone {
        #[serde(default)]
        event_id: String,
        response_id: String,
        item_id: String,
        transcript: String,
    },
}

impl From<ServerEventRepr> for ServerEvent {
    fn from(repr: ServerEventRepr) -> Self {
        match repr {
            ServerEventRepr::Error { event_id, error } => Self::Error { event_id, error },
            ServerEventRepr::SessionCreated { event_id, session } => Self::SessionCreated { event_id, session },
            ServerEventRepr::SessionUpdated { event_id, session } => Self::SessionUpdated { event_id, session },
            ServerEventRepr::InputAudioBufferCommitted { event_id, item_id } => Self::InputAudioBufferCommitted { event_id, item_id },
            ServerEventRepr::InputAudioBufferSpeechStarted { event_id, audio_start_ms, item_id } => Self::InputAudioBufferSpeechStarted { event_id, audio_start_ms, item_id },
            ServerEventRepr::InputAudioBufferSpeechStopped { event_id, audio_end_ms, item_id } => Self::InputAudioBufferSpeechStopped { event_id, audio_end_ms, item_id },
            ServerEventRepr::InputAudioTranscriptionCompleted { event_id, item_id, transcript } => Self::InputAudioTranscriptionCompleted { event_id, item_id, transcript },
            ServerEventRepr::ResponseCreated { event_id, response } => Self::ResponseCreated { event_id, response },
            ServerEventRepr::ResponseDone { event_id, response } => Self::ResponseDone { event_id, response },
            ServerEventRepr::ResponseOutputAudioDelta { event_id, response_id, item_id, delta } => Self::ResponseOutputAudioDelta { event_id, response_id, item_id, delta },
            ServerEventRepr::ResponseOutputAudioDone { event_id, response_id, item_id } => Self::ResponseOutputAudioDone { event_id, response_id, item_id },
            ServerEventRepr::ResponseOutputAudioTranscriptDelta { event_id, response_id, item_id, delta } => Self::ResponseOutputAudioTranscriptDelta { event_id, response_id, item_id, delta },
            ServerEventRepr::ResponseOutputAudioTranscriptDone { event_id, response_id, item_id, transcript } => Self::ResponseOutputAudioTranscriptDone { event_id, response_id, item_id, transcript },
        }
    }
}

impl<'de> Deserialize<'de> for ServerEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = ArbitraryJson::deserialize(deserializer)?;
        match ServerEventRepr::deserialize(value.clone()) {
            Ok(repr) => Ok(repr.into()),
            Err(err) => {
                tracing::trace!("Unhandled server event: {err}");
                Ok(Self::Unknown(value))
            }
        }
    }
}

impl ServerEvent {
    /// Wire `type` of the event.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Error { .. } => "error",
            Self::SessionCreated { .. } => "session.created",
            Self::SessionUpdated { .. } => "session.updated",
            Self::InputAudioBufferCommitted { .. } => "input_audio_buffer.committed",
            Self::InputAudioBufferSpeechStarted { .. } => "input_audio_buffer.speech_started",
            Self::InputAudioBufferSpeechStopped { .. } => "input_audio_buffer.speech_stopped",
            Self::InputAudioTranscriptionCompleted { .. } => "conversation.item.input_audio_transcription.completed",
            Self::ResponseCreated { .. } => "response.created",
            Self::ResponseDone { .. } => "response.done",
            Self::ResponseOutputAudioDelta { .. } => "response.output_audio.delta",
            Self::ResponseOutputAudioDone { .. } => "response.output_audio.done",
            Self::ResponseOutputAudioTranscriptDelta { .. } => "response.output_audio_transcript.delta",
            Self::ResponseOutputAudioTranscriptDone { .. } => "response.output_audio_transcript.done",
            Self::Unknown(value) => value.get("type").and_then(|v| v.as_str()).unwrap_or("unknown"),
        }
    }
}
