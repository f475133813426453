use std::borrow::Cow;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::error::{Error, Result};
use crate::protocol::client_events::ClientEvent;
use crate::protocol::server_events::ServerEvent;
use crate::transport::ws::{self, WsStream};

const TRACE_LOG_MAX_BYTES: usize = 512;
const TRACE_TRUNCATE_SUFFIX: &str = "... (truncated)";
/// Upper bound the API accepts for a single `input_audio_buffer.append`.
const MAX_INPUT_AUDIO_CHUNK_BYTES: usize = 15 * 1024 * 1024;

/// WebSocket client for the realtime speech-to-speech API.
///
/// `RealtimeClient` is `Send` but not `Sync`; split it to read and write
/// from different tasks.
#[must_use]
pub struct RealtimeClient {
    stream: WsStream,
}

impl RealtimeClient {
    /// Connect to a realtime endpoint.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the handshake fails.
    pub async fn connect(api_key: &str, endpoint: &str, model: Option<&str>) -> Result<Self> {
        let stream = ws::connect(api_key, endpoint, model).await?;
        Ok(Self { stream })
    }

    /// Split the client into halves that can live in different tasks.
    pub fn split(self) -> (RealtimeSender, RealtimeReceiver) {
        let (write, read) = self.stream.split();
        (RealtimeSender { write }, RealtimeReceiver { read })
    }
}

/// The sending half of a split `RealtimeClient`.
pub struct RealtimeSender {
    write: SplitSink<WsStream, Message>,
}

impl RealtimeSender {
    /// Send a client event.
    ///
    /// # Errors
    /// Returns an error if the event is malformed, or serialization or the send fails.
    pub async fn send(&mut self, event: ClientEvent) -> Result<()> {
        let message = encode(&event)?;
        self.write.send(message).await?;
        Ok(())
    }

    /// Close the socket.
    ///
    /// # Errors
    /// Returns an error if the close frame cannot be sent.
    pub async fn close(&mut self) -> Result<()> {
        self.write.close().await?;
        Ok(())
    }
}

/// The receiving half of a split `RealtimeClient`.
pub struct RealtimeReceiver {
    read: SplitStream<WsStream>,
}

impl RealtimeReceiver {
    /// Receive the next server event. Pings are answered by tungstenite on the
    /// next write of the sending half.
    ///
    /// # Errors
    /// Returns an error if the socket fails or a frame is not valid JSON.
    pub async fn next_event(&mut self) -> Result<Option<ServerEvent>> {
        while let Some(msg) = self.read.next().await {
            match msg? {
                Message::Text(text) => return decode(&text).map(Some),
                Message::Close(frame) => {
                    tracing::info!(?frame, "Realtime socket closed by server");
                    return Ok(None);
                }
                _ => (),
            }
        }
        Ok(None)
    }
}

fn encode(event: &ClientEvent) -> Result<Message> {
    validate_client_event(event)?;
    let json = serde_json::to_string(event)?;
    if !matches!(event, ClientEvent::InputAudioBufferAppend { .. }) {
        tracing::trace!("Sending event: {}", safe_truncate(&json, TRACE_LOG_MAX_BYTES));
    }
    Ok(Message::Text(json.into()))
}

fn decode(text: &str) -> Result<ServerEvent> {
    let event: ServerEvent = serde_json::from_str(text)?;
    if !matches!(event, ServerEvent::ResponseOutputAudioDelta { .. }) {
        tracing::trace!("Received event: {}", safe_truncate(text, TRACE_LOG_MAX_BYTES));
    }
    Ok(event)
}

fn validate_client_event(event: &ClientEvent) -> Result<()> {
    if let ClientEvent::InputAudioBufferAppend { audio, .. } = event {
        if audio.is_empty() {
            return Err(Error::InvalidClientEvent(
                "input_audio_buffer.append carries no audio".to_string(),
            ));
        }
        let decoded = audio.len() / 4 * 3;
        if decoded > MAX_INPUT_AUDIO_CHUNK_BYTES {
            return Err(Error::InvalidClientEvent(format!(
                "input_audio_buffer.append exceeds 15MB ({decoded} bytes)"
            )));
        }
    }
    Ok(())
}

fn safe_truncate(s: &str, max_bytes: usize) -> Cow<'_, str> {
    if s.len() <= max_bytes {
        return Cow::Borrowed(s);
    }

    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    Cow::Owned(format!(
        "{} {} {} bytes",
        &s[..end],
        TRACE_TRUNCATE_SUFFIX,
        s.len() - end
    ))
}
