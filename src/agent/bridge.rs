use tokio::sync::mpsc;

use super::audio::{InputBatcher, decode_pcm16, encode_pcm16, playout_frames};
use crate::error::ApiErrorType;
use crate::model::RealtimeModel;
use crate::protocol::client_events::ClientEvent;
use crate::protocol::server_events::ServerEvent;
use crate::room::{MediaPorts, Participant, Playout};
use crate::{Error, Result};

/// Caller audio is appended in ~100 ms batches.
const APPEND_BATCH_SAMPLES: usize = 2_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Run one conversation until the caller hangs up, the model closes the
/// socket, or a fatal error occurs.
pub(crate) async fn run(
    model: RealtimeModel,
    media: MediaPorts,
    participant: Participant,
) -> Result<()> {
    let MediaPorts {
        mut inbound,
        outbound,
    } = media;

    let client = model.connect().await?;
    let (mut sender, mut receiver) = client.split();
    sender
        .send(ClientEvent::session_update(model.session_update()))
        .await?;
    tracing::info!(
        participant = %participant.identity,
        voice = %model.voice(),
        "Conversation started"
    );

    let mut batcher = InputBatcher::new(APPEND_BATCH_SAMPLES);
    loop {
        tokio::select! {
            frame = inbound.recv() => {
                if let Some(samples) = frame {
                    if let Some(batch) = batcher.push(&samples) {
                        sender.send(ClientEvent::audio_append(encode_pcm16(&batch))).await?;
                    }
                } else {
                    if let Some(rest) = batcher.flush() {
                        sender.send(ClientEvent::audio_append(encode_pcm16(&rest))).await?;
                    }
                    tracing::info!(participant = %participant.identity, "Caller audio ended");
                    break;
                }
            }
            event = receiver.next_event() => {
                if let Some(event) = event? {
                    if handle_server_event(event, &outbound).await? == Flow::Stop {
                        break;
                    }
                } else {
                    tracing::info!("Realtime session closed by the model");
                    break;
                }
            }
        }
    }

    if let Err(err) = sender.close().await {
        tracing::debug!(error = %err, "Realtime socket was already closed");
    }
    Ok(())
}

async fn handle_server_event(event: ServerEvent, outbound: &mpsc::Sender<Playout>) -> Result<Flow> {
    match event {
        ServerEvent::Error { error, .. } => {
            if error.error_type == ApiErrorType::InvalidRequestError {
                tracing::warn!(code = ?error.code, message = %error.message, "Realtime request rejected");
            } else {
                return Err(Error::Api(error));
            }
        }
        ServerEvent::SessionCreated { session, .. } | ServerEvent::SessionUpdated { session, .. } => {
            tracing::debug!(id = ?session.id, voice = ?session.voice, "Realtime session configured");
        }
        ServerEvent::InputAudioBufferSpeechStarted { audio_start_ms, .. } => {
            tracing::debug!(audio_start_ms, "Caller started speaking");
            if outbound.send(Playout::Clear).await.is_err() {
                return Ok(Flow::Stop);
            }
        }
        ServerEvent::InputAudioBufferSpeechStopped { audio_end_ms, .. } => {
            tracing::debug!(audio_end_ms, "Caller stopped speaking");
        }
        ServerEvent::ResponseOutputAudioDelta { delta, .. } => match decode_pcm16(&delta) {
            Ok(samples) => {
                for frame in playout_frames(&samples) {
                    if outbound.send(Playout::Frame(frame)).await.is_err() {
                        return Ok(Flow::Stop);
                    }
                }
            }
            Err(err) => tracing::warn!(error = %err, "Dropping undecodable audio delta"),
        },
        ServerEvent::InputAudioTranscriptionCompleted { transcript, .. } => {
            tracing::debug!(%transcript, "Caller said");
        }
        ServerEvent::ResponseOutputAudioTranscriptDone { transcript, .. } => {
            tracing::debug!(%transcript, "Assistant said");
        }
        ServerEvent::ResponseDone { response, .. } => {
            tracing::debug!(response_id = %response.id, status = ?response.status, "Response finished");
        }
        other => tracing::trace!(kind = other.kind(), "Ignoring server event"),
    }
    Ok(Flow::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;
    use crate::prompt::SYSTEM_PROMPT;
    use crate::room::FRAME_SAMPLES;
    use futures::{SinkExt, StreamExt};
    use serde_json::{Value, json};
    use std::time::Duration;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::WebSocketStream;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    fn parse(value: serde_json::Value) -> ServerEvent {
        serde_json::from_value(value).unwrap()
    }

    /// Local realtime endpoint and a model pointed at it.
    async fn listen() -> (TcpListener, RealtimeModel) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let model = RealtimeModel::builder()
            .api_key(Some("k1"))
            .instructions(SYSTEM_PROMPT)
            .url(format!("ws://{addr}"))
            .build();
        (listener, model)
    }

    /// Accept one upgrade, returning the socket and its `Authorization` header.
    async fn accept(listener: &TcpListener) -> (WebSocketStream<TcpStream>, Option<String>) {
        let (stream, _) = listener.accept().await.unwrap();
        let mut auth = None;
        let ws = tokio_tungstenite::accept_hdr_async(
            stream,
            |req: &Request, resp: Response| -> std::result::Result<Response, ErrorResponse> {
                auth = req
                    .headers()
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                Ok(resp)
            },
        )
        .await
        .unwrap();
        (ws, auth)
    }

    async fn next_json(ws: &mut WebSocketStream<TcpStream>) -> Option<Value> {
        while let Some(msg) = ws.next().await {
            match msg.ok()? {
                Message::Text(text) => return Some(serde_json::from_str(text.as_str()).unwrap()),
                Message::Close(_) => return None,
                _ => (),
            }
        }
        None
    }

    async fn send_json(ws: &mut WebSocketStream<TcpStream>, value: Value) {
        ws.send(Message::Text(value.to_string().into())).await.unwrap();
    }

    fn appended_samples(frame: &Value) -> usize {
        assert_eq!(frame["type"], "input_audio_buffer.append");
        decode_pcm16(frame["audio"].as_str().unwrap()).unwrap().len()
    }

    fn media(capacity: usize) -> (MediaPorts, mpsc::Sender<Vec<i16>>, mpsc::Receiver<Playout>) {
        let (inbound_tx, inbound) = mpsc::channel(capacity);
        let (outbound, outbound_rx) = mpsc::channel(capacity);
        (MediaPorts { inbound, outbound }, inbound_tx, outbound_rx)
    }

    #[tokio::test]
    async fn conversation_configures_session_then_streams_caller_audio() {
        let (listener, model) = listen().await;
        let server = tokio::spawn(async move {
            let (mut ws, auth) = accept(&listener).await;
            let mut frames = Vec::new();
            while let Some(frame) = next_json(&mut ws).await {
                frames.push(frame);
            }
            (auth, frames)
        });

        let (media, inbound_tx, _outbound_rx) = media(16);
        for _ in 0..13 {
            inbound_tx.send(vec![7; FRAME_SAMPLES]).await.unwrap();
        }
        drop(inbound_tx);

        tokio::time::timeout(Duration::from_secs(5), run(model, media, Participant::new("caller")))
            .await
            .unwrap()
            .unwrap();
        let (auth, frames) = server.await.unwrap();

        assert_eq!(auth.as_deref(), Some("Bearer k1"));
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0]["type"], "session.update");
        assert_eq!(frames[0]["session"]["instructions"].as_str(), Some(SYSTEM_PROMPT));
        assert_eq!(frames[0]["session"]["voice"], "Cove");
        assert_eq!(appended_samples(&frames[1]), APPEND_BATCH_SAMPLES);
        assert_eq!(appended_samples(&frames[2]), 13 * FRAME_SAMPLES - APPEND_BATCH_SAMPLES);
    }

    #[tokio::test]
    async fn model_audio_is_played_out_and_speech_clears_it() {
        let (listener, model) = listen().await;
        let server = tokio::spawn(async move {
            let (mut ws, _) = accept(&listener).await;
            let update = next_json(&mut ws).await.unwrap();
            assert_eq!(update["type"], "session.update");
            send_json(
                &mut ws,
                json!({
                    "type": "response.output_audio.delta",
                    "response_id": "resp_1",
                    "item_id": "item_1",
                    "delta": encode_pcm16(&[5; FRAME_SAMPLES + 60]),
                }),
            )
            .await;
            send_json(
                &mut ws,
                json!({ "type": "input_audio_buffer.speech_started", "audio_start_ms": 900 }),
            )
            .await;
            ws.close(None).await.unwrap();
        });

        let (media, _inbound_tx, mut outbound_rx) = media(16);
        tokio::time::timeout(Duration::from_secs(5), run(model, media, Participant::new("caller")))
            .await
            .unwrap()
            .unwrap();
        server.await.unwrap();

        assert_eq!(outbound_rx.recv().await, Some(Playout::Frame(vec![5; FRAME_SAMPLES])));
        assert_eq!(outbound_rx.recv().await, Some(Playout::Frame(vec![5; 60])));
        assert_eq!(outbound_rx.recv().await, Some(Playout::Clear));
        assert_eq!(outbound_rx.recv().await, None);
    }

    #[tokio::test]
    async fn fatal_error_event_ends_the_conversation() {
        let (listener, model) = listen().await;
        let server = tokio::spawn(async move {
            let (mut ws, _) = accept(&listener).await;
            next_json(&mut ws).await.unwrap();
            send_json(
                &mut ws,
                json!({
                    "type": "error",
                    "event_id": "evt_9",
                    "error": {
                        "type": "authentication_error",
                        "code": "invalid_api_key",
                        "message": "bad key",
                    }
                }),
            )
            .await;
            while next_json(&mut ws).await.is_some() {}
        });

        let (media, _inbound_tx, _outbound_rx) = media(4);
        let conversation = run(model, media, Participant::new("caller"));
        let err = tokio::time::timeout(Duration::from_secs(5), conversation)
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, Error::Api(e) if e.error_type == ApiErrorType::AuthenticationError));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn audio_delta_is_split_into_playout_frames() {
        let (tx, mut rx) = mpsc::channel(16);
        let samples = vec![3i16; FRAME_SAMPLES + 40];
        let event = parse(json!({
            "type": "response.output_audio.delta",
            "event_id": "evt_1",
            "response_id": "resp_1",
            "item_id": "item_1",
            "output_index": 0,
            "content_index": 0,
            "delta": encode_pcm16(&samples),
        }));

        assert_eq!(handle_server_event(event, &tx).await.unwrap(), Flow::Continue);
        assert_eq!(rx.recv().await, Some(Playout::Frame(vec![3; FRAME_SAMPLES])));
        assert_eq!(rx.recv().await, Some(Playout::Frame(vec![3; 40])));
    }

    #[tokio::test]
    async fn speech_started_clears_playout() {
        let (tx, mut rx) = mpsc::channel(4);
        let event = parse(json!({
            "type": "input_audio_buffer.speech_started",
            "event_id": "evt_2",
            "audio_start_ms": 1200,
            "item_id": "item_2",
        }));

        handle_server_event(event, &tx).await.unwrap();
        assert_eq!(rx.recv().await, Some(Playout::Clear));
    }

    #[tokio::test]
    async fn closed_playout_stops_the_conversation() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let event = parse(json!({
            "type": "response.output_audio.delta",
            "response_id": "resp_1",
            "item_id": "item_1",
            "delta": encode_pcm16(&[1, 2, 3]),
        }));
        assert_eq!(handle_server_event(event, &tx).await.unwrap(), Flow::Stop);
    }

    #[tokio::test]
    async fn authentication_error_is_fatal() {
        let (tx, _rx) = mpsc::channel(4);
        let event = ServerEvent::Error {
            event_id: "evt_3".to_string(),
            error: ServerError {
                error_type: ApiErrorType::AuthenticationError,
                code: Some("invalid_api_key".to_string()),
                message: "bad key".to_string(),
                param: None,
                event_id: None,
            },
        };
        let err = handle_server_event(event, &tx).await.unwrap_err();
        assert!(matches!(err, Error::Api(e) if e.code.as_deref() == Some("invalid_api_key")));
    }

    #[tokio::test]
    async fn bare_error_event_is_fatal() {
        let (tx, _rx) = mpsc::channel(4);
        let event = parse(json!({ "type": "error", "error": {} }));
        let err = handle_server_event(event, &tx).await.unwrap_err();
        assert!(matches!(err, Error::Api(e) if e.error_type == ApiErrorType::Unknown));
    }

    #[tokio::test]
    async fn rejected_request_is_not_fatal() {
        let (tx, _rx) = mpsc::channel(4);
        let event = parse(json!({
            "type": "error",
            "event_id": "evt_4",
            "error": {
                "type": "invalid_request_error",
                "code": "response_cancel_not_active",
                "message": "no active response",
            }
        }));
        assert_eq!(handle_server_event(event, &tx).await.unwrap(), Flow::Continue);
    }

    #[tokio::test]
    async fn unknown_events_are_ignored() {
        let (tx, mut rx) = mpsc::channel(4);
        let event = parse(json!({ "type": "rate_limits.updated", "rate_limits": [] }));
        assert_eq!(handle_server_event(event, &tx).await.unwrap(), Flow::Continue);
        assert!(rx.try_recv().is_err());
    }
}
