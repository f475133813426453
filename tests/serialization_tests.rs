use luxapts_voice_agent::protocol::client_events::ClientEvent;
use luxapts_voice_agent::protocol::models::{AudioFormat, ResponseStatus, Voice};
use luxapts_voice_agent::protocol::server_events::ServerEvent;
use luxapts_voice_agent::{RealtimeModel, SYSTEM_PROMPT};
use serde_json::json;

#[test]
fn test_session_update_wire_shape() {
    let model = RealtimeModel::builder()
        .voice(Voice::Cove)
        .instructions(SYSTEM_PROMPT)
        .api_key(Some("k1"))
        .build();

    let value = serde_json::to_value(ClientEvent::session_update(model.session_update())).unwrap();
    assert_eq!(
        value,
        json!({
            "type": "session.update",
            "session": {
                "instructions": SYSTEM_PROMPT,
                "voice": "Cove",
                "turn_detection": {
                    "type": "server_vad",
                    "create_response": true,
                    "interrupt_response": true
                },
                "audio": {
                    "input": { "format": { "type": "audio/pcm", "rate": 24000 } },
                    "output": { "format": { "type": "audio/pcm", "rate": 24000 } }
                }
            }
        })
    );
}

#[test]
fn test_session_update_never_carries_the_api_key() {
    let model = RealtimeModel::builder().api_key(Some("secret-key")).build();
    let text = serde_json::to_string(&ClientEvent::session_update(model.session_update())).unwrap();
    assert!(!text.contains("secret-key"));
}

#[test]
fn test_audio_append_serialization() {
    let value = serde_json::to_value(ClientEvent::audio_append("AAAA".to_string())).unwrap();
    assert_eq!(value, json!({ "type": "input_audio_buffer.append", "audio": "AAAA" }));
}

#[test]
fn test_session_update_deserialization() {
    let event: ClientEvent = serde_json::from_value(json!({
        "type": "session.update",
        "session": {
            "voice": "Maple",
            "audio": { "output": { "format": { "type": "audio/pcmu" } } }
        }
    }))
    .unwrap();

    match event {
        ClientEvent::SessionUpdate { session, .. } => {
            assert_eq!(session.voice, Some(Voice::Maple));
            let format = session.audio.and_then(|a| a.output).and_then(|o| o.format);
            assert_eq!(format, Some(AudioFormat::Pcmu));
        }
        other => panic!("Wrong event type: {other:?}"),
    }
}

#[test]
fn test_session_created_parsing() {
    let event: ServerEvent = serde_json::from_value(json!({
        "type": "session.created",
        "event_id": "evt_1",
        "session": {
            "id": "sess_1",
            "voice": "Cove",
            "instructions": "hi",
            "turn_detection": { "type": "server_vad" }
        }
    }))
    .unwrap();

    match event {
        ServerEvent::SessionCreated { event_id, session } => {
            assert_eq!(event_id, "evt_1");
            assert_eq!(session.id.as_deref(), Some("sess_1"));
            assert_eq!(session.voice.as_deref(), Some("Cove"));
        }
        other => panic!("Wrong event type: {other:?}"),
    }
}

#[test]
fn test_response_done_parsing() {
    let event: ServerEvent = serde_json::from_value(json!({
        "type": "response.done",
        "event_id": "evt_2",
        "response": {
            "id": "resp_1",
            "status": "completed",
            "output": [],
            "usage": { "total_tokens": 10 }
        }
    }))
    .unwrap();

    match event {
        ServerEvent::ResponseDone { response, .. } => {
            assert_eq!(response.id, "resp_1");
            assert_eq!(response.status, Some(ResponseStatus::Completed));
        }
        other => panic!("Wrong event type: {other:?}"),
    }
}

#[test]
fn test_transcription_completed_parsing() {
    let event: ServerEvent = serde_json::from_value(json!({
        "type": "conversation.item.input_audio_transcription.completed",
        "event_id": "evt_3",
        "item_id": "item_1",
        "content_index": 0,
        "transcript": "Do you have two bedrooms in Austin?"
    }))
    .unwrap();

    assert!(matches!(
        event,
        ServerEvent::InputAudioTranscriptionCompleted { ref transcript, .. }
            if transcript == "Do you have two bedrooms in Austin?"
    ));
    assert_eq!(event.kind(), "conversation.item.input_audio_transcription.completed");
}

#[test]
fn test_unknown_event_keeps_payload() {
    let event: ServerEvent = serde_json::from_value(json!({
        "type": "conversation.item.added",
        "event_id": "evt_4",
        "item": { "id": "item_2" }
    }))
    .unwrap();

    match &event {
        ServerEvent::Unknown(value) => assert_eq!(value["item"]["id"], "item_2"),
        other => panic!("Expected Unknown, got {other:?}"),
    }
    assert_eq!(event.kind(), "conversation.item.added");
}

#[test]
fn test_malformed_known_event_falls_back_to_unknown() {
    let event: ServerEvent = serde_json::from_value(json!({
        "type": "response.output_audio.delta",
        "delta": 42
    }))
    .unwrap();
    assert!(matches!(event, ServerEvent::Unknown(_)));
}

#[test]
fn test_error_event_parsing() {
    let event: ServerEvent = serde_json::from_value(json!({
        "type": "error",
        "event_id": "evt_5",
        "error": {
            "type": "something_new",
            "code": null,
            "message": "boom"
        }
    }))
    .unwrap();

    match event {
        ServerEvent::Error { error, .. } => {
            assert_eq!(error.message, "boom");
            assert_eq!(error.error_type, luxapts_voice_agent::error::ApiErrorType::Unknown);
        }
        other => panic!("Wrong event type: {other:?}"),
    }
}

#[test]
fn test_error_event_without_type_or_message_is_still_an_error() {
    let event: ServerEvent = serde_json::from_value(json!({
        "type": "error",
        "event_id": "evt_6",
        "error": { "code": "session_expired" }
    }))
    .unwrap();

    match event {
        ServerEvent::Error { error, .. } => {
            assert_eq!(error.error_type, luxapts_voice_agent::error::ApiErrorType::Unknown);
            assert_eq!(error.code.as_deref(), Some("session_expired"));
            assert!(error.message.is_empty());
        }
        other => panic!("Wrong event type: {other:?}"),
    }
}
