//! LiveKit webhook endpoint that turns inbound SIP calls into jobs.
//!
//! LiveKit signs each webhook with the project's API secret. Requests that
//! fail verification are rejected with `401`. Only `participant_joined` for a
//! SIP participant dispatches a job; everything else is acknowledged and
//! ignored.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::routing::post;
use livekit_api::access_token::TokenVerifier;
use livekit_api::webhooks::WebhookReceiver;
use livekit_protocol::{WebhookEvent, participant_info};

use super::Worker;
use crate::Result;

pub const WEBHOOK_PATH: &str = "/livekit/webhook";

#[derive(Clone)]
struct WebhookState {
    worker: Worker,
    receiver: Arc<WebhookReceiver>,
}

/// Room a webhook event should start a call job for, if any.
#[must_use]
pub fn job_room(event: &WebhookEvent) -> Option<String> {
    if event.event != "participant_joined" {
        return None;
    }
    let participant = event.participant.as_ref()?;
    if participant.kind != participant_info::Kind::Sip as i32 {
        return None;
    }
    let room = event.room.as_ref()?;
    (!room.name.is_empty()).then(|| room.name.clone())
}

/// Webhook routes bound to `worker`, verifying with the LiveKit key pair.
pub fn router(worker: Worker, api_key: &str, api_secret: &str) -> Router {
    let receiver = WebhookReceiver::new(TokenVerifier::with_api_key(api_key, api_secret));
    Router::new()
        .route(WEBHOOK_PATH, post(handle_webhook))
        .with_state(WebhookState {
            worker,
            receiver: Arc::new(receiver),
        })
}

/// Serve the webhook endpoint on `addr` until the worker shuts down.
///
/// # Errors
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(worker: Worker, addr: SocketAddr) -> Result<()> {
    let settings = worker.app().settings();
    let app = router(worker.clone(), &settings.livekit_api_key, &settings.livekit_api_secret);
    let shutdown = worker.shutdown_token();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, path = WEBHOOK_PATH, "Listening for LiveKit webhooks");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

async fn handle_webhook(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let event = match state.receiver.receive(&body, auth) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(error = %err, "Rejected webhook");
            return StatusCode::UNAUTHORIZED;
        }
    };
    tracing::debug!(event = %event.event, id = %event.id, "Webhook received");

    let Some(room) = job_room(&event) else {
        return StatusCode::OK;
    };
    match state.worker.dispatch(&room).await {
        Ok(_) => StatusCode::OK,
        Err(err) => {
            tracing::error!(room = %room, error = %err, "Failed to dispatch call job");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livekit_protocol::{ParticipantInfo, Room};

    fn event(kind: &str, participant_kind: participant_info::Kind, room: &str) -> WebhookEvent {
        WebhookEvent {
            event: kind.to_string(),
            room: Some(Room {
                name: room.to_string(),
                ..Default::default()
            }),
            participant: Some(ParticipantInfo {
                identity: "sip_+15550100".to_string(),
                kind: participant_kind as i32,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn sip_participant_joined_starts_a_job() {
        let e = event("participant_joined", participant_info::Kind::Sip, "call-_+15550100_abc");
        assert_eq!(job_room(&e).as_deref(), Some("call-_+15550100_abc"));
    }

    #[test]
    fn standard_participants_are_ignored() {
        let e = event("participant_joined", participant_info::Kind::Standard, "call-1");
        assert_eq!(job_room(&e), None);
    }

    #[test]
    fn other_events_are_ignored() {
        let e = event("participant_left", participant_info::Kind::Sip, "call-1");
        assert_eq!(job_room(&e), None);
        let e = event("room_started", participant_info::Kind::Sip, "call-1");
        assert_eq!(job_room(&e), None);
    }

    #[test]
    fn event_without_room_is_ignored() {
        let mut e = event("participant_joined", participant_info::Kind::Sip, "call-1");
        e.room = None;
        assert_eq!(job_room(&e), None);
        let e = event("participant_joined", participant_info::Kind::Sip, "");
        assert_eq!(job_room(&e), None);
    }
}
