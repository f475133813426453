//! Per-call orchestration: connect, wait for the caller, start the agent.

use crate::agent::{AgentLauncher, ConversationHandle};
use crate::model::RealtimeModel;
use crate::prompt::SYSTEM_PROMPT;
use crate::room::{AutoSubscribe, Participant};
use crate::worker::JobContext;
use crate::{Error, Result};

/// Handle one inbound call.
///
/// Connects the job's session subscribing to audio only, waits for the
/// caller, then starts a conversation through `launcher`. The model
/// configuration is read from the application settings at this point, so a
/// missing API key is not detected here; it surfaces from the returned
/// handle.
///
/// # Errors
/// Returns the transport error if connecting or opening media fails,
/// [`Error::NoCallerJoined`] if the participant timeout elapses, or
/// [`Error::Cancelled`] if the job is cancelled while waiting.
pub async fn entrypoint(
    ctx: &mut JobContext,
    launcher: &dyn AgentLauncher,
) -> Result<ConversationHandle> {
    tracing::info!(room = %ctx.room_name, job_id = %ctx.job_id, "Connecting to room");
    ctx.session.connect(AutoSubscribe::AudioOnly).await?;

    let participant = wait_for_caller(ctx).await?;
    tracing::info!(room = %ctx.room_name, participant = %participant.identity, "Participant joined");

    let model = build_model(ctx);
    let media = ctx.session.open_media(&participant).await?;
    let conversation = launcher.launch(model, media, &participant);

    tracing::info!(room = %ctx.room_name, "Agent started, ready to handle conversation");
    Ok(conversation)
}

fn build_model(ctx: &JobContext) -> RealtimeModel {
    let settings = ctx.app.settings();
    RealtimeModel::builder()
        .voice(settings.voice)
        .instructions(SYSTEM_PROMPT)
        .api_key(settings.xai_api_key.clone())
        .model(settings.xai_model.clone())
        .url(settings.xai_realtime_url.clone())
        .build()
}

async fn wait_for_caller(ctx: &mut JobContext) -> Result<Participant> {
    let limit = ctx.app.settings().participant_timeout;
    let cancel = ctx.cancel.clone();
    let room = ctx.room_name.clone();
    let session = &mut ctx.session;

    let wait = async move {
        match limit {
            Some(limit) => tokio::time::timeout(limit, session.wait_for_participant())
                .await
                .map_err(|_| Error::NoCallerJoined { room, waited: limit })?,
            None => session.wait_for_participant().await,
        }
    };

    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled),
        result = wait => result,
    }
}
