//! The conversation agent that bridges call audio and the realtime model.

pub mod audio;
mod bridge;

use std::future::Future;

use tokio::task::JoinHandle;

use crate::model::RealtimeModel;
use crate::room::{MediaPorts, Participant};
use crate::{Error, Result};

/// Starts a conversation for a call. The production implementation is
/// [`RealtimeLauncher`]; tests substitute a recorder.
pub trait AgentLauncher: Send + Sync {
    fn launch(
        &self,
        model: RealtimeModel,
        media: MediaPorts,
        participant: &Participant,
    ) -> ConversationHandle;
}

/// Launches a [`MultimodalAgent`] per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealtimeLauncher;

impl AgentLauncher for RealtimeLauncher {
    fn launch(
        &self,
        model: RealtimeModel,
        media: MediaPorts,
        participant: &Participant,
    ) -> ConversationHandle {
        MultimodalAgent::new(model).start(media, participant)
    }
}

/// Speech-to-speech agent bound to one model configuration.
#[derive(Debug, Clone)]
pub struct MultimodalAgent {
    model: RealtimeModel,
}

impl MultimodalAgent {
    #[must_use]
    pub const fn new(model: RealtimeModel) -> Self {
        Self { model }
    }

    /// Begin conversing with `participant` over `media`.
    ///
    /// Returns immediately; the conversation runs on its own task. Connection
    /// failures, including a missing API key, are reported through
    /// [`ConversationHandle::wait`].
    pub fn start(self, media: MediaPorts, participant: &Participant) -> ConversationHandle {
        tracing::info!(
            participant = %participant.identity,
            voice = %self.model.voice(),
            "Starting agent"
        );
        ConversationHandle::spawn(bridge::run(self.model, media, participant.clone()))
    }
}

/// A running conversation.
#[derive(Debug)]
#[must_use = "dropping the handle detaches the conversation"]
pub struct ConversationHandle {
    task: JoinHandle<Result<()>>,
}

impl ConversationHandle {
    /// Run `conversation` on a new task.
    pub fn spawn<F>(conversation: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            task: tokio::spawn(conversation),
        }
    }

    /// Wait for the conversation to end. Call at most once.
    ///
    /// # Errors
    /// Returns the conversation's error, [`Error::Cancelled`] if it was
    /// aborted, or [`Error::TaskFailed`] if it panicked.
    pub async fn wait(&mut self) -> Result<()> {
        match (&mut self.task).await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Err(Error::Cancelled),
            Err(err) => Err(Error::TaskFailed(err.to_string())),
        }
    }

    /// Stop the conversation.
    pub fn abort(&self) {
        self.task.abort();
    }
}
