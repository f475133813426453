use std::sync::Arc;

use crate::client::RealtimeClient;
use crate::protocol::models::{AudioConfig, DEFAULT_REALTIME_URL, SessionUpdate, TurnDetection, Voice};
use crate::{Error, Result};

/// Configured handle to the remote speech-to-speech model.
///
/// Building one performs no validation and no I/O. A missing API key only
/// surfaces as [`Error::MissingApiKey`] when [`RealtimeModel::connect`] runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeModel {
    voice: Voice,
    instructions: Arc<str>,
    api_key: Option<String>,
    model: Option<String>,
    url: String,
}

impl RealtimeModel {
    #[must_use]
    pub fn builder() -> RealtimeModelBuilder {
        RealtimeModelBuilder::new()
    }

    #[must_use]
    pub const fn voice(&self) -> Voice {
        self.voice
    }

    #[must_use]
    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The `session.update` payload that configures the remote session.
    #[must_use]
    pub fn session_update(&self) -> SessionUpdate {
        SessionUpdate {
            instructions: Some(self.instructions.to_string()),
            voice: Some(self.voice),
            turn_detection: Some(TurnDetection::server_vad()),
            audio: Some(AudioConfig::pcm_24khz()),
        }
    }

    /// Open a realtime connection with this configuration's credential.
    ///
    /// # Errors
    /// Returns [`Error::MissingApiKey`] when no key was configured, or the
    /// transport error if the handshake fails.
    pub async fn connect(&self) -> Result<RealtimeClient> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(Error::MissingApiKey)?;
        RealtimeClient::connect(api_key, &self.url, self.model.as_deref()).await
    }
}

pub struct RealtimeModelBuilder {
    voice: Voice,
    instructions: Option<Arc<str>>,
    api_key: Option<String>,
    model: Option<String>,
    url: Option<String>,
}

impl RealtimeModelBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            voice: Voice::default(),
            instructions: None,
            api_key: None,
            model: None,
            url: None,
        }
    }

    #[must_use]
    pub const fn voice(mut self, voice: Voice) -> Self {
        self.voice = voice;
        self
    }

    #[must_use]
    pub fn instructions(mut self, instructions: impl Into<Arc<str>>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    #[must_use]
    pub fn api_key(mut self, key: Option<impl Into<String>>) -> Self {
        self.api_key = key.map(Into::into);
        self
    }

    #[must_use]
    pub fn model(mut self, model: Option<impl Into<String>>) -> Self {
        self.model = model.map(Into::into);
        self
    }

    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    #[must_use]
    pub fn build(self) -> RealtimeModel {
        RealtimeModel {
            voice: self.voice,
            instructions: self.instructions.unwrap_or_else(|| Arc::from("")),
            api_key: self.api_key,
            model: self.model,
            url: self.url.unwrap_or_else(|| DEFAULT_REALTIME_URL.to_string()),
        }
    }
}

impl Default for RealtimeModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}
