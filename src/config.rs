//! Process configuration read from environment variables.
//!
//! `main` loads a `.env` file first (if present), so real environment
//! variables override `.env` values. Credentials for the model and the
//! database are optional here: a missing `XAI_API_KEY` only fails when a call
//! first talks to the model.

use std::net::SocketAddr;
use std::time::Duration;

use crate::protocol::models::{DEFAULT_REALTIME_URL, Voice};
use crate::{Error, Result};

pub const DEFAULT_LIVEKIT_URL: &str = "ws://localhost:7880";
pub const DEFAULT_AGENT_IDENTITY: &str = "luxapts-agent";
pub const DEFAULT_PARTICIPANT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_WEBHOOK_ADDR: &str = "0.0.0.0:8081";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub livekit_url: String,
    pub livekit_api_key: String,
    pub livekit_api_secret: String,
    pub xai_api_key: Option<String>,
    pub xai_realtime_url: String,
    pub xai_model: Option<String>,
    pub voice: Voice,
    pub agent_identity: String,
    /// `None` waits for a caller indefinitely.
    pub participant_timeout: Option<Duration>,
    pub supabase_url: String,
    pub supabase_service_role_key: String,
    pub webhook_addr: SocketAddr,
}

impl Settings {
    /// Read settings from the process environment.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if a variable is present but malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`. Empty values count as unset.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if a variable is present but malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let voice = match get("AGENT_VOICE") {
            Some(raw) => raw
                .parse::<Voice>()
                .map_err(|err| Error::Config(format!("AGENT_VOICE: {err}")))?,
            None => Voice::default(),
        };

        let participant_timeout = match get("PARTICIPANT_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw.parse::<u64>().map_err(|err| {
                    Error::Config(format!("PARTICIPANT_TIMEOUT_SECS={raw:?}: {err}"))
                })?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => Some(DEFAULT_PARTICIPANT_TIMEOUT),
        };

        let webhook_addr = get("WEBHOOK_ADDR")
            .unwrap_or_else(|| DEFAULT_WEBHOOK_ADDR.to_string());
        let webhook_addr = webhook_addr
            .parse::<SocketAddr>()
            .map_err(|err| Error::Config(format!("WEBHOOK_ADDR={webhook_addr:?}: {err}")))?;

        Ok(Self {
            livekit_url: get("LIVEKIT_URL").unwrap_or_else(|| DEFAULT_LIVEKIT_URL.to_string()),
            livekit_api_key: get("LIVEKIT_API_KEY").unwrap_or_default(),
            livekit_api_secret: get("LIVEKIT_API_SECRET").unwrap_or_default(),
            xai_api_key: get("XAI_API_KEY"),
            xai_realtime_url: get("XAI_REALTIME_URL")
                .unwrap_or_else(|| DEFAULT_REALTIME_URL.to_string()),
            xai_model: get("XAI_REALTIME_MODEL"),
            voice,
            agent_identity: get("AGENT_IDENTITY")
                .unwrap_or_else(|| DEFAULT_AGENT_IDENTITY.to_string()),
            participant_timeout,
            supabase_url: get("SUPABASE_URL").unwrap_or_default(),
            supabase_service_role_key: get("SUPABASE_SERVICE_ROLE_KEY").unwrap_or_default(),
            webhook_addr,
        })
    }

    /// Fail if the LiveKit credentials needed to join rooms are missing.
    ///
    /// # Errors
    /// Returns [`Error::Config`] naming the first missing variable.
    pub fn require_livekit(&self) -> Result<()> {
        if self.livekit_api_key.is_empty() {
            return Err(Error::Config("LIVEKIT_API_KEY is not set".to_string()));
        }
        if self.livekit_api_secret.is_empty() {
            return Err(Error::Config("LIVEKIT_API_SECRET is not set".to_string()));
        }
        Ok(())
    }
}
