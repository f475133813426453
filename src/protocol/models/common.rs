use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Realtime endpoint of the xAI voice API.
pub const DEFAULT_REALTIME_URL: &str = "wss://api.x.ai/v1/realtime";

/// Free-form JSON payloads where the API is open-ended.
pub type ArbitraryJson = Value;

/// Synthesized voice presets offered by the speech-to-speech provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Voice {
    Ara,
    #[default]
    Cove,
    Eve,
    Leo,
    Maple,
    Rex,
    Sage,
    Sal,
}

impl Voice {
    pub const ALL: [Self; 8] = [
        Self::Ara,
        Self::Cove,
        Self::Eve,
        Self::Leo,
        Self::Maple,
        Self::Rex,
        Self::Sage,
        Self::Sal,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ara => "Ara",
            Self::Cove => "Cove",
            Self::Eve => "Eve",
            Self::Leo => "Leo",
            Self::Maple => "Maple",
            Self::Rex => "Rex",
            Self::Sage => "Sage",
            Self::Sal => "Sal",
        }
    }
}

impl std::fmt::Display for Voice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVoice(pub String);

impl std::fmt::Display for UnknownVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let known: Vec<&str> = Voice::ALL.iter().map(|v| v.as_str()).collect();
        write!(f, "unknown voice {:?}, expected one of: {}", self.0, known.join(", "))
    }
}

impl std::error::Error for UnknownVoice {}

impl FromStr for Voice {
    type Err = UnknownVoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|voice| voice.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownVoice(s.to_string()))
    }
}
