pub mod audio;
pub mod common;
pub mod response;
pub mod session;

pub use audio::{
    AudioConfig, AudioFormat, InputAudioConfig, OutputAudioConfig, PCM_SAMPLE_RATE, TurnDetection,
};
pub use common::{ArbitraryJson, DEFAULT_REALTIME_URL, UnknownVoice, Voice};
pub use response::{Response, ResponseStatus};
pub use session::{Session, SessionUpdate};
