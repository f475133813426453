use base64::Engine as _;
use base64::engine::general_purpose;

use crate::room::{AudioFrame, FRAME_SAMPLES};

/// Base64 of PCM16 little-endian samples, as `input_audio_buffer.append` expects.
#[must_use]
pub fn encode_pcm16(samples: &[i16]) -> String {
    let mut buf = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        buf.extend_from_slice(&sample.to_le_bytes());
    }
    general_purpose::STANDARD.encode(buf)
}

/// Decode a base64 PCM16 little-endian payload. A dangling odd byte is dropped.
///
/// # Errors
/// Returns an error if the payload is not valid base64.
pub fn decode_pcm16(payload: &str) -> Result<Vec<i16>, base64::DecodeError> {
    let bytes = general_purpose::STANDARD.decode(payload)?;
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Split model audio into 10 ms playout frames; the last frame may be short.
pub fn playout_frames(samples: &[i16]) -> impl Iterator<Item = AudioFrame> + '_ {
    samples.chunks(FRAME_SAMPLES).map(<[i16]>::to_vec)
}

/// Coalesces small transport frames into larger appends.
#[derive(Debug)]
pub struct InputBatcher {
    buf: Vec<i16>,
    target: usize,
}

impl InputBatcher {
    #[must_use]
    pub fn new(target: usize) -> Self {
        Self {
            buf: Vec::with_capacity(target),
            target,
        }
    }

    /// Buffer `samples`; returns a batch once at least `target` samples are held.
    pub fn push(&mut self, samples: &[i16]) -> Option<AudioFrame> {
        self.buf.extend_from_slice(samples);
        if self.buf.len() >= self.target {
            Some(std::mem::replace(&mut self.buf, Vec::with_capacity(self.target)))
        } else {
            None
        }
    }

    /// Whatever is buffered, if anything.
    pub fn flush(&mut self) -> Option<AudioFrame> {
        if self.buf.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buf))
        }
    }
}
