//! Raw PCM passthrough
//!
//! The payload behind a waveform header is already unsigned 8-bit, so each
//! byte is one DAC sample. No resampling, no state.

use super::{DecodeOutput, FrameDecoder, PcmFrame};

/// Decoder for raw unsigned 8-bit PCM
#[derive(Debug, Clone)]
pub struct PassthroughDecoder {
    sample_rate: u32,
}

impl PassthroughDecoder {
    /// Create a passthrough decoder for a stream at `sample_rate`
    pub fn new(sample_rate: u32) -> Self {
        PassthroughDecoder { sample_rate }
    }
}

impl FrameDecoder for PassthroughDecoder {
    fn decode(&mut self, chunk: &[u8]) -> DecodeOutput {
        DecodeOutput {
            frame: PcmFrame::Unsigned8(chunk.to_vec()),
            consumed: chunk.len(),
            malformed: 0,
        }
    }

    fn reset(&mut self) {}

    fn sample_rate(&self) -> Option<u32> {
        Some(self.sample_rate)
    }

    fn name(&self) -> &str {
        "PCM Passthrough Decoder"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_map_one_to_one() {
        let mut decoder = PassthroughDecoder::new(44100);
        let chunk: Vec<u8> = (0..=255).collect();
        let out = decoder.decode(&chunk);
        assert_eq!(out.consumed, 256);
        assert_eq!(out.malformed, 0);
        assert_eq!(out.frame, PcmFrame::Unsigned8(chunk));
    }

    #[test]
    fn test_empty_chunk_is_empty_frame() {
        let mut decoder = PassthroughDecoder::new(8000);
        let out = decoder.decode(&[]);
        assert!(out.frame.is_empty());
        assert_eq!(out.consumed, 0);
        assert_eq!(decoder.sample_rate(), Some(8000));
    }
}
