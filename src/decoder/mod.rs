//! Frame Decoders
//!
//! A decoder turns one chunk of storage bytes into zero or more PCM samples.
//! Two variants share the [`FrameDecoder`] trait:
//! - [`PassthroughDecoder`]: raw 8-bit PCM, bytes map one-to-one to samples
//! - `CompressedFrameDecoder` (feature `compressed`): MPEG audio Layer III
//!   frames located by [`mpeg`] sync scanning and decoded to signed 16-bit

#[cfg(feature = "compressed")]
pub mod compressed;
pub mod mpeg;
pub mod passthrough;

pub use passthrough::PassthroughDecoder;

/// Samples produced by one decode call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PcmFrame {
    /// Unsigned 8-bit samples, already in the DAC's range
    Unsigned8(Vec<u8>),
    /// Signed 16-bit samples, rescaled on output
    Signed16(Vec<i16>),
}

impl PcmFrame {
    /// An empty frame
    pub fn empty() -> Self {
        PcmFrame::Unsigned8(Vec::new())
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        match self {
            PcmFrame::Unsigned8(s) => s.len(),
            PcmFrame::Signed16(s) => s.len(),
        }
    }

    /// Whether the frame carries no samples
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate the samples as DAC values
    pub fn dac_samples(&self) -> DacSamples<'_> {
        match self {
            PcmFrame::Unsigned8(s) => DacSamples::Unsigned8(s.iter()),
            PcmFrame::Signed16(s) => DacSamples::Signed16(s.iter()),
        }
    }
}

/// Iterator over a frame's samples in the DAC's unsigned 8-bit range
#[derive(Debug, Clone)]
pub enum DacSamples<'a> {
    /// Passed through unchanged
    Unsigned8(std::slice::Iter<'a, u8>),
    /// Rescaled with [`rescale_i16`]
    Signed16(std::slice::Iter<'a, i16>),
}

impl Iterator for DacSamples<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        match self {
            DacSamples::Unsigned8(it) => it.next().copied(),
            DacSamples::Signed16(it) => it.next().map(|&s| rescale_i16(s)),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            DacSamples::Unsigned8(it) => it.size_hint(),
            DacSamples::Signed16(it) => it.size_hint(),
        }
    }
}

/// Map a signed 16-bit sample onto the DAC's 0..=255 range
///
/// `(sample + 32768) >> 8`
#[inline]
pub fn rescale_i16(sample: i16) -> u8 {
    ((i32::from(sample) + 32768) >> 8) as u8
}

/// Result of one decode call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOutput {
    /// Decoded samples (possibly empty)
    pub frame: PcmFrame,
    /// Leading bytes of the chunk the decoder is finished with
    ///
    /// Covers emitted frames, skipped metadata and skipped garbage. Bytes past
    /// this point belong to a frame that has not fully arrived yet.
    pub consumed: usize,
    /// Frames that were located but failed to decode and were skipped
    pub malformed: usize,
}

impl DecodeOutput {
    /// Output carrying no samples
    pub fn nothing(consumed: usize) -> Self {
        DecodeOutput {
            frame: PcmFrame::empty(),
            consumed,
            malformed: 0,
        }
    }
}

/// A chunk-oriented PCM decoder
pub trait FrameDecoder {
    /// Decode one chunk
    ///
    /// Never fails: undecodable input yields fewer (or zero) samples and is
    /// counted in [`DecodeOutput::malformed`].
    fn decode(&mut self, chunk: &[u8]) -> DecodeOutput;

    /// Drop all carried stream state
    ///
    /// Must be called whenever the source is reopened or the read cursor
    /// moves backwards.
    fn reset(&mut self);

    /// Sample rate of the decoded stream, once known
    fn sample_rate(&self) -> Option<u32>;

    /// Bytes were dropped between the previous chunk and the next one
    fn discontinuity(&mut self) {}

    /// Get decoder name
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rescale_bounds() {
        assert_eq!(rescale_i16(i16::MIN), 0);
        assert_eq!(rescale_i16(-1), 127);
        assert_eq!(rescale_i16(0), 128);
        assert_eq!(rescale_i16(255), 128);
        assert_eq!(rescale_i16(256), 129);
        assert_eq!(rescale_i16(i16::MAX), 255);
    }

    #[test]
    fn test_rescale_is_monotonic() {
        let mut previous = 0u8;
        for s in (i16::MIN..=i16::MAX).step_by(97) {
            let v = rescale_i16(s);
            assert!(v >= previous);
            previous = v;
        }
    }

    #[test]
    fn test_dac_samples_passthrough_and_rescale() {
        let raw = PcmFrame::Unsigned8(vec![0, 7, 255]);
        assert_eq!(raw.dac_samples().collect::<Vec<_>>(), vec![0, 7, 255]);

        let wide = PcmFrame::Signed16(vec![i16::MIN, 0, i16::MAX]);
        assert_eq!(wide.dac_samples().collect::<Vec<_>>(), vec![0, 128, 255]);
        assert_eq!(wide.len(), 3);
    }

    #[test]
    fn test_empty_frame() {
        assert!(PcmFrame::empty().is_empty());
        assert_eq!(DecodeOutput::nothing(5).consumed, 5);
    }
}
