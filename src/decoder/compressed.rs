//! Compressed frame decoder (MPEG audio Layer III)
//!
//! Frames are located with [`mpeg::find_frame`] and handed one at a time to
//! symphonia's MP3 codec, which carries the bit reservoir and synthesis
//! overlap from one frame to the next. Output is mono signed 16-bit; stereo
//! frames are averaged down.
//!
//! Chunk boundaries are storage-block boundaries, so a chunk may begin or
//! end inside a frame. Only complete frames are decoded; the
//! [`DecodeOutput::consumed`] count stops at the first incomplete one so the
//! caller can keep or drop the tail.

use super::mpeg::{self, FrameHeader, FrameSearch};
use super::{DecodeOutput, FrameDecoder, PcmFrame};
use crate::{PlaybackError, Result};
use symphonia::core::audio::{Channels, SampleBuffer};
use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions, CODEC_TYPE_MP3};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::Packet;

/// Stream context that must not outlive the stream it was built against
#[derive(Debug, Clone)]
struct DecoderState {
    /// Header of the most recently decoded frame
    stream: Option<FrameHeader>,
    /// Leading metadata bytes still to skip
    metadata_remaining: usize,
    /// No chunk large enough to hold a tag header has been seen yet
    at_stream_start: bool,
    /// The next chunk starts right after the last decoded frame
    in_sync: bool,
    /// Frames successfully decoded since the last reset
    frames_decoded: u64,
    /// Timestamp (in samples) of the next packet
    next_ts: u64,
}

impl DecoderState {
    fn new() -> Self {
        DecoderState {
            stream: None,
            metadata_remaining: 0,
            at_stream_start: true,
            in_sync: false,
            frames_decoded: 0,
            next_ts: 0,
        }
    }
}

/// Decoder for headerless MPEG audio Layer III bitstreams
pub struct CompressedFrameDecoder {
    codec: Option<Box<dyn Decoder>>,
    state: DecoderState,
}

impl CompressedFrameDecoder {
    /// Create a decoder with no stream context
    pub fn new() -> Self {
        CompressedFrameDecoder {
            codec: None,
            state: DecoderState::new(),
        }
    }

    /// Frames successfully decoded since the last reset
    pub fn frames_decoded(&self) -> u64 {
        self.state.frames_decoded
    }

    fn make_codec(header: &FrameHeader) -> Result<Box<dyn Decoder>> {
        let channels = if header.channels() == 1 {
            Channels::FRONT_LEFT
        } else {
            Channels::FRONT_LEFT | Channels::FRONT_RIGHT
        };

        let mut params = CodecParameters::new();
        params
            .for_codec(CODEC_TYPE_MP3)
            .with_sample_rate(header.sample_rate)
            .with_channels(channels);

        symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| PlaybackError::MalformedFrame(format!("no MP3 codec: {}", e)))
    }

    /// Skip an ID3v2 tag at the head of the stream
    fn skip_metadata(&mut self, chunk: &[u8]) -> usize {
        if self.state.at_stream_start && chunk.len() >= mpeg::ID3V2_HEADER_LEN {
            self.state.at_stream_start = false;
            if let Some(len) = mpeg::id3v2_len(chunk) {
                log::debug!("Skipping {} bytes of ID3v2 metadata", len);
                self.state.metadata_remaining = len;
            }
        }
        let skip = self.state.metadata_remaining.min(chunk.len());
        self.state.metadata_remaining -= skip;
        skip
    }

    fn decode_frame(
        &mut self,
        frame: &[u8],
        header: &FrameHeader,
        out: &mut Vec<i16>,
    ) -> Result<()> {
        if let Some(previous) = self.state.stream {
            if !previous.is_compatible(header) || previous.channels() != header.channels() {
                log::info!(
                    "Stream changed to {} Hz, {} channel(s); reinitialising codec",
                    header.sample_rate,
                    header.channels()
                );
                self.codec = None;
            }
        }
        if self.codec.is_none() {
            self.codec = Some(Self::make_codec(header)?);
        }
        let Some(codec) = self.codec.as_mut() else {
            return Err(PlaybackError::Other("MP3 codec unavailable".into()));
        };

        let duration = header.samples_per_frame() as u64;
        let packet = Packet::new_from_slice(0, self.state.next_ts, duration, frame);

        let decoded = match codec.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::ResetRequired) => {
                self.codec = None;
                return Err(PlaybackError::MalformedFrame("codec reset required".into()));
            }
            Err(e) => return Err(PlaybackError::MalformedFrame(e.to_string())),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        let mut pcm = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
        pcm.copy_interleaved_ref(decoded);

        out.extend(pcm.samples().chunks(channels).map(|frame| {
            let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
            (sum / channels as i32) as i16
        }));

        self.state.next_ts += duration;
        self.state.stream = Some(*header);
        Ok(())
    }
}

impl Default for CompressedFrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder for CompressedFrameDecoder {
    fn decode(&mut self, chunk: &[u8]) -> DecodeOutput {
        // Wait for enough bytes to tell whether a tag header is present
        if self.state.at_stream_start && chunk.len() < mpeg::ID3V2_HEADER_LEN {
            return DecodeOutput::nothing(0);
        }
        let mut pos = self.skip_metadata(chunk);
        let mut samples = Vec::new();
        let mut malformed = 0;
        let mut locked = if pos == 0 && self.state.in_sync {
            self.state.stream
        } else {
            None
        };

        loop {
            match mpeg::find_frame(&chunk[pos..], locked.as_ref()) {
                FrameSearch::Frame { offset, header } => {
                    let start = pos + offset;
                    let end = start + header.frame_len;
                    match self.decode_frame(&chunk[start..end], &header, &mut samples) {
                        Ok(()) => {
                            self.state.frames_decoded += 1;
                            locked = Some(header);
                        }
                        Err(e) => {
                            malformed += 1;
                            locked = None;
                            log::debug!("Skipping frame at chunk offset {}: {}", start, e);
                        }
                    }
                    pos = end;
                }
                FrameSearch::Partial { offset } => {
                    // The carried tail starts with this frame
                    self.state.in_sync = offset == 0 && locked.is_some();
                    pos += offset;
                    break;
                }
                FrameSearch::Lost { keep_from } => {
                    self.state.in_sync = keep_from == 0 && locked.is_some();
                    pos += keep_from;
                    break;
                }
            }
        }

        DecodeOutput {
            frame: PcmFrame::Signed16(samples),
            consumed: pos,
            malformed,
        }
    }

    fn reset(&mut self) {
        self.codec = None;
        self.state = DecoderState::new();
    }

    fn sample_rate(&self) -> Option<u32> {
        self.state.stream.map(|h| h.sample_rate)
    }

    fn discontinuity(&mut self) {
        self.state.in_sync = false;
    }

    fn name(&self) -> &str {
        "MPEG Layer III Frame Decoder"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::mpeg::tests::{frame_bytes, HEADER_128K_MONO};

    fn silent_stream(frames: usize) -> Vec<u8> {
        let mut data = Vec::new();
        for _ in 0..frames {
            data.extend(frame_bytes(HEADER_128K_MONO));
        }
        data
    }

    #[test]
    fn test_zero_chunk_yields_nothing() {
        let mut decoder = CompressedFrameDecoder::new();
        let out = decoder.decode(&[0u8; 512]);
        assert!(out.frame.is_empty());
        assert_eq!(out.malformed, 0);
        assert_eq!(out.consumed, 509);
        assert_eq!(decoder.sample_rate(), None);
    }

    #[test]
    fn test_partial_frame_not_consumed() {
        let mut decoder = CompressedFrameDecoder::new();
        let data = silent_stream(1);
        let out = decoder.decode(&data[..300]);
        assert!(out.frame.is_empty());
        assert_eq!(out.consumed, 0);
    }

    #[test]
    fn test_decode_silent_frames() {
        let mut decoder = CompressedFrameDecoder::new();
        let data = silent_stream(3);
        let out = decoder.decode(&data);

        assert_eq!(out.consumed, data.len());
        assert_eq!(out.malformed, 0);
        assert_eq!(out.frame.len(), 3 * 1152);
        assert!(out.frame.dac_samples().all(|s| s == 128));
        assert_eq!(decoder.sample_rate(), Some(44100));
        assert_eq!(decoder.frames_decoded(), 3);
    }

    #[test]
    fn test_leading_metadata_skipped() {
        let mut data = b"ID3\x03\x00\x00\x00\x00\x00\x20".to_vec();
        // Tag body containing a stray sync pattern
        let mut body = vec![0u8; 32];
        body[4..8].copy_from_slice(&HEADER_128K_MONO);
        data.extend(body);
        data.extend(silent_stream(2));

        let mut decoder = CompressedFrameDecoder::new();
        let out = decoder.decode(&data);
        assert_eq!(out.frame.len(), 2 * 1152);
        assert_eq!(out.consumed, data.len());
    }

    #[test]
    fn test_metadata_spanning_chunks() {
        let mut data = b"ID3\x03\x00\x00\x00\x00\x01\x00".to_vec();
        data.extend(vec![0xFFu8; 128]);
        data.extend(silent_stream(1));

        let mut decoder = CompressedFrameDecoder::new();
        let first = decoder.decode(&data[..64]);
        assert_eq!(first.consumed, 64);
        assert!(first.frame.is_empty());

        let second = decoder.decode(&data[64..]);
        assert_eq!(second.frame.len(), 1152);
    }

    #[test]
    fn test_short_first_chunk_waits_for_tag_header() {
        let mut decoder = CompressedFrameDecoder::new();
        let out = decoder.decode(b"ID3\x04");
        assert_eq!(out.consumed, 0);
        assert!(out.frame.is_empty());
    }

    #[test]
    fn test_last_frame_before_id3v1_trailer() {
        let mut data = silent_stream(3);
        data.extend_from_slice(b"TAG");
        data.extend(vec![0u8; 125]);

        let mut decoder = CompressedFrameDecoder::new();
        let out = decoder.decode(&data);
        assert_eq!(out.frame.len(), 3 * 1152);
        assert_eq!(out.malformed, 0);
    }

    #[test]
    fn test_carried_frame_followed_by_garbage() {
        let mut data = silent_stream(3);
        data.extend_from_slice(&[0x00; 8]);

        let mut decoder = CompressedFrameDecoder::new();
        let first = decoder.decode(&data[..2 * 417 + 100]);
        assert_eq!(first.frame.len(), 2 * 1152);
        assert_eq!(first.consumed, 2 * 417);

        let second = decoder.decode(&data[first.consumed..]);
        assert_eq!(second.frame.len(), 1152);
        assert_eq!(second.consumed, 417 + 8 - 3);
    }

    #[test]
    fn test_discontinuity_drops_stream_lock() {
        let mut data = silent_stream(3);
        data.extend_from_slice(&[0x00; 8]);

        let mut decoder = CompressedFrameDecoder::new();
        decoder.decode(&data[..2 * 417 + 100]);
        decoder.discontinuity();

        let out = decoder.decode(&data[2 * 417..]);
        assert!(out.frame.is_empty());
    }

    #[test]
    fn test_reset_restores_initial_behaviour() {
        let data = silent_stream(2);
        let mut decoder = CompressedFrameDecoder::new();
        let first = decoder.decode(&data);

        decoder.reset();
        assert_eq!(decoder.sample_rate(), None);
        assert_eq!(decoder.frames_decoded(), 0);

        let second = decoder.decode(&data);
        assert_eq!(first, second);
    }
}
