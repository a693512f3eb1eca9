//! MPEG audio Layer III frame headers and sync scanning
//!
//! A frame starts with an 11-bit sync word followed by version, layer,
//! bitrate and sample-rate fields. The frame length follows from those
//! fields, which is enough to walk a bitstream frame by frame without
//! decoding it:
//!
//! - MPEG-1: `144 * bitrate / sample_rate + padding`, 1152 samples
//! - MPEG-2 / 2.5: `72 * bitrate / sample_rate + padding`, 576 samples
//!
//! Free-format bitrates are not supported.

/// Length of a frame header in bytes
pub const HEADER_LEN: usize = 4;

/// Largest possible Layer III frame (MPEG-1, 320 kbit/s, 32 kHz, padded)
pub const MAX_FRAME_LEN: usize = 1441;

/// Length of an ID3v2 tag header
pub const ID3V2_HEADER_LEN: usize = 10;

const BITRATES_V1_L3: [u32; 15] = [
    0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320,
];
const BITRATES_V2_L3: [u32; 15] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

/// MPEG version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    /// MPEG-1
    Mpeg1,
    /// MPEG-2 (LSF)
    Mpeg2,
    /// MPEG-2.5
    Mpeg25,
}

/// Channel mode field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    /// Stereo
    Stereo,
    /// Joint stereo
    JointStereo,
    /// Dual channel
    DualChannel,
    /// Single channel
    Mono,
}

/// Decoded Layer III frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// MPEG version
    pub version: MpegVersion,
    /// Bitrate in kbit/s
    pub bitrate_kbps: u32,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Padding slot present
    pub padding: bool,
    /// CRC follows the header
    pub crc_protected: bool,
    /// Channel mode
    pub channel_mode: ChannelMode,
    /// Total frame length in bytes, header included
    pub frame_len: usize,
}

impl FrameHeader {
    /// Parse four header bytes
    ///
    /// Returns `None` for anything that is not a Layer III header with a
    /// concrete bitrate and sample rate.
    pub fn parse(bytes: &[u8]) -> Option<FrameHeader> {
        if bytes.len() < HEADER_LEN {
            return None;
        }
        let word = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);

        if word >> 21 != 0x7FF {
            return None;
        }

        let version = match (word >> 19) & 0b11 {
            0b00 => MpegVersion::Mpeg25,
            0b10 => MpegVersion::Mpeg2,
            0b11 => MpegVersion::Mpeg1,
            _ => return None,
        };

        // Layer III only
        if (word >> 17) & 0b11 != 0b01 {
            return None;
        }

        let crc_protected = (word >> 16) & 1 == 0;

        let bitrate_index = ((word >> 12) & 0xF) as usize;
        if bitrate_index == 0 || bitrate_index == 15 {
            return None;
        }
        let bitrate_kbps = match version {
            MpegVersion::Mpeg1 => BITRATES_V1_L3[bitrate_index],
            MpegVersion::Mpeg2 | MpegVersion::Mpeg25 => BITRATES_V2_L3[bitrate_index],
        };

        let rate_index = ((word >> 10) & 0b11) as usize;
        let base_rate = match rate_index {
            0 => 44100,
            1 => 48000,
            2 => 32000,
            _ => return None,
        };
        let sample_rate = match version {
            MpegVersion::Mpeg1 => base_rate,
            MpegVersion::Mpeg2 => base_rate / 2,
            MpegVersion::Mpeg25 => base_rate / 4,
        };

        let padding = (word >> 9) & 1 == 1;

        let channel_mode = match (word >> 6) & 0b11 {
            0b00 => ChannelMode::Stereo,
            0b01 => ChannelMode::JointStereo,
            0b10 => ChannelMode::DualChannel,
            _ => ChannelMode::Mono,
        };

        let slots = match version {
            MpegVersion::Mpeg1 => 144,
            MpegVersion::Mpeg2 | MpegVersion::Mpeg25 => 72,
        };
        let frame_len = (slots * bitrate_kbps * 1000 / sample_rate) as usize + usize::from(padding);

        Some(FrameHeader {
            version,
            bitrate_kbps,
            sample_rate,
            padding,
            crc_protected,
            channel_mode,
            frame_len,
        })
    }

    /// PCM samples per channel produced by this frame
    pub fn samples_per_frame(&self) -> usize {
        match self.version {
            MpegVersion::Mpeg1 => 1152,
            MpegVersion::Mpeg2 | MpegVersion::Mpeg25 => 576,
        }
    }

    /// Number of encoded channels
    pub fn channels(&self) -> usize {
        match self.channel_mode {
            ChannelMode::Mono => 1,
            _ => 2,
        }
    }

    /// Whether `other` can follow this header in the same stream
    pub fn is_compatible(&self, other: &FrameHeader) -> bool {
        self.version == other.version && self.sample_rate == other.sample_rate
    }
}

/// Outcome of scanning a byte slice for the next frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSearch {
    /// A complete frame starts at `offset`
    Frame {
        /// Start of the frame
        offset: usize,
        /// Its header
        header: FrameHeader,
    },
    /// A frame starts at `offset` but its tail has not arrived yet
    Partial {
        /// Start of the frame
        offset: usize,
    },
    /// No frame start found; bytes before `keep_from` are garbage
    Lost {
        /// First byte that could still begin a header
        keep_from: usize,
    },
}

/// Marker of an ID3v1 tag trailing the last frame
pub const ID3V1_MARKER: &[u8; 3] = b"TAG";

/// Find the next frame in `data`
///
/// A candidate header is accepted only if the bytes at its end either run out
/// or hold another compatible header, which rejects most false syncs inside
/// corrupt data. Two cases skip that check:
///
/// - `data` starts right where a frame with header `locked` ended and the
///   candidate sits at offset 0 and is compatible with it
/// - the candidate is followed by an ID3v1 trailer
pub fn find_frame(data: &[u8], locked: Option<&FrameHeader>) -> FrameSearch {
    let mut pos = 0;
    while pos + HEADER_LEN <= data.len() {
        if data[pos] != 0xFF || data[pos + 1] & 0xE0 != 0xE0 {
            pos += 1;
            continue;
        }
        let Some(header) = FrameHeader::parse(&data[pos..]) else {
            pos += 1;
            continue;
        };

        let end = pos + header.frame_len;
        if end > data.len() {
            return FrameSearch::Partial { offset: pos };
        }
        if end + HEADER_LEN <= data.len() {
            let confirmed = match FrameHeader::parse(&data[end..]) {
                Some(next) => header.is_compatible(&next),
                None => false,
            };
            let continues = pos == 0 && locked.is_some_and(|prev| prev.is_compatible(&header));
            if !confirmed && !continues && !data[end..].starts_with(ID3V1_MARKER) {
                pos += 1;
                continue;
            }
        }
        return FrameSearch::Frame {
            offset: pos,
            header,
        };
    }
    FrameSearch::Lost {
        keep_from: data.len().saturating_sub(HEADER_LEN - 1),
    }
}

/// Total size of an ID3v2 tag at the start of `data`, if one is present
///
/// Needs the 10-byte tag header; the tag body may extend past `data`.
pub fn id3v2_len(data: &[u8]) -> Option<usize> {
    if data.len() < ID3V2_HEADER_LEN || &data[0..3] != b"ID3" {
        return None;
    }
    let size_bytes = &data[6..10];
    if size_bytes.iter().any(|b| b & 0x80 != 0) {
        return None;
    }
    let size = size_bytes
        .iter()
        .fold(0usize, |acc, &b| (acc << 7) | usize::from(b));
    let footer = if data[5] & 0x10 != 0 {
        ID3V2_HEADER_LEN
    } else {
        0
    };
    Some(ID3V2_HEADER_LEN + size + footer)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// MPEG-1 Layer III, 128 kbit/s, 44.1 kHz, mono, no CRC
    pub(crate) const HEADER_128K_MONO: [u8; 4] = [0xFF, 0xFB, 0x90, 0xC0];

    pub(crate) fn frame_bytes(header: [u8; 4]) -> Vec<u8> {
        let parsed = FrameHeader::parse(&header).unwrap();
        let mut frame = vec![0u8; parsed.frame_len];
        frame[..4].copy_from_slice(&header);
        frame
    }

    #[test]
    fn test_parse_128k_mono() {
        let header = FrameHeader::parse(&HEADER_128K_MONO).unwrap();
        assert_eq!(header.version, MpegVersion::Mpeg1);
        assert_eq!(header.bitrate_kbps, 128);
        assert_eq!(header.sample_rate, 44100);
        assert_eq!(header.channel_mode, ChannelMode::Mono);
        assert!(!header.crc_protected);
        assert!(!header.padding);
        assert_eq!(header.frame_len, 417);
        assert_eq!(header.samples_per_frame(), 1152);
        assert_eq!(header.channels(), 1);
    }

    #[test]
    fn test_parse_padding_and_mpeg2() {
        // MPEG-2, 64 kbit/s, 22.05 kHz, padded, joint stereo
        let header = FrameHeader::parse(&[0xFF, 0xF3, 0x82, 0x40]).unwrap();
        assert_eq!(header.version, MpegVersion::Mpeg2);
        assert_eq!(header.sample_rate, 22050);
        assert_eq!(header.bitrate_kbps, 64);
        assert!(header.padding);
        assert_eq!(header.frame_len, 72 * 64000 / 22050 + 1);
        assert_eq!(header.samples_per_frame(), 576);
        assert_eq!(header.channels(), 2);
    }

    #[test]
    fn test_reject_invalid_headers() {
        assert!(FrameHeader::parse(&[0x00, 0x00, 0x00, 0x00]).is_none());
        // Layer I
        assert!(FrameHeader::parse(&[0xFF, 0xFF, 0x90, 0xC0]).is_none());
        // Free-format bitrate
        assert!(FrameHeader::parse(&[0xFF, 0xFB, 0x00, 0xC0]).is_none());
        // Reserved sample rate
        assert!(FrameHeader::parse(&[0xFF, 0xFB, 0x9C, 0xC0]).is_none());
        // Reserved version
        assert!(FrameHeader::parse(&[0xFF, 0xEB, 0x90, 0xC0]).is_none());
        assert!(FrameHeader::parse(&[0xFF, 0xFB]).is_none());
    }

    #[test]
    fn test_max_frame_len() {
        // MPEG-1, 320 kbit/s, 32 kHz, padded
        let header = FrameHeader::parse(&[0xFF, 0xFB, 0xEA, 0xC0]).unwrap();
        assert_eq!(header.frame_len, MAX_FRAME_LEN);
    }

    #[test]
    fn test_find_frame_after_garbage() {
        let mut data = vec![0x12u8, 0x34, 0xFF, 0x00, 0x56];
        let garbage = data.len();
        data.extend(frame_bytes(HEADER_128K_MONO));
        data.extend(frame_bytes(HEADER_128K_MONO));

        match find_frame(&data, None) {
            FrameSearch::Frame { offset, header } => {
                assert_eq!(offset, garbage);
                assert_eq!(header.frame_len, 417);
            }
            other => panic!("expected frame, got {:?}", other),
        }
    }

    #[test]
    fn test_find_partial_frame() {
        let frame = frame_bytes(HEADER_128K_MONO);
        assert_eq!(find_frame(&frame[..200], None), FrameSearch::Partial { offset: 0 });
    }

    #[test]
    fn test_find_nothing_in_zeros() {
        let zeros = vec![0u8; 512];
        assert_eq!(find_frame(&zeros, None), FrameSearch::Lost { keep_from: 509 });
        assert_eq!(find_frame(&[0u8; 2], None), FrameSearch::Lost { keep_from: 0 });
    }

    #[test]
    fn test_false_sync_rejected() {
        // A valid-looking header whose successor position holds garbage
        let mut data = frame_bytes(HEADER_128K_MONO);
        data.extend_from_slice(&[0x00; 8]);
        match find_frame(&data, None) {
            FrameSearch::Lost { .. } => {}
            other => panic!("expected lost sync, got {:?}", other),
        }
    }

    #[test]
    fn test_frame_before_id3v1_trailer() {
        let mut data = frame_bytes(HEADER_128K_MONO);
        data.extend_from_slice(b"TAG");
        data.extend_from_slice(&[0x00; 125]);
        match find_frame(&data, None) {
            FrameSearch::Frame { offset, .. } => assert_eq!(offset, 0),
            other => panic!("expected frame, got {:?}", other),
        }
    }

    #[test]
    fn test_frame_continuing_locked_stream() {
        let locked = FrameHeader::parse(&HEADER_128K_MONO).unwrap();
        let mut data = frame_bytes(HEADER_128K_MONO);
        data.extend_from_slice(&[0x00; 8]);

        match find_frame(&data, Some(&locked)) {
            FrameSearch::Frame { offset, .. } => assert_eq!(offset, 0),
            other => panic!("expected frame, got {:?}", other),
        }
        // The lock only covers a frame at the start of the slice
        let mut shifted = vec![0x00];
        shifted.extend_from_slice(&data);
        assert_eq!(
            find_frame(&shifted, Some(&locked)),
            FrameSearch::Lost { keep_from: shifted.len() - 3 }
        );
    }

    #[test]
    fn test_id3v2_len() {
        let mut tag = b"ID3\x04\x00\x00\x00\x00\x02\x01".to_vec();
        tag.extend(vec![0u8; 257]);
        assert_eq!(id3v2_len(&tag), Some(10 + 257));
        assert_eq!(id3v2_len(b"ID3"), None);
        assert_eq!(id3v2_len(&HEADER_128K_MONO), None);
    }
}
