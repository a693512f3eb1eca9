//! Waveform header validation
//!
//! Raw-PCM sources carry the canonical 44-byte RIFF/WAVE header:
//!
//! | Offset | Size | Field |
//! |---|---|---|
//! | 0 | 4 | `RIFF` |
//! | 4 | 4 | RIFF chunk size |
//! | 8 | 4 | `WAVE` |
//! | 12 | 4 | `fmt ` |
//! | 16 | 4 | fmt chunk size (16) |
//! | 20 | 2 | format tag (1 = PCM) |
//! | 22 | 2 | channels |
//! | 24 | 4 | sample rate |
//! | 28 | 4 | byte rate |
//! | 32 | 2 | block align |
//! | 34 | 2 | bits per sample |
//! | 36 | 4 | `data` |
//! | 40 | 4 | data length |
//!
//! All integers are little-endian. The PCM payload starts at byte 44.

use crate::{PlaybackError, Result};
use nom::bytes::complete::{tag, take};
use nom::number::complete::{le_u16, le_u32};
use nom::sequence::tuple;
use nom::IResult;

/// Size of the canonical waveform header
pub const WAV_HEADER_SIZE: usize = 44;

/// Format tag for uncompressed integer PCM
pub const WAVE_FORMAT_PCM: u16 = 0x0001;

/// Parsed waveform header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    /// Format tag (offset 20)
    pub format_tag: u16,
    /// Channel count
    pub channels: u16,
    /// Sample rate in Hz (offset 24)
    pub sample_rate: u32,
    /// Bytes per second
    pub byte_rate: u32,
    /// Bytes per sample frame
    pub block_align: u16,
    /// Bits per sample
    pub bits_per_sample: u16,
    /// Size of the fmt chunk as declared
    pub fmt_chunk_size: u32,
    /// Tag of the chunk at offset 36 (normally `data`)
    pub data_tag: [u8; 4],
    /// Declared payload length
    pub data_len: u32,
}

fn riff_preamble(input: &[u8]) -> IResult<&[u8], u32> {
    let (input, (_, riff_size, _, _)) =
        tuple((tag(&b"RIFF"[..]), le_u32, tag(&b"WAVE"[..]), tag(&b"fmt "[..])))(input)?;
    Ok((input, riff_size))
}

fn fmt_fields(input: &[u8]) -> IResult<&[u8], (u32, u16, u16, u32, u32, u16, u16)> {
    tuple((le_u32, le_u16, le_u16, le_u32, le_u32, le_u16, le_u16))(input)
}

fn data_chunk(input: &[u8]) -> IResult<&[u8], (&[u8], u32)> {
    tuple((take(4usize), le_u32))(input)
}

impl WavHeader {
    /// Parse and validate a header region
    ///
    /// Only the first [`WAV_HEADER_SIZE`] bytes are examined.
    ///
    /// # Errors
    /// Returns [`PlaybackError::InvalidHeader`] if the region is shorter than
    /// 44 bytes, lacks the RIFF/WAVE magic, declares a format tag other than
    /// PCM, or declares a zero sample rate.
    pub fn parse(data: &[u8]) -> Result<WavHeader> {
        if data.len() < WAV_HEADER_SIZE {
            return Err(PlaybackError::InvalidHeader(format!(
                "truncated header: {} of {} bytes",
                data.len(),
                WAV_HEADER_SIZE
            )));
        }
        let region = &data[..WAV_HEADER_SIZE];

        let (rest, _riff_size) = riff_preamble(region)
            .map_err(|_| PlaybackError::InvalidHeader("missing RIFF/WAVE magic".into()))?;
        let (rest, fields) = fmt_fields(rest)
            .map_err(|_| PlaybackError::InvalidHeader("malformed fmt chunk".into()))?;
        let (_, (data_tag, data_len)) = data_chunk(rest)
            .map_err(|_| PlaybackError::InvalidHeader("malformed data chunk".into()))?;

        let (
            fmt_chunk_size,
            format_tag,
            channels,
            sample_rate,
            byte_rate,
            block_align,
            bits_per_sample,
        ) = fields;

        if format_tag != WAVE_FORMAT_PCM {
            return Err(PlaybackError::InvalidHeader(format!(
                "unsupported format tag {:#06X}",
                format_tag
            )));
        }
        if sample_rate == 0 {
            return Err(PlaybackError::InvalidHeader("sample rate is zero".into()));
        }

        let mut tag_bytes = [0u8; 4];
        tag_bytes.copy_from_slice(data_tag);

        Ok(WavHeader {
            format_tag,
            channels,
            sample_rate,
            byte_rate,
            block_align,
            bits_per_sample,
            fmt_chunk_size,
            data_tag: tag_bytes,
            data_len,
        })
    }

    /// Whether the payload is 8-bit mono, the DAC's native layout
    pub fn is_native_layout(&self) -> bool {
        self.channels == 1 && self.bits_per_sample == 8
    }

    /// Log non-fatal layout anomalies
    pub fn log_anomalies(&self) {
        if self.fmt_chunk_size != 16 {
            log::warn!(
                "fmt chunk declares {} bytes; payload still read from byte {}",
                self.fmt_chunk_size,
                WAV_HEADER_SIZE
            );
        }
        if &self.data_tag != b"data" {
            log::warn!(
                "expected 'data' chunk at offset 36, found {:?}",
                String::from_utf8_lossy(&self.data_tag)
            );
        }
        if !self.is_native_layout() {
            log::warn!(
                "{} channel(s) at {} bits; bytes are passed to the DAC unchanged",
                self.channels,
                self.bits_per_sample
            );
        }
    }
}

/// Format bytes as hex, 16 per line
pub fn hex_dump(bytes: &[u8]) -> Vec<String> {
    bytes
        .chunks(16)
        .map(|line| {
            line.iter()
                .map(|b| format!("{:02X}", b))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}
