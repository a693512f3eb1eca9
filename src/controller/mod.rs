//! Playback Controller
//!
//! Opens a source, validates its header, and drives one read → decode →
//! emit cycle per tick until end of stream, then loops or stops.
//!
//! State transitions:
//!
//! ```text
//! Idle ──start──▶ Opening ──ok──▶ Playing ──eos/stop──▶ Finished
//!                    │               │  ▲
//!                    │               │  └── eos/loop
//!                    ▼               ▼
//!                  Error ◀──── read fault
//! ```

pub mod buffer;
pub mod engine;

pub use buffer::DecodeBuffer;
pub use engine::PlaybackController;

use crate::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Container layout of a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// 44-byte waveform header followed by 8-bit PCM
    RawPcm,
    /// Headerless MPEG audio frames
    CompressedFrames,
}

impl ContainerKind {
    /// Guess the container from a file extension
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "wav" | "wave" => Some(ContainerKind::RawPcm),
            "mp3" | "mpa" => Some(ContainerKind::CompressedFrames),
            _ => None,
        }
    }
}

/// The file being played
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSource {
    /// Path on the storage medium
    pub path: String,
    /// Container layout
    pub kind: ContainerKind,
    /// Output sample rate, once derived
    pub sample_rate: Option<u32>,
}

impl AudioSource {
    /// A waveform file
    pub fn raw_pcm(path: &str) -> Self {
        AudioSource {
            path: path.to_string(),
            kind: ContainerKind::RawPcm,
            sample_rate: None,
        }
    }

    /// A compressed frame stream
    pub fn compressed(path: &str) -> Self {
        AudioSource {
            path: path.to_string(),
            kind: ContainerKind::CompressedFrames,
            sample_rate: None,
        }
    }

    /// A source whose container is guessed from its extension
    pub fn from_path(path: &str) -> Option<Self> {
        let kind = ContainerKind::from_path(path)?;
        Some(AudioSource {
            path: path.to_string(),
            kind,
            sample_rate: None,
        })
    }
}

/// Controller status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// Nothing open
    Idle,
    /// Source being opened and validated
    Opening,
    /// Ticks drive the output
    Playing,
    /// End of stream reached with looping disabled
    Finished,
    /// Playback aborted
    Error(ErrorKind),
}

/// What one tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not playing; nothing happened
    Inactive,
    /// One chunk read and decoded, `samples` written (possibly zero)
    Played {
        /// Samples written to the sink
        samples: usize,
    },
    /// End of stream; the source was rewound
    Looped,
    /// End of stream; playback stopped
    Finished,
}

impl TickOutcome {
    /// Whether further ticks will do anything
    pub fn is_active(&self) -> bool {
        matches!(self, TickOutcome::Played { .. } | TickOutcome::Looped)
    }
}

/// Counters for monitoring a playback session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    /// Ticks that read from storage
    pub ticks: u64,
    /// Bytes read from storage
    pub bytes_read: u64,
    /// Reads that returned no data
    pub empty_reads: u64,
    /// Samples written to the sink
    pub samples_emitted: u64,
    /// Compressed frames skipped as undecodable
    pub malformed_frames: u64,
    /// Compressed bytes dropped under the discard tail policy
    pub bytes_discarded: u64,
    /// Completed passes through the source
    pub passes: u64,
}

/// Cross-thread stop request, honoured between ticks
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
}

impl StopHandle {
    /// Create an unset handle
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the controller to stop after the current tick
    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
    }

    /// Whether a stop was requested
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_from_extension() {
        assert_eq!(ContainerKind::from_path("/a.WAV"), Some(ContainerKind::RawPcm));
        assert_eq!(
            ContainerKind::from_path("/b.mp3"),
            Some(ContainerKind::CompressedFrames)
        );
        assert_eq!(ContainerKind::from_path("/c.txt"), None);
        assert_eq!(ContainerKind::from_path("/noext"), None);
    }

    #[test]
    fn test_source_constructors() {
        let source = AudioSource::from_path("/Brightside.wav").unwrap();
        assert_eq!(source, AudioSource::raw_pcm("/Brightside.wav"));
        assert_eq!(
            AudioSource::compressed("/x.mp3").kind,
            ContainerKind::CompressedFrames
        );
    }

    #[test]
    fn test_stop_handle_shared() {
        let handle = StopHandle::new();
        let other = handle.clone();
        assert!(!handle.is_requested());
        other.request();
        assert!(handle.is_requested());
    }

    #[test]
    fn test_outcome_activity() {
        assert!(TickOutcome::Played { samples: 0 }.is_active());
        assert!(TickOutcome::Looped.is_active());
        assert!(!TickOutcome::Finished.is_active());
        assert!(!TickOutcome::Inactive.is_active());
    }
}
