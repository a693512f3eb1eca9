//! Flash-to-DAC audio playback engine
//!
//! Streams audio stored on an onboard flash filesystem to a single-channel
//! 8-bit digital-to-analog output, one sample at a time, paced by a
//! monotonic clock. Two container kinds are supported: waveform files with
//! a 44-byte header (PCM payload passed straight through) and headerless
//! MPEG audio bitstreams (decoded frame by frame and rescaled to 8 bits).
//!
//! # Features
//! - Storage Reader abstraction over a mounted directory or an in-memory image
//! - Waveform header validation
//! - Passthrough and compressed frame decoders behind one trait
//! - Minimum-interval sample pacing against a monotonic clock
//! - Playback controller state machine with loop or stop at end of stream
//! - Atomic single-byte intensity cell for the actuator command path
//!
//! # Crate feature flags
//! - `compressed` (default): MPEG audio Layer III decoding (`decoder::compressed`)
//! - `wav-sink` (default): WAV file output sink (`sink::WavFileSink`)
//!
//! # Quick start
//! ```no_run
//! use flashplay::{AudioSource, DirStorage, PlaybackConfig, PlaybackController, RecordingSink};
//!
//! let storage = DirStorage::mount("flash").unwrap();
//! let mut controller =
//!     PlaybackController::new(storage, RecordingSink::new(), PlaybackConfig::default());
//! controller.start(AudioSource::raw_pcm("/Brightside.wav")).unwrap();
//! while controller.tick().unwrap().is_active() {}
//! ```

#![warn(missing_docs)]

pub mod command; // Actuator command path (intensity cell)
pub mod config; // Playback configuration
pub mod controller; // Playback Controller
pub mod decoder; // Frame Decoders
pub mod scheduler; // Sample pacing
pub mod sink; // Output Sink
pub mod storage; // Storage Reader
pub mod wav; // Waveform header validation

/// Coarse error classification carried by [`PlaybackStatus::Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Filesystem could not be mounted
    StorageUnavailable,
    /// Named source does not exist
    SourceNotFound,
    /// Container header failed validation
    InvalidHeader,
    /// A compressed frame could not be decoded
    MalformedFrame,
    /// Storage read failed (distinct from end of stream)
    ReadFault,
    /// Output sink could not be written
    Sink,
    /// Invalid configuration
    Config,
    /// Anything else
    Other,
}

/// Error types for playback operations
#[derive(thiserror::Error, Debug)]
pub enum PlaybackError {
    /// Filesystem mount failure (fatal at startup)
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Requested source does not exist
    #[error("Source not found: {0}")]
    SourceNotFound(String),

    /// Container header is truncated or unsupported
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Compressed frame failed to decode
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Storage read error, distinct from end of stream
    #[error("Read fault: {0}")]
    ReadFault(String),

    /// Output sink error
    #[error("Output sink error: {0}")]
    SinkError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// IO error from filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl PlaybackError {
    /// Classify this error for status reporting
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlaybackError::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            PlaybackError::SourceNotFound(_) => ErrorKind::SourceNotFound,
            PlaybackError::InvalidHeader(_) => ErrorKind::InvalidHeader,
            PlaybackError::MalformedFrame(_) => ErrorKind::MalformedFrame,
            PlaybackError::ReadFault(_) | PlaybackError::Io(_) => ErrorKind::ReadFault,
            PlaybackError::SinkError(_) => ErrorKind::Sink,
            PlaybackError::ConfigError(_) => ErrorKind::Config,
            PlaybackError::Other(_) => ErrorKind::Other,
        }
    }
}

impl From<String> for PlaybackError {
    /// Converts a String into `PlaybackError::Other`.
    ///
    /// Prefer the specific variants where the failure class is known; the
    /// controller derives [`PlaybackStatus`] from the variant.
    fn from(msg: String) -> Self {
        PlaybackError::Other(msg)
    }
}

impl From<&str> for PlaybackError {
    fn from(msg: &str) -> Self {
        PlaybackError::Other(msg.to_string())
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;

// Public API exports
pub use command::{ActuatorUpdater, CommandBoundary, CommandEvent, HapticActuator, IntensityCell};
pub use config::{LoopPolicy, PlaybackConfig, TailPolicy};
pub use controller::{
    AudioSource, ContainerKind, PlaybackController, PlaybackStats, PlaybackStatus, StopHandle,
    TickOutcome,
};
#[cfg(feature = "compressed")]
pub use decoder::compressed::CompressedFrameDecoder;
pub use decoder::{DecodeOutput, FrameDecoder, PassthroughDecoder, PcmFrame};
pub use scheduler::{Clock, MonotonicClock, PlaybackClock, PlaybackScheduler};
#[cfg(feature = "wav-sink")]
pub use sink::WavFileSink;
pub use sink::{NullSink, OutputSink, RecordingSink};
pub use storage::{DirStorage, FileEntry, MemoryStorage, SourceHandle, Storage};
pub use wav::{WavHeader, WAV_HEADER_SIZE};
