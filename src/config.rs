//! Playback configuration
//!
//! Loaded from JSON; every field has a default so a partial file (or none at
//! all) is valid.

use crate::scheduler::DEFAULT_SAMPLE_RATE;
use crate::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Bytes read from storage per tick
pub const DEFAULT_CHUNK_SIZE: usize = 512;

/// Upper bound on [`PlaybackConfig::chunk_size`]
pub const MAX_CHUNK_SIZE: usize = 64 * 1024;

/// Consecutive empty reads before a source counts as stalled
pub const DEFAULT_STALL_LIMIT: usize = 1000;

/// What happens when a source reaches end of stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPolicy {
    /// Stop and report `Finished`
    #[default]
    Stop,
    /// Seek back to the first payload byte and keep playing
    Loop,
}

/// Treatment of compressed bytes left over after a decode call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TailPolicy {
    /// Keep the undecoded tail and prepend it to the next read
    #[default]
    Carry,
    /// Drop the tail; a frame straddling two reads is lost
    Discard,
}

/// Playback configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Bytes read from storage per tick
    pub chunk_size: usize,
    /// End-of-stream behaviour
    pub loop_policy: LoopPolicy,
    /// Output rate for raw PCM; `None` uses the header's sample rate
    pub raw_sample_rate: Option<u32>,
    /// Compressed-path tail handling
    pub tail_policy: TailPolicy,
    /// Log the raw header bytes when a source opens
    pub header_hex_dump: bool,
    /// Consecutive empty reads tolerated while data is still available
    pub stall_limit: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        PlaybackConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            loop_policy: LoopPolicy::Stop,
            raw_sample_rate: Some(DEFAULT_SAMPLE_RATE),
            tail_policy: TailPolicy::Carry,
            header_hex_dump: true,
            stall_limit: DEFAULT_STALL_LIMIT,
        }
    }
}

impl PlaybackConfig {
    /// Default configuration with looping enabled
    pub fn looping() -> Self {
        PlaybackConfig {
            loop_policy: LoopPolicy::Loop,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PlaybackConfig = serde_json::from_str(json)
            .map_err(|e| PlaybackError::ConfigError(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PlaybackError::ConfigError(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    /// Check field ranges
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(PlaybackError::ConfigError(
                "chunk_size must be greater than 0".into(),
            ));
        }
        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(PlaybackError::ConfigError(format!(
                "chunk_size {} exceeds limit of {}",
                self.chunk_size, MAX_CHUNK_SIZE
            )));
        }
        if self.raw_sample_rate == Some(0) {
            return Err(PlaybackError::ConfigError(
                "raw_sample_rate must be greater than 0".into(),
            ));
        }
        if self.stall_limit == 0 {
            return Err(PlaybackError::ConfigError(
                "stall_limit must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
