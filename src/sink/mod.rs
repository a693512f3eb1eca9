//! Output Sink
//!
//! The DAC accepts one unsigned 8-bit sample per write and does no rate
//! limiting of its own; pacing belongs to the scheduler.

#[cfg(feature = "wav-sink")]
pub mod wav_file;

#[cfg(feature = "wav-sink")]
pub use wav_file::WavFileSink;

use crate::Result;
use std::time::Instant;

/// Single-channel 8-bit sample output
pub trait OutputSink {
    /// Write one sample
    fn write_sample(&mut self, sample: u8) -> Result<()>;

    /// Nominal rate the samples will arrive at
    ///
    /// Called before the first write of a stream and whenever the rate
    /// changes. Hardware outputs ignore it.
    fn set_sample_rate(&mut self, _sample_rate: u32) {}
}

impl<K: OutputSink + ?Sized> OutputSink for Box<K> {
    fn write_sample(&mut self, sample: u8) -> Result<()> {
        (**self).write_sample(sample)
    }

    fn set_sample_rate(&mut self, sample_rate: u32) {
        (**self).set_sample_rate(sample_rate)
    }
}

/// Discards every sample
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink {
    written: u64,
}

impl NullSink {
    /// Create a null sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples written so far
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl OutputSink for NullSink {
    fn write_sample(&mut self, _sample: u8) -> Result<()> {
        self.written += 1;
        Ok(())
    }
}

/// Keeps every sample, and optionally the instant it was written
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    samples: Vec<u8>,
    timestamps: Option<Vec<Instant>>,
    sample_rates: Vec<u32>,
}

impl RecordingSink {
    /// Record sample values only
    pub fn new() -> Self {
        Self::default()
    }

    /// Record sample values and write times
    pub fn with_timestamps() -> Self {
        RecordingSink {
            timestamps: Some(Vec::new()),
            ..Self::default()
        }
    }

    /// Samples in write order
    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// Write times, if recording them
    pub fn timestamps(&self) -> &[Instant] {
        self.timestamps.as_deref().unwrap_or(&[])
    }

    /// Every rate announced through [`OutputSink::set_sample_rate`]
    pub fn sample_rates(&self) -> &[u32] {
        &self.sample_rates
    }

    /// Drop everything recorded so far
    pub fn clear(&mut self) {
        self.samples.clear();
        if let Some(stamps) = self.timestamps.as_mut() {
            stamps.clear();
        }
    }
}

impl OutputSink for RecordingSink {
    fn write_sample(&mut self, sample: u8) -> Result<()> {
        if let Some(stamps) = self.timestamps.as_mut() {
            stamps.push(Instant::now());
        }
        self.samples.push(sample);
        Ok(())
    }

    fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rates.push(sample_rate);
    }
}
