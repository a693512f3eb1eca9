//! Playback Scheduler
//!
//! Forwards decoded samples to the output sink no faster than the stream's
//! sample rate allows. The pacing rule: the time since the previous write
//! must reach the sample interval before the next write. Waiting slightly
//! too long is tolerated; writing early never happens.

pub mod clock;

pub use clock::{Clock, MonotonicClock, VirtualClock};

use crate::decoder::PcmFrame;
use crate::sink::OutputSink;
use crate::Result;
use std::time::{Duration, Instant};

/// Default output sample rate (44.1 kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Emission timeline of the output sink
#[derive(Debug, Clone, Copy)]
pub struct PlaybackClock {
    /// Minimum spacing between writes
    interval: Duration,
    /// Sample rate the interval was derived from
    sample_rate: u32,
    /// Time of the previous write
    last_emit: Option<Instant>,
}

impl PlaybackClock {
    /// Create a clock for `sample_rate`
    ///
    /// The interval is `1_000_000 / sample_rate` microseconds rounded up, so
    /// 44.1 kHz paces at 23 µs. Rounding up trades a fraction of a percent of
    /// speed for never emitting early.
    pub fn new(sample_rate: u32) -> Self {
        let sample_rate = sample_rate.max(1);
        PlaybackClock {
            interval: Self::interval_for(sample_rate),
            sample_rate,
            last_emit: None,
        }
    }

    /// Interval for a given sample rate
    pub fn interval_for(sample_rate: u32) -> Duration {
        Duration::from_micros(1_000_000u64.div_ceil(u64::from(sample_rate.max(1))))
    }

    /// Minimum spacing between writes
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sample rate the interval was derived from
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Earliest time the next sample may be written
    pub fn next_deadline(&self) -> Option<Instant> {
        self.last_emit.map(|t| t + self.interval)
    }

    /// Record a write
    pub fn stamp(&mut self, at: Instant) {
        self.last_emit = Some(at);
    }

    /// Time of the previous write
    pub fn last_emit(&self) -> Option<Instant> {
        self.last_emit
    }

    /// Change the sample rate, keeping the emission history
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        let sample_rate = sample_rate.max(1);
        self.sample_rate = sample_rate;
        self.interval = Self::interval_for(sample_rate);
    }
}

/// Paces samples into an [`OutputSink`]
#[derive(Debug)]
pub struct PlaybackScheduler<C: Clock = MonotonicClock> {
    clock: PlaybackClock,
    timer: C,
    emitted: u64,
}

impl PlaybackScheduler<MonotonicClock> {
    /// Create a scheduler on the monotonic clock
    pub fn new(sample_rate: u32) -> Self {
        Self::with_clock(sample_rate, MonotonicClock::new())
    }
}

impl<C: Clock> PlaybackScheduler<C> {
    /// Create a scheduler on a custom time source
    pub fn with_clock(sample_rate: u32, timer: C) -> Self {
        PlaybackScheduler {
            clock: PlaybackClock::new(sample_rate),
            timer,
            emitted: 0,
        }
    }

    /// Write every sample of `frame` to `sink`, one interval apart
    ///
    /// The timestamp is taken after each write returns, so the gap between
    /// two writes as seen by the sink is never shorter than the interval.
    ///
    /// Returns the number of samples written.
    pub fn emit<K: OutputSink + ?Sized>(
        &mut self,
        frame: &PcmFrame,
        sink: &mut K,
    ) -> Result<usize> {
        let mut written = 0;
        for sample in frame.dac_samples() {
            if let Some(deadline) = self.clock.next_deadline() {
                self.timer.wait_until(deadline);
            }
            sink.write_sample(sample)?;
            self.clock.stamp(self.timer.now());
            written += 1;
        }
        self.emitted += written as u64;
        Ok(written)
    }

    /// Retarget pacing to a new sample rate
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        if sample_rate != self.clock.sample_rate() {
            log::debug!(
                "Pacing at {} Hz ({} µs per sample)",
                sample_rate,
                PlaybackClock::interval_for(sample_rate).as_micros()
            );
            self.clock.set_sample_rate(sample_rate);
        }
    }

    /// Current sample rate
    pub fn sample_rate(&self) -> u32 {
        self.clock.sample_rate()
    }

    /// Pacing state
    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    /// Time source
    pub fn timer(&self) -> &C {
        &self.timer
    }

    /// Samples written since creation
    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}
