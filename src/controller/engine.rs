//! Playback engine
//!
//! One [`PlaybackController`] owns the storage, the sink and the pacing
//! clock. Each call to [`PlaybackController::tick`] performs a single
//! read → decode → emit cycle of at most `chunk_size` bytes.

use super::{
    AudioSource, ContainerKind, DecodeBuffer, PlaybackStats, PlaybackStatus, StopHandle,
    TickOutcome,
};
use crate::config::{LoopPolicy, PlaybackConfig, TailPolicy};
use crate::decoder::{FrameDecoder, PassthroughDecoder};
use crate::scheduler::{Clock, MonotonicClock, PlaybackScheduler, DEFAULT_SAMPLE_RATE};
use crate::sink::OutputSink;
use crate::storage::{SourceHandle, Storage};
use crate::wav::{hex_dump, WavHeader, WAV_HEADER_SIZE};
use crate::{PlaybackError, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Everything tied to one open source; dropping it closes the file
struct Session<H> {
    source: AudioSource,
    handle: H,
    decoder: Box<dyn FrameDecoder>,
    buffer: DecodeBuffer,
    /// Offset of the first payload byte, the loop target
    payload_start: u64,
    /// Consecutive reads that returned no bytes
    empty_streak: usize,
}

impl<H: SourceHandle> Session<H> {
    fn has_payload(&self) -> bool {
        self.handle.len() > self.payload_start
    }
}

/// Count an empty read, failing once `limit` happen back to back
fn note_read(streak: &mut usize, read: usize, limit: usize) -> Result<()> {
    if read > 0 {
        *streak = 0;
        return Ok(());
    }
    *streak += 1;
    if *streak >= limit {
        return Err(PlaybackError::ReadFault(format!(
            "source stalled after {} empty reads",
            streak
        )));
    }
    Ok(())
}

/// Drives a source from storage to the output sink
pub struct PlaybackController<S: Storage, K: OutputSink, C: Clock = MonotonicClock> {
    storage: S,
    sink: K,
    config: PlaybackConfig,
    scheduler: PlaybackScheduler<C>,
    status: PlaybackStatus,
    session: Option<Session<S::Handle>>,
    stats: Arc<Mutex<PlaybackStats>>,
}

impl<S: Storage, K: OutputSink> PlaybackController<S, K, MonotonicClock> {
    /// Create an idle controller paced by the monotonic clock
    pub fn new(storage: S, sink: K, config: PlaybackConfig) -> Self {
        Self::with_clock(storage, sink, config, MonotonicClock::new())
    }
}

impl<S: Storage, K: OutputSink, C: Clock> PlaybackController<S, K, C> {
    /// Create an idle controller on a custom time source
    pub fn with_clock(storage: S, sink: K, config: PlaybackConfig, timer: C) -> Self {
        PlaybackController {
            storage,
            sink,
            config,
            scheduler: PlaybackScheduler::with_clock(DEFAULT_SAMPLE_RATE, timer),
            status: PlaybackStatus::Idle,
            session: None,
            stats: Arc::new(Mutex::new(PlaybackStats::default())),
        }
    }

    /// Open `source` and begin playback
    ///
    /// Any source already playing is closed first. On failure the status
    /// becomes [`PlaybackStatus::Error`], nothing has been written to the
    /// sink, and no handle stays open.
    pub fn start(&mut self, source: AudioSource) -> Result<()> {
        if self.session.take().is_some() {
            log::info!("Closing previous source");
        }
        *self.stats.lock() = PlaybackStats::default();
        self.status = PlaybackStatus::Opening;

        match self.open(source) {
            Ok(session) => {
                log::info!("Playing {} via {}", session.source.path, session.decoder.name());
                self.session = Some(session);
                self.status = PlaybackStatus::Playing;
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to open source: {}", e);
                self.status = PlaybackStatus::Error(e.kind());
                Err(e)
            }
        }
    }

    fn open(&mut self, source: AudioSource) -> Result<Session<S::Handle>> {
        self.config.validate()?;
        let mut handle = self.storage.open(&source.path)?;
        log::info!("Opened {} ({} bytes)", source.path, handle.len());

        let chunk_size = self.config.chunk_size;
        let (decoder, capacity, payload_start): (Box<dyn FrameDecoder>, usize, u64) =
            match source.kind {
                ContainerKind::RawPcm => {
                    let header = self.read_header(&mut handle)?;
                    let rate = self.config.raw_sample_rate.unwrap_or(header.sample_rate);
                    if rate != header.sample_rate {
                        log::debug!(
                            "Header declares {} Hz, pacing at configured {} Hz",
                            header.sample_rate,
                            rate
                        );
                    }
                    handle.seek(WAV_HEADER_SIZE as u64)?;
                    (Box::new(PassthroughDecoder::new(rate)), chunk_size, WAV_HEADER_SIZE as u64)
                }
                ContainerKind::CompressedFrames => (
                    compressed_decoder()?,
                    chunk_size + crate::decoder::mpeg::MAX_FRAME_LEN,
                    0,
                ),
            };

        Ok(Session {
            source,
            handle,
            decoder,
            buffer: DecodeBuffer::with_capacity(capacity),
            payload_start,
            empty_streak: 0,
        })
    }

    /// Collect and validate the waveform header, tolerating short reads
    fn read_header(&mut self, handle: &mut S::Handle) -> Result<WavHeader> {
        let mut bytes = [0u8; WAV_HEADER_SIZE];
        let mut filled = 0;
        let mut empty_streak = 0;
        while filled < WAV_HEADER_SIZE && handle.available() {
            let n = handle.read(&mut bytes[filled..])?;
            note_read(&mut empty_streak, n, self.config.stall_limit)?;
            filled += n;
        }

        if self.config.header_hex_dump {
            for line in hex_dump(&bytes[..filled]) {
                log::debug!("{}", line);
            }
        }
        if filled >= 22 {
            log::info!("Audio Format: {:04X}", u16::from_le_bytes([bytes[20], bytes[21]]));
        }

        let header = WavHeader::parse(&bytes[..filled])?;
        header.log_anomalies();
        Ok(header)
    }

    /// Run one read → decode → emit cycle
    ///
    /// Returns [`TickOutcome::Inactive`] without touching storage unless the
    /// controller is playing. A read fault or sink failure closes the
    /// source, sets [`PlaybackStatus::Error`] and is returned.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        if self.status != PlaybackStatus::Playing {
            return Ok(TickOutcome::Inactive);
        }
        let at_end = match self.session.as_ref() {
            Some(session) => !session.handle.available(),
            None => return Ok(TickOutcome::Inactive),
        };

        let result = if at_end {
            self.end_of_stream()
        } else {
            self.play_chunk().map(|samples| TickOutcome::Played { samples })
        };

        result.map_err(|e| self.fail(e))
    }

    fn play_chunk(&mut self) -> Result<usize> {
        let session = match self.session.as_mut() {
            Some(session) => session,
            None => return Ok(0),
        };

        let read = session.buffer.fill_from(&mut session.handle, self.config.chunk_size)?;
        note_read(&mut session.empty_streak, read, self.config.stall_limit)?;
        let output = session.decoder.decode(session.buffer.contents());

        let dropped_tail = match (session.source.kind, self.config.tail_policy) {
            (ContainerKind::CompressedFrames, TailPolicy::Carry) => {
                session.buffer.consume(output.consumed);
                if session.buffer.len() == session.buffer.capacity() {
                    log::warn!(
                        "No frame found in {} buffered bytes, dropping them",
                        session.buffer.len()
                    );
                    session.buffer.clear();
                    session.decoder.discontinuity();
                }
                0
            }
            _ => {
                let dropped = session.buffer.len().saturating_sub(output.consumed);
                session.buffer.clear();
                if dropped > 0 {
                    session.decoder.discontinuity();
                }
                dropped
            }
        };

        if let Some(rate) = session.decoder.sample_rate() {
            if session.source.sample_rate != Some(rate) {
                log::info!("{}: {} Hz", session.source.path, rate);
                session.source.sample_rate = Some(rate);
                self.scheduler.set_sample_rate(rate);
                self.sink.set_sample_rate(rate);
            }
        }

        if output.malformed > 0 {
            log::warn!("Skipped {} malformed frame(s)", output.malformed);
        }

        let written = self.scheduler.emit(&output.frame, &mut self.sink)?;

        let mut stats = self.stats.lock();
        stats.ticks += 1;
        stats.bytes_read += read as u64;
        if read == 0 {
            stats.empty_reads += 1;
        }
        stats.malformed_frames += output.malformed as u64;
        stats.bytes_discarded += dropped_tail as u64;
        stats.samples_emitted += written as u64;
        Ok(written)
    }

    fn end_of_stream(&mut self) -> Result<TickOutcome> {
        self.stats.lock().passes += 1;

        let session = match self.session.as_mut() {
            Some(session) => session,
            None => return Ok(TickOutcome::Inactive),
        };

        if self.config.loop_policy == LoopPolicy::Loop {
            if session.has_payload() {
                session.handle.seek(session.payload_start)?;
                session.decoder.reset();
                session.buffer.clear();
                session.empty_streak = 0;
                log::debug!("Looping {}", session.source.path);
                return Ok(TickOutcome::Looped);
            }
            log::warn!("{} has no payload to loop", session.source.path);
        }

        self.session = None;
        self.status = PlaybackStatus::Finished;
        log::info!("Playback finished!");
        Ok(TickOutcome::Finished)
    }

    /// Close the source and record the failure
    fn fail(&mut self, error: PlaybackError) -> PlaybackError {
        log::error!("Playback aborted: {}", error);
        self.session = None;
        self.status = PlaybackStatus::Error(error.kind());
        error
    }

    /// Close the source and return to idle
    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            log::info!("Stopped {}", session.source.path);
        }
        self.status = PlaybackStatus::Idle;
    }

    /// Tick until playback ends or `stop` is requested
    ///
    /// The stop request is checked between ticks, so at most one chunk is
    /// emitted after it is raised.
    pub fn run(&mut self, stop: &StopHandle) -> Result<()> {
        loop {
            if stop.is_requested() {
                self.stop();
                return Ok(());
            }
            if !self.tick()?.is_active() {
                return Ok(());
            }
        }
    }

    /// Current status
    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    /// Whether a source is open and playing
    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }

    /// The source being played
    pub fn source(&self) -> Option<&AudioSource> {
        self.session.as_ref().map(|s| &s.source)
    }

    /// Snapshot of the session counters
    pub fn stats(&self) -> PlaybackStats {
        self.stats.lock().clone()
    }

    /// Shared counters, readable from another thread during [`Self::run`]
    pub fn stats_handle(&self) -> Arc<Mutex<PlaybackStats>> {
        Arc::clone(&self.stats)
    }

    /// Active configuration
    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Pacing state
    pub fn scheduler(&self) -> &PlaybackScheduler<C> {
        &self.scheduler
    }

    /// Storage medium
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Output sink
    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Output sink, mutably
    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    /// Close any source and give back the sink
    pub fn into_sink(self) -> K {
        self.sink
    }
}

#[cfg(feature = "compressed")]
fn compressed_decoder() -> Result<Box<dyn FrameDecoder>> {
    Ok(Box::new(crate::decoder::compressed::CompressedFrameDecoder::new()))
}

#[cfg(not(feature = "compressed"))]
fn compressed_decoder() -> Result<Box<dyn FrameDecoder>> {
    Err(PlaybackError::ConfigError(
        "compressed sources need the `compressed` feature".into(),
    ))
}
