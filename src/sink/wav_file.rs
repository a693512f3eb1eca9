//! WAV capture of the DAC stream
//!
//! Writes exactly what the DAC would receive to an 8-bit mono WAV file. The
//! file is created on the first write so a compressed stream can announce
//! its sample rate first.

use super::OutputSink;
use crate::scheduler::DEFAULT_SAMPLE_RATE;
use crate::{PlaybackError, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Output sink that records to a WAV file
pub struct WavFileSink {
    path: PathBuf,
    sample_rate: u32,
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    written: u64,
}

impl WavFileSink {
    /// Prepare a sink writing to `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        WavFileSink {
            path: path.as_ref().to_path_buf(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            writer: None,
            written: 0,
        }
    }

    /// Samples written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    fn open(&mut self) -> Result<&mut hound::WavWriter<BufWriter<File>>> {
        if self.writer.is_none() {
            let spec = hound::WavSpec {
                channels: 1,
                sample_rate: self.sample_rate,
                bits_per_sample: 8,
                sample_format: hound::SampleFormat::Int,
            };
            let writer = hound::WavWriter::create(&self.path, spec).map_err(|e| {
                PlaybackError::SinkError(format!(
                    "Failed to create WAV file '{}': {}",
                    self.path.display(),
                    e
                ))
            })?;
            self.writer = Some(writer);
        }
        self.writer
            .as_mut()
            .ok_or_else(|| PlaybackError::SinkError("WAV writer unavailable".into()))
    }

    /// Flush and close the file, fixing up the header lengths
    pub fn finalize(mut self) -> Result<()> {
        match self.writer.take() {
            Some(writer) => writer.finalize().map_err(|e| {
                PlaybackError::SinkError(format!("Failed to finalize WAV file: {}", e))
            }),
            None => Ok(()),
        }
    }
}

impl OutputSink for WavFileSink {
    fn write_sample(&mut self, sample: u8) -> Result<()> {
        let writer = self.open()?;
        // hound stores 8-bit samples offset by 128
        writer
            .write_sample((sample ^ 0x80) as i8)
            .map_err(|e| PlaybackError::SinkError(format!("Failed to write sample: {}", e)))?;
        self.written += 1;
        Ok(())
    }

    fn set_sample_rate(&mut self, sample_rate: u32) {
        if self.writer.is_some() && sample_rate != self.sample_rate {
            log::warn!(
                "Sample rate changed to {} Hz after WAV capture started at {} Hz",
                sample_rate,
                self.sample_rate
            );
            return;
        }
        self.sample_rate = sample_rate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_round_trips_dac_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");

        let mut sink = WavFileSink::new(&path);
        sink.set_sample_rate(22050);
        for sample in [0u8, 1, 127, 128, 255] {
            sink.write_sample(sample).unwrap();
        }
        assert_eq!(sink.written(), 5);
        sink.finalize().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 44 + 5);
        assert_eq!(&bytes[44..], &[0, 1, 127, 128, 255]);

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 22050);
        assert_eq!(reader.spec().bits_per_sample, 8);
    }

    #[test]
    fn test_finalize_without_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never.wav");
        WavFileSink::new(&path).finalize().unwrap();
        assert!(!path.exists());
    }
}
