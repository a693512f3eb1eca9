//! In-memory flash image
//!
//! Holds whole files in RAM and can inject the storage behaviours the
//! controller must tolerate: short reads, empty reads and read faults.

use super::{normalize_path, FileEntry, SourceHandle, Storage};
use crate::{PlaybackError, Result};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Injected read behaviour shared by every handle of a [`MemoryStorage`]
#[derive(Debug, Clone, Default)]
struct FaultPlan {
    /// Cap on bytes returned per read call
    max_read: Option<usize>,
    /// Every n-th read returns 0 bytes (0 disables)
    empty_read_every: usize,
    /// Per-file offset from which reads fail
    fault_at: BTreeMap<String, u64>,
}

/// Flash filesystem image held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    files: BTreeMap<String, Arc<Vec<u8>>>,
    faults: FaultPlan,
    open_handles: Arc<AtomicUsize>,
}

impl MemoryStorage {
    /// Create an empty image
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file
    pub fn insert(&mut self, path: &str, data: Vec<u8>) {
        self.files.insert(normalize_path(path), Arc::new(data));
    }

    /// Limit every read to at most `max` bytes
    pub fn with_max_read(mut self, max: usize) -> Self {
        self.faults.max_read = Some(max.max(1));
        self
    }

    /// Make every `n`-th read return zero bytes
    pub fn with_empty_read_every(mut self, n: usize) -> Self {
        self.faults.empty_read_every = n;
        self
    }

    /// Fail reads of `path` once the cursor reaches `offset`
    pub fn with_read_fault(mut self, path: &str, offset: u64) -> Self {
        self.faults.fault_at.insert(normalize_path(path), offset);
        self
    }

    /// Number of handles currently open
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::Acquire)
    }
}

impl Storage for MemoryStorage {
    type Handle = MemoryHandle;

    fn open(&mut self, path: &str) -> Result<MemoryHandle> {
        let key = normalize_path(path);
        let data = self
            .files
            .get(&key)
            .cloned()
            .ok_or_else(|| PlaybackError::SourceNotFound(path.to_string()))?;

        self.open_handles.fetch_add(1, Ordering::AcqRel);
        Ok(MemoryHandle {
            fault_at: self.faults.fault_at.get(&key).copied(),
            max_read: self.faults.max_read,
            empty_read_every: self.faults.empty_read_every,
            data,
            pos: 0,
            reads: 0,
            open_handles: Arc::clone(&self.open_handles),
        })
    }

    fn list(&self) -> Result<Vec<FileEntry>> {
        Ok(self
            .files
            .iter()
            .map(|(name, data)| FileEntry {
                name: name.clone(),
                size: data.len() as u64,
            })
            .collect())
    }
}

/// Open file inside a [`MemoryStorage`]
#[derive(Debug)]
pub struct MemoryHandle {
    data: Arc<Vec<u8>>,
    pos: usize,
    reads: usize,
    max_read: Option<usize>,
    empty_read_every: usize,
    fault_at: Option<u64>,
    open_handles: Arc<AtomicUsize>,
}

impl SourceHandle for MemoryHandle {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.reads += 1;

        if let Some(offset) = self.fault_at {
            if self.pos as u64 >= offset {
                return Err(PlaybackError::ReadFault(format!(
                    "injected fault at offset {}",
                    self.pos
                )));
            }
        }

        if self.empty_read_every > 0 && self.reads % self.empty_read_every == 0 {
            return Ok(0);
        }

        let remaining = self.data.len().saturating_sub(self.pos);
        let mut n = buf.len().min(remaining);
        if let Some(max) = self.max_read {
            n = n.min(max);
        }
        if let Some(offset) = self.fault_at {
            // Stop short of the fault so the next read trips it
            n = n.min((offset as usize).saturating_sub(self.pos));
        }

        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn available(&self) -> bool {
        self.pos < self.data.len()
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        if offset > self.data.len() as u64 {
            return Err(PlaybackError::ReadFault(format!(
                "seek to {} beyond end of file ({} bytes)",
                offset,
                self.data.len()
            )));
        }
        self.pos = offset as usize;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos as u64
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        self.open_handles.fetch_sub(1, Ordering::AcqRel);
    }
}
