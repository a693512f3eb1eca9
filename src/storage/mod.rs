//! Storage Reader Domain
//!
//! The playback core consumes storage through two small traits: a
//! [`Storage`] that resolves names to handles, and a [`SourceHandle`] that
//! reads, seeks and reports end of stream. Closing a source is dropping its
//! handle, so every exit path releases the file.
//!
//! Short reads are normal. A read returning `Ok(0)` means "no data this
//! call"; end of stream is reported only by [`SourceHandle::available`].

pub mod dir;
pub mod memory;

pub use dir::{DirHandle, DirStorage};
pub use memory::{MemoryHandle, MemoryStorage};

use crate::Result;

/// One file in the storage root, as reported by [`Storage::list`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// File name relative to the storage root, with a leading `/`
    pub name: String,
    /// Size in bytes
    pub size: u64,
}

/// An open file on the storage medium
pub trait SourceHandle {
    /// Read up to `buf.len()` bytes at the current position
    ///
    /// Returns the number of bytes read, which may be fewer than requested or
    /// zero. Errors are read faults, never end of stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Whether unread bytes remain
    fn available(&self) -> bool;

    /// Move the read cursor to an absolute byte offset
    fn seek(&mut self, offset: u64) -> Result<()>;

    /// Current read cursor
    fn position(&self) -> u64;

    /// Total file size in bytes
    fn len(&self) -> u64;

    /// Whether the file is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A mounted filesystem
pub trait Storage {
    /// Handle type returned by [`Storage::open`]
    type Handle: SourceHandle;

    /// Open a named file for reading
    ///
    /// # Errors
    /// Returns [`crate::PlaybackError::SourceNotFound`] if the file does not exist.
    fn open(&mut self, path: &str) -> Result<Self::Handle>;

    /// Enumerate the files in the storage root
    fn list(&self) -> Result<Vec<FileEntry>>;
}

/// Normalise a flash path to the `/name` form used by the storage root
pub(crate) fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_start_matches('/');
    format!("/{trimmed}")
}

/// Log every file in the storage root with its size
pub fn log_listing<S: Storage>(storage: &S) -> Result<Vec<FileEntry>> {
    let entries = storage.list()?;
    for entry in &entries {
        log::info!("File: {}, Size: {}", entry.name, entry.size);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("song.wav"), "/song.wav");
        assert_eq!(normalize_path("/song.wav"), "/song.wav");
        assert_eq!(normalize_path("//song.wav"), "/song.wav");
    }

    #[test]
    fn test_log_listing_returns_entries() {
        let mut storage = MemoryStorage::new();
        storage.insert("/a.wav", vec![0u8; 10]);
        storage.insert("/b.mp3", vec![0u8; 3]);

        let entries = log_listing(&storage).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "/a.wav");
        assert_eq!(entries[1].size, 3);
    }
}
