//! Directory-backed storage
//!
//! Treats a host directory as the mounted flash root. Paths such as
//! `/Brightside.wav` resolve relative to that directory.

use super::{normalize_path, FileEntry, SourceHandle, Storage};
use crate::{PlaybackError, Result};
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// A directory mounted as the flash filesystem
#[derive(Debug, Clone)]
pub struct DirStorage {
    root: PathBuf,
}

impl DirStorage {
    /// Mount a directory
    ///
    /// # Errors
    /// Returns [`PlaybackError::StorageUnavailable`] if `root` is not a readable directory.
    pub fn mount<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(PlaybackError::StorageUnavailable(format!(
                "'{}' is not a directory",
                root.display()
            )));
        }
        Ok(DirStorage {
            root: root.to_path_buf(),
        })
    }

    /// Root directory of the mount
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(normalize_path(path).trim_start_matches('/'))
    }
}

impl Storage for DirStorage {
    type Handle = DirHandle;

    fn open(&mut self, path: &str) -> Result<DirHandle> {
        let full = self.resolve(path);
        let file = File::open(&full).map_err(|e| match e.kind() {
            ErrorKind::NotFound => PlaybackError::SourceNotFound(path.to_string()),
            _ => PlaybackError::Io(e),
        })?;
        let metadata = file.metadata()?;
        if !metadata.is_file() {
            return Err(PlaybackError::SourceNotFound(path.to_string()));
        }
        Ok(DirHandle {
            file,
            len: metadata.len(),
            pos: 0,
        })
    }

    fn list(&self) -> Result<Vec<FileEntry>> {
        let reader = fs::read_dir(&self.root)
            .map_err(|e| PlaybackError::StorageUnavailable(e.to_string()))?;
        let mut entries = Vec::new();
        for entry in reader {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            entries.push(FileEntry {
                name: normalize_path(&entry.file_name().to_string_lossy()),
                size: metadata.len(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

/// Open file inside a [`DirStorage`]
#[derive(Debug)]
pub struct DirHandle {
    file: File,
    len: u64,
    pos: u64,
}

impl SourceHandle for DirHandle {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.file.read(buf) {
            Ok(n) => {
                self.pos += n as u64;
                Ok(n)
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(0),
            Err(e) => Err(PlaybackError::ReadFault(e.to_string())),
        }
    }

    fn available(&self) -> bool {
        self.pos < self.len
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        if offset > self.len {
            return Err(PlaybackError::ReadFault(format!(
                "seek to {} beyond end of file ({} bytes)",
                offset, self.len
            )));
        }
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| PlaybackError::ReadFault(e.to_string()))?;
        self.pos = offset;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn len(&self) -> u64 {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mount_missing_directory() {
        let result = DirStorage::mount("/definitely/not/a/flash/root");
        assert!(matches!(result, Err(PlaybackError::StorageUnavailable(_))));
    }

    #[test]
    fn test_open_read_seek() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("clip.raw"), [1u8, 2, 3, 4, 5]).unwrap();

        let mut storage = DirStorage::mount(dir.path()).unwrap();
        let mut handle = storage.open("/clip.raw").unwrap();
        assert_eq!(handle.len(), 5);

        let mut buf = [0u8; 3];
        assert_eq!(handle.read(&mut buf).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert!(handle.available());

        handle.seek(4).unwrap();
        assert_eq!(handle.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 5);
        assert!(!handle.available());

        assert!(handle.seek(6).is_err());
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = DirStorage::mount(dir.path()).unwrap();
        let result = storage.open("/nope.wav");
        assert!(matches!(result, Err(PlaybackError::SourceNotFound(_))));
    }

    #[test]
    fn test_list_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.wav"), [0u8; 7]).unwrap();
        fs::write(dir.path().join("a.mp3"), [0u8; 2]).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let storage = DirStorage::mount(dir.path()).unwrap();
        let entries = storage.list().unwrap();
        assert_eq!(
            entries,
            vec![
                FileEntry {
                    name: "/a.mp3".into(),
                    size: 2
                },
                FileEntry {
                    name: "/b.wav".into(),
                    size: 7
                },
            ]
        );
    }
}
