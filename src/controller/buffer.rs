//! Bounded read buffer
//!
//! Holds the most recent chunk read from storage plus, on the compressed
//! path, any undecoded tail retained from the previous tick. Capacity is
//! fixed at construction; reads never grow it.

use crate::storage::SourceHandle;
use crate::Result;

/// Fixed-capacity byte buffer owned by the controller
#[derive(Debug, Clone)]
pub struct DecodeBuffer {
    data: Box<[u8]>,
    len: usize,
}

impl DecodeBuffer {
    /// Allocate a buffer of `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        DecodeBuffer {
            data: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    /// Total capacity
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes currently held
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Held bytes
    pub fn contents(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Append up to `max` bytes read from `handle`
    ///
    /// Returns the number of bytes read; zero is not end of stream.
    pub fn fill_from<H: SourceHandle + ?Sized>(
        &mut self,
        handle: &mut H,
        max: usize,
    ) -> Result<usize> {
        let space = (self.capacity() - self.len).min(max);
        if space == 0 {
            return Ok(0);
        }
        let n = handle.read(&mut self.data[self.len..self.len + space])?;
        self.len += n;
        Ok(n)
    }

    /// Drop the first `n` bytes, shifting the rest to the front
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.len);
        self.data.copy_within(n..self.len, 0);
        self.len -= n;
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, Storage};

    #[test]
    fn test_fill_is_bounded() {
        let mut storage = MemoryStorage::new();
        storage.insert("/clip", (0..20).collect());
        let mut handle = storage.open("/clip").unwrap();

        let mut buffer = DecodeBuffer::with_capacity(8);
        assert_eq!(buffer.fill_from(&mut handle, 5).unwrap(), 5);
        assert_eq!(buffer.fill_from(&mut handle, 5).unwrap(), 3);
        assert_eq!(buffer.fill_from(&mut handle, 5).unwrap(), 0);
        assert_eq!(buffer.contents(), &[0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_consume_keeps_tail() {
        let mut storage = MemoryStorage::new();
        storage.insert("/clip", (0..6).collect());
        let mut handle = storage.open("/clip").unwrap();

        let mut buffer = DecodeBuffer::with_capacity(6);
        buffer.fill_from(&mut handle, 6).unwrap();
        buffer.consume(4);
        assert_eq!(buffer.contents(), &[4, 5]);

        buffer.consume(10);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut buffer = DecodeBuffer::with_capacity(4);
        let mut storage = MemoryStorage::new();
        storage.insert("/clip", vec![1, 2]);
        let mut handle = storage.open("/clip").unwrap();
        buffer.fill_from(&mut handle, 4).unwrap();
        assert_eq!(buffer.len(), 2);
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 4);
    }
}
