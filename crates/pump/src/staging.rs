//! Staging buffer
//!
//! Fixed-capacity accumulator for bytes read from stdin awaiting
//! transmission. While a write transfer is in flight the buffer is locked:
//! its contents belong to the transfer and must not change until the
//! completion clears and unlocks it. The lock is the only synchronization in
//! the pump; it models temporal ownership transfer, not concurrent access.

use std::io::{self, Read};

pub struct StagingBuffer {
    bytes: Vec<u8>,
    capacity: usize,
    locked: bool,
}

impl StagingBuffer {
    /// Create an empty, unlocked buffer with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            capacity,
            locked: false,
        }
    }

    /// Remaining capacity in bytes
    pub fn avail(&self) -> usize {
        self.capacity - self.bytes.len()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn locked(&self) -> bool {
        self.locked
    }

    /// Staged bytes awaiting submission
    pub fn contents(&self) -> &[u8] {
        &self.bytes
    }

    /// Mark the contents as owned by an in-flight write
    pub fn lock(&mut self) {
        debug_assert!(!self.locked, "staging buffer locked twice");
        self.locked = true;
    }

    /// Discard the delivered contents and release the lock
    pub fn clear_and_unlock(&mut self) {
        self.bytes.clear();
        self.locked = false;
    }

    /// Append up to `avail()` bytes from `reader`
    ///
    /// Returns the number of bytes read; `0` signals end-of-stream. Callers
    /// must only invoke this while unlocked with capacity available.
    pub fn fill_from<R: Read>(&mut self, reader: &mut R) -> io::Result<usize> {
        debug_assert!(!self.locked, "filling a locked staging buffer");
        debug_assert!(self.avail() > 0, "filling a full staging buffer");

        let start = self.bytes.len();
        self.bytes.resize(self.capacity, 0);
        match reader.read(&mut self.bytes[start..]) {
            Ok(n) => {
                self.bytes.truncate(start + n);
                Ok(n)
            }
            Err(e) => {
                self.bytes.truncate(start);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_new_buffer_is_empty_and_unlocked() {
        let staging = StagingBuffer::new(100);
        assert_eq!(staging.avail(), 100);
        assert!(staging.is_empty());
        assert!(!staging.locked());
    }

    #[test]
    fn test_fill_appends_and_reports_count() {
        let mut staging = StagingBuffer::new(100);
        let mut input = Cursor::new(b"hello".to_vec());

        let n = staging.fill_from(&mut input).unwrap();
        assert_eq!(n, 5);
        assert_eq!(staging.contents(), b"hello");
        assert_eq!(staging.avail(), 95);
    }

    #[test]
    fn test_fill_accumulates_across_calls() {
        let mut staging = StagingBuffer::new(100);
        staging.fill_from(&mut Cursor::new(b"abc".to_vec())).unwrap();
        staging.fill_from(&mut Cursor::new(b"def".to_vec())).unwrap();
        assert_eq!(staging.contents(), b"abcdef");
    }

    #[test]
    fn test_fill_never_exceeds_capacity() {
        let mut staging = StagingBuffer::new(4);
        let n = staging
            .fill_from(&mut Cursor::new(b"abcdefgh".to_vec()))
            .unwrap();
        assert_eq!(n, 4);
        assert_eq!(staging.len(), 4);
        assert_eq!(staging.avail(), 0);
    }

    #[test]
    fn test_fill_zero_signals_end_of_stream() {
        let mut staging = StagingBuffer::new(10);
        let n = staging.fill_from(&mut Cursor::new(Vec::new())).unwrap();
        assert_eq!(n, 0);
        assert!(staging.is_empty());
    }

    #[test]
    fn test_clear_and_unlock_resets_state() {
        let mut staging = StagingBuffer::new(10);
        staging.fill_from(&mut Cursor::new(b"xy".to_vec())).unwrap();
        staging.lock();
        assert!(staging.locked());

        staging.clear_and_unlock();
        assert!(!staging.locked());
        assert!(staging.is_empty());
        assert_eq!(staging.avail(), 10);
    }
}
