//! Read-ahead buffer for connection data.
//!
//! Bytes received from the interpreter land here until a read operation
//! claims them. Searches only ever split the buffer at a match end, so
//! unclaimed bytes stay in order for the next read.

use bytes::BytesMut;
use memchr::memmem;
use regex::bytes::Regex;

/// Buffer of received-but-unclaimed bytes.
#[derive(Debug)]
pub struct ReadBuffer {
    buffer: BytesMut,
}

impl ReadBuffer {
    /// Create a new empty buffer.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Append newly received data.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Find the end offset of the first occurrence of `needle`.
    pub fn find(&self, needle: &[u8]) -> Option<usize> {
        memmem::find(&self.buffer, needle).map(|start| start + needle.len())
    }

    /// Find the end offset of the first match of `pattern`.
    pub fn find_pattern(&self, pattern: &Regex) -> Option<usize> {
        pattern.find(&self.buffer).map(|m| m.end())
    }

    /// Take the first `n` bytes (or everything, if fewer are buffered).
    pub fn take(&mut self, n: usize) -> Vec<u8> {
        let n = n.min(self.buffer.len());
        self.buffer.split_to(n).to_vec()
    }

    /// Take everything that is buffered.
    pub fn take_all(&mut self) -> Vec<u8> {
        self.buffer.split().to_vec()
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for ReadBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_returns_match_end() {
        let mut buffer = ReadBuffer::new();
        buffer.extend(b"paste mode\n=== ");
        assert_eq!(buffer.find(b"=== "), Some(15));
        assert_eq!(buffer.find(b"#~eos~"), None);
    }

    #[test]
    fn test_take_preserves_remainder() {
        let mut buffer = ReadBuffer::new();
        buffer.extend(b"first\nsecond");
        let end = buffer.find(b"\n").unwrap();
        assert_eq!(buffer.take(end), b"first\n");
        assert_eq!(buffer.as_slice(), b"second");
        assert_eq!(buffer.take(100), b"second");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_find_pattern() {
        let mut buffer = ReadBuffer::new();
        buffer.extend(b"12>>> 34");
        let pattern = Regex::new(r"\n|>>> ").unwrap();
        assert_eq!(buffer.find_pattern(&pattern), Some(6));
    }

    #[test]
    fn test_take_all_clears_buffer() {
        let mut buffer = ReadBuffer::new();
        buffer.extend(b"test data");
        assert_eq!(buffer.take_all(), b"test data");
        assert!(buffer.is_empty());
        assert!(buffer.take_all().is_empty());
    }
}
