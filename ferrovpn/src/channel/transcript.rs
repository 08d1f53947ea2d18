//! Sliding-window transcript of one output stream.
//!
//! Prompt detection only ever looks at the end of the output, so the
//! transcript keeps just the trailing `capacity` bytes. Memory use is
//! O(longest marker), not O(output size).

use bytes::{Buf, BytesMut};

/// Trailing window over a stream's output, used for suffix matching.
#[derive(Debug)]
pub struct Transcript {
    /// The most recent bytes, at most `capacity` long.
    window: BytesMut,

    /// How many trailing bytes are retained.
    capacity: usize,

    /// Total bytes ever appended.
    total: u64,
}

impl Transcript {
    /// Create a transcript retaining the last `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            window: BytesMut::with_capacity(capacity * 2),
            capacity,
            total: 0,
        }
    }

    /// Append one byte.
    pub fn push(&mut self, byte: u8) {
        self.window.extend_from_slice(&[byte]);
        self.total += 1;
        self.trim();
    }

    /// Append several bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.window.extend_from_slice(data);
        self.total += data.len() as u64;
        self.trim();
    }

    /// Check whether everything appended so far ends with `marker`.
    ///
    /// Markers longer than the capacity can never match.
    pub fn ends_with(&self, marker: &[u8]) -> bool {
        self.window.ends_with(marker)
    }

    /// The retained tail.
    pub fn tail(&self) -> &[u8] {
        &self.window
    }

    /// Total number of bytes appended, including those trimmed away.
    pub fn total_len(&self) -> u64 {
        self.total
    }

    fn trim(&mut self) {
        // BytesMut::advance() is an O(1) pointer bump.
        if self.window.len() > self.capacity {
            let excess = self.window.len() - self.capacity;
            self.window.advance(excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_after_each_push() {
        let mut transcript = Transcript::new(16);
        for &b in b"Enter pass phrase" {
            transcript.push(b);
            assert!(!transcript.ends_with(b"phrase:"));
        }
        transcript.push(b':');
        assert!(transcript.ends_with(b"phrase:"));
    }

    #[test]
    fn test_window_is_bounded() {
        let mut transcript = Transcript::new(8);
        transcript.extend(&[b'x'; 1000]);
        transcript.extend(b"done");

        assert_eq!(transcript.tail().len(), 8);
        assert_eq!(transcript.tail(), b"xxxxdone");
        assert_eq!(transcript.total_len(), 1004);
        assert!(transcript.ends_with(b"done"));
    }

    #[test]
    fn test_marker_longer_than_window_never_matches() {
        let mut transcript = Transcript::new(4);
        transcript.extend(b"abcdef");
        assert!(!transcript.ends_with(b"abcdef"));
        assert!(transcript.ends_with(b"cdef"));
    }
}
