//! Typed-secret accumulation with a hard size ceiling
//!
//! Each key press that produces text appends one chunk. Chunks are kept
//! separately so that delete removes exactly what the last key press added,
//! whatever its encoded length.

use zeroize::Zeroizing;

/// Default ceiling on the cumulative secret length (100 KiB)
///
/// Holding a key down or pasting must not grow the lock until the OOM killer
/// ends it, which would unlock the session.
pub const DEFAULT_SECRET_CEILING: usize = 100 * 1024;

/// In-progress secret as an ordered list of byte chunks
///
/// All chunks are wiped from memory when removed or dropped.
pub struct SecretBuffer {
    chunks: Vec<Zeroizing<Vec<u8>>>,
    total: usize,
    ceiling: usize,
}

impl SecretBuffer {
    /// Create an empty buffer with the default ceiling
    pub fn new() -> Self {
        Self::with_ceiling(DEFAULT_SECRET_CEILING)
    }

    /// Create an empty buffer with a custom ceiling
    pub fn with_ceiling(ceiling: usize) -> Self {
        Self {
            chunks: Vec::new(),
            total: 0,
            ceiling,
        }
    }

    /// Append one chunk of decoded key text
    ///
    /// Ignored once the buffer has reached its ceiling. Chunks that would
    /// cross the ceiling are dropped whole, never truncated. Returns whether
    /// the chunk was stored.
    pub fn append(&mut self, bytes: &[u8]) -> bool {
        if bytes.is_empty() || self.total.saturating_add(bytes.len()) > self.ceiling {
            return false;
        }
        self.total += bytes.len();
        self.chunks.push(Zeroizing::new(bytes.to_vec()));
        true
    }

    /// Remove the most recently appended chunk, if any
    pub fn pop_last(&mut self) {
        if let Some(chunk) = self.chunks.pop() {
            self.total -= chunk.len();
        }
    }

    /// Discard the whole secret
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.total = 0;
    }

    /// Concatenate all chunks in insertion order
    pub fn concat(&self) -> Zeroizing<Vec<u8>> {
        let mut out = Zeroizing::new(Vec::with_capacity(self.total));
        for chunk in &self.chunks {
            out.extend_from_slice(chunk);
        }
        out
    }

    /// Total number of bytes held
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Number of chunks held
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }
}

impl Default for SecretBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretBuffer")
            .field("chunks", &self.chunks.len())
            .field("total", &self.total)
            .field("ceiling", &self.ceiling)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_concat_preserve_order() {
        let mut buffer = SecretBuffer::new();
        buffer.append(b"co");
        buffer.append("ř".as_bytes());
        buffer.append(b"rect");

        assert_eq!(buffer.concat().as_slice(), "cořrect".as_bytes());
        assert_eq!(buffer.chunk_count(), 3);
        assert_eq!(buffer.len(), "cořrect".len());
    }

    #[test]
    fn test_pop_last_removes_whole_multibyte_chunk() {
        let mut buffer = SecretBuffer::new();
        buffer.append(b"a");
        buffer.append("€".as_bytes());

        buffer.pop_last();
        assert_eq!(buffer.concat().as_slice(), b"a");
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_pop_last_on_empty_is_noop() {
        let mut buffer = SecretBuffer::new();
        buffer.pop_last();
        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn test_clear_empties_buffer() {
        let mut buffer = SecretBuffer::new();
        buffer.append(b"hunter2");
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.concat().is_empty());
    }

    #[test]
    fn test_ceiling_drops_whole_chunks() {
        let mut buffer = SecretBuffer::with_ceiling(4);
        assert!(buffer.append(b"abc"));
        // Would end at 5 bytes: dropped, not truncated to "d"
        assert!(!buffer.append(b"de"));
        assert!(buffer.append(b"f"));
        assert!(!buffer.append(b"g"));
        assert_eq!(buffer.concat().as_slice(), b"abcf");
    }

    #[test]
    fn test_empty_chunk_is_not_stored() {
        let mut buffer = SecretBuffer::new();
        assert!(!buffer.append(b""));
        assert_eq!(buffer.chunk_count(), 0);
    }

    #[test]
    fn test_debug_does_not_leak_contents() {
        let mut buffer = SecretBuffer::new();
        buffer.append(b"topsecret");
        let debug = format!("{:?}", buffer);
        assert!(!debug.contains("topsecret"));
    }
}
