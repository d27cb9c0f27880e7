//! zlib-stream decompression of Gateway binary frames.
//!
//! Grounded on `twilight-gateway`'s `shard/processor/inflater.rs`: buffer
//! compressed bytes across frames until the four-byte marker `00 00 FF FF`
//! terminates a message, then run the whole accumulated buffer through a
//! single persistent `flate2::Decompress` (Discord's stream spans the
//! entire connection, not just one message).

use flate2::{Decompress, DecompressError, FlushDecompress};
use std::time::Instant;

const ZLIB_SUFFIX: [u8; 4] = [0x00, 0x00, 0xff, 0xff];
const INTERNAL_BUFFER_SIZE: usize = 32 * 1024;

#[derive(Debug)]
pub struct Inflater {
    decompress: Decompress,
    compressed: Vec<u8>,
    internal_buffer: Vec<u8>,
    buffer: Vec<u8>,
    last_resize: Instant,
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

impl Inflater {
    pub fn new() -> Self {
        Self {
            decompress: Decompress::new(true),
            compressed: Vec::new(),
            internal_buffer: Vec::with_capacity(INTERNAL_BUFFER_SIZE),
            buffer: Vec::with_capacity(INTERNAL_BUFFER_SIZE),
            last_resize: Instant::now(),
        }
    }

    pub fn extend(&mut self, slice: &[u8]) {
        self.compressed.extend_from_slice(slice);
    }

    /// Decompresses and returns the next complete message, or `None` if the
    /// accumulated bytes don't yet end in the zlib-stream suffix.
    pub fn msg(&mut self) -> Result<Option<&[u8]>, DecompressError> {
        let length = self.compressed.len();

        if length < 4 || self.compressed[(length - 4)..] != ZLIB_SUFFIX {
            return Ok(None);
        }

        let before = self.decompress.total_in();
        let mut offset = 0;

        loop {
            self.internal_buffer.clear();

            self.decompress.decompress_vec(
                &self.compressed[offset..],
                &mut self.internal_buffer,
                FlushDecompress::Sync,
            )?;

            offset = usize::try_from(self.decompress.total_in() - before).unwrap_or_default();
            self.buffer.extend_from_slice(&self.internal_buffer);

            let not_at_capacity = self.internal_buffer.len() < self.internal_buffer.capacity();

            if not_at_capacity || offset > self.compressed.len() {
                break;
            }
        }

        self.compressed.clear();

        Ok(Some(&self.buffer))
    }

    /// Clears the message buffer, shrinking its backing allocation back
    /// down if it has grown well past what recent messages needed.
    pub fn clear(&mut self) {
        self.shrink();
        self.compressed.clear();
        self.internal_buffer.clear();
        self.buffer.clear();
    }

    fn shrink(&mut self) {
        const SHRINK_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

        if self.last_resize.elapsed() < SHRINK_INTERVAL {
            return;
        }

        if self.buffer.capacity() > self.buffer.len() * 4 {
            self.buffer.shrink_to_fit();
        }

        self.last_resize = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::Inflater;
    use flate2::{write::ZlibEncoder, Compression};
    use std::io::Write;

    fn compress(payloads: &[&[u8]]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        for payload in payloads {
            encoder.write_all(payload).unwrap();
            encoder.flush().unwrap();
        }
        encoder.finish().unwrap()
    }

    #[test]
    fn buffers_until_the_suffix_marker_is_seen() {
        let full = compress(&[br#"{"op":10}"#]);
        let mut inflater = Inflater::new();

        inflater.extend(&full[..full.len() - 2]);
        assert!(inflater.msg().unwrap().is_none());

        inflater.extend(&full[full.len() - 2..]);
        let message = inflater.msg().unwrap().unwrap().to_vec();
        assert_eq!(message, br#"{"op":10}"#);
    }

    #[test]
    fn clear_resets_the_message_buffer() {
        let full = compress(&[br#"{"op":10}"#]);
        let mut inflater = Inflater::new();
        inflater.extend(&full);
        inflater.msg().unwrap();
        inflater.clear();
        assert!(inflater.compressed.is_empty());
    }
}
