//! In-memory byte source backed by an owned buffer.

use super::ByteSource;

/// Reads from a buffer already resident in memory. The common case for
/// template scenarios run against a fixture file loaded up front.
pub struct SliceSource {
    data: Vec<u8>,
    position: u64,
}

impl SliceSource {
    pub fn new(data: Vec<u8>) -> Self {
        SliceSource { data, position: 0 }
    }
}

impl ByteSource for SliceSource {
    fn read_data(&mut self, buf: &mut [u8]) -> usize {
        let start = self.position as usize;
        if start >= self.data.len() {
            return 0;
        }
        let end = (start + buf.len()).min(self.data.len());
        let n = end - start;
        buf[..n].copy_from_slice(&self.data[start..end]);
        self.position += n as u64;
        n
    }

    fn seek(&mut self, offset: u64) {
        self.position = offset;
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}
