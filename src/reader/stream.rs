//! Byte source backed by any seekable stream (a file, typically).

use std::io::{Read, Seek, SeekFrom};

use super::ByteSource;

/// Generic over any `Read + Seek`, mirroring the teacher's generic-over-I/O
/// style (`IdaGenericBufUnpack`) rather than boxing a trait object.
pub struct StreamSource<R> {
    inner: R,
    size: u64,
}

impl<R: Read + Seek> StreamSource<R> {
    pub fn new(mut inner: R) -> std::io::Result<Self> {
        let size = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(StreamSource { inner, size })
    }
}

impl<R: Read + Seek> ByteSource for StreamSource<R> {
    fn read_data(&mut self, buf: &mut [u8]) -> usize {
        let mut total = 0;
        while total < buf.len() {
            match self.inner.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(_) => break,
            }
        }
        total
    }

    fn seek(&mut self, offset: u64) {
        let _ = self.inner.seek(SeekFrom::Start(offset));
    }

    fn size(&self) -> u64 {
        self.size
    }
}
