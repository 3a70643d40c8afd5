//! The binary reader: a bit-granular cursor over an opaque byte source,
//! with endianness swapping and scoped "peek" (no-advance) reads.
//!
//! Grounded on `original_source/btvm/io/btvmio.{h,cpp}`: a base class
//! driving cursor arithmetic and endianness, delegating the actual byte
//! fetch to a subclassing contract (`readData`/`size`). The teacher's own
//! `IdaGenericUnpack` trait plays the analogous role in `ida_reader.rs`.

mod slice;
mod stream;

pub use slice::SliceSource;
pub use stream::StreamSource;

use crate::error::{Result, VmError};
use crate::value::{Value, ValueArena, ValueId, ValueKind};

/// Subclassing contract (spec.md §6): concrete byte sources provide
/// `read_data`/`seek`/`size`; all cursor arithmetic, endianness, and
/// bit-unpacking live in [`BinaryReader`].
pub trait ByteSource {
    /// Reads up to `buf.len()` bytes starting at the source's current
    /// position, advancing it by the number of bytes actually read.
    /// Returns fewer bytes than requested only at end-of-file.
    fn read_data(&mut self, buf: &mut [u8]) -> usize;
    fn seek(&mut self, offset: u64);
    fn size(&self) -> u64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    #[default]
    Platform,
    Little,
    Big,
}

#[derive(Debug, Clone, Copy, Default)]
struct BitCursor {
    position: u64,
    bit: u8,
    moved: bool,
    short_read: bool,
    current_byte: u8,
}

pub struct BinaryReader<S> {
    source: S,
    endianness: Endianness,
    cursor: BitCursor,
}

impl<S: ByteSource> BinaryReader<S> {
    pub fn new(source: S) -> Self {
        BinaryReader {
            source,
            endianness: Endianness::default(),
            cursor: BitCursor::default(),
        }
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn set_little_endian(&mut self) {
        self.endianness = Endianness::Little;
    }

    pub fn set_big_endian(&mut self) {
        self.endianness = Endianness::Big;
    }

    pub fn size(&self) -> u64 {
        self.source.size()
    }

    /// Byte position of the cursor. Pending bitfield bits are not reflected
    /// (they belong to the byte at `offset()` until the next alignment).
    pub fn offset(&self) -> u64 {
        self.cursor.position
    }

    /// True only once the source has returned a short read AND the cursor
    /// has moved AND no partial bit is pending (spec.md §4.2).
    pub fn at_eof(&self) -> bool {
        self.cursor.short_read && self.cursor.moved && self.cursor.bit == 0
    }

    /// Flushes any pending bit position and repositions the cursor. Any
    /// partial bit progress is dropped, per spec.md §4.2.
    pub fn seek(&mut self, offset: u64) {
        self.source.seek(offset);
        self.cursor = BitCursor {
            position: offset,
            bit: 0,
            moved: true,
            short_read: false,
            current_byte: 0,
        };
    }

    /// Scoped "peek" read: restores the cursor to its entry position when
    /// dropped, used to implement host functions like `ReadUInt` that read
    /// without disturbing the primary cursor (spec.md's `NoSeek`).
    pub fn no_seek(&mut self) -> NoSeekGuard<'_, S> {
        NoSeekGuard {
            reader: self,
            saved: None,
        }
        .armed()
    }

    fn align_to_byte(&mut self) {
        if self.cursor.bit != 0 {
            self.cursor.position += 1;
            self.cursor.bit = 0;
        }
    }

    fn read_raw(&mut self, n: u64) -> Vec<u8> {
        self.align_to_byte();
        let mut buf = vec![0u8; n as usize];
        self.source.seek(self.cursor.position);
        let got = self.source.read_data(&mut buf);
        buf.truncate(got);
        self.cursor.position += got as u64;
        self.cursor.moved = true;
        self.cursor.short_read = (got as u64) < n;
        buf
    }

    /// Reads `nbits` bits, least-significant-bit first within each byte,
    /// packing into a `u64` accumulator (spec.md §4.2 bitfields).
    fn read_bits(&mut self, nbits: u32) -> u64 {
        let mut result: u64 = 0;
        for i in 0..nbits {
            if self.cursor.bit == 0 {
                self.source.seek(self.cursor.position);
                let mut byte = [0u8; 1];
                let got = self.source.read_data(&mut byte);
                if got == 0 {
                    self.cursor.short_read = true;
                    break;
                }
                self.cursor.current_byte = byte[0];
            }

            let bit_value = (self.cursor.current_byte >> self.cursor.bit) & 1;
            result |= (bit_value as u64) << i;

            self.cursor.bit += 1;
            if self.cursor.bit == 8 {
                self.cursor.bit = 0;
                self.cursor.position += 1;
            }
            self.cursor.moved = true;
        }
        result
    }

    /// Normalizes a just-read byte run to little-endian order (the order
    /// `bytes_to_u64` expects), per the reader's current endianness.
    fn swap_bytes(&self, bytes: &mut [u8]) {
        let width = bytes.len();
        if width != 1 && width != 2 && width != 4 && width != 8 {
            return;
        }
        let wire_is_le = match self.endianness {
            Endianness::Little => true,
            Endianness::Big => false,
            Endianness::Platform => cfg!(target_endian = "little"),
        };
        if !wire_is_le {
            bytes.reverse();
        }
    }

    /// Reads a value from the stream per spec.md §4.2: bitfield members
    /// read bit-by-bit at the current bit offset; everything else aligns
    /// to a byte boundary first, reads `byte_size` bytes, swaps to CPU
    /// endianness, and stores into `value`. Arrays dispatch element by
    /// element.
    pub fn read_into(
        &mut self,
        arena: &mut ValueArena,
        id: ValueId,
        byte_size: u64,
    ) -> Result<()> {
        if arena.get(id).is_array() {
            let members = arena.get(id).members.clone();
            for member in members {
                let member_size = crate::interp::size::size_of_value(arena, member)?;
                self.read_into(arena, member, member_size)?;
            }
            return Ok(());
        }

        if let Some(bits) = arena.get(id).bit_width {
            let raw = self.read_bits(bits);
            let value = arena.get_mut(id);
            store_scalar_bits(value, raw);
            return Ok(());
        }

        let offset = self.offset();
        let mut bytes = self.read_raw(byte_size);
        {
            let value = arena.get_mut(id);
            value.offset.get_or_insert(offset);
        }

        let value = arena.get_mut(id);
        if value.is_string() {
            value.string_buf = bytes;
            return Ok(());
        }
        if !value.is_scalar() && !value.is_enum() {
            return Err(VmError::internal(format!(
                "cannot read raw bytes into '{}'",
                value.type_name()
            )));
        }
        bytes.resize(byte_size as usize, 0);
        self.swap_bytes(&mut bytes);
        let raw = bytes_to_u64(&bytes);
        store_scalar_bits(value, raw);
        Ok(())
    }
}

fn bytes_to_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let n = bytes.len().min(8);
    buf[..n].copy_from_slice(&bytes[..n]);
    u64::from_le_bytes(buf)
}

fn store_scalar_bits(value: &mut Value, raw: u64) {
    value.scalar = match value.kind {
        ValueKind::Float => crate::value::Scalar::Float(f32::from_bits(raw as u32) as f64),
        ValueKind::Double => crate::value::Scalar::Float(f64::from_bits(raw)),
        k if k.is_signed() => {
            let width = value.bit_width.map(|b| b as u64).or(k.byte_width().map(|w| w * 8)).unwrap_or(64);
            crate::value::Scalar::Int(sign_extend(raw, width))
        }
        _ => crate::value::Scalar::UInt(raw),
    };
}

fn sign_extend(raw: u64, width: u64) -> i64 {
    if width >= 64 {
        return raw as i64;
    }
    let shift = 64 - width;
    ((raw << shift) as i64) >> shift
}

/// RAII guard restoring the reader's cursor on drop; the no-op until armed.
pub struct NoSeekGuard<'a, S: ByteSource> {
    reader: &'a mut BinaryReader<S>,
    saved: Option<BitCursor>,
}

impl<'a, S: ByteSource> NoSeekGuard<'a, S> {
    fn armed(mut self) -> Self {
        self.saved = Some(self.reader.cursor);
        self
    }

    pub fn reader(&mut self) -> &mut BinaryReader<S> {
        self.reader
    }
}

impl<'a, S: ByteSource> Drop for NoSeekGuard<'a, S> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved {
            self.reader.seek(saved.position);
            self.reader.cursor = saved;
        }
    }
}
