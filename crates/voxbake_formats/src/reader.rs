//! Bounds-checked little-endian cursor over a byte slice.
//!
//! Every container is read through [`ByteReader`]. Chunk payloads are
//! handed to their handlers as sub-readers over exactly the declared
//! content size, so a handler that stops early can never leave the outer
//! stream misaligned.

use voxbake_core::Rgba;

use crate::error::{DecodeError, DecodeResult};

/// Zero-copy reader over a byte buffer.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buffer: &'a [u8],
    position: usize,
    /// Absolute offset of `buffer[0]` in the outermost stream.
    base: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader over a buffer.
    #[inline]
    #[must_use]
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
            base: 0,
        }
    }

    /// Absolute offset of the next read.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.base + self.position
    }

    /// Returns the number of bytes remaining.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// True when nothing is left to read.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Reads `len` raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedStream` if fewer than `len` bytes remain.
    #[inline]
    pub fn read_bytes(&mut self, len: usize) -> DecodeResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(DecodeError::TruncatedStream {
                needed: len,
                remaining: self.remaining(),
                offset: self.offset(),
            });
        }
        let bytes = &self.buffer[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }

    /// Reads a fixed-size array.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedStream` if fewer than `N` bytes remain.
    #[inline]
    pub fn read_array<const N: usize>(&mut self) -> DecodeResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Skips `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedStream` if fewer than `len` bytes remain.
    #[inline]
    pub fn skip(&mut self, len: usize) -> DecodeResult<()> {
        self.read_bytes(len).map(|_| ())
    }

    /// Splits off the next `len` bytes as an independent reader and advances
    /// past them.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedStream` if fewer than `len` bytes remain.
    pub fn sub_reader(&mut self, len: usize) -> DecodeResult<ByteReader<'a>> {
        let base = self.offset();
        let buffer = self.read_bytes(len)?;
        Ok(ByteReader {
            buffer,
            position: 0,
            base,
        })
    }

    /// Reads a single byte.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedStream` at end of input.
    #[inline]
    pub fn read_u8(&mut self) -> DecodeResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Reads a byte as a boolean (non-zero is true).
    ///
    /// # Errors
    ///
    /// Returns `TruncatedStream` at end of input.
    #[inline]
    pub fn read_bool(&mut self) -> DecodeResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Reads a little-endian u16.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedStream` if fewer than 2 bytes remain.
    #[inline]
    pub fn read_u16(&mut self) -> DecodeResult<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    /// Reads a little-endian u32.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedStream` if fewer than 4 bytes remain.
    #[inline]
    pub fn read_u32(&mut self) -> DecodeResult<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    /// Reads a little-endian i32.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedStream` if fewer than 4 bytes remain.
    #[inline]
    pub fn read_i32(&mut self) -> DecodeResult<i32> {
        self.read_array().map(i32::from_le_bytes)
    }

    /// Reads a little-endian f32.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedStream` if fewer than 4 bytes remain.
    #[inline]
    pub fn read_f32(&mut self) -> DecodeResult<f32> {
        self.read_u32().map(f32::from_bits)
    }

    /// Reads a 4-byte chunk tag.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedStream` if fewer than 4 bytes remain.
    #[inline]
    pub fn read_tag(&mut self) -> DecodeResult<[u8; 4]> {
        self.read_array()
    }

    /// Reads four bytes as `r, g, b, a`.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedStream` if fewer than 4 bytes remain.
    #[inline]
    pub fn read_rgba(&mut self) -> DecodeResult<Rgba> {
        let [r, g, b, a] = self.read_array()?;
        Ok(Rgba::new(r, g, b, a))
    }

    /// Reads an i32 count and rejects negative values.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedStream` at end of input or `InvalidLength` for a
    /// negative count.
    pub fn read_count_i32(&mut self) -> DecodeResult<usize> {
        let offset = self.offset();
        let value = self.read_i32()?;
        usize::try_from(value).map_err(|_| DecodeError::InvalidLength {
            length: i64::from(value),
            offset,
        })
    }

    /// Reads `len` bytes as a (lossy) UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedStream` if fewer than `len` bytes remain.
    pub fn read_string(&mut self, len: usize) -> DecodeResult<String> {
        self.read_bytes(len)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Peeks at the next `len` bytes without consuming them.
    #[must_use]
    pub fn peek(&self, len: usize) -> Option<&'a [u8]> {
        self.buffer.get(self.position..self.position + len)
    }

    /// Capacity hint for `count` records of `record_size` bytes, capped by
    /// what the stream can actually hold.
    #[inline]
    #[must_use]
    pub const fn capacity_hint(&self, count: usize, record_size: usize) -> usize {
        let fits = self.remaining() / record_size;
        if count < fits {
            count
        } else {
            fits
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_reads() {
        let data = [0x01, 0x02, 0x03, 0x04, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x80, 0x3F];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_u32().unwrap(), 0x0403_0201);
        assert_eq!(reader.read_i32().unwrap(), -1);
        assert!((reader.read_f32().unwrap() - 1.0).abs() < f32::EPSILON);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_truncation_is_an_error() {
        let mut reader = ByteReader::new(&[1, 2, 3]);
        let err = reader.read_u32().unwrap_err();
        assert!(matches!(
            err,
            DecodeError::TruncatedStream { needed: 4, remaining: 3, offset: 0 }
        ));
        // Failed reads do not consume.
        assert_eq!(reader.remaining(), 3);
    }

    #[test]
    fn test_sub_reader_is_bounded_and_offset_aware() {
        let data = [9, 1, 2, 3, 4, 5];
        let mut reader = ByteReader::new(&data);
        reader.skip(1).unwrap();
        let mut sub = reader.sub_reader(2).unwrap();
        assert_eq!(sub.offset(), 1);
        assert_eq!(sub.read_u8().unwrap(), 1);
        assert_eq!(sub.read_u8().unwrap(), 2);
        assert!(sub.read_u8().is_err());
        // Outer reader already sits after the sub-slice.
        assert_eq!(reader.read_u8().unwrap(), 3);
    }

    #[test]
    fn test_negative_count_rejected() {
        let data = (-5i32).to_le_bytes();
        let mut reader = ByteReader::new(&data);
        assert!(matches!(
            reader.read_count_i32(),
            Err(DecodeError::InvalidLength { length: -5, .. })
        ));
    }

    #[test]
    fn test_capacity_hint_caps_hostile_counts() {
        let data = [0u8; 16];
        let reader = ByteReader::new(&data);
        assert_eq!(reader.capacity_hint(1_000_000, 4), 4);
        assert_eq!(reader.capacity_hint(2, 4), 2);
    }
}
