//! Bounds-checked big-endian reads over an immutable byte buffer.

use crate::error::{DecodeError, Result};

/// Variable-length quantities are at most 4 encoded bytes (28 value bits).
const MAX_VAR_LEN_BYTES: usize = 4;

/// A read position over `data[..end]`.
///
/// `end` may be smaller than the buffer, which confines every read to a
/// sub-range such as a track body. Offsets in errors are absolute buffer
/// offsets.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            end: data.len(),
        }
    }

    /// Cursor over `data[start..end]`, with `end` clamped to the buffer.
    pub fn bounded(data: &'a [u8], start: usize, end: usize) -> Self {
        let end = end.min(data.len());
        Self {
            data,
            pos: start.min(end),
            end,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.end - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.end
    }

    fn check(&self, offset: usize, width: usize) -> Result<()> {
        match offset.checked_add(width) {
            Some(stop) if stop <= self.end => Ok(()),
            _ => Err(DecodeError::OutOfBounds {
                offset,
                width,
                len: self.end,
            }),
        }
    }

    /// Big-endian `u16` at an absolute offset. Does not move the cursor.
    pub fn read_u16_at(&self, offset: usize) -> Result<u16> {
        self.check(offset, 2)?;
        Ok(u16::from_be_bytes([self.data[offset], self.data[offset + 1]]))
    }

    /// Big-endian `u32` at an absolute offset. Does not move the cursor.
    pub fn read_u32_at(&self, offset: usize) -> Result<u32> {
        self.check(offset, 4)?;
        Ok(u32::from_be_bytes([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ]))
    }

    pub fn peek_u8(&self) -> Result<u8> {
        self.check(self.pos, 1)?;
        Ok(self.data[self.pos])
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let byte = self.peek_u8()?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let value = self.read_u16_at(self.pos)?;
        self.pos += 2;
        Ok(value)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let value = self.read_u32_at(self.pos)?;
        self.pos += 4;
        Ok(value)
    }

    /// Borrow the next `len` bytes and advance past them.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        self.check(self.pos, len)?;
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    /// Read an SMF variable-length quantity.
    ///
    /// Each byte contributes its low 7 bits, most significant first; a set
    /// high bit means another byte follows. On failure the cursor is left
    /// where it was.
    pub fn read_var_len(&mut self) -> Result<u32> {
        let start = self.pos;
        let mut value = 0u32;
        for i in 0..MAX_VAR_LEN_BYTES {
            let offset = start + i;
            if offset >= self.end {
                return Err(DecodeError::Truncated { offset: start });
            }
            let byte = self.data[offset];
            value = (value << 7) | u32::from(byte & 0x7F);
            if byte & 0x80 == 0 {
                self.pos = offset + 1;
                return Ok(value);
            }
        }
        // The 4th byte still asked for a continuation.
        Err(DecodeError::Truncated { offset: start })
    }
}
