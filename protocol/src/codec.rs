//! Fixed-width little-endian integer codec and byte cursors.
//!
//! KEEL has no variable-length integers anywhere on the wire. Every field is
//! 1, 2, 4 or 8 bytes, little-endian, so every offset is computable up front
//! and a decoder only ever has to ask "are there N more bytes?".
//!
//! [`Writer`] and [`Reader`] are the cursors every encoder and decoder in the
//! crate is written against. Decoders finish with [`Reader::ensure_exhausted`]
//! so trailing garbage is always an error, never silently ignored.

use thiserror::Error;

/// Errors produced by the integer codec and the byte cursors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The value does not fit in the requested width.
    #[error("value {value} overflows a {width}-byte unsigned integer")]
    Overflow { value: u64, width: usize },

    /// Fewer bytes remain than the field requires.
    #[error("needed {needed} bytes but only {remaining} remain")]
    Underflow { needed: usize, remaining: usize },

    /// A fixed-width decode was handed a slice of the wrong length.
    #[error("expected exactly {expected} bytes, got {actual}")]
    WidthMismatch { expected: usize, actual: usize },

    /// Bytes were left over after a complete structure was read.
    #[error("{remaining} excess bytes after end of structure")]
    ExcessBytes { remaining: usize },
}

/// The four integer widths the protocol uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UIntWidth {
    U8,
    U16,
    U32,
    U64,
}

impl UIntWidth {
    /// Width in bytes.
    pub const fn bytes(self) -> usize {
        match self {
            UIntWidth::U8 => 1,
            UIntWidth::U16 => 2,
            UIntWidth::U32 => 4,
            UIntWidth::U64 => 8,
        }
    }

    /// Largest value representable at this width.
    pub const fn max(self) -> u64 {
        match self {
            UIntWidth::U8 => u8::MAX as u64,
            UIntWidth::U16 => u16::MAX as u64,
            UIntWidth::U32 => u32::MAX as u64,
            UIntWidth::U64 => u64::MAX,
        }
    }
}

/// Encodes `value` as a little-endian integer of exactly `width` bytes.
///
/// # Errors
///
/// [`CodecError::Overflow`] if `value` exceeds the width's maximum. Encoding
/// `256` in one byte or `0x1_0000_0000` in four bytes both fail.
pub fn encode_uint(value: u64, width: UIntWidth) -> Result<Vec<u8>, CodecError> {
    if value > width.max() {
        return Err(CodecError::Overflow {
            value,
            width: width.bytes(),
        });
    }
    Ok(value.to_le_bytes()[..width.bytes()].to_vec())
}

/// Decodes a little-endian integer. The slice must be exactly `width` bytes.
pub fn decode_uint(bytes: &[u8], width: UIntWidth) -> Result<u64, CodecError> {
    if bytes.len() != width.bytes() {
        return Err(CodecError::WidthMismatch {
            expected: width.bytes(),
            actual: bytes.len(),
        });
    }
    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(u64::from_le_bytes(buf))
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Append-only byte sink for canonical encodings.
#[derive(Debug, Default, Clone)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes `value` at the given width, failing on overflow. Used for
    /// length prefixes that start life as `usize`.
    pub fn put_uint(&mut self, value: u64, width: UIntWidth) -> Result<(), CodecError> {
        let encoded = encode_uint(value, width)?;
        self.buf.extend_from_slice(&encoded);
        Ok(())
    }

    /// Writes a length prefix of the given width followed by the bytes.
    pub fn put_prefixed(&mut self, bytes: &[u8], width: UIntWidth) -> Result<(), CodecError> {
        self.put_uint(bytes.len() as u64, width)?;
        self.put_bytes(bytes);
        Ok(())
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Bounds-checked cursor over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Offset of the next byte to be read.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < len {
            return Err(CodecError::Underflow {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let out = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Fails with [`CodecError::ExcessBytes`] if anything is left unread.
    pub fn ensure_exhausted(&self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(CodecError::ExcessBytes { remaining }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
