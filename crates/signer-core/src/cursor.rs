//! Typed byte cursors for the fixed-layout wire formats.
//!
//! Every message exchanged with the device has a fixed layout mixing
//! big-endian and little-endian integers. [`Reader`] and [`Writer`] keep the
//! offset bookkeeping in one place so that the envelope, channel and codec
//! never index into buffers with running offsets.
//!
//! # Example
//!
//! ```
//! use lattice_signer_core::cursor::{Reader, Writer};
//!
//! let mut w = Writer::new();
//! w.put_u32_le(7);
//! w.put_u16_be(0x0102);
//! let bytes = w.into_vec();
//!
//! let mut r = Reader::new(&bytes);
//! assert_eq!(r.read_u32_le().unwrap(), 7);
//! assert_eq!(r.read_u16_be().unwrap(), 0x0102);
//! assert_eq!(r.remaining(), 0);
//! ```

use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};

/// A bounds-checked reader over a byte slice.
///
/// Running past the end of the buffer yields [`Error::Protocol`], since
/// every buffer read this way comes from the device.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a reader positioned at the start of `buf`.
    #[must_use]
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Returns the number of bytes consumed so far.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Returns the number of unread bytes.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Reads the next `n` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if fewer than `n` bytes remain.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::Protocol(format!(
                "unexpected end of data: need {n} bytes at offset {}, {} remaining",
                self.pos,
                self.remaining()
            )));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Reads the next `N` bytes into an array.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if fewer than `N` bytes remain.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Skips `n` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if fewer than `n` bytes remain.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }

    /// Reads a single byte.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] on underflow.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Reads a big-endian `u16`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] on underflow.
    pub fn read_u16_be(&mut self) -> Result<u16> {
        self.read_array().map(u16::from_be_bytes)
    }

    /// Reads a little-endian `u16`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] on underflow.
    pub fn read_u16_le(&mut self) -> Result<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    /// Reads a big-endian `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] on underflow.
    pub fn read_u32_be(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_be_bytes)
    }

    /// Reads a little-endian `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] on underflow.
    pub fn read_u32_le(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    /// Consumes and returns every unread byte.
    pub fn rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }
}

/// A growable writer producing wire buffers.
#[derive(Debug, Clone, Default)]
pub struct Writer {
    buf: BytesMut,
}

impl Writer {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty writer with room for `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Returns the number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Returns the bytes written so far.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn put_u16_be(&mut self, v: u16) {
        self.buf.put_u16(v);
    }

    pub fn put_u16_le(&mut self, v: u16) {
        self.buf.put_u16_le(v);
    }

    pub fn put_u32_be(&mut self, v: u32) {
        self.buf.put_u32(v);
    }

    pub fn put_u32_le(&mut self, v: u32) {
        self.buf.put_u32_le(v);
    }

    pub fn put_slice(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Writes `n` zero bytes.
    pub fn put_zeros(&mut self, n: usize) {
        self.buf.put_bytes(0, n);
    }

    /// Writes `bytes` into a fixed-width field, zero-filling the remainder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if `bytes` is longer than `width`.
    pub fn put_padded(&mut self, bytes: &[u8], width: usize) -> Result<()> {
        if bytes.len() > width {
            return Err(Error::Encoding(format!(
                "field of {} bytes exceeds its {width}-byte slot",
                bytes.len()
            )));
        }
        self.put_slice(bytes);
        self.put_zeros(width - bytes.len());
        Ok(())
    }

    /// Zero-pads the buffer up to `len` bytes total. No-op if already longer.
    pub fn pad_to(&mut self, len: usize) {
        if self.buf.len() < len {
            self.put_zeros(len - self.buf.len());
        }
    }

    /// Consumes the writer and returns the written bytes.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_mixed_endianness() {
        let bytes = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09];
        let mut r = Reader::new(&bytes);

        assert_eq!(r.read_u8().unwrap(), 0x01);
        assert_eq!(r.read_u16_be().unwrap(), 0x0203);
        assert_eq!(r.read_u16_le().unwrap(), 0x0504);
        assert_eq!(r.read_u32_be().unwrap(), 0x0607_0809);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn reader_underflow_is_protocol_error() {
        let bytes = [0x01, 0x02];
        let mut r = Reader::new(&bytes);

        let err = r.read_u32_le().unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        // A failed read consumes nothing.
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn reader_rest_and_skip() {
        let bytes = [1, 2, 3, 4, 5];
        let mut r = Reader::new(&bytes);
        r.skip(2).unwrap();
        assert_eq!(r.rest(), &[3, 4, 5]);
        assert_eq!(r.remaining(), 0);
        assert!(r.skip(1).is_err());
    }

    #[test]
    fn writer_layout() {
        let mut w = Writer::with_capacity(16);
        w.put_u8(0xaa);
        w.put_u16_le(0x0102);
        w.put_u32_be(0x0304_0506);
        w.put_slice(b"ok");
        assert_eq!(
            w.as_slice(),
            &[0xaa, 0x02, 0x01, 0x03, 0x04, 0x05, 0x06, b'o', b'k']
        );
    }

    #[test]
    fn writer_padding() {
        let mut w = Writer::new();
        w.put_padded(b"abc", 5).unwrap();
        assert_eq!(w.as_slice(), b"abc\0\0");
        assert!(w.put_padded(b"toolong", 3).is_err());

        w.pad_to(8);
        assert_eq!(w.len(), 8);
        w.pad_to(4);
        assert_eq!(w.len(), 8);
    }
}
