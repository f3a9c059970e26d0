//! AgentX decoding.
//!
//! Zero-copy decoding using `Bytes` to avoid allocations.

use bytes::Bytes;

use super::{ByteOrder, padding};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::{INTERNET_PREFIX, MAX_OID_LEN, Oid};

/// AgentX decoder that reads from a byte buffer.
pub struct Decoder {
    data: Bytes,
    offset: usize,
    order: ByteOrder,
}

impl Decoder {
    /// Create a new decoder from bytes.
    pub fn new(data: Bytes, order: ByteOrder) -> Self {
        Self {
            data,
            offset: 0,
            order,
        }
    }

    /// Create a decoder from a byte slice (copies the data).
    pub fn from_slice(data: &[u8], order: ByteOrder) -> Self {
        Self::new(Bytes::copy_from_slice(data), order)
    }

    /// Get the current offset.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Get remaining bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Check if we've reached the end.
    pub fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }

    /// Byte order used for multi-byte integers.
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        if self.remaining() < N {
            return Err(Error::framing(
                self.offset,
                DecodeErrorKind::InsufficientData {
                    needed: N,
                    available: self.remaining(),
                },
            ));
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.offset..self.offset + N]);
        self.offset += N;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let [b] = self.take_array::<1>()?;
        Ok(b)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take_array::<2>()?;
        Ok(match self.order {
            ByteOrder::BigEndian => u16::from_be_bytes(b),
            ByteOrder::LittleEndian => u16::from_le_bytes(b),
        })
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take_array::<4>()?;
        Ok(match self.order {
            ByteOrder::BigEndian => u32::from_be_bytes(b),
            ByteOrder::LittleEndian => u32::from_le_bytes(b),
        })
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let b = self.take_array::<8>()?;
        Ok(match self.order {
            ByteOrder::BigEndian => u64::from_be_bytes(b),
            ByteOrder::LittleEndian => u64::from_le_bytes(b),
        })
    }

    /// Read raw bytes without copying.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        // Use saturating_add to prevent overflow from bypassing bounds check
        if self.offset.saturating_add(len) > self.data.len() {
            return Err(Error::framing(
                self.offset,
                DecodeErrorKind::InsufficientData {
                    needed: len,
                    available: self.remaining(),
                },
            ));
        }
        let bytes = self.data.slice(self.offset..self.offset + len);
        self.offset += len;
        Ok(bytes)
    }

    /// Skip reserved or padding bytes.
    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.read_bytes(len).map(|_| ())
    }

    /// Read an Octet String, consuming its padding.
    pub fn read_octet_string(&mut self) -> Result<Bytes> {
        let len = self.read_u32()? as usize;
        let data = self.read_bytes(len)?;
        self.skip(padding(len))?;
        Ok(data)
    }

    /// Read an Object Identifier and its include flag.
    pub fn read_oid(&mut self) -> Result<(Oid, bool)> {
        let start = self.offset;
        let n_subid = self.read_u8()? as usize;
        let prefix = self.read_u8()?;
        let include = self.read_u8()? != 0;
        self.skip(1)?;

        if n_subid > MAX_OID_LEN {
            return Err(Error::framing(
                start,
                DecodeErrorKind::OidTooLong {
                    count: n_subid,
                    max: MAX_OID_LEN,
                },
            ));
        }

        let mut arcs = Vec::with_capacity(n_subid + 5);
        if prefix != 0 {
            arcs.extend_from_slice(&INTERNET_PREFIX);
            arcs.push(prefix as u32);
        }
        for _ in 0..n_subid {
            arcs.push(self.read_u32()?);
        }

        Ok((Oid::new(arcs), include))
    }

    /// Fail unless every byte has been consumed.
    pub fn finish(&self) -> Result<()> {
        if !self.is_empty() {
            return Err(Error::framing(
                self.offset,
                DecodeErrorKind::TrailingData {
                    remaining: self.remaining(),
                },
            ));
        }
        Ok(())
    }
}
