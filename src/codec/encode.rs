//! AgentX encoding.

use bytes::{BufMut, Bytes, BytesMut};

use super::padding;
use crate::error::{EncodeErrorKind, Error, Result};
use crate::oid::{MAX_OID_LEN, Oid};

/// Forward-writing buffer for AgentX fields, always big-endian.
#[derive(Debug, Default)]
pub struct EncodeBuf {
    buf: BytesMut,
}

impl EncodeBuf {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn push_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn push_u16(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    pub fn push_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    pub fn push_u64(&mut self, value: u64) {
        self.buf.put_u64(value);
    }

    /// Write `count` zero bytes.
    pub fn push_reserved(&mut self, count: usize) {
        self.buf.put_bytes(0, count);
    }

    /// Append already-encoded bytes.
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    /// Octet String: 4-byte length, data, zero padding (RFC 2741 §5.3).
    pub fn push_octet_string(&mut self, data: &[u8]) -> Result<()> {
        let len = u32::try_from(data.len()).map_err(|_| {
            Error::encode(EncodeErrorKind::OctetStringTooLong { length: data.len() })
        })?;
        self.push_u32(len);
        self.push_bytes(data);
        self.push_reserved(padding(data.len()));
        Ok(())
    }

    /// Object Identifier (RFC 2741 §5.1).
    ///
    /// `n_subid(1) prefix(1) include(1) reserved(1)` followed by the
    /// sub-identifiers left after prefix compression.
    pub fn push_oid(&mut self, oid: &Oid, include: bool) -> Result<()> {
        let (prefix, arcs) = oid.split_prefix();
        if arcs.len() > MAX_OID_LEN {
            return Err(Error::encode(EncodeErrorKind::OidTooLong {
                count: arcs.len(),
                max: MAX_OID_LEN,
            }));
        }

        self.push_u8(arcs.len() as u8);
        self.push_u8(prefix);
        self.push_u8(include as u8);
        self.push_reserved(1);
        for &arc in arcs {
            self.push_u32(arc);
        }
        Ok(())
    }

    /// Finish encoding and return the bytes.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}
