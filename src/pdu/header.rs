//! The fixed 20-byte AgentX header (RFC 2741 §6.1).

use std::fmt;
use std::ops::BitOr;

use super::PduType;
use crate::codec::{ByteOrder, Decoder};
use crate::error::{DecodeErrorKind, Error, Result};

/// Size of the encoded header in bytes.
pub const HEADER_SIZE: usize = 20;

/// The only AgentX protocol version.
pub const VERSION: u8 = 1;

/// Header flag bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(u8);

impl Flags {
    pub const INSTANCE_REGISTRATION: Flags = Flags(0x01);
    pub const NEW_INDEX: Flags = Flags(0x02);
    pub const ANY_INDEX: Flags = Flags(0x04);
    pub const NON_DEFAULT_CONTEXT: Flags = Flags(0x08);
    pub const NETWORK_BYTE_ORDER: Flags = Flags(0x10);

    /// No flags set.
    pub const fn empty() -> Self {
        Flags(0)
    }

    /// Wrap a raw flags byte. Undefined bits are preserved.
    pub const fn from_bits(bits: u8) -> Self {
        Flags(bits)
    }

    /// Raw flags byte.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether every bit of `other` is set.
    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Flags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Flags) {
        self.0 &= !other.0;
    }

    /// Set or clear `other` depending on `value`.
    pub fn set(&mut self, other: Flags, value: bool) {
        if value {
            self.insert(other);
        } else {
            self.remove(other);
        }
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flags({:#04x})", self.0)
    }
}

/// AgentX PDU header.
///
/// `type_code` is kept raw so that a header with an unknown type can still
/// be decoded and its body skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub type_code: u8,
    pub flags: Flags,
    pub session_id: u32,
    pub transaction_id: u32,
    pub packet_id: u32,
    /// Exact byte length of the body that follows.
    pub payload_length: u32,
}

impl Header {
    /// Header for `pdu_type` with network byte order and zeroed ids.
    pub fn new(pdu_type: PduType) -> Self {
        Self {
            version: VERSION,
            type_code: pdu_type.code(),
            flags: Flags::NETWORK_BYTE_ORDER,
            session_id: 0,
            transaction_id: 0,
            packet_id: 0,
            payload_length: 0,
        }
    }

    /// The PDU type, if the type code is known.
    pub fn pdu_type(&self) -> Option<PduType> {
        PduType::from_u8(self.type_code)
    }

    /// Byte order of the multi-byte fields, as announced by the flags.
    pub fn byte_order(&self) -> ByteOrder {
        if self.flags.contains(Flags::NETWORK_BYTE_ORDER) {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        }
    }

    /// Encode in the byte order the flags announce.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0] = self.version;
        out[1] = self.type_code;
        out[2] = self.flags.bits();
        let words = [
            self.session_id,
            self.transaction_id,
            self.packet_id,
            self.payload_length,
        ];
        let order = self.byte_order();
        for (chunk, word) in out[4..].chunks_exact_mut(4).zip(words) {
            let bytes = match order {
                ByteOrder::BigEndian => word.to_be_bytes(),
                ByteOrder::LittleEndian => word.to_le_bytes(),
            };
            chunk.copy_from_slice(&bytes);
        }
        out
    }

    /// Decode exactly [`HEADER_SIZE`] bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != HEADER_SIZE {
            return Err(Error::framing(
                0,
                DecodeErrorKind::LengthMismatch {
                    declared: HEADER_SIZE,
                    actual: bytes.len(),
                },
            ));
        }

        let version = bytes[0];
        if version != VERSION {
            return Err(Error::framing(0, DecodeErrorKind::UnknownVersion(version)));
        }
        let type_code = bytes[1];
        let flags = Flags::from_bits(bytes[2]);
        let order = if flags.contains(Flags::NETWORK_BYTE_ORDER) {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        };

        let mut decoder = Decoder::from_slice(&bytes[4..], order);
        Ok(Self {
            version,
            type_code,
            flags,
            session_id: decoder.read_u32()?,
            transaction_id: decoder.read_u32()?,
            packet_id: decoder.read_u32()?,
            payload_length: decoder.read_u32()?,
        })
    }
}
